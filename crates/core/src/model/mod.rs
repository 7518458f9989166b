mod ids;
mod point;
mod progress;
mod word;

pub use ids::{CourseId, IdError, LinkId, PointId, ProgressId, UserId, WordId};
pub use point::Point;
pub use progress::{Percentage, PercentageError, Progress};
pub use word::{CourseWord, Word};
