use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, UserId};

/// Score earned by a user in one practice run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub score: u32,
    pub earned_at: DateTime<Utc>,
}
