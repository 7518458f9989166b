use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{CourseId, UserId};

//
// ─── PERCENTAGE ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PercentageError {
    #[error("percentage out of range 0..=100: {0}")]
    OutOfRange(i64),
}

/// Whole-number completion percentage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const COMPLETE: Self = Self(100);

    /// # Errors
    ///
    /// Returns `PercentageError::OutOfRange` for values above 100.
    pub fn new(value: u8) -> Result<Self, PercentageError> {
        Self::try_from(i64::from(value))
    }

    /// `floor(100 * part / whole)`, saturating at 100. An empty whole is complete.
    #[must_use]
    pub fn of(part: usize, whole: usize) -> Self {
        if whole == 0 || part >= whole {
            return Self::COMPLETE;
        }
        let scaled = (part as u128 * 100) / whole as u128;
        // part < whole, so scaled < 100
        Self(u8::try_from(scaled).unwrap_or(100))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// True if `self` is strictly greater than `current`, or nothing is recorded yet.
    #[must_use]
    pub fn advances(self, current: Option<Self>) -> bool {
        current.is_none_or(|current| self > current)
    }
}

impl TryFrom<i64> for Percentage {
    type Error = PercentageError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) if v <= 100 => Ok(Self(v)),
            _ => Err(PercentageError::OutOfRange(value)),
        }
    }
}

impl From<Percentage> for i64 {
    fn from(value: Percentage) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

//
// ─── PROGRESS ─────────────────────────────────────────────────────────────────
//

/// Per-(user, course) completion state.
///
/// The store key is the record's id; it is not repeated in the body.
/// At most one record should exist per pair, but the store does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub user_id: UserId,
    pub course_id: CourseId,
    #[serde(default)]
    pub learn_progress: Option<Percentage>,
    #[serde(default)]
    pub review_progress: Option<Percentage>,
}

impl Progress {
    /// Fresh record with both percentages at zero.
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            learn_progress: Some(Percentage::ZERO),
            review_progress: Some(Percentage::ZERO),
        }
    }

    #[must_use]
    pub fn belongs_to(&self, user_id: &UserId, course_id: &CourseId) -> bool {
        &self.user_id == user_id && &self.course_id == course_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: u8) -> Percentage {
        Percentage::new(v).unwrap()
    }

    #[test]
    fn percentage_rejects_values_above_hundred() {
        assert_eq!(Percentage::new(101), Err(PercentageError::OutOfRange(101)));
        assert_eq!(
            Percentage::try_from(-1_i64),
            Err(PercentageError::OutOfRange(-1))
        );
        assert_eq!(Percentage::new(100).unwrap(), Percentage::COMPLETE);
    }

    #[test]
    fn percentage_of_floors() {
        assert_eq!(Percentage::of(1, 3).value(), 33);
        assert_eq!(Percentage::of(2, 3).value(), 66);
        assert_eq!(Percentage::of(7, 25).value(), 28);
        assert_eq!(Percentage::of(0, 10), Percentage::ZERO);
        assert_eq!(Percentage::of(0, 0), Percentage::COMPLETE);
    }

    #[test]
    fn advances_only_on_strict_increase() {
        assert!(pct(41).advances(Some(pct(40))));
        assert!(!pct(40).advances(Some(pct(40))));
        assert!(!pct(30).advances(Some(pct(40))));
        assert!(Percentage::ZERO.advances(None));
    }

    #[test]
    fn progress_uses_camel_case_fields() {
        let progress = Progress::new(UserId::new("u1").unwrap(), CourseId::new("c1").unwrap());
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "userId": "u1",
                "courseId": "c1",
                "learnProgress": 0,
                "reviewProgress": 0
            })
        );
    }

    #[test]
    fn progress_tolerates_missing_percentages() {
        let progress: Progress =
            serde_json::from_value(serde_json::json!({ "userId": "u", "courseId": "c" })).unwrap();
        assert_eq!(progress.learn_progress, None);
        assert!(
            serde_json::from_value::<Progress>(
                serde_json::json!({ "userId": "u", "courseId": "c", "learnProgress": 140 })
            )
            .is_err()
        );
    }
}
