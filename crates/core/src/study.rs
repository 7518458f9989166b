//! Navigation through a flashcard sequence and the learn percentages it reports.

use crate::model::Percentage;

/// Result of pressing "next" on a flashcard sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Moved forward to `position`; report `percentage` as learn progress.
    Moved {
        position: usize,
        percentage: Percentage,
    },
    /// Already on the last card (or the sequence is empty); the course is learned.
    Completed,
}

impl Step {
    /// The learn percentage this step reports.
    #[must_use]
    pub fn percentage(self) -> Percentage {
        match self {
            Step::Moved { percentage, .. } => percentage,
            Step::Completed => Percentage::COMPLETE,
        }
    }
}

/// Zero-based cursor over a fixed-length sequence of cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyCursor {
    position: usize,
    len: usize,
}

impl StudyCursor {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move forward one card.
    ///
    /// Advancing to position `p` of `n` reports `floor(100 * p / n)`; advancing
    /// past the last card reports completion and leaves the cursor in place.
    pub fn advance(&mut self) -> Step {
        if self.position + 1 < self.len {
            self.position += 1;
            Step::Moved {
                position: self.position,
                percentage: Percentage::of(self.position, self.len),
            }
        } else {
            Step::Completed
        }
    }

    /// Move back one card. Returns `false` on the first card.
    pub fn back(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_reports_floored_percentages_then_completion() {
        let mut cursor = StudyCursor::new(3);
        assert_eq!(
            cursor.advance(),
            Step::Moved {
                position: 1,
                percentage: Percentage::new(33).unwrap()
            }
        );
        assert_eq!(cursor.advance().percentage().value(), 66);
        assert_eq!(cursor.advance(), Step::Completed);
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.advance().percentage(), Percentage::COMPLETE);
    }

    #[test]
    fn empty_sequence_completes_immediately() {
        let mut cursor = StudyCursor::new(0);
        assert!(cursor.is_empty());
        assert_eq!(cursor.advance(), Step::Completed);
    }

    #[test]
    fn back_stops_at_first_card() {
        let mut cursor = StudyCursor::new(4);
        assert!(!cursor.back());
        cursor.advance();
        cursor.advance();
        assert!(cursor.back());
        assert_eq!(cursor.position(), 1);
        // going back does not change what the next forward step reports
        assert_eq!(cursor.advance().percentage().value(), 50);
    }
}
