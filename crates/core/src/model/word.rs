use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LinkId, WordId};

/// Association between a course and one of its words.
///
/// Authored outside this app; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWord {
    pub id: LinkId,
    pub course_id: CourseId,
    pub word_id: WordId,
}

/// Vocabulary entry shown on a flashcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: WordId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub pronunciation: Option<String>,
    /// Opaque audio handle (usually a URL) resolved by the player.
    #[serde(default)]
    pub audio: Option<String>,
}
