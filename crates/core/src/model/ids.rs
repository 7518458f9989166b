use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for building an ID from a string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} must not contain '/': {raw}")]
    PathSeparator { kind: &'static str, raw: String },
}

fn validate(kind: &'static str, raw: &str) -> Result<(), IdError> {
    if raw.trim().is_empty() {
        return Err(IdError::Empty { kind });
    }
    // Ids double as store path segments.
    if raw.contains('/') {
        return Err(IdError::PathSeparator {
            kind,
            raw: raw.to_owned(),
        });
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`.")]
            ///
            /// # Errors
            ///
            /// Returns `IdError` if the value is blank or contains a path separator.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                validate(stringify!($name), &raw)?;
                Ok(Self(raw))
            }

            /// Returns the underlying string value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of an authenticated learner
    UserId
}

string_id! {
    /// Identifier of a course
    CourseId
}

string_id! {
    /// Identifier of a word record
    WordId
}

string_id! {
    /// Identifier of a course → word link record
    LinkId
}

string_id! {
    /// Identifier of a progress record
    ProgressId
}

string_id! {
    /// Identifier of a saved point entry
    PointId
}

impl ProgressId {
    /// Deterministic id for the (user, course) pair: `"{user}_{course}"`.
    ///
    /// `%` and `_` inside either id are percent-escaped, so distinct pairs
    /// never share a key.
    #[must_use]
    pub fn composite(user_id: &UserId, course_id: &CourseId) -> Self {
        Self(format!(
            "{}_{}",
            escape_key_segment(user_id.as_str()),
            escape_key_segment(course_id.as_str())
        ))
    }
}

fn escape_key_segment(raw: &str) -> String {
    raw.replace('%', "%25").replace('_', "%5F")
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
