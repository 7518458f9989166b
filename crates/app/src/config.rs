use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use learn_core::model::{CourseId, UserId};
use services::{CardOrder, ProgressServiceConfig, ServicesConfig, WordServiceConfig};

const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";
const DEFAULT_USER_ID: &str = "local-user";
const DEFAULT_COURSE_ID: &str = "spanish-basics";

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidCourseId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidConcurrency { raw: String },
    InvalidProgressMode { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidConcurrency { raw } => {
                write!(f, "invalid --concurrency value (expected a positive integer): {raw}")
            }
            ArgsError::InvalidProgressMode { raw } => {
                write!(f, "invalid --progress-mode value (expected faithful or strict): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

/// How progress records are keyed and updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressMode {
    /// Scanned keys, last writer wins.
    #[default]
    Faithful,
    /// Composite keys, compare-and-swap.
    Strict,
}

impl ProgressMode {
    #[must_use]
    pub fn service_config(self) -> ProgressServiceConfig {
        match self {
            ProgressMode::Faithful => ProgressServiceConfig::default(),
            ProgressMode::Strict => ProgressServiceConfig::strict(),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = ArgsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "faithful" => Ok(Self::Faithful),
            "strict" => Ok(Self::Strict),
            _ => Err(ArgsError::InvalidProgressMode { raw: raw.to_owned() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub file_logs: bool,
    pub dir: PathBuf,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            level: lookup("RUST_LOG").unwrap_or_else(|| "info".into()),
            file_logs: lookup("LEARN_FILE_LOGS").is_some_and(|v| truthy(&v)),
            dir: lookup("LEARN_LOG_DIR").map_or_else(|| PathBuf::from("./logs"), PathBuf::from),
        }
    }
}

/// Settings shared by every subcommand: environment first, flags override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub max_concurrent_fetches: Option<NonZeroUsize>,
    pub order: CardOrder,
    pub progress_mode: ProgressMode,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ArgsError` if an id or mode taken from the environment is invalid.
    pub fn from_env() -> Result<Self, ArgsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ArgsError> {
        let db_url = lookup("LEARN_DB_URL")
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let user_id = parse_user(lookup("LEARN_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.into()))?;
        let course_id =
            parse_course(lookup("LEARN_COURSE_ID").unwrap_or_else(|| DEFAULT_COURSE_ID.into()))?;
        // Unparsable env bounds fall back to the unbounded default.
        let max_concurrent_fetches = lookup("LEARN_FETCH_CONCURRENCY")
            .and_then(|value| value.trim().parse::<NonZeroUsize>().ok());
        let order = if lookup("LEARN_SHUFFLE").is_some_and(|v| truthy(&v)) {
            CardOrder::Shuffled
        } else {
            CardOrder::Delivered
        };
        let progress_mode = match lookup("LEARN_PROGRESS_MODE") {
            Some(raw) => raw.parse()?,
            None => ProgressMode::default(),
        };

        Ok(Self {
            db_url,
            user_id,
            course_id,
            max_concurrent_fetches,
            order,
            progress_mode,
        })
    }

    /// Apply command-line flags on top of the environment.
    ///
    /// Returns `Ok(false)` when help was requested.
    ///
    /// # Errors
    ///
    /// Returns `ArgsError` for unknown flags, missing values, or invalid values.
    pub fn apply_args(&mut self, args: &mut impl Iterator<Item = String>) -> Result<bool, ArgsError> {
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--user" => self.user_id = parse_user(require_value(args, "--user")?)?,
                "--course" => self.course_id = parse_course(require_value(args, "--course")?)?,
                "--concurrency" => {
                    let value = require_value(args, "--concurrency")?;
                    let parsed = value
                        .trim()
                        .parse::<NonZeroUsize>()
                        .map_err(|_| ArgsError::InvalidConcurrency { raw: value.clone() })?;
                    self.max_concurrent_fetches = Some(parsed);
                }
                "--shuffle" => self.order = CardOrder::Shuffled,
                "--progress-mode" => {
                    self.progress_mode = require_value(args, "--progress-mode")?.parse()?;
                }
                "--help" | "-h" => return Ok(false),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(true)
    }

    #[must_use]
    pub fn services_config(&self) -> ServicesConfig {
        ServicesConfig {
            words: WordServiceConfig {
                max_concurrent_fetches: self.max_concurrent_fetches,
            },
            progress: self.progress_mode.service_config(),
        }
    }
}

fn parse_user(raw: String) -> Result<UserId, ArgsError> {
    UserId::new(raw.clone()).map_err(|_| ArgsError::InvalidUserId { raw })
}

fn parse_course(raw: String) -> Result<CourseId, ArgsError> {
    CourseId::new(raw.clone()).map_err(|_| ArgsError::InvalidCourseId { raw })
}

fn truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

/// Turn `sqlite:relative.db` and bare paths into absolute `sqlite://` URLs.
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:")
    {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.db_url, DEFAULT_DB_URL);
        assert_eq!(config.user_id.as_str(), DEFAULT_USER_ID);
        assert_eq!(config.course_id.as_str(), DEFAULT_COURSE_ID);
        assert_eq!(config.max_concurrent_fetches, None);
        assert_eq!(config.order, CardOrder::Delivered);
        assert_eq!(config.progress_mode, ProgressMode::Faithful);
        assert_eq!(config.services_config(), ServicesConfig::default());
    }

    #[test]
    fn environment_is_read() {
        let config = AppConfig::from_lookup(env(&[
            ("LEARN_DB_URL", "sqlite::memory:"),
            ("LEARN_USER_ID", "ana"),
            ("LEARN_COURSE_ID", "french"),
            ("LEARN_FETCH_CONCURRENCY", "4"),
            ("LEARN_SHUFFLE", "1"),
            ("LEARN_PROGRESS_MODE", "strict"),
        ]))
        .unwrap();
        assert_eq!(config.db_url, "sqlite::memory:");
        assert_eq!(config.user_id.as_str(), "ana");
        assert_eq!(config.course_id.as_str(), "french");
        assert_eq!(config.max_concurrent_fetches, NonZeroUsize::new(4));
        assert_eq!(config.order, CardOrder::Shuffled);
        assert_eq!(config.services_config().progress, ProgressServiceConfig::strict());
    }

    #[test]
    fn bad_env_concurrency_falls_back_but_bad_mode_fails() {
        let config =
            AppConfig::from_lookup(env(&[("LEARN_FETCH_CONCURRENCY", "0")])).unwrap();
        assert_eq!(config.max_concurrent_fetches, None);

        let err = AppConfig::from_lookup(env(&[("LEARN_PROGRESS_MODE", "eventual")])).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidProgressMode { .. }));
    }

    #[test]
    fn flags_override_environment() {
        let mut config = AppConfig::from_lookup(env(&[("LEARN_USER_ID", "ana")])).unwrap();
        let proceed = config
            .apply_args(&mut args(&[
                "--user",
                "bo",
                "--concurrency",
                "2",
                "--shuffle",
                "--progress-mode",
                "Strict",
            ]))
            .unwrap();
        assert!(proceed);
        assert_eq!(config.user_id.as_str(), "bo");
        assert_eq!(config.max_concurrent_fetches, NonZeroUsize::new(2));
        assert_eq!(config.order, CardOrder::Shuffled);
        assert_eq!(config.progress_mode, ProgressMode::Strict);
    }

    #[test]
    fn invalid_flags_are_rejected() {
        let mut config = AppConfig::from_lookup(env(&[])).unwrap();
        assert!(matches!(
            config.apply_args(&mut args(&["--concurrency", "0"])),
            Err(ArgsError::InvalidConcurrency { .. })
        ));
        assert!(matches!(
            config.apply_args(&mut args(&["--course"])),
            Err(ArgsError::MissingValue { flag: "--course" })
        ));
        assert!(matches!(
            config.apply_args(&mut args(&["--course", "a/b"])),
            Err(ArgsError::InvalidCourseId { .. })
        ));
        assert!(matches!(
            config.apply_args(&mut args(&["--bogus"])),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(!config.apply_args(&mut args(&["-h"])).unwrap());
    }

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/a.db".into()), "sqlite:///tmp/a.db");
        assert_eq!(normalize_sqlite_url("sqlite:/tmp/a.db".into()), "sqlite:///tmp/a.db");
        assert!(normalize_sqlite_url("dev.sqlite3".into()).starts_with("sqlite:///"));
    }

    #[test]
    fn log_config_reads_file_logging_switch() {
        let config = LogConfig::from_lookup(env(&[
            ("LEARN_FILE_LOGS", "true"),
            ("LEARN_LOG_DIR", "/var/log/learn"),
        ]));
        assert!(config.file_logs);
        assert_eq!(config.dir, PathBuf::from("/var/log/learn"));
        assert_eq!(config.level, "info");
        assert!(!LogConfig::from_lookup(env(&[])).file_logs);
    }
}
