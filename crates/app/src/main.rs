mod config;
mod logging;
mod study;

use std::io;

use tokio::io::BufReader;
use tracing::info;

use config::{AppConfig, ArgsError, LogConfig};
use services::{AppServices, Clock};
use storage::repository::Storage;
use storage::seed::seed_demo_course;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [study]  [options]   # terminal flashcards (default)");
    eprintln!("  cargo run -p app -- progress [options]   # print the stored progress record");
    eprintln!("  cargo run -p app -- seed     [options]   # load the demo course");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>            SQLite URL (default: sqlite://dev.sqlite3)");
    eprintln!("  --user <id>                  User id (default: local-user)");
    eprintln!("  --course <id>                Course id (default: spanish-basics)");
    eprintln!("  --concurrency <n>            Max word fetches in flight (default: unbounded)");
    eprintln!("  --shuffle                    Shuffle cards before studying");
    eprintln!("  --progress-mode <mode>       faithful | strict (default: faithful)");
    eprintln!("  -h, --help                   Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LEARN_DB_URL, LEARN_USER_ID, LEARN_COURSE_ID, LEARN_FETCH_CONCURRENCY,");
    eprintln!("  LEARN_SHUFFLE, LEARN_PROGRESS_MODE");
    eprintln!("Logging:");
    eprintln!("  RUST_LOG (default: info), LEARN_FILE_LOGS=1, LEARN_LOG_DIR (default: ./logs)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Study,
    Progress,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "study" => Some(Self::Study),
            "progress" => Some(Self::Progress),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means study.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Study,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Study,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut config = AppConfig::from_env().map_err(|e| {
        eprintln!("{e}");
        e
    })?;
    let proceed = config.apply_args(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if !proceed {
        print_usage();
        return Ok(());
    }

    prepare_sqlite_file(&config.db_url)?;
    let storage = Storage::sqlite(&config.db_url).await?;
    info!(db = %config.db_url, command = ?cmd, "storage ready");

    match cmd {
        Command::Seed => {
            let report = seed_demo_course(storage.documents.as_ref(), &config.course_id).await?;
            println!(
                "Seeded course {} with {} words into {}",
                report.course_id, report.words, config.db_url
            );
        }
        Command::Progress => {
            let services = AppServices::new(&storage, Clock::default(), config.services_config());
            match services
                .progress()
                .lookup_progress(&config.user_id, &config.course_id)
                .await?
            {
                Some((id, record)) => {
                    let show = |p: Option<learn_core::model::Percentage>| {
                        p.map_or_else(|| "-".to_owned(), |p| p.to_string())
                    };
                    println!("progress {id} for {} in {}", record.user_id, record.course_id);
                    println!("  learn:  {}", show(record.learn_progress));
                    println!("  review: {}", show(record.review_progress));
                }
                None => println!(
                    "no progress recorded for {} in {}",
                    config.user_id, config.course_id
                ),
            }
            let total = services.points().total_score(&config.user_id).await?;
            println!("points for {}: {total}", config.user_id);
        }
        Command::Study => {
            let services = AppServices::new(&storage, Clock::default(), config.services_config());
            let mut session = services
                .open_flashcards(config.user_id.clone(), config.course_id.clone(), config.order)
                .await?;
            let mut stdout = tokio::io::stdout();
            let outcome = study::run_session(
                &mut session,
                &services.points(),
                BufReader::new(tokio::io::stdin()),
                &mut stdout,
            )
            .await?;
            info!(completed = outcome.completed, cards = outcome.cards, "study run finished");
        }
    }

    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let log_guard = logging::init_tracing(&LogConfig::from_env());
    if let Err(err) = run().await {
        eprintln!("{err}");
        drop(log_guard);
        std::process::exit(2);
    }
}
