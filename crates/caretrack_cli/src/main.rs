//! Operator CLI for the deadline scheduler.
//!
//! # Responsibility
//! - Trigger one scheduler run against a SQLite store ("run now").
//! - Inspect a user's notifications and preview derived due dates.
//!
//! # Invariants
//! - `run` checks the trigger secret before logging starts or the store is
//!   opened, so a rejected call leaves no database file behind.

use caretrack_core::db::open_db;
use caretrack_core::{
    authorize, default_log_level, derive_due_dates, init_logging, run_triggered_at, EngineConfig,
    NotificationService, RecurrenceRule, RunContext, SqliteNotificationRepository, TriggerError,
    DEFAULT_MAX_OCCURRENCES,
};
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

const DEFAULT_DB_PATH: &str = "caretrack.sqlite3";

#[derive(Parser)]
#[command(name = "caretrack", version, about = "Compliance deadline scheduler")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// TOML config file. Defaults to ~/.config/caretrack/config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scheduler sweep.
    Run {
        /// Shared trigger secret; required when the config sets one.
        #[arg(long, env = "CARETRACK_TRIGGER_SECRET")]
        secret: Option<String>,
        /// Evaluate as of this day instead of the clock.
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// List a user's notifications, newest first.
    Notifications {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print the due dates a rule derives from an anchor date.
    #[command(group(ArgGroup::new("offset").required(true).args(["months", "days"])))]
    DueDates {
        #[arg(long)]
        anchor: NaiveDate,
        /// Recurring rule interval.
        #[arg(long)]
        months: Option<u32>,
        /// One-time rule offset.
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, default_value_t = DEFAULT_MAX_OCCURRENCES)]
        max: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    match execute(cli, &EngineConfig::default_config_path(), &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Unauthorized) => {
            eprintln!("error: unauthorized trigger");
            ExitCode::from(2)
        }
        Err(CliError::Other(message)) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug)]
enum CliError {
    Unauthorized,
    Other(String),
}

impl<E: std::fmt::Display> From<E> for CliError {
    fn from(value: E) -> Self {
        Self::Other(value.to_string())
    }
}

fn execute(cli: Cli, fallback_config: &Path, out: &mut impl Write) -> Result<(), CliError> {
    match cli.command {
        Command::Run { secret, today } => {
            let config = load_config(cli.config.as_deref(), fallback_config)?;
            authorize(config.trigger_secret.as_deref(), secret.as_deref())
                .map_err(|_| CliError::Unauthorized)?;
            start_logging(&config)?;
            let ctx = match today {
                Some(day) => RunContext::at(day, Utc::now().timestamp_millis()),
                None => RunContext::capture(config.day_boundary),
            };
            let report = match run_triggered_at(&cli.db, &config, secret.as_deref(), ctx) {
                Ok(report) => report,
                Err(TriggerError::Unauthorized) => return Err(CliError::Unauthorized),
                Err(err) => return Err(err.into()),
            };
            writeln!(out, "today={}", report.today)?;
            writeln!(out, "run_at_ms={}", report.run_at_ms)?;
            writeln!(out, "notifications_created={}", report.notifications_created)?;
            writeln!(out, "overdue_promoted={}", report.promoted_overdue)?;
            writeln!(out, "duplicates_skipped={}", report.duplicates_skipped)?;
            writeln!(out, "failed_units={}", report.failed_units)?;
            Ok(())
        }
        Command::Notifications { user, limit } => {
            let conn = open_db(&cli.db)?;
            let service = NotificationService::new(SqliteNotificationRepository::try_new(&conn)?);
            for notification in service.list_for_user(user, limit)? {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    notification.day_bucket,
                    notification.kind,
                    notification.link,
                    notification.message
                )?;
            }
            Ok(())
        }
        Command::DueDates {
            anchor,
            months,
            days,
            max,
        } => {
            let rule = match (months, days) {
                (Some(months), _) => RecurrenceRule::Recurring { months },
                (None, Some(days)) => RecurrenceRule::OneTime { days },
                (None, None) => return Err(CliError::Other("expected --months or --days".into())),
            };
            for instance in derive_due_dates(anchor, rule, max) {
                writeln!(out, "{}\t{}", instance.occurrence_index, instance.due_date)?;
            }
            Ok(())
        }
    }
}

/// Explicit `--config` must exist; otherwise `fallback` is read when present.
fn load_config(explicit: Option<&Path>, fallback: &Path) -> Result<EngineConfig, CliError> {
    if let Some(path) = explicit {
        return Ok(EngineConfig::from_file(path)?);
    }
    if fallback.exists() {
        return Ok(EngineConfig::from_file(fallback)?);
    }
    Ok(EngineConfig::default())
}

fn start_logging(config: &EngineConfig) -> Result<(), CliError> {
    let Some(log_dir) = config.logging.log_dir.as_deref() else {
        return Ok(());
    };
    let level = config
        .logging
        .level
        .as_deref()
        .unwrap_or(default_log_level());
    init_logging(level, log_dir).map_err(CliError::Other)
}

#[cfg(test)]
mod tests {
    use super::{execute, load_config, Cli, CliError};
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn run_cli(args: &[&str], fallback: &Path) -> (Result<(), CliError>, String) {
        let cli = Cli::try_parse_from(std::iter::once("caretrack").chain(args.iter().copied()))
            .expect("arguments should parse");
        let mut out = Vec::new();
        let result = execute(cli, fallback, &mut out);
        (result, String::from_utf8(out).expect("output is utf-8"))
    }

    fn secured_config(dir: &TempDir) -> String {
        let path = dir.path().join("config.toml");
        fs::write(&path, "trigger_secret = \"cron-token\"\n").expect("write config");
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn unauthorized_run_leaves_db_path_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let config = secured_config(&dir);
        let db = dir.path().join("store.sqlite3");
        let db_arg = db.to_string_lossy().into_owned();
        let fallback = dir.path().join("absent.toml");

        for secret in [Some("wrong"), None] {
            let mut args = vec!["--db", db_arg.as_str(), "--config", config.as_str(), "run"];
            if let Some(secret) = secret {
                args.extend(["--secret", secret]);
            }
            let (result, output) = run_cli(&args, &fallback);
            assert!(matches!(result, Err(CliError::Unauthorized)));
            assert!(output.is_empty());
            assert!(!db.exists());
        }
    }

    #[test]
    fn authorized_run_opens_store_and_reports() {
        let dir = TempDir::new().expect("tempdir");
        let config = secured_config(&dir);
        let db = dir.path().join("store.sqlite3");
        let db_arg = db.to_string_lossy().into_owned();
        let fallback = dir.path().join("absent.toml");

        let (result, output) = run_cli(
            &[
                "--db",
                db_arg.as_str(),
                "--config",
                config.as_str(),
                "run",
                "--secret",
                "cron-token",
                "--today",
                "2025-01-20",
            ],
            &fallback,
        );
        assert!(result.is_ok(), "run failed: {result:?}");
        assert!(db.exists());
        assert!(output.starts_with("today=2025-01-20\n"));
        assert!(output.contains("notifications_created=0\n"));
        assert!(output.contains("failed_units=0\n"));
    }

    #[test]
    fn due_dates_prints_one_row_per_occurrence() {
        let dir = TempDir::new().expect("tempdir");
        let fallback = dir.path().join("absent.toml");

        let (result, output) = run_cli(
            &["due-dates", "--anchor", "2024-01-15", "--months", "6"],
            &fallback,
        );
        assert!(result.is_ok());
        let rows: Vec<&str> = output.lines().collect();
        assert_eq!(
            rows,
            [
                "1\t2024-07-15",
                "2\t2025-01-15",
                "3\t2025-07-15",
                "4\t2026-01-15",
                "5\t2026-07-15",
            ]
        );

        let (result, output) = run_cli(
            &["due-dates", "--anchor", "2024-01-15", "--days", "30"],
            &fallback,
        );
        assert!(result.is_ok());
        assert_eq!(output, "1\t2024-02-14\n");
    }

    #[test]
    fn due_dates_requires_an_offset() {
        let parsed = Cli::try_parse_from(["caretrack", "due-dates", "--anchor", "2024-01-15"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn config_falls_back_to_default_location_then_builtin() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("absent.toml");

        let builtin = load_config(None, &missing).expect("builtin config");
        assert_eq!(builtin.trigger_secret, None);

        let fallback = dir.path().join("config.toml");
        fs::write(&fallback, "trigger_secret = \"from-fallback\"\n").expect("write config");
        let loaded = load_config(None, &fallback).expect("fallback config");
        assert_eq!(loaded.trigger_secret.as_deref(), Some("from-fallback"));

        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, "trigger_secret = \"from-flag\"\n").expect("write config");
        let chosen = load_config(Some(&explicit), &fallback).expect("explicit config");
        assert_eq!(chosen.trigger_secret.as_deref(), Some("from-flag"));

        assert!(matches!(
            load_config(Some(&missing), &fallback),
            Err(CliError::Other(_))
        ));
    }
}
