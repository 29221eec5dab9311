//! "Run now" invocation entry point with optional shared-secret check.
//!
//! # Invariants
//! - When a secret is configured, a missing or wrong presented secret returns
//!   `Unauthorized` before any store access.
//! - Secret comparison takes time independent of where the inputs differ
//!   and of which input is shorter; only the longer length is observable.

use crate::config::EngineConfig;
use crate::db::open_db;
use crate::repo::RepoError;
use crate::service::run_context::RunContext;
use crate::service::scheduler_service::{RunReport, SqliteSchedulerService};
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Errors returned by the invocation boundary.
#[derive(Debug)]
pub enum TriggerError {
    /// Trigger secret missing or incorrect; nothing was executed.
    Unauthorized,
    /// Store could not be prepared or users could not be loaded.
    Repo(RepoError),
}

impl Display for TriggerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("unauthorized trigger: secret missing or incorrect"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TriggerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unauthorized => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for TriggerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Checks a presented secret against the configured one.
///
/// `expected = None` means the trigger is not exposed over a network
/// boundary and needs no secret.
pub fn authorize(expected: Option<&str>, presented: Option<&str>) -> Result<(), TriggerError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match presented {
        Some(presented) if constant_time_eq(expected.as_bytes(), presented.as_bytes()) => Ok(()),
        _ => Err(TriggerError::Unauthorized),
    }
}

/// Authorizes, then runs one scheduler sweep against `conn`.
pub fn run_triggered(
    conn: &Connection,
    config: &EngineConfig,
    presented_secret: Option<&str>,
    ctx: RunContext,
) -> Result<RunReport, TriggerError> {
    authorize_trigger(config, presented_secret)?;
    run_authorized(conn, config, ctx)
}

/// Authorizes, then opens the store at `db_path` and runs one sweep.
///
/// An unauthorized call never creates, migrates or otherwise touches the
/// database file.
pub fn run_triggered_at(
    db_path: &Path,
    config: &EngineConfig,
    presented_secret: Option<&str>,
    ctx: RunContext,
) -> Result<RunReport, TriggerError> {
    authorize_trigger(config, presented_secret)?;
    let conn = open_db(db_path).map_err(RepoError::from)?;
    run_authorized(&conn, config, ctx)
}

fn authorize_trigger(
    config: &EngineConfig,
    presented_secret: Option<&str>,
) -> Result<(), TriggerError> {
    authorize(config.trigger_secret.as_deref(), presented_secret).inspect_err(|_| {
        warn!(
            "event=trigger module=trigger status=error error_code=unauthorized secret_presented={}",
            presented_secret.is_some()
        );
    })
}

fn run_authorized(
    conn: &Connection,
    config: &EngineConfig,
    ctx: RunContext,
) -> Result<RunReport, TriggerError> {
    let scheduler = SqliteSchedulerService::for_connection(conn, config.clone())?;
    let report = scheduler.run(ctx)?;
    info!(
        "event=trigger module=trigger status=ok created={} run_at_ms={}",
        report.notifications_created, report.run_at_ms
    );
    Ok(report)
}

/// Walks the longer input in full; a length mismatch is folded into the
/// accumulator instead of returning early.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    let mut diff = left.len() ^ right.len();
    for index in 0..left.len().max(right.len()) {
        let a = left.get(index).copied().unwrap_or(0);
        let b = right.get(index).copied().unwrap_or(0);
        diff |= usize::from(a ^ b);
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::{authorize, constant_time_eq, TriggerError};

    #[test]
    fn no_configured_secret_allows_any_caller() {
        assert!(authorize(None, None).is_ok());
        assert!(authorize(None, Some("anything")).is_ok());
    }

    #[test]
    fn configured_secret_must_match_exactly() {
        assert!(authorize(Some("cron-token"), Some("cron-token")).is_ok());
        assert!(matches!(
            authorize(Some("cron-token"), None),
            Err(TriggerError::Unauthorized)
        ));
        assert!(matches!(
            authorize(Some("cron-token"), Some("cron-toke")),
            Err(TriggerError::Unauthorized)
        ));
        assert!(matches!(
            authorize(Some("cron-token"), Some("CRON-TOKEN")),
            Err(TriggerError::Unauthorized)
        ));
    }

    #[test]
    fn constant_time_eq_compares_bytes() {
        assert!(constant_time_eq(b"", b""));
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(!constant_time_eq(b"ab", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abc\0"));
        assert!(!constant_time_eq(b"", b"\0"));
    }
}
