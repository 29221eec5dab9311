//! Core compliance deadline scheduler and notification engine.
//! This crate is the single source of truth for reminder and overdue rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use config::{ConfigError, DayBoundary, EngineConfig, LoggingConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::directory::{House, HouseId, User, UserId, UserRole};
pub use model::notification::{
    Notification, NotificationDraft, NotificationId, NotificationKind, SubjectKey,
};
pub use model::obligation::{
    AnchoredSubject, Client, CompletionKey, CompletionRecord, ComplianceItem, Employee,
    ObligationId, ObligationStatus, RoleAssignment, ScopedComplianceItem, SubjectId, SubjectKind,
    SubjectRef, Task,
};
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use repo::obligation_repo::{ObligationRepository, PromotionCount, SqliteObligationRepository};
pub use repo::{RepoError, RepoResult};
pub use schedule::derivation::{
    derive_due_dates, DueInstance, ObligationRule, RecurrenceRule, DEFAULT_MAX_OCCURRENCES,
};
pub use schedule::reminder::{classify_item, classify_recurring, ItemTier, ReminderTier};
pub use service::notification_service::{EmitOutcome, NotificationService};
pub use service::run_context::RunContext;
pub use service::scheduler_service::{
    ObligationDomain, RunReport, SchedulerService, SqliteSchedulerService,
};
pub use service::scope_service::ScopeResolver;
pub use service::trigger::{authorize, run_triggered, run_triggered_at, TriggerError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
