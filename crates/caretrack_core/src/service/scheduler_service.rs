//! Scheduler Driver: one synchronous reminder sweep.
//!
//! # Responsibility
//! - Run the overdue Status Transition once per invocation.
//! - For each user, resolve scope once, then compute candidate notifications
//!   for compliance items, anchor-derived meetings and role-addressed tasks.
//! - Filter candidates through the Dedup Guard and emit survivors.
//!
//! # Invariants
//! - `RunContext::today` is the only notion of "now" inside a run.
//! - A failure in one user/domain unit is logged and counted, never fatal to
//!   other units.
//! - Re-running on an unchanged store creates zero additional notifications.

use crate::config::EngineConfig;
use crate::model::directory::{HouseId, User};
use crate::model::notification::{NotificationDraft, NotificationKind, SubjectKey};
use crate::model::obligation::{CompletionKey, SubjectKind, SubjectRef};
use crate::repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::obligation_repo::{ObligationRepository, SqliteObligationRepository};
use crate::repo::RepoResult;
use crate::schedule::derivation::{days_until, derive_due_dates, filter_completed};
use crate::schedule::reminder::{
    classify_item, classify_recurring, item_message, recurring_message, ItemTier,
    ReminderContext, UPCOMING_WINDOW_DAYS,
};
use crate::service::notification_service::{EmitOutcome, NotificationService};
use crate::service::run_context::RunContext;
use crate::service::scope_service::ScopeResolver;
use chrono::{Days, NaiveDate};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Obligation domain processed per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObligationDomain {
    ComplianceItems,
    Meetings,
    Tasks,
}

impl ObligationDomain {
    pub const ALL: [Self; 3] = [Self::ComplianceItems, Self::Meetings, Self::Tasks];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ComplianceItems => "compliance_items",
            Self::Meetings => "meetings",
            Self::Tasks => "tasks",
        }
    }
}

/// Summary of one scheduler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub today: NaiveDate,
    /// Epoch milliseconds at which the run started.
    pub run_at_ms: i64,
    /// Obligations flipped from pending to overdue.
    pub promoted_overdue: usize,
    pub users_processed: usize,
    pub notifications_created: usize,
    /// Candidates dropped because the same notification exists today.
    pub duplicates_skipped: usize,
    /// User/domain units (or the status transition) that failed and were skipped.
    pub failed_units: usize,
}

impl RunReport {
    fn empty(ctx: &RunContext) -> Self {
        Self {
            today: ctx.today,
            run_at_ms: ctx.started_at_ms,
            promoted_overdue: 0,
            users_processed: 0,
            notifications_created: 0,
            duplicates_skipped: 0,
            failed_units: 0,
        }
    }
}

/// Scheduler wired to the SQLite repositories of one connection.
pub type SqliteSchedulerService<'conn> = SchedulerService<
    SqliteDirectoryRepository<'conn>,
    SqliteObligationRepository<'conn>,
    SqliteNotificationRepository<'conn>,
>;

/// Scheduler orchestration over repository implementations.
pub struct SchedulerService<D, O, N>
where
    D: DirectoryRepository,
    O: ObligationRepository,
    N: NotificationRepository,
{
    directory: D,
    obligations: O,
    notifier: NotificationService<N>,
    config: EngineConfig,
}

impl<'conn> SqliteSchedulerService<'conn> {
    /// Builds a scheduler over one migrated connection.
    pub fn for_connection(conn: &'conn Connection, config: EngineConfig) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteDirectoryRepository::try_new(conn)?,
            SqliteObligationRepository::try_new(conn)?,
            SqliteNotificationRepository::try_new(conn)?,
            config,
        ))
    }
}

impl<D, O, N> SchedulerService<D, O, N>
where
    D: DirectoryRepository,
    O: ObligationRepository,
    N: NotificationRepository,
{
    pub fn new(directory: D, obligations: O, notifications: N, config: EngineConfig) -> Self {
        Self {
            directory,
            obligations,
            notifier: NotificationService::new(notifications),
            config,
        }
    }

    /// Runs one full sweep for `ctx.today`.
    ///
    /// # Errors
    /// - Returns an error only when the user list cannot be loaded; every
    ///   later failure is isolated to its unit and counted in the report.
    pub fn run(&self, ctx: RunContext) -> RepoResult<RunReport> {
        let started_at = Instant::now();
        info!(
            "event=scheduler_run module=scheduler status=start today={}",
            ctx.today
        );

        let users = match self.directory.list_users() {
            Ok(users) => users,
            Err(err) => {
                error!(
                    "event=scheduler_run module=scheduler status=error error_code=user_load_failed error={err}"
                );
                return Err(err);
            }
        };

        let mut report = RunReport::empty(&ctx);
        match self.obligations.promote_overdue(ctx.today) {
            Ok(count) => {
                report.promoted_overdue = count.total();
                info!(
                    "event=status_transition module=scheduler status=ok compliance_items={} tasks={}",
                    count.compliance_items, count.tasks
                );
            }
            Err(err) => {
                report.failed_units += 1;
                error!("event=status_transition module=scheduler status=error error={err}");
            }
        }

        let resolver = ScopeResolver::new(&self.directory);
        let completions = CompletionCache::default();
        for user in &users {
            let scope = match resolver.resolve_scope(user) {
                Ok(scope) => scope,
                Err(err) => {
                    report.failed_units += 1;
                    warn!(
                        "event=scope_resolve module=scheduler status=error user={} error={err}",
                        user.uuid
                    );
                    continue;
                }
            };
            report.users_processed += 1;
            if scope.is_empty() {
                debug!(
                    "event=scope_resolve module=scheduler status=skipped user={} reason=empty_scope",
                    user.uuid
                );
                continue;
            }

            for domain in ObligationDomain::ALL {
                match self.process_domain(domain, user, &scope, &ctx, &completions) {
                    Ok((created, duplicates)) => {
                        report.notifications_created += created;
                        report.duplicates_skipped += duplicates;
                    }
                    Err(err) => {
                        report.failed_units += 1;
                        warn!(
                            "event=domain_sweep module=scheduler status=error user={} domain={} error={err}",
                            user.uuid,
                            domain.as_str()
                        );
                    }
                }
            }
        }

        info!(
            "event=scheduler_run module=scheduler status=ok today={} duration_ms={} users={} created={} duplicates={} promoted={} failed_units={}",
            ctx.today,
            started_at.elapsed().as_millis(),
            report.users_processed,
            report.notifications_created,
            report.duplicates_skipped,
            report.promoted_overdue,
            report.failed_units
        );
        Ok(report)
    }

    /// Computes the candidate notifications of one domain for one user.
    pub fn candidates(
        &self,
        domain: ObligationDomain,
        user: &User,
        scope: &BTreeSet<HouseId>,
        ctx: &RunContext,
    ) -> RepoResult<Vec<NotificationDraft>> {
        self.collect(domain, user, scope, ctx, &CompletionCache::default())
    }

    fn process_domain(
        &self,
        domain: ObligationDomain,
        user: &User,
        scope: &BTreeSet<HouseId>,
        ctx: &RunContext,
        completions: &CompletionCache,
    ) -> RepoResult<(usize, usize)> {
        let drafts = self.collect(domain, user, scope, ctx, completions)?;
        let mut created = 0;
        let mut duplicates = 0;
        for draft in &drafts {
            match self.notifier.notify_once(draft, ctx)? {
                EmitOutcome::Created(_) => created += 1,
                EmitOutcome::Duplicate => duplicates += 1,
            }
        }
        debug!(
            "event=domain_sweep module=scheduler status=ok user={} domain={} candidates={} created={} duplicates={}",
            user.uuid,
            domain.as_str(),
            drafts.len(),
            created,
            duplicates
        );
        Ok((created, duplicates))
    }

    fn collect(
        &self,
        domain: ObligationDomain,
        user: &User,
        scope: &BTreeSet<HouseId>,
        ctx: &RunContext,
        completions: &CompletionCache,
    ) -> RepoResult<Vec<NotificationDraft>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        match domain {
            ObligationDomain::ComplianceItems => self.compliance_candidates(user, scope, ctx),
            ObligationDomain::Meetings => self.meeting_candidates(user, scope, ctx, completions),
            ObligationDomain::Tasks => self.task_candidates(user, scope, ctx),
        }
    }

    fn compliance_candidates(
        &self,
        user: &User,
        scope: &BTreeSet<HouseId>,
        ctx: &RunContext,
    ) -> RepoResult<Vec<NotificationDraft>> {
        let items = self
            .obligations
            .list_open_compliance_items(scope, upcoming_horizon(ctx.today))?;

        let mut drafts = Vec::new();
        for scoped in items {
            let item = &scoped.item;
            let days_until_due = days_until(item.due_date, ctx.today);
            let Some(tier) = classify_item(days_until_due) else {
                continue;
            };
            let reminder = ReminderContext {
                obligation_name: &item.title,
                subject_name: scoped.subject_name.as_deref(),
                due_date: item.due_date,
                days_until_due,
            };
            drafts.push(NotificationDraft {
                recipient: user.uuid,
                kind: match tier {
                    ItemTier::Overdue => NotificationKind::ComplianceOverdue,
                    ItemTier::Upcoming => NotificationKind::ComplianceDue,
                },
                subject_key: SubjectKey::for_compliance_item(item.uuid, &item.item_type),
                link: format!("/compliance/{}", item.uuid),
                message: item_message(tier, &reminder),
            });
        }
        Ok(drafts)
    }

    fn meeting_candidates(
        &self,
        user: &User,
        scope: &BTreeSet<HouseId>,
        ctx: &RunContext,
        completions: &CompletionCache,
    ) -> RepoResult<Vec<NotificationDraft>> {
        let mut drafts = Vec::new();
        for kind in [SubjectKind::Client, SubjectKind::Employee] {
            let rules: Vec<_> = self
                .config
                .rules
                .iter()
                .filter(|rule| rule.subject == kind)
                .collect();
            if rules.is_empty() {
                continue;
            }

            for subject in self.obligations.list_anchored_subjects(kind, scope)? {
                let completed = completions.get_or_load(subject.subject, &self.obligations)?;
                for rule in &rules {
                    let instances = filter_completed(
                        derive_due_dates(subject.anchor_date, rule.rule, self.config.max_occurrences),
                        &rule.obligation_type,
                        &completed,
                    );
                    for instance in instances {
                        let days_until_due = days_until(instance.due_date, ctx.today);
                        let Some(tier) = classify_recurring(days_until_due) else {
                            continue;
                        };
                        let reminder = ReminderContext {
                            obligation_name: &rule.name,
                            subject_name: Some(subject.display_name.as_str()),
                            due_date: instance.due_date,
                            days_until_due,
                        };
                        drafts.push(NotificationDraft {
                            recipient: user.uuid,
                            kind: NotificationKind::MeetingReminder,
                            subject_key: SubjectKey::for_occurrence(
                                subject.subject,
                                &rule.obligation_type,
                                instance.occurrence_index,
                            ),
                            link: format!("{}/{}", kind.link_prefix(), subject.subject.uuid),
                            message: recurring_message(tier, &reminder),
                        });
                    }
                }
            }
        }
        Ok(drafts)
    }

    fn task_candidates(
        &self,
        user: &User,
        scope: &BTreeSet<HouseId>,
        ctx: &RunContext,
    ) -> RepoResult<Vec<NotificationDraft>> {
        let tasks = self
            .obligations
            .list_open_tasks(scope, upcoming_horizon(ctx.today))?;

        let mut drafts = Vec::new();
        for task in tasks {
            if !task.assigned_roles.matches(user.role) {
                continue;
            }
            let days_until_due = days_until(task.due_date, ctx.today);
            let Some(tier) = classify_item(days_until_due) else {
                continue;
            };
            let reminder = ReminderContext {
                obligation_name: &task.title,
                subject_name: None,
                due_date: task.due_date,
                days_until_due,
            };
            drafts.push(NotificationDraft {
                recipient: user.uuid,
                kind: match tier {
                    ItemTier::Overdue => NotificationKind::TaskOverdue,
                    ItemTier::Upcoming => NotificationKind::TaskDue,
                },
                subject_key: SubjectKey::for_task(task.uuid),
                link: format!("/tasks/{}", task.uuid),
                message: item_message(tier, &reminder),
            });
        }
        Ok(drafts)
    }
}

/// Completion keys per subject, loaded once per run.
#[derive(Default)]
struct CompletionCache {
    by_subject: RefCell<HashMap<SubjectRef, BTreeSet<CompletionKey>>>,
}

impl CompletionCache {
    fn get_or_load<O: ObligationRepository>(
        &self,
        subject: SubjectRef,
        obligations: &O,
    ) -> RepoResult<BTreeSet<CompletionKey>> {
        if let Some(keys) = self.by_subject.borrow().get(&subject) {
            return Ok(keys.clone());
        }
        let keys = obligations.list_completion_keys(subject)?;
        self.by_subject.borrow_mut().insert(subject, keys.clone());
        Ok(keys)
    }
}

fn upcoming_horizon(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(UPCOMING_WINDOW_DAYS.unsigned_abs()))
        .unwrap_or(NaiveDate::MAX)
}
