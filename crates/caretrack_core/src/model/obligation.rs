//! Obligation domain model.
//!
//! # Responsibility
//! - Define compliance items, tasks and anchor-bearing subjects.
//! - Parse task role lists into an explicit match policy.
//!
//! # Invariants
//! - `ObligationStatus` never regresses automatically.
//! - A malformed role list matches no role at all.

use crate::model::directory::{HouseId, UserRole};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a compliance item or task.
pub type ObligationId = Uuid;

/// Stable identifier for a client or employee.
pub type SubjectId = Uuid;

static ROLE_CSV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[A-Za-z_]+\s*(,\s*[A-Za-z_]+\s*)*$").expect("valid role list regex")
});

/// Lifecycle state shared by compliance items and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    /// Open and not yet due.
    Pending,
    /// Open and past its due date.
    Overdue,
    /// Satisfied by a user action.
    Completed,
}

impl ObligationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "overdue" => Some(Self::Overdue),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether reminders may still fire for this status.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Kind of person an obligation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Client,
    Employee,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Employee => "employee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client" => Some(Self::Client),
            "employee" => Some(Self::Employee),
            _ => None,
        }
    }

    /// UI path prefix for subject detail pages.
    pub fn link_prefix(self) -> &'static str {
        match self {
            Self::Client => "/clients",
            Self::Employee => "/employees",
        }
    }
}

impl Display for SubjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to a client or employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub uuid: SubjectId,
}

impl SubjectRef {
    pub fn client(uuid: SubjectId) -> Self {
        Self {
            kind: SubjectKind::Client,
            uuid,
        }
    }

    pub fn employee(uuid: SubjectId) -> Self {
        Self {
            kind: SubjectKind::Employee,
            uuid,
        }
    }
}

/// Resident record carrying the admission anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub uuid: SubjectId,
    pub display_name: String,
    pub house_uuid: Option<HouseId>,
    pub admission_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl Client {
    pub fn new(display_name: impl Into<String>, house_uuid: Option<HouseId>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            display_name: display_name.into(),
            house_uuid,
            admission_date: None,
            is_active: true,
        }
    }
}

/// Staff record carrying the hire anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub uuid: SubjectId,
    pub display_name: String,
    pub house_uuid: Option<HouseId>,
    pub hire_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl Employee {
    pub fn new(display_name: impl Into<String>, house_uuid: Option<HouseId>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            display_name: display_name.into(),
            house_uuid,
            hire_date: None,
            is_active: true,
        }
    }
}

/// Active subject with a recurrence anchor, resolved to its house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredSubject {
    pub subject: SubjectRef,
    pub display_name: String,
    pub house_uuid: HouseId,
    pub anchor_date: NaiveDate,
}

/// Standalone compliance obligation (certification, document, inspection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceItem {
    pub uuid: ObligationId,
    pub title: String,
    /// Free-form category, e.g. `CPR_CERT` or `FIRE_DRILL`.
    pub item_type: String,
    pub subject: Option<SubjectRef>,
    /// Direct house affinity; falls back to the subject's house when `None`.
    pub house_uuid: Option<HouseId>,
    pub due_date: NaiveDate,
    pub status: ObligationStatus,
}

impl ComplianceItem {
    pub fn new(
        title: impl Into<String>,
        item_type: impl Into<String>,
        subject: Option<SubjectRef>,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            item_type: item_type.into(),
            subject,
            house_uuid: None,
            due_date,
            status: ObligationStatus::Pending,
        }
    }
}

/// Compliance item read model with subject name and resolved house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedComplianceItem {
    pub item: ComplianceItem,
    pub subject_name: Option<String>,
    pub house_uuid: HouseId,
}

/// Who a task is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAssignment {
    /// No role list stored; every role matches.
    Unrestricted,
    /// Explicit role list; may be empty, in which case nobody matches.
    Roles(BTreeSet<UserRole>),
    /// Stored text could not be parsed; nobody matches.
    Malformed(String),
}

impl RoleAssignment {
    pub fn roles(roles: impl IntoIterator<Item = UserRole>) -> Self {
        Self::Roles(roles.into_iter().collect())
    }

    /// Parses a stored role list.
    ///
    /// Accepted shapes:
    /// - `NULL` or blank: unrestricted.
    /// - JSON array of role names, e.g. `["admin","house_manager"]`.
    /// - Legacy comma-separated names, e.g. `admin, care_staff`.
    ///
    /// Unknown role names make the whole list malformed.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unrestricted;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Unrestricted;
        }

        let names: Vec<String> = if trimmed.starts_with('[') {
            match serde_json::from_str::<Vec<String>>(trimmed) {
                Ok(names) => names,
                Err(_) => return Self::Malformed(raw.to_string()),
            }
        } else if ROLE_CSV_RE.is_match(trimmed) {
            trimmed.split(',').map(|name| name.to_string()).collect()
        } else {
            return Self::Malformed(raw.to_string());
        };

        let mut roles = BTreeSet::new();
        for name in &names {
            match UserRole::parse(name) {
                Some(role) => {
                    roles.insert(role);
                }
                None => return Self::Malformed(raw.to_string()),
            }
        }
        Self::Roles(roles)
    }

    /// Encodes the assignment for storage. Malformed values keep their raw text.
    pub fn to_db(&self) -> Option<String> {
        match self {
            Self::Unrestricted => None,
            Self::Roles(roles) => {
                let names: Vec<&str> = roles.iter().map(|role| role.as_str()).collect();
                serde_json::to_string(&names).ok()
            }
            Self::Malformed(raw) => Some(raw.clone()),
        }
    }

    pub fn matches(&self, role: UserRole) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Roles(roles) => roles.contains(&role),
            Self::Malformed(_) => false,
        }
    }
}

/// Role-addressed task. Tasks with no house are organization-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub uuid: ObligationId,
    pub title: String,
    pub house_uuid: Option<HouseId>,
    pub assigned_roles: RoleAssignment,
    pub due_date: NaiveDate,
    pub status: ObligationStatus,
}

impl Task {
    pub fn new(title: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            house_uuid: None,
            assigned_roles: RoleAssignment::Unrestricted,
            due_date,
            status: ObligationStatus::Pending,
        }
    }
}

/// Identity of one satisfied recurring occurrence for a subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompletionKey {
    pub obligation_type: String,
    pub occurrence_index: u32,
}

impl CompletionKey {
    pub fn new(obligation_type: impl Into<String>, occurrence_index: u32) -> Self {
        Self {
            obligation_type: obligation_type.into(),
            occurrence_index,
        }
    }
}

/// Marks that a derived occurrence was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub subject: SubjectRef,
    pub key: CompletionKey,
    pub completed_on: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::{ObligationStatus, RoleAssignment};
    use crate::model::directory::UserRole;

    #[test]
    fn role_list_accepts_json_and_legacy_csv() {
        let json = RoleAssignment::parse(Some(r#"["admin","house_manager"]"#));
        assert!(json.matches(UserRole::Admin));
        assert!(json.matches(UserRole::HouseManager));
        assert!(!json.matches(UserRole::CareStaff));

        let csv = RoleAssignment::parse(Some("care_staff , viewer"));
        assert!(csv.matches(UserRole::CareStaff));
        assert!(csv.matches(UserRole::Viewer));
        assert!(!csv.matches(UserRole::Admin));
    }

    #[test]
    fn missing_role_list_is_unrestricted() {
        assert_eq!(RoleAssignment::parse(None), RoleAssignment::Unrestricted);
        assert_eq!(
            RoleAssignment::parse(Some("   ")),
            RoleAssignment::Unrestricted
        );
        assert!(RoleAssignment::Unrestricted.matches(UserRole::Viewer));
    }

    #[test]
    fn malformed_role_list_matches_nobody() {
        for raw in ["[\"admin\"", "admin;;staff", "[\"admin\",\"janitor\"]", "[1,2]"] {
            let parsed = RoleAssignment::parse(Some(raw));
            assert!(
                matches!(parsed, RoleAssignment::Malformed(_)),
                "{raw} should be malformed"
            );
            assert!(!parsed.matches(UserRole::Admin));
        }
    }

    #[test]
    fn empty_json_list_matches_nobody() {
        let parsed = RoleAssignment::parse(Some("[]"));
        assert!(!parsed.matches(UserRole::Admin));
    }

    #[test]
    fn role_list_storage_form_parses_back() {
        let assignment = RoleAssignment::roles([UserRole::CareStaff, UserRole::Admin]);
        let stored = assignment.to_db().expect("explicit roles are stored");
        assert_eq!(stored, r#"["admin","care_staff"]"#);
        assert_eq!(RoleAssignment::parse(Some(&stored)), assignment);
    }

    #[test]
    fn completed_is_the_only_closed_status() {
        assert!(ObligationStatus::Pending.is_open());
        assert!(ObligationStatus::Overdue.is_open());
        assert!(!ObligationStatus::Completed.is_open());
    }
}
