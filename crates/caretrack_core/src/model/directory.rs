//! Users, houses and the fixed role enumeration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a back-office user.
pub type UserId = Uuid;

/// Stable identifier for a managed residential unit.
pub type HouseId = Uuid;

/// Fixed role enumeration for back-office users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Organization administrator; sees every house.
    Admin,
    /// Manager of one or more assigned houses.
    HouseManager,
    /// Direct care staff working in assigned houses.
    CareStaff,
    /// Read-only reviewer (auditors, case workers).
    Viewer,
}

impl UserRole {
    /// Returns the persisted text form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::HouseManager => "house_manager",
            Self::CareStaff => "care_staff",
            Self::Viewer => "viewer",
        }
    }

    /// Parses a persisted role name. Matching is case-insensitive and
    /// ignores surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "house_manager" => Some(Self::HouseManager),
            "care_staff" => Some(Self::CareStaff),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Whether this role bypasses house assignments.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// A managed residential unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub uuid: HouseId,
    pub name: String,
}

impl House {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Back-office user as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: UserId,
    pub display_name: String,
    pub role: UserRole,
}

impl User {
    pub fn new(display_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            display_name: display_name.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UserRole;

    #[test]
    fn role_parse_accepts_persisted_names() {
        for role in [
            UserRole::Admin,
            UserRole::HouseManager,
            UserRole::CareStaff,
            UserRole::Viewer,
        ] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse(" Admin "), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("superuser"), None);
    }

    #[test]
    fn only_admin_is_admin() {
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::HouseManager.is_admin());
        assert!(!UserRole::Viewer.is_admin());
    }
}
