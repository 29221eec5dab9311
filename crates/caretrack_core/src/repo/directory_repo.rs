//! Directory repository: users, houses and house assignments.
//!
//! # Invariants
//! - Users with an unknown persisted role are never returned.
//! - House id lists are sorted for deterministic scope resolution.

use crate::model::directory::{House, HouseId, User, UserId, UserRole};
use crate::repo::{ensure_schema_ready, keep_valid, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Repository interface for identity and visibility data.
pub trait DirectoryRepository {
    fn create_house(&self, house: &House) -> RepoResult<HouseId>;
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    /// Adds one Assignment row. Re-assigning the same pair is a no-op.
    fn assign_house(&self, user: UserId, house: HouseId) -> RepoResult<()>;
    /// Lists users ordered by display name.
    fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Lists every house id in the store.
    fn list_house_ids(&self) -> RepoResult<Vec<HouseId>>;
    /// Lists house ids explicitly assigned to one user.
    fn list_assigned_house_ids(&self, user: UserId) -> RepoResult<Vec<HouseId>>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn create_house(&self, house: &House) -> RepoResult<HouseId> {
        self.conn.execute(
            "INSERT INTO houses (uuid, name) VALUES (?1, ?2);",
            params![house.uuid.to_string(), house.name.as_str()],
        )?;
        Ok(house.uuid)
    }

    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        self.conn.execute(
            "INSERT INTO users (uuid, display_name, role) VALUES (?1, ?2, ?3);",
            params![
                user.uuid.to_string(),
                user.display_name.as_str(),
                user.role.as_str(),
            ],
        )?;
        Ok(user.uuid)
    }

    fn assign_house(&self, user: UserId, house: HouseId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO user_houses (user_uuid, house_uuid) VALUES (?1, ?2);",
            params![user.to_string(), house.to_string()],
        )?;
        Ok(())
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, display_name, role
             FROM users
             ORDER BY display_name ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            keep_valid(parse_user_row(row), &mut users, "directory")?;
        }
        Ok(users)
    }

    fn list_house_ids(&self) -> RepoResult<Vec<HouseId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uuid FROM houses ORDER BY uuid ASC;")?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            keep_valid(parse_uuid(&text, "houses.uuid"), &mut ids, "directory")?;
        }
        Ok(ids)
    }

    fn list_assigned_house_ids(&self, user: UserId) -> RepoResult<Vec<HouseId>> {
        let mut stmt = self.conn.prepare(
            "SELECT house_uuid
             FROM user_houses
             WHERE user_uuid = ?1
             ORDER BY house_uuid ASC;",
        )?;
        let mut rows = stmt.query([user.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            keep_valid(
                parse_uuid(&text, "user_houses.house_uuid"),
                &mut ids,
                "directory",
            )?;
        }
        Ok(ids)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let role_text: String = row.get("role")?;
    let role = UserRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "unknown role `{role_text}` in users.role for {uuid_text}"
        ))
    })?;

    Ok(User {
        uuid: parse_uuid(&uuid_text, "users.uuid")?,
        display_name: row.get("display_name")?,
        role,
    })
}
