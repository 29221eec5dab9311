//! Scope Resolver: which houses a user may see.
//!
//! # Invariants
//! - Admins see every house, with or without Assignment rows.
//! - Any other role sees exactly its assigned houses.
//! - The all-houses list and each user's scope are read at most once per
//!   resolver, which lives for one scheduler run.

use crate::model::directory::{HouseId, User, UserId};
use crate::repo::directory_repo::DirectoryRepository;
use crate::repo::RepoResult;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

/// Memoizing scope resolver bound to one directory repository.
pub struct ScopeResolver<'repo, D: DirectoryRepository> {
    directory: &'repo D,
    all_houses: RefCell<Option<BTreeSet<HouseId>>>,
    resolved: RefCell<HashMap<UserId, BTreeSet<HouseId>>>,
}

impl<'repo, D: DirectoryRepository> ScopeResolver<'repo, D> {
    pub fn new(directory: &'repo D) -> Self {
        Self {
            directory,
            all_houses: RefCell::new(None),
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the set of house ids visible to `user`.
    pub fn resolve_scope(&self, user: &User) -> RepoResult<BTreeSet<HouseId>> {
        if let Some(scope) = self.resolved.borrow().get(&user.uuid) {
            return Ok(scope.clone());
        }

        let scope = if user.role.is_admin() {
            self.all_houses()?
        } else {
            self.directory
                .list_assigned_house_ids(user.uuid)?
                .into_iter()
                .collect()
        };

        self.resolved
            .borrow_mut()
            .insert(user.uuid, scope.clone());
        Ok(scope)
    }

    fn all_houses(&self) -> RepoResult<BTreeSet<HouseId>> {
        if let Some(houses) = self.all_houses.borrow().as_ref() {
            return Ok(houses.clone());
        }
        let houses: BTreeSet<HouseId> = self.directory.list_house_ids()?.into_iter().collect();
        *self.all_houses.borrow_mut() = Some(houses.clone());
        Ok(houses)
    }
}
