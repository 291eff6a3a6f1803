//! In-memory directory cache.
//!
//! Records are kept in `DashMap`s keyed by normalized (trimmed, lower-case)
//! names, with a secondary index from every user name form to its principal
//! id so ACL entries in any form resolve to a user in O(1).

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::instrument;

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    validate_group, validate_name, DirectoryStore, GroupRecord, RoleRef, UserRecord,
};

fn key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// In-memory implementation of DirectoryStore.
///
/// # Performance Characteristics
///
/// - **Get / upsert / delete user**: O(1) average
/// - **Find user by name**: O(1) average (name-form index)
/// - **Delete group**: O(U + G) - membership rows are scanned and pruned
/// - **Parent groups**: O(G) - linear scan of child closures
#[derive(Debug, Default)]
pub struct MemoryDirectoryStore {
    users: DashMap<String, UserRecord>,
    /// Normalized name form -> principal key.
    names: DashMap<String, String>,
    groups: DashMap<String, GroupRecord>,
    /// Resource id -> declared role labels.
    roles: DashMap<String, BTreeSet<String>>,
    user_roles: DashMap<String, BTreeSet<RoleRef>>,
    group_roles: DashMap<String, BTreeSet<RoleRef>>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl MemoryDirectoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn unindex_names(&self, principal_key: &str, forms: &[String]) {
        for form in forms {
            self.names
                .remove_if(form, |_, owner| owner.as_str() == principal_key);
        }
    }
}

/// Replaces the labels for one resource inside a role set.
fn replace_resource_roles(
    current: &mut BTreeSet<RoleRef>,
    resource_id: &str,
    labels: BTreeSet<String>,
) {
    current.retain(|role| role.resource_id != resource_id);
    current.extend(labels.into_iter().map(|label| RoleRef::new(resource_id, label)));
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn get_user(&self, principal_id: &str) -> StorageResult<Option<UserRecord>> {
        Ok(self.users.get(&key(principal_id)).map(|u| u.value().clone()))
    }

    async fn find_user_by_name(&self, name: &str) -> StorageResult<Option<UserRecord>> {
        let principal_key = match self.names.get(&key(name)) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        Ok(self.users.get(&principal_key).map(|u| u.value().clone()))
    }

    async fn list_users(&self) -> StorageResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.principal_id.cmp(&b.principal_id));
        Ok(users)
    }

    #[instrument(skip(self, user), fields(principal_id = %user.principal_id))]
    async fn upsert_user(&self, user: UserRecord) -> StorageResult<()> {
        validate_name("principal id", &user.principal_id)?;
        validate_name("canonical name", &user.canonical_name)?;

        let principal_key = key(&user.principal_id);
        let forms = user.name_forms();

        // Read the previous record and release the shard before writing
        let previous = self.users.get(&principal_key).map(|u| u.name_forms());
        if let Some(old_forms) = previous {
            let stale: Vec<String> = old_forms
                .into_iter()
                .filter(|form| !forms.contains(form))
                .collect();
            self.unindex_names(&principal_key, &stale);
        }

        self.users.insert(principal_key.clone(), user);
        for form in forms {
            self.names.insert(form, principal_key.clone());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, principal_id: &str) -> StorageResult<bool> {
        let principal_key = key(principal_id);
        let Some((_, removed)) = self.users.remove(&principal_key) else {
            return Ok(false);
        };
        self.unindex_names(&principal_key, &removed.name_forms());
        self.user_roles.remove(&principal_key);
        Ok(true)
    }

    async fn get_group(&self, name: &str) -> StorageResult<Option<GroupRecord>> {
        Ok(self.groups.get(&key(name)).map(|g| g.value().clone()))
    }

    async fn list_groups(&self) -> StorageResult<Vec<GroupRecord>> {
        let mut groups: Vec<GroupRecord> = self.groups.iter().map(|g| g.value().clone()).collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    #[instrument(skip(self, group), fields(group = %group.name))]
    async fn upsert_group(&self, mut group: GroupRecord) -> StorageResult<()> {
        group.name = key(&group.name);
        group.children = group.children.iter().map(|c| key(c)).collect();
        validate_group(&group)?;
        self.groups.insert(group.name.clone(), group);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_group(&self, name: &str) -> StorageResult<bool> {
        let group_key = key(name);
        if self.groups.remove(&group_key).is_none() {
            return Ok(false);
        }
        self.group_roles.remove(&group_key);

        // GroupChildren and UserGroups rows referring to the group
        for mut group in self.groups.iter_mut() {
            group.children.remove(&group_key);
        }
        for mut user in self.users.iter_mut() {
            user.groups.remove(&group_key);
        }
        Ok(true)
    }

    async fn parent_groups(&self, name: &str) -> StorageResult<Vec<String>> {
        let child = key(name);
        let mut parents: Vec<String> = self
            .groups
            .iter()
            .filter(|g| g.children.contains(&child))
            .map(|g| g.name.clone())
            .collect();
        parents.sort();
        Ok(parents)
    }

    async fn upsert_role(&self, role: RoleRef) -> StorageResult<()> {
        validate_name("resource id", &role.resource_id)?;
        validate_name("role label", &role.label)?;
        self.roles
            .entry(role.resource_id)
            .or_default()
            .insert(key(&role.label));
        Ok(())
    }

    async fn roles(&self, resource_id: &str) -> StorageResult<Vec<RoleRef>> {
        Ok(self
            .roles
            .get(resource_id)
            .map(|labels| {
                labels
                    .iter()
                    .map(|label| RoleRef::new(resource_id, label.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_user_roles(
        &self,
        principal_id: &str,
        resource_id: &str,
        labels: BTreeSet<String>,
    ) -> StorageResult<()> {
        let principal_key = key(principal_id);
        if !self.users.contains_key(&principal_key) {
            return Err(StorageError::UserNotFound {
                principal_id: principal_id.to_string(),
            });
        }
        let mut entry = self.user_roles.entry(principal_key).or_default();
        replace_resource_roles(&mut entry, resource_id, labels);
        Ok(())
    }

    async fn set_group_roles(
        &self,
        group: &str,
        resource_id: &str,
        labels: BTreeSet<String>,
    ) -> StorageResult<()> {
        let group_key = key(group);
        if !self.groups.contains_key(&group_key) {
            return Err(StorageError::GroupNotFound {
                name: group.to_string(),
            });
        }
        let mut entry = self.group_roles.entry(group_key).or_default();
        replace_resource_roles(&mut entry, resource_id, labels);
        Ok(())
    }

    async fn user_roles(&self, principal_id: &str) -> StorageResult<Vec<RoleRef>> {
        Ok(self
            .user_roles
            .get(&key(principal_id))
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn group_roles(&self, group: &str) -> StorageResult<Vec<RoleRef>> {
        Ok(self
            .group_roles
            .get(&key(group))
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn last_sync(&self) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(*self.last_sync.read())
    }

    async fn set_last_sync(&self, at: DateTime<Utc>) -> StorageResult<()> {
        *self.last_sync.write() = Some(at);
        Ok(())
    }

    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.users.is_empty() && self.groups.is_empty())
    }
}
