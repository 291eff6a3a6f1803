//! DirectoryStore trait definition.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StorageError, StorageResult};

/// A cached directory user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable external principal id (e.g. "anakin").
    pub principal_id: String,
    /// Canonical directory name, `CN=.../OU=.../O=...`.
    pub canonical_name: String,
    pub common_name: String,
    pub abbreviated_name: String,
    /// Resolved groups (normalized), including OU and `*/OU` wildcard entries.
    pub groups: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Name forms a directory ACL may use for this user, lower-cased.
    pub fn name_forms(&self) -> Vec<String> {
        let mut forms = Vec::with_capacity(3);
        for form in [&self.canonical_name, &self.abbreviated_name, &self.common_name] {
            let form = form.trim().to_lowercase();
            if !form.is_empty() && !forms.contains(&form) {
                forms.push(form);
            }
        }
        forms
    }

    /// Compares everything except the update timestamp.
    pub fn same_content(&self, other: &UserRecord) -> bool {
        self.principal_id == other.principal_id
            && self.canonical_name == other.canonical_name
            && self.common_name == other.common_name
            && self.abbreviated_name == other.abbreviated_name
            && self.groups == other.groups
    }
}

/// A cached directory group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Normalized group name (primary key).
    pub name: String,
    pub group_type: String,
    /// Immediate member names as read from the directory.
    pub members: Vec<String>,
    /// Transitive closure of access-control child groups. Never contains `name`.
    pub children: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl GroupRecord {
    /// Compares everything except the update timestamp.
    pub fn same_content(&self, other: &GroupRecord) -> bool {
        self.name == other.name
            && self.group_type == other.group_type
            && self.members == other.members
            && self.children == other.children
    }
}

/// A role declared on a resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleRef {
    pub resource_id: String,
    /// Bracketed, lower-cased label, e.g. `[reviewer]`.
    pub label: String,
}

impl RoleRef {
    pub fn new(resource_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            label: label.into(),
        }
    }

    /// Rendering used in principal group output, `<resource>/[label]`.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.resource_id, self.label)
    }
}

/// Maximum length for principal ids and group names.
pub const MAX_NAME_LENGTH: usize = 512;

/// Validates a principal id or group name.
pub fn validate_name(kind: &str, value: &str) -> StorageResult<()> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidInput {
            message: format!("{kind} cannot be empty"),
        });
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!("{kind} exceeds {MAX_NAME_LENGTH} characters"),
        });
    }
    Ok(())
}

/// Validates a group record before it is written.
pub fn validate_group(group: &GroupRecord) -> StorageResult<()> {
    validate_name("group name", &group.name)?;
    if group.children.contains(&group.name) {
        return Err(StorageError::InvalidInput {
            message: format!("group '{}' cannot contain itself", group.name),
        });
    }
    Ok(())
}

/// Abstract interface of the directory cache.
///
/// Implementations must be thread-safe (Send + Sync). Each write replaces a
/// single record atomically; readers may observe a mix of old and new
/// records while a synchronization pass runs.
#[async_trait]
pub trait DirectoryStore: Send + Sync + 'static {
    // User operations

    /// Gets a user by principal id.
    async fn get_user(&self, principal_id: &str) -> StorageResult<Option<UserRecord>>;

    /// Finds a user by any of its directory name forms (case-insensitive).
    async fn find_user_by_name(&self, name: &str) -> StorageResult<Option<UserRecord>>;

    /// Lists all users.
    async fn list_users(&self) -> StorageResult<Vec<UserRecord>>;

    /// Inserts or replaces a user together with its group memberships.
    async fn upsert_user(&self, user: UserRecord) -> StorageResult<()>;

    /// Deletes a user and its role assignments. Returns whether it existed.
    async fn delete_user(&self, principal_id: &str) -> StorageResult<bool>;

    // Group operations

    /// Gets a group by name (case-insensitive).
    async fn get_group(&self, name: &str) -> StorageResult<Option<GroupRecord>>;

    /// Lists all groups.
    async fn list_groups(&self) -> StorageResult<Vec<GroupRecord>>;

    /// Inserts or replaces a group together with its child closure.
    async fn upsert_group(&self, group: GroupRecord) -> StorageResult<()>;

    /// Deletes a group, its role assignments and every membership row
    /// referring to it. Returns whether it existed.
    async fn delete_group(&self, name: &str) -> StorageResult<bool>;

    /// Names of every group whose child closure contains `name`.
    async fn parent_groups(&self, name: &str) -> StorageResult<Vec<String>>;

    // Role operations

    /// Records a role declared on a resource.
    async fn upsert_role(&self, role: RoleRef) -> StorageResult<()>;

    /// Lists the roles declared on a resource.
    async fn roles(&self, resource_id: &str) -> StorageResult<Vec<RoleRef>>;

    /// Replaces the roles a user holds on `resource_id`.
    async fn set_user_roles(
        &self,
        principal_id: &str,
        resource_id: &str,
        labels: BTreeSet<String>,
    ) -> StorageResult<()>;

    /// Replaces the roles a group holds on `resource_id`.
    async fn set_group_roles(
        &self,
        group: &str,
        resource_id: &str,
        labels: BTreeSet<String>,
    ) -> StorageResult<()>;

    /// Roles held directly by a user, across all resources.
    async fn user_roles(&self, principal_id: &str) -> StorageResult<Vec<RoleRef>>;

    /// Roles held by a group, across all resources.
    async fn group_roles(&self, group: &str) -> StorageResult<Vec<RoleRef>>;

    // Synchronization state

    /// Completion time of the last successful synchronization.
    async fn last_sync(&self) -> StorageResult<Option<DateTime<Utc>>>;

    /// Records the completion time of a successful synchronization.
    async fn set_last_sync(&self, at: DateTime<Utc>) -> StorageResult<()>;

    /// Whether the store holds no users and no groups.
    async fn is_empty(&self) -> StorageResult<bool>;
}
