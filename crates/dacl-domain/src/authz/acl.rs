//! Database and document level access checks.

use std::collections::BTreeSet;

use crate::names::{normalize, DirectoryName};

use super::roles::enabled_roles;
use super::Decision;

/// Permit-list entry granting access to every authenticated principal.
pub const DEFAULT_ENTRY: &str = "-default-";

/// Security metadata of one resource (database).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceAcl {
    pub resource_id: String,
    /// Names explicitly denied access.
    pub deny_users: Vec<String>,
    /// Names explicitly permitted, possibly including [`DEFAULT_ENTRY`].
    pub permit_users: Vec<String>,
    /// Groups (and OU wildcards) permitted.
    pub permit_groups: Vec<String>,
    /// Role definitions, `[label]~member~...~`.
    pub role_definitions: Vec<String>,
}

impl ResourceAcl {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Default::default()
        }
    }

    pub fn has_roles(&self) -> bool {
        !self.role_definitions.is_empty()
    }
}

/// Normalized credentials of a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Normalized name forms (canonical, abbreviated, common).
    pub names: Vec<String>,
    /// Normalized resolved groups, including OU wildcard entries.
    pub groups: BTreeSet<String>,
}

impl Credentials {
    pub fn new<I, S>(name: &DirectoryName, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: name.normalized_forms(),
            groups: groups.into_iter().map(|g| normalize(g.as_ref())).collect(),
        }
    }

    /// Every credential string: names followed by groups.
    pub fn all(&self) -> impl Iterator<Item = &String> + Clone {
        self.names.iter().chain(self.groups.iter())
    }

    fn matches_name(&self, entries: &[String]) -> bool {
        entries
            .iter()
            .any(|entry| self.names.contains(&normalize(entry)))
    }

    fn matches_group(&self, entries: &[String]) -> bool {
        entries
            .iter()
            .any(|entry| self.groups.contains(&normalize(entry)))
    }
}

/// Resource level check.
///
/// Deny list wins over everything; the permit list (or `default_entry` on
/// it) and the permit-group list grant; anything else is denied.
pub fn check_database_access(
    acl: &ResourceAcl,
    credentials: &Credentials,
    default_entry: &str,
) -> Decision {
    if credentials.matches_name(&acl.deny_users) {
        return Decision::Deny;
    }
    let default_entry = normalize(default_entry);
    if acl
        .permit_users
        .iter()
        .any(|entry| normalize(entry) == default_entry)
        || credentials.matches_name(&acl.permit_users)
    {
        return Decision::Allow;
    }
    if credentials.matches_group(&acl.permit_groups) {
        return Decision::Allow;
    }
    Decision::Deny
}

/// Document level check against a reader list.
///
/// Roles are expanded only when the resource declares any.
pub fn check_document_access(
    acl: &ResourceAcl,
    readers: &[String],
    credentials: &Credentials,
) -> Decision {
    let readers: BTreeSet<String> = readers.iter().map(|r| normalize(r)).collect();

    if credentials.all().any(|credential| readers.contains(credential)) {
        return Decision::Allow;
    }

    if acl.has_roles() {
        let roles = enabled_roles(&acl.role_definitions, credentials.all());
        if roles.iter().any(|role| readers.contains(role)) {
            return Decision::Allow;
        }
    }

    Decision::Deny
}
