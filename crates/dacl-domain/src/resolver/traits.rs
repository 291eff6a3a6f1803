//! Directory lookup capability needed by the resolver.

use async_trait::async_trait;

use crate::error::DomainResult;

/// A group record as read from the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    /// Group name as stored in the directory.
    pub name: String,
    /// Group type classification (e.g. "0" multi-purpose, "1" mail only).
    pub group_type: String,
    /// Immediate member names: persons, groups or unresolvable leftovers.
    pub members: Vec<String>,
}

impl GroupEntry {
    pub fn new<I, S>(name: impl Into<String>, group_type: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            group_type: group_type.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Looks up group records by name.
#[async_trait]
pub trait GroupLookup: Send + Sync {
    /// Returns the group named `name`, or `None` if no such group exists.
    async fn lookup_group(&self, name: &str) -> DomainResult<Option<GroupEntry>>;
}
