//! Collaborator traits implemented by the embedding application.
//!
//! The directory, the person formula engine and the per-resource security
//! metadata all live outside this crate. The synchronizer and the engines
//! only see them through these traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dacl_domain::{DomainResult, GroupEntry, GroupLookup, ResourceAcl};

/// Item holding a person's full (canonical) name.
pub const FULL_NAME_ITEM: &str = "fullname";

/// A person record as read from the directory.
///
/// Items are keyed case-insensitively. The full-name item may hold several
/// values; the first one is the canonical name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonEntry {
    items: BTreeMap<String, Vec<String>>,
}

impl PersonEntry {
    /// Creates a person with the given canonical full name.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self::default().with_item(FULL_NAME_ITEM, full_name)
    }

    /// Creates a person without any items.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends a value to an item.
    pub fn with_item(mut self, name: &str, value: impl Into<String>) -> Self {
        self.items
            .entry(name.trim().to_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// First value of an item.
    pub fn item(&self, name: &str) -> Option<&str> {
        self.items
            .get(&name.trim().to_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of an item.
    pub fn item_values(&self, name: &str) -> &[String] {
        self.items
            .get(&name.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The canonical full name, if present and non-blank.
    pub fn full_name(&self) -> Option<&str> {
        self.item(FULL_NAME_ITEM).filter(|name| !name.trim().is_empty())
    }
}

/// Read access to the live directory.
///
/// `list_groups` and `list_people` open whole directory views; an error from
/// either is treated as the directory being unavailable.
#[async_trait]
pub trait DirectorySource: GroupLookup {
    /// Every group record in the directory.
    async fn list_groups(&self) -> DomainResult<Vec<GroupEntry>>;

    /// Every person record in the directory.
    async fn list_people(&self) -> DomainResult<Vec<PersonEntry>>;

    /// Looks up a person by canonical name.
    async fn lookup_person(&self, canonical_name: &str) -> DomainResult<Option<PersonEntry>>;

    /// Names of the groups listing `name` as an immediate member.
    async fn server_access_groups(&self, name: &str) -> DomainResult<Vec<String>>;

    /// Checks a password against the person's directory record.
    async fn verify_password(&self, canonical_name: &str, password: &str) -> DomainResult<bool>;

    /// Reopens cached view handles after a read failure.
    async fn refresh_views(&self) -> DomainResult<()>;
}

/// Evaluates the configured formulas against a person record.
pub trait PersonEvaluator: Send + Sync {
    /// The principal id the person authenticates as. May be empty.
    fn principal_name(&self, person: &PersonEntry) -> DomainResult<String>;

    /// Numeric selection result; any non-zero value selects the person.
    fn selection(&self, person: &PersonEntry) -> DomainResult<f64>;
}

/// One entry of a resource ACL together with the roles it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    /// A person name (any form) or a group name.
    pub name: String,
    /// Role labels, bracketed or bare.
    pub roles: Vec<String>,
}

impl AclEntry {
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Live security metadata of resources and documents.
#[async_trait]
pub trait SecurityMetadataSource: Send + Sync {
    /// The resource ACL, including role definitions.
    async fn resource_acl(&self, resource_id: &str) -> DomainResult<ResourceAcl>;

    /// The reader list of a document, or `None` when it has none.
    async fn reader_list(
        &self,
        resource_id: &str,
        content_id: &str,
    ) -> DomainResult<Option<Vec<String>>>;

    /// Every ACL entry of a resource with the roles it grants.
    async fn acl_entries(&self, resource_id: &str) -> DomainResult<Vec<AclEntry>>;
}
