//! Shared fixtures for dacl-server integration tests.
//!
//! An in-memory directory and security metadata source, plus the "galaxy"
//! directory used across the scenario tests.

// Allow dead_code because helpers are used across different test files.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use dacl_domain::names::normalize;
use dacl_domain::{DomainError, DomainResult, GroupEntry, GroupLookup, ResourceAcl};
use dacl_server::{AclEntry, DirectorySource, PersonEntry, SecurityMetadataSource};

// =============================================================================
// Test Constants
// =============================================================================

/// Resource holding the roles used by the scenarios.
pub const COUNCIL_DB: &str = "85257608004F5587";

/// A document restricted by a reader list.
pub const BATTLE_PLANS: &str = "9F8E7D6C5B4A392817263544536271AB";

/// A document without a reader list.
pub const CANTINA_MENU: &str = "0123456789ABCDEF0123456789ABCDEF";

pub const ANAKIN: &str = "CN=Anakin Skywalker/OU=North/OU=West/O=ABC";
pub const YODA: &str = "CN=Yoda/OU=Dagobah/OU=West/O=ABC";
pub const MAUL: &str = "CN=Darth Maul/OU=South/O=ABC";

/// Builds a document id on the council resource.
pub fn council_doc(content_id: &str) -> String {
    format!("http://jedi.example.com/{COUNCIL_DB}/0/{content_id}")
}

// =============================================================================
// Directory
// =============================================================================

/// Directory held in memory; names are matched case-insensitively.
#[derive(Default)]
pub struct InMemoryDirectory {
    groups: RwLock<BTreeMap<String, GroupEntry>>,
    people: RwLock<BTreeMap<String, PersonEntry>>,
    passwords: RwLock<HashMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_group(&self, name: &str, group_type: &str, members: &[&str]) {
        self.groups.write().insert(
            normalize(name),
            GroupEntry::new(name, group_type, members.iter().copied()),
        );
    }

    pub fn put_person(&self, canonical: &str, short_name: &str, department: &str) {
        let person = PersonEntry::new(canonical)
            .with_item("ShortName", short_name)
            .with_item("Department", department);
        self.people.write().insert(normalize(canonical), person);
    }

    pub fn set_password(&self, canonical: &str, password: &str) {
        self.passwords
            .write()
            .insert(normalize(canonical), password.to_string());
    }
}

#[async_trait]
impl GroupLookup for InMemoryDirectory {
    async fn lookup_group(&self, name: &str) -> DomainResult<Option<GroupEntry>> {
        Ok(self.groups.read().get(&normalize(name)).cloned())
    }
}

#[async_trait]
impl DirectorySource for InMemoryDirectory {
    async fn list_groups(&self) -> DomainResult<Vec<GroupEntry>> {
        Ok(self.groups.read().values().cloned().collect())
    }

    async fn list_people(&self) -> DomainResult<Vec<PersonEntry>> {
        Ok(self.people.read().values().cloned().collect())
    }

    async fn lookup_person(&self, canonical_name: &str) -> DomainResult<Option<PersonEntry>> {
        Ok(self.people.read().get(&normalize(canonical_name)).cloned())
    }

    async fn server_access_groups(&self, name: &str) -> DomainResult<Vec<String>> {
        let name = normalize(name);
        Ok(self
            .groups
            .read()
            .values()
            .filter(|group| group.members.iter().any(|m| normalize(m) == name))
            .map(|group| group.name.clone())
            .collect())
    }

    async fn verify_password(&self, canonical_name: &str, password: &str) -> DomainResult<bool> {
        Ok(self
            .passwords
            .read()
            .get(&normalize(canonical_name))
            .is_some_and(|expected| expected == password))
    }

    async fn refresh_views(&self) -> DomainResult<()> {
        Ok(())
    }
}

// =============================================================================
// Security metadata
// =============================================================================

/// ACLs, reader lists and ACL entries held in memory.
#[derive(Default)]
pub struct InMemoryMetadata {
    acls: RwLock<HashMap<String, ResourceAcl>>,
    readers: RwLock<HashMap<(String, String), Vec<String>>>,
    entries: RwLock<HashMap<String, Vec<AclEntry>>>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_acl(&self, acl: ResourceAcl, entries: Vec<AclEntry>) {
        let resource_id = acl.resource_id.to_uppercase();
        self.entries.write().insert(resource_id.clone(), entries);
        self.acls.write().insert(resource_id, acl);
    }

    pub fn put_readers(&self, resource_id: &str, content_id: &str, readers: &[&str]) {
        self.readers.write().insert(
            (resource_id.to_uppercase(), content_id.to_uppercase()),
            readers.iter().map(|r| r.to_string()).collect(),
        );
    }

    fn unavailable(resource_id: &str) -> DomainError {
        DomainError::MetadataUnavailable {
            resource_id: resource_id.to_string(),
            message: "unknown resource".to_string(),
        }
    }
}

#[async_trait]
impl SecurityMetadataSource for InMemoryMetadata {
    async fn resource_acl(&self, resource_id: &str) -> DomainResult<ResourceAcl> {
        self.acls
            .read()
            .get(&resource_id.to_uppercase())
            .cloned()
            .ok_or_else(|| Self::unavailable(resource_id))
    }

    async fn reader_list(
        &self,
        resource_id: &str,
        content_id: &str,
    ) -> DomainResult<Option<Vec<String>>> {
        Ok(self
            .readers
            .read()
            .get(&(resource_id.to_uppercase(), content_id.to_uppercase()))
            .cloned())
    }

    async fn acl_entries(&self, resource_id: &str) -> DomainResult<Vec<AclEntry>> {
        self.entries
            .read()
            .get(&resource_id.to_uppercase())
            .cloned()
            .ok_or_else(|| Self::unavailable(resource_id))
    }
}

// =============================================================================
// Scenario
// =============================================================================

/// `masters` inside `jedi` inside `good guys`, with a mail-only group that
/// must never reach the cache.
pub fn galaxy_directory() -> Arc<InMemoryDirectory> {
    let directory = Arc::new(InMemoryDirectory::new());
    directory.put_group("Good Guys", "0", &["Jedi"]);
    directory.put_group("Jedi", "3", &["Masters"]);
    directory.put_group("Masters", "0", &[ANAKIN, YODA]);
    directory.put_group("Sith", "0", &[MAUL]);
    directory.put_group("Holonet Newsletter", "1", &[ANAKIN, MAUL]);
    directory.put_person(ANAKIN, "anakin", "Council");
    directory.put_person(YODA, "yoda", "Council");
    directory.put_person(MAUL, "maul", "Outer Rim");
    directory.set_password(ANAKIN, "younglings");
    directory
}

/// Council resource: good guys may enter, the battle plans are restricted
/// to holders of opinions and tactics experts.
pub fn council_metadata() -> Arc<InMemoryMetadata> {
    let metadata = Arc::new(InMemoryMetadata::new());
    let mut acl = ResourceAcl::new(COUNCIL_DB);
    acl.permit_groups = vec!["Good Guys".to_string(), "Sith".to_string()];
    acl.deny_users = vec!["Jar Jar Binks".to_string()];
    acl.role_definitions = vec![
        "[TacticsExpert]~anakin skywalker~".to_string(),
        "[HolderOfOpinions]~masters~".to_string(),
    ];
    metadata.put_acl(
        acl,
        vec![
            AclEntry::new("Anakin Skywalker", ["[TacticsExpert]"]),
            AclEntry::new("Masters", ["[HolderOfOpinions]"]),
            AclEntry::new("Good Guys", Vec::<String>::new()),
        ],
    );
    metadata.put_readers(COUNCIL_DB, BATTLE_PLANS, &["[TacticsExpert]", "[HolderOfOpinions]"]);
    metadata
}
