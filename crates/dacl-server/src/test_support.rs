//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dacl_domain::names::normalize;
use dacl_domain::{DomainError, DomainResult, GroupEntry, GroupLookup, ResourceAcl};
use dacl_storage::{
    DirectoryStore, GroupRecord, MemoryDirectoryStore, RoleRef, StorageError, StorageResult,
    UserRecord,
};
use parking_lot::RwLock;

use crate::evaluator::ItemFormulaEvaluator;
use crate::sources::{AclEntry, DirectorySource, PersonEntry, SecurityMetadataSource};

/// Directory backed by maps, with switchable failures.
#[derive(Default)]
pub(crate) struct MockDirectory {
    groups: RwLock<BTreeMap<String, GroupEntry>>,
    people: RwLock<BTreeMap<String, PersonEntry>>,
    passwords: RwLock<HashMap<String, String>>,
    failing_lookups: RwLock<HashSet<String>>,
    views_unavailable: AtomicBool,
    refreshes: AtomicUsize,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&self, name: &str, members: &[&str]) {
        self.add_typed_group(name, "0", members);
    }

    pub fn add_typed_group(&self, name: &str, group_type: &str, members: &[&str]) {
        self.groups.write().insert(
            normalize(name),
            GroupEntry::new(name, group_type, members.iter().copied()),
        );
    }

    pub fn remove_group(&self, name: &str) {
        self.groups.write().remove(&normalize(name));
    }

    pub fn add_person(&self, canonical: &str, short_name: &str) {
        self.add_person_entry(person(canonical, short_name));
    }

    pub fn add_person_entry(&self, person: PersonEntry) {
        let key = person.full_name().map(normalize).unwrap_or_default();
        self.people.write().insert(key, person);
    }

    pub fn remove_person(&self, canonical: &str) {
        self.people.write().remove(&normalize(canonical));
    }

    pub fn set_password(&self, canonical: &str, password: &str) {
        self.passwords
            .write()
            .insert(normalize(canonical), password.to_string());
    }

    /// Makes every lookup of `name` fail.
    pub fn fail_lookup(&self, name: &str) {
        self.failing_lookups.write().insert(normalize(name));
    }

    pub fn set_views_unavailable(&self, unavailable: bool) {
        self.views_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn check_lookup(&self, name: &str) -> DomainResult<()> {
        if self.failing_lookups.read().contains(&normalize(name)) {
            return Err(DomainError::LookupFailed {
                name: name.to_string(),
                message: "simulated lookup failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_views(&self, view: &str) -> DomainResult<()> {
        if self.views_unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::LookupFailed {
                name: view.to_string(),
                message: "view cannot be opened".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn person(canonical: &str, short_name: &str) -> PersonEntry {
    PersonEntry::new(canonical).with_item("ShortName", short_name)
}

/// Evaluator used by most tests: principal is the short name, everyone is selected.
pub(crate) fn short_name_evaluator() -> Arc<ItemFormulaEvaluator> {
    Arc::new(ItemFormulaEvaluator::new("@LowerCase(ShortName)", "@True").unwrap())
}

#[async_trait]
impl GroupLookup for MockDirectory {
    async fn lookup_group(&self, name: &str) -> DomainResult<Option<GroupEntry>> {
        self.check_lookup(name)?;
        Ok(self.groups.read().get(&normalize(name)).cloned())
    }
}

#[async_trait]
impl DirectorySource for MockDirectory {
    async fn list_groups(&self) -> DomainResult<Vec<GroupEntry>> {
        self.check_views("groups")?;
        Ok(self.groups.read().values().cloned().collect())
    }

    async fn list_people(&self) -> DomainResult<Vec<PersonEntry>> {
        self.check_views("people")?;
        Ok(self.people.read().values().cloned().collect())
    }

    async fn lookup_person(&self, canonical_name: &str) -> DomainResult<Option<PersonEntry>> {
        self.check_lookup(canonical_name)?;
        Ok(self.people.read().get(&normalize(canonical_name)).cloned())
    }

    async fn server_access_groups(&self, name: &str) -> DomainResult<Vec<String>> {
        self.check_lookup(name)?;
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
        self.check_lookup(canonical_name)?;
        Ok(self
            .passwords
            .read()
            .get(&normalize(canonical_name))
            .is_some_and(|expected| expected == password))
    }

    async fn refresh_views(&self) -> DomainResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Security metadata backed by maps, counting ACL reads.
#[derive(Default)]
pub(crate) struct MockMetadata {
    acls: RwLock<HashMap<String, ResourceAcl>>,
    readers: RwLock<HashMap<(String, String), Vec<String>>>,
    entries: RwLock<HashMap<String, Vec<AclEntry>>>,
    acl_reads: AtomicUsize,
}

impl MockMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_acl(&self, acl: ResourceAcl) {
        self.acls.write().insert(acl.resource_id.to_uppercase(), acl);
    }

    pub fn set_readers(&self, resource_id: &str, content_id: &str, readers: &[&str]) {
        self.readers.write().insert(
            (resource_id.to_uppercase(), content_id.to_uppercase()),
            readers.iter().map(|r| r.to_string()).collect(),
        );
    }

    pub fn set_entries(&self, resource_id: &str, entries: Vec<AclEntry>) {
        self.entries.write().insert(resource_id.to_uppercase(), entries);
    }

    pub fn acl_reads(&self) -> usize {
        self.acl_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecurityMetadataSource for MockMetadata {
    async fn resource_acl(&self, resource_id: &str) -> DomainResult<ResourceAcl> {
        self.acl_reads.fetch_add(1, Ordering::SeqCst);
        self.acls
            .read()
            .get(&resource_id.to_uppercase())
            .cloned()
            .ok_or_else(|| DomainError::MetadataUnavailable {
                resource_id: resource_id.to_string(),
                message: "resource cannot be opened".to_string(),
            })
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
            .ok_or_else(|| DomainError::MetadataUnavailable {
                resource_id: resource_id.to_string(),
                message: "resource cannot be opened".to_string(),
            })
    }
}

/// Store wrapper whose user reads can be switched to fail.
pub(crate) struct FlakyStore {
    inner: Arc<MemoryDirectoryStore>,
    user_reads_fail: AtomicBool,
    user_role_writes_vanish: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryDirectoryStore>) -> Self {
        Self {
            inner,
            user_reads_fail: AtomicBool::new(false),
            user_role_writes_vanish: AtomicBool::new(false),
        }
    }

    pub fn set_user_reads_fail(&self, fail: bool) {
        self.user_reads_fail.store(fail, Ordering::SeqCst);
    }

    /// Role writes for users report the user as already removed.
    pub fn set_user_role_writes_vanish(&self, vanish: bool) {
        self.user_role_writes_vanish.store(vanish, Ordering::SeqCst);
    }

    fn check_user_read(&self) -> StorageResult<()> {
        if self.user_reads_fail.load(Ordering::SeqCst) {
            return Err(StorageError::Internal {
                message: "simulated user table outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for FlakyStore {
    async fn get_user(&self, principal_id: &str) -> StorageResult<Option<UserRecord>> {
        self.check_user_read()?;
        self.inner.get_user(principal_id).await
    }

    async fn find_user_by_name(&self, name: &str) -> StorageResult<Option<UserRecord>> {
        self.check_user_read()?;
        self.inner.find_user_by_name(name).await
    }

    async fn list_users(&self) -> StorageResult<Vec<UserRecord>> {
        self.inner.list_users().await
    }

    async fn upsert_user(&self, user: UserRecord) -> StorageResult<()> {
        self.inner.upsert_user(user).await
    }

    async fn delete_user(&self, principal_id: &str) -> StorageResult<bool> {
        self.inner.delete_user(principal_id).await
    }

    async fn get_group(&self, name: &str) -> StorageResult<Option<GroupRecord>> {
        self.inner.get_group(name).await
    }

    async fn list_groups(&self) -> StorageResult<Vec<GroupRecord>> {
        self.inner.list_groups().await
    }

    async fn upsert_group(&self, group: GroupRecord) -> StorageResult<()> {
        self.inner.upsert_group(group).await
    }

    async fn delete_group(&self, name: &str) -> StorageResult<bool> {
        self.inner.delete_group(name).await
    }

    async fn parent_groups(&self, name: &str) -> StorageResult<Vec<String>> {
        self.inner.parent_groups(name).await
    }

    async fn upsert_role(&self, role: RoleRef) -> StorageResult<()> {
        self.inner.upsert_role(role).await
    }

    async fn roles(&self, resource_id: &str) -> StorageResult<Vec<RoleRef>> {
        self.inner.roles(resource_id).await
    }

    async fn set_user_roles(
        &self,
        principal_id: &str,
        resource_id: &str,
        labels: BTreeSet<String>,
    ) -> StorageResult<()> {
        if self.user_role_writes_vanish.load(Ordering::SeqCst) {
            return Err(StorageError::UserNotFound {
                principal_id: principal_id.to_string(),
            });
        }
        self.inner.set_user_roles(principal_id, resource_id, labels).await
    }

    async fn set_group_roles(
        &self,
        group: &str,
        resource_id: &str,
        labels: BTreeSet<String>,
    ) -> StorageResult<()> {
        self.inner.set_group_roles(group, resource_id, labels).await
    }

    async fn user_roles(&self, principal_id: &str) -> StorageResult<Vec<RoleRef>> {
        self.inner.user_roles(principal_id).await
    }

    async fn group_roles(&self, group: &str) -> StorageResult<Vec<RoleRef>> {
        self.inner.group_roles(group).await
    }

    async fn last_sync(&self) -> StorageResult<Option<DateTime<Utc>>> {
        self.inner.last_sync().await
    }

    async fn set_last_sync(&self, at: DateTime<Utc>) -> StorageResult<()> {
        self.inner.set_last_sync(at).await
    }

    async fn is_empty(&self) -> StorageResult<bool> {
        self.inner.is_empty().await
    }
}
