//! Four-pass directory synchronizer implementation.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dacl_domain::authz::role_label;
use dacl_domain::domain_index::WILDCARD_PREFIX;
use dacl_domain::names::normalize;
use dacl_domain::{
    DirectoryName, DomainNameIndex, GroupEntry, NestedGroupResolver, ResolverConfig,
};
use dacl_storage::{
    DirectoryStore, GroupRecord, RoleRef, StorageError, StorageResult, UserRecord,
};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::observability::record_sync_run;
use crate::sources::{DirectorySource, PersonEntry, PersonEvaluator, SecurityMetadataSource};

use super::types::{RoleSyncSummary, SyncError, SyncResult, SyncSummary, MUTATION_LOCK_NAME};

/// Default minimum time between two unforced runs.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// Async lock held for the duration of a single cache write.
struct MutationLock {
    name: &'static str,
    inner: Mutex<()>,
}

impl MutationLock {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(()),
        }
    }

    /// Runs `write` while holding the lock.
    async fn write<F, T>(&self, write: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.inner.lock().await;
        trace!(lock = self.name, "mutation lock acquired");
        write.await
    }
}

/// Rebuilds the directory cache from the live directory.
///
/// Runs are serialized internally; concurrent callers wait for the run in
/// progress and then re-check the interval.
pub struct DirectorySynchronizer {
    directory: Arc<dyn DirectorySource>,
    evaluator: Arc<dyn PersonEvaluator>,
    store: Arc<dyn DirectoryStore>,
    resolver: NestedGroupResolver<dyn DirectorySource>,
    domains: RwLock<DomainNameIndex>,
    interval: Duration,
    run_lock: Mutex<()>,
    mutation: MutationLock,
}

impl DirectorySynchronizer {
    /// Creates a synchronizer with the default resolver configuration and
    /// a one hour interval.
    pub fn new(
        directory: Arc<dyn DirectorySource>,
        evaluator: Arc<dyn PersonEvaluator>,
        store: Arc<dyn DirectoryStore>,
    ) -> Self {
        Self {
            resolver: NestedGroupResolver::new(Arc::clone(&directory)),
            directory,
            evaluator,
            store,
            domains: RwLock::new(DomainNameIndex::new()),
            interval: DEFAULT_INTERVAL,
            run_lock: Mutex::new(()),
            mutation: MutationLock::new(MUTATION_LOCK_NAME),
        }
    }

    /// Replaces the resolver configuration (group types, depth limit).
    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = NestedGroupResolver::with_config(Arc::clone(&self.directory), config);
        self
    }

    /// Sets the minimum time between two unforced runs.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn store(&self) -> &Arc<dyn DirectoryStore> {
        &self.store
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A snapshot of the OU wildcard index.
    pub fn domain_index(&self) -> DomainNameIndex {
        self.domains.read().clone()
    }

    /// Wildcard domains registered under `ou_suffix`.
    pub fn sub_domain_names(&self, ou_suffix: &str) -> BTreeMap<String, u64> {
        self.domains.read().sub_domain_names(ou_suffix)
    }

    /// Runs a synchronization.
    ///
    /// Unless `force` is set, the run is skipped when the interval since the
    /// last successful run has not elapsed and the cache is not empty.
    #[instrument(skip(self))]
    pub async fn sync(&self, force: bool) -> SyncResult<SyncSummary> {
        let _run = self.run_lock.lock().await;
        let start = Instant::now();

        if !force && !self.interval_elapsed().await? {
            debug!(interval_secs = self.interval.as_secs(), "sync interval not elapsed, skipping");
            record_sync_run("skipped", 0.0);
            return Ok(SyncSummary::skipped());
        }

        let mut summary = SyncSummary::default();
        let result = self.run_passes(&mut summary).await;
        summary.elapsed = start.elapsed();

        match result {
            Ok(()) => {
                self.mutation
                    .write(self.store.set_last_sync(Utc::now()))
                    .await?;
                record_sync_run("completed", summary.elapsed.as_secs_f64());
                info!(
                    groups_upserted = summary.groups_upserted,
                    groups_unchanged = summary.groups_unchanged,
                    users_upserted = summary.users_upserted,
                    users_unchanged = summary.users_unchanged,
                    users_deleted = summary.users_deleted,
                    groups_deleted = summary.groups_deleted,
                    records_skipped = summary.records_skipped,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "directory synchronization completed"
                );
                Ok(summary)
            }
            Err(e) => {
                record_sync_run("failed", summary.elapsed.as_secs_f64());
                error!(
                    error = %e,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "directory synchronization failed, cache left unchanged"
                );
                Err(e)
            }
        }
    }

    async fn interval_elapsed(&self) -> SyncResult<bool> {
        if self.store.is_empty().await? {
            return Ok(true);
        }
        let Some(last) = self.store.last_sync().await? else {
            return Ok(true);
        };
        // A timestamp in the future counts as a run that just finished
        let since = Utc::now().signed_duration_since(last);
        Ok(since
            .to_std()
            .map(|since| since >= self.interval)
            .unwrap_or(false))
    }

    async fn run_passes(&self, summary: &mut SyncSummary) -> SyncResult<()> {
        // Both views are opened before anything is written
        let groups = self
            .directory
            .list_groups()
            .await
            .map_err(|source| SyncError::DirectoryUnavailable {
                view: "groups",
                source,
            })?;
        let people = self
            .directory
            .list_people()
            .await
            .map_err(|source| SyncError::DirectoryUnavailable {
                view: "people",
                source,
            })?;
        debug!(
            groups = groups.len(),
            people = people.len(),
            "directory views opened"
        );

        self.sync_groups(groups, summary).await;
        self.sync_people(people, summary).await;
        self.remove_obsolete_users(summary).await?;
        self.remove_obsolete_groups(summary).await?;
        Ok(())
    }

    // ---- Pass 1: groups ----

    async fn sync_groups(&self, groups: Vec<GroupEntry>, summary: &mut SyncSummary) {
        for entry in groups {
            let name = normalize(&entry.name);
            if name.is_empty() {
                warn!("group record without a name, skipping");
                summary.records_skipped += 1;
                self.refresh_views().await;
                continue;
            }
            if !self.resolver.config().is_access_control(&entry.group_type) {
                trace!(group = %name, group_type = %entry.group_type, "not an access-control group");
                continue;
            }

            let children = self.resolver.expand(&entry.name).await;
            let record = GroupRecord {
                name: name.clone(),
                group_type: entry.group_type.trim().to_string(),
                members: entry.members.iter().map(|m| m.trim().to_string()).collect(),
                children,
                updated_at: Utc::now(),
            };

            match self.write_group(record).await {
                Ok(true) => summary.groups_upserted += 1,
                Ok(false) => summary.groups_unchanged += 1,
                Err(e) => {
                    warn!(group = %name, error = %e, "failed to store group, skipping");
                    summary.records_skipped += 1;
                    self.refresh_views().await;
                }
            }
        }
    }

    /// Writes the group unless the cached copy already matches.
    async fn write_group(&self, record: GroupRecord) -> StorageResult<bool> {
        if let Some(existing) = self.store.get_group(&record.name).await? {
            if existing.same_content(&record) {
                return Ok(false);
            }
        }
        self.mutation.write(self.store.upsert_group(record)).await?;
        Ok(true)
    }

    // ---- Pass 2: people ----

    async fn sync_people(&self, people: Vec<PersonEntry>, summary: &mut SyncSummary) {
        for person in people {
            let Some(full_name) = person.full_name() else {
                debug!("person record without a full name, skipping");
                summary.records_skipped += 1;
                continue;
            };

            let principal = match self.evaluator.principal_name(&person) {
                Ok(principal) if !principal.trim().is_empty() => principal,
                Ok(_) => {
                    warn!(person = %full_name, "principal name formula produced no value, skipping");
                    summary.records_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(person = %full_name, error = %e, "principal name formula failed, skipping");
                    summary.records_skipped += 1;
                    continue;
                }
            };

            match self.evaluator.selection(&person) {
                Ok(selection) if selection != 0.0 => {}
                Ok(_) => {
                    self.remove_user(&principal, "no longer selected", summary)
                        .await;
                    continue;
                }
                Err(e) => {
                    warn!(person = %full_name, error = %e, "selection formula failed, skipping");
                    summary.records_skipped += 1;
                    continue;
                }
            }

            let name = match DirectoryName::parse(full_name) {
                Ok(name) => name,
                Err(e) => {
                    warn!(person = %full_name, error = %e, "unparseable full name, skipping");
                    summary.records_skipped += 1;
                    continue;
                }
            };

            let groups = self.resolve_person_groups(&name).await;
            let record = UserRecord {
                principal_id: principal.trim().to_string(),
                canonical_name: name.canonical().to_string(),
                common_name: name.common().to_string(),
                abbreviated_name: name.abbreviated().to_string(),
                groups,
                updated_at: Utc::now(),
            };

            match self.write_user(record).await {
                Ok(true) => summary.users_upserted += 1,
                Ok(false) => summary.users_unchanged += 1,
                Err(e) => {
                    warn!(principal = %principal, error = %e, "failed to store user, skipping");
                    summary.records_skipped += 1;
                    self.refresh_views().await;
                }
            }
        }
    }

    /// Direct groups with their cached ancestors, plus one `ou=` and one
    /// `*/ou=` entry per ancestor OU of the person.
    async fn resolve_person_groups(&self, name: &DirectoryName) -> BTreeSet<String> {
        let mut groups = BTreeSet::new();

        let mut forms = vec![name.canonical()];
        if !name.common().eq_ignore_ascii_case(name.canonical()) {
            forms.push(name.common());
        }

        for form in forms {
            let direct = match self.directory.server_access_groups(form).await {
                Ok(direct) => direct,
                Err(e) => {
                    warn!(name = %form, error = %e, "failed to read direct groups");
                    continue;
                }
            };

            for group in direct {
                let group = normalize(&group);
                // Only groups kept by pass 1 take part in access control
                match self.store.get_group(&group).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        trace!(group = %group, "direct group is not cached, ignoring");
                        continue;
                    }
                    Err(e) => {
                        warn!(group = %group, error = %e, "failed to read cached group");
                        continue;
                    }
                }
                match self.store.parent_groups(&group).await {
                    Ok(parents) => groups.extend(parents),
                    Err(e) => warn!(group = %group, error = %e, "failed to read parent groups"),
                }
                groups.insert(group);
            }
        }

        let wildcards = self.domains.write().register(name.canonical());
        for wildcard in wildcards {
            if let Some(ou) = wildcard.strip_prefix(WILDCARD_PREFIX) {
                groups.insert(ou.to_string());
            }
            groups.insert(wildcard);
        }

        groups
    }

    /// Writes the user unless the cached copy already matches.
    async fn write_user(&self, record: UserRecord) -> StorageResult<bool> {
        if let Some(existing) = self.store.get_user(&record.principal_id).await? {
            if existing.same_content(&record) {
                return Ok(false);
            }
        }
        self.mutation.write(self.store.upsert_user(record)).await?;
        Ok(true)
    }

    async fn remove_user(&self, principal: &str, reason: &str, summary: &mut SyncSummary) {
        match self.mutation.write(self.store.delete_user(principal)).await {
            Ok(true) => {
                summary.users_deleted += 1;
                info!(principal = %principal, reason, "removed user from directory cache");
            }
            Ok(false) => {}
            Err(e) => {
                warn!(principal = %principal, error = %e, "failed to remove user");
                summary.records_skipped += 1;
            }
        }
    }

    // ---- Pass 3: obsolete users ----

    async fn remove_obsolete_users(&self, summary: &mut SyncSummary) -> SyncResult<()> {
        for user in self.store.list_users().await? {
            let reason = match self.directory.lookup_person(&user.canonical_name).await {
                Ok(None) => "absent from directory",
                Ok(Some(person)) => {
                    let selection = self.evaluator.selection(&person);
                    let principal = self.evaluator.principal_name(&person);
                    match (selection, principal) {
                        (Ok(selection), _) if selection == 0.0 => "no longer selected",
                        (Ok(_), Ok(principal))
                            if normalize(&principal) != normalize(&user.principal_id) =>
                        {
                            "principal name changed"
                        }
                        (Ok(_), Ok(_)) => continue,
                        (Err(e), _) | (_, Err(e)) => {
                            warn!(principal = %user.principal_id, error = %e, "formula failed for cached user, keeping it");
                            summary.records_skipped += 1;
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(principal = %user.principal_id, error = %e, "failed to look up cached user, keeping it");
                    summary.records_skipped += 1;
                    continue;
                }
            };
            self.remove_user(&user.principal_id, reason, summary).await;
        }
        Ok(())
    }

    // ---- Pass 4: obsolete groups ----

    async fn remove_obsolete_groups(&self, summary: &mut SyncSummary) -> SyncResult<()> {
        for group in self.store.list_groups().await? {
            let reason = match self.directory.lookup_group(&group.name).await {
                Ok(None) => "absent from directory",
                Ok(Some(entry)) if !self.resolver.config().is_access_control(&entry.group_type) => {
                    "no longer an access-control group"
                }
                Ok(Some(_)) => continue,
                Err(e) => {
                    warn!(group = %group.name, error = %e, "failed to look up cached group, keeping it");
                    summary.records_skipped += 1;
                    continue;
                }
            };

            match self.mutation.write(self.store.delete_group(&group.name)).await {
                Ok(true) => {
                    summary.groups_deleted += 1;
                    info!(group = %group.name, reason, "removed group from directory cache");
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(group = %group.name, error = %e, "failed to remove group");
                    summary.records_skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn refresh_views(&self) {
        if let Err(e) = self.directory.refresh_views().await {
            warn!(error = %e, "failed to refresh directory views");
        }
    }

    // ---- Resource roles ----

    /// Replaces the cached role assignments of one resource with what its
    /// ACL grants.
    ///
    /// Entries are matched against cached users by any name form first, then
    /// against cached groups, then as OU domains (`*/ou=...` or `ou=...`)
    /// against every user whose resolved groups contain them. Cached holders
    /// no longer named by the ACL lose their roles on the resource.
    #[instrument(skip(self, metadata))]
    pub async fn sync_resource_roles(
        &self,
        metadata: &dyn SecurityMetadataSource,
        resource_id: &str,
    ) -> SyncResult<RoleSyncSummary> {
        let entries = metadata.acl_entries(resource_id).await.map_err(|source| {
            SyncError::MetadataUnavailable {
                resource_id: resource_id.to_string(),
                source,
            }
        })?;
        let resource_id = resource_id.trim().to_uppercase();
        let users = self.store.list_users().await?;

        let mut summary = RoleSyncSummary::default();
        let mut declared = BTreeSet::new();
        // Holder -> labels; one holder may be reached through several entries
        let mut user_labels: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut group_labels: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for entry in entries {
            let labels: BTreeSet<String> = entry.roles.iter().filter_map(|r| role_label(r)).collect();
            if labels.is_empty() {
                continue;
            }
            for label in &labels {
                if declared.insert(label.clone()) {
                    self.mutation
                        .write(self.store.upsert_role(RoleRef::new(&resource_id, label)))
                        .await?;
                }
            }

            let user = match self.store.find_user_by_name(&entry.name).await? {
                Some(user) => Some(user),
                None => self.store.get_user(&entry.name).await?,
            };
            if let Some(user) = user {
                user_labels
                    .entry(user.principal_id)
                    .or_default()
                    .extend(labels);
                summary.user_assignments += 1;
                continue;
            }
            if let Some(group) = self.store.get_group(&entry.name).await? {
                group_labels.entry(group.name).or_default().extend(labels);
                summary.group_assignments += 1;
                continue;
            }

            let domain = normalize(&entry.name);
            if is_ou_domain(&domain) {
                let holders: Vec<&UserRecord> =
                    users.iter().filter(|u| u.groups.contains(&domain)).collect();
                trace!(domain = %domain, holders = holders.len(), "ACL entry names an OU domain");
                for user in holders {
                    user_labels
                        .entry(user.principal_id.clone())
                        .or_default()
                        .extend(labels.iter().cloned());
                }
                summary.domain_assignments += 1;
                continue;
            }

            debug!(entry = %entry.name, "ACL entry matches no cached user, group or OU domain");
            summary.unmatched += 1;
        }

        for (principal_id, labels) in &user_labels {
            let write = self.store.set_user_roles(principal_id, &resource_id, labels.clone());
            self.write_roles(self.mutation.write(write).await, principal_id, &mut summary)?;
        }
        for (group, labels) in &group_labels {
            let write = self.store.set_group_roles(group, &resource_id, labels.clone());
            self.write_roles(self.mutation.write(write).await, group, &mut summary)?;
        }

        for user in &users {
            if user_labels.contains_key(&user.principal_id) {
                continue;
            }
            let held = self.store.user_roles(&user.principal_id).await?;
            if held.iter().any(|role| role.resource_id == resource_id) {
                let write = self.store.set_user_roles(&user.principal_id, &resource_id, BTreeSet::new());
                if self.write_roles(self.mutation.write(write).await, &user.principal_id, &mut summary)? {
                    summary.cleared += 1;
                }
            }
        }

        for group in self.store.list_groups().await? {
            if group_labels.contains_key(&group.name) {
                continue;
            }
            let held = self.store.group_roles(&group.name).await?;
            if held.iter().any(|role| role.resource_id == resource_id) {
                let write = self.store.set_group_roles(&group.name, &resource_id, BTreeSet::new());
                if self.write_roles(self.mutation.write(write).await, &group.name, &mut summary)? {
                    summary.cleared += 1;
                }
            }
        }

        summary.roles = declared.len();
        info!(
            resource_id = %resource_id,
            roles = summary.roles,
            user_assignments = summary.user_assignments,
            group_assignments = summary.group_assignments,
            domain_assignments = summary.domain_assignments,
            cleared = summary.cleared,
            unmatched = summary.unmatched,
            holders_vanished = summary.holders_vanished,
            "resource roles synchronized"
        );
        Ok(summary)
    }

    /// Outcome of one role write. A holder removed since it was read is
    /// skipped; any other storage error aborts the resource.
    fn write_roles(
        &self,
        result: StorageResult<()>,
        holder: &str,
        summary: &mut RoleSyncSummary,
    ) -> SyncResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e @ (StorageError::UserNotFound { .. } | StorageError::GroupNotFound { .. })) => {
                warn!(holder = %holder, error = %e, "role holder vanished, skipping");
                summary.holders_vanished += 1;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether a normalized ACL entry names an OU subtree or OU level.
fn is_ou_domain(entry: &str) -> bool {
    entry
        .strip_prefix(WILDCARD_PREFIX)
        .unwrap_or(entry)
        .starts_with("ou=")
}
