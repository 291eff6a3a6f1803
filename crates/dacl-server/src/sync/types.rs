//! Data types for synchronizer runs.

use std::time::Duration;

use dacl_domain::DomainError;
use dacl_storage::StorageError;

/// Name of the lock serializing writes to the directory cache.
pub const MUTATION_LOCK_NAME: &str = "directory-cache";

/// Counters describing one synchronizer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// The interval had not elapsed; nothing was read or written.
    pub skipped: bool,
    pub groups_upserted: usize,
    pub groups_unchanged: usize,
    pub users_upserted: usize,
    pub users_unchanged: usize,
    pub users_deleted: usize,
    pub groups_deleted: usize,
    /// Records skipped because of a per-record failure.
    pub records_skipped: usize,
    pub elapsed: Duration,
}

impl SyncSummary {
    pub(crate) fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    /// Whether the run changed anything in the cache.
    pub fn has_changes(&self) -> bool {
        self.groups_upserted + self.users_upserted + self.users_deleted + self.groups_deleted > 0
    }
}

/// Counters describing one role synchronization of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSyncSummary {
    /// Distinct roles declared on the resource.
    pub roles: usize,
    pub user_assignments: usize,
    pub group_assignments: usize,
    /// ACL entries naming an OU domain, applied to the users inside it.
    pub domain_assignments: usize,
    /// Previous holders whose roles on the resource were cleared.
    pub cleared: usize,
    /// ACL entries naming no cached user, group or OU domain.
    pub unmatched: usize,
    /// Holders removed from the cache between read and write.
    pub holders_vanished: usize,
}

/// Errors that abort a synchronizer run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A directory view needed for the run could not be opened.
    #[error("directory view '{view}' unavailable: {source}")]
    DirectoryUnavailable {
        view: &'static str,
        #[source]
        source: DomainError,
    },

    /// Resource security metadata could not be read.
    #[error("security metadata unavailable for resource {resource_id}: {source}")]
    MetadataUnavailable {
        resource_id: String,
        #[source]
        source: DomainError,
    },

    /// The directory cache failed outside of a single record write.
    #[error("directory cache error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;
