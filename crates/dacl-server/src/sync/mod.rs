//! Directory synchronization.
//!
//! The synchronizer is the only writer of the directory cache. A run makes
//! four passes over the live directory:
//!
//! 1. **Groups**: expand every access-control group and store its closure
//! 2. **People**: resolve each selected person's groups and OU wildcards
//! 3. **Obsolete users**: drop cached users gone from the directory or no
//!    longer selected
//! 4. **Obsolete groups**: drop cached groups gone from the directory
//!
//! Failing to open the group or person view aborts the run and leaves the
//! cache as it was. Every other failure is per record: logged, counted and
//! skipped.

mod synchronizer;
mod types;

pub use synchronizer::DirectorySynchronizer;
pub use types::{RoleSyncSummary, SyncError, SyncResult, SyncSummary, MUTATION_LOCK_NAME};
