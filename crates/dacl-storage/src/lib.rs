//! dacl-storage: Directory cache store
//!
//! This crate provides the persisted directory cache written by the
//! synchronizer and read by the authorization and authentication paths:
//! - DirectoryStore trait over users, groups, roles and sync state
//! - In-memory implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               dacl-storage                   │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DirectoryStore + records     │
//! │  memory.rs   - In-memory implementation     │
//! │  error.rs    - StorageError                 │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Logical Tables
//!
//! Users, Groups, UserGroups, GroupChildren, Roles, UserRoles, GroupRoles and
//! a single last-sync timestamp. Join tables are folded into the owning
//! record (`UserRecord::groups`, `GroupRecord::children`) so that a record
//! upsert replaces its memberships atomically.

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDirectoryStore;
pub use traits::{DirectoryStore, GroupRecord, RoleRef, UserRecord};
