//! dacl-server: Directory synchronization and request handlers
//!
//! This crate wires the pure logic of `dacl-domain` to the directory cache
//! in `dacl-storage`:
//! - Directory synchronizer (groups, people, stale records, resource roles)
//! - Batch authorization engine with a decision cache
//! - Authentication handler reporting a principal's group output
//! - Configuration, logging and metrics
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                dacl-server                   │
//! ├─────────────────────────────────────────────┤
//! │  config.rs     - Configuration management   │
//! │  sources.rs    - Live directory seams       │
//! │  evaluator.rs  - Person item formulas       │
//! │  sync/         - Directory synchronizer     │
//! │  handlers/     - Request handlers           │
//! │    authz.rs       - Batch authorization     │
//! │    authn.rs       - Authentication          │
//! │  observability/ - Logging and metrics       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod evaluator;
pub mod handlers;
pub mod observability;
pub mod sources;
pub mod sync;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use evaluator::ItemFormulaEvaluator;
pub use handlers::{AuthenticationHandler, AuthenticationResponse, AuthorizationEngine};
pub use sources::{AclEntry, DirectorySource, PersonEntry, PersonEvaluator, SecurityMetadataSource};
pub use sync::{DirectorySynchronizer, RoleSyncSummary, SyncError, SyncSummary};
