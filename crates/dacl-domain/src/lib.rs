//! dacl-domain: Core directory and access-control logic
//!
//! This crate contains the pure logic shared by the synchronizer and the
//! authorization engine:
//! - Directory name forms and OU wildcard domains
//! - Nested group resolution with cycle protection
//! - Bounded LRU caching of authorization decisions
//! - Database / document ACL evaluation and role expansion
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                dacl-domain                   │
//! ├─────────────────────────────────────────────┤
//! │  names.rs        - Directory name forms     │
//! │  domain_index.rs - OU wildcard index        │
//! │  resolver/       - Nested group expansion   │
//! │  cache/          - Decision LRU cache       │
//! │  authz/          - ACL evaluation           │
//! └─────────────────────────────────────────────┘
//! ```

pub mod authz;
pub mod cache;
pub mod domain_index;
pub mod error;
pub mod names;
pub mod resolver;

// Re-export commonly used types at the crate root
pub use authz::{AuthorizationDecision, Decision, DocumentId, ResourceAcl};
pub use cache::{AuthorizationCache, DecisionKey};
pub use domain_index::DomainNameIndex;
pub use error::{DomainError, DomainResult};
pub use names::DirectoryName;
pub use resolver::{GroupEntry, GroupLookup, NestedGroupResolver, ResolverConfig};
