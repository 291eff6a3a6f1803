//! Access-control evaluation primitives.
//!
//! The authorization engine combines three layers of security metadata:
//!
//! 1. the resource (database) ACL: deny list, permit list, permit groups
//! 2. the per-document reader list, if the document has one
//! 3. roles declared on the resource and matched against the principal
//!
//! This module holds the pure, I/O-free parts of that evaluation. Fetching
//! the metadata and caching decisions is the engine's job.

mod acl;
mod doc_id;
mod roles;

pub use acl::{check_database_access, check_document_access, Credentials, ResourceAcl, DEFAULT_ENTRY};
pub use doc_id::{DocumentId, CONTENT_ID_LEN, RESOURCE_ID_LEN};
pub use roles::{enabled_roles, role_label};

use std::fmt;

/// Outcome of evaluating one document for one principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allow,
    Deny,
    /// Evaluation failed; never to be read as a plain deny by operators.
    Indeterminate,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Indeterminate => "indeterminate",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision for one (principal, document) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub document_id: String,
    pub principal: String,
    pub decision: Decision,
}

impl AuthorizationDecision {
    pub fn new(document_id: impl Into<String>, principal: impl Into<String>, decision: Decision) -> Self {
        Self {
            document_id: document_id.into(),
            principal: principal.into(),
            decision,
        }
    }
}
