//! Principal authentication against the directory cache.
//!
//! Validates that a principal is known (optionally checking its password
//! through the live directory) and reports the group output set used for
//! early-binding ACLs: resolved groups, OU wildcard entries and roles.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use dacl_domain::DomainError;
use dacl_storage::{DirectoryStore, StorageError, UserRecord};

use crate::sources::DirectorySource;

/// Outcome of an authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    /// The principal as requested.
    pub principal: String,
    pub valid: bool,
    /// Groups, OU wildcards and `<resource>/[role]` entries. Empty unless valid.
    pub groups: Vec<String>,
}

impl AuthenticationResponse {
    fn invalid(principal: &str) -> Self {
        Self {
            principal: principal.to_string(),
            valid: false,
            groups: Vec::new(),
        }
    }
}

/// Errors that can occur during authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    /// A password was supplied but no directory is configured to check it.
    #[error("password verification requires a directory source")]
    PasswordVerificationUnavailable,

    #[error("directory error: {0}")]
    Directory(#[from] DomainError),

    #[error("directory cache error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for authentication operations.
pub type AuthenticationResult<T> = Result<T, AuthenticationError>;

/// Read-only consumer of the directory cache answering "who is this and
/// what are they a member of".
pub struct AuthenticationHandler {
    store: Arc<dyn DirectoryStore>,
    directory: Option<Arc<dyn DirectorySource>>,
}

impl AuthenticationHandler {
    /// Creates a handler that only checks the principal is cached.
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            store,
            directory: None,
        }
    }

    /// Enables password verification through `directory`.
    pub fn with_directory(mut self, directory: Arc<dyn DirectorySource>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Authenticates `principal`, verifying `password` when given.
    #[instrument(skip(self, password), fields(with_password = password.is_some()))]
    pub async fn authenticate(
        &self,
        principal: &str,
        password: Option<&str>,
    ) -> AuthenticationResult<AuthenticationResponse> {
        let Some(user) = self.lookup_user(principal).await? else {
            debug!(principal = %principal, "unknown principal");
            return Ok(AuthenticationResponse::invalid(principal));
        };

        if let Some(password) = password {
            let directory = self
                .directory
                .as_ref()
                .ok_or(AuthenticationError::PasswordVerificationUnavailable)?;
            if !directory
                .verify_password(&user.canonical_name, password)
                .await?
            {
                warn!(principal = %principal, "password verification failed");
                return Ok(AuthenticationResponse::invalid(principal));
            }
        }

        Ok(AuthenticationResponse {
            principal: principal.to_string(),
            valid: true,
            groups: self.group_output(&user).await?,
        })
    }

    /// The group output set of a cached principal, or `None` when unknown.
    pub async fn principal_groups(&self, principal: &str) -> AuthenticationResult<Option<Vec<String>>> {
        match self.lookup_user(principal).await? {
            Some(user) => Ok(Some(self.group_output(&user).await?)),
            None => Ok(None),
        }
    }

    async fn lookup_user(&self, principal: &str) -> Result<Option<UserRecord>, StorageError> {
        match self.store.get_user(principal).await? {
            Some(user) => Ok(Some(user)),
            None => self.store.find_user_by_name(principal).await,
        }
    }

    /// Resolved groups and OU entries, then roles held directly or through
    /// any of those groups.
    async fn group_output(&self, user: &UserRecord) -> Result<Vec<String>, StorageError> {
        let mut output: BTreeSet<String> = user.groups.iter().cloned().collect();

        for role in self.store.user_roles(&user.principal_id).await? {
            output.insert(role.qualified());
        }
        for group in &user.groups {
            for role in self.store.group_roles(group).await? {
                output.insert(role.qualified());
            }
        }

        Ok(output.into_iter().collect())
    }
}
