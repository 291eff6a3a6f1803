//! Batch authorization of documents for one principal.
//!
//! For each document id the engine:
//!
//! 1. consults the decision cache
//! 2. splits the id into resource and content ids
//! 3. checks the resource ACL (deny list, permit list, permit groups)
//! 4. checks the document reader list, if the document has one, with the
//!    principal's roles expanded when the resource declares any
//!
//! A failure while evaluating one document yields `Indeterminate` for that
//! document only; the batch always returns one decision per input id, in
//! input order.
//!
//! Cached decisions are tagged with the directory cache's last-sync time
//! and only reused while it is unchanged, so a completed sync retires every
//! decision computed before it.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, instrument, trace, warn};

use dacl_domain::authz::{check_database_access, check_document_access, Credentials, DEFAULT_ENTRY};
use dacl_domain::cache::DEFAULT_CACHE_SIZE;
use dacl_domain::names::normalize;
use dacl_domain::{
    AuthorizationCache, AuthorizationDecision, Decision, DecisionKey, DocumentId, DomainResult,
};
use dacl_storage::{DirectoryStore, StorageResult, UserRecord};

use crate::observability::{record_cache_hit, record_cache_miss, record_decision};
use crate::sources::SecurityMetadataSource;

/// What the store knows about the requesting principal.
enum Principal {
    Known(Credentials),
    Unknown,
    /// The store could not be read.
    Unavailable,
}

/// A decision together with the sync generation it was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedDecision {
    pub generation: Option<DateTime<Utc>>,
    pub decision: Decision,
}

/// Evaluates documents against directory ACLs, reader lists and roles.
pub struct AuthorizationEngine {
    store: Arc<dyn DirectoryStore>,
    metadata: Arc<dyn SecurityMetadataSource>,
    cache: AuthorizationCache<DecisionKey, CachedDecision>,
    default_entry: String,
}

impl AuthorizationEngine {
    /// Creates an engine with a default-sized decision cache.
    pub fn new(store: Arc<dyn DirectoryStore>, metadata: Arc<dyn SecurityMetadataSource>) -> Self {
        Self::with_cache_size(store, metadata, DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(
        store: Arc<dyn DirectoryStore>,
        metadata: Arc<dyn SecurityMetadataSource>,
        cache_size: usize,
    ) -> Self {
        Self {
            store,
            metadata,
            cache: AuthorizationCache::new(cache_size),
            default_entry: DEFAULT_ENTRY.to_string(),
        }
    }

    /// Sets the permit-list entry that grants every principal access.
    pub fn with_default_entry(mut self, default_entry: impl Into<String>) -> Self {
        self.default_entry = default_entry.into();
        self
    }

    pub fn cache(&self) -> &AuthorizationCache<DecisionKey, CachedDecision> {
        &self.cache
    }

    /// Decides every document for `principal`.
    ///
    /// Returns exactly one decision per id, in input order.
    #[instrument(skip(self, document_ids), fields(batch_size = document_ids.len()))]
    pub async fn authorize(
        &self,
        document_ids: &[String],
        principal: &str,
    ) -> Vec<AuthorizationDecision> {
        let start = Instant::now();
        let principal_key = normalize(principal);

        // The cache is bypassed when the sync generation cannot be read
        let sync_generation = match self.store.last_sync().await {
            Ok(generation) => Some(generation),
            Err(e) => {
                warn!(error = %e, "failed to read sync generation, bypassing decision cache");
                None
            }
        };

        // Stage 1: cached decisions from the current generation
        let mut decisions: Vec<Option<Decision>> = document_ids
            .iter()
            .map(|id| {
                let cached = sync_generation.and_then(|generation| {
                    self.cache
                        .get(&DecisionKey::new(&principal_key, id))
                        .filter(|entry| entry.generation == generation)
                        .map(|entry| entry.decision)
                });
                match cached {
                    Some(_) => record_cache_hit(),
                    None => record_cache_miss(),
                }
                cached
            })
            .collect();
        let cached = decisions.iter().filter(|d| d.is_some()).count();

        // Stage 2: live evaluation of the misses, in parallel
        if cached < document_ids.len() {
            let subject = self.resolve_principal(principal).await;
            let pending: Vec<usize> = (0..document_ids.len())
                .filter(|&i| decisions[i].is_none())
                .collect();
            let evaluations = pending
                .iter()
                .map(|&i| self.decide(&document_ids[i], &subject));
            let results = join_all(evaluations).await;

            for (i, decision) in pending.into_iter().zip(results) {
                if let Some(generation) = sync_generation {
                    if decision != Decision::Indeterminate {
                        self.cache.put(
                            DecisionKey::new(&principal_key, &document_ids[i]),
                            CachedDecision {
                                generation,
                                decision,
                            },
                        );
                    }
                }
                decisions[i] = Some(decision);
            }
        }

        let results: Vec<AuthorizationDecision> = document_ids
            .iter()
            .zip(decisions)
            .map(|(id, decision)| {
                let decision = decision.unwrap_or(Decision::Indeterminate);
                record_decision(decision);
                AuthorizationDecision::new(id.clone(), principal, decision)
            })
            .collect();

        info!(
            principal = %principal,
            documents = results.len(),
            cached,
            allowed = results.iter().filter(|r| r.decision.is_allowed()).count(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "authorization batch completed"
        );
        results
    }

    async fn resolve_principal(&self, principal: &str) -> Principal {
        match self.lookup_user(principal).await {
            Ok(Some(user)) => Principal::Known(credentials(&user)),
            Ok(None) => {
                debug!(principal = %principal, "principal not in directory cache");
                Principal::Unknown
            }
            Err(e) => {
                warn!(principal = %principal, error = %e, "failed to read principal from directory cache");
                Principal::Unavailable
            }
        }
    }

    async fn lookup_user(&self, principal: &str) -> StorageResult<Option<UserRecord>> {
        match self.store.get_user(principal).await? {
            Some(user) => Ok(Some(user)),
            None => self.store.find_user_by_name(principal).await,
        }
    }

    /// Decides one document, mapping any evaluation error to Indeterminate.
    async fn decide(&self, document_id: &str, principal: &Principal) -> Decision {
        let start = Instant::now();
        let decision = match self.evaluate(document_id, principal).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    document_id = %document_id,
                    error = %e,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "document evaluation failed"
                );
                Decision::Indeterminate
            }
        };
        trace!(
            document_id = %document_id,
            decision = %decision,
            elapsed_us = start.elapsed().as_micros() as u64,
            "document evaluated"
        );
        decision
    }

    async fn evaluate(&self, document_id: &str, principal: &Principal) -> DomainResult<Decision> {
        let id = DocumentId::parse(document_id)?;

        let credentials = match principal {
            Principal::Known(credentials) => credentials,
            Principal::Unknown => return Ok(Decision::Deny),
            Principal::Unavailable => return Ok(Decision::Indeterminate),
        };

        let acl = self.metadata.resource_acl(&id.resource_id).await?;
        if check_database_access(&acl, credentials, &self.default_entry) == Decision::Deny {
            debug!(document_id = %document_id, resource_id = %id.resource_id, "denied by resource ACL");
            return Ok(Decision::Deny);
        }

        match self
            .metadata
            .reader_list(&id.resource_id, &id.content_id)
            .await?
        {
            Some(readers) => Ok(check_document_access(&acl, &readers, credentials)),
            None => Ok(Decision::Allow),
        }
    }
}

/// Credentials of a cached user: every name form plus resolved groups.
fn credentials(user: &UserRecord) -> Credentials {
    Credentials {
        names: user.name_forms(),
        groups: user.groups.iter().map(|g| normalize(g)).collect(),
    }
}
