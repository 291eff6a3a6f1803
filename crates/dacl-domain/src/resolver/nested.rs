//! Depth-first expansion of nested group membership.
//!
//! # Cycle Handling
//!
//! Each call to [`NestedGroupResolver::expand`] owns its visited set, so
//! concurrent expansions never share state. A group is expanded at most once
//! per call; a membership cycle therefore ends as soon as it revisits a name.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::names::normalize;

use super::config::ResolverConfig;
use super::traits::{GroupEntry, GroupLookup};

/// Expands a group into the set of access-control groups it contains.
pub struct NestedGroupResolver<L: ?Sized> {
    lookup: Arc<L>,
    config: ResolverConfig,
}

impl<L> NestedGroupResolver<L>
where
    L: GroupLookup + ?Sized,
{
    /// Creates a resolver with the default configuration.
    pub fn new(lookup: Arc<L>) -> Self {
        Self::with_config(lookup, ResolverConfig::default())
    }

    pub fn with_config(lookup: Arc<L>, config: ResolverConfig) -> Self {
        Self { lookup, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns every access-control group reachable from `group_name`
    /// through member lists, normalized to lower case.
    ///
    /// The root itself is never part of the result. A root that cannot be
    /// looked up expands to the empty set.
    pub async fn expand(&self, group_name: &str) -> BTreeSet<String> {
        let root = match self.lookup.lookup_group(group_name).await {
            Ok(Some(root)) => root,
            Ok(None) => {
                warn!(group = %group_name, "group not found, nothing to expand");
                return BTreeSet::new();
            }
            Err(e) => {
                warn!(group = %group_name, error = %e, "failed to look up group for expansion");
                return BTreeSet::new();
            }
        };

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(normalize(group_name));
        visited.insert(normalize(&root.name));

        let mut closure = BTreeSet::new();
        let mut stack: Vec<(GroupEntry, u32)> = vec![(root, 0)];

        while let Some((group, depth)) = stack.pop() {
            if depth >= self.config.max_depth {
                warn!(
                    root = %group_name,
                    group = %group.name,
                    max_depth = self.config.max_depth,
                    "nesting depth limit reached, not descending further"
                );
                continue;
            }

            for member in &group.members {
                let key = normalize(member);
                if key.is_empty() || !visited.insert(key.clone()) {
                    continue;
                }

                match self.lookup.lookup_group(member).await {
                    Ok(Some(child)) if self.config.is_access_control(&child.group_type) => {
                        closure.insert(key);
                        stack.push((child, depth + 1));
                    }
                    Ok(Some(child)) => {
                        debug!(
                            group = %group.name,
                            member = %member,
                            group_type = %child.group_type,
                            "skipping member group outside access-control types"
                        );
                    }
                    Ok(None) => {
                        debug!(group = %group.name, member = %member, "member is not a group");
                    }
                    Err(e) => {
                        warn!(group = %group.name, member = %member, error = %e, "failed to look up member, skipping");
                    }
                }
            }
        }

        closure
    }
}
