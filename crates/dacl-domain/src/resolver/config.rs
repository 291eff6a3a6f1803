//! Configuration for the nested group resolver.

use std::collections::BTreeSet;

/// Group types that take part in access control by default:
/// multi-purpose (`0`), access-control only (`2`) and deny-list only (`3`).
pub const DEFAULT_GROUP_TYPES: [&str; 3] = ["0", "2", "3"];

/// Configuration for the nested group resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Group type classifications followed during expansion.
    pub group_types: BTreeSet<String>,
    /// Maximum nesting depth followed from the root group.
    pub max_depth: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            group_types: DEFAULT_GROUP_TYPES.iter().map(|t| t.to_string()).collect(),
            max_depth: 25,
        }
    }
}

impl ResolverConfig {
    /// Replaces the access-control group type set.
    pub fn with_group_types<I, S>(mut self, group_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_types = group_types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether a group of this type participates in access control.
    pub fn is_access_control(&self, group_type: &str) -> bool {
        self.group_types.contains(group_type.trim())
    }
}
