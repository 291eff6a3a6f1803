//! Index of organizational-unit wildcard domains.
//!
//! Directory ACLs can grant access to a whole organizational subtree with an
//! entry such as `*/OU=West/O=ABC`. The index keeps one entry per distinct
//! OU suffix chain seen during synchronization, keyed by the normalized
//! wildcard string (`*/ou=west/o=abc`) and mapped to a counter-assigned id.

use std::collections::BTreeMap;

use crate::names::{normalize, DirectoryName};

/// Prefix marking a wildcard domain.
pub const WILDCARD_PREFIX: &str = "*/";

/// Set of wildcard domains keyed by OU suffix.
#[derive(Debug, Clone, Default)]
pub struct DomainNameIndex {
    entries: BTreeMap<String, u64>,
    next_id: u64,
}

impl DomainNameIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a wildcard domain with the given id.
    ///
    /// Returns `false` if the domain was already present; the existing id is kept.
    pub fn add(&mut self, wildcard_domain: &str, id: u64) -> bool {
        let key = normalize(wildcard_domain);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, id);
        self.next_id = self.next_id.max(id.saturating_add(1));
        true
    }

    /// Number of distinct wildcard domains.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the id assigned to a wildcard domain.
    pub fn get(&self, wildcard_domain: &str) -> Option<u64> {
        self.entries.get(&normalize(wildcard_domain)).copied()
    }

    /// Returns every entry lying in the subtree rooted at `ou_suffix`.
    ///
    /// The suffix may be given as `/OU=West/O=ABC`, `OU=West/O=ABC` or
    /// `*/OU=West/O=ABC`.
    pub fn sub_domain_names(&self, ou_suffix: &str) -> BTreeMap<String, u64> {
        let mut suffix = normalize(ou_suffix);
        if let Some(stripped) = suffix.strip_prefix('*') {
            suffix = stripped.to_string();
        }
        if !suffix.starts_with('/') {
            suffix.insert(0, '/');
        }

        self.entries
            .iter()
            .filter(|(domain, _)| domain.ends_with(&suffix))
            .map(|(domain, id)| (domain.clone(), *id))
            .collect()
    }

    /// Expands a distinguished name into one wildcard per ancestor OU level,
    /// most specific first.
    ///
    /// `CN=A/OU=North/OU=West/O=ABC` yields `*/ou=north/ou=west/o=abc` and
    /// `*/ou=west/o=abc`. Flat or unparseable names yield nothing.
    pub fn expand_wildcard_domains(&self, distinguished_name: &str) -> Vec<String> {
        expand_wildcard_domains(distinguished_name)
    }

    /// Expands `distinguished_name` and adds every wildcard not yet indexed,
    /// assigning ids from the internal counter.
    pub fn register(&mut self, distinguished_name: &str) -> Vec<String> {
        let wildcards = expand_wildcard_domains(distinguished_name);
        for wildcard in &wildcards {
            let id = self.next_id;
            self.add(wildcard, id);
        }
        wildcards
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(domain, id)| (domain.as_str(), *id))
    }
}

fn expand_wildcard_domains(distinguished_name: &str) -> Vec<String> {
    let Ok(name) = DirectoryName::parse(distinguished_name) else {
        return Vec::new();
    };
    let components: Vec<String> = name.components().iter().map(|c| normalize(c)).collect();

    components
        .iter()
        .enumerate()
        .filter(|(_, component)| component.starts_with("ou="))
        .map(|(i, _)| format!("{}{}", WILDCARD_PREFIX, components[i..].join("/")))
        .collect()
}
