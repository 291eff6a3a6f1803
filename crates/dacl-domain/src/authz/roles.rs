//! Role expansion.
//!
//! A resource declares its roles as definition strings of the form
//! `[label]~member~member~...~`. A principal holds the role when the
//! definition contains `~credential~` for any of its credentials (full name,
//! common name or a resolved group). Enabled roles are reported by their
//! bracketed label so they can be matched against reader lists directly.

use std::collections::BTreeSet;

use crate::names::normalize;

/// Extracts the bracketed, lower-cased label of a role definition.
///
/// Returns `None` for definitions without a label.
pub fn role_label(definition: &str) -> Option<String> {
    let definition = definition.trim();
    let head = definition.split('~').next().unwrap_or_default().trim();
    let label = head.trim_start_matches('[').trim_end_matches(']').trim();
    if label.is_empty() {
        return None;
    }
    Some(format!("[{}]", label.to_lowercase()))
}

/// Returns the labels of every role enabled for the given credentials.
pub fn enabled_roles<'a, I>(definitions: &[String], credentials: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String> + Clone,
{
    definitions
        .iter()
        .filter_map(|definition| {
            let normalized = normalize(definition);
            let granted = credentials
                .clone()
                .into_iter()
                .any(|credential| normalized.contains(&format!("~{}~", normalize(credential))));
            if granted {
                role_label(definition)
            } else {
                None
            }
        })
        .collect()
}
