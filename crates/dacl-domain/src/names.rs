//! Directory name forms.
//!
//! Hierarchical directory names come in three forms:
//!
//! - canonical: `CN=Anakin Skywalker/OU=North/OU=West/O=ABC`
//! - abbreviated: `Anakin Skywalker/North/West/ABC`
//! - common: `Anakin Skywalker`
//!
//! Flat names (groups, legacy users) have no `=` components; all three forms
//! are then the name itself. ACL and reader-list comparisons are
//! case-insensitive, so every comparison goes through [`normalize`].

use crate::error::{DomainError, DomainResult};

/// Normalizes a directory name for comparison (trimmed, lower case).
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A parsed directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryName {
    canonical: String,
    common: String,
    abbreviated: String,
    /// Organizational components following the common name, e.g.
    /// `["OU=North", "OU=West", "O=ABC"]`. Empty for flat names.
    components: Vec<String>,
}

impl DirectoryName {
    /// Parses a canonical or flat directory name.
    pub fn parse(value: &str) -> DomainResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DomainError::InvalidName {
                value: value.to_string(),
            });
        }

        if !value.contains('=') {
            return Ok(Self {
                canonical: value.to_string(),
                common: value.to_string(),
                abbreviated: value.to_string(),
                components: Vec::new(),
            });
        }

        let mut common = None;
        let mut components = Vec::new();
        let mut abbreviated = Vec::new();

        for part in value.split('/') {
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| DomainError::InvalidName {
                    value: value.to_string(),
                })?;
            let (key, val) = (key.trim(), val.trim());
            if key.is_empty() || val.is_empty() {
                return Err(DomainError::InvalidName {
                    value: value.to_string(),
                });
            }
            if key.eq_ignore_ascii_case("cn") && common.is_none() && components.is_empty() {
                common = Some(val.to_string());
            } else {
                components.push(format!("{}={}", key.to_uppercase(), val));
            }
            abbreviated.push(val.to_string());
        }

        let common = common.ok_or_else(|| DomainError::InvalidName {
            value: value.to_string(),
        })?;

        Ok(Self {
            canonical: value.to_string(),
            common,
            abbreviated: abbreviated.join("/"),
            components,
        })
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn common(&self) -> &str {
        &self.common
    }

    pub fn abbreviated(&self) -> &str {
        &self.abbreviated
    }

    /// Organizational components after the common name.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Whether the name carries organizational components.
    pub fn is_hierarchical(&self) -> bool {
        !self.components.is_empty()
    }

    /// All name forms, normalized and de-duplicated (canonical, abbreviated, common).
    pub fn normalized_forms(&self) -> Vec<String> {
        let mut forms = Vec::with_capacity(3);
        for form in [&self.canonical, &self.abbreviated, &self.common] {
            let form = normalize(form);
            if !forms.contains(&form) {
                forms.push(form);
            }
        }
        forms
    }
}
