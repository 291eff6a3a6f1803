//! Document identifier parsing.
//!
//! Document ids have the shape
//!
//! ```text
//! http://server.example.com/85257608004F5587/0/9F8E7D6C5B4A392817263544536271AB
//!                           └─ resource (16) ─┘   └──────── content (32) ────────┘
//! ```
//!
//! The resource id is the 16 characters after the path separator that ends
//! the authority; the content id is the trailing 32 characters. Slicing is by
//! fixed offsets and any slice that falls outside the string, or any non-hex
//! character, is rejected rather than guessed at.

use crate::error::{DomainError, DomainResult};

/// Length of a resource (database replica) id.
pub const RESOURCE_ID_LEN: usize = 16;

/// Length of a document content id.
pub const CONTENT_ID_LEN: usize = 32;

/// Resource and content ids extracted from a document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId {
    pub resource_id: String,
    pub content_id: String,
}

impl DocumentId {
    pub fn parse(value: &str) -> DomainResult<Self> {
        let malformed = |reason: &str| DomainError::MalformedDocumentId {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let authority = value
            .find("://")
            .map(|i| i + 3)
            .ok_or_else(|| malformed("missing scheme separator"))?;
        let separator = value
            .get(authority..)
            .and_then(|rest| rest.find('/'))
            .map(|i| authority + i)
            .ok_or_else(|| malformed("missing path separator"))?;

        let resource_start = separator + 1;
        let resource_end = resource_start + RESOURCE_ID_LEN;
        let resource_id = value
            .get(resource_start..resource_end)
            .ok_or_else(|| malformed("too short for a resource id"))?;
        if !is_hex(resource_id) {
            return Err(malformed("resource id is not hexadecimal"));
        }

        let content_start = value
            .len()
            .checked_sub(CONTENT_ID_LEN)
            .filter(|start| *start > resource_end)
            .ok_or_else(|| malformed("too short for a content id"))?;
        if value.as_bytes()[content_start - 1] != b'/' {
            return Err(malformed("content id is not a path segment"));
        }
        let content_id = value
            .get(content_start..)
            .ok_or_else(|| malformed("content id out of range"))?;
        if !is_hex(content_id) {
            return Err(malformed("content id is not hexadecimal"));
        }

        Ok(Self {
            resource_id: resource_id.to_uppercase(),
            content_id: content_id.to_uppercase(),
        })
    }
}

fn is_hex(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_hexdigit())
}
