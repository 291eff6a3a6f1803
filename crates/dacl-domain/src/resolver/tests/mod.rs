//! Tests for the nested group resolver.
//!
//! Organized by functionality:
//! - Plain nesting and flattening
//! - Cycle and re-visit protection
//! - Group type filtering
//! - Lookup failures and dangling members
