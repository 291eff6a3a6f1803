//! Nested group resolution.
//!
//! Directory groups may list other groups as members. Authorization needs the
//! flattened closure: a principal in `jedi` is also in every group that
//! (transitively) contains `jedi`. The directory is maintained by hand and
//! routinely contains cycles, dangling member names and groups of types that
//! do not take part in access control; the resolver tolerates all of them.

mod config;
mod nested;
mod traits;

pub use config::{ResolverConfig, DEFAULT_GROUP_TYPES};
pub use nested::NestedGroupResolver;
pub use traits::{GroupEntry, GroupLookup};

#[cfg(test)]
mod tests;
