//! Read-side handlers over the directory cache.

pub mod authn;
pub mod authz;

pub use authn::{
    AuthenticationError, AuthenticationHandler, AuthenticationResponse, AuthenticationResult,
};
pub use authz::{AuthorizationEngine, CachedDecision};
