//! # Sentinel Auth
//!
//! Access control for Sentinel streams.
//!
//! ## Credential verification
//!
//! Every stream request carries an `apikey` and a `project`. A
//! [`CredentialVerifier`] decides whether the pair may subscribe before any
//! connection is registered. Plain closures implement the trait, and
//! [`StaticApiKeys`] covers the common fixed-table case.
//!
//! ## Permissions
//!
//! An [`Authorizer`] tracks which [`Permission`]s a user holds on a
//! [`Scope`] (a project, optionally narrowed to a group and a resource).
//! [`AuthorizerVerifier`] adapts an authorizer into a credential gate.

mod authorizer;
mod credential;
mod error;
mod permission;

pub use authorizer::{Authorizer, MemoryAuthorizer};
pub use credential::{AuthorizerVerifier, CredentialVerifier, DenyAll, StaticApiKeys};
pub use error::{AuthError, Result};
pub use permission::{AddPermission, Permission, RevokePermission, Scope};
