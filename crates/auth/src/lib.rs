//! `bookforge-auth` — authentication/authorization boundary (zero-trust).
//!
//! Roles are coarse permission bundles; authorization decisions are made
//! against individual permission claims carried by the bearer token. This
//! crate is intentionally decoupled from HTTP and storage.

pub mod catalog;
pub mod claims;
pub mod gate;
pub mod permissions;
pub mod roles;
pub mod token;
pub mod user;

pub use catalog::{all_permissions, permissions_for_role, required_permission, role_claims};
pub use claims::ClaimSet;
pub use gate::{AccessDecision, AuthzError, authorize, explain};
pub use permissions::Permission;
pub use roles::Role;
pub use token::{ConfigError, IssuedIdentity, IssuedToken, TokenConfig, TokenError, TokenIssuer, TokenValidator};
pub use user::{Profile, User, UserCommand, UserEvent};
