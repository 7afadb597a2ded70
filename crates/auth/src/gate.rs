//! Request-time authorization decision.
//!
//! `authorize` is the single policy check behind every guarded operation:
//! pure, no IO, no panics. Transport concerns (bearer extraction, session
//! liveness) live in the API layer; by the time a claim set reaches this
//! function it has already been cryptographically validated.

use serde::Serialize;
use thiserror::Error;

use crate::claims::ClaimSet;
use crate::permissions::Permission;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Check that the claim set carries the required permission.
///
/// Matching is exact and case-sensitive; there is no wildcard or hierarchy.
pub fn authorize(claims: &ClaimSet, required: &Permission) -> Result<(), AuthzError> {
    if claims.has_permission(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Detailed record of an authorization decision, for the RBAC audit surface
/// ("why was this request denied?").
#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub role: String,
    pub held_permissions: Vec<String>,
}

/// Explain an authorization decision without enforcing it.
pub fn explain(claims: &ClaimSet, required: &Permission) -> AccessDecision {
    let required_str = required.as_str();
    let granted = claims.has_permission(required_str);

    let reason = if granted {
        format!("claim set holds '{required_str}'")
    } else {
        format!(
            "claim set for role '{}' does not hold '{required_str}'",
            claims.role()
        )
    };

    let mut held: Vec<String> = claims
        .permissions()
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    held.sort();

    AccessDecision {
        required_permission: required_str.to_string(),
        granted,
        reason,
        role: claims.role().as_str().to_string(),
        held_permissions: held,
    }
}
