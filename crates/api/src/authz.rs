//! Per-operation authorization guard (the final gate step).
//!
//! Enforced at the handler boundary, before any command is dispatched: the
//! operation name resolves through the static operation → permission table,
//! and the validated claim set must hold that permission exactly.

use bookforge_auth::{AuthzError, ClaimSet, Permission, authorize, required_permission};

/// Check the current claims against a guarded operation.
///
/// Operations missing from the table are denied outright - nothing is
/// guarded implicitly.
pub fn require_operation(claims: &ClaimSet, operation: &str) -> Result<(), AuthzError> {
    let Some(required) = required_permission(operation) else {
        tracing::error!(operation, "operation missing from permission table");
        return Err(AuthzError::Forbidden(operation.to_string()));
    };

    let result = authorize(claims, &Permission::new(required));

    if let Err(ref e) = result {
        tracing::warn!(
            user_id = %claims.user_id(),
            role = %claims.role(),
            required_permission = required,
            operation,
            error = %e,
            "authorization denied"
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookforge_auth::{Role, catalog, role_claims};
    use bookforge_core::{SessionId, UserId};
    use chrono::{Duration, Utc};

    fn claims_for(role: Role) -> ClaimSet {
        ClaimSet::new(
            UserId::new(),
            "someone@example.com",
            "Someone",
            role,
            role_claims(role),
            SessionId::new(),
            Utc::now() + Duration::hours(1),
        )
    }

    #[test]
    fn staff_passes_redeem_operation() {
        let claims = claims_for(Role::Staff);
        assert!(require_operation(&claims, catalog::operations::ORDER_REDEEM).is_ok());
    }

    #[test]
    fn member_fails_redeem_operation() {
        let claims = claims_for(Role::Member);
        assert!(require_operation(&claims, catalog::operations::ORDER_REDEEM).is_err());
    }

    #[test]
    fn unknown_operation_is_denied() {
        let claims = claims_for(Role::Admin);
        assert!(require_operation(&claims, "orders.teleport").is_err());
    }
}
