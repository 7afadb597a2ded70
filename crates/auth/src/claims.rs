use chrono::{DateTime, Utc};

use bookforge_core::{SessionId, UserId};

use crate::permissions::Permission;
use crate::roles::Role;

/// The validated, in-memory representation of a token's embedded identity and
/// permission data for one request.
///
/// Produced once by the token validator and threaded explicitly through the
/// call chain; never mutated in place. Handlers read identity from here and
/// never re-derive it from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    user_id: UserId,
    email: String,
    display_name: String,
    role: Role,
    permissions: Vec<Permission>,
    session_id: SessionId,
    expires_at: DateTime<Utc>,
}

impl ClaimSet {
    pub fn new(
        user_id: UserId,
        email: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        permissions: Vec<Permission>,
        session_id: SessionId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            email: email.into(),
            display_name: display_name.into(),
            role,
            permissions,
            session_id,
            expires_at,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Exact, case-sensitive membership check. No wildcard, no hierarchy.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p.as_str() == permission)
    }
}
