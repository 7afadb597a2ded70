use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bookforge_core::DomainError;

/// Role assigned to exactly one identity.
///
/// The set is closed: provisioning creates a role once and only its
/// permission bundle (see [`crate::catalog`]) ever changes. Serialized as a
/// lowercase string so tokens and API payloads stay stable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Member => "member",
        }
    }

    pub const ALL: [Role; 3] = [Role::Admin, Role::Staff, Role::Member];
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "member" => Ok(Role::Member),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
        // Matching is case-sensitive, like permission checks.
        assert!("Admin".parse::<Role>().is_err());
    }
}
