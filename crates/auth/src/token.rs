//! Bearer-token issuance and validation (HS256 JWTs).
//!
//! Tokens are self-describing for authorization: every permission string is
//! embedded individually, so the request gate trusts the claims and never
//! re-queries the permission catalog.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookforge_core::{SessionId, UserId};

use crate::claims::ClaimSet;
use crate::permissions::Permission;
use crate::roles::Role;

/// Minimum accepted signing-secret length, in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Fatal configuration failure. Raised at startup, never per-request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOOKFORGE_JWT_SECRET is not set")]
    MissingSecret,

    #[error("signing secret must be at least {MIN_SECRET_LEN} bytes (got {0})")]
    WeakSecret(usize),

    #[error("invalid token TTL: {0}")]
    InvalidTtl(String),
}

/// Token signing/validation configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    secret: String,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of an issued token. Long-lived by design: these back web
    /// sessions, not short-lived API tokens.
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret(secret.len()));
        }
        if ttl <= Duration::zero() {
            return Err(ConfigError::InvalidTtl("ttl must be positive".to_string()));
        }
        Ok(Self {
            secret,
            issuer: issuer.into(),
            audience: audience.into(),
            ttl,
        })
    }

    /// Load from the environment. The secret is required; issuer, audience,
    /// and TTL fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("BOOKFORGE_JWT_SECRET").map_err(|_| ConfigError::MissingSecret)?;

        let issuer =
            std::env::var("BOOKFORGE_JWT_ISSUER").unwrap_or_else(|_| "bookforge".to_string());
        let audience = std::env::var("BOOKFORGE_JWT_AUDIENCE")
            .unwrap_or_else(|_| "bookforge-clients".to_string());

        let ttl_hours = match std::env::var("BOOKFORGE_TOKEN_TTL_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|e| ConfigError::InvalidTtl(format!("{raw}: {e}")))?,
            Err(_) => 72,
        };

        Self::new(secret, issuer, audience, Duration::hours(ttl_hours))
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.as_bytes())
    }
}

/// Token rejection.
///
/// The subtype distinction exists for diagnostic logging only; every variant
/// surfaces to the caller as "unauthorized".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token issuance failed: {0}")]
    Issuance(String),
}

/// Wire-format claims. Everything the gate needs is embedded here.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JwtClaims {
    /// Subject: user id.
    sub: String,
    email: String,
    name: String,
    role: String,
    /// Every granted permission, individually.
    permissions: Vec<String>,
    /// Session id minted at login; enables revocation despite the token
    /// itself staying cryptographically valid.
    sid: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
}

/// A fully resolved identity ready for token issuance: the user, their role,
/// and the role's resolved permission set.
#[derive(Debug, Clone)]
pub struct IssuedIdentity {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

/// The encoded token plus its expiry timestamp.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Creates signed, time-bound bearer tokens.
pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = config.encoding_key();
        Self {
            config,
            encoding_key,
        }
    }

    pub fn issue(
        &self,
        identity: &IssuedIdentity,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.config.ttl;

        let claims = JwtClaims {
            sub: identity.user_id.to_string(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            role: identity.role.as_str().to_string(),
            permissions: identity
                .permissions
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            sid: session_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Issuance(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }
}

/// Verifies signature, issuer/audience, and expiry, then extracts an
/// immutable [`ClaimSet`].
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        Self {
            decoding_key: config.decoding_key(),
            validation,
        }
    }

    /// Validate a token string and extract its claims.
    ///
    /// Purely functional given the token and the clock; all rejections are
    /// terminal for the request.
    pub fn validate(&self, token: &str) -> Result<ClaimSet, TokenError> {
        let data =
            decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
                    ErrorKind::InvalidAudience => TokenError::InvalidAudience,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed(e.to_string()),
                }
            })?;

        claim_set_from_wire(data.claims)
    }
}

fn claim_set_from_wire(claims: JwtClaims) -> Result<ClaimSet, TokenError> {
    let user_id = UserId::from_str(&claims.sub)
        .map_err(|e| TokenError::Malformed(format!("sub: {e}")))?;
    let session_id = SessionId::from_str(&claims.sid)
        .map_err(|e| TokenError::Malformed(format!("sid: {e}")))?;
    let role = Role::from_str(&claims.role)
        .map_err(|e| TokenError::Malformed(format!("role: {e}")))?;
    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .ok_or_else(|| TokenError::Malformed("exp out of range".to_string()))?;

    let permissions = claims
        .permissions
        .into_iter()
        .map(Permission::new)
        .collect();

    Ok(ClaimSet::new(
        user_id,
        claims.email,
        claims.name,
        role,
        permissions,
        session_id,
        expires_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn test_config() -> TokenConfig {
        TokenConfig::new(
            "0123456789abcdef0123456789abcdef",
            "bookforge",
            "bookforge-clients",
            Duration::hours(72),
        )
        .unwrap()
    }

    fn test_identity(role: Role) -> IssuedIdentity {
        IssuedIdentity {
            user_id: UserId::new(),
            email: "reader@example.com".to_string(),
            display_name: "Avid Reader".to_string(),
            role,
            permissions: catalog::role_claims(role),
        }
    }

    #[test]
    fn issued_token_validates_immediately() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let validator = TokenValidator::new(&config);

        let identity = test_identity(Role::Member);
        let session_id = SessionId::new();
        let issued = issuer.issue(&identity, session_id, Utc::now()).unwrap();

        let claims = validator.validate(&issued.token).unwrap();
        assert_eq!(claims.user_id(), identity.user_id);
        assert_eq!(claims.email(), "reader@example.com");
        assert_eq!(claims.role(), Role::Member);
        assert_eq!(claims.session_id(), session_id);
        assert_eq!(claims.expires_at().timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn every_permission_is_embedded_individually() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let validator = TokenValidator::new(&config);

        let identity = test_identity(Role::Staff);
        let issued = issuer.issue(&identity, SessionId::new(), Utc::now()).unwrap();
        let claims = validator.validate(&issued.token).unwrap();

        for perm in catalog::permissions_for_role(Role::Staff) {
            assert!(claims.has_permission(perm), "missing {perm}");
        }
        assert!(!claims.has_permission("place_orders"));
    }

    #[test]
    fn token_past_expiry_fails_with_expired() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let validator = TokenValidator::new(&config);

        // Issue far enough in the past that exp < now even with zero leeway.
        let issued_at = Utc::now() - Duration::hours(100);
        let issued = issuer
            .issue(&test_identity(Role::Member), SessionId::new(), issued_at)
            .unwrap();

        assert_eq!(validator.validate(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_fails_with_invalid_signature() {
        let issuer = TokenIssuer::new(test_config());
        let other = TokenConfig::new(
            "ffffffffffffffffffffffffffffffff",
            "bookforge",
            "bookforge-clients",
            Duration::hours(72),
        )
        .unwrap();
        let validator = TokenValidator::new(&other);

        let issued = issuer
            .issue(&test_identity(Role::Member), SessionId::new(), Utc::now())
            .unwrap();

        assert_eq!(
            validator.validate(&issued.token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn wrong_issuer_and_audience_are_rejected() {
        let config = test_config();
        let issuer = TokenIssuer::new(config.clone());
        let issued = issuer
            .issue(&test_identity(Role::Member), SessionId::new(), Utc::now())
            .unwrap();

        let mut bad_issuer = config.clone();
        bad_issuer.issuer = "someone-else".to_string();
        assert_eq!(
            TokenValidator::new(&bad_issuer).validate(&issued.token),
            Err(TokenError::InvalidIssuer)
        );

        let mut bad_audience = config;
        bad_audience.audience = "other-clients".to_string();
        assert_eq!(
            TokenValidator::new(&bad_audience).validate(&issued.token),
            Err(TokenError::InvalidAudience)
        );
    }

    #[test]
    fn garbage_token_is_malformed() {
        let validator = TokenValidator::new(&test_config());
        assert!(matches!(
            validator.validate("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn short_secret_is_a_config_error() {
        let err = TokenConfig::new("short", "i", "a", Duration::hours(1)).unwrap_err();
        assert!(matches!(err, ConfigError::WeakSecret(5)));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            /// Property: issue-then-validate round-trips the claim set for
            /// any positive TTL and any role.
            #[test]
            fn issue_validate_round_trip(ttl_hours in 1i64..=24 * 30, role_idx in 0usize..3) {
                let role = Role::ALL[role_idx];
                let config = TokenConfig::new(
                    "0123456789abcdef0123456789abcdef",
                    "bookforge",
                    "bookforge-clients",
                    Duration::hours(ttl_hours),
                )
                .unwrap();
                let issuer = TokenIssuer::new(config.clone());
                let validator = TokenValidator::new(&config);

                let identity = test_identity(role);
                let issued = issuer.issue(&identity, SessionId::new(), Utc::now()).unwrap();
                let claims = validator.validate(&issued.token).unwrap();

                prop_assert_eq!(claims.user_id(), identity.user_id);
                prop_assert_eq!(claims.role(), role);
                prop_assert_eq!(claims.permissions().len(), identity.permissions.len());
            }

            /// Property: a token issued so that its expiry is already behind
            /// the clock never validates.
            #[test]
            fn expired_token_never_validates(hours_past in 1i64..=1000) {
                let config = TokenConfig::new(
                    "0123456789abcdef0123456789abcdef",
                    "bookforge",
                    "bookforge-clients",
                    Duration::hours(1),
                )
                .unwrap();
                let issuer = TokenIssuer::new(config.clone());
                let validator = TokenValidator::new(&config);

                let issued_at = Utc::now() - Duration::hours(1 + hours_past);
                let issued = issuer
                    .issue(&test_identity(Role::Member), SessionId::new(), issued_at)
                    .unwrap();

                prop_assert_eq!(validator.validate(&issued.token), Err(TokenError::Expired));
            }
        }
    }
}
