//! Bearer-token authentication middleware.
//!
//! The enforcement chokepoint runs as an explicit ordered sequence of gate
//! steps - extract, validate, session liveness - each a plain function
//! returning allow/deny. Per-operation permission checks follow in the
//! handlers (the required permission varies per route); public routes never
//! enter this middleware.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use bookforge_auth::{ClaimSet, TokenValidator};
use bookforge_infra::session_store::{SessionStore, token_fingerprint};

#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<TokenValidator>,
    pub sessions: Arc<SessionStore>,
    /// Deployment toggle: when off, cryptographic validity alone is honored
    /// (stateless tokens, no revocation).
    pub enforce_sessions: bool,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // Gate step 1: bearer extraction.
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(status) => {
            tracing::warn!(uri = %req.uri(), "request without usable bearer token");
            return Err(status);
        }
    };

    // Gate step 2: cryptographic validation (signature, issuer/audience,
    // expiry). Subtypes are logged for diagnostics; the caller always sees
    // plain 401.
    let claims: ClaimSet = match state.validator.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, uri = %req.uri(), "token rejected");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // Gate step 3: session liveness + fingerprint cross-check. A revoked or
    // expired session defeats an otherwise valid token.
    if state.enforce_sessions {
        let session_id = claims.session_id();
        if !state.sessions.is_active(session_id, Utc::now())
            || !state
                .sessions
                .fingerprint_matches(session_id, &token_fingerprint(token))
        {
            tracing::warn!(
                user_id = %claims.user_id(),
                session_id = %session_id,
                "session revoked, expired, or fingerprint mismatch"
            );
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_unauthorized() {
        assert_eq!(
            extract_bearer(&HeaderMap::new()).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn non_bearer_scheme_is_unauthorized() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert_eq!(
            extract_bearer(&headers).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn empty_bearer_value_is_unauthorized() {
        let headers = headers_with("Bearer    ");
        assert_eq!(
            extract_bearer(&headers).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }
}
