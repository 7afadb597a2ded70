//! Consistent JSON error responses.
//!
//! Full context is logged server-side where errors originate; responses
//! carry only a category code and a generic message.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use bookforge_infra::command_dispatcher::DispatchError;

use crate::app::services::{LoginError, RegistrationError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        // Illegal state moves surface the current state so callers can
        // reconcile.
        DispatchError::InvalidTransition(msg) => {
            json_error(StatusCode::CONFLICT, "invalid_transition", msg)
        }
        // Uniform low-information answer; no oracle for code guessing.
        DispatchError::ClaimCodeMismatch => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "request could not be processed",
        ),
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn registration_error_to_response(err: RegistrationError) -> axum::response::Response {
    match err {
        RegistrationError::EmailTaken => {
            json_error(StatusCode::CONFLICT, "email_taken", "email already registered")
        }
        RegistrationError::Password(msg) => {
            tracing::error!("password facility failure: {msg}");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "registration failed",
            )
        }
        RegistrationError::Dispatch(e) => dispatch_error_to_response(e.0),
    }
}

pub fn login_error_to_response(err: LoginError) -> axum::response::Response {
    match err {
        LoginError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "invalid credentials",
        ),
        LoginError::Internal(msg) => {
            tracing::error!("login failure: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "login failed")
        }
    }
}

pub fn parse_order_status(s: &str) -> Result<bookforge_orders::OrderStatus, axum::response::Response> {
    use bookforge_orders::OrderStatus;
    match s {
        "pending" => Ok(OrderStatus::Pending),
        "confirmed" => Ok(OrderStatus::Confirmed),
        "completed" => Ok(OrderStatus::Completed),
        "cancelled" => Ok(OrderStatus::Cancelled),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: pending, confirmed, completed, cancelled",
        )),
    }
}

pub fn parse_role(s: &str) -> Result<bookforge_auth::Role, axum::response::Response> {
    s.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_role",
            "role must be one of: admin, staff, member",
        )
    })
}
