//! Unified gate error model and HTTP mapping.
//! Every middleware and extractor in this crate rejects with a [`GateError`]; the wire shape is
//! always `{"status":"error","message":...}` with `retryAfter` or `details` where they apply.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Single field-level complaint produced by body validation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Access denied. No token provided.")]
    NoCredential,
    #[error("Invalid token")]
    InvalidCredential,
    #[error("Token expired")]
    ExpiredCredential,
    #[error("Token is not valid. User not found.")]
    UnknownPrincipal,
    #[error("Account is deactivated. Please contact support.")]
    InactivePrincipal,
    #[error("Access denied. Authentication required.")]
    Unauthenticated,
    #[error("{message}")]
    Forbidden { message: String },
    #[error("Resource not found")]
    NotFound,
    #[error("{message}")]
    RateLimited { message: String, retry_after_secs: u64 },
    #[error("Validation error")]
    Validation { details: Vec<FieldError> },
    /// Detail stays in the source chain; the client only ever sees "Server error".
    #[error("Server error")]
    Internal(#[source] anyhow::Error),
}

impl GateError {
    pub fn forbidden_role(role: &str, action: &str) -> Self {
        GateError::Forbidden {
            message: format!("Access denied. {} role is not authorized for {}.", role, action),
        }
    }

    pub fn not_owner() -> Self {
        GateError::Forbidden {
            message: "Access denied. You can only access your own resources.".to_string(),
        }
    }

    pub fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        GateError::Internal(err.into())
    }

    /// Stable snake_case code, used as a structured log field.
    pub fn code_str(&self) -> &'static str {
        match self {
            GateError::NoCredential => "no_credential",
            GateError::InvalidCredential => "invalid_credential",
            GateError::ExpiredCredential => "expired_credential",
            GateError::UnknownPrincipal => "unknown_principal",
            GateError::InactivePrincipal => "inactive_principal",
            GateError::Unauthenticated => "unauthenticated",
            GateError::Forbidden { .. } => "forbidden",
            GateError::NotFound => "not_found",
            GateError::RateLimited { .. } => "rate_limited",
            GateError::Validation { .. } => "validation",
            GateError::Internal(_) => "internal",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            GateError::NoCredential
            | GateError::InvalidCredential
            | GateError::ExpiredCredential
            | GateError::UnknownPrincipal
            | GateError::InactivePrincipal
            | GateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GateError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GateError::NotFound => StatusCode::NOT_FOUND,
            GateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::Validation { .. } => StatusCode::BAD_REQUEST,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        let mut body = json!({ "status": "error", "message": self.to_string() });
        match self {
            GateError::RateLimited { retry_after_secs, .. } => {
                body["retryAfter"] = json!(retry_after_secs);
            }
            GateError::Validation { details } => {
                body["details"] = json!(details);
            }
            _ => {}
        }
        body
    }
}

pub type GateResult<T> = Result<T, GateError>;

impl From<anyhow::Error> for GateError {
    fn from(err: anyhow::Error) -> Self {
        GateError::Internal(err)
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        match &self {
            GateError::Internal(source) => {
                tracing::error!(error = ?source, code = self.code_str(), "request failed with internal error");
            }
            _ => {
                tracing::debug!(code = self.code_str(), status = status.as_u16(), "request rejected");
            }
        }
        let mut response = (status, Json(self.body())).into_response();
        if let GateError::RateLimited { retry_after_secs, .. } = &self {
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        response
    }
}
