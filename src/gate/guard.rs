//! Role guard middleware and principal extractors.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::GateError;
use crate::identity::{check_roles, Principal, Role};

/// Requires a principal (attached by `require_auth`) holding one of `roles`.
/// An empty role set only requires authentication.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    roles: Arc<[Role]>,
    action: Arc<str>,
}

impl RoleGuard {
    pub fn new(roles: &[Role], action: &str) -> Self {
        Self { roles: roles.into(), action: action.into() }
    }

    pub fn authenticated(action: &str) -> Self {
        Self::new(&[], action)
    }

    pub fn check(&self, principal: Option<&Principal>) -> Result<(), GateError> {
        let principal = principal.ok_or(GateError::Unauthenticated)?;
        check_roles(principal, &self.roles, &self.action)
    }
}

pub async fn require_roles(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    guard.check(request.extensions().get::<Principal>())?;
    Ok(next.run(request).await)
}

/// Handler extractor for a principal that must be present.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthUser)
            .ok_or(GateError::Unauthenticated)
    }
}

/// Handler extractor for routes behind `optional_auth`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Principal>().cloned()))
    }
}
