//! Ownership check middleware.
//!
//! Loads the entity named by the request path, confirms the caller owns it (or is an admin),
//! and hands the loaded entity to the handler as [`Loaded<E>`] so it is not fetched twice.
//! The owner field is named explicitly per route; there is no fallback to other fields.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::GateError;
use crate::identity::{check_owner, Principal};

/// Path parameters consulted for the entity id, in priority order.
pub const ID_PARAMS: [&str; 3] = ["id", "courseId", "resourceId"];

/// Entity whose owner can be read from a named field.
pub trait OwnedEntity: Clone + Send + Sync + 'static {
    fn owner_field(&self, field: &str) -> Option<&str>;
}

/// Persistence collaborator that loads an entity by id.
#[async_trait]
pub trait EntityLoader<E>: Send + Sync {
    async fn load(&self, id: &str) -> anyhow::Result<Option<E>>;
}

/// Entity loaded by the ownership check, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Loaded<E>(pub E);

pub struct OwnershipCheck<E> {
    loader: Arc<dyn EntityLoader<E>>,
    owner_field: &'static str,
}

impl<E> Clone for OwnershipCheck<E> {
    fn clone(&self) -> Self {
        Self { loader: self.loader.clone(), owner_field: self.owner_field }
    }
}

impl<E: OwnedEntity> OwnershipCheck<E> {
    pub fn new(loader: Arc<dyn EntityLoader<E>>, owner_field: &'static str) -> Self {
        Self { loader, owner_field }
    }

    pub fn owner_field(&self) -> &'static str { self.owner_field }

    /// Anonymous callers are refused before anything is loaded.
    pub async fn authorize(&self, principal: Option<&Principal>, id: Option<&str>) -> Result<E, GateError> {
        let principal = principal.ok_or(GateError::Unauthenticated)?;
        let id = id.ok_or(GateError::NotFound)?;
        let entity = self
            .loader
            .load(id)
            .await
            .map_err(GateError::internal)?
            .ok_or(GateError::NotFound)?;
        check_owner(principal, entity.owner_field(self.owner_field))?;
        Ok(entity)
    }
}

fn entity_id(params: &HashMap<String, String>) -> Option<&str> {
    ID_PARAMS.iter().find_map(|k| params.get(*k)).map(String::as_str)
}

pub async fn check_ownership<E: OwnedEntity>(
    State(check): State<OwnershipCheck<E>>,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let params = params.map(|Path(p)| p).unwrap_or_default();
    let entity = check
        .authorize(request.extensions().get::<Principal>(), entity_id(&params))
        .await?;
    debug!(owner_field = check.owner_field(), "ownership confirmed");
    request.extensions_mut().insert(Loaded(entity));
    Ok(next.run(request).await)
}
