//! Actor identity extraction
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user's id in the `X-Actor-Id` header. Production and ledger writes record
//! that id as the performing actor.

use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Extractor for the acting user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentActor(pub Uuid);

impl CurrentActor {
    pub fn from_parts(parts: &Parts) -> Result<Self, AppError> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(CurrentActor)
            .ok_or(AppError::MissingActor)
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        CurrentActor::from_parts(parts)
    }
}
