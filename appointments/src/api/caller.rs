//! Caller identity extractor.

use super::error::ApiError;
use crate::types::UserId;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Header carrying the acting user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf a request acts.
///
/// Read from the `X-User-Id` header. Authentication happens upstream; this
/// service only uses the id to decide which party is acting.
///
/// # Example
///
/// ```ignore
/// async fn handler(Caller(user): Caller) -> String {
///     format!("acting as {user}")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(UserId::new)
            .filter(|id| !id.is_blank())
            .map(Self)
            .ok_or_else(|| ApiError::bad_request("X-User-Id header is required", &["X-User-Id"]))
    }
}
