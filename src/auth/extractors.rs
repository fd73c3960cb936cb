use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::ApiError;

/// Identity of the caller, attached to the request by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a valid access token; otherwise stores
/// [`AuthUser`] in the request extensions and runs the rest of the stack.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = req.into_parts();

    let Some(token) = bearer_token(&parts) else {
        return Err(ApiError::unauthorized("Token not provided"));
    };

    let claims = keys.verify_access(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    parts.extensions.insert(AuthUser {
        user_id: claims.user_id,
    });
    Ok(next.run(Request::from_parts(parts, body)).await)
}
