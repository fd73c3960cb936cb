use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, ApiResult},
    extract::IdPath,
    state::AppState,
};

/// Lets the request through only when the caller owns the artwork named by
/// the `:id` path segment. Must be layered inside `require_auth`.
pub async fn require_owner(
    State(state): State<AppState>,
    IdPath(artwork_id): IdPath,
    auth: AuthUser,
    req: Request,
    next: Next,
) -> ApiResult<Response> {
    let artwork = state
        .artworks
        .find_artwork(artwork_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Artwork not found"))?;

    if artwork.user_id != Some(auth.user_id) {
        warn!(artwork_id, user_id = auth.user_id, "caller does not own artwork");
        return Err(ApiError::forbidden("You are not the owner of this artwork"));
    }

    Ok(next.run(req).await)
}
