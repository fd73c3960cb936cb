use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument, warn};

use super::dto::{MessageResponse, ProfileResponse, UpdateProfileRequest};
use crate::{
    artworks::repo_types::{Artwork, ArtworkQuery},
    auth::{
        dto::{CallbackParams, LinkedResponse},
        extractors::{require_auth, AuthUser},
        handlers::{complete_social, enabled_provider, take_oauth_state},
        repo_types::UserChanges,
        services,
    },
    error::{ApiError, ApiResult},
    extract::{ApiJson, IdPath},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(get_profile))
        .route("/users/:id/artworks", get(list_user_artworks))
}

pub fn write_routes(state: &AppState) -> Router<AppState> {
    // matchit needs one parameter name per position, so the link route's
    // `:id` segment carries the provider name.
    Router::new()
        .route("/users/:id", patch(update_profile))
        .route("/users/:id/link", post(link_social))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<ProfileResponse>> {
    state
        .users
        .find_user(id)
        .await?
        .map(|u| Json(u.into()))
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if auth.user_id != id {
        warn!(user_id = auth.user_id, target_id = id, "profile update for another user");
        return Err(ApiError::forbidden("You can only update your own profile"));
    }

    // Passwords are taken verbatim; only usernames are trimmed.
    let password_hash = match payload.password.filter(|p| !p.is_empty()) {
        Some(password) => Some(state.passwords.hash_blocking(password).await?),
        None => None,
    };
    let username = payload
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let changes = UserChanges {
        username,
        password_hash,
    };

    state
        .users
        .update_user(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = id, "profile updated");
    Ok(Json(MessageResponse {
        message: "Profile updated successfully",
    }))
}

#[instrument(skip(state))]
pub async fn list_user_artworks(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<Vec<Artwork>>> {
    let artworks = state
        .artworks
        .list_artworks(&ArtworkQuery::by_author(id))
        .await?;
    Ok(Json(artworks))
}

#[instrument(skip(state, jar, payload))]
pub async fn link_social(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    auth: AuthUser,
    jar: CookieJar,
    ApiJson(payload): ApiJson<CallbackParams>,
) -> ApiResult<(CookieJar, Json<LinkedResponse>)> {
    let provider = enabled_provider(&state, &provider)?;
    let (jar, verifier) = take_oauth_state(jar, provider, &payload.state)?;
    let profile = complete_social(&state, provider, &payload.code, &verifier).await?;

    let user = services::link_social(&state, auth.user_id, provider, profile).await?;
    Ok((
        jar,
        Json(LinkedResponse {
            message: "Social account linked",
            user: user.into(),
        }),
    ))
}
