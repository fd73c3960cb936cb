use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Html,
    routing::{get, patch, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::instrument;

use super::{
    dto::{ArtworkPage, EditArtworkRequest, LikeResponse, ListParams, TopParams},
    ownership::require_owner,
    repo_types::{Artwork, ArtworkQuery},
    services::{self, UploadItem},
};
use crate::{
    auth::extractors::{require_auth, AuthUser},
    error::{ApiError, ApiResult},
    extract::{ApiJson, IdPath},
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/artworks", get(list_artworks))
        .route("/artworks/filter", get(filter_artworks))
        .route("/artworks/:id", get(get_artwork))
        .route("/artworks/:id/like", post(like_artwork))
        .route("/top-artworks", get(top_artworks))
        .route("/gallery", get(gallery))
}

pub fn write_routes(state: &AppState) -> Router<AppState> {
    let auth = from_fn_with_state(state.clone(), require_auth);

    let create = Router::new()
        .route("/artworks", post(create_artwork))
        .route_layer(auth.clone())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    // route_layer order: the last one added runs first.
    let owned = Router::new()
        .route("/artworks/:id", patch(edit_artwork).delete(delete_artwork))
        .route_layer(from_fn_with_state(state.clone(), require_owner))
        .route_layer(auth);

    create.merge(owned)
}

async fn field_text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

/// POST /artworks (multipart: title, caption, image)
#[instrument(skip(state, multipart))]
pub async fn create_artwork(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Artwork>)> {
    let mut multipart = multipart?;
    let mut title = String::new();
    let mut caption = String::new();
    let mut image: Option<UploadItem> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = field_text(field).await?,
            "caption" => caption = field_text(field).await?,
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let body: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                image = Some(UploadItem {
                    file_name,
                    content_type,
                    body,
                });
            }
            _ => {}
        }
    }

    let image = image
        .filter(|i| !i.body.is_empty())
        .ok_or_else(|| ApiError::bad_request("image file is required"))?;

    let artwork = services::create_artwork(&state, auth.user_id, title, caption, image).await?;
    Ok((StatusCode::CREATED, Json(artwork)))
}

#[instrument(skip(state))]
pub async fn list_artworks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ArtworkPage>> {
    let query = params.to_page_query()?;
    let results = state.artworks.list_artworks(&query).await?;
    Ok(Json(ArtworkPage {
        page: params.page(),
        limit: params.limit(),
        count: results.len(),
        results,
    }))
}

#[instrument(skip(state))]
pub async fn filter_artworks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Artwork>>> {
    let query = params.to_query()?;
    Ok(Json(state.artworks.list_artworks(&query).await?))
}

#[instrument(skip(state))]
pub async fn top_artworks(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> ApiResult<Json<Vec<Artwork>>> {
    let query = ArtworkQuery::top(services::top_limit(params.limit.as_deref()));
    Ok(Json(state.artworks.list_artworks(&query).await?))
}

#[instrument(skip(state))]
pub async fn get_artwork(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<Artwork>> {
    state
        .artworks
        .find_artwork(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Artwork not found"))
}

#[instrument(skip(state, payload))]
pub async fn edit_artwork(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ApiJson(payload): ApiJson<EditArtworkRequest>,
) -> ApiResult<Json<Artwork>> {
    let title = payload.title.filter(|t| !t.is_empty());
    let caption = payload.caption.filter(|c| !c.is_empty());
    state
        .artworks
        .update_artwork(id, title, caption)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Artwork not found"))
}

#[instrument(skip(state))]
pub async fn delete_artwork(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<StatusCode> {
    services::delete_artwork(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn like_artwork(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<LikeResponse>> {
    let likes = state
        .artworks
        .like_artwork(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Artwork not found"))?;
    Ok(Json(LikeResponse {
        message: "Artwork liked successfully",
        likes,
    }))
}

#[instrument(skip(state))]
pub async fn gallery(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let artworks = state.artworks.list_artworks(&ArtworkQuery::default()).await?;
    Ok(Html(services::render_gallery(&artworks)))
}
