use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{instrument, warn};

use super::{
    dto::{
        AccessToken, CallbackParams, CredentialsRequest, PublicUser, RefreshRequest,
        RegisteredResponse, SocialLoginResponse, TokenPair,
    },
    jwt::JwtKeys,
    provider::Provider,
    services,
    social::{new_state, SocialProfile},
};
use crate::{
    error::{ApiError, ApiResult},
    extract::ApiJson,
    state::AppState,
};

const STATE_COOKIE: &str = "oauth_state";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/auth/:provider", get(social_begin))
        .route("/auth/:provider/callback", get(social_callback))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<RegisteredResponse>)> {
    let user = services::register(&state, &payload.username, payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            message: "User created successfully",
            user: PublicUser {
                id: user.id,
                username: user.username,
            },
        }),
    ))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = services::login(&state, &payload.username, payload.password).await?;
    Ok(Json(pair))
}

#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> ApiResult<Json<AccessToken>> {
    let access_token = services::refresh(&state, &payload.refresh_token).await?;
    Ok(Json(AccessToken { access_token }))
}

/// Parses the provider name and requires client credentials for it.
pub(crate) fn enabled_provider(state: &AppState, raw: &str) -> ApiResult<Provider> {
    let provider = raw
        .parse::<Provider>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    if !state.social.is_configured(provider) {
        return Err(ApiError::bad_request(format!(
            "provider {provider} is not configured"
        )));
    }
    Ok(provider)
}

// The cookie binds the state to the provider that issued it.
fn state_cookie_value(provider: Provider, oauth_state: &str) -> String {
    format!("{provider}:{oauth_state}")
}

/// Checks the `state` echoed by the provider against the cookie set when the
/// flow began. Returns the verifier and a jar with the cookie cleared.
pub(crate) fn take_oauth_state(
    jar: CookieJar,
    provider: Provider,
    presented: &str,
) -> ApiResult<(CookieJar, String)> {
    let expected = state_cookie_value(provider, presented);
    let valid = !presented.is_empty()
        && jar
            .get(STATE_COOKIE)
            .is_some_and(|c| c.value() == expected);
    if !valid {
        return Err(ApiError::unauthorized("invalid OAuth state"));
    }
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/"));
    Ok((jar, presented.to_string()))
}

/// Runs the provider exchange; any collaborator failure is an authentication failure.
pub(crate) async fn complete_social(
    state: &AppState,
    provider: Provider,
    code: &str,
    verifier: &str,
) -> ApiResult<SocialProfile> {
    state
        .social
        .complete(provider, code, verifier)
        .await
        .map_err(|e| {
            warn!(error = %format!("{e:#}"), %provider, "social login failed");
            ApiError::unauthorized("social login failed")
        })
}

#[instrument(skip(state, jar))]
pub async fn social_begin(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Redirect)> {
    let provider = enabled_provider(&state, &provider)?;
    let oauth_state = new_state();
    let url = state
        .social
        .authorize_url(provider, &oauth_state)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let cookie = Cookie::build((STATE_COOKIE, state_cookie_value(provider, &oauth_state)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(10))
        .build();
    Ok((jar.add(cookie), Redirect::to(&url)))
}

#[instrument(skip(state, jar, params))]
pub async fn social_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<SocialLoginResponse>)> {
    let provider = enabled_provider(&state, &provider)?;
    let (jar, verifier) = take_oauth_state(jar, provider, &params.state)?;
    let profile = complete_social(&state, provider, &params.code, &verifier).await?;

    let user = services::social_login(&state, provider, profile).await?;
    let access_token = JwtKeys::from(&state.config.jwt).sign_access(user.id)?;

    Ok((
        jar,
        Json(SocialLoginResponse {
            access_token,
            user: user.into(),
        }),
    ))
}
