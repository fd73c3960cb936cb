use tracing::{info, warn};

use super::{
    dto::TokenPair,
    jwt::JwtKeys,
    provider::Provider,
    repo_types::{NewUser, User},
    social::SocialProfile,
};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "invalid username or password";

pub async fn register(st: &AppState, username: &str, password: String) -> ApiResult<User> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let hash = st.passwords.hash_blocking(password).await?;
    let user = st
        .users
        .create_user(NewUser {
            username: username.to_string(),
            password_hash: Some(hash),
            ..NewUser::default()
        })
        .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Issues a fresh token pair and makes the new refresh token the only valid one.
pub async fn login(st: &AppState, username: &str, password: String) -> ApiResult<TokenPair> {
    let Some(user) = st.users.find_user_by_username(username.trim()).await? else {
        warn!(username, "login unknown username");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let Some(hash) = user.password_hash.clone() else {
        warn!(user_id = user.id, "login for account without local password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !st.passwords.verify_blocking(password, hash).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let keys = JwtKeys::from(&st.config.jwt);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    st.users.set_refresh_token(user.id, &refresh_token).await?;

    info!(user_id = user.id, "user logged in");
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Exchanges the current refresh token for a new access token. The refresh
/// token itself is not rotated.
pub async fn refresh(st: &AppState, refresh_token: &str) -> ApiResult<String> {
    let keys = JwtKeys::from(&st.config.jwt);
    let claims = keys.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        ApiError::unauthorized("Invalid refresh token")
    })?;

    let user = st.users.find_user(claims.user_id).await?;
    match user {
        Some(u) if u.refresh_token.as_deref() == Some(refresh_token) => {
            Ok(keys.sign_access(u.id)?)
        }
        _ => {
            warn!(user_id = claims.user_id, "refresh token does not match stored token");
            Err(ApiError::unauthorized("Invalid refresh token"))
        }
    }
}

/// Finds the user owning this provider identity, creating one on first login.
pub async fn social_login(
    st: &AppState,
    provider: Provider,
    profile: SocialProfile,
) -> ApiResult<User> {
    let external_id = profile.provider_user_id;
    if let Some(user) = st.users.find_user_by_provider(provider, &external_id).await? {
        return Ok(user);
    }

    let email = match profile.email.filter(|e| !e.trim().is_empty()) {
        Some(e) if st.users.find_user_by_email(&e).await?.is_none() => Some(e),
        _ => None,
    };

    let name = profile.name.trim();
    let base = if name.is_empty() {
        format!("{provider}_{external_id}")
    } else {
        name.to_string()
    };
    let username = if st.users.find_user_by_username(&base).await?.is_some() {
        format!("{base}_{external_id}")
    } else {
        base
    };

    let user = st
        .users
        .create_user(NewUser {
            username,
            password_hash: None,
            email,
            external: Some((provider, external_id)),
        })
        .await?;

    info!(user_id = user.id, %provider, "user created from social login");
    Ok(user)
}

pub async fn link_social(
    st: &AppState,
    user_id: i64,
    provider: Provider,
    profile: SocialProfile,
) -> ApiResult<User> {
    let external_id = profile.provider_user_id;
    if let Some(owner) = st.users.find_user_by_provider(provider, &external_id).await? {
        if owner.id != user_id {
            return Err(ApiError::Conflict(format!(
                "{provider} account is linked to another user"
            )));
        }
    }

    let user = st
        .users
        .link_provider(user_id, provider, &external_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id, %provider, "social account linked");
    Ok(user)
}
