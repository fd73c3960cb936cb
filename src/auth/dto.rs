use serde::{Deserialize, Serialize};

use super::repo_types::User;

/// Request body for registration and login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Query string the provider appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
}

/// Account view after a social login or link; never includes secrets.
#[derive(Debug, Serialize)]
pub struct SocialUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_id: Option<String>,
}

impl From<User> for SocialUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            google_id: u.google_id,
            instagram_id: u.instagram_id,
            twitter_id: u.twitter_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SocialLoginResponse {
    pub access_token: String,
    pub user: SocialUser,
}

#[derive(Debug, Serialize)]
pub struct LinkedResponse {
    pub message: &'static str,
    pub user: SocialUser,
}
