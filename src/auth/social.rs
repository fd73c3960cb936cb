use anyhow::Context;
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::provider::Provider;
use crate::config::OAuthClientConfig;

/// Identity returned by a provider after a completed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialProfile {
    pub provider_user_id: String,
    pub name: String,
    pub email: Option<String>,
}

/// External OAuth collaborator.
#[async_trait]
pub trait SocialAuthenticator: Send + Sync {
    /// Whether client credentials exist for `provider`.
    fn is_configured(&self, provider: Provider) -> bool;

    /// URL the browser is redirected to. `state` doubles as the PKCE verifier.
    fn authorize_url(&self, provider: Provider, state: &str) -> anyhow::Result<String>;

    /// Exchanges the callback `code` and fetches the provider profile.
    async fn complete(
        &self,
        provider: Provider,
        code: &str,
        verifier: &str,
    ) -> anyhow::Result<SocialProfile>;
}

/// Random value for the `state` parameter, long enough to serve as a PKCE verifier.
pub fn new_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

struct Endpoints {
    authorize: &'static str,
    token: &'static str,
    userinfo: &'static str,
    scope: &'static str,
}

fn endpoints(provider: Provider) -> Endpoints {
    match provider {
        Provider::Google => Endpoints {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth",
            token: "https://oauth2.googleapis.com/token",
            userinfo: "https://openidconnect.googleapis.com/v1/userinfo",
            scope: "openid email profile",
        },
        Provider::Instagram => Endpoints {
            authorize: "https://api.instagram.com/oauth/authorize",
            token: "https://api.instagram.com/oauth/access_token",
            userinfo: "https://graph.instagram.com/me?fields=id,username",
            scope: "user_profile",
        },
        Provider::Twitter => Endpoints {
            authorize: "https://twitter.com/i/oauth2/authorize",
            token: "https://api.twitter.com/2/oauth2/token",
            userinfo: "https://api.twitter.com/2/users/me",
            scope: "users.read tweet.read",
        },
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    sub: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstagramUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct TwitterUserEnvelope {
    data: TwitterUser,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    id: String,
    name: String,
}

/// OAuth 2.0 authorization-code flow against the real providers.
pub struct HttpSocialAuthenticator {
    http: reqwest::Client,
    clients: Vec<OAuthClientConfig>,
}

impl HttpSocialAuthenticator {
    pub fn new(clients: Vec<OAuthClientConfig>) -> Self {
        Self {
            http: reqwest::Client::new(),
            clients,
        }
    }

    fn client(&self, provider: Provider) -> anyhow::Result<&OAuthClientConfig> {
        self.clients
            .iter()
            .find(|c| c.provider == provider)
            .with_context(|| format!("provider {provider} is not configured"))
    }

    async fn exchange_code(
        &self,
        provider: Provider,
        code: &str,
        verifier: &str,
    ) -> anyhow::Result<String> {
        let client = self.client(provider)?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", client.redirect_url.as_str()),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code_verifier", verifier),
        ];
        let token: TokenResponse = self
            .http
            .post(endpoints(provider).token)
            .basic_auth(&client.client_id, Some(&client.client_secret))
            .form(&form)
            .send()
            .await
            .context("token request")?
            .error_for_status()
            .context("token endpoint")?
            .json()
            .await
            .context("decode token response")?;
        Ok(token.access_token)
    }

    async fn fetch_profile(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> anyhow::Result<SocialProfile> {
        let resp = self
            .http
            .get(endpoints(provider).userinfo)
            .bearer_auth(access_token)
            .send()
            .await
            .context("userinfo request")?
            .error_for_status()
            .context("userinfo endpoint")?;

        let profile = match provider {
            Provider::Google => {
                let u: GoogleUser = resp.json().await.context("decode google user")?;
                SocialProfile {
                    name: u.name.unwrap_or_else(|| u.sub.clone()),
                    provider_user_id: u.sub,
                    email: u.email,
                }
            }
            Provider::Instagram => {
                let u: InstagramUser = resp.json().await.context("decode instagram user")?;
                SocialProfile {
                    provider_user_id: u.id,
                    name: u.username,
                    email: None,
                }
            }
            Provider::Twitter => {
                let u: TwitterUserEnvelope = resp.json().await.context("decode twitter user")?;
                SocialProfile {
                    provider_user_id: u.data.id,
                    name: u.data.name,
                    email: None,
                }
            }
        };
        Ok(profile)
    }
}

#[async_trait]
impl SocialAuthenticator for HttpSocialAuthenticator {
    fn is_configured(&self, provider: Provider) -> bool {
        self.client(provider).is_ok()
    }

    fn authorize_url(&self, provider: Provider, state: &str) -> anyhow::Result<String> {
        let client = self.client(provider)?;
        let url = reqwest::Url::parse_with_params(
            endpoints(provider).authorize,
            &[
                ("response_type", "code"),
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", client.redirect_url.as_str()),
                ("scope", endpoints(provider).scope),
                ("state", state),
                ("code_challenge", state),
                ("code_challenge_method", "plain"),
            ],
        )?;
        Ok(url.into())
    }

    #[instrument(skip(self, code, verifier))]
    async fn complete(
        &self,
        provider: Provider,
        code: &str,
        verifier: &str,
    ) -> anyhow::Result<SocialProfile> {
        let access_token = self.exchange_code(provider, code, verifier).await?;
        let profile = self.fetch_profile(provider, &access_token).await?;
        debug!(%provider, provider_user_id = %profile.provider_user_id, "social profile fetched");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> HttpSocialAuthenticator {
        HttpSocialAuthenticator::new(vec![OAuthClientConfig {
            provider: Provider::Google,
            client_id: "client-123".into(),
            client_secret: "shh".into(),
            redirect_url: "http://localhost:3000/auth/google/callback".into(),
        }])
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let url = authenticator()
            .authorize_url(Provider::Google, "abc")
            .unwrap();
        assert!(url.starts_with("https://accounts.google.com/"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=abc"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fgoogle%2Fcallback"));
        assert!(!url.contains("shh"));
    }

    #[test]
    fn unconfigured_provider_is_an_error() {
        assert!(authenticator().is_configured(Provider::Google));
        assert!(!authenticator().is_configured(Provider::Twitter));
        let err = authenticator()
            .authorize_url(Provider::Twitter, "abc")
            .unwrap_err();
        assert!(err.to_string().contains("twitter"));
    }

    #[test]
    fn state_is_a_valid_pkce_verifier() {
        let state = new_state();
        assert_eq!(state.len(), 64);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(state, new_state());
    }
}
