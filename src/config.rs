use serde::Deserialize;

use crate::auth::provider::Provider;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Argon2 cost parameters. Fixed for the lifetime of a deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
}

/// Client credentials registered with one identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub oauth: Vec<OAuthClientConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "studio".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "studio-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 72 * 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 7 * 24 * 60),
        };
        let password = PasswordConfig {
            memory_kib: env_parse("ARGON2_MEMORY_KIB", argon2::Params::DEFAULT_M_COST),
            iterations: env_parse("ARGON2_ITERATIONS", argon2::Params::DEFAULT_T_COST),
        };

        let redirect_base = std::env::var("OAUTH_REDIRECT_BASE")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        let oauth = Provider::ALL
            .iter()
            .filter_map(|&provider| oauth_client_from_env(provider, &redirect_base))
            .collect();

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 3000),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            jwt,
            password,
            oauth,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// GOOGLE_KEY / GOOGLE_SECRET etc. A provider stays disabled unless both are set.
fn oauth_client_from_env(provider: Provider, redirect_base: &str) -> Option<OAuthClientConfig> {
    let prefix = provider.as_str().to_uppercase();
    let client_id = std::env::var(format!("{prefix}_KEY")).ok()?;
    let client_secret = std::env::var(format!("{prefix}_SECRET")).ok()?;
    Some(OAuthClientConfig {
        provider,
        client_id,
        client_secret,
        redirect_url: format!(
            "{}/auth/{}/callback",
            redirect_base.trim_end_matches('/'),
            provider.as_str()
        ),
    })
}
