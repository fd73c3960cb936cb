use sqlx::FromRow;
use time::OffsetDateTime;

use super::provider::Provider;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: Option<String>, // Argon2 PHC string, absent for OAuth-only users
    pub email: Option<String>,
    pub superuser: bool,
    pub google_id: Option<String>,
    pub instagram_id: Option<String>,
    pub twitter_id: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn provider_id(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Google => self.google_id.as_deref(),
            Provider::Instagram => self.instagram_id.as_deref(),
            Provider::Twitter => self.twitter_id.as_deref(),
        }
    }

    pub fn set_provider_id(&mut self, provider: Provider, external_id: String) {
        let slot = match provider {
            Provider::Google => &mut self.google_id,
            Provider::Instagram => &mut self.instagram_id,
            Provider::Twitter => &mut self.twitter_id,
        };
        *slot = Some(external_id);
    }
}

/// Fields supplied when inserting a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub external: Option<(Provider, String)>,
}

/// Profile changes; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
}
