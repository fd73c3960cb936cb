use async_trait::async_trait;

use super::{
    provider::Provider,
    repo_types::{NewUser, User, UserChanges},
};
use crate::db::{PgStore, StoreResult};

const USER_COLUMNS: &str = "id, username, password_hash, email, superuser, \
     google_id, instagram_id, twitter_id, refresh_token, created_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_provider(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<Option<User>>;
    /// Replaces the single stored refresh token.
    async fn set_refresh_token(&self, id: i64, token: &str) -> StoreResult<()>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn link_provider(
        &self,
        id: i64,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<Option<User>>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let (google_id, instagram_id, twitter_id) = match new.external {
            Some((Provider::Google, id)) => (Some(id), None, None),
            Some((Provider::Instagram, id)) => (None, Some(id), None),
            Some((Provider::Twitter, id)) => (None, None, Some(id)),
            None => (None, None, None),
        };
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, email, google_id, instagram_id, twitter_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.email)
        .bind(google_id)
        .bind(instagram_id)
        .bind(twitter_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_provider(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<Option<User>> {
        // id_column() only yields fixed column names.
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} = $1",
            provider.id_column()
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: i64, token: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   password_hash = COALESCE($3, password_hash)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn link_provider(
        &self,
        id: i64,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET {} = $2 WHERE id = $1 RETURNING {USER_COLUMNS}",
            provider.id_column()
        ))
        .bind(id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
