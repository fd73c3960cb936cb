use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::repo_types::{Artwork, ArtworkQuery, NewArtwork};
use crate::db::{PgStore, StoreResult};

const ARTWORK_COLUMNS: &str = "id, title, caption, image_url, likes, user_id, created_at";

#[async_trait]
pub trait ArtworkRepo: Send + Sync {
    async fn create_artwork(&self, new: NewArtwork) -> StoreResult<Artwork>;
    async fn find_artwork(&self, id: i64) -> StoreResult<Option<Artwork>>;
    async fn list_artworks(&self, query: &ArtworkQuery) -> StoreResult<Vec<Artwork>>;
    /// Overwrites the given fields; `None` keeps the stored value.
    async fn update_artwork(
        &self,
        id: i64,
        title: Option<String>,
        caption: Option<String>,
    ) -> StoreResult<Option<Artwork>>;
    /// Adds one like and returns the new count.
    async fn like_artwork(&self, id: i64) -> StoreResult<Option<i64>>;
    /// Returns false when no row matched.
    async fn delete_artwork(&self, id: i64) -> StoreResult<bool>;
}

// Escapes LIKE metacharacters so the title filter is a literal substring match.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn select_query(query: &ArtworkQuery) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {ARTWORK_COLUMNS} FROM artworks WHERE TRUE"));
    if let Some(title) = &query.title {
        qb.push(" AND title LIKE ").push_bind(like_pattern(title));
    }
    if let Some(author) = query.author {
        qb.push(" AND user_id = ").push_bind(author);
    }
    if let Some((from, to)) = query.created {
        qb.push(" AND created_at BETWEEN ")
            .push_bind(from)
            .push(" AND ")
            .push_bind(to);
    }
    qb.push(" ORDER BY ").push(query.sort.sql());
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    if query.offset > 0 {
        qb.push(" OFFSET ").push_bind(query.offset);
    }
    qb
}

#[async_trait]
impl ArtworkRepo for PgStore {
    async fn create_artwork(&self, new: NewArtwork) -> StoreResult<Artwork> {
        let artwork = sqlx::query_as::<_, Artwork>(&format!(
            r#"
            INSERT INTO artworks (title, caption, image_url, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {ARTWORK_COLUMNS}
            "#
        ))
        .bind(new.title)
        .bind(new.caption)
        .bind(new.image_url)
        .bind(new.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(artwork)
    }

    async fn find_artwork(&self, id: i64) -> StoreResult<Option<Artwork>> {
        let artwork = sqlx::query_as::<_, Artwork>(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(artwork)
    }

    async fn list_artworks(&self, query: &ArtworkQuery) -> StoreResult<Vec<Artwork>> {
        let rows = select_query(query)
            .build_query_as::<Artwork>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_artwork(
        &self,
        id: i64,
        title: Option<String>,
        caption: Option<String>,
    ) -> StoreResult<Option<Artwork>> {
        let artwork = sqlx::query_as::<_, Artwork>(&format!(
            r#"
            UPDATE artworks
               SET title = COALESCE($2, title),
                   caption = COALESCE($3, caption)
             WHERE id = $1
            RETURNING {ARTWORK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(title)
        .bind(caption)
        .fetch_optional(&self.pool)
        .await?;
        Ok(artwork)
    }

    async fn like_artwork(&self, id: i64) -> StoreResult<Option<i64>> {
        let likes = sqlx::query_scalar::<_, i64>(
            "UPDATE artworks SET likes = likes + 1 WHERE id = $1 RETURNING likes",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(likes)
    }

    async fn delete_artwork(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM artworks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
