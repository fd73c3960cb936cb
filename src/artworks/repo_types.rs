use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// URL prefix under which uploaded images are served.
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// Artwork record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Artwork {
    pub id: i64,
    pub title: String,
    pub caption: String,
    pub image_url: String,
    pub likes: i64,
    pub user_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Artwork {
    /// Storage key of the backing image, if the record has one.
    pub fn image_key(&self) -> Option<&str> {
        self.image_url
            .strip_prefix(UPLOADS_PREFIX)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewArtwork {
    pub title: String,
    pub caption: String,
    pub image_url: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    LikesDesc,
    LikesAsc,
    CreatedAsc,
    #[default]
    CreatedDesc,
}

impl SortOrder {
    /// Unknown keys fall back to newest first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("likes_desc") => SortOrder::LikesDesc,
            Some("likes_asc") => SortOrder::LikesAsc,
            Some("created_asc") => SortOrder::CreatedAsc,
            _ => SortOrder::CreatedDesc,
        }
    }

    /// ORDER BY clause; ties break on id in the same direction.
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::LikesDesc => "likes DESC, id DESC",
            SortOrder::LikesAsc => "likes ASC, id ASC",
            SortOrder::CreatedAsc => "created_at ASC, id ASC",
            SortOrder::CreatedDesc => "created_at DESC, id DESC",
        }
    }
}

/// Filter, order and window for artwork listings.
#[derive(Debug, Clone, Default)]
pub struct ArtworkQuery {
    /// Substring of the title.
    pub title: Option<String>,
    pub author: Option<i64>,
    /// Inclusive creation-time range.
    pub created: Option<(OffsetDateTime, OffsetDateTime)>,
    pub sort: SortOrder,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl ArtworkQuery {
    pub fn by_author(author: i64) -> Self {
        Self {
            author: Some(author),
            ..Self::default()
        }
    }

    pub fn top(limit: i64) -> Self {
        Self {
            sort: SortOrder::LikesDesc,
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Reference implementation of the filter, used by in-memory stores.
    pub fn matches(&self, a: &Artwork) -> bool {
        if let Some(title) = &self.title {
            if !a.title.contains(title.as_str()) {
                return false;
            }
        }
        if let Some(author) = self.author {
            if a.user_id != Some(author) {
                return false;
            }
        }
        if let Some((from, to)) = self.created {
            if a.created_at < from || a.created_at > to {
                return false;
            }
        }
        true
    }
}
