use anyhow::Context;
use bytes::Bytes;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};
use tracing::{error, info, warn};

use super::{
    dto::ListParams,
    repo_types::{Artwork, ArtworkQuery, NewArtwork, SortOrder, UPLOADS_PREFIX},
};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// An uploaded image as read from the multipart body.
pub struct UploadItem {
    pub file_name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

fn positive_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn non_blank(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses one end of a date range. Accepts RFC 3339 timestamps or plain
/// `YYYY-MM-DD` dates; a plain date used as the upper bound covers the whole day.
fn parse_bound(raw: &str, upper: bool) -> ApiResult<OffsetDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }
    let date = Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::bad_request(format!("invalid date: {raw}")))?;
    let at = if upper {
        date.with_hms_nano(23, 59, 59, 999_999_999)
            .map_err(|e| ApiError::Internal(e.into()))?
    } else {
        date.midnight()
    };
    Ok(at.assume_utc())
}

impl ListParams {
    pub fn page(&self) -> i64 {
        positive_or(self.page.as_deref(), DEFAULT_PAGE)
    }

    pub fn limit(&self) -> i64 {
        positive_or(self.limit.as_deref(), DEFAULT_LIMIT).min(MAX_LIMIT)
    }

    /// Filter and sort without a window.
    pub fn to_query(&self) -> ApiResult<ArtworkQuery> {
        let author = match non_blank(&self.author) {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| ApiError::bad_request("author must be a user id"))?,
            ),
            None => None,
        };

        // A one-sided range is ignored.
        let created = match (non_blank(&self.from), non_blank(&self.to)) {
            (Some(from), Some(to)) => Some((parse_bound(from, false)?, parse_bound(to, true)?)),
            _ => None,
        };

        Ok(ArtworkQuery {
            title: non_blank(&self.title).map(str::to_string),
            author,
            created,
            sort: SortOrder::parse(self.sort.as_deref()),
            limit: None,
            offset: 0,
        })
    }

    pub fn to_page_query(&self) -> ApiResult<ArtworkQuery> {
        let (page, limit) = (self.page(), self.limit());
        Ok(ArtworkQuery {
            limit: Some(limit),
            offset: (page - 1).saturating_mul(limit),
            ..self.to_query()?
        })
    }
}

pub fn top_limit(raw: Option<&str>) -> i64 {
    positive_or(raw, DEFAULT_LIMIT).min(MAX_LIMIT)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// `<nanos>_<name>` where `name` is the client file name reduced to a safe
/// single path component.
pub fn stored_file_name(nanos: i128, original: &str, content_type: Option<&str>) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let name = if cleaned.is_empty() {
        let ext = content_type.and_then(ext_from_mime).unwrap_or("bin");
        format!("image.{ext}")
    } else {
        cleaned.to_string()
    };
    format!("{nanos}_{name}")
}

pub async fn create_artwork(
    st: &AppState,
    owner: i64,
    title: String,
    caption: String,
    upload: UploadItem,
) -> ApiResult<Artwork> {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let key = stored_file_name(nanos, &upload.file_name, upload.content_type.as_deref());

    st.images
        .put_object(&key, upload.body)
        .await
        .with_context(|| format!("save image {key}"))?;

    let created = st
        .artworks
        .create_artwork(NewArtwork {
            title,
            caption,
            image_url: format!("{UPLOADS_PREFIX}{key}"),
            user_id: owner,
        })
        .await;

    match created {
        Ok(artwork) => {
            info!(artwork_id = artwork.id, user_id = owner, %key, "artwork created");
            Ok(artwork)
        }
        Err(e) => {
            // Drop the file that no row points at.
            let cleanup = async {
                st.images.trash(&key).await?;
                st.images.purge(&key).await?;
                anyhow::Ok(())
            };
            if let Err(cleanup_err) = cleanup.await {
                warn!(error = %cleanup_err, %key, "orphaned upload left behind");
            }
            Err(e.into())
        }
    }
}

/// Two-phase delete: the image is moved aside, the row removed, then the
/// image purged. A failed row delete puts the image back.
pub async fn delete_artwork(st: &AppState, id: i64) -> ApiResult<()> {
    let artwork = st
        .artworks
        .find_artwork(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Artwork not found"))?;
    let key = artwork.image_key().map(str::to_string);

    if let Some(key) = &key {
        st.images
            .trash(key)
            .await
            .with_context(|| format!("delete image file {key}"))?;
    }

    let deleted = match st.artworks.delete_artwork(id).await {
        Ok(deleted) => deleted,
        Err(e) => {
            if let Some(key) = &key {
                if let Err(restore_err) = st.images.restore(key).await {
                    error!(error = %restore_err, %key, artwork_id = id, "image restore failed");
                }
            }
            return Err(e.into());
        }
    };

    if let Some(key) = &key {
        if let Err(e) = st.images.purge(key).await {
            warn!(error = %e, %key, "trashed image not purged");
        }
    }

    if !deleted {
        return Err(ApiError::not_found("Artwork not found"));
    }
    info!(artwork_id = id, "artwork deleted");
    Ok(())
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_gallery(artworks: &[Artwork]) -> String {
    let mut html = String::from(
        "<html><body><h1>Gallery</h1><div style='display: flex; flex-wrap: wrap;'>",
    );
    for art in artworks {
        html.push_str(&format!(
            "<div style='margin:10px; text-align:center'>\
             <img src='{}' style='max-width:200px; max-height:200px; display:block;' />\
             <h3>{}</h3><p>{}</p><p>Likes: {}</p></div>",
            escape_html(&art.image_url),
            escape_html(&art.title),
            escape_html(&art.caption),
            art.likes,
        ));
    }
    html.push_str("</div></body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut p = ListParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "page" => p.page = v,
                "limit" => p.limit = v,
                "title" => p.title = v,
                "author" => p.author = v,
                "from" => p.from = v,
                "to" => p.to = v,
                "sort" => p.sort = v,
                other => panic!("unknown param {other}"),
            }
        }
        p
    }

    #[test]
    fn pagination_falls_back_silently() {
        let q = params(&[]).to_page_query().unwrap();
        assert_eq!((q.limit, q.offset), (Some(10), 0));

        let q = params(&[("page", "abc"), ("limit", "-3")]).to_page_query().unwrap();
        assert_eq!((q.limit, q.offset), (Some(10), 0));

        let q = params(&[("page", "2"), ("limit", "5")]).to_page_query().unwrap();
        assert_eq!((q.limit, q.offset), (Some(5), 5));

        assert_eq!(params(&[("limit", "5000")]).limit(), MAX_LIMIT);
    }

    #[test]
    fn one_sided_range_is_ignored() {
        let q = params(&[("from", "2024-01-01")]).to_query().unwrap();
        assert!(q.created.is_none());
        let q = params(&[("to", "2024-01-01")]).to_query().unwrap();
        assert!(q.created.is_none());
    }

    #[test]
    fn date_only_upper_bound_covers_the_day() {
        let q = params(&[("from", "2024-01-01"), ("to", "2024-01-31")])
            .to_query()
            .unwrap();
        let (from, to) = q.created.unwrap();
        assert_eq!(from, datetime!(2024-01-01 0:00 UTC));
        assert_eq!(to, datetime!(2024-01-31 23:59:59.999999999 UTC));
    }

    #[test]
    fn accepts_rfc3339_bounds() {
        let q = params(&[("from", "2024-01-01T10:00:00Z"), ("to", "2024-01-02T00:00:00+02:00")])
            .to_query()
            .unwrap();
        let (from, to) = q.created.unwrap();
        assert_eq!(from, datetime!(2024-01-01 10:00 UTC));
        assert_eq!(to, datetime!(2024-01-01 22:00 UTC));
    }

    #[test]
    fn rejects_garbage_author_and_dates() {
        assert!(params(&[("author", "bob")]).to_query().is_err());
        assert!(params(&[("from", "yesterday"), ("to", "2024-01-01")])
            .to_query()
            .is_err());
    }

    #[test]
    fn filters_and_sort_are_carried() {
        let q = params(&[("title", " sun "), ("author", "4"), ("sort", "likes_asc")])
            .to_query()
            .unwrap();
        assert_eq!(q.title.as_deref(), Some("sun"));
        assert_eq!(q.author, Some(4));
        assert_eq!(q.sort, SortOrder::LikesAsc);
        assert_eq!(q.limit, None);
    }

    #[test]
    fn stored_file_name_is_a_single_safe_component() {
        assert_eq!(stored_file_name(7, "cat.png", None), "7_cat.png");
        assert_eq!(stored_file_name(7, "../../etc/passwd", None), "7_passwd");
        assert_eq!(stored_file_name(7, "C:\\pics\\my cat.jpg", None), "7_my_cat.jpg");
        assert_eq!(stored_file_name(7, "..", Some("image/png")), "7_image.png");
        assert_eq!(stored_file_name(7, "", None), "7_image.bin");
    }

    #[test]
    fn gallery_escapes_user_text() {
        let art = Artwork {
            id: 1,
            title: "<script>alert(1)</script>".into(),
            caption: "Tom & Jerry".into(),
            image_url: "/uploads/1_a.png' onerror='x".into(),
            likes: 3,
            user_id: Some(1),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let html = render_gallery(&[art]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Tom &amp; Jerry"));
        assert!(html.contains("&#39; onerror=&#39;x"));
        assert!(html.contains("Likes: 3"));
    }
}
