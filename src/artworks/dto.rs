use serde::{Deserialize, Serialize};

use super::repo_types::Artwork;

/// Raw listing query string. Everything arrives as text so that bad
/// pagination values can fall back to defaults instead of rejecting.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopParams {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditArtworkRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArtworkPage {
    pub page: i64,
    pub limit: i64,
    pub count: usize,
    pub results: Vec<Artwork>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub message: &'static str,
    pub likes: i64,
}
