use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Identity providers supported for social login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Instagram,
    Twitter,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Instagram, Provider::Twitter];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Instagram => "instagram",
            Provider::Twitter => "twitter",
        }
    }

    /// Column of `users` holding this provider's external id.
    pub fn id_column(self) -> &'static str {
        match self {
            Provider::Google => "google_id",
            Provider::Instagram => "instagram_id",
            Provider::Twitter => "twitter_id",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}
