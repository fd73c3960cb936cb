//! In-memory collaborators used by the router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::artworks::{
    repo::ArtworkRepo,
    repo_types::{Artwork, ArtworkQuery, NewArtwork, SortOrder},
};
use crate::auth::{
    provider::Provider,
    repo::UserRepo,
    repo_types::{NewUser, User, UserChanges},
    social::{SocialAuthenticator, SocialProfile},
};
use crate::db::{StoreError, StoreResult};
use crate::storage::ImageStore;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    artworks: Vec<Artwork>,
    next_user_id: i64,
    next_artwork_id: i64,
}

impl Tables {
    fn check_unique(&self, candidate: &User) -> StoreResult<()> {
        for other in self.users.iter().filter(|u| u.id != candidate.id) {
            if other.username == candidate.username {
                return Err(StoreError::Conflict("username".into()));
            }
            if candidate.email.is_some() && other.email == candidate.email {
                return Err(StoreError::Conflict("email".into()));
            }
            for provider in Provider::ALL {
                let id = candidate.provider_id(provider);
                if id.is_some() && other.provider_id(provider) == id {
                    return Err(StoreError::Conflict(provider.id_column().into()));
                }
            }
        }
        Ok(())
    }
}

/// Both repositories over plain vectors, with the same unique and foreign
/// key rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_artwork_deletes: AtomicBool,
}

impl MemoryStore {
    /// Makes every later `delete_artwork` return a store error.
    pub fn fail_artwork_deletes(&self) {
        self.fail_artwork_deletes.store(true, Ordering::SeqCst);
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables();
        let mut user = User {
            id: t.next_user_id + 1,
            username: new.username,
            password_hash: new.password_hash,
            email: new.email,
            superuser: false,
            google_id: None,
            instagram_id: None,
            twitter_id: None,
            refresh_token: None,
            created_at: OffsetDateTime::now_utc(),
        };
        if let Some((provider, external_id)) = new.external {
            user.set_provider_id(provider, external_id);
        }
        t.check_unique(&user)?;
        t.next_user_id = user.id;
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_user_by_provider(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.provider_id(provider) == Some(external_id))
            .cloned())
    }

    async fn set_refresh_token(&self, id: i64, token: &str) -> StoreResult<()> {
        if let Some(user) = self.tables().users.iter_mut().find(|u| u.id == id) {
            user.refresh_token = Some(token.to_string());
        }
        Ok(())
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut t = self.tables();
        let Some(mut user) = t.users.iter().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = Some(hash);
        }
        t.check_unique(&user)?;
        if let Some(slot) = t.users.iter_mut().find(|u| u.id == id) {
            *slot = user.clone();
        }
        Ok(Some(user))
    }

    async fn link_provider(
        &self,
        id: i64,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<Option<User>> {
        let mut t = self.tables();
        let Some(mut user) = t.users.iter().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        user.set_provider_id(provider, external_id.to_string());
        t.check_unique(&user)?;
        if let Some(slot) = t.users.iter_mut().find(|u| u.id == id) {
            *slot = user.clone();
        }
        Ok(Some(user))
    }
}

#[async_trait]
impl ArtworkRepo for MemoryStore {
    async fn create_artwork(&self, new: NewArtwork) -> StoreResult<Artwork> {
        let mut t = self.tables();
        if !t.users.iter().any(|u| u.id == new.user_id) {
            return Err(anyhow!("artworks_user_id_fkey violated").into());
        }
        t.next_artwork_id += 1;
        let artwork = Artwork {
            id: t.next_artwork_id,
            title: new.title,
            caption: new.caption,
            image_url: new.image_url,
            likes: 0,
            user_id: Some(new.user_id),
            created_at: OffsetDateTime::now_utc(),
        };
        t.artworks.push(artwork.clone());
        Ok(artwork)
    }

    async fn find_artwork(&self, id: i64) -> StoreResult<Option<Artwork>> {
        Ok(self.tables().artworks.iter().find(|a| a.id == id).cloned())
    }

    async fn list_artworks(&self, query: &ArtworkQuery) -> StoreResult<Vec<Artwork>> {
        let mut rows: Vec<Artwork> = self
            .tables()
            .artworks
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        match query.sort {
            SortOrder::LikesDesc => rows.sort_by(|a, b| (b.likes, b.id).cmp(&(a.likes, a.id))),
            SortOrder::LikesAsc => rows.sort_by_key(|a| (a.likes, a.id)),
            SortOrder::CreatedAsc => rows.sort_by_key(|a| (a.created_at, a.id)),
            SortOrder::CreatedDesc => {
                rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            }
        }
        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = query
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_artwork(
        &self,
        id: i64,
        title: Option<String>,
        caption: Option<String>,
    ) -> StoreResult<Option<Artwork>> {
        let mut t = self.tables();
        let Some(artwork) = t.artworks.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            artwork.title = title;
        }
        if let Some(caption) = caption {
            artwork.caption = caption;
        }
        Ok(Some(artwork.clone()))
    }

    async fn like_artwork(&self, id: i64) -> StoreResult<Option<i64>> {
        let mut t = self.tables();
        Ok(t.artworks.iter_mut().find(|a| a.id == id).map(|a| {
            a.likes += 1;
            a.likes
        }))
    }

    async fn delete_artwork(&self, id: i64) -> StoreResult<bool> {
        if self.fail_artwork_deletes.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset").into());
        }
        let mut t = self.tables();
        let before = t.artworks.len();
        t.artworks.retain(|a| a.id != id);
        Ok(t.artworks.len() < before)
    }
}

#[derive(Default)]
struct Objects {
    live: HashMap<String, Bytes>,
    trashed: HashMap<String, Bytes>,
}

#[derive(Default)]
pub struct MemoryImageStore {
    objects: Mutex<Objects>,
}

impl MemoryImageStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects().live.contains_key(key)
    }

    pub fn live_count(&self) -> usize {
        self.objects().live.len()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<()> {
        self.objects().live.insert(key.to_string(), body);
        Ok(())
    }

    async fn trash(&self, key: &str) -> anyhow::Result<()> {
        let mut o = self.objects();
        let Some(body) = o.live.remove(key) else {
            bail!("no such object {key}");
        };
        o.trashed.insert(key.to_string(), body);
        Ok(())
    }

    async fn restore(&self, key: &str) -> anyhow::Result<()> {
        let mut o = self.objects();
        let Some(body) = o.trashed.remove(key) else {
            bail!("no trashed object {key}");
        };
        o.live.insert(key.to_string(), body);
        Ok(())
    }

    async fn purge(&self, key: &str) -> anyhow::Result<()> {
        self.objects()
            .trashed
            .remove(key)
            .map(drop)
            .ok_or_else(|| anyhow!("no trashed object {key}"))
    }
}

/// Provider stand-in. The authorization `code` becomes the provider user id;
/// the code `"denied"` fails the exchange.
#[derive(Default)]
pub struct FakeSocialAuthenticator;

#[async_trait]
impl SocialAuthenticator for FakeSocialAuthenticator {
    fn is_configured(&self, _provider: Provider) -> bool {
        true
    }

    fn authorize_url(&self, provider: Provider, state: &str) -> anyhow::Result<String> {
        Ok(format!("https://{provider}.example/authorize?state={state}"))
    }

    async fn complete(
        &self,
        provider: Provider,
        code: &str,
        _verifier: &str,
    ) -> anyhow::Result<SocialProfile> {
        if code == "denied" {
            bail!("{provider} rejected the code");
        }
        Ok(SocialProfile {
            provider_user_id: code.to_string(),
            name: format!("{provider} fan"),
            email: Some(format!("{code}@{provider}.example")),
        })
    }
}
