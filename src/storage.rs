use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;

/// Image file storage. Keys are bare file names under the upload root.
///
/// Deletion is split in two so callers can undo it: `trash` moves the file
/// aside, then either `purge` drops it for good or `restore` puts it back.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<()>;
    async fn trash(&self, key: &str) -> anyhow::Result<()>;
    async fn restore(&self, key: &str) -> anyhow::Result<()>;
    async fn purge(&self, key: &str) -> anyhow::Result<()>;
}

const TRASH_SUFFIX: &str = ".trash";

/// Stores images as plain files in one directory.
#[derive(Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty() && !key.contains(['/', '\\']) && key != "." && key != "..",
            "invalid storage key {key:?}"
        );
        Ok(self.root.join(key))
    }

    fn trash_path_of(&self, key: &str) -> anyhow::Result<PathBuf> {
        self.path_of(&format!("{key}{TRASH_SUFFIX}"))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.path_of(key)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn trash(&self, key: &str) -> anyhow::Result<()> {
        let from = self.path_of(key)?;
        let to = self.trash_path_of(key)?;
        tokio::fs::rename(&from, &to)
            .await
            .with_context(|| format!("move {} aside", from.display()))?;
        Ok(())
    }

    async fn restore(&self, key: &str) -> anyhow::Result<()> {
        let from = self.trash_path_of(key)?;
        let to = self.path_of(key)?;
        tokio::fs::rename(&from, &to)
            .await
            .with_context(|| format!("restore {}", to.display()))?;
        Ok(())
    }

    async fn purge(&self, key: &str) -> anyhow::Result<()> {
        let path = self.trash_path_of(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> LocalImageStore {
        let dir = std::env::temp_dir().join(format!("studio-test-{}", uuid::Uuid::new_v4()));
        LocalImageStore::new(dir).await.unwrap()
    }

    #[tokio::test]
    async fn put_trash_restore_purge() {
        let store = temp_store().await;
        let file = store.root().join("1_cat.png");

        store
            .put_object("1_cat.png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&file).await.unwrap(), b"png");

        store.trash("1_cat.png").await.unwrap();
        assert!(!file.exists());

        store.restore("1_cat.png").await.unwrap();
        assert!(file.exists());

        store.trash("1_cat.png").await.unwrap();
        store.purge("1_cat.png").await.unwrap();
        assert!(!file.exists());
        assert!(!store.root().join("1_cat.png.trash").exists());

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn trash_of_missing_file_fails() {
        let store = temp_store().await;
        assert!(store.trash("nope.png").await.is_err());
        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_keys_that_escape_the_root() {
        let store = temp_store().await;
        for key in ["", "..", "../etc/passwd", "a/b.png", "a\\b.png"] {
            assert!(
                store.put_object(key, Bytes::new()).await.is_err(),
                "key {key:?} accepted"
            );
        }
        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }
}
