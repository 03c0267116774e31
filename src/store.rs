//! Durable record of article ids that have already been announced.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

/// Set of announced article ids, persisted as a JSON array.
///
/// Ids are kept in insertion order on disk. Nothing is ever removed.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    ids: Vec<String>,
    index: HashSet<String>,
    first_run: bool,
}

impl DedupStore {
    /// Load the store from `path`.
    ///
    /// A missing, unreadable or unparsable file yields an empty store in
    /// first-run state. Any file that parses, even `[]`, is not a first run.
    pub async fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        let parsed = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(ids) => Some(ids),
                Err(e) => {
                    info!("Ignoring unreadable store {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                debug!("No store at {}: {}", path.display(), e);
                None
            }
        };

        match parsed {
            Some(ids) => {
                let mut store = Self::empty(path, false);
                for id in ids {
                    store.add(id);
                }
                info!("Loaded {} previously posted articles", store.len());
                store
            }
            None => {
                info!("No previous articles found, starting fresh");
                Self::empty(path, true)
            }
        }
    }

    fn empty(path: PathBuf, first_run: bool) -> Self {
        Self {
            path,
            ids: Vec::new(),
            index: HashSet::new(),
            first_run,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Insert an id. Returns `false` if it was already present.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.contains(&id) {
            return false;
        }
        self.index.insert(id.clone());
        self.ids.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True while no store file has been read or seeded.
    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// Leave first-run state once the history has been seeded.
    pub fn mark_seeded(&mut self) {
        self.first_run = false;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Overwrite the store file with the full id list.
    ///
    /// Writes to a sibling temp file, syncs it, then renames it over the
    /// target so a crash never leaves a truncated store behind.
    pub async fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.ids)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(std::io::Error::other)??;

        debug!("Persisted {} ids to {}", self.ids.len(), self.path.display());
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = std::fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp_path, path));

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("posted_articles.json")
    }

    #[tokio::test]
    async fn test_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = DedupStore::load(store_path(&dir)).await;

        assert!(store.is_first_run());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        std::fs::write(&path, "{ not json").unwrap();

        let store = DedupStore::load(&path).await;
        assert!(store.is_first_run());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        std::fs::write(&path, r#"{"ids": ["a"]}"#).unwrap();

        let store = DedupStore::load(&path).await;
        assert!(store.is_first_run());
    }

    #[tokio::test]
    async fn test_empty_array_is_not_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        std::fs::write(&path, "[]").unwrap();

        let store = DedupStore::load(&path).await;
        assert!(!store.is_first_run());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DedupStore::load(store_path(&dir)).await;

        assert!(store.add("https://example.com/a"));
        assert!(!store.add("https://example.com/a"));
        assert_eq!(store.len(), 1);
        assert!(store.contains("https://example.com/a"));
        assert!(!store.contains("https://example.com/b"));
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        {
            let mut store = DedupStore::load(&path).await;
            store.add("X");
            store.add("Y");
            store.persist().await.unwrap();
        }

        let store = DedupStore::load(&path).await;
        assert!(!store.is_first_run());
        assert!(store.contains("X"));
        assert!(store.contains("Y"));
        assert_eq!(store.ids(), &["X".to_string(), "Y".to_string()]);
    }

    #[tokio::test]
    async fn test_persist_writes_json_array_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        let mut store = DedupStore::load(&path).await;
        store.add("c");
        store.add("a");
        store.add("b");
        store.persist().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(!dir.path().join("posted_articles.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_persist_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("posted.json");

        let mut store = DedupStore::load(&path).await;
        store.add("id");
        store.persist().await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("posted.json");

        let mut store = DedupStore::load(&path).await;
        store.add("kept");

        assert!(store.persist().await.is_err());
        assert!(store.contains("kept"));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posted.json");
        // A non-empty directory at the target makes the final rename fail
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "").unwrap();

        let mut store = DedupStore::load(&path).await;
        store.add("id");

        assert!(store.persist().await.is_err());
        assert!(!dir.path().join("posted.json.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[tokio::test]
    async fn test_mark_seeded_clears_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DedupStore::load(store_path(&dir)).await;

        assert!(store.is_first_run());
        store.mark_seeded();
        assert!(!store.is_first_run());
    }
}
