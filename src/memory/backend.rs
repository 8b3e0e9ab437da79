//! Document store backends
//!
//! The memory fabric talks to durable storage through [`DocumentStore`]:
//! keyed JSON documents grouped into collections, with optimistic version
//! checks on every write.
//!
//! File layout of [`FileBackend`]:
//! ```text
//! ~/.memgov/
//! ├── global/
//! │   ├── <record-id>.json
//! │   └── ...
//! ├── agent/
//! ├── project-<id>/
//! ├── knowledge/<category>.json
//! ├── patterns/consolidated.json
//! ├── governance/events.json
//! └── archive/<record-id>.json
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A stored document with its revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: String,
    /// Revision, starting at 1
    pub version: u64,
    pub body: Value,
}

/// Abstract durable key-value document store.
///
/// `expected_version` on [`put`](DocumentStore::put):
/// - `None` writes unconditionally
/// - `Some(0)` requires the document to be absent
/// - `Some(v)` requires the stored revision to be `v`
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write a document, returning its new revision.
    async fn put(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expected_version: Option<u64>,
    ) -> Result<u64>;

    /// Fetch one document.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// All documents of a collection, ordered by key.
    async fn scan(&self, collection: &str) -> Result<Vec<Document>>;

    /// Remove a document. Returns whether it existed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    /// Create an empty collection if missing.
    async fn create_collection(&self, collection: &str) -> Result<()>;

    /// Names of existing collections, sorted.
    async fn collections(&self) -> Result<Vec<String>>;
}

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

fn check_version(
    collection: &str,
    key: &str,
    current: Option<u64>,
    expected: Option<u64>,
) -> Result<u64> {
    let found = current.unwrap_or(0);
    if let Some(expected) = expected {
        if expected != found {
            return Err(Error::VersionConflict {
                collection: collection.to_string(),
                key: key.to_string(),
                expected: Some(expected),
                found: current,
            });
        }
    }
    Ok(found + 1)
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(Error::Store(format!("Invalid {} name: {:?}", kind, name)));
    }
    Ok(())
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Volatile backend over a `RwLock<BTreeMap>`
#[derive(Default)]
pub struct InMemoryBackend {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryBackend {
    async fn put(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expected_version: Option<u64>,
    ) -> Result<u64> {
        validate_name("collection", collection)?;
        validate_name("key", key)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let version = check_version(
            collection,
            key,
            docs.get(key).map(|d| d.version),
            expected_version,
        )?;
        docs.insert(
            key.to_string(),
            Document {
                key: key.to_string(),
                version,
                body,
            },
        );
        Ok(version)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(key))
            .is_some())
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        validate_name("collection", collection)?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }
}

// =============================================================================
// File backend
// =============================================================================

/// On-disk envelope of a document
#[derive(Serialize, Deserialize)]
struct StoredDocument {
    version: u64,
    body: Value,
}

/// JSON-file backend, one pretty-printed file per document.
///
/// All documents are loaded on open and served from memory; writes go to
/// disk before the in-memory map is updated.
pub struct FileBackend {
    base_dir: PathBuf,
    cache: Arc<RwLock<Collections>>,
}

impl FileBackend {
    /// Open (and create if needed) a store rooted at `base_dir`
    pub async fn open(base_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&base_dir).await?;
        let cache = Self::load_from_disk(&base_dir);
        tracing::debug!(
            dir = %base_dir.display(),
            collections = cache.len(),
            "Opened file document store"
        );
        Ok(Self {
            base_dir,
            cache: Arc::new(RwLock::new(cache)),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn load_from_disk(base_dir: &Path) -> Collections {
        let mut collections = Collections::new();
        let entries = match std::fs::read_dir(base_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read directory {}: {}", base_dir.display(), e);
                return collections;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            collections.insert(name.to_string(), Self::load_collection(&path));
        }
        collections
    }

    fn load_collection(dir: &Path) -> BTreeMap<String, Document> {
        let mut docs = BTreeMap::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read directory {}: {}", dir.display(), e);
                return docs;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(data) => match serde_json::from_str::<StoredDocument>(&data) {
                    Ok(stored) => {
                        docs.insert(
                            key.to_string(),
                            Document {
                                key: key.to_string(),
                                version: stored.version,
                                body: stored.body,
                            },
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                }
            }
        }
        docs
    }

    fn document_path(&self, collection: &str, key: &str) -> PathBuf {
        self.base_dir.join(collection).join(format!("{}.json", key))
    }
}

#[async_trait]
impl DocumentStore for FileBackend {
    async fn put(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expected_version: Option<u64>,
    ) -> Result<u64> {
        validate_name("collection", collection)?;
        validate_name("key", key)?;

        // Held across the disk write so the version check and the write are atomic.
        let mut cache = self.cache.write().await;
        let current = cache
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|d| d.version);
        let version = check_version(collection, key, current, expected_version)?;

        let stored = StoredDocument {
            version,
            body: body.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        tokio::fs::create_dir_all(self.base_dir.join(collection)).await?;
        tokio::fs::write(self.document_path(collection, key), json).await?;

        cache.entry(collection.to_string()).or_default().insert(
            key.to_string(),
            Document {
                key: key.to_string(),
                version,
                body,
            },
        );
        Ok(version)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let cache = self.cache.read().await;
        Ok(cache
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Document>> {
        let cache = self.cache.read().await;
        Ok(cache
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut cache = self.cache.write().await;
        let existed = cache
            .get_mut(collection)
            .and_then(|docs| docs.remove(key))
            .is_some();
        if existed {
            match tokio::fs::remove_file(self.document_path(collection, key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(existed)
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        validate_name("collection", collection)?;
        tokio::fs::create_dir_all(self.base_dir.join(collection)).await?;
        self.cache
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<String>> {
        Ok(self.cache.read().await.keys().cloned().collect())
    }
}
