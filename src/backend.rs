//! Generic JSON collection storage consumed by the inspection store.
//!
//! Every collection is one JSON document. Writers supply a mutator that
//! receives the whole current document and returns its replacement.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt collection: {0}")]
    Corrupt(String),
}

pub type Mutator = Box<dyn FnOnce(Value) -> Value + Send>;

#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// The full document for `collection`; an empty object if it was never written.
    async fn read(&self, collection: &str) -> Result<Value, BackendError>;

    /// Replace `collection` with `mutator(current)` and return the new document.
    async fn update(&self, collection: &str, mutator: Mutator) -> Result<Value, BackendError>;
}

/// Stores each collection as `<dir>/<collection>.json`.
pub struct JsonFileBackend {
    dir: PathBuf,
    // serialises read-modify-write within this process
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    async fn load(&self, path: &Path) -> Result<Value, BackendError> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(json!({})),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(json!({})),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PersistenceBackend for JsonFileBackend {
    async fn read(&self, collection: &str) -> Result<Value, BackendError> {
        self.load(&self.path_for(collection)).await
    }

    async fn update(&self, collection: &str, mutator: Mutator) -> Result<Value, BackendError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(collection);
        let current = self.load(&path).await?;
        let next = mutator(current);

        tokio::fs::create_dir_all(&self.dir).await?;
        // write then rename so a crash never leaves a half-written document
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&next)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(collection, path = %path.display(), "Collection written");
        Ok(next)
    }
}

/// In-process backend that counts calls and can be switched to fail.
#[derive(Default)]
pub struct MemoryBackend {
    collections: DashMap<String, Value>,
    reads: AtomicUsize,
    updates: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, collection: &str, document: Value) -> Self {
        self.collections.insert(collection.to_string(), document);
        self
    }

    /// Make every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.read_count() + self.update_count()
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("memory backend set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn read(&self, collection: &str) -> Result<Value, BackendError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .collections
            .get(collection)
            .map(|doc| doc.value().clone())
            .unwrap_or_else(|| json!({})))
    }

    async fn update(&self, collection: &str, mutator: Mutator) -> Result<Value, BackendError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        // the entry guard holds the shard lock for the whole read-modify-write
        let mut doc = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| json!({}));
        let next = mutator(std::mem::take(doc.value_mut()));
        *doc.value_mut() = next.clone();
        Ok(next)
    }
}
