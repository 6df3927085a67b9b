// src/storage/kv.rs
//! Key-value persistence for per-voter state. Values are small JSON documents.
use dashmap::DashMap;
use log::{debug, info};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("vote store io error: {0}")]
    Io(#[from] io::Error),
    #[error("vote store is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<(), KvError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), KvError> {
        (**self).set(key, value)
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, Value>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), KvError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Keeps the whole map in memory and rewrites the backing file on each `set`.
/// Concurrent writers are last-write-wins. `set` does blocking file io, so
/// async callers should run it off the executor (`web::block`).
pub struct FileKvStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
}

impl FileKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Loaded {} vote entries from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, Value>) -> Result<(), KvError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Flushed {} vote entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), KvError> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        // memory only changes once the file has it
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

/// Namespaces every key under a prefix, giving each voter a private view of a
/// shared store.
pub struct ScopedStore<S> {
    inner: S,
    scope: String,
}

impl<S: KeyValueStore> ScopedStore<S> {
    pub fn new(inner: S, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}/{}", self.scope, key)
    }
}

impl<S: KeyValueStore> KeyValueStore for ScopedStore<S> {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), KvError> {
        self.inner.set(&self.key(key), value)
    }
}
