// src/store.rs
//! Artifact store: opaque key -> bytes.
//!
//! The store gives atomic get/put per key and nothing across keys. The file-backed
//! implementation writes through a temp file + rename so a reader never sees a
//! half-written artifact.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_HTML: &str = "text/html";

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
}

pub type DynArtifactStore = Arc<dyn ArtifactStore>;

// ------------------------------------------------------------
// File store
// ------------------------------------------------------------

/// Keys like `article:abc` map to `<root>/article/abc`. Every segment is
/// reduced to `[A-Za-z0-9_.-]` so keys can never escape the root.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split(':') {
            path.push(sanitize_segment(segment));
        }
        path
    }
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // "." and ".." would resolve outside the intended directory
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

/// Each write gets its own temp file next to the target, so concurrent puts of
/// one key never share a partial file; the last rename wins whole.
async fn write_atomically(path: PathBuf, bytes: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp file in {}", parent.display()))?;
        tmp.write_all(&bytes)
            .with_context(|| format!("writing temp file for {}", path.display()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    })
    .await
    .context("artifact writer task")?
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading artifact {}", path.display())),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let len = bytes.len();
        write_atomically(path, bytes).await?;
        tracing::debug!(key, content_type, bytes = len, "artifact stored");
        Ok(())
    }
}

// ------------------------------------------------------------
// In-memory store (tests, local runs)
// ------------------------------------------------------------

#[derive(Default)]
pub struct MemoryArtifactStore {
    items: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|(_, ct)| ct.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, String)>> {
        match self.items.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().get(key).map(|(b, _)| b.clone()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.lock()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_nested_sanitized_paths() {
        let store = FsArtifactStore::new("/tmp/root");
        assert_eq!(
            store.path_for("article:dQw4w9WgXcQ"),
            PathBuf::from("/tmp/root/article/dQw4w9WgXcQ")
        );
        assert_eq!(
            store.path_for("article:../../etc/passwd"),
            PathBuf::from("/tmp/root/article/.._.._etc_passwd")
        );
        assert_eq!(store.path_for("x:.."), PathBuf::from("/tmp/root/x/__"));
    }

    #[tokio::test]
    async fn fs_store_roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(store.get("article:nope").await.unwrap().is_none());
        store
            .put("article:abc", b"hello".to_vec(), CONTENT_TYPE_JSON)
            .await
            .unwrap();
        assert_eq!(
            store.get("article:abc").await.unwrap().as_deref(),
            Some(&b"hello"[..])
        );
        // no temp file left behind
        let names: Vec<_> = std::fs::read_dir(dir.path().join("article"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("abc")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_of_one_key_all_succeed_and_leave_one_whole_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsArtifactStore::new(dir.path()));
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 256 * 1024]).collect();

        let mut set = tokio::task::JoinSet::new();
        for payload in payloads.clone() {
            let store = store.clone();
            set.spawn(async move { store.put("article:same", payload, CONTENT_TYPE_JSON).await });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap().unwrap();
        }

        let stored = store.get("article:same").await.unwrap().unwrap();
        assert!(payloads.contains(&stored));
        assert_eq!(std::fs::read_dir(dir.path().join("article")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn memory_store_keeps_content_type() {
        let store = MemoryArtifactStore::new();
        store
            .put("page_source:q_0", b"<html/>".to_vec(), CONTENT_TYPE_HTML)
            .await
            .unwrap();
        assert_eq!(store.content_type("page_source:q_0").as_deref(), Some("text/html"));
        assert_eq!(store.len(), 1);
    }
}
