//! One-file-per-entity JSON persistence.
//!
//! Every save rewrites the whole file: the value is serialized to a temporary sibling
//! and renamed over the target, so readers never observe a half-written entity.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::MemoryError;

const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Store rooted at `root/namespace/`. The directory is created lazily on first save.
    #[must_use]
    pub fn new(root: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            dir: root.as_ref().join(namespace),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        is_valid_id(id).then(|| self.dir.join(format!("{id}.json")))
    }

    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier, or serialization or the write fails.
    pub async fn save<T: Serialize + Sync>(&self, id: &str, value: &T) -> Result<(), MemoryError> {
        let path = self
            .path_for(id)
            .ok_or_else(|| MemoryError::InvalidId(id.to_owned()))?;
        let json = serde_json::to_vec_pretty(value)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.dir.join(format!(".{id}.json.tmp"));
        tokio::fs::write(&tmp, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(path = %path.display(), bytes = json.len(), "saved entity");
        Ok(())
    }

    /// Returns `Ok(None)` when no entity with this identifier exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>, MemoryError> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns `false` when there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let Some(path) = self.path_for(id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Identifiers of all persisted entities, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace directory exists but cannot be read.
    pub async fn list_ids(&self) -> Result<Vec<String>, MemoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && is_valid_id(stem)
            {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load every entity in the namespace. Files that fail to parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace directory cannot be listed.
    pub async fn load_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, MemoryError> {
        let mut out = Vec::new();
        for id in self.list_ids().await? {
            match self.load::<T>(&id).await {
                Ok(Some(value)) => out.push(value),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id = %id, dir = %self.dir.display(), "skipping unreadable entity: {e:#}");
                }
            }
        }
        Ok(out)
    }
}

/// Identifiers are restricted to `[A-Za-z0-9_-]` so they map to a file inside the namespace.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lowercase `name`, collapse runs of other characters into single dashes, and trim dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_ID_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
