use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::{ObjectStore, ObjectStoreError};
use crate::models::media::MediaAsset;

/// Stores media as flat files under `root`, addressed as `{base_url}/{public_id}`.
#[derive(Debug, Clone)]
pub struct DiskObjectStore {
    root: PathBuf,
    base_url: String,
}

impl DiskObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, public_id: &str) -> Result<PathBuf, ObjectStoreError> {
        if !is_valid_public_id(public_id) {
            return Err(ObjectStoreError::Rejected(format!("invalid object id: {public_id}")));
        }
        Ok(self.root.join(public_id))
    }
}

/// Flat names only: no separators, no parent references.
fn is_valid_public_id(public_id: &str) -> bool {
    !public_id.is_empty()
        && !public_id.starts_with('.')
        && public_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn upload(&self, path: &Path) -> Result<MediaAsset, ObjectStoreError> {
        let metadata = fs::metadata(path).await?;
        if metadata.len() == 0 {
            return Err(ObjectStoreError::Rejected("empty file".into()));
        }

        let public_id = match extension_of(path) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        fs::create_dir_all(&self.root).await?;
        fs::copy(path, self.root.join(&public_id)).await?;

        Ok(MediaAsset {
            url: format!("{}/{}", self.base_url, public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(public_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_id_from_url(&self, url: &str) -> Option<String> {
        let public_id = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        is_valid_public_id(public_id).then(|| public_id.to_string())
    }
}
