//! Remote storage for user media (avatars and cover images).
//!
//! An upload takes a staged local file and returns the `MediaAsset` handle
//! that later deletes it. Backends: local disk served under `/media`, or
//! Cloudinary.

pub mod cloudinary;
pub mod disk;

pub use cloudinary::CloudinaryObjectStore;
pub use disk::DiskObjectStore;

use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use crate::{
    config::{Config, ObjectStoreKind},
    models::media::MediaAsset,
};

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The store refused this particular file (empty, wrong type, bad id).
    #[error("object rejected: {0}")]
    Rejected(String),

    /// The store could not be reached or failed on its side.
    #[error("object store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<MediaAsset, ObjectStoreError>;

    /// Deleting an object that is already gone succeeds.
    async fn delete(&self, public_id: &str) -> Result<(), ObjectStoreError>;

    /// Recovers the delete handle from a URL this store produced earlier.
    fn public_id_from_url(&self, url: &str) -> Option<String>;
}

pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.object_store {
        ObjectStoreKind::Disk => Arc::new(DiskObjectStore::new(
            config.media_dir.clone(),
            config.media_base_url.clone(),
        )),
        ObjectStoreKind::Cloudinary => {
            let creds = config
                .cloudinary
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Cloudinary credentials are not configured"))?;
            Arc::new(CloudinaryObjectStore::new(creds)?)
        }
    };
    Ok(store)
}
