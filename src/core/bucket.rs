use std::path::PathBuf;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};

/// An image selected for upload
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub content_type: String,

    #[serde(default)]
    pub bytes: Vec<u8>,
}

/// On-disk object storage for the local backend
#[derive(Debug, Clone)]
pub struct ImageBucket {
    root: PathBuf,
    public_base: String,
}

impl ImageBucket {
    pub fn new(root: PathBuf, public_base: &str) -> Self {
        ImageBucket {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// Stores an object under `key`. Existing objects are never overwritten.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> anyhow::Result<String> {
        if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
            return Err(anyhow!("Invalid object key {}", key));
        }

        fs::create_dir_all(&self.root).await?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(key))
            .await
            .map_err(|e| anyhow!("Failed to store object {}: {}", key, e))?;

        file.write_all(bytes).await?;
        file.flush().await?;

        log::debug!("Stored object {} ({} bytes)", key, bytes.len());
        Ok(key.to_string())
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
