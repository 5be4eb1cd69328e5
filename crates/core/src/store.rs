use crate::traits::DocumentStore;
use crate::StoreError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

/// Uploaded documents kept as plain files under one root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name == ".." {
            return Err(StoreError::InvalidName(file_name.to_string()));
        }

        let target = self.root.join(file_name);
        if tokio::fs::try_exists(&target).await? {
            info!(path = %target.display(), "overwriting existing document");
        }

        // Readers only ever see the old file or the complete new one.
        let staging = self.root.join(format!(".{}.upload", Uuid::new_v4()));
        tokio::fs::write(&staging, bytes).await?;
        if let Err(error) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error.into());
        }

        debug!(path = %target.display(), size = bytes.len(), "document saved");
        Ok(target)
    }

    fn list(&self, allowed_extensions: &[String]) -> Vec<PathBuf> {
        discover_documents(&self.root, allowed_extensions)
    }
}

pub fn discover_documents(folder: &Path, allowed_extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let allowed = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                allowed_extensions
                    .iter()
                    .any(|candidate| ext.eq_ignore_ascii_case(candidate))
            });

        if allowed {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
