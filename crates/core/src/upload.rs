use crate::index::IndexHandle;
use crate::store::digest_bytes;
use crate::traits::DocumentStore;
use crate::{UploadError, UploadedDocument, DEFAULT_ALLOWED_EXTENSIONS};
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
    unsafe_chars: Regex,
}

impl UploadPolicy {
    pub fn new<I, S>(allowed_extensions: I) -> Result<Self, UploadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            allowed_extensions,
            unsafe_chars: Regex::new(r"[^A-Za-z0-9_.-]")?,
        })
    }

    pub fn with_defaults() -> Result<Self, UploadError> {
        Self::new(DEFAULT_ALLOWED_EXTENSIONS)
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn is_allowed(&self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }

    /// Reduces a client-supplied name to a flat, ASCII-only file name.
    ///
    /// Accented letters are decomposed first so `é` keeps its base `e`.
    pub fn sanitize(&self, file_name: &str) -> String {
        let ascii: String = file_name.nfkd().filter(char::is_ascii).collect();
        let flattened = ascii.replace(['/', '\\'], " ");
        let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
        self.unsafe_chars
            .replace_all(&joined, "")
            .trim_matches(|c| c == '.' || c == '_')
            .to_string()
    }
}

pub struct UploadCoordinator {
    store: Arc<dyn DocumentStore>,
    index: IndexHandle,
    policy: UploadPolicy,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, index: IndexHandle, policy: UploadPolicy) -> Self {
        Self {
            store,
            index,
            policy,
        }
    }

    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<UploadedDocument, UploadError> {
        if file_name.is_empty() {
            return Err(UploadError::Validation("No file selected".to_string()));
        }
        if !self.policy.is_allowed(file_name) {
            return Err(UploadError::Validation("File type not allowed".to_string()));
        }

        let sanitized = self.policy.sanitize(file_name);
        if !self.policy.is_allowed(&sanitized) {
            return Err(UploadError::Validation("File type not allowed".to_string()));
        }

        let path = self.store.save(&sanitized, bytes).await?;
        let document = UploadedDocument {
            file_name: sanitized,
            path,
            size_bytes: bytes.len() as u64,
            checksum: digest_bytes(bytes),
            uploaded_at: Utc::now(),
        };

        // The saved file stays on disk when indexing fails.
        if let Err(error) = self.index.add_document(&document.path).await {
            warn!(
                file = %document.file_name,
                index = %self.index.name(),
                %error,
                "document saved but not indexed"
            );
            return Err(UploadError::Index(error));
        }

        info!(
            file = %document.file_name,
            index = %self.index.name(),
            size = document.size_bytes,
            "document uploaded and indexed"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RetrievalIndex;
    use crate::{IndexError, SearchResult, StoreError};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from("docs").join(file_name))
        }

        fn list(&self, _allowed_extensions: &[String]) -> Vec<PathBuf> {
            Vec::new()
        }
    }

    struct FakeIndex {
        fail: bool,
        added: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl RetrievalIndex for FakeIndex {
        fn name(&self) -> &str {
            "test"
        }

        async fn exists(&self) -> Result<bool, IndexError> {
            Ok(true)
        }

        async fn add_document(&self, path: &Path) -> Result<(), IndexError> {
            if self.fail {
                return Err(IndexError::Request("model unavailable".to_string()));
            }
            self.added.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>, IndexError> {
            Ok(Vec::new())
        }
    }

    async fn coordinator(
        fail: bool,
    ) -> (UploadCoordinator, Arc<FakeStore>, Arc<Mutex<Vec<PathBuf>>>) {
        let store = Arc::new(FakeStore::default());
        let added = Arc::new(Mutex::new(Vec::new()));
        let index = IndexHandle::load_or_build(
            Box::new(FakeIndex {
                fail,
                added: added.clone(),
            }),
            &[],
        )
        .await
        .expect("index should load");
        let policy = UploadPolicy::with_defaults().expect("policy");
        let coordinator = UploadCoordinator::new(store.clone(), index, policy);
        (coordinator, store, added)
    }

    #[test]
    fn sanitize_strips_separators_and_unsafe_characters() {
        let policy = UploadPolicy::with_defaults().expect("policy");
        assert_eq!(policy.sanitize("../../etc/passwd.pdf"), "etc_passwd.pdf");
        assert_eq!(policy.sanitize("my report (v2).pdf"), "my_report_v2.pdf");
        assert_eq!(policy.sanitize("C:\\docs\\scan.PNG"), "C_docs_scan.PNG");
        assert_eq!(policy.sanitize("..hidden.jpg"), "hidden.jpg");
        assert_eq!(policy.sanitize("résumé.pdf"), "resume.pdf");
        assert_eq!(policy.sanitize("Straße ﬁnal.png"), "Strae_final.png");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let policy = UploadPolicy::with_defaults().expect("policy");
        assert!(policy.is_allowed("scan.JPEG"));
        assert!(policy.is_allowed("doc.pdf"));
        assert!(!policy.is_allowed("archive.zip"));
        assert!(!policy.is_allowed("pdf"));
    }

    #[test]
    fn custom_policy_normalizes_extensions() {
        let policy = UploadPolicy::new([" .PDF", "", "tiff"]).expect("policy");
        assert_eq!(policy.allowed_extensions(), ["pdf".to_string(), "tiff".to_string()]);
    }

    #[tokio::test]
    async fn disallowed_extension_writes_nothing() {
        let (coordinator, store, added) = coordinator(false).await;

        for name in ["notes.txt", "binary.exe", "noextension", "..", "/.pdf"] {
            let result = coordinator.upload(name, b"payload").await;
            assert!(
                matches!(result, Err(UploadError::Validation(_))),
                "{name} should be rejected"
            );
        }

        assert!(store.saved.lock().unwrap().is_empty());
        assert!(added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_name_is_rejected_as_no_file_selected() {
        let (coordinator, _, _) = coordinator(false).await;
        let error = coordinator.upload("", b"payload").await.unwrap_err();
        assert_eq!(error.to_string(), "No file selected");
    }

    #[tokio::test]
    async fn accepted_upload_is_saved_then_indexed() {
        let (coordinator, store, added) = coordinator(false).await;

        let document = coordinator
            .upload("Quarterly Report.pdf", b"%PDF-1.4")
            .await
            .expect("upload should succeed");

        assert_eq!(document.file_name, "Quarterly_Report.pdf");
        assert_eq!(document.size_bytes, 8);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
        assert_eq!(
            added.lock().unwrap().as_slice(),
            [PathBuf::from("docs/Quarterly_Report.pdf")]
        );
    }

    #[tokio::test]
    async fn index_failure_keeps_saved_file() {
        let (coordinator, store, _) = coordinator(true).await;

        let error = coordinator
            .upload("scan.png", b"png")
            .await
            .expect_err("indexing should fail");

        assert!(matches!(error, UploadError::Index(_)));
        assert!(error.to_string().starts_with("File uploaded but indexing failed"));
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }
}
