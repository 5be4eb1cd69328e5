use crate::traits::RetrievalIndex;
use crate::{IndexError, SearchResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Loaded,
    Built { documents: usize, skipped: usize },
}

/// Process-wide handle to the retrieval index.
///
/// Additions take the write side of the lock and searches the read side, so a
/// search never runs against a document that is only partly added.
#[derive(Clone)]
pub struct IndexHandle {
    inner: Arc<RwLock<Box<dyn RetrievalIndex>>>,
    name: Arc<str>,
    origin: IndexOrigin,
}

impl IndexHandle {
    pub async fn load_or_build(
        index: Box<dyn RetrievalIndex>,
        documents: &[PathBuf],
    ) -> Result<Self, IndexError> {
        let name: Arc<str> = Arc::from(index.name());

        let origin = if index.exists().await? {
            info!(index = %name, "loaded existing index");
            IndexOrigin::Loaded
        } else {
            let mut added = 0usize;
            let mut skipped = 0usize;
            for path in documents {
                match index.add_document(path).await {
                    Ok(()) => added += 1,
                    Err(error) => {
                        skipped += 1;
                        warn!(index = %name, path = %path.display(), %error, "skipped document while building index");
                    }
                }
            }
            info!(index = %name, documents = added, skipped, "built index from document store");
            IndexOrigin::Built {
                documents: added,
                skipped,
            }
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(index)),
            name,
            origin,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    pub async fn add_document(&self, path: &Path) -> Result<(), IndexError> {
        let index = self.inner.write().await;
        index.add_document(path).await
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, IndexError> {
        let index = self.inner.read().await;
        index.search(query, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Parks `add_document` after signalling `entered` until `release` fires.
    struct AddGate {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[derive(Default)]
    struct FakeIndex {
        exists: bool,
        reject: Option<&'static str>,
        gate: Option<AddGate>,
        added: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl RetrievalIndex for FakeIndex {
        fn name(&self) -> &str {
            "test"
        }

        async fn exists(&self) -> Result<bool, IndexError> {
            Ok(self.exists)
        }

        async fn add_document(&self, path: &Path) -> Result<(), IndexError> {
            if self.reject.is_some_and(|name| path.ends_with(name)) {
                return Err(IndexError::Request("unreadable".to_string()));
            }
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            self.added.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>, IndexError> {
            if self.added.lock().unwrap().is_empty() {
                return Err(IndexError::NoPassages);
            }
            Ok(vec![SearchResult::default()])
        }
    }

    #[tokio::test]
    async fn existing_index_is_loaded_without_adding_documents() {
        let index = FakeIndex {
            exists: true,
            ..Default::default()
        };
        let handle = IndexHandle::load_or_build(Box::new(index), &[PathBuf::from("docs/a.pdf")])
            .await
            .expect("load should succeed");

        assert_eq!(handle.origin(), IndexOrigin::Loaded);
        assert_eq!(handle.name(), "test");
        assert!(matches!(handle.search("q", 3).await, Err(IndexError::NoPassages)));
    }

    #[tokio::test]
    async fn missing_index_is_built_best_effort() {
        let index = FakeIndex {
            reject: Some("broken.pdf"),
            ..Default::default()
        };
        let documents = vec![PathBuf::from("docs/a.pdf"), PathBuf::from("docs/broken.pdf")];
        let handle = IndexHandle::load_or_build(Box::new(index), &documents)
            .await
            .expect("build should succeed");

        assert_eq!(
            handle.origin(),
            IndexOrigin::Built {
                documents: 1,
                skipped: 1
            }
        );
        assert_eq!(handle.search("q", 3).await.expect("search").len(), 1);
    }

    #[tokio::test]
    async fn clones_share_one_index() {
        let handle = IndexHandle::load_or_build(Box::new(FakeIndex::default()), &[])
            .await
            .expect("build should succeed");
        let other = handle.clone();

        other
            .add_document(Path::new("docs/late.pdf"))
            .await
            .expect("add should succeed");

        assert!(handle.search("q", 3).await.is_ok());
    }

    #[tokio::test]
    async fn search_waits_for_an_in_flight_add() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let index = FakeIndex {
            gate: Some(AddGate {
                entered: entered.clone(),
                release: release.clone(),
            }),
            ..Default::default()
        };
        let handle = IndexHandle::load_or_build(Box::new(index), &[])
            .await
            .expect("build should succeed");

        let adder = handle.clone();
        let add = tokio::spawn(async move { adder.add_document(Path::new("docs/late.pdf")).await });
        entered.notified().await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), handle.search("q", 3)).await;
        assert!(blocked.is_err(), "search finished while a document was half added");

        release.notify_one();
        add.await.expect("add task").expect("add should succeed");

        let results = handle.search("q", 3).await.expect("search sees the finished add");
        assert_eq!(results.len(), 1);
    }
}
