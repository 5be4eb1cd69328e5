use crate::index::IndexHandle;
use crate::{SearchError, SearchQuery, SearchResult};
use tracing::{debug, warn};

pub struct SearchCoordinator {
    index: IndexHandle,
}

impl SearchCoordinator {
    pub fn new(index: IndexHandle) -> Self {
        Self { index }
    }

    /// Results keep the order the index produced them in.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::BadRequest("No query provided".to_string()));
        }

        match self.index.search(&query.text, query.top_k).await {
            Ok(results) => {
                debug!(
                    index = %self.index.name(),
                    top_k = query.top_k,
                    hits = results.len(),
                    "search completed"
                );
                Ok(results)
            }
            Err(error) => {
                warn!(index = %self.index.name(), %error, "search failed");
                Err(error.into())
            }
        }
    }
}
