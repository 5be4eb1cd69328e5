use crate::traits::RetrievalIndex;
use crate::{IndexError, SearchResult, NO_PASSAGES_MESSAGE};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;
use url::Url;

const BACKEND: &str = "retrieval-index";

/// Client for the sidecar that hosts the multimodal retrieval model.
pub struct HttpRetrievalIndex {
    client: Client,
    base: Url,
    index_name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl HttpRetrievalIndex {
    pub fn new(endpoint: &str, index_name: impl Into<String>) -> Result<Self, IndexError> {
        let mut base = Url::parse(endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            base,
            index_name: index_name.into(),
        })
    }

    fn index_url(&self, suffix: &str) -> Result<Url, IndexError> {
        let mut url = self.base.join("indexes/")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| IndexError::Request(format!("cannot-be-a-base url: {}", self.base)))?;
            segments.pop_if_empty().push(&self.index_name);
            if !suffix.is_empty() {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    async fn error_details(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.pointer("/error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("{status}: {body}"))
    }
}

#[async_trait]
impl RetrievalIndex for HttpRetrievalIndex {
    fn name(&self) -> &str {
        &self.index_name
    }

    async fn exists(&self) -> Result<bool, IndexError> {
        let response = self.client.get(self.index_url("")?).send().await?;

        if response.status().is_success() {
            return Ok(true);
        }
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        Err(IndexError::BackendResponse {
            backend: BACKEND.to_string(),
            details: Self::error_details(response).await,
        })
    }

    async fn add_document(&self, path: &Path) -> Result<(), IndexError> {
        let response = self
            .client
            .post(self.index_url("documents")?)
            .json(&json!({
                "path": path.to_string_lossy(),
                "store_collection_with_index": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: BACKEND.to_string(),
                details: Self::error_details(response).await,
            });
        }

        debug!(index = %self.index_name, path = %path.display(), "document added to index");
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, IndexError> {
        let response = self
            .client
            .post(self.index_url("search")?)
            .json(&json!({ "query": query, "k": top_k }))
            .send()
            .await?;

        if !response.status().is_success() {
            let details = Self::error_details(response).await;
            if details == NO_PASSAGES_MESSAGE {
                return Err(IndexError::NoPassages);
            }
            return Err(IndexError::BackendResponse {
                backend: BACKEND.to_string(),
                details,
            });
        }

        let body = response.bytes().await?;
        let parsed: SearchResponse = serde_json::from_slice(&body)?;
        Ok(parsed.results)
    }
}
