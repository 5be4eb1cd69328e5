use crate::{
    ChatError, ChatMessage, CompletionDelta, CompletionOptions, IndexError, SearchResult,
    StoreError,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};

pub type DeltaStream = BoxStream<'static, Result<CompletionDelta, ChatError>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError>;

    fn list(&self, allowed_extensions: &[String]) -> Vec<PathBuf>;
}

#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    fn name(&self) -> &str;

    async fn exists(&self) -> Result<bool, IndexError>;

    async fn add_document(&self, path: &Path) -> Result<(), IndexError>;

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, IndexError>;
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, ChatError>;

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<DeltaStream, ChatError>;
}
