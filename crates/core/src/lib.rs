pub mod chat;
pub mod error;
pub mod index;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod stores;
pub mod traits;
pub mod upload;

pub use chat::{normalize_messages, ChatRelay, RelayEvent, RelayStream, DONE_SENTINEL};
pub use error::{
    ChatError, IndexError, SearchError, StoreError, UploadError, NO_PASSAGES_MESSAGE,
};
pub use index::{IndexHandle, IndexOrigin};
pub use models::{
    ChatMessage, CompletionDelta, CompletionOptions, ContentPart, ImageUrl, MessageContent, Role,
    SearchQuery, SearchResult, UploadedDocument, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_INDEX_NAME,
    DEFAULT_TOP_K,
};
pub use orchestrator::SearchCoordinator;
pub use store::{digest_bytes, discover_documents, FsDocumentStore};
pub use stores::{HttpRetrievalIndex, OpenAiCompletionService, DEFAULT_OPENAI_BASE_URL};
pub use traits::{CompletionService, DeltaStream, DocumentStore, RetrievalIndex};
pub use upload::{UploadCoordinator, UploadPolicy};
