pub mod http_index;
pub mod openai;

pub use http_index::HttpRetrievalIndex;
pub use openai::{OpenAiCompletionService, DEFAULT_OPENAI_BASE_URL};
