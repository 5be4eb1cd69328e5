use thiserror::Error;

pub const NO_PASSAGES_MESSAGE: &str = "No passages provided";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid document name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("No passages provided")]
    NoPassages,

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),

    #[error("failed to store upload: {0}")]
    Store(#[from] StoreError),

    #[error("File uploaded but indexing failed: {0}")]
    Index(#[source] IndexError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No documents indexed. Please upload documents before searching.")]
    NotIndexed,

    #[error("{0}")]
    Search(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Upstream(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<IndexError> for SearchError {
    fn from(error: IndexError) -> Self {
        match error {
            IndexError::NoPassages => SearchError::NotIndexed,
            other => SearchError::Search(other.to_string()),
        }
    }
}
