use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed embedding response: {0}")]
    Embedding(String),

    #[error("index write rejected: {0}")]
    IndexWrite(String),

    #[error("collection '{0}' has no entries to search")]
    EmptyIndex(String),

    #[error("generation provider failed: {0}")]
    Provider(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Provider(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
