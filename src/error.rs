#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    #[error("response body is not valid utf-8")]
    NotText,
    #[error("response body of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("response body is not a well-formed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("post identifier must be at least 15 digits, got {0:?}")]
pub struct InvalidPostId(pub String);
