use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiftError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Bad magic or version")]
    BadHeader,

    #[error("Corrupt segment: {0}")]
    Corrupt(String),

    /// Normal end of a scan, not a failure.
    #[error("Iterator done")]
    IteratorDone,

    #[error("Merge operator missing for key {}", hex::encode(key))]
    MergeOperatorNil { key: Vec<u8> },

    #[error("Merge operator full merge failed for key {}", hex::encode(key))]
    MergeOperatorFullMergeFailed { key: Vec<u8> },

    #[error("Duplicate key in batch: {}", hex::encode(.0))]
    DuplicateKey(Vec<u8>),

    #[error("Keys out of order at {}", hex::encode(.0))]
    Unsorted(Vec<u8>),

    #[error("Too large: {0}")]
    TooLarge(String),

    #[error("Unknown merge operator: {0}")]
    UnknownMergeOperator(String),
}

impl SiftError {
    /// Key surfaced alongside a reducer failure, so a scan can skip it and go on.
    pub fn key(&self) -> Option<&[u8]> {
        match self {
            SiftError::MergeOperatorNil { key }
            | SiftError::MergeOperatorFullMergeFailed { key } => Some(key),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, SiftError::IteratorDone)
    }
}

pub type Result<T> = std::result::Result<T, SiftError>;
