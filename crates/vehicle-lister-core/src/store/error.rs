use thiserror::Error;

/// Local store failures. Every variant means "the cache cannot be trusted
/// right now"; callers treat the store as not yet populated.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Local store unavailable: {0}")]
    Unavailable(String),

    #[error("Local store I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Local store file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn corrupt(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        StoreError::Corrupt {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
