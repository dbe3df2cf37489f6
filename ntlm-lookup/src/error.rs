use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("Failed to read '{}': {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Error opening output file '{}': {source}", path.display())]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    OutputWrite(#[source] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Network-level failure of a single request (timeout, DNS, refused connection).
    #[error("{0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
