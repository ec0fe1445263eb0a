use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Any vendor-side failure: auth, network, rate limit, malformed payload
    #[error("{0}")]
    Provider(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<anyhow::Error> for LlmError {
    fn from(err: anyhow::Error) -> Self {
        // Alternate formatting keeps the whole context chain
        LlmError::Provider(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
