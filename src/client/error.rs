#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a GraphQL error.
    #[error("{code}: {message}")]
    Rpc { code: String, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Missing data at {0}")]
    MissingData(String),
}

impl ClientError {
    /// Server error code, if the failure came from the server.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Rpc { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
