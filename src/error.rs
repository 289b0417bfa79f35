use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("token request failed: {0}")]
    Token(#[from] reqwest::Error),
    #[error("token endpoint returned an empty token")]
    EmptyToken,
    #[error("invalid socket url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error("socket error: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error("socket read setup failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("socket closed by server")]
    Closed,
}

/// A server message that cannot be applied to the analysis state.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field `{0}` has the wrong shape")]
    Shape(&'static str),
}
