use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
}

impl ApiError {
    /// The request may have reached the server, but no answer came back
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Reqwest(e) if e.is_timeout() && !e.is_connect())
    }
}
