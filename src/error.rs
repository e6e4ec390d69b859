/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum MetrikaError {
    /// Invalid client setup, such as an empty OAuth token.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Caller input rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),
    /// The per-attempt deadline elapsed before a response arrived.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// Non-success HTTP status code with raw response body.
    #[error("Yandex Metrika error {status}: {body}")]
    Http { status: u16, body: String },
    /// Success status whose body is not valid JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
}

impl MetrikaError {
    /// Returns `true` when re-sending the identical request may succeed.
    ///
    /// Only timeouts and HTTP 500, 502 and 503 qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => matches!(status, 500 | 502 | 503),
            _ => false,
        }
    }
}
