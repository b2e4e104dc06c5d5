use thiserror::Error;

/// Error types for LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Authentication failed (HTTP 401/403)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// Invalid request parameters (HTTP 400)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// API error with status code (HTTP 4xx/5xx except above)
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Network or connection error
    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// The request did not complete within the client timeout
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// JSON parsing or serialization error
    #[error("Parse error: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },

    /// Generic error for unexpected cases
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LlmError {
    /// Create an authentication error
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limit<S: Into<String>>(message: S, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Create an invalid request error
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create an API error
    pub fn api_error(status: u16, message: String) -> Self {
        Self::Api { status, message }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a retry with the same request could plausibly succeed.
    ///
    /// Timeouts, rate limits, transport failures and server-side errors
    /// are retryable; authentication and request-shape errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimit { .. } | LlmError::Timeout { .. } => true,
            LlmError::Network { source } => !source.is_builder(),
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Authentication { .. }
            | LlmError::InvalidRequest { .. }
            | LlmError::Parse { .. }
            | LlmError::Internal { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::rate_limit("slow down", Some(5)).is_retryable());
        assert!(LlmError::Timeout { seconds: 300 }.is_retryable());
        assert!(LlmError::api_error(503, "unavailable".into()).is_retryable());
        assert!(!LlmError::api_error(404, "no such model".into()).is_retryable());
        assert!(!LlmError::authentication("bad key").is_retryable());
        assert!(!LlmError::invalid_request("missing field").is_retryable());
    }
}
