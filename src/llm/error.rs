//! Typed errors for language-model calls
//!
//! Agents surface these as `AgentFailure::Llm`, so callers can tell an expired
//! key from a rate limit without string matching.

use thiserror::Error;

/// LLM operation errors with typed variants
#[derive(Debug, Error)]
pub enum LlmError {
    /// Authentication token is expired or invalid (HTTP 401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400). Should not retry.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (HTTP 5xx)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Connection refused, DNS failure, request timeout
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered but the body was not usable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The client is missing credentials or settings
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Other errors not fitting the above categories
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Check if this error is retryable (after a delay or auth refresh)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_) | LlmError::ServiceError(_) | LlmError::Network(_)
        )
    }

    /// Convert HTTP status code and error text into typed LlmError
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::Unauthorized(error_text),
            429 => LlmError::RateLimited(error_text),
            400 => LlmError::BadRequest(error_text),
            500..=599 => LlmError::ServiceError(error_text),
            _ => LlmError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert network/connection errors into typed LlmError
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else {
            LlmError::Other(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_retryable() {
        assert!(LlmError::RateLimited("quota exceeded".to_string()).is_retryable());
        assert!(LlmError::Network("reset".to_string()).is_retryable());
    }

    #[test]
    fn test_client_errors_not_retryable() {
        assert!(!LlmError::BadRequest("invalid parameter".to_string()).is_retryable());
        assert!(!LlmError::Unauthorized("expired".to_string()).is_retryable());
        assert!(!LlmError::NotConfigured("no key".to_string()).is_retryable());
    }

    #[test]
    fn test_from_http_status() {
        let err = LlmError::from_http_status(
            reqwest::StatusCode::FORBIDDEN,
            "Invalid token".to_string(),
        );
        assert!(matches!(err, LlmError::Unauthorized(_)));

        let err = LlmError::from_http_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded".to_string(),
        );
        assert!(matches!(err, LlmError::RateLimited(_)));

        let err = LlmError::from_http_status(
            reqwest::StatusCode::BAD_GATEWAY,
            "upstream".to_string(),
        );
        assert!(matches!(err, LlmError::ServiceError(_)));

        let err = LlmError::from_http_status(reqwest::StatusCode::IM_A_TEAPOT, "tea".to_string());
        assert!(matches!(err, LlmError::Other(_)));
    }

    #[test]
    fn test_error_display() {
        let err = LlmError::NotConfigured("OPENAI_API_KEY is not set".to_string());
        assert_eq!(err.to_string(), "Not configured: OPENAI_API_KEY is not set");
    }
}
