//! Error type for backend exchanges

use thiserror::Error;

/// Failure of one request against the backend
///
/// `Display` follows what the dashboard shows users: the response body text
/// when the backend sent one, otherwise `HTTP {status}`.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Request never produced a response (connect, DNS, timeout)
    #[error("{0}")]
    Network(String),

    /// Non-2xx response
    #[error("{}", status_message(.status, .body))]
    Status { status: u16, body: String },

    /// 2xx response whose body did not decode
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response decoded but carried no `intake_id`
    #[error("Response is missing intake_id")]
    MissingCaseId,
}

fn status_message(status: &u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        body.to_string()
    }
}

impl ApiError {
    /// HTTP status, when the backend answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
