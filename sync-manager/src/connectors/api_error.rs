use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Failures talking to a provider reporting API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("access token rejected: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("graph error {code}: {message}")]
    Graph { code: i64, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Graph error code, when the provider returned one.
    pub fn graph_code(&self) -> Option<i64> {
        match self {
            ApiError::Graph { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    message: String,
    code: i64,
}

// Graph throttling codes: app, user, page and per-call limits.
const GRAPH_RATE_LIMIT_CODES: [i64; 4] = [4, 17, 32, 613];

/// Passes successful responses through and maps the rest by status code.
pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(from_status(status, body))
}

/// Like [`check_response`], but reads the Graph API error envelope first.
pub(crate) async fn check_graph_response(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<GraphErrorEnvelope>(&body) {
        let GraphErrorBody { message, code } = envelope.error;
        if GRAPH_RATE_LIMIT_CODES.contains(&code) {
            return Err(ApiError::RateLimited(message));
        }
        return Err(ApiError::Graph { code, message });
    }

    Err(from_status(status, body))
}

fn from_status(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(body),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(body),
        _ => ApiError::Status {
            status: status.as_u16(),
            body,
        },
    }
}
