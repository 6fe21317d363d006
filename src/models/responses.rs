use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

/// Top-level body POSTed to the gateway.
#[derive(Debug, Serialize)]
pub struct SignedRequest<'a> {
    pub params: SignedEnvelope<'a>,
}

/// `param` is carried as the exact JSON text that was signed, so the bytes
/// on the wire cannot drift from the signature input.
#[derive(Debug, Serialize)]
pub struct SignedEnvelope<'a> {
    pub timestamp: i64,
    pub client_id: &'a str,
    pub sign: String,
    pub param: &'a RawValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Connection,
    Timeout,
    Other,
}

/// How a submission ended, as seen from this side of the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApiResult {
    Success { status: u16, body: Value },
    HttpFailure { status: u16, body: Value },
    MalformedResponse { status: u16, raw_body: String },
    TransportFailure { kind: TransportKind, message: String },
}

impl ApiResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiResult::Success { status, .. }
            | ApiResult::HttpFailure { status, .. }
            | ApiResult::MalformedResponse { status, .. } => Some(*status),
            ApiResult::TransportFailure { .. } => None,
        }
    }

    /// Stable short code surfaced to the frontend.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            ApiResult::Success { .. } => None,
            ApiResult::HttpFailure { .. } => Some("http_error"),
            ApiResult::MalformedResponse { .. } => Some("invalid_json"),
            ApiResult::TransportFailure { kind, .. } => Some(match kind {
                TransportKind::Connection => "connection_failed",
                TransportKind::Timeout => "timeout",
                TransportKind::Other => "unknown",
            }),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiResult::Success { .. } => "Customer created successfully".to_string(),
            ApiResult::HttpFailure { status, body } => match body.get("error") {
                Some(error) => format!("Remote rejected the request ({}): {}", status, error),
                None => format!("Remote returned status {} without a result", status),
            },
            ApiResult::MalformedResponse { status, .. } => {
                format!("Invalid JSON response (status {})", status)
            }
            ApiResult::TransportFailure { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ApiResult>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: ApiResult) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub insuite_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub base_url: String,
    pub api_route: String,
    pub client_id: String,
    pub database: String,
}
