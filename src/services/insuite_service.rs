use crate::config::{BridgeConfig, Network};
use crate::models::responses::{ApiResult, SignedEnvelope, SignedRequest, TransportKind};
use crate::services::signer::{SignerError, SigningContext};
use log::{debug, error, info, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Tenant selector the gateway reads to pick the Odoo database.
pub const DATABASE_HEADER: &str = "x-odoo-database-name";

/// Key whose presence in a 2xx body means the gateway accepted the call.
pub const SUCCESS_MARKER: &str = "result";

#[derive(Error, Debug)]
pub enum InsuiteServiceError {
    #[error("Failed to sign request: {0}")]
    SigningError(#[from] SignerError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid value for header {name}: {source}")]
    HeaderError {
        name: &'static str,
        #[source]
        source: InvalidHeaderValue,
    },

    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),
}

/// A fully signed request, ready to send.
#[derive(Debug, Clone)]
pub struct PreparedSubmission {
    pub timestamp: i64,
    pub sign: String,
    /// The signed `param` text.
    pub canonical_body: String,
    /// The whole `{"params": ...}` body.
    pub payload: String,
}

/// Compact JSON with non-ASCII characters kept literal.
///
/// This is the exact text that is both signed and transmitted.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Builds and signs the envelope for `records` at the given `timestamp`.
pub fn prepare_submission<T: Serialize>(
    records: &[T],
    route: &str,
    client_id: &str,
    secret: &str,
    timestamp: i64,
) -> Result<PreparedSubmission, InsuiteServiceError> {
    let canonical_body = canonical_json(records)?;
    let sign = SigningContext::post(route, secret, timestamp).sign(&canonical_body)?;

    let param = RawValue::from_string(canonical_body.clone())?;
    let request = SignedRequest {
        params: SignedEnvelope {
            timestamp,
            client_id,
            sign: sign.clone(),
            param: &param,
        },
    };
    let payload = serde_json::to_string(&request)?;

    Ok(PreparedSubmission {
        timestamp,
        sign,
        canonical_body,
        payload,
    })
}

/// Maps a received response onto an [`ApiResult`].
pub fn classify_response(status: StatusCode, body: &str) -> ApiResult {
    match serde_json::from_str::<Value>(body) {
        Ok(parsed) => {
            if status.is_success() && parsed.get(SUCCESS_MARKER).is_some() {
                ApiResult::Success {
                    status: status.as_u16(),
                    body: parsed,
                }
            } else {
                ApiResult::HttpFailure {
                    status: status.as_u16(),
                    body: parsed,
                }
            }
        }
        Err(_) => ApiResult::MalformedResponse {
            status: status.as_u16(),
            raw_body: body.to_string(),
        },
    }
}

/// Maps a reqwest failure onto a transport outcome.
pub fn classify_transport_error(err: &reqwest::Error) -> ApiResult {
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else if err.is_connect() {
        TransportKind::Connection
    } else {
        TransportKind::Other
    };
    ApiResult::TransportFailure {
        kind,
        message: error_chain(err),
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Client for the inSuite customer creation endpoint.
///
/// Holds credentials and one pooled HTTP client. Calls share nothing else;
/// each one takes its own timestamp and signature.
#[derive(Clone)]
pub struct InsuiteClient {
    http: Client,
    client_id: String,
    secret_key: String,
    database: HeaderValue,
    api_route: String,
    internal_base_url: String,
    external_base_url: String,
}

impl InsuiteClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, InsuiteServiceError> {
        Self::with_timeout(config, config.timeout)
    }

    pub fn with_timeout(
        config: &BridgeConfig,
        timeout: Duration,
    ) -> Result<Self, InsuiteServiceError> {
        let database = HeaderValue::from_str(&config.database).map_err(|source| {
            InsuiteServiceError::HeaderError {
                name: DATABASE_HEADER,
                source,
            }
        })?;
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            secret_key: config.secret_key.clone(),
            database,
            api_route: config.api_route.clone(),
            internal_base_url: config.internal_base_url.clone(),
            external_base_url: config.external_base_url.clone(),
        })
    }

    pub fn base_url(&self, network: Network) -> &str {
        match network {
            Network::Internal => &self.internal_base_url,
            Network::External => &self.external_base_url,
        }
    }

    pub fn api_route(&self) -> &str {
        &self.api_route
    }

    pub fn prepare<T: Serialize>(
        &self,
        records: &[T],
        timestamp: i64,
    ) -> Result<PreparedSubmission, InsuiteServiceError> {
        prepare_submission(
            records,
            &self.api_route,
            &self.client_id,
            &self.secret_key,
            timestamp,
        )
    }

    /// Creates customers on the gateway reachable through `network`.
    pub async fn create_customers<T: Serialize>(
        &self,
        records: &[T],
        network: Network,
    ) -> Result<ApiResult, InsuiteServiceError> {
        self.submit(records, self.base_url(network), &HeaderMap::new())
            .await
    }

    /// Signs `records`, POSTs them to `base_url` + route and classifies the
    /// reply. Remote and transport failures come back as `Ok(ApiResult)`;
    /// only local serialization or signing problems are `Err`.
    pub async fn submit<T: Serialize>(
        &self,
        records: &[T],
        base_url: &str,
        extra_headers: &HeaderMap,
    ) -> Result<ApiResult, InsuiteServiceError> {
        let submission_id = Uuid::new_v4();
        let timestamp = chrono::Utc::now().timestamp();
        let prepared = self.prepare(records, timestamp)?;
        let url = format!("{}{}", base_url, self.api_route);

        info!(
            "[{}] Submitting {} customer record(s) to {} (timestamp {})",
            submission_id,
            records.len(),
            url,
            timestamp
        );
        debug!("[{}] Signed payload: {}", submission_id, prepared.payload);

        let mut headers = extra_headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(DATABASE_HEADER),
            self.database.clone(),
        );

        let response = match self
            .http
            .post(&url)
            .headers(headers)
            .body(prepared.payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let result = classify_transport_error(&e);
                error!("[{}] Request failed: {}", submission_id, result.message());
                return Ok(result);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let result = classify_transport_error(&e);
                error!(
                    "[{}] Failed reading response body: {}",
                    submission_id,
                    result.message()
                );
                return Ok(result);
            }
        };

        let result = classify_response(status, &body);
        match &result {
            ApiResult::Success { .. } => {
                info!("[{}] Gateway accepted submission ({})", submission_id, status)
            }
            ApiResult::MalformedResponse { raw_body, .. } => {
                warn!("[{}] Non-JSON response ({}): {}", submission_id, status, raw_body)
            }
            other => warn!("[{}] Gateway rejected submission: {}", submission_id, other.message()),
        }

        Ok(result)
    }

    /// Equivalent `curl` invocation for manual replay.
    pub fn curl_command<T: Serialize>(
        &self,
        records: &[T],
        network: Network,
        timestamp: i64,
    ) -> Result<String, InsuiteServiceError> {
        let prepared = self.prepare(records, timestamp)?;
        let database = self.database.to_str().unwrap_or_default();

        Ok(format!(
            "curl -X POST \"{}{}\" \\\n  -H \"Content-Type: application/json\" \\\n  -H \"X-ODOO-DATABASE-NAME: {}\" \\\n  -d '{}'",
            self.base_url(network),
            self.api_route,
            database,
            prepared.payload.replace('\'', "'\\''"),
        ))
    }
}
