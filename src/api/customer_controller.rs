use crate::config::{BridgeConfig, Network};
use crate::models::customer::{full_sample, test_id_from, CustomerRecord};
use crate::models::field_map::FieldMap;
use crate::models::responses::{ApiResponse, ApiResult, ConfigResponse, HealthResponse};
use crate::services::insuite_service::InsuiteClient;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use log::{error, info};
use serde_json::Value;

/// Request header choosing between the internal and external gateway.
pub const USE_INTERNAL_HEADER: &str = "X-Use-Internal";

const SERVICE_NAME: &str = "insuite-bridge";

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub config: BridgeConfig,
    pub client: InsuiteClient,
    pub field_map: FieldMap,
}

fn requested_network(req: &HttpRequest, default: Network) -> Network {
    let flag = req
        .headers()
        .get(USE_INTERNAL_HEADER)
        .and_then(|v| v.to_str().ok());
    Network::from_flag(flag, default)
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        insuite_url: state.config.base_url(state.config.default_network).to_string(),
    })
}

pub async fn config(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;
    HttpResponse::Ok().json(ConfigResponse {
        base_url: config.base_url(config.default_network).to_string(),
        api_route: config.api_route.clone(),
        client_id: config.masked_client_id(),
        database: config.database.clone(),
    })
}

pub async fn fields(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.field_map.entries())
}

pub async fn create_customer(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> ActixResult<HttpResponse> {
    info!("Received create-customer request ({} bytes)", body.len());

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(HttpResponse::BadRequest()
            .json(ApiResponse::<()>::failure("No data provided", "Request body is empty")));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return Ok(HttpResponse::BadRequest()
                .json(ApiResponse::<()>::failure("invalid_json", e.to_string())))
        }
    };

    let records = match CustomerRecord::from_payload(payload, &state.field_map) {
        Ok(records) => records,
        Err(e) => {
            return Ok(HttpResponse::BadRequest()
                .json(ApiResponse::<()>::failure(e.to_string(), e.to_string())))
        }
    };

    let network = requested_network(&req, state.config.default_network);
    info!("Forwarding {} record(s) via {} network", records.len(), network);

    match state.client.create_customers(&records, network).await {
        Ok(result) => Ok(outcome_response(result)),
        Err(e) => {
            error!("Error preparing create-customer request: {}", e);
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::failure("server_error", e.to_string())))
        }
    }
}

/// Sends the built-in sample record and reports the raw outcome.
pub async fn test_connection(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> ActixResult<HttpResponse> {
    let test_id = test_id_from(chrono::Utc::now().timestamp());
    let network = requested_network(&req, state.config.default_network);
    info!("Running connection test {} via {} network", test_id, network);

    match state
        .client
        .create_customers(&[full_sample(test_id)], network)
        .await
    {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse {
            success: result.is_success(),
            message: Some(result.message()),
            error: result.error_code().map(str::to_string),
            data: Some(result),
            details: None,
        })),
        Err(e) => {
            error!("Error running connection test: {}", e);
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::failure("server_error", e.to_string())))
        }
    }
}

fn outcome_response(result: ApiResult) -> HttpResponse {
    match result {
        ApiResult::Success { body, .. } => {
            info!("Customer created successfully");
            HttpResponse::Ok().json(ApiResponse::ok("Customer created successfully", body))
        }
        failure => {
            error!("Customer creation failed: {}", failure.message());
            let code = failure.error_code().unwrap_or("unknown");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::failure(code, failure.message()).with_details(failure))
        }
    }
}
