use crate::config::InboundGuardSettings;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{HeaderName, InvalidHeaderName},
        StatusCode,
    },
    Error, HttpResponse,
};
use dashmap::DashMap;
use futures_util::Future;
use log::warn;
use std::{
    future::{ready, Ready},
    pin::Pin,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use subtle::ConstantTimeEq;

/// Paths that stay open so load balancers can probe the bridge.
const OPEN_PATHS: &[&str] = &["/health", "/api/health"];

/// Shared-key check and per-client rate limit for the inbound API.
#[derive(Clone)]
pub struct InboundGuardConfig {
    service_key: Arc<Vec<u8>>,
    header_name: HeaderName,
    rate_limit: ClientRateLimit,
}

/// Fixed-window counter per client address.
#[derive(Clone)]
pub struct ClientRateLimit {
    max_requests: u32,
    window: Duration,
    storage: Arc<DashMap<String, (u32, Instant)>>,
}

impl ClientRateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            storage: Arc::new(DashMap::new()),
        }
    }

    /// Counts one request for `client` and says whether it is within budget.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .storage
            .entry(client.to_string())
            .or_insert((0, now));
        let (count, window_start) = &mut *entry;

        if now.duration_since(*window_start) >= self.window {
            *count = 0;
            *window_start = now;
        }
        if *count >= self.max_requests {
            return false;
        }
        *count += 1;
        true
    }

    /// Drops counters whose window has passed.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        let window = self.window;
        self.storage
            .retain(|_, (_, started)| now.duration_since(*started) < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.storage.len()
    }
}

impl InboundGuardConfig {
    pub fn new(service_key: &str) -> Self {
        Self {
            service_key: Arc::new(service_key.as_bytes().to_vec()),
            header_name: HeaderName::from_static(crate::config::DEFAULT_SERVICE_HEADER),
            rate_limit: ClientRateLimit::new(100, Duration::from_secs(60)),
        }
    }

    pub fn from_settings(settings: &InboundGuardSettings) -> Result<Self, InvalidHeaderName> {
        Ok(Self::new(&settings.service_key)
            .with_header_name(&settings.header_name)?
            .with_rate_limit(settings.max_requests, settings.window_secs))
    }

    pub fn with_header_name(mut self, name: &str) -> Result<Self, InvalidHeaderName> {
        self.header_name = HeaderName::try_from(name)?;
        Ok(self)
    }

    pub fn with_rate_limit(mut self, max_requests: u32, window_seconds: u64) -> Self {
        self.rate_limit = ClientRateLimit::new(max_requests, Duration::from_secs(window_seconds));
        self
    }

    /// Periodically evicts stale rate-limit counters. Call once per process.
    pub fn start_cleanup_task(&self) {
        let rate_limit = self.rate_limit.clone();
        let period = (rate_limit.window / 2).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                rate_limit.evict_expired();
            }
        });
    }
}

/// Wraps the app; a disabled guard lets every request through.
pub struct InboundGuard {
    config: Option<InboundGuardConfig>,
}

impl InboundGuard {
    pub fn new(config: InboundGuardConfig) -> Self {
        Self {
            config: Some(config),
        }
    }

    pub fn disabled() -> Self {
        Self { config: None }
    }
}

impl<S, B> Transform<S, ServiceRequest> for InboundGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = InboundGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(InboundGuardService {
            service: Rc::new(service),
            config: self.config.clone(),
        }))
    }
}

pub struct InboundGuardService<S> {
    service: Rc<S>,
    config: Option<InboundGuardConfig>,
}

impl<S, B> Service<ServiceRequest> for InboundGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let config = self.config.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let config = match config {
                Some(config) if !OPEN_PATHS.contains(&req.path()) => config,
                _ => {
                    let res = service.call(req).await?;
                    return Ok(res.map_into_boxed_body());
                }
            };

            let key_bytes = match req.headers().get(&config.header_name) {
                None => {
                    return Ok(reject(
                        req,
                        StatusCode::UNAUTHORIZED,
                        "Missing service authentication",
                    ))
                }
                Some(value) => match value.to_str() {
                    Ok(key) => key.as_bytes().to_vec(),
                    Err(_) => {
                        return Ok(reject(
                            req,
                            StatusCode::BAD_REQUEST,
                            "Invalid service key format",
                        ))
                    }
                },
            };

            if key_bytes.ct_eq(&config.service_key).unwrap_u8() != 1 {
                return Ok(reject(
                    req,
                    StatusCode::FORBIDDEN,
                    "Invalid service credentials",
                ));
            }

            let client = req
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            if !config.rate_limit.check(&client) {
                warn!("Rate limit exceeded for {}", client);
                return Ok(reject(
                    req,
                    StatusCode::TOO_MANY_REQUESTS,
                    "Rate limit exceeded",
                ));
            }

            let res = service.call(req).await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn reject(req: ServiceRequest, status: StatusCode, message: &str) -> ServiceResponse<BoxBody> {
    let response = HttpResponse::build(status).json(serde_json::json!({
        "success": false,
        "error": status.canonical_reason().unwrap_or("Rejected"),
        "message": message,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }));

    req.into_response(response).map_into_boxed_body()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::{call_service, init_service, TestRequest};
    use actix_web::{web, App};

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn disabled_guard_passes_everything() {
        let app = init_service(
            App::new()
                .wrap(InboundGuard::disabled())
                .route("/api/config", web::get().to(ok)),
        )
        .await;

        let resp = call_service(&app, TestRequest::get().uri("/api/config").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn key_is_required_and_checked() {
        let app = init_service(
            App::new()
                .wrap(InboundGuard::new(InboundGuardConfig::new("letmein")))
                .route("/api/config", web::get().to(ok))
                .route("/api/health", web::get().to(ok)),
        )
        .await;

        let missing = TestRequest::get().uri("/api/config").to_request();
        assert_eq!(call_service(&app, missing).await.status(), StatusCode::UNAUTHORIZED);

        let wrong = TestRequest::get()
            .uri("/api/config")
            .insert_header(("x-service-key", "nope"))
            .to_request();
        assert_eq!(call_service(&app, wrong).await.status(), StatusCode::FORBIDDEN);

        let right = TestRequest::get()
            .uri("/api/config")
            .insert_header(("x-service-key", "letmein"))
            .to_request();
        assert_eq!(call_service(&app, right).await.status(), StatusCode::OK);

        let health = TestRequest::get().uri("/api/health").to_request();
        assert_eq!(call_service(&app, health).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn rate_limit_is_per_client() {
        let guard = InboundGuardConfig::new("k").with_rate_limit(1, 60);
        let app = init_service(
            App::new()
                .wrap(InboundGuard::new(guard))
                .route("/api/config", web::get().to(ok)),
        )
        .await;

        let from = |addr: &str| {
            TestRequest::get()
                .uri("/api/config")
                .insert_header(("x-service-key", "k"))
                .peer_addr(addr.parse().unwrap())
                .to_request()
        };

        assert_eq!(call_service(&app, from("10.0.0.1:5000")).await.status(), StatusCode::OK);
        assert_eq!(
            call_service(&app, from("10.0.0.1:5001")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(call_service(&app, from("10.0.0.2:5000")).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn forwarded_headers_do_not_reset_the_limit() {
        let guard = InboundGuardConfig::new("k").with_rate_limit(1, 60);
        let app = init_service(
            App::new()
                .wrap(InboundGuard::new(guard))
                .route("/api/config", web::get().to(ok)),
        )
        .await;

        let spoofed = |forwarded_for: &str| {
            TestRequest::get()
                .uri("/api/config")
                .insert_header(("x-service-key", "k"))
                .insert_header(("x-forwarded-for", forwarded_for))
                .peer_addr("10.0.0.9:4000".parse().unwrap())
                .to_request()
        };

        assert_eq!(call_service(&app, spoofed("1.1.1.1")).await.status(), StatusCode::OK);
        assert_eq!(
            call_service(&app, spoofed("2.2.2.2")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn expired_windows_are_evicted() {
        let limit = ClientRateLimit::new(5, Duration::ZERO);
        assert!(limit.check("a"));
        assert_eq!(limit.tracked_clients(), 1);
        limit.evict_expired();
        assert_eq!(limit.tracked_clients(), 0);
    }

    #[test]
    fn custom_header_name_must_be_valid() {
        assert!(InboundGuardConfig::new("k").with_header_name("bad header").is_err());
    }
}
