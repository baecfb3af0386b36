//! API Server Module
//!
//! Provides the Axum application builder and server startup logic.

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::middleware::{
    create_rate_limiter, rate_limit_middleware, request_logging_middleware,
    security_headers_middleware, ProxyPolicy, RateLimitState,
};
use super::routes::{accounts, deposits, health};
use crate::common::config::CorsOrigins;
use crate::ledger::LedgerService;

/// Application state shared by every handler
pub struct AppState {
    pub ledger: LedgerService,
    /// Limiter applied to deposit submissions
    pub rate_limiter: RateLimitState,
    /// Whether client addresses come from proxy headers or the socket peer
    pub proxy: ProxyPolicy,
    pub started_at: Instant,
}

/// Shared application state type
pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(
        ledger: LedgerService,
        deposits_per_minute: u32,
        proxy: ProxyPolicy,
    ) -> SharedAppState {
        Arc::new(Self {
            ledger,
            rate_limiter: create_rate_limiter(deposits_per_minute),
            proxy,
            started_at: Instant::now(),
        })
    }
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(target: "ecotrace::api", origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
    }
}

/// Build the EcoTrace API router
pub fn create_router(state: SharedAppState, cors_origins: &CorsOrigins) -> Router {
    let deposit_routes = Router::new()
        .route("/api/deposit", post(deposits::handle_deposit))
        .route_layer(middleware::from_fn_with_state(
            (state.rate_limiter.clone(), state.proxy),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/api/login", post(accounts::handle_login))
        .route("/api/materials", get(accounts::handle_materials))
        .route("/api/user/:id", get(accounts::handle_get_user))
        .route("/api/report", get(deposits::handle_report))
        .route("/api/health", get(health::handle_health))
        .merge(deposit_routes)
        .layer(middleware::from_fn_with_state(
            state.proxy,
            request_logging_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn start_server<F>(
    state: SharedAppState,
    cors_origins: &CorsOrigins,
    port: u16,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state.clone(), cors_origins);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(target: "ecotrace::api", %addr, "EcoTrace API listening");
    tracing::info!(
        target: "ecotrace::api",
        "Endpoints: POST /api/login, GET /api/materials, GET /api/user/:id, \
         POST /api/deposit, GET /api/report, GET /api/health"
    );

    // Stale limiter entries are pruned in the background
    let limiter = state.rate_limiter.clone();
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    cleanup.abort();
    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorBody;
    use crate::audit::AuditLogger;
    use crate::ledger::LedgerConfig;
    use crate::storage::{LedgerStore, MemoryAuditStore, MemoryLedgerStore};
    use crate::types::{
        AuditEvent, DepositResponse, ImpactReportRow, Material, NewMaterial, NewUser, User,
    };
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: SharedAppState,
        audit_store: MemoryAuditStore,
        user: User,
        material: Material,
    }

    async fn test_app(deposits_per_minute: u32) -> TestApp {
        test_app_with_proxy(deposits_per_minute, ProxyPolicy::default()).await
    }

    async fn test_app_with_proxy(deposits_per_minute: u32, proxy: ProxyPolicy) -> TestApp {
        let store = MemoryLedgerStore::new();
        let user = store
            .insert_user(&NewUser {
                name: "Ana".to_string(),
                email: "ana@campus.edu".to_string(),
                points: 10,
            })
            .await
            .unwrap();
        let material = store
            .insert_material(&NewMaterial {
                name: "Aluminio".to_string(),
                points_per_kg: 200.0,
            })
            .await
            .unwrap();

        let audit_store = MemoryAuditStore::new();
        let (audit, _worker) = AuditLogger::start(Arc::new(audit_store.clone()));
        let ledger = LedgerService::new(Arc::new(store), audit, LedgerConfig::default());
        let state = AppState::new(ledger, deposits_per_minute, proxy);

        TestApp {
            router: create_router(state.clone(), &CorsOrigins::Any),
            state,
            audit_store,
            user,
            material,
        }
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn from_peer(mut request: Request<Body>, peer: [u8; 4]) -> Request<Body> {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        request
    }

    fn deposit_body(app: &TestApp, weight_kg: f64) -> serde_json::Value {
        serde_json::json!({
            "user_id": app.user.id,
            "material_id": app.material.id,
            "weight_kg": weight_kg
        })
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app(30).await;

        let response = app.router.oneshot(get("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = test_app(30).await;
        let request = Request::builder()
            .uri("/api/health")
            .header("x-request-id", "abc123")
            .body(Body::empty())
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_login_known_and_unknown() {
        let app = test_app(30).await;

        let response = app
            .router
            .clone()
            .oneshot(post_json(
                "/api/login",
                serde_json::json!({ "email": "Ana@Campus.edu" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let user: User = json_body(response).await;
        assert_eq!(user.id, app.user.id);

        let response = app
            .router
            .oneshot(post_json(
                "/api/login",
                serde_json::json!({ "email": "nobody@campus.edu" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_login_rejects_malformed_email() {
        let app = test_app(30).await;

        let response = app
            .router
            .oneshot(post_json("/api/login", serde_json::json!({ "email": "  " })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deposit_credits_and_audits() {
        let app = test_app(30).await;

        let request = post_json(
            "/api/deposit",
            serde_json::json!({
                "user_id": app.user.id,
                "material_id": app.material.id,
                "weight_kg": 0.25,
                "details": {
                    "brand": "",
                    "barcode": "7501055300075",
                    "photo_fingerprint": "IMG_0001.jpg-348211"
                }
            }),
        );
        let response = app
            .router
            .clone()
            .oneshot(from_peer(request, [192, 0, 2, 10]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: DepositResponse = json_body(response).await;
        assert_eq!(body.receipt.points_awarded, 50);
        assert_eq!(body.receipt.balance, 60);

        let response = app
            .router
            .oneshot(get(&format!("/api/user/{}", app.user.id)))
            .await
            .unwrap();
        let user: User = json_body(response).await;
        assert_eq!(user.points, 60);

        app.state.ledger.audit().flush().await;
        let entries = app.audit_store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, AuditEvent::DepositSucceeded);
        // Forwarded header is ignored without a trusted proxy
        assert_eq!(entries[0].source_address.as_deref(), Some("192.0.2.10"));
    }

    #[tokio::test]
    async fn test_trusted_proxy_address_is_audited() {
        let app = test_app_with_proxy(30, ProxyPolicy::new(true)).await;
        let request = post_json("/api/deposit", deposit_body(&app, 0.1));

        let response = app
            .router
            .oneshot(from_peer(request, [10, 0, 0, 2]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        app.state.ledger.audit().flush().await;
        let entries = app.audit_store.entries().await;
        assert_eq!(entries[0].source_address.as_deref(), Some("198.51.100.4"));
    }

    #[tokio::test]
    async fn test_invalid_evidence_rejected_and_audited() {
        let app = test_app(30).await;

        let response = app
            .router
            .clone()
            .oneshot(post_json(
                "/api/deposit",
                serde_json::json!({
                    "user_id": app.user.id,
                    "material_id": app.material.id,
                    "weight_kg": 0.25,
                    "details": {
                        "brand": "Acme",
                        "barcode": "9".repeat(65),
                        "photo_fingerprint": "IMG_0001.jpg-348211"
                    }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.code, "VALIDATION_ERROR");

        let response = app
            .router
            .oneshot(get(&format!("/api/user/{}", app.user.id)))
            .await
            .unwrap();
        let user: User = json_body(response).await;
        assert_eq!(user.points, 10);

        app.state.ledger.audit().flush().await;
        let entries = app.audit_store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, AuditEvent::TransactionFailed);
    }

    #[tokio::test]
    async fn test_deposit_error_statuses() {
        let app = test_app(30).await;

        let cases = [
            (app.material.id, 0.0, StatusCode::BAD_REQUEST),
            (app.material.id, 80.0, StatusCode::BAD_REQUEST),
            (999, 1.0, StatusCode::NOT_FOUND),
        ];

        for (material_id, weight_kg, expected) in cases {
            let response = app
                .router
                .clone()
                .oneshot(post_json(
                    "/api/deposit",
                    serde_json::json!({
                        "user_id": app.user.id,
                        "material_id": material_id,
                        "weight_kg": weight_kg
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "material {material_id} weight {weight_kg}");
        }

        app.state.ledger.audit().flush().await;
        let entries = app.audit_store.entries().await;
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .all(|e| e.event == AuditEvent::TransactionFailed));
    }

    #[tokio::test]
    async fn test_deposit_rate_limited() {
        // per_minute(1) allows one request plus one burst token
        let app = test_app(1).await;
        let body = serde_json::json!({
            "user_id": app.user.id,
            "material_id": app.material.id,
            "weight_kg": 0.1
        });

        for _ in 0..2 {
            let response = app
                .router
                .clone()
                .oneshot(post_json("/api/deposit", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .router
            .clone()
            .oneshot(post_json("/api/deposit", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let error: ErrorBody = json_body(response).await;
        assert_eq!(error.code, "RATE_LIMITED");

        // Reads are not limited
        let response = app.router.oneshot(get("/api/materials")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_header_does_not_reset_limit() {
        let app = test_app(1).await;

        for attempt in 0..3u8 {
            let request = Request::builder()
                .method("POST")
                .uri("/api/deposit")
                .header("content-type", "application/json")
                .header("x-forwarded-for", format!("203.0.113.{attempt}"))
                .body(Body::from(deposit_body(&app, 0.1).to_string()))
                .unwrap();
            let response = app
                .router
                .clone()
                .oneshot(from_peer(request, [192, 0, 2, 10]))
                .await
                .unwrap();

            let expected = if attempt < 2 {
                StatusCode::OK
            } else {
                StatusCode::TOO_MANY_REQUESTS
            };
            assert_eq!(response.status(), expected, "attempt {attempt}");
        }

        // A different peer has its own budget
        let request = post_json("/api/deposit", deposit_body(&app, 0.1));
        let response = app
            .router
            .oneshot(from_peer(request, [192, 0, 2, 11]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_report_includes_materials_without_deposits() {
        let app = test_app(30).await;

        let response = app.router.oneshot(get("/api/report")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let rows: Vec<ImpactReportRow> = json_body(response).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].deposits, 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let app = test_app(30).await;

        let response = app.router.oneshot(get("/api/user/4242")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
