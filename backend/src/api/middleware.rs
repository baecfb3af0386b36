//! API Middleware - Input Validation and Rate Limiting
//!
//! Provides the cross-cutting HTTP concerns of the EcoTrace API:
//! - Rate limiting per client address on the deposit endpoint
//! - Request/response logging with a correlation id
//! - Input validation for request bodies
//! - Security headers

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::error::ApiError;
use crate::common::logging::{
    generate_correlation_id, log_api_request, log_api_response, log_security_event,
};

/// Header carrying the request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// Rate Limiting
// ============================================================================

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
    /// Burst allowance (extra requests allowed temporarily)
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(30)
    }
}

impl RateLimitConfig {
    /// `max_requests` per minute with a small burst allowance
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
            burst: (max_requests / 6).max(1),
        }
    }
}

/// Rate limit entry for a single client
#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    burst_tokens: u32,
}

/// In-memory rate limiter
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed for the given client ID
    pub async fn check(&self, client_id: &str) -> Result<(), RateLimitError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let entry = entries.entry(client_id.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
            burst_tokens: self.config.burst,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
            entry.burst_tokens = self.config.burst;
        }

        if entry.count < self.config.max_requests {
            entry.count += 1;
            Ok(())
        } else if entry.burst_tokens > 0 {
            entry.burst_tokens -= 1;
            entry.count += 1;
            Ok(())
        } else {
            let elapsed = now.duration_since(entry.window_start).as_secs();
            let retry_after = self.config.window.as_secs().saturating_sub(elapsed).max(1);
            Err(RateLimitError::Exceeded { retry_after })
        }
    }

    /// Drop entries whose window expired long ago
    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let expiry = self.config.window * 2;

        entries.retain(|_, entry| now.duration_since(entry.window_start) < expiry);
    }
}

#[derive(Debug)]
pub enum RateLimitError {
    Exceeded { retry_after: u64 },
}

/// Shared rate limiter state
pub type RateLimitState = Arc<RateLimiter>;

pub fn create_rate_limiter(max_per_minute: u32) -> RateLimitState {
    Arc::new(RateLimiter::new(RateLimitConfig::per_minute(max_per_minute)))
}

// ============================================================================
// Input Validation
// ============================================================================

/// Validation result
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![msg.into()],
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Validate a login email
pub fn validate_email(email: &str) -> ValidationResult {
    let email = email.trim();
    if email.is_empty() {
        return ValidationResult::error("email is required");
    }

    if email.len() > 254 {
        return ValidationResult::error("email is too long");
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => ValidationResult::ok(),
        _ => ValidationResult::error("email must contain a local part and a domain"),
    }
}

// ============================================================================
// Client Identification
// ============================================================================

/// Extract client IP from proxy headers
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            // First hop is the original client
            let first = value.split(',').next()?.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.trim().to_string());
        }
    }

    None
}

/// Which source identifies the client of a request
///
/// Forwarding headers are read only when `trust_headers` is set, which is
/// only correct behind a reverse proxy that overwrites them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyPolicy {
    pub trust_headers: bool,
}

impl ProxyPolicy {
    pub fn new(trust_headers: bool) -> Self {
        Self { trust_headers }
    }

    /// Client address for rate limiting and auditing
    ///
    /// Trusted: proxy headers, then the socket peer. Untrusted: the socket
    /// peer only.
    pub fn client_address(
        &self,
        headers: &HeaderMap,
        connect_info: Option<&ConnectInfo<SocketAddr>>,
    ) -> Option<String> {
        let peer = || connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
        if self.trust_headers {
            extract_client_ip(headers).or_else(peer)
        } else {
            peer()
        }
    }

    fn request_client(&self, request: &Request) -> Option<String> {
        self.client_address(
            request.headers(),
            request.extensions().get::<ConnectInfo<SocketAddr>>(),
        )
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State((rate_limiter, proxy)): State<(RateLimitState, ProxyPolicy)>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client_id = proxy
        .request_client(&request)
        .unwrap_or_else(|| "unknown".to_string());

    match rate_limiter.check(&client_id).await {
        Ok(()) => Ok(next.run(request).await),
        Err(RateLimitError::Exceeded { retry_after }) => {
            log_security_event(
                "rate_limit_exceeded",
                false,
                serde_json::json!({ "client": client_id, "path": request.uri().path() }),
                None,
            );
            Err(ApiError::RateLimited { retry_after })
        }
    }
}

/// Request logging middleware
///
/// Reuses the caller's `x-request-id` when present, otherwise generates one,
/// and echoes it on the response.
pub async fn request_logging_middleware(
    State(proxy): State<ProxyPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let correlation_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id);

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client = proxy.request_client(&request);

    log_api_request(&method, &path, client.as_deref(), &correlation_id);
    let started = Instant::now();

    let mut response = next.run(request).await;

    log_api_response(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_millis() as u64,
        &correlation_id,
    );

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'self'"),
    );

    response
}

// ============================================================================
// Tests
// ============================================================================
