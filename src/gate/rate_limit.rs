//! Fixed-window per-client rate limiting.
//!
//! Each client gets a `RateWindow { count, window_start }`. A window older than the configured
//! duration is discarded and the next request starts a fresh one at count 1. Expired windows are
//! swept on every call, and the store never tracks more than `max_clients` windows: when full, the
//! oldest window is evicted to make room. The check-then-update happens under one lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::GateError;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_MESSAGE: &str = "Too many requests";
pub const DEFAULT_MAX_CLIENTS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    pub message: String,
    pub max_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
            message: DEFAULT_MESSAGE.to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// `count` is the request's position within the current window.
    Allowed { count: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateDecision::Allowed { .. } => None,
            RateDecision::Limited { retry_after } => Some(retry_after.as_millis().div_ceil(1000) as u64),
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, windows: Mutex::new(HashMap::new()) }
    }

    pub fn config(&self) -> &RateLimitConfig { &self.config }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let window = self.config.window;
        let mut windows = self.windows.lock();
        windows.retain(|_, w| now.saturating_duration_since(w.window_start) <= window);

        if let Some(w) = windows.get_mut(client) {
            if w.count < self.config.max_requests {
                w.count += 1;
                return RateDecision::Allowed { count: w.count };
            }
            let elapsed = now.saturating_duration_since(w.window_start);
            return RateDecision::Limited { retry_after: window.saturating_sub(elapsed) };
        }

        if windows.len() >= self.config.max_clients {
            let oldest = windows
                .iter()
                .min_by_key(|(_, w)| w.window_start)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                windows.remove(&k);
                warn!(evicted = %k, capacity = self.config.max_clients, "rate limiter at capacity; evicted oldest window");
            }
        }
        windows.insert(client.to_string(), RateWindow { count: 1, window_start: now });
        RateDecision::Allowed { count: 1 }
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Peer IP when the server was started with connect info; otherwise the first
/// `X-Forwarded-For` hop; otherwise a shared bucket.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let client = client_key(&request);
    let decision = limiter.check(&client);
    if let Some(retry_after_secs) = decision.retry_after_secs() {
        debug!(client = %client, retry_after_secs, "rate limited");
        return Err(GateError::RateLimited { message: limiter.config().message.clone(), retry_after_secs });
    }
    Ok(next.run(request).await)
}
