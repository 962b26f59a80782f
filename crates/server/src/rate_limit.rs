//! Per-client call budget for the abuse-prone endpoints (login, resend, forgot-password).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use configs::RateLimitConfig;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::routes::auth::ServerState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

// Stale windows are swept once the map grows past this many keys.
const SWEEP_THRESHOLD: usize = 4096;

/// `max_requests` calls per key per fixed `window`.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl FixedWindowRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window, windows: DashMap::new() }
    }

    fn sweep(&self, now: Instant) {
        let window = self.window;
        self.windows.retain(|_, w| now.duration_since(w.started) < window);
        debug!(remaining = self.windows.len(), "rate limit windows swept");
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        if self.windows.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }
        if entry.count >= self.max_requests {
            return RateLimitDecision::Limited;
        }
        entry.count += 1;
        RateLimitDecision::Allowed
    }
}

pub fn from_config(cfg: &RateLimitConfig) -> Arc<dyn RateLimiter> {
    if cfg.enabled {
        Arc::new(FixedWindowRateLimiter::new(cfg.max_requests, Duration::from_secs(cfg.window_secs)))
    } else {
        Arc::new(NoopRateLimiter)
    }
}

/// Peer address, or the first `X-Forwarded-For` hop when the proxy in front is trusted.
fn client_key(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Route layer: budgets are kept per path and client.
pub async fn enforce(State(state): State<ServerState>, req: Request, next: Next) -> Result<Response, ApiError> {
    let client = client_key(&req, state.trust_forwarded_for);
    let key = format!("{}|{}", req.uri().path(), client);
    if state.limiter.check(&key) == RateLimitDecision::Limited {
        warn!(path = %req.uri().path(), %client, "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}
