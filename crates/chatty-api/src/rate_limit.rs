use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Counts requests per key in fixed windows.
pub struct RateLimiter {
    name: &'static str,
    max: u32,
    window: Duration,
    message: &'static str,
    hits: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max: u32, window: Duration, message: &'static str) -> Self {
        Self {
            name,
            max,
            window,
            message,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key`. Errors once the window's budget is spent.
    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), ApiError> {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());

        // Keep the map from growing with one-off clients.
        if hits.len() > 10_000 {
            let window = self.window;
            hits.retain(|_, (start, _)| now.duration_since(*start) < window);
        }

        let entry = hits.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        if entry.1 >= self.max {
            warn!(limiter = self.name, key, "Rate limit exceeded");
            return Err(ApiError::RateLimited(self.message.to_string()));
        }
        entry.1 += 1;
        Ok(())
    }
}

pub struct RateLimits {
    pub login: RateLimiter,
    pub signup: RateLimiter,
    pub send: RateLimiter,
}

impl RateLimits {
    pub fn standard() -> Self {
        Self {
            login: RateLimiter::new(
                "login",
                5,
                Duration::from_secs(15 * 60),
                "Too many login attempts, please try again later",
            ),
            signup: RateLimiter::new(
                "signup",
                3,
                Duration::from_secs(60 * 60),
                "Too many accounts created, please try again later",
            ),
            send: RateLimiter::new(
                "send",
                30,
                Duration::from_secs(60),
                "Too many messages, please slow down",
            ),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::standard()
    }
}

/// Client address for rate limiting. The socket peer, unless `trust_proxy`
/// is set, in which case the hop appended by the proxy (the last
/// `X-Forwarded-For` entry) is used. Clients control every earlier entry.
pub fn client_key(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

pub async fn limit_login(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.production {
        state.limits.login.check(&client_key(&req, state.trust_proxy))?;
    }
    Ok(next.run(req).await)
}

pub async fn limit_signup(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.production {
        state.limits.signup.check(&client_key(&req, state.trust_proxy))?;
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_per_key_and_resets_with_the_window() {
        let limiter = RateLimiter::new("test", 2, Duration::from_secs(60), "slow down");
        let start = Instant::now();

        assert!(limiter.check_at("a", start).is_ok());
        assert!(limiter.check_at("a", start).is_ok());
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(1)),
            Err(ApiError::RateLimited(m)) if m == "slow down"
        ));
        assert!(limiter.check_at("b", start).is_ok());

        assert!(limiter.check_at("a", start + Duration::from_secs(61)).is_ok());
    }

    fn request(forwarded: Option<&str>, peer: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder();
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut req = builder.body(axum::body::Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn forwarded_header_is_ignored_by_default() {
        let req = request(Some("203.0.113.9"), Some("198.51.100.4:5000"));
        assert_eq!(client_key(&req, false), "198.51.100.4");

        assert_eq!(client_key(&request(Some("203.0.113.9"), None), false), "unknown");
    }

    #[test]
    fn trusted_proxy_hop_is_used_when_enabled() {
        let req = request(Some("6.6.6.6, 203.0.113.9"), Some("10.0.0.1:5000"));
        assert_eq!(client_key(&req, true), "203.0.113.9");

        let bare = request(None, Some("10.0.0.1:5000"));
        assert_eq!(client_key(&bare, true), "10.0.0.1");
    }
}
