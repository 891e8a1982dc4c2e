#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use chatty_api::middleware::create_token;
use chatty_api::rate_limit::RateLimits;
use chatty_api::{AppState, AppStateInner, build_router};
use chatty_db::Database;
use chatty_gateway::PresenceRegistry;
use chatty_media::{ContentStore, ImagePipeline, StoreError};
use chatty_moderation::ModerationGate;

pub const SECRET: &str = "test-secret";

/// Content store that hands out predictable URLs.
#[derive(Default)]
pub struct MemoryStore {
    uploads: AtomicUsize,
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upload(&self, _: &[u8], _: &str, folder: &str) -> Result<String, StoreError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://cdn.test/{folder}/{n}"))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(false, false, ModerationGate::local_only())
    }

    pub fn production() -> Self {
        Self::build(true, false, ModerationGate::local_only())
    }

    pub fn production_behind_proxy() -> Self {
        Self::build(true, true, ModerationGate::local_only())
    }

    pub fn with_gate(gate: ModerationGate) -> Self {
        Self::build(false, false, gate)
    }

    fn build(production: bool, trust_proxy: bool, gate: ModerationGate) -> Self {
        let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::default());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.into(),
            production,
            trust_proxy,
            presence: PresenceRegistry::new(),
            moderation: gate.clone(),
            images: ImagePipeline::new(gate, Some(store), None),
            limits: RateLimits::standard(),
        });
        let router = build_router(state.clone());
        Self { state, router }
    }

    /// Create a user straight in the database and return its session cookie.
    pub fn seed_user(&self, id: &str, name: &str) -> String {
        self.state
            .db
            .create_user(id, &format!("{id}@example.com"), name, "unused-hash")
            .unwrap();
        let token = create_token(SECRET, id).unwrap();
        format!("jwt={token}")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }
}

/// `jwt=<token>` from a response's Set-Cookie header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("jwt="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}
