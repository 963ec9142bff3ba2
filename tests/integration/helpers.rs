//! Shared test helpers for integration tests.
//!
//! Every backend is in-memory. Two [`TestApp`]s built on the same
//! [`Backends`] behave like two server processes sharing a database, a
//! cache and a bus.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use flym_api::AppState;
use flym_auth::{
    ClientType, InviteCodec, InviteService, JwtDecoder, JwtEncoder, LoginService,
    PasswordHasher, RevocationStore, SessionManager, TokenPair, TokenSubject,
};
use flym_cache::CacheManager;
use flym_cache::memory::MemoryCacheProvider;
use flym_core::config::AppConfig;
use flym_core::error::AppError;
use flym_core::result::AppResult;
use flym_core::traits::CacheProvider;
use flym_database::MemoryChatRepository;
use flym_entity::{Identity, User};
use flym_realtime::connection::AuthenticatedPeer;
use flym_realtime::{ConnectionHandle, MemoryBus, OutboundFrame, RealtimeEngine};

/// In-memory cache that can be switched off to simulate an outage.
#[derive(Debug)]
pub struct SwitchableCache {
    inner: MemoryCacheProvider,
    down: AtomicBool,
}

impl SwitchableCache {
    pub fn new(inner: MemoryCacheProvider) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    /// Make every call fail with a cache error until reset.
    pub fn set_unavailable(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::cache("cache marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheProvider for SwitchableCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(!self.down.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Storage, cache and bus shared by every node of a test cluster.
pub struct Backends {
    pub config: AppConfig,
    pub repo: Arc<MemoryChatRepository>,
    pub cache: Arc<CacheManager>,
    pub cache_switch: Arc<SwitchableCache>,
    pub bus: Arc<MemoryBus>,
}

impl Backends {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "integration-test-secret".into();
        config.database.provider = "memory".into();
        config.worker.enabled = false;
        config.realtime.operation_timeout_ms = 1000;

        let cache_switch = Arc::new(SwitchableCache::new(MemoryCacheProvider::new(
            &config.cache.memory,
        )));
        let cache = Arc::new(CacheManager::from_provider(cache_switch.clone()));

        Self {
            config,
            repo: Arc::new(MemoryChatRepository::new()),
            cache,
            cache_switch,
            bus: Arc::new(MemoryBus::new(256)),
        }
    }
}

/// One server node.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub repo: Arc<MemoryChatRepository>,
    pub cache_switch: Arc<SwitchableCache>,
}

/// Response of a routed request.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Every `Set-Cookie` header value.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    /// Value of the named cookie set by the response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies().into_iter().find_map(|c| {
            c.split(';')
                .next()
                .and_then(|pair| pair.strip_prefix(&prefix))
                .map(str::to_string)
        })
    }
}

impl TestApp {
    /// A single node on fresh backends.
    pub async fn new() -> Self {
        Self::on(&Backends::new()).await
    }

    /// A node on shared backends.
    pub async fn on(backends: &Backends) -> Self {
        let config = backends.config.clone();
        let encoder = JwtEncoder::new(&config.auth).expect("encoder");
        let decoder = JwtDecoder::new(&config.auth).expect("decoder");
        let sessions = Arc::new(SessionManager::new(
            Arc::new(encoder.clone()),
            Arc::new(decoder.clone()),
            Arc::new(RevocationStore::new(backends.cache.clone())),
            config.auth.clone(),
        ));

        let logins = Arc::new(LoginService::new(backends.repo.clone(), sessions.clone()));

        let realtime = RealtimeEngine::new(
            &config.realtime,
            &config.bus,
            backends.bus.clone(),
            backends.repo.clone(),
            sessions.clone(),
        );
        realtime.start().await.expect("engine start");

        let invites = Arc::new(InviteService::new(
            InviteCodec::new(encoder, decoder, config.auth.invite_ttl()),
            backends.repo.clone(),
            sessions.clone(),
            realtime.event_publisher(),
            config.auth.guest_ttl(),
        ));

        let state = AppState {
            config: Arc::new(config),
            repo: backends.repo.clone(),
            cache: backends.cache.clone(),
            sessions,
            logins,
            invites,
            realtime,
            started_at: Instant::now(),
        };

        Self {
            router: flym_api::build_app(state.clone()),
            state,
            repo: backends.repo.clone(),
            cache_switch: backends.cache_switch.clone(),
        }
    }

    pub fn engine(&self) -> &RealtimeEngine {
        &self.state.realtime
    }

    /// A registered user who can log in with `password`.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> User {
        let user = self.repo.create_user(name, email).await;
        let hash = PasswordHasher::new().hash(password).expect("hash");
        self.repo
            .set_password_hash(user.id, &hash)
            .await
            .expect("set password");
        user
    }

    /// Issue a web session for `user`.
    pub fn login(&self, user: &User) -> TokenPair {
        self.state
            .sessions
            .issue_pair(&TokenSubject::user(user.id, user.name.clone()), ClientType::Web)
            .expect("issue pair")
    }

    /// Register a socket-less connection for `identity` with this node's
    /// engine.
    pub fn connect(&self, identity: Identity) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundFrame>) {
        self.connect_scoped(identity, None)
    }

    pub fn connect_scoped(
        &self,
        identity: Identity,
        room_scope: Option<Uuid>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundFrame>) {
        self.engine().connections.register(AuthenticatedPeer {
            identity,
            room_scope,
            token_id: Uuid::new_v4(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(15),
        })
    }

    /// Send a request through the router.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut headers = Vec::new();
        if let Some(token) = token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        self.request_with_headers(method, path, body, &headers).await
    }

    pub async fn request_with_headers(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(String, String)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Next JSON text frame, skipping pings. Panics after two seconds.
pub async fn next_event(rx: &mut mpsc::Receiver<OutboundFrame>) -> Value {
    let deadline = Duration::from_secs(2);
    loop {
        let frame = tokio::time::timeout(deadline, rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection channel closed");
        match frame {
            OutboundFrame::Text(text) => return serde_json::from_str(&text).expect("json frame"),
            OutboundFrame::Ping => continue,
            OutboundFrame::Close { code, reason } => {
                panic!("unexpected close {code}: {reason}")
            }
        }
    }
}

/// Next event of the given `type`, skipping others.
pub async fn next_event_of(rx: &mut mpsc::Receiver<OutboundFrame>, kind: &str) -> Value {
    loop {
        let event = next_event(rx).await;
        if event["type"] == kind {
            return event;
        }
    }
}

/// Assert nothing arrives within `wait`.
pub async fn assert_silent(rx: &mut mpsc::Receiver<OutboundFrame>, wait: Duration) {
    if let Ok(Some(frame)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("expected no frame, got {frame:?}");
    }
}
