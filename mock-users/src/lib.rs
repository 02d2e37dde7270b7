use axum::{
    debug_handler,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Knobs for shaping the mock's behavior under load.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Artificial per-request processing time.
    pub delay: Duration,
    /// Extra uniform random delay on top of `delay`.
    pub jitter: Duration,
    /// Requests per second before the mock answers 500, unlimited if unset.
    pub max_rps: Option<NonZeroU32>,
    /// POST arrival ordinals (1-based) forced to answer 409, for exercising
    /// a client's conflict handling deterministically.
    pub conflict_on: HashSet<u64>,
    /// Answer 503 on the health path while still serving everything else.
    pub unhealthy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub age: u32,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: u32,
}

#[derive(Serialize)]
struct UserBody {
    user: User,
}

#[derive(Serialize)]
struct UsersBody {
    users: Vec<User>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
}

#[derive(Default)]
struct UserStore {
    next_id: u64,
    by_id: BTreeMap<u64, User>,
    emails: HashSet<String>,
}

struct StateInner {
    store: Mutex<UserStore>,
    limiter: Option<DefaultDirectRateLimiter>,
    delay: Duration,
    jitter: Duration,
    conflict_on: HashSet<u64>,
    unhealthy: bool,
    post_arrivals: AtomicU64,
    served: AtomicU64,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            inner: Arc::new(StateInner {
                store: Mutex::new(UserStore::default()),
                limiter: config.max_rps.map(rate_limiter),
                delay: config.delay,
                jitter: config.jitter,
                conflict_on: config.conflict_on,
                unhealthy: config.unhealthy,
                post_arrivals: AtomicU64::new(0),
                served: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of users currently stored.
    pub fn user_count(&self) -> usize {
        self.inner.store.lock().unwrap().by_id.len()
    }

    pub fn email_exists(&self, email: &str) -> bool {
        self.inner
            .store
            .lock()
            .unwrap()
            .emails
            .contains(&email.to_ascii_lowercase())
    }

    /// Highest number of requests this server saw in flight at once.
    pub fn high_water(&self) -> usize {
        self.inner.high_water.load(Ordering::Relaxed)
    }

    /// Shared rate-limit check plus artificial processing delay for the
    /// load-bearing routes.
    async fn admit(&self) -> Result<(), Response> {
        if let Some(limiter) = &self.inner.limiter {
            if limiter.check().is_err() {
                debug!("MOCK USERS ___ OVERLOADED");
                return Err(error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server overloaded",
                ));
            }
        }

        let mut delay = self.inner.delay;
        if !self.inner.jitter.is_zero() {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.inner.jitter.as_millis() as u64);
            delay += Duration::from_millis(jitter_ms);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// Handle to a mock bound on an ephemeral port.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub state: AppState,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Bind on `127.0.0.1:0` and serve in a background task. The handle keeps
/// the state observable and tears the server down on drop.
pub async fn serve(config: MockConfig) -> anyhow::Result<ServerHandle> {
    let state = AppState::new(config);
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(ServerHandle { addr, state, task })
}

/// Serve forever on a fixed address, for the standalone binary.
pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("mock-users listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_concurrency,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_concurrency(State(state): State<AppState>, request: Request, next: Next) -> Response {
    counter!("mock_users.requests").increment(1);
    state.inner.served.fetch_add(1, Ordering::Relaxed);
    let depth = state.inner.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
    state.inner.high_water.fetch_max(depth, Ordering::Relaxed);

    let response = next.run(request).await;

    state.inner.in_flight.fetch_sub(1, Ordering::Relaxed);
    response
}

#[debug_handler]
async fn create_user(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Response {
    if let Err(response) = state.admit().await {
        return response;
    }

    let ordinal = state.inner.post_arrivals.fetch_add(1, Ordering::Relaxed) + 1;
    if state.inner.conflict_on.contains(&ordinal) {
        return error_response(StatusCode::CONFLICT, "email already exists");
    }

    let name = new_user.name.trim();
    if name.len() < 2 || name.len() > 255 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "name must be between 2 and 255 characters",
        );
    }
    if !valid_email(&new_user.email) {
        return error_response(StatusCode::BAD_REQUEST, "email is invalid");
    }
    if !(1..=150).contains(&new_user.age) {
        return error_response(StatusCode::BAD_REQUEST, "age must be between 1 and 150");
    }

    let mut store = state.inner.store.lock().unwrap();
    let email_key = new_user.email.to_ascii_lowercase();
    if store.emails.contains(&email_key) {
        return error_response(StatusCode::CONFLICT, "email already exists");
    }

    store.next_id += 1;
    let user = User {
        id: store.next_id,
        name: name.to_string(),
        email: new_user.email,
        age: new_user.age,
    };
    store.emails.insert(email_key);
    store.by_id.insert(user.id, user.clone());

    (StatusCode::CREATED, Json(UserBody { user })).into_response()
}

#[debug_handler]
async fn list_users(State(state): State<AppState>) -> Response {
    if let Err(response) = state.admit().await {
        return response;
    }

    let users: Vec<User> = state
        .inner
        .store
        .lock()
        .unwrap()
        .by_id
        .values()
        .cloned()
        .collect();
    Json(UsersBody { users }).into_response()
}

#[debug_handler]
async fn get_user(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    if let Err(response) = state.admit().await {
        return response;
    }

    let user = state.inner.store.lock().unwrap().by_id.get(&id).cloned();
    match user {
        Some(user) => Json(UserBody { user }).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "user not found"),
    }
}

#[debug_handler]
async fn health(State(state): State<AppState>) -> Response {
    if state.inner.unhealthy {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "unhealthy");
    }
    Json(HealthBody {
        status: "ok",
        service: "mock-users",
    })
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && domain.contains('.') && !domain.contains('@')
}

pub fn rate_limiter(rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(rps))
}

/** Per-second served-request printer, for manual runs **/

pub async fn rps_measure_task(state: AppState) {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let served = state.inner.served.fetch_min(0, Ordering::Relaxed);
        println!("{served} req/s");
    }
}
