//! Purpose: Provide the HTTP/JSON record server for msgboard.
//! Exports: `ServeConfig`, `serve`, `router`.
//! Role: Axum server mapping the four record endpoints onto a `Store`.
//! Invariants: Responses use the `{success, data|error}` envelope; delete failures send the raw error body.
//! Invariants: Input is validated before any store call; the server caches nothing between requests.
//! Invariants: Failures answer HTTP 200 and clients branch on `success`; oversized bodies get 413.
//! Invariants: Loopback-only unless explicitly allowed.

use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

use msgboard::api::{
    Envelope, ErrorBody, Error, ErrorKind, ObjectId, RecordUpdate, Store, StoreRoute,
    invalid_input, validate_message,
};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub store: StoreRoute,
    pub cors_allowed_origins: Vec<String>,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    let store = config.store.open()?;
    let app = router(store.clone(), &config)?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    info!(bind = %config.bind, store = %store.describe(), "listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            info!("shutting down");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

pub fn router(store: Arc<dyn Store>, config: &ServeConfig) -> Result<Router, Error> {
    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;
    let cors = cors_layer(&config.cors_allowed_origins)?;

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/get_data", get(get_data))
        .route("/write_data", post(write_data))
        .route("/delete_data", delete(delete_data))
        .route("/update_data", post(update_data))
        .layer(DefaultBodyLimit::max(max_body_bytes));
    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    Ok(app
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState { store })))
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 65536."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    for origin in &config.cors_allowed_origins {
        validate_cors_origin(origin)?;
    }

    Ok(())
}

fn validate_cors_origin(origin: &str) -> Result<(), Error> {
    let invalid = || {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid --cors-origin {origin:?}"))
            .with_hint("Use an origin like http://localhost:3000 (scheme, host, optional port).")
    };
    let url = Url::parse(origin).map_err(|err| invalid().with_source(err))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid());
    }
    if origin.ends_with('/') {
        return Err(invalid());
    }
    Ok(())
}

fn cors_layer(origins: &[String]) -> Result<Option<CorsLayer>, Error> {
    if origins.is_empty() {
        return Ok(None);
    }
    let mut allowed = Vec::with_capacity(origins.len());
    for origin in origins {
        validate_cors_origin(origin)?;
        let value = HeaderValue::from_str(origin).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid --cors-origin {origin:?}"))
                .with_source(err)
        })?;
        allowed.push(value);
    }
    Ok(Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([CONTENT_TYPE]),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

/// Request body decoded from JSON or a URL-encoded form; an empty body is `T::default()`.
struct Payload<T>(T);

/// A body that could not be read or decoded. Carries 413 for oversized bodies, 200 otherwise.
struct PayloadRejection {
    status: StatusCode,
    error: Error,
}

impl PayloadRejection {
    fn new(status: StatusCode, error: Error) -> Self {
        let status = if status == StatusCode::PAYLOAD_TOO_LARGE {
            status
        } else {
            StatusCode::OK
        };
        Self { status, error }
    }

    fn decode(error: Error) -> Self {
        Self::new(StatusCode::OK, error)
    }

    fn into_raw_response(self) -> Response {
        log_failure(&self.error);
        (self.status, Json(ErrorBody::from_error(&self.error))).into_response()
    }
}

impl IntoResponse for PayloadRejection {
    fn into_response(self) -> Response {
        log_failure(&self.error);
        (self.status, Json(Envelope::<()>::failure(&self.error))).into_response()
    }
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = PayloadRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| {
                    PayloadRejection::new(
                        rejection.status(),
                        invalid_input().with_hint(rejection.body_text()),
                    )
                })?;
            return Ok(Payload(value));
        }

        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            PayloadRejection::new(
                rejection.status(),
                invalid_input().with_hint(format!(
                    "{} (request bodies are limited by --max-body-bytes)",
                    rejection.body_text()
                )),
            )
        })?;
        decode_json_body(&body)
            .map(Payload)
            .map_err(PayloadRejection::decode)
    }
}

fn decode_json_body<T>(body: &[u8]) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| invalid_input().with_source(err))
}

#[derive(Debug, Default, Deserialize)]
struct WriteRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IdRequest {
    #[serde(default, alias = "_id")]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateRequest {
    #[serde(default, alias = "_id")]
    id: Option<String>,
    #[serde(default)]
    update: Option<RecordUpdate>,
}

fn parse_id(id: Option<String>) -> Result<ObjectId, Error> {
    match id {
        Some(id) if !id.is_empty() => ObjectId::parse(&id),
        _ => Err(invalid_input()),
    }
}

async fn run_store<T, F>(state: &AppState, op: F) -> Result<T, Error>
where
    F: FnOnce(&dyn Store) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("store task failed")
                .with_source(err)
        })?
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn get_data(State(state): State<Arc<AppState>>) -> Response {
    match run_store(&state, |store| store.find_all()).await {
        Ok(records) => (StatusCode::OK, Json(Envelope::with_data(records))).into_response(),
        Err(err) => failure_response(err),
    }
}

async fn write_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Payload<WriteRequest>, PayloadRejection>,
) -> Response {
    let request = match payload {
        Ok(Payload(request)) => request,
        Err(rejection) => return rejection.into_response(),
    };
    let message = match validate_message(request.message) {
        Ok(message) => message,
        Err(err) => return failure_response(err),
    };
    match run_store(&state, move |store| store.insert(message)).await {
        Ok(record) => {
            info!(id = %record.id, "record created");
            ok_response()
        }
        Err(err) => failure_response(err),
    }
}

async fn delete_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Payload<IdRequest>, PayloadRejection>,
) -> Response {
    let request = match payload {
        Ok(Payload(request)) => request,
        Err(rejection) => return rejection.into_raw_response(),
    };
    let id = match parse_id(request.id) {
        Ok(id) => id,
        Err(err) => return raw_error_response(err),
    };
    match run_store(&state, move |store| store.delete_by_id(&id)).await {
        Ok(removed) => {
            info!(%id, removed = removed.is_some(), "record delete");
            ok_response()
        }
        Err(err) => raw_error_response(err),
    }
}

async fn update_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Payload<UpdateRequest>, PayloadRejection>,
) -> Response {
    let request = match payload {
        Ok(Payload(request)) => request,
        Err(rejection) => return rejection.into_response(),
    };
    let id = match parse_id(request.id) {
        Ok(id) => id,
        Err(err) => return failure_response(err),
    };
    let update = request.update.unwrap_or_default();
    match run_store(&state, move |store| store.update_by_id(&id, &update)).await {
        Ok(updated) => {
            info!(%id, matched = updated.is_some(), "record update");
            ok_response()
        }
        Err(err) => failure_response(err),
    }
}

fn ok_response() -> Response {
    (StatusCode::OK, Json(Envelope::<()>::ok())).into_response()
}

fn log_failure(err: &Error) {
    if err.kind().is_store_failure() || err.kind() == ErrorKind::Internal {
        warn!(error = %err, "store operation failed");
    } else {
        info!(error = %err, "rejected request");
    }
}

fn failure_response(err: Error) -> Response {
    log_failure(&err);
    (StatusCode::OK, Json(Envelope::<()>::failure(&err))).into_response()
}

fn raw_error_response(err: Error) -> Response {
    log_failure(&err);
    (StatusCode::OK, Json(ErrorBody::from_error(&err))).into_response()
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_MAX_BODY_BYTES, ServeConfig, UpdateRequest, WriteRequest, decode_json_body,
        parse_id, router, serve, validate_config,
    };
    use msgboard::api::{ApiClient, ErrorKind, MemoryStore, RecordUpdate, Store, StoreRoute};
    use std::sync::Arc;

    fn config(bind: &str) -> ServeConfig {
        ServeConfig {
            bind: bind.parse().expect("bind"),
            store: StoreRoute::Memory,
            cors_allowed_origins: Vec::new(),
            allow_non_loopback: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    #[tokio::test]
    async fn serve_rejects_non_loopback_bind() {
        let err = serve(config("0.0.0.0:0")).await.expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn non_loopback_allowed_with_flag() {
        let mut config = config("0.0.0.0:5000");
        config.allow_non_loopback = true;
        validate_config(&config).expect("config ok");
    }

    #[test]
    fn body_limit_must_be_positive() {
        let mut config = config("127.0.0.1:0");
        config.max_body_bytes = 0;
        let err = validate_config(&config).expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn cors_origins_must_be_bare_origins() {
        let mut config = config("127.0.0.1:0");
        config.cors_allowed_origins = vec!["http://localhost:3000".to_string()];
        validate_config(&config).expect("config ok");

        for origin in ["localhost:3000", "http://localhost:3000/app", "http://localhost:3000/"] {
            config.cors_allowed_origins = vec![origin.to_string()];
            let err = validate_config(&config).expect_err("invalid origin");
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
    }

    #[test]
    fn empty_body_decodes_to_defaults() {
        let request: WriteRequest = decode_json_body(b"  \n").expect("decode");
        assert!(request.message.is_none());
    }

    #[test]
    fn malformed_body_is_invalid_input() {
        let err = decode_json_body::<WriteRequest>(b"{\"message\": 5}").expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), Some("Invalid input."));
    }

    #[test]
    fn update_request_accepts_store_id_alias() {
        let request: UpdateRequest =
            decode_json_body(br#"{"_id":"5c0ffee00102030405abcdef","update":{"message":"m"}}"#)
                .expect("decode");
        assert_eq!(request.update, Some(RecordUpdate::message("m")));
        assert!(parse_id(request.id).is_ok());
    }

    #[test]
    fn missing_or_malformed_ids_are_rejected() {
        for id in [None, Some(String::new()), Some("42".to_string())] {
            let err = parse_id(id).expect_err("invalid id");
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(err.message(), Some("Invalid input."));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn endpoints_round_trip_over_loopback() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let app = router(store.clone(), &config("127.0.0.1:0")).expect("router");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let records = tokio::task::spawn_blocking(move || {
            let client = ApiClient::new(format!("http://{addr}")).expect("client");
            client.write_record("hello").expect("write");
            let created = client.list_records().expect("list");
            let id = created[0].id.to_string();
            client
                .update_record(&id, &RecordUpdate::message("bye"))
                .expect("update");
            let updated = client.list_records().expect("list");
            client.delete_record(&id).expect("delete");
            client.delete_record(&id).expect("delete twice");
            (created, updated, client.list_records().expect("list"))
        })
        .await
        .expect("client task");
        server.abort();

        let (created, updated, remaining) = records;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].message, "hello");
        assert_eq!(updated[0].id, created[0].id);
        assert_eq!(updated[0].message, "bye");
        assert!(remaining.is_empty());
        assert!(store.find_all().expect("list").is_empty());
    }
}
