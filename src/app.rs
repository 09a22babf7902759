use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::{StoreBackend, TrackerConfig, Transport};
use crate::dropdown::load_dropdowns;
use crate::error::{DropdownError, UpsertError};
use crate::payload::Payload;
use crate::qr::{QrLabel, ist_timestamp};
use crate::schema::Operation;
use crate::sheets::SheetsStore;
use crate::store::{MemoryStore, RecordStore};
use crate::upsert::{UpsertEngine, UpsertOutcome};

pub struct AppState {
    engine: UpsertEngine,
}

impl AppState {
    pub fn new(engine: UpsertEngine) -> Self {
        AppState { engine }
    }

    /// Build the store and engine described by `config`.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn RecordStore> = match &config.store {
            StoreBackend::Sheets {
                spreadsheet_id,
                base_url,
                credentials,
            } => Arc::new(SheetsStore::new(
                base_url,
                spreadsheet_id,
                credentials,
                config.store_timeout,
            )?),
            StoreBackend::Memory => {
                log::warn!("using the in-memory store; records are lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        let engine = UpsertEngine::new(store)
            .with_layout(config.create_layout)
            .with_lock_policy(config.lock_policy)
            .with_timeout(config.store_timeout);
        Ok(AppState::new(engine))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrSubmission {
    pub qr_id: String,
    pub operation: String,
    #[serde(default)]
    pub data: Payload,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct OperationInfo {
    name: &'static str,
    staged: bool,
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct ScanResponse {
    #[serde(flatten)]
    label: QrLabel,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct LabelResponse {
    text: String,
}

fn message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

/// Routes of the tracking service. Static files under `static_dir` are served
/// for any other path when the directory exists.
pub fn router(state: Arc<AppState>, static_dir: Option<&std::path::Path>) -> Router {
    let app = Router::new()
        .route("/get-data", get(get_data))
        .route("/process-qr", post(process_qr))
        .route("/operations", get(list_operations))
        .route("/scan", post(scan_label))
        .route("/qr-label", post(make_label))
        .with_state(state)
        .layer(CorsLayer::permissive());

    match static_dir {
        Some(dir) if dir.is_dir() => app.fallback_service(ServeDir::new(dir)),
        _ => app,
    }
}

pub async fn run(config: TrackerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_config(&config)?);
    let app = router(state, Some(&config.static_dir));

    match &config.transport {
        Transport::Http => {
            let listener = TcpListener::bind(config.bind).await?;
            announce("http", config.bind);
            axum::serve(listener, app).await?;
        }
        Transport::Https { cert, key } => serve_tls(app, config.bind, cert, key).await?,
    }

    Ok(())
}

#[cfg(feature = "tls")]
async fn serve_tls(
    app: Router,
    bind: SocketAddr,
    cert: &std::path::Path,
    key: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
    announce("https", bind);
    axum_server::bind_rustls(bind, tls)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(not(feature = "tls"))]
async fn serve_tls(
    _app: Router,
    _bind: SocketAddr,
    _cert: &std::path::Path,
    _key: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("HTTPS requires the 'tls' feature".into())
}

fn announce(scheme: &str, bind: SocketAddr) {
    log::info!("Listening on {}://{}", scheme, bind);
    if bind.ip().is_unspecified() {
        let lan = local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "127.0.0.1".to_string());
        log::info!("Accessible over the network at {}://{}:{}", scheme, lan, bind.port());
    }
}

async fn get_data(State(state): State<Arc<AppState>>) -> Response {
    let store = state.engine.store();
    match load_dropdowns(store.as_ref(), state.engine.timeout()).await {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(DropdownError::EmptyReferenceData) => message(StatusCode::NOT_FOUND, "No data found"),
        Err(DropdownError::Store(e)) => {
            log::error!("Error fetching dropdown data: {}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch dropdown data")
        }
    }
}

async fn process_qr(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QrSubmission>, JsonRejection>,
) -> Response {
    let Json(submission) = match body {
        Ok(body) => body,
        Err(rejection) => {
            log::warn!("unreadable submission: {}", rejection.body_text());
            return message(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let result = state
        .engine
        .upsert(
            &submission.qr_id,
            &submission.operation,
            submission.data.stage(),
            &submission.data,
        )
        .await;

    match result {
        Ok(UpsertOutcome::Created { .. }) => {
            message(StatusCode::OK, "New QR ID added successfully.")
        }
        Ok(UpsertOutcome::Updated { .. }) => message(
            StatusCode::OK,
            format!(
                "{} updated for QR ID {}.",
                submission.operation, submission.qr_id
            ),
        ),
        Err(UpsertError::Rejected(rejection)) => {
            log::warn!("rejected {} for {}: {}", submission.operation, submission.qr_id, rejection);
            message(StatusCode::BAD_REQUEST, rejection.to_string())
        }
        Err(UpsertError::Store(e)) => {
            log::error!("Error processing QR data for {}: {}", submission.qr_id, e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process QR data.")
        }
    }
}

async fn list_operations() -> Json<Vec<OperationInfo>> {
    Json(
        Operation::ALL
            .iter()
            .map(|op| OperationInfo {
                name: op.name(),
                staged: op.is_staged(),
            })
            .collect(),
    )
}

async fn scan_label(body: Result<Json<ScanRequest>, JsonRejection>) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return message(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match QrLabel::parse(&request.text) {
        Ok(label) => Json(ScanResponse {
            label,
            timestamp: ist_timestamp(chrono::Utc::now()),
        })
        .into_response(),
        Err(e) => message(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn make_label(body: Result<Json<QrLabel>, JsonRejection>) -> Response {
    let Json(label) = match body {
        Ok(body) => body,
        Err(rejection) => return message(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match label.encode() {
        Ok(text) => Json(LabelResponse { text }).into_response(),
        Err(e) => message(StatusCode::BAD_REQUEST, e.to_string()),
    }
}
