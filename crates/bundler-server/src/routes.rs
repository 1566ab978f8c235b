//! HTTP endpoints.
//!
//! Three submission routes differing only in body handling, a snapshot
//! route, a liveness probe and a data-source probe. Submissions are
//! acknowledged immediately with a NOT_STARTED tracker; the pipeline
//! runs in the background.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info};

use bundler_core::{
    generate_job_id, request_archive, snapshot, BundleRequest, JobDispatcher, JobState, JobStore,
    JobTrackerMessage, RepositoryError, DEFAULT_USERNAME,
};

pub const APPLICATION_NAME: &str = "bundler";

/// Headers carrying the client certificate identity, in precedence order.
pub const CERT_HEADERS: [&str; 4] = [
    "X-SSL-Client-CN",
    "SSL_CLIENT_S_DN_CN",
    "SM_USER",
    "SM_USER_CN",
];

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<JobDispatcher>,
    pub store: Arc<dyn JobStore>,
    pub request_directory: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/BundleFilesJSON", post(bundle_files))
        .route("/BundleFiles", post(bundle_files))
        .route("/BundleFilesText", post(bundle_files))
        .route("/GetState", get(get_state))
        .route("/isAlive", get(is_alive))
        .route("/DataSourceTest", get(data_source_test))
        .with_state(state)
}

struct AppError(RepositoryError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed against the persistence layer");
        (StatusCode::INTERNAL_SERVER_ERROR, "persistence failure").into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError(err)
    }
}

/// Identity from the first recognized certificate header, then
/// `"unavailable"`.
fn user_from_headers(headers: &HeaderMap) -> String {
    for name in CERT_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    DEFAULT_USERNAME.to_string()
}

/// Common submission path: stamp the user, archive the raw request,
/// launch the pipeline, acknowledge.
fn accept(state: &AppState, headers: &HeaderMap, mut request: BundleRequest) -> JobTrackerMessage {
    let header_user = user_from_headers(headers);
    let user_name = match request.user_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() && !name.eq_ignore_ascii_case(DEFAULT_USERNAME) => {
            name.to_string()
        }
        _ => header_user,
    };
    request.user_name = Some(user_name.clone());

    let job_id = generate_job_id();
    info!(
        job_id = %job_id,
        user_name = %user_name,
        files = request.files.len(),
        "submission accepted"
    );
    request_archive::archive_request(state.request_directory.as_deref(), &job_id, &request);

    let dispatcher = state.dispatcher.clone();
    let ack_job_id = job_id.clone();
    tokio::task::spawn_blocking(move || dispatcher.submit(&job_id, &request));

    JobTrackerMessage::placeholder(&ack_job_id, &user_name, JobState::NotStarted)
}

/// All three submission routes carry JSON; the text route differs only
/// in its content type. A body that does not deserialize is a 400
/// regardless of how it fails.
async fn bundle_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<JobTrackerMessage>, Response> {
    let request: BundleRequest = serde_json::from_str(&body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("unparseable bundle request: {e}"),
        )
            .into_response()
    })?;
    Ok(Json(accept(&state, &headers, request)))
}

#[derive(Debug, Deserialize)]
struct GetStateParams {
    job_id: String,
}

async fn get_state(
    State(state): State<AppState>,
    Query(params): Query<GetStateParams>,
) -> Result<Json<JobTrackerMessage>, AppError> {
    let message = snapshot(state.store.as_ref(), &params.job_id)?;
    Ok(Json(message))
}

async fn is_alive() -> String {
    format!(
        "Application [ {APPLICATION_NAME} ] on host [ {} ] is alive!",
        bundler_core::worker::host_name()
    )
}

async fn data_source_test(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.store.list_job_ids()?))
}
