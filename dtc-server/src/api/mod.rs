// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP surface shared by the local endpoints and the proxy routes.

pub mod health;
pub mod history;
pub mod settings;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dtc_core::{Project, ProjectError, RecordId, PROJECT_HEADER};
use dtc_storage::{HistoryLedger, ResultsLayout, SettingsStore, StorageError};
use serde::Serialize;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::proxy::BackendClient;

pub use health::health_check;
pub use history::{clear_history, get_history, move_gen_next, move_gen_prev, remove_gen};
pub use settings::get_settings;

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Reading or writing a body, or building the outbound request, failed.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Transport(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BackendUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::BackendTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!("Storage failure: {}", err);
        ApiError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub ledger: Arc<HistoryLedger>,
    pub settings: Arc<SettingsStore>,
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let layout = ResultsLayout::new(&config.storage.results_dir);
        let backend = BackendClient::new(config.backend.request_timeout())?;

        Ok(Self {
            ledger: Arc::new(HistoryLedger::new(layout.clone())),
            settings: Arc::new(SettingsStore::new(&layout)),
            backend,
            config: Arc::new(config),
        })
    }

    pub fn max_body_bytes(&self) -> usize {
        self.config.server.max_body_bytes
    }
}

/// Run synchronous storage work on the blocking pool.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task panicked: {}", e)))?
}

/// Read a whole request body, reporting failures as transport errors.
pub(crate) async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ApiError::Transport(format!("Error reading request body: {}", e)))
}

/// Resolve the project named by the `project` header.
pub(crate) fn project_from_headers(headers: &HeaderMap) -> Result<Project, ApiError> {
    let value = match headers.get(PROJECT_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::BadRequest("project header is not valid text".into()))?,
        ),
        None => None,
    };
    Ok(Project::from_header(value)?)
}

/// Local endpoints take the record ID as the literal request body.
pub(crate) fn parse_record_id(body: &[u8]) -> Result<RecordId, ApiError> {
    std::str::from_utf8(body)
        .ok()
        .map(str::trim)
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "expected a record ID, got {:?}",
                String::from_utf8_lossy(body)
            ))
        })
}
