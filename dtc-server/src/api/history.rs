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

//! History ledger endpoints.
//!
//! These never reach the backend. Reads always succeed with a (possibly
//! empty) array; mutations answer 200 with an empty body whether or not the
//! record was found.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use dtc_core::GenerationRecord;
use tracing::info;

use super::{parse_record_id, project_from_headers, read_body, run_blocking, ApiError, AppState};

/// GET|POST /get-history - Full ledger of the project in display order
pub async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<GenerationRecord>>, ApiError> {
    let project = project_from_headers(&headers)?;
    let ledger = state.ledger.clone();
    let records = run_blocking(move || Ok(ledger.history(&project))).await?;
    Ok(Json(records))
}

/// POST /move-gen-prev - Swap a record with its predecessor
pub async fn move_gen_prev(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let project = project_from_headers(&headers)?;
    let id = parse_record_id(&read_body(body, state.max_body_bytes()).await?)?;
    let ledger = state.ledger.clone();
    run_blocking(move || Ok(ledger.move_prev(&project, id)?)).await?;
    Ok(StatusCode::OK)
}

/// POST /move-gen-next - Swap a record with its successor
pub async fn move_gen_next(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let project = project_from_headers(&headers)?;
    let id = parse_record_id(&read_body(body, state.max_body_bytes()).await?)?;
    let ledger = state.ledger.clone();
    run_blocking(move || Ok(ledger.move_next(&project, id)?)).await?;
    Ok(StatusCode::OK)
}

/// POST /remove-gen - Delete a record and its image
pub async fn remove_gen(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let project = project_from_headers(&headers)?;
    let id = parse_record_id(&read_body(body, state.max_body_bytes()).await?)?;
    let ledger = state.ledger.clone();
    run_blocking(move || {
        if ledger.remove(&project, id)? {
            info!(project = %project, id, "Removed generation");
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::OK)
}

/// GET|POST /clear-history - Delete every record, image and the ledger itself
pub async fn clear_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let project = project_from_headers(&headers)?;
    let ledger = state.ledger.clone();
    run_blocking(move || Ok(ledger.clear(&project)?)).await?;
    Ok(StatusCode::OK)
}
