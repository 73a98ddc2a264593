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

//! Generation batch conversion
//!
//! Turns a backend `txt2img` answer into history records. The whole batch is
//! handled under the project's writer lock: IDs are allocated from the
//! current ledger, images are written, the records are appended and the
//! ledger is persisted once. Only the new records go back to the client.
//!
//! Timing is the batch's elapsed time divided evenly across its images; the
//! backend does not report per-image durations.

use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dtc_core::{extract_seed, image_ref, GenerationRecord, Project, TaskParameters};
use dtc_storage::{Commit, HistoryLedger, IdAllocator, StorageError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Converted, ResponseConverter};
use crate::api::ApiError;

/// The part of the backend answer we use.
#[derive(Debug, Default, Deserialize)]
struct BackendBatch {
    #[serde(default)]
    images: Vec<String>,
}

impl BackendBatch {
    fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Backend answer is not an image batch ({}), nothing to record", e);
                Self::default()
            }
        }
    }
}

pub struct GenerationConverter {
    ledger: Arc<HistoryLedger>,
}

impl GenerationConverter {
    pub fn new(ledger: Arc<HistoryLedger>) -> Self {
        Self { ledger }
    }

    /// Record one backend batch and return the records it created.
    pub fn record_batch(
        &self,
        project: &Project,
        request_body: &[u8],
        response_body: &[u8],
        elapsed_ms: u64,
    ) -> Result<Vec<GenerationRecord>, StorageError> {
        let batch = BackendBatch::parse(response_body);
        if batch.images.is_empty() {
            return Ok(Vec::new());
        }

        let parameters = task_parameters(request_body);
        let per_image_ms = elapsed_ms / batch.images.len() as u64;
        let images = self.ledger.images();

        let created = self.ledger.update(project, |records| {
            let mut ids = IdAllocator::from_records(records);
            let mut rng = rand::thread_rng();
            let mut created = Vec::with_capacity(batch.images.len());

            for (index, encoded) in batch.images.iter().enumerate() {
                let id = ids.allocate()?;
                let bytes = decode_image(encoded, index);
                images.write(project, id, &bytes)?;

                let mut record =
                    GenerationRecord::new(id, image_ref(id, &mut rng), parameters.clone(), per_image_ms);
                if let Some(seed) = extract_seed(&bytes) {
                    debug!(id, seed, "Recovered seed from image payload");
                    record = record.with_seed(seed);
                }
                created.push(record);
            }

            records.extend(created.iter().cloned());
            Ok(Commit::Write(created))
        })?;

        info!(
            project = %project,
            images = created.len(),
            first_id = created.first().map(|r| r.id),
            elapsed_ms,
            "Recorded generation batch"
        );
        Ok(created)
    }
}

impl ResponseConverter for GenerationConverter {
    fn convert(
        &self,
        project: &Project,
        request_body: &[u8],
        response_body: Bytes,
        elapsed_ms: u64,
    ) -> Result<Converted, ApiError> {
        let created = self.record_batch(project, request_body, &response_body, elapsed_ms)?;
        let body = serde_json::to_vec(&created)
            .map_err(|e| ApiError::Internal(format!("Failed to encode records: {}", e)))?;
        Ok(Converted {
            body: Bytes::from(body),
            content_type: Some("application/json"),
        })
    }
}

/// The request body as opaque parameters; anything but a JSON object yields
/// an empty map.
fn task_parameters(request_body: &[u8]) -> TaskParameters {
    serde_json::from_slice(request_body).unwrap_or_else(|e| {
        debug!("Generation request is not a JSON object ({}), storing no parameters", e);
        TaskParameters::new()
    })
}

/// Decode one base64 image. A bad payload still produces a record (with an
/// empty image) so the rest of the batch is kept.
fn decode_image(encoded: &str, index: usize) -> Vec<u8> {
    match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(index, "Image payload is not valid base64, storing empty image: {}", e);
            Vec::new()
        }
    }
}
