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

//! Generation records as stored in a project's history ledger.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record identifier, unique within one project's ledger.
pub type RecordId = u64;

/// Opaque generation parameters copied from the `/generate` request body.
pub type TaskParameters = Map<String, Value>;

/// Upper bound (exclusive) of the cache-busting token appended to image refs.
const CACHE_TOKEN_RANGE: u32 = 100_000;

/// One generated image plus the parameters that produced it.
///
/// The JSON keys match the ledger documents the web UI already reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    #[serde(rename = "imageName", alias = "imageURL")]
    pub image_ref: String,

    #[serde(rename = "taskData", default)]
    pub task_parameters: TaskParameters,

    #[serde(rename = "genTime", default)]
    pub gen_time_millis: u64,

    #[serde(rename = "ID")]
    pub id: RecordId,

    /// Seed recovered from the image payload, when the backend embeds one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GenerationRecord {
    pub fn new(
        id: RecordId,
        image_ref: String,
        task_parameters: TaskParameters,
        gen_time_millis: u64,
    ) -> Self {
        Self {
            image_ref,
            task_parameters,
            gen_time_millis,
            id,
            seed: None,
        }
    }

    /// Attach a seed override. The value is mirrored into `taskData.seed` so
    /// clients replaying the parameters reproduce the image.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.task_parameters
            .insert("seed".to_string(), Value::from(seed));
        self.seed = Some(seed);
        self
    }
}

/// File name of the image for `id`, e.g. `00042.png`.
pub fn image_file_name(id: RecordId) -> String {
    format!("{:05}.png", id)
}

/// Image reference handed to clients: the file name plus a random token so a
/// reused ID is never served from a stale browser cache.
pub fn image_ref<R: Rng + ?Sized>(id: RecordId, rng: &mut R) -> String {
    let token = rng.gen_range(0..CACHE_TOKEN_RANGE);
    format!("{}?{:05}", image_file_name(id), token)
}
