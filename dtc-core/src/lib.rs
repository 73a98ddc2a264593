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

//! DTC Core
//!
//! Shared data types for the generation gateway: history records, project
//! namespaces, image naming and the backend seed heuristic.

pub mod project;
pub mod record;
pub mod seed;

pub use project::{Project, ProjectError, PROJECT_HEADER};
pub use record::{image_file_name, image_ref, GenerationRecord, RecordId, TaskParameters};
pub use seed::extract_seed;
