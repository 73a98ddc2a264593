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

//! DTC Storage
//!
//! File-backed persistence for generated images, per-project history ledgers
//! and the shared settings document. All I/O is synchronous; async callers
//! should drive it from the blocking pool.
//!
//! Layout under the results directory:
//!
//! ```text
//! <results>/settings.json
//! <results>/history.json          global namespace
//! <results>/00001.png
//! <results>/<project>/history.json
//! <results>/<project>/00001.png
//! ```

pub mod error;
pub mod id_allocator;
pub mod image_store;
pub mod layout;
pub mod ledger;
pub mod locks;
pub mod settings;

pub use error::{Result, StorageError};
pub use id_allocator::IdAllocator;
pub use image_store::ImageStore;
pub use layout::ResultsLayout;
pub use ledger::{Commit, HistoryLedger, LedgerState};
pub use locks::ProjectLocks;
pub use settings::{SeedOutcome, SettingsState, SettingsStore};
