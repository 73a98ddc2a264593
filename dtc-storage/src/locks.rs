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

//! Per-project writer locks.
//!
//! Every ledger mutation is a read-modify-write of one document, so writers of
//! the same project must be serialized. Projects never share a lock.

use dashmap::DashMap;
use dtc_core::Project;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: DashMap<Project, Arc<Mutex<()>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the writer lock of `project`, created on first use.
    ///
    /// The map shard is released before returning so that waiting on one
    /// project's lock never blocks lookups for another.
    pub fn handle(&self, project: &Project) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(project) {
            return lock.clone();
        }
        self.locks.entry(project.clone()).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
