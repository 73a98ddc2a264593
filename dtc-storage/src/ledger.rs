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

//! Per-project history ledger
//!
//! The ledger is an ordered list of [`GenerationRecord`]s kept in display
//! order, persisted as one tab-indented JSON array per project.
//!
//! - Reads are lock-free snapshots of the document on disk.
//! - Every mutation runs under the project's writer lock as
//!   load → mutate in memory → atomic rewrite (temp file + rename).
//! - A missing document and an unreadable document are distinct states; both
//!   read back as an empty history.

use dtc_core::{GenerationRecord, Project, RecordId};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::image_store::ImageStore;
use crate::layout::ResultsLayout;
use crate::locks::ProjectLocks;

/// Suffix given to an unreadable ledger document before it is replaced.
const CORRUPT_SUFFIX: &str = "corrupt";

/// What was found on disk for a project's ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerState {
    /// No document persisted yet (or cleared).
    Absent,
    /// A document exists but could not be read or parsed.
    Unreadable { reason: String },
    Present(Vec<GenerationRecord>),
}

impl LedgerState {
    /// Records to work with; absent and unreadable ledgers are empty.
    pub fn into_records(self) -> Vec<GenerationRecord> {
        match self {
            LedgerState::Present(records) => records,
            LedgerState::Absent | LedgerState::Unreadable { .. } => Vec::new(),
        }
    }
}

/// Outcome of a mutation closure passed to [`HistoryLedger::update`].
#[derive(Debug)]
pub enum Commit<T> {
    /// Persist the mutated records.
    Write(T),
    /// Leave the document untouched.
    Keep(T),
}

pub struct HistoryLedger {
    layout: ResultsLayout,
    images: ImageStore,
    locks: ProjectLocks,
}

impl HistoryLedger {
    pub fn new(layout: ResultsLayout) -> Self {
        Self {
            images: ImageStore::new(layout.clone()),
            layout,
            locks: ProjectLocks::new(),
        }
    }

    pub fn layout(&self) -> &ResultsLayout {
        &self.layout
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Snapshot of the persisted document, taken without the writer lock.
    pub fn load(&self, project: &Project) -> LedgerState {
        let path = self.layout.history_path(project);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return LedgerState::Absent,
            Err(e) => {
                return LedgerState::Unreadable {
                    reason: e.to_string(),
                }
            }
        };

        match serde_json::from_slice::<Option<Vec<GenerationRecord>>>(&bytes) {
            Ok(Some(records)) => LedgerState::Present(records),
            // A literal `null` document is what an empty batch used to write.
            Ok(None) => LedgerState::Present(Vec::new()),
            Err(e) => LedgerState::Unreadable {
                reason: e.to_string(),
            },
        }
    }

    /// The full history in display order; never fails.
    pub fn history(&self, project: &Project) -> Vec<GenerationRecord> {
        match self.load(project) {
            LedgerState::Unreadable { reason } => {
                warn!(project = %project, "History ledger unreadable, serving empty: {}", reason);
                Vec::new()
            }
            state => state.into_records(),
        }
    }

    /// Run a read-modify-write cycle under the project's writer lock.
    ///
    /// The closure sees the current records (empty when absent or unreadable)
    /// and decides whether the result is written back. An unreadable document
    /// is moved aside before it is replaced.
    pub fn update<T, F>(&self, project: &Project, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<GenerationRecord>) -> Result<Commit<T>>,
    {
        let lock = self.locks.handle(project);
        let _guard = lock.lock();

        let state = self.load(project);
        let unreadable = matches!(state, LedgerState::Unreadable { .. });
        if let LedgerState::Unreadable { reason } = &state {
            warn!(project = %project, "History ledger unreadable, starting from empty: {}", reason);
        }

        let mut records = state.into_records();
        match mutate(&mut records)? {
            Commit::Write(value) => {
                if unreadable {
                    self.set_aside(project)?;
                }
                self.persist(project, &records)?;
                Ok(value)
            }
            Commit::Keep(value) => Ok(value),
        }
    }

    /// Swap the record with its predecessor. Returns `false` (and writes
    /// nothing) when the ID is absent or already first.
    pub fn move_prev(&self, project: &Project, id: RecordId) -> Result<bool> {
        self.update(project, |records| {
            let found = records
                .iter()
                .skip(1)
                .position(|r| r.id == id)
                .map(|offset| offset + 1);
            match found {
                Some(index) => {
                    records.swap(index - 1, index);
                    debug!(project = %project, id, index, "Moved record towards front");
                    Ok(Commit::Write(true))
                }
                None => Ok(Commit::Keep(false)),
            }
        })
    }

    /// Swap the record with its successor. Returns `false` (and writes
    /// nothing) when the ID is absent or already last.
    pub fn move_next(&self, project: &Project, id: RecordId) -> Result<bool> {
        self.update(project, |records| {
            let searchable = records.len().saturating_sub(1);
            let found = records[..searchable].iter().position(|r| r.id == id);
            match found {
                Some(index) => {
                    records.swap(index, index + 1);
                    debug!(project = %project, id, index, "Moved record towards back");
                    Ok(Commit::Write(true))
                }
                None => Ok(Commit::Keep(false)),
            }
        })
    }

    /// Delete the image for `id` (best effort) and splice its record out.
    /// Returns whether a record was removed.
    pub fn remove(&self, project: &Project, id: RecordId) -> Result<bool> {
        self.update(project, |records| {
            self.images.remove(project, id);
            match records.iter().position(|r| r.id == id) {
                Some(index) => {
                    records.remove(index);
                    debug!(project = %project, id, "Removed record");
                    Ok(Commit::Write(true))
                }
                None => Ok(Commit::Keep(false)),
            }
        })
    }

    /// Delete every referenced image, then the ledger document itself.
    /// Returns the number of image files removed.
    pub fn clear(&self, project: &Project) -> Result<usize> {
        let lock = self.locks.handle(project);
        let _guard = lock.lock();

        let path = self.layout.history_path(project);
        ensure_document_slot(&path)?;

        let removed = match self.load(project) {
            LedgerState::Absent => 0,
            LedgerState::Present(records) => records
                .iter()
                .filter(|r| self.images.remove(project, r.id))
                .count(),
            LedgerState::Unreadable { reason } => {
                warn!(project = %project, "Clearing unreadable ledger ({}), removing all images", reason);
                self.images.remove_all(project)
            }
        };

        for document in [temp_path(&path), corrupt_path(&path), path] {
            match fs::remove_file(&document) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::io(&document, e)),
            }
        }

        info!(project = %project, images = removed, "Cleared history");
        Ok(removed)
    }

    fn persist(&self, project: &Project, records: &[GenerationRecord]) -> Result<()> {
        let dir = self.layout.project_dir(project);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let path = self.layout.history_path(project);
        let temp_path = temp_path(&path);
        write_document(&temp_path, records)?;
        fs::rename(&temp_path, &path).map_err(|e| StorageError::io(&path, e))?;
        Ok(())
    }

    /// Move an unreadable ledger document out of the way.
    fn set_aside(&self, project: &Project) -> Result<()> {
        let path = self.layout.history_path(project);
        if !ensure_document_slot(&path)? {
            return Ok(());
        }

        let target = corrupt_path(&path);
        match fs::rename(&path, &target) {
            Ok(()) => warn!("Moved unreadable ledger to {}", target.display()),
            Err(e) => warn!("Failed to move unreadable ledger {}: {}", path.display(), e),
        }
        Ok(())
    }
}

/// Whether a regular file sits at the ledger path. Anything other than a
/// regular file or nothing is an error, so a foreign directory is never moved
/// or emptied.
fn ensure_document_slot(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => Ok(true),
        Ok(_) => Err(StorageError::io(
            path,
            io::Error::other("ledger path is not a regular file"),
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn temp_path(history: &Path) -> PathBuf {
    history.with_extension("json.tmp")
}

fn corrupt_path(history: &Path) -> PathBuf {
    history.with_extension(format!("json.{}", CORRUPT_SUFFIX))
}

/// Serialize `records` as a tab-indented JSON array.
fn write_document(path: &Path, records: &[GenerationRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    records.serialize(&mut serializer)?;
    writer.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}
