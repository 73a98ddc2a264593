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

//! Decoded image bytes, stored at `<project dir>/<id:05>.png`.

use dtc_core::{Project, RecordId};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::layout::ResultsLayout;

#[derive(Debug, Clone)]
pub struct ImageStore {
    layout: ResultsLayout,
}

impl ImageStore {
    pub fn new(layout: ResultsLayout) -> Self {
        Self { layout }
    }

    pub fn path(&self, project: &Project, id: RecordId) -> PathBuf {
        self.layout.image_path(project, id)
    }

    /// Write the raw bytes for `id`, creating the project directory on first
    /// use. An existing file for the same ID is overwritten.
    pub fn write(&self, project: &Project, id: RecordId, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.layout.project_dir(project);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let path = self.path(project, id);
        fs::write(&path, bytes).map_err(|e| StorageError::io(&path, e))?;
        debug!(project = %project, id, bytes = bytes.len(), "Stored image");
        Ok(path)
    }

    /// Best-effort delete. Returns whether a file was removed; a missing file
    /// is not an error.
    pub fn remove(&self, project: &Project, id: RecordId) -> bool {
        let path = self.path(project, id);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove image {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Remove every `<digits>.png` file in the project directory. Used when
    /// the ledger is unreadable and the referenced IDs are unknown.
    pub fn remove_all(&self, project: &Project) -> usize {
        let dir = self.layout.project_dir(project);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_image_file_name(name) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove image {}: {}", entry.path().display(), e),
            }
        }
        removed
    }
}

fn is_image_file_name(name: &str) -> bool {
    name.strip_suffix(".png")
        .map(|stem| stem.len() >= 5 && stem.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ImageStore) {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(ResultsLayout::new(dir.path()));
        (dir, store)
    }

    #[test]
    fn test_write_creates_project_dir() {
        let (dir, store) = store();
        let project = Project::new("cats").unwrap();

        let path = store.write(&project, 3, b"png-bytes").unwrap();
        assert_eq!(path, dir.path().join("cats").join("00003.png"));
        assert_eq!(fs::read(&path).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_remove_missing_is_not_error() {
        let (_dir, store) = store();
        let project = Project::new("cats").unwrap();
        assert!(!store.remove(&project, 99));

        store.write(&project, 1, b"x").unwrap();
        assert!(store.remove(&project, 1));
        assert!(!store.path(&project, 1).exists());
    }

    #[test]
    fn test_remove_all_only_touches_images() {
        let (dir, store) = store();
        let global = Project::global();
        store.write(&global, 1, b"a").unwrap();
        store.write(&global, 2, b"b").unwrap();
        fs::write(dir.path().join("settings.json"), b"{}").unwrap();
        fs::write(dir.path().join("cover.png"), b"c").unwrap();

        assert_eq!(store.remove_all(&global), 2);
        assert!(dir.path().join("settings.json").exists());
        assert!(dir.path().join("cover.png").exists());
    }

    #[test]
    fn test_image_file_name_filter() {
        assert!(is_image_file_name("00001.png"));
        assert!(is_image_file_name("123456.png"));
        assert!(!is_image_file_name("0001.png"));
        assert!(!is_image_file_name("00001.jpg"));
        assert!(!is_image_file_name("abcde.png"));
    }
}
