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

use dtc_core::{image_file_name, Project, RecordId};
use std::path::{Path, PathBuf};

const HISTORY_FILE: &str = "history.json";
const SETTINGS_FILE: &str = "settings.json";

/// Path derivation for everything stored under the results directory.
#[derive(Debug, Clone)]
pub struct ResultsLayout {
    root: PathBuf,
}

impl ResultsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a project's ledger and images. The global namespace
    /// maps to the results root itself.
    pub fn project_dir(&self, project: &Project) -> PathBuf {
        if project.is_global() {
            self.root.clone()
        } else {
            self.root.join(project.name())
        }
    }

    pub fn history_path(&self, project: &Project) -> PathBuf {
        self.project_dir(project).join(HISTORY_FILE)
    }

    pub fn image_path(&self, project: &Project, id: RecordId) -> PathBuf {
        self.project_dir(project).join(image_file_name(id))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_paths() {
        let layout = ResultsLayout::new("/data/DTC");
        let project = Project::new("cats").unwrap();
        assert_eq!(
            layout.history_path(&project),
            PathBuf::from("/data/DTC/cats/history.json")
        );
        assert_eq!(
            layout.image_path(&project, 42),
            PathBuf::from("/data/DTC/cats/00042.png")
        );
    }

    #[test]
    fn test_global_namespace_uses_root() {
        let layout = ResultsLayout::new("/data/DTC");
        let global = Project::global();
        assert_eq!(layout.project_dir(&global), PathBuf::from("/data/DTC"));
        assert_eq!(
            layout.history_path(&global),
            PathBuf::from("/data/DTC/history.json")
        );
        assert_eq!(
            layout.settings_path(),
            PathBuf::from("/data/DTC/settings.json")
        );
    }
}
