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

//! Project namespaces.
//!
//! A project groups one history ledger and one image directory. The name
//! travels in the `project` request header; a missing or empty header selects
//! the global namespace, whose files live directly in the results directory.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request header carrying the project name.
pub const PROJECT_HEADER: &str = "project";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    #[error("invalid project name {0:?}: must not contain path separators or NUL")]
    Separator(String),

    #[error("invalid project name {0:?}: reserved path component")]
    Reserved(String),

    #[error("invalid project name {0:?}: collides with a file of the global namespace")]
    RootCollision(String),
}

/// Names the global namespace uses directly in the results directory. A
/// project directory with one of these names would shadow the global file.
fn collides_with_root_entry(name: &str) -> bool {
    if name == "settings.json" || name.starts_with("history.json") {
        return true;
    }
    name.strip_suffix(".png")
        .is_some_and(|stem| !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()))
}

/// A validated project namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Project(String);

impl Project {
    /// The global namespace used when no project header is sent.
    pub fn global() -> Self {
        Project(String::new())
    }

    /// Validate a project name. The empty string maps to the global namespace.
    pub fn new(name: impl Into<String>) -> Result<Self, ProjectError> {
        let name = name.into();
        if name.contains(['/', '\\', '\0']) {
            return Err(ProjectError::Separator(name));
        }
        if name == "." || name == ".." {
            return Err(ProjectError::Reserved(name));
        }
        if collides_with_root_entry(&name) {
            return Err(ProjectError::RootCollision(name));
        }
        Ok(Project(name))
    }

    /// Resolve a project from an optional header value.
    pub fn from_header(value: Option<&str>) -> Result<Self, ProjectError> {
        match value {
            Some(name) => Self::new(name),
            None => Ok(Self::global()),
        }
    }

    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_global() {
            f.write_str("<global>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl TryFrom<String> for Project {
    type Error = ProjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Project::new(value)
    }
}

impl From<Project> for String {
    fn from(project: Project) -> Self {
        project.0
    }
}
