// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Workspace Port
//!
//! Stage output that is not a report: extracted CSVs, retrieved metadata,
//! generated Territory2 packages. Kept behind a trait so stages never touch
//! `std::fs` directly.

use crate::domain::errors::Result;
use std::path::Path;

pub trait Workspace: Send + Sync {
    /// Writes `content` atomically, creating parent directories as needed.
    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Returns the file content, or `None` if the file does not exist.
    fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Removes `dir` and everything below it. Missing directories are fine.
    fn remove_dir(&self, dir: &Path) -> Result<()>;
}
