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

use crate::domain::errors::Result;
use std::path::Path;

/// Persists stage reports.
pub trait ReportStore: Send + Sync {
    /// Returns the raw JSON, or `None` if no report exists at `path`.
    fn read_report(&self, path: &Path) -> Result<Option<String>>;

    /// Writes atomically: a concurrent reader sees the old report or the
    /// new one, never a partial file.
    fn write_report(&self, path: &Path, json: &str) -> Result<()>;

    /// Deletes the report at `path`. A missing report is not an error.
    fn remove_report(&self, path: &Path) -> Result<()>;
}
