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

//! # Paths Port
//!
//! The pipeline reads and writes a fixed set of files below one
//! user-chosen directory. Stages ask this provider for every path instead of
//! building them, so the layout lives in exactly one adapter.

use crate::domain::reports::ReportType;
use std::path::{Path, PathBuf};

pub trait MigrationPaths: Send + Sync {
    /// Root of the migration directory.
    fn base_dir(&self) -> &Path;

    /// Location of a stage report, e.g. `tm1-analysis.json`.
    fn report(&self, report_type: ReportType) -> PathBuf;

    /// Extracted TM1 rows, one CSV per entity.
    fn tm1_data_dir(&self) -> PathBuf;

    /// Retrieved TM1 metadata (sharing rules).
    fn tm1_metadata_dir(&self) -> PathBuf;

    /// Everything Transform writes lives below this directory.
    fn tm2_dir(&self) -> PathBuf;

    /// Deployable Territory2 model package.
    fn tm2_metadata_dir(&self) -> PathBuf;

    /// Translated sharing rules.
    fn tm2_sharing_rules_dir(&self) -> PathBuf;

    /// Data CSVs keyed by Territory2 developer name.
    fn tm2_data_dir(&self) -> PathBuf;

    /// Bulk-ready CSVs resolved against the target org by Load.
    fn tm2_load_dir(&self) -> PathBuf;

    /// `path` relative to `base_dir`, with forward slashes.
    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(self.base_dir()).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}
