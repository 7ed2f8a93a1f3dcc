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

//! The on-disk layout of a migration directory:
//!
//! ```text
//! <base>/
//!   tm1-analysis.json  tm1-extraction.json  tm1-transformation.json
//!   tm2-deployment.json  tm2-dataload.json
//!   tm1/data/*.csv                 extracted TM1 rows
//!   tm1/metadata/sharingRules/     retrieved sharing rules
//!   tm2/metadata/                  Territory2 model package
//!   tm2/sharingRules/              translated sharing rules
//!   tm2/data/                      association CSVs (developer names)
//!   tm2/load/                      association CSVs (Territory2 Ids)
//! ```

use crate::domain::reports::ReportType;
use crate::ports::paths_port::MigrationPaths;
use std::path::{Path, PathBuf};

pub struct DirectoryLayout {
    base: PathBuf,
}

impl DirectoryLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn report_file_name(report_type: ReportType) -> &'static str {
        match report_type {
            ReportType::Analysis => "tm1-analysis.json",
            ReportType::Extraction => "tm1-extraction.json",
            ReportType::Transformation => "tm1-transformation.json",
            ReportType::Deployment => "tm2-deployment.json",
            ReportType::Load => "tm2-dataload.json",
        }
    }
}

impl MigrationPaths for DirectoryLayout {
    fn base_dir(&self) -> &Path {
        &self.base
    }

    fn report(&self, report_type: ReportType) -> PathBuf {
        self.base.join(Self::report_file_name(report_type))
    }

    fn tm1_data_dir(&self) -> PathBuf {
        self.base.join("tm1").join("data")
    }

    fn tm1_metadata_dir(&self) -> PathBuf {
        self.base.join("tm1").join("metadata")
    }

    fn tm2_dir(&self) -> PathBuf {
        self.base.join("tm2")
    }

    fn tm2_metadata_dir(&self) -> PathBuf {
        self.tm2_dir().join("metadata")
    }

    fn tm2_sharing_rules_dir(&self) -> PathBuf {
        self.tm2_dir().join("sharingRules")
    }

    fn tm2_data_dir(&self) -> PathBuf {
        self.tm2_dir().join("data")
    }

    fn tm2_load_dir(&self) -> PathBuf {
        self.tm2_dir().join("load")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_names() {
        let layout = DirectoryLayout::new("/tmp/migration");
        assert_eq!(
            layout.report(ReportType::Load),
            PathBuf::from("/tmp/migration/tm2-dataload.json")
        );
        assert_eq!(
            layout.report(ReportType::Transformation),
            PathBuf::from("/tmp/migration/tm1-transformation.json")
        );
    }

    #[test]
    fn test_relative_uses_forward_slashes() {
        let layout = DirectoryLayout::new("/tmp/migration");
        let path = layout.tm2_metadata_dir().join("package.xml");
        assert_eq!(layout.relative(&path), "tm2/metadata/package.xml");
    }
}
