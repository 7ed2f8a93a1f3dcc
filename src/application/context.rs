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

//! # Stage Context
//!
//! Everything a stage needs, passed explicitly: the paths provider, the
//! stores, the status sink, the worker pool and the pipeline settings.
//! Nothing crosses a stage boundary except the reports on disk.

use crate::application::runtime::RuntimeContext;
use crate::domain::entities::{OrgInfo, OutputFile};
use crate::domain::errors::{MigrationError, Result};
use crate::domain::mapping::IMPORTED_MODEL;
use crate::domain::reports::{parse_report, render_report, Report, ReportType};
use crate::ports::org_port::OrgConnector;
use crate::ports::paths_port::MigrationPaths;
use crate::ports::report_port::ReportStore;
use crate::ports::status_port::StatusSink;
use crate::ports::workspace_port::Workspace;
use log::info;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pipeline knobs that stages read. Built from `AppConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub model_name: String,
    pub sharing_objects: Vec<String>,
    pub assume_yes: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model_name: IMPORTED_MODEL.to_string(),
            sharing_objects: vec![
                "Account".to_string(),
                "Lead".to_string(),
                "Opportunity".to_string(),
            ],
            assume_yes: false,
        }
    }
}

pub struct StageContext {
    pub paths: Arc<dyn MigrationPaths>,
    pub reports: Arc<dyn ReportStore>,
    pub workspace: Arc<dyn Workspace>,
    pub status: Arc<dyn StatusSink>,
    pub runtime: RuntimeContext,
    pub settings: PipelineSettings,
}

impl StageContext {
    /// Reads the report of a previous stage. A missing, corrupt or
    /// wrong-version report means that stage has not completed.
    pub fn read_report<R: Report>(&self) -> Result<R> {
        let path = self.paths.report(R::REPORT_TYPE);
        self.try_read_report::<R>()?.ok_or_else(|| {
            MigrationError::ReportNotFound(format!(
                "{} (run the stage that produces it first)",
                path.display()
            ))
        })
    }

    pub fn try_read_report<R: Report>(&self) -> Result<Option<R>> {
        let path = self.paths.report(R::REPORT_TYPE);
        match self.reports.read_report(&path)? {
            Some(json) => parse_report::<R>(&path.display().to_string(), &json).map(Some),
            None => Ok(None),
        }
    }

    pub fn write_report<R: Report>(&self, report: &R) -> Result<PathBuf> {
        let path = self.paths.report(R::REPORT_TYPE);
        self.reports.write_report(&path, &render_report(report)?)?;
        info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Deletes this stage's previous report. Called before a stage touches
    /// its output directories, so a run that stops halfway leaves no report
    /// describing files it has already replaced.
    pub fn clear_report<R: Report>(&self) -> Result<()> {
        self.reports.remove_report(&self.paths.report(R::REPORT_TYPE))
    }

    /// Writes a stage output file and describes it for the report.
    pub fn write_output(
        &self,
        path: &Path,
        content: &[u8],
        records: Option<u64>,
    ) -> Result<OutputFile> {
        self.workspace.write_file(path, content)?;
        Ok(OutputFile {
            path: self.paths.relative(path),
            sha256: sha256_hex(content),
            records,
        })
    }

    /// Absolute paths of the files in `files` that live below `dir`.
    pub fn recorded_under(&self, files: &[OutputFile], dir: &Path) -> Vec<PathBuf> {
        let prefix = format!("{}/", self.paths.relative(dir));
        files
            .iter()
            .filter(|f| f.path.starts_with(&prefix))
            .map(|f| self.paths.base_dir().join(&f.path))
            .collect()
    }

    /// Reads a file listed in the `source` report and checks it still has
    /// the digest recorded there. A file that is not listed, has gone, or
    /// changed after the report was written makes the report invalid.
    pub fn read_recorded(
        &self,
        source: ReportType,
        files: &[OutputFile],
        path: &Path,
    ) -> Result<Vec<u8>> {
        let rel = self.paths.relative(path);
        let invalid = |reason: String| MigrationError::InvalidReport {
            path: self.paths.report(source).display().to_string(),
            reason,
        };
        let recorded = files
            .iter()
            .find(|f| f.path == rel)
            .ok_or_else(|| invalid(format!("{} is not listed in the report", rel)))?;
        let content = self
            .workspace
            .read_file(path)?
            .ok_or_else(|| invalid(format!("{} is listed but missing", rel)))?;
        if sha256_hex(&content) != recorded.sha256 {
            return Err(invalid(format!(
                "{} no longer matches its recorded sha256; re-run the stage that wrote it",
                rel
            )));
        }
        Ok(content)
    }
}

pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// UTC timestamp written into `generatedAt`.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Refuses to mix reports from different orgs.
pub fn ensure_same_org(expected: &OrgInfo, actual: &OrgInfo) -> Result<()> {
    if expected.org_id != actual.org_id {
        return Err(MigrationError::OrgMismatch {
            expected: expected.org_id.clone(),
            actual: actual.org_id.clone(),
        });
    }
    Ok(())
}

/// Checks that the connector is still pointed at the org the reports describe.
pub fn verify_connected_org(connector: &dyn OrgConnector, expected: &OrgInfo) -> Result<OrgInfo> {
    let actual = connector
        .org_info()
        .map_err(|e| MigrationError::connector("Reading connected org identity", e))?;
    ensure_same_org(expected, &actual)?;
    Ok(actual)
}
