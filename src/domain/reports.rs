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

//! # Report Model
//!
//! Reports are the only state that crosses a stage boundary. Each stage reads
//! the reports of the stages before it from disk and writes exactly one of
//! its own. A report is written once and never modified afterwards; a
//! stage deletes its old report before it replaces any of its output.
//!
//! Every report is versioned: it carries `schemaVersion` and `reportType`.
//! All structs use `deny_unknown_fields`, so a report with an unexpected or
//! missing field fails at read time instead of turning into a half-filled
//! struct. Optional values are written as `null` and their keys are still
//! required. Such a report counts as "stage not completed".

use crate::domain::entities::{
    ComponentResult, DependencySet, Discrepancy, ModelState, OrgInfo, OutputFile, Severity,
    SkippedItem, StatusRecord, Tm1RecordCounts,
};
use crate::domain::errors::{MigrationError, Result};
use crate::domain::pipeline_state::PipelineState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Version written into every report produced by this build.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Analysis,
    Extraction,
    Transformation,
    Deployment,
    Load,
}

/// Common behaviour of all stage reports.
pub trait Report: Serialize + DeserializeOwned {
    const REPORT_TYPE: ReportType;

    fn schema_version(&self) -> u32;
    fn report_type(&self) -> ReportType;
}

/// Parses and validates a report. `source` names the file for error messages.
pub fn parse_report<R: Report>(source: &str, json: &str) -> Result<R> {
    let report: R = serde_json::from_str(json).map_err(|e| MigrationError::InvalidReport {
        path: source.to_string(),
        reason: e.to_string(),
    })?;
    if report.schema_version() != SCHEMA_VERSION {
        return Err(MigrationError::InvalidReport {
            path: source.to_string(),
            reason: format!(
                "unsupported schema version {} (expected {})",
                report.schema_version(),
                SCHEMA_VERSION
            ),
        });
    }
    if report.report_type() != R::REPORT_TYPE {
        return Err(MigrationError::InvalidReport {
            path: source.to_string(),
            reason: format!(
                "expected a {:?} report, found {:?}",
                R::REPORT_TYPE,
                report.report_type()
            ),
        });
    }
    Ok(report)
}

/// Reads an optional report field whose key must still be present:
/// `null` is accepted, a missing key is not.
pub fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Serializes a report as pretty JSON with a trailing newline.
pub fn render_report<R: Report>(report: &R) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}

/// Sharing-rule inventory of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObjectSharingRuleCounts {
    pub object: String,
    pub criteria_based: u64,
    pub owner_based: u64,
    pub territory_based: u64,
    /// Rules that share to or from a TM1 territory group.
    pub territory_group_references: u64,
    #[serde(rename = "SharingRulesCount")]
    pub sharing_rules_count: u64,
}

/// Sharing-rule inventory by object and rule kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Tm1MetadataCounts {
    pub objects: Vec<ObjectSharingRuleCounts>,
    pub skipped: Vec<SkippedItem>,
}

impl Tm1MetadataCounts {
    pub fn for_object(&self, object: &str) -> Option<&ObjectSharingRuleCounts> {
        self.objects.iter().find(|o| o.object == object)
    }
}

/// Aggregate produced by Analyze. Required input of every later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalysisReport {
    pub schema_version: u32,
    pub report_type: ReportType,
    pub generated_at: String,
    pub org_info: OrgInfo,
    pub record_counts: Tm1RecordCounts,
    pub metadata_counts: Tm1MetadataCounts,
    pub hard_dependencies: DependencySet,
    pub soft_dependencies: DependencySet,
    pub statuses: Vec<StatusRecord>,
}

/// What Extract actually pulled, compared against the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractionReport {
    pub schema_version: u32,
    pub report_type: ReportType,
    pub generated_at: String,
    pub org_info: OrgInfo,
    pub actual_counts: Tm1RecordCounts,
    pub metadata_counts: Tm1MetadataCounts,
    pub discrepancies: Vec<Discrepancy>,
    pub files: Vec<OutputFile>,
    pub statuses: Vec<StatusRecord>,
}

/// A source item the transformer could not translate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UntranslatableItem {
    pub kind: String,
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// A sharing rule dropped because it points at an unmapped territory group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DroppedSharingRule {
    pub object: String,
    pub rule_name: String,
    pub kind: String,
    pub reason: String,
}

/// Source-to-target count for one translated entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CountDelta {
    pub source_entity: String,
    pub source_count: u64,
    pub target_entity: String,
    pub target_count: u64,
    /// Required when `target_count > source_count`.
    #[serde(deserialize_with = "nullable")]
    pub justification: Option<String>,
}

/// Output of schema translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransformationReport {
    pub schema_version: u32,
    pub report_type: ReportType,
    pub generated_at: String,
    pub org_info: OrgInfo,
    pub model_name: String,
    pub territory2_count: u64,
    /// Territory2 developer names, parents strictly before children.
    pub deployment_order: Vec<String>,
    pub user_association_count: u64,
    pub rule_count: u64,
    pub rule_item_count: u64,
    pub sharing_rules_translated: u64,
    /// Retained for reconciliation only; manual shares are not replayed.
    pub manual_account_shares: u64,
    pub untranslatable_count: u64,
    pub untranslatable: Vec<UntranslatableItem>,
    pub dropped_sharing_rules: Vec<DroppedSharingRule>,
    pub reconciliation: Vec<CountDelta>,
    pub files: Vec<OutputFile>,
    pub statuses: Vec<StatusRecord>,
}

/// Outcome of deploying the Territory2 model package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentReport {
    pub schema_version: u32,
    pub report_type: ReportType,
    pub generated_at: String,
    pub org_info: OrgInfo,
    pub model_name: String,
    pub success: bool,
    pub components: Vec<ComponentResult>,
    #[serde(deserialize_with = "nullable")]
    pub model_state: Option<ModelState>,
    pub statuses: Vec<StatusRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of the sharing-rule deployment sub-operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SharingRuleDeployOutcome {
    pub status: OperationStatus,
    pub detail: String,
    pub components: Vec<ComponentResult>,
}

/// Result of one bulk data load sub-operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataLoadOutcome {
    pub object: String,
    pub file: String,
    pub status: OperationStatus,
    #[serde(deserialize_with = "nullable")]
    pub job_id: Option<String>,
    pub records_processed: u64,
    pub records_failed: u64,
    pub detail: String,
}

/// Terminal artifact of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoadReport {
    pub schema_version: u32,
    pub report_type: ReportType,
    pub generated_at: String,
    pub org_info: OrgInfo,
    pub status: Severity,
    pub final_state: PipelineState,
    pub sharing_rules: SharingRuleDeployOutcome,
    pub data_loads: Vec<DataLoadOutcome>,
    pub unresolved_associations: Vec<SkippedItem>,
    pub statuses: Vec<StatusRecord>,
}

impl Report for AnalysisReport {
    const REPORT_TYPE: ReportType = ReportType::Analysis;
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
    fn report_type(&self) -> ReportType {
        self.report_type
    }
}

impl Report for ExtractionReport {
    const REPORT_TYPE: ReportType = ReportType::Extraction;
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
    fn report_type(&self) -> ReportType {
        self.report_type
    }
}

impl Report for TransformationReport {
    const REPORT_TYPE: ReportType = ReportType::Transformation;
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
    fn report_type(&self) -> ReportType {
        self.report_type
    }
}

impl Report for DeploymentReport {
    const REPORT_TYPE: ReportType = ReportType::Deployment;
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
    fn report_type(&self) -> ReportType {
        self.report_type
    }
}

impl Report for LoadReport {
    const REPORT_TYPE: ReportType = ReportType::Load;
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
    fn report_type(&self) -> ReportType {
        self.report_type
    }
}
