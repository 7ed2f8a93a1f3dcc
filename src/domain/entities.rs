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

//! # Domain Entities
//!
//! Entities are the "Nouns" of the migrator: the org we talk to, the TM1 rows
//! we pull out of it, the counts we reconcile, and the status records every
//! stage emits.
//!
//! TM1 rows derive `Deserialize` with `PascalCase` names so the same struct
//! reads a query record (`{"Id": ..., "ParentTerritoryId": ...}`) and a row
//! of the extracted CSV files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw query record as returned by the org connector.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Identity of the org acted upon. Captured at Analyze and copied forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrgInfo {
    pub org_id: String,
    pub username: String,
    #[serde(deserialize_with = "crate::domain::reports::nullable")]
    pub alias: Option<String>,
    pub login_url: String,
    pub instance_url: String,
}

/// The TM1 object types the pipeline counts and reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tm1Entity {
    Territory,
    UserTerritory,
    AccountTerritoryAssignmentRule,
    AccountTerritoryAssignmentRuleItem,
    AccountShare,
    Group,
}

impl Tm1Entity {
    pub const ALL: [Tm1Entity; 6] = [
        Tm1Entity::Territory,
        Tm1Entity::UserTerritory,
        Tm1Entity::AccountTerritoryAssignmentRule,
        Tm1Entity::AccountTerritoryAssignmentRuleItem,
        Tm1Entity::AccountShare,
        Tm1Entity::Group,
    ];

    /// Entities whose rows are extracted to disk. The rest are only counted.
    pub const EXTRACTED: [Tm1Entity; 4] = [
        Tm1Entity::Territory,
        Tm1Entity::UserTerritory,
        Tm1Entity::AccountTerritoryAssignmentRule,
        Tm1Entity::AccountTerritoryAssignmentRuleItem,
    ];

    pub fn api_name(&self) -> &'static str {
        match self {
            Tm1Entity::Territory => "Territory",
            Tm1Entity::UserTerritory => "UserTerritory",
            Tm1Entity::AccountTerritoryAssignmentRule => "AccountTerritoryAssignmentRule",
            Tm1Entity::AccountTerritoryAssignmentRuleItem => "AccountTerritoryAssignmentRuleItem",
            Tm1Entity::AccountShare => "AccountShare",
            Tm1Entity::Group => "Group",
        }
    }

    /// Aggregate query used to count the entity. Never materializes rows.
    pub fn count_query(&self) -> String {
        format!("SELECT COUNT() FROM {}{}", self.api_name(), self.filter())
    }

    /// Columns pulled by Extract, in CSV header order. Empty for the
    /// entities that are only counted.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Tm1Entity::Territory => &[
                "Id",
                "Name",
                "DeveloperName",
                "ParentTerritoryId",
                "Description",
                "AccountAccessLevel",
                "OpportunityAccessLevel",
                "CaseAccessLevel",
                "ContactAccessLevel",
            ],
            Tm1Entity::UserTerritory => &["Id", "UserId", "TerritoryId", "IsActive"],
            Tm1Entity::AccountTerritoryAssignmentRule => {
                &["Id", "Name", "TerritoryId", "IsActive", "BooleanFilter"]
            }
            Tm1Entity::AccountTerritoryAssignmentRuleItem => {
                &["Id", "RuleId", "SortOrder", "Field", "Operation", "Value"]
            }
            Tm1Entity::AccountShare | Tm1Entity::Group => &[],
        }
    }

    /// Query used by Extract. Sorted by Id so extracted files are stable.
    pub fn extract_query(&self) -> String {
        format!(
            "SELECT {} FROM {}{} ORDER BY Id",
            self.fields().join(", "),
            self.api_name(),
            self.filter()
        )
    }

    /// File name of the extracted CSV for this entity.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.api_name())
    }

    fn filter(&self) -> &'static str {
        match self {
            Tm1Entity::AccountShare => " WHERE RowCause = 'TerritoryManual'",
            Tm1Entity::Group => " WHERE Type IN ('Territory', 'TerritoryAndSubordinate')",
            _ => "",
        }
    }
}

impl fmt::Display for Tm1Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

/// Snapshot of source record volumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Tm1RecordCounts {
    pub territory: u64,
    pub user_territory: u64,
    pub ata_rule: u64,
    pub ata_rule_item: u64,
    pub account_share: u64,
    pub group: u64,
}

impl Tm1RecordCounts {
    pub fn get(&self, entity: Tm1Entity) -> u64 {
        match entity {
            Tm1Entity::Territory => self.territory,
            Tm1Entity::UserTerritory => self.user_territory,
            Tm1Entity::AccountTerritoryAssignmentRule => self.ata_rule,
            Tm1Entity::AccountTerritoryAssignmentRuleItem => self.ata_rule_item,
            Tm1Entity::AccountShare => self.account_share,
            Tm1Entity::Group => self.group,
        }
    }

    pub fn set(&mut self, entity: Tm1Entity, count: u64) {
        let slot = match entity {
            Tm1Entity::Territory => &mut self.territory,
            Tm1Entity::UserTerritory => &mut self.user_territory,
            Tm1Entity::AccountTerritoryAssignmentRule => &mut self.ata_rule,
            Tm1Entity::AccountTerritoryAssignmentRuleItem => &mut self.ata_rule_item,
            Tm1Entity::AccountShare => &mut self.account_share,
            Tm1Entity::Group => &mut self.group,
        };
        *slot = count;
    }
}

/// A TM1 territory. Territories form a tree through `ParentTerritoryId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Territory {
    pub id: String,
    pub name: String,
    pub developer_name: Option<String>,
    pub parent_territory_id: Option<String>,
    pub description: Option<String>,
    pub account_access_level: Option<String>,
    pub opportunity_access_level: Option<String>,
    pub case_access_level: Option<String>,
    pub contact_access_level: Option<String>,
}

/// A user's membership in a TM1 territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserTerritory {
    pub id: String,
    pub user_id: String,
    pub territory_id: String,
    pub is_active: bool,
}

/// A TM1 account assignment rule. Its criteria live in rule items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignmentRule {
    pub id: String,
    pub name: String,
    pub territory_id: String,
    pub is_active: bool,
    pub boolean_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignmentRuleItem {
    pub id: String,
    pub rule_id: String,
    pub sort_order: u32,
    pub field: String,
    pub operation: String,
    pub value: Option<String>,
}

/// Outcome severity of a status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "SUCCESS"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One `{type, title, message}` record per task bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRecord {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl StatusRecord {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Worst severity across a list of statuses. An empty list is a success.
pub fn overall_severity(statuses: &[StatusRecord]) -> Severity {
    statuses
        .iter()
        .map(|s| s.severity)
        .max()
        .unwrap_or(Severity::Success)
}

/// An artifact that references a TM1 construct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub dependency_type: String,
    pub name: String,
    pub reference_detail: String,
}

/// Something a best-effort scan could not look at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SkippedItem {
    pub kind: String,
    pub name: String,
    pub reason: String,
}

/// A named, ordered list of dependencies plus what the scan skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DependencySet {
    pub dependency_count: usize,
    pub dependencies: Vec<Dependency>,
    pub skipped_count: usize,
    pub skipped: Vec<SkippedItem>,
}

impl DependencySet {
    /// Builds a set ordered by type, then name. The sort is stable.
    pub fn new(mut dependencies: Vec<Dependency>, mut skipped: Vec<SkippedItem>) -> Self {
        dependencies.sort();
        dependencies.dedup();
        skipped.sort();
        Self {
            dependency_count: dependencies.len(),
            dependencies,
            skipped_count: skipped.len(),
            skipped,
        }
    }
}

/// A count mismatch between two stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Discrepancy {
    pub entity: String,
    pub expected: u64,
    pub actual: u64,
}

/// A file written by a stage, with its digest for idempotence checks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputFile {
    /// Path relative to the migration directory.
    pub path: String,
    pub sha256: String,
    #[serde(deserialize_with = "crate::domain::reports::nullable")]
    pub records: Option<u64>,
}

/// Lifecycle state of a Territory2 model in the target org.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelState {
    Planning,
    Active,
    Archived,
    Cloning,
    Deleting,
    Inactive,
}

impl ModelState {
    /// Parses the `State` value of a `Territory2Model` record.
    pub fn from_api(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "planning" => ModelState::Planning,
            "active" => ModelState::Active,
            "archived" => ModelState::Archived,
            "cloning" => ModelState::Cloning,
            "deleting" => ModelState::Deleting,
            _ => ModelState::Inactive,
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelState::Planning => "PLANNING",
            ModelState::Active => "ACTIVE",
            ModelState::Archived => "ARCHIVED",
            ModelState::Cloning => "CLONING",
            ModelState::Deleting => "DELETING",
            ModelState::Inactive => "INACTIVE",
        };
        write!(f, "{}", s)
    }
}

/// A metadata component to retrieve, e.g. `SharingRules:Account`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataComponent {
    pub component_type: String,
    pub full_name: String,
}

impl MetadataComponent {
    pub fn new(component_type: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            full_name: full_name.into(),
        }
    }
}

/// A metadata file in a deployable package, path relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFile {
    pub path: String,
    pub content: String,
}

/// Per-component outcome of a metadata deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComponentResult {
    pub component_type: String,
    pub full_name: String,
    pub success: bool,
    #[serde(deserialize_with = "crate::domain::reports::nullable")]
    pub problem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub success: bool,
    pub components: Vec<ComponentResult>,
    pub error_message: Option<String>,
}

impl DeployResult {
    /// Human-readable summary of the failed components.
    pub fn failure_summary(&self) -> String {
        let failures: Vec<String> = self
            .components
            .iter()
            .filter(|c| !c.success)
            .map(|c| {
                format!(
                    "{} {}: {}",
                    c.component_type,
                    c.full_name,
                    c.problem.as_deref().unwrap_or("unknown problem")
                )
            })
            .collect();
        match (&self.error_message, failures.is_empty()) {
            (Some(msg), true) => msg.clone(),
            (Some(msg), false) => format!("{}; {}", msg, failures.join("; ")),
            (None, false) => failures.join("; "),
            (None, true) => "deployment reported failure".to_string(),
        }
    }
}

/// The object a CSV is bulk-inserted into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub sobject: String,
}

impl ObjectDescriptor {
    pub fn insert(sobject: impl Into<String>) -> Self {
        Self {
            sobject: sobject.into(),
        }
    }
}

/// Outcome of a bulk data load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub job_id: Option<String>,
    pub records_processed: u64,
    pub records_failed: u64,
    pub success: bool,
}
