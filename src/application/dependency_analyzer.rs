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

//! # Dependency Analyzer
//!
//! Finds everything in the org that would break, or silently change
//! behaviour, once TM1 is gone.
//!
//! - **Hard** dependencies come from the org's own dependency index
//!   (`MetadataComponentDependency`) plus custom fields defined on TM1
//!   objects. These are what the platform itself would reject. A failed
//!   lookup fails the analysis: an incomplete blocker list is worse than none.
//! - **Soft** dependencies are found by scanning artifact bodies (Apex,
//!   Visualforce, Flows, field metadata) for TM1 API names, since dynamic SOQL
//!   strings never show up in the index. This is best effort and advisory:
//!   an artifact whose body cannot be fetched is recorded as skipped.

use crate::application::runtime::RuntimeContext;
use crate::domain::entities::{Dependency, DependencySet, Record, SkippedItem};
use crate::domain::errors::{MigrationError, Result};
use crate::ports::org_port::OrgConnector;
use log::{info, warn};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// TM1 object names the dependency index is filtered on.
const TM1_OBJECTS: [&str; 4] = [
    "Territory",
    "UserTerritory",
    "AccountTerritoryAssignmentRule",
    "AccountTerritoryAssignmentRuleItem",
];

/// Identifiers that mark a soft reference. `TerritoryManual` is the
/// `RowCause` of manual TM1 account shares.
const TM1_IDENTIFIERS: [&str; 5] = [
    "Territory",
    "UserTerritory",
    "AccountTerritoryAssignmentRule",
    "AccountTerritoryAssignmentRuleItem",
    "TerritoryManual",
];

/// Bare `Territory` only counts with identifier casing, so the English word
/// in comments and labels is ignored. The compound names are not words and
/// match in any case, as Apex and SOQL do.
const TM1_PATTERN: &str = r"\b(Territory|(?i:UserTerritory|AccountTerritoryAssignmentRuleItem|AccountTerritoryAssignmentRule|TerritoryManual))\b";

/// One kind of artifact whose body is scanned.
struct ArtifactSource {
    kind: &'static str,
    list_query: &'static str,
    name_field: &'static str,
    body_object: &'static str,
    body_field: &'static str,
}

const ARTIFACT_SOURCES: [ArtifactSource; 5] = [
    ArtifactSource {
        kind: "ApexClass",
        list_query: "SELECT Id, Name FROM ApexClass WHERE NamespacePrefix = null",
        name_field: "Name",
        body_object: "ApexClass",
        body_field: "Body",
    },
    ArtifactSource {
        kind: "ApexTrigger",
        list_query: "SELECT Id, Name FROM ApexTrigger WHERE NamespacePrefix = null",
        name_field: "Name",
        body_object: "ApexTrigger",
        body_field: "Body",
    },
    ArtifactSource {
        kind: "ApexPage",
        list_query: "SELECT Id, Name FROM ApexPage WHERE NamespacePrefix = null",
        name_field: "Name",
        body_object: "ApexPage",
        body_field: "Markup",
    },
    ArtifactSource {
        kind: "Flow",
        list_query: "SELECT Id, Definition.DeveloperName FROM Flow WHERE Status = 'Active'",
        name_field: "Definition.DeveloperName",
        body_object: "Flow",
        body_field: "Metadata",
    },
    ArtifactSource {
        kind: "CustomField",
        list_query: "SELECT Id, DeveloperName, TableEnumOrId FROM CustomField WHERE NamespacePrefix = null",
        name_field: "DeveloperName",
        body_object: "CustomField",
        body_field: "Metadata",
    },
];

/// An artifact queued for a body scan.
struct Artifact {
    kind: &'static str,
    id: String,
    name: String,
    body_object: &'static str,
    body_field: &'static str,
}

pub struct DependencyAnalyzer {
    connector: Arc<dyn OrgConnector>,
    runtime: RuntimeContext,
    pattern: Regex,
}

impl DependencyAnalyzer {
    pub fn new(connector: Arc<dyn OrgConnector>, runtime: RuntimeContext) -> Result<Self> {
        let pattern = Regex::new(TM1_PATTERN)
            .map_err(|e| MigrationError::Config(format!("invalid TM1 pattern: {}", e)))?;
        Ok(Self {
            connector,
            runtime,
            pattern,
        })
    }

    /// Structural references. Any lookup failure is an error.
    pub fn hard_dependencies(&self) -> Result<DependencySet> {
        let names = TM1_OBJECTS
            .iter()
            .map(|n| format!("'{}'", n))
            .collect::<Vec<_>>()
            .join(", ");

        let index_query = format!(
            "SELECT MetadataComponentName, MetadataComponentType, RefMetadataComponentName, \
             RefMetadataComponentType FROM MetadataComponentDependency \
             WHERE RefMetadataComponentName IN ({})",
            names
        );
        let rows = self
            .connector
            .tooling_query(&index_query)
            .map_err(|e| MigrationError::connector("Querying the dependency index", e))?;

        let mut dependencies: Vec<Dependency> = rows
            .iter()
            .filter_map(|row| {
                let referenced = field_str(row, "RefMetadataComponentName")?;
                let tm1 = TM1_OBJECTS
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(referenced))?;
                Some(Dependency {
                    dependency_type: field_str(row, "MetadataComponentType")?.to_string(),
                    name: field_str(row, "MetadataComponentName")?.to_string(),
                    reference_detail: format!(
                        "{} {}",
                        field_str(row, "RefMetadataComponentType").unwrap_or("StandardEntity"),
                        tm1
                    ),
                })
            })
            .collect();

        let field_query = format!(
            "SELECT Id, DeveloperName, TableEnumOrId FROM CustomField WHERE TableEnumOrId IN ({})",
            names
        );
        let fields = self
            .connector
            .tooling_query(&field_query)
            .map_err(|e| MigrationError::connector("Listing custom fields on TM1 objects", e))?;
        dependencies.extend(fields.iter().filter_map(|row| {
            let object = field_str(row, "TableEnumOrId")?;
            let name = field_str(row, "DeveloperName")?;
            Some(Dependency {
                dependency_type: "CustomField".to_string(),
                name: format!("{}.{}__c", object, name),
                reference_detail: format!("custom field on {}", object),
            })
        }));

        let set = DependencySet::new(dependencies, vec![]);
        info!("Found {} hard dependencies", set.dependency_count);
        Ok(set)
    }

    /// Text references in artifact bodies. Never fails on a single artifact.
    pub fn soft_dependencies(&self) -> Result<DependencySet> {
        let mut skipped = Vec::new();
        let mut artifacts = Vec::new();

        for source in &ARTIFACT_SOURCES {
            match self.connector.tooling_query(source.list_query) {
                Ok(rows) => artifacts.extend(rows.iter().filter_map(|row| {
                    Some(Artifact {
                        kind: source.kind,
                        id: field_str(row, "Id")?.to_string(),
                        name: field_str(row, source.name_field)?.to_string(),
                        body_object: source.body_object,
                        body_field: source.body_field,
                    })
                })),
                Err(e) => {
                    warn!("Could not list {} artifacts: {}", source.kind, e);
                    skipped.push(SkippedItem {
                        kind: source.kind.to_string(),
                        name: "*".to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!("Scanning {} artifact bodies for TM1 references", artifacts.len());

        let bodies = self.runtime.fan_out(&artifacts, |a| {
            let soql = format!(
                "SELECT {} FROM {} WHERE Id = '{}'",
                a.body_field, a.body_object, a.id
            );
            self.connector
                .tooling_query(&soql)
                .map(|rows| rows.first().and_then(|r| r.get(a.body_field)).map(body_text))
        });

        let mut dependencies = Vec::new();
        for (artifact, body) in artifacts.iter().zip(bodies) {
            match body {
                Ok(Some(text)) => {
                    if let Some(detail) = self.scan(&text) {
                        dependencies.push(Dependency {
                            dependency_type: artifact.kind.to_string(),
                            name: artifact.name.clone(),
                            reference_detail: detail,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping {} {}: {}", artifact.kind, artifact.name, e);
                    skipped.push(SkippedItem {
                        kind: artifact.kind.to_string(),
                        name: artifact.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let set = DependencySet::new(dependencies, skipped);
        info!(
            "Found {} soft dependencies ({} artifact(s) skipped)",
            set.dependency_count, set.skipped_count
        );
        Ok(set)
    }

    /// Names of the TM1 identifiers found in `text`, canonical casing.
    fn scan(&self, text: &str) -> Option<String> {
        let found: BTreeSet<&str> = self
            .pattern
            .find_iter(text)
            .filter_map(|m| {
                TM1_IDENTIFIERS
                    .iter()
                    .find(|id| id.eq_ignore_ascii_case(m.as_str()))
                    .copied()
            })
            .collect();
        if found.is_empty() {
            return None;
        }
        Some(format!(
            "references {}",
            found.into_iter().collect::<Vec<_>>().join(", ")
        ))
    }
}

/// Reads a possibly dotted field (`Definition.DeveloperName`) as a string.
fn field_str<'a>(record: &'a Record, path: &str) -> Option<&'a str> {
    let mut parts = path.split('.');
    let mut value = record.get(parts.next()?)?;
    for part in parts {
        value = value.get(part)?;
    }
    value.as_str()
}

fn body_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::runtime::test_runtime;
    use crate::application::testing::MockOrg;
    use crate::domain::errors::ConnectorError;
    use serde_json::json;

    fn analyzer(org: MockOrg) -> DependencyAnalyzer {
        DependencyAnalyzer::new(Arc::new(org), test_runtime()).unwrap()
    }

    #[test]
    fn test_hard_dependencies_from_index_and_fields() {
        let org = MockOrg::default()
            .with_tooling(
                "FROM MetadataComponentDependency",
                vec![
                    json!({
                        "MetadataComponentName": "TerritoryService",
                        "MetadataComponentType": "ApexClass",
                        "RefMetadataComponentName": "Territory",
                        "RefMetadataComponentType": "StandardEntity"
                    }),
                    json!({
                        "MetadataComponentName": "Unrelated",
                        "MetadataComponentType": "ApexClass",
                        "RefMetadataComponentName": "Account",
                        "RefMetadataComponentType": "StandardEntity"
                    }),
                    json!({
                        "MetadataComponentName": "Territories",
                        "MetadataComponentType": "ReportType",
                        "RefMetadataComponentName": "UserTerritory",
                        "RefMetadataComponentType": "StandardEntity"
                    }),
                ],
            )
            .with_tooling(
                "WHERE TableEnumOrId IN",
                vec![json!({"Id": "00N1", "DeveloperName": "Region", "TableEnumOrId": "Territory"})],
            );
        let set = analyzer(org).hard_dependencies().unwrap();
        assert_eq!(set.dependency_count, 3);
        let names: Vec<_> = set
            .dependencies
            .iter()
            .map(|d| (d.dependency_type.as_str(), d.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("ApexClass", "TerritoryService"),
                ("CustomField", "Territory.Region__c"),
                ("ReportType", "Territories"),
            ]
        );
    }

    #[test]
    fn test_hard_dependency_failure_is_fatal() {
        let org = MockOrg::default().failing_tooling(
            "FROM MetadataComponentDependency",
            ConnectorError::Query("INVALID_TYPE".into()),
        );
        assert!(analyzer(org).hard_dependencies().is_err());
    }

    #[test]
    fn test_soft_dependencies_scan_bodies_and_skip_failures() {
        let org = MockOrg::default()
            .with_tooling("WHERE Id = '01p1'", vec![json!({"Body": "List<UserTerritory> x = [SELECT Id FROM userterritory];"})])
            .with_tooling("WHERE Id = '01p2'", vec![json!({"Body": "Territory2 t; // TM2 only"})])
            .failing_tooling("WHERE Id = '01p3'", ConnectorError::Network("reset".into()))
            .with_tooling(
                "WHERE Id = '3001'",
                vec![json!({"Metadata": {"formula": "RowCause = 'TerritoryManual'"}})],
            )
            .with_tooling(
                "FROM ApexClass WHERE NamespacePrefix",
                vec![
                    json!({"Id": "01p1", "Name": "Loader"}),
                    json!({"Id": "01p2", "Name": "Modern"}),
                    json!({"Id": "01p3", "Name": "Broken"}),
                ],
            )
            .with_tooling(
                "FROM Flow WHERE Status",
                vec![json!({"Id": "3001", "Definition": {"DeveloperName": "Share_Flow"}})],
            );
        let set = analyzer(org).soft_dependencies().unwrap();
        assert_eq!(set.dependency_count, 2);
        assert_eq!(set.dependencies[0].name, "Loader");
        assert_eq!(set.dependencies[0].reference_detail, "references UserTerritory");
        assert_eq!(set.dependencies[1].dependency_type, "Flow");
        assert_eq!(set.dependencies[1].reference_detail, "references TerritoryManual");
        assert_eq!(set.skipped_count, 1);
        assert_eq!(set.skipped[0].name, "Broken");
    }

    #[test]
    fn test_plain_word_territory_is_not_a_reference() {
        let analyzer = analyzer(MockOrg::default());
        assert_eq!(analyzer.scan("// reassign the territory owner later"), None);
        assert_eq!(analyzer.scan("Territory2 t = new Territory2();"), None);
        assert_eq!(
            analyzer.scan("Territory t = [SELECT Id FROM Territory LIMIT 1];").as_deref(),
            Some("references Territory")
        );
        assert_eq!(
            analyzer.scan("select id from accountterritoryassignmentruleitem").as_deref(),
            Some("references AccountTerritoryAssignmentRuleItem")
        );
    }

    #[test]
    fn test_listing_failure_skips_the_kind() {
        let org = MockOrg::default().failing_tooling(
            "FROM ApexPage",
            ConnectorError::Auth("INVALID_SESSION_ID".into()),
        );
        let set = analyzer(org).soft_dependencies().unwrap();
        assert_eq!(set.dependency_count, 0);
        assert_eq!(set.skipped_count, 1);
        assert_eq!(set.skipped[0].kind, "ApexPage");
    }
}
