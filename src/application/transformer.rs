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

//! # Transform
//!
//! Reads the extracted TM1 files, translates them into a TM2 plan and
//! writes the deployable package, the rewritten sharing rules and the
//! association CSV. Inputs are never modified; `tm2/` is rebuilt from
//! scratch on every run, so identical inputs give byte-identical output.

use crate::application::context::{ensure_same_org, timestamp, verify_connected_org, StageContext};
use crate::application::csv_rows::{csv_to_rows, rows_to_csv};
use crate::application::task_bundle::{StatusLog, TaskBundle};
use crate::domain::entities::{OutputFile, Severity, StatusRecord, Tm1Entity};
use crate::domain::errors::{MigrationError, Result};
use crate::domain::mapping::{translate, Tm1Snapshot, Tm2Plan};
use crate::domain::pipeline_state::{PipelineRun, PipelineState};
use crate::domain::reconcile::check_monotonic;
use crate::domain::reports::{
    AnalysisReport, ExtractionReport, ReportType, TransformationReport, SCHEMA_VERSION,
};
use crate::domain::sharing_rules::{sharing_rules_path, ObjectSharingRules};
use crate::ports::artifact_port::ArtifactPort;
use crate::ports::org_port::OrgConnector;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const ASSOCIATION_OBJECT: &str = "UserTerritory2Association";
pub const ASSOCIATION_FILE: &str = "UserTerritory2Association.csv";

/// A user association as written by Transform, keyed by developer name
/// because Territory2 Ids only exist once the model is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssociationRow {
    pub user_id: String,
    pub territory2_developer_name: String,
    pub role_in_territory2: Option<String>,
}

/// Runs the Transform stage and writes `tm1-transformation.json`.
///
/// `connector` is optional: without one the org identity is only checked
/// between the two input reports.
pub fn run_transform(
    ctx: &StageContext,
    artifacts: &dyn ArtifactPort,
    connector: Option<Arc<dyn OrgConnector>>,
) -> Result<TransformationReport> {
    let analysis: AnalysisReport = ctx.read_report()?;
    let extraction: ExtractionReport = ctx.read_report()?;
    ensure_same_org(&analysis.org_info, &extraction.org_info)?;

    let mut run = PipelineRun::resume(PipelineState::Extracted);
    let mut log = StatusLog::new(ctx.status.clone());
    match transform(ctx, artifacts, connector, &extraction, &mut log) {
        Ok(report) => {
            ctx.write_report(&report)?;
            run.advance(PipelineState::Transformed)?;
            Ok(report)
        }
        Err(e) => {
            run.abort();
            Err(e)
        }
    }
}

fn transform(
    ctx: &StageContext,
    artifacts: &dyn ArtifactPort,
    connector: Option<Arc<dyn OrgConnector>>,
    extraction: &ExtractionReport,
    log: &mut StatusLog,
) -> Result<TransformationReport> {
    if let Some(connector) = connector {
        TaskBundle::new("Org identity", "Checking the connected org...")
            .throw_on_failure(true)
            .run(log, || {
                let info = verify_connected_org(connector.as_ref(), &extraction.org_info)?;
                Ok(((), format!("Connected org {} matches the reports", info.org_id)))
            })?;
    }

    let snapshot = TaskBundle::new("Load extracted data", "Reading extracted TM1 files...")
        .throw_on_failure(true)
        .run(log, || {
            let snapshot = load_snapshot(ctx, extraction)?;
            let message = format!(
                "{} territories, {} user assignments, {} rules, {} sharing rule file(s)",
                snapshot.territories.len(),
                snapshot.user_territories.len(),
                snapshot.rules.len(),
                snapshot.sharing_rules.len()
            );
            Ok((snapshot, message))
        })?
        .unwrap_or_default();

    let plan = TaskBundle::new("Translate", "Translating TM1 to TM2...")
        .throw_on_failure(true)
        .run(log, || {
            let plan = translate(&snapshot, &ctx.settings.model_name);
            check_monotonic(&plan.reconciliation)?;
            let message = format!(
                "{} Territory2, {} associations, {} rules, {} untranslatable",
                plan.territories.len(),
                plan.user_associations.len(),
                plan.rules.len(),
                plan.untranslatable.len()
            );
            Ok((plan, message))
        })?
        .ok_or_else(|| MigrationError::Aborted("translation produced no plan".into()))?;

    for item in &plan.untranslatable {
        warn!("Untranslatable {} {} ({}): {}", item.kind, item.id, item.name, item.reason);
    }
    for dropped in &plan.dropped_sharing_rules {
        warn!(
            "Dropped {} sharing rule {}.{}: {}",
            dropped.kind, dropped.object, dropped.rule_name, dropped.reason
        );
    }

    let files = TaskBundle::new("Write TM2 files", "Writing the Territory2 package...")
        .throw_on_failure(true)
        .run(log, || {
            let files = write_outputs(ctx, artifacts, &plan)?;
            let message = format!("{} file(s) written", files.len());
            Ok((files, message))
        })?
        .unwrap_or_default();

    if !plan.untranslatable.is_empty() {
        log.record(StatusRecord::new(
            Severity::Warning,
            "Untranslatable items",
            format!(
                "{} TM1 item(s) have no TM2 counterpart and were excluded",
                plan.untranslatable.len()
            ),
        ));
    }
    if !plan.dropped_sharing_rules.is_empty() {
        log.record(StatusRecord::new(
            Severity::Warning,
            "Dropped sharing rules",
            format!(
                "{} sharing rule(s) reference unmapped territory groups",
                plan.dropped_sharing_rules.len()
            ),
        ));
    }

    Ok(TransformationReport {
        schema_version: SCHEMA_VERSION,
        report_type: ReportType::Transformation,
        generated_at: timestamp(),
        org_info: extraction.org_info.clone(),
        model_name: plan.model_name.clone(),
        territory2_count: plan.territories.len() as u64,
        deployment_order: plan.deployment_order(),
        user_association_count: plan.user_associations.len() as u64,
        rule_count: plan.rules.len() as u64,
        rule_item_count: plan.rule_item_count(),
        sharing_rules_translated: plan.sharing_rule_count(),
        manual_account_shares: plan.manual_account_shares,
        untranslatable_count: plan.untranslatable.len() as u64,
        untranslatable: plan.untranslatable.clone(),
        dropped_sharing_rules: plan.dropped_sharing_rules.clone(),
        reconciliation: plan.reconciliation.clone(),
        files,
        statuses: log.records().to_vec(),
    })
}

fn read_rows<T: serde::de::DeserializeOwned>(
    ctx: &StageContext,
    extraction: &ExtractionReport,
    entity: Tm1Entity,
) -> Result<Vec<T>> {
    let path = ctx.paths.tm1_data_dir().join(entity.file_name());
    csv_to_rows(&ctx.read_recorded(ReportType::Extraction, &extraction.files, &path)?)
}

/// Reads only what the extraction report lists, each file checked against
/// its recorded digest.
fn load_snapshot(ctx: &StageContext, extraction: &ExtractionReport) -> Result<Tm1Snapshot> {
    let sharing_dir = ctx.paths.tm1_metadata_dir().join("sharingRules");
    let mut sharing_rules = Vec::new();
    for path in ctx.recorded_under(&extraction.files, &sharing_dir) {
        let Some(object) = sharing_object(&path) else {
            continue;
        };
        let bytes = ctx.read_recorded(ReportType::Extraction, &extraction.files, &path)?;
        let xml = String::from_utf8_lossy(&bytes).into_owned();
        sharing_rules.push(ObjectSharingRules::parse(&object, &xml)?);
    }

    Ok(Tm1Snapshot {
        territories: read_rows(ctx, extraction, Tm1Entity::Territory)?,
        user_territories: read_rows(ctx, extraction, Tm1Entity::UserTerritory)?,
        rules: read_rows(ctx, extraction, Tm1Entity::AccountTerritoryAssignmentRule)?,
        rule_items: read_rows(ctx, extraction, Tm1Entity::AccountTerritoryAssignmentRuleItem)?,
        sharing_rules,
        manual_account_shares: extraction.actual_counts.account_share,
    })
}

/// `Account.sharingRules` -> `Account`.
pub fn sharing_object(path: &Path) -> Option<String> {
    if path.extension()? != "sharingRules" {
        return None;
    }
    Some(path.file_stem()?.to_string_lossy().into_owned())
}

fn write_outputs(
    ctx: &StageContext,
    artifacts: &dyn ArtifactPort,
    plan: &Tm2Plan,
) -> Result<Vec<OutputFile>> {
    ctx.clear_report::<TransformationReport>()?;
    ctx.workspace.remove_dir(&ctx.paths.tm2_dir())?;
    let mut files = Vec::new();

    let metadata_dir = ctx.paths.tm2_metadata_dir();
    for file in artifacts.territory_package(plan)? {
        let path = metadata_dir.join(&file.path);
        files.push(ctx.write_output(&path, file.content.as_bytes(), None)?);
    }

    for object in &plan.sharing_rules {
        let path = ctx.paths.tm2_dir().join(sharing_rules_path(&object.object));
        files.push(ctx.write_output(&path, object.render().as_bytes(), None)?);
    }

    let rows: Vec<AssociationRow> = plan
        .user_associations
        .iter()
        .map(|a| AssociationRow {
            user_id: a.user_id.clone(),
            territory2_developer_name: a.territory.clone(),
            role_in_territory2: None,
        })
        .collect();
    let path = ctx.paths.tm2_data_dir().join(ASSOCIATION_FILE);
    files.push(ctx.write_output(&path, &rows_to_csv(&rows)?, Some(rows.len() as u64))?);

    files.sort();
    Ok(files)
}
