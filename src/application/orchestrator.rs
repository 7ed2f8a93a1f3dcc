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

//! The load orchestrator: drives the final, irreversible stage.
//!
//! It resumes the pipeline state machine at `TRANSFORMED` once the three
//! earlier reports, and the Transform outputs they list, are validated,
//! then:
//!
//! 1. gates on an ACTIVE Territory2 model in the target org (fatal),
//! 2. asks for confirmation unless `assume_yes`,
//! 3. deploys the translated sharing rules (non-fatal),
//! 4. bulk-loads the user associations, or skips the load entirely when the
//!    sharing rules did not deploy,
//! 5. writes `tm2-dataload.json`.

use crate::application::context::{ensure_same_org, timestamp, verify_connected_org, StageContext};
use crate::application::csv_rows::{csv_to_rows, rows_to_csv};
use crate::application::deployer::model_state;
use crate::application::task_bundle::{StatusLog, TaskBundle};
use crate::application::transformer::{
    sharing_object, AssociationRow, ASSOCIATION_FILE, ASSOCIATION_OBJECT,
};
use crate::domain::entities::{ModelState, ObjectDescriptor, Severity, SkippedItem, StatusRecord};
use crate::domain::errors::{MigrationError, Result};
use crate::domain::pipeline_state::{PipelineRun, PipelineState};
use crate::domain::reports::{
    AnalysisReport, DataLoadOutcome, DeploymentReport, ExtractionReport, LoadReport,
    OperationStatus, ReportType, SharingRuleDeployOutcome, TransformationReport, SCHEMA_VERSION,
};
use crate::domain::sharing_rules::ObjectSharingRules;
use crate::ports::artifact_port::ArtifactPort;
use crate::ports::org_port::OrgConnector;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A bulk-ready association row, resolved against the target org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResolvedAssociation {
    user_id: String,
    territory2_id: String,
}

/// Orchestrates the Load stage against the target org.
pub struct LoadOrchestrator<'a> {
    ctx: &'a StageContext,
    connector: Arc<dyn OrgConnector>,
    artifacts: Arc<dyn ArtifactPort>,
}

impl<'a> LoadOrchestrator<'a> {
    pub fn new(
        ctx: &'a StageContext,
        connector: Arc<dyn OrgConnector>,
        artifacts: Arc<dyn ArtifactPort>,
    ) -> Self {
        Self {
            ctx,
            connector,
            artifacts,
        }
    }

    /// Runs the stage. Returns `Err` without writing a report when the gate
    /// fails or the operator declines; otherwise the report is always written.
    pub fn run(&self) -> Result<LoadReport> {
        info!("Starting load...");
        let analysis: AnalysisReport = self.ctx.read_report()?;
        let extraction: ExtractionReport = self.ctx.read_report()?;
        let transformation: TransformationReport = self.ctx.read_report()?;
        ensure_same_org(&analysis.org_info, &extraction.org_info)?;
        ensure_same_org(&analysis.org_info, &transformation.org_info)?;
        if let Some(deployment) = self.ctx.try_read_report::<DeploymentReport>()? {
            ensure_same_org(&analysis.org_info, &deployment.org_info)?;
        }
        // inputs are checked against their digests before anything reaches the org
        let sharing_objects = self.translated_sharing_rules(&transformation)?;
        let associations = self.association_rows(&transformation)?;

        let model = transformation.model_name.as_str();
        let mut run = PipelineRun::resume(PipelineState::Transformed);
        let mut log = StatusLog::new(self.ctx.status.clone());

        let gate = TaskBundle::new("Model activation gate", "Checking the Territory2 model state...")
            .throw_on_failure(true)
            .run(&mut log, || {
                let info = verify_connected_org(self.connector.as_ref(), &transformation.org_info)?;
                match model_state(self.connector.as_ref(), model)? {
                    Some(ModelState::Active) => Ok(((), format!("Model {} is ACTIVE in {}", model, info.org_id))),
                    Some(state) => Err(MigrationError::Precondition(format!(
                        "Territory2 model {} is {}; activate it before loading",
                        model, state
                    ))),
                    None => Err(MigrationError::Precondition(format!(
                        "Territory2 model {} not found in the target org; run deploy first",
                        model
                    ))),
                }
            });
        if let Err(e) = gate {
            run.abort();
            return Err(MigrationError::Aborted(e.to_string()));
        }
        run.advance(PipelineState::DeployValidated)?;

        if !self.ctx.settings.assume_yes {
            let prompt = format!(
                "Deploy sharing rules and load {} user association(s) into org {}?",
                transformation.user_association_count, transformation.org_info.org_id
            );
            if !log.confirm(&prompt) {
                run.abort();
                log.record(StatusRecord::new(
                    Severity::Error,
                    "Load",
                    "Declined at the confirmation prompt",
                ));
                return Err(MigrationError::Aborted(
                    "load declined at the confirmation prompt".into(),
                ));
            }
        }

        self.ctx.clear_report::<LoadReport>()?;
        let sharing_rules = self.deploy_sharing_rules(&sharing_objects, &mut log)?;
        let mut data_loads = Vec::new();
        let mut unresolved = Vec::new();

        if sharing_rules.status == OperationStatus::Succeeded {
            run.advance(PipelineState::Deployed)?;
            let loaded = TaskBundle::new("Data load", "Loading user territory associations...")
                .run(&mut log, || {
                    self.load_associations(model, associations, &mut data_loads, &mut unresolved)
                })?
                .is_some();
            if loaded {
                run.advance(PipelineState::Loaded)?;
            }
        } else {
            let reason = "sharing rule deployment failed; associations were not loaded";
            TaskBundle::new("Data load", "Loading user territory associations...").skip(&mut log, reason);
            data_loads.push(DataLoadOutcome {
                object: ASSOCIATION_OBJECT.to_string(),
                file: self.ctx.paths.relative(&self.ctx.paths.tm2_data_dir().join(ASSOCIATION_FILE)),
                status: OperationStatus::Skipped,
                job_id: None,
                records_processed: 0,
                records_failed: 0,
                detail: reason.to_string(),
            });
        }

        if !unresolved.is_empty() {
            log.record(StatusRecord::new(
                Severity::Warning,
                "Unresolved associations",
                format!(
                    "{} association(s) name a Territory2 missing from model {}",
                    unresolved.len(),
                    model
                ),
            ));
        }

        run.advance(PipelineState::Reported)?;
        let report = LoadReport {
            schema_version: SCHEMA_VERSION,
            report_type: ReportType::Load,
            generated_at: timestamp(),
            org_info: transformation.org_info.clone(),
            status: log.severity(),
            final_state: run.state(),
            sharing_rules,
            data_loads,
            unresolved_associations: unresolved,
            statuses: log.into_records(),
        };
        self.ctx.write_report(&report)?;
        info!("Load finished with status {:?}", report.status);
        Ok(report)
    }

    fn deploy_sharing_rules(
        &self,
        objects: &[ObjectSharingRules],
        log: &mut StatusLog,
    ) -> Result<SharingRuleDeployOutcome> {
        let mut outcome = SharingRuleDeployOutcome {
            status: OperationStatus::Failed,
            detail: String::new(),
            components: vec![],
        };
        let deployed = TaskBundle::new("Deploy sharing rules", "Deploying translated sharing rules...")
            .run(log, || {
                if objects.is_empty() {
                    return Ok(((), "No sharing rules to deploy".to_string()));
                }
                let files = self.artifacts.sharing_rules_package(objects)?;
                let result = self
                    .connector
                    .deploy_metadata(&files)
                    .map_err(|e| MigrationError::connector("Deploying sharing rules", e))?;
                outcome.components = result.components.clone();
                if !result.success {
                    return Err(MigrationError::TaskFailed(result.failure_summary()));
                }
                let total: usize = objects.iter().map(|o| o.rules.len()).sum();
                Ok(((), format!("{} sharing rule(s) deployed", total)))
            })?
            .is_some();

        if let Some(last) = log.records().last() {
            outcome.detail = last.message.clone();
        }
        if deployed {
            outcome.status = OperationStatus::Succeeded;
        }
        Ok(outcome)
    }

    fn translated_sharing_rules(
        &self,
        transformation: &TransformationReport,
    ) -> Result<Vec<ObjectSharingRules>> {
        let files = &transformation.files;
        let mut objects = Vec::new();
        for path in self.ctx.recorded_under(files, &self.ctx.paths.tm2_sharing_rules_dir()) {
            let Some(object) = sharing_object(&path) else {
                continue;
            };
            let bytes = self.ctx.read_recorded(ReportType::Transformation, files, &path)?;
            let xml = String::from_utf8_lossy(&bytes).into_owned();
            objects.push(ObjectSharingRules::parse(&object, &xml)?);
        }
        Ok(objects)
    }

    fn association_rows(&self, transformation: &TransformationReport) -> Result<Vec<AssociationRow>> {
        let source = self.ctx.paths.tm2_data_dir().join(ASSOCIATION_FILE);
        csv_to_rows(&self.ctx.read_recorded(
            ReportType::Transformation,
            &transformation.files,
            &source,
        )?)
    }

    /// Resolves developer names to Territory2 Ids and bulk-inserts the rows.
    fn load_associations(
        &self,
        model: &str,
        rows: Vec<AssociationRow>,
        outcomes: &mut Vec<DataLoadOutcome>,
        unresolved: &mut Vec<SkippedItem>,
    ) -> Result<((), String)> {

        let soql = format!(
            "SELECT Id, DeveloperName FROM Territory2 WHERE Territory2Model.DeveloperName = '{}'",
            model.replace('\'', "\\'")
        );
        let territory_ids: HashMap<String, String> = self
            .connector
            .query(&soql)
            .map_err(|e| MigrationError::connector("Reading deployed Territory2 records", e))?
            .iter()
            .filter_map(|r| {
                let name = r.get("DeveloperName")?.as_str()?;
                let id = r.get("Id")?.as_str()?;
                Some((name.to_string(), id.to_string()))
            })
            .collect();

        let mut resolved = Vec::with_capacity(rows.len());
        for row in rows {
            match territory_ids.get(&row.territory2_developer_name) {
                Some(id) => resolved.push(ResolvedAssociation {
                    user_id: row.user_id,
                    territory2_id: id.clone(),
                }),
                None => {
                    warn!(
                        "No Territory2 {} in model {}; association for user {} not loaded",
                        row.territory2_developer_name, model, row.user_id
                    );
                    unresolved.push(SkippedItem {
                        kind: ASSOCIATION_OBJECT.to_string(),
                        name: format!("{}:{}", row.user_id, row.territory2_developer_name),
                        reason: format!(
                            "Territory2 {} not found in model {}",
                            row.territory2_developer_name, model
                        ),
                    });
                }
            }
        }

        let target = self.ctx.paths.tm2_load_dir().join(ASSOCIATION_FILE);
        let file = self.ctx.write_output(
            &target,
            &rows_to_csv(&resolved)?,
            Some(resolved.len() as u64),
        )?;
        let mut outcome = DataLoadOutcome {
            object: ASSOCIATION_OBJECT.to_string(),
            file: file.path,
            status: OperationStatus::Failed,
            job_id: None,
            records_processed: 0,
            records_failed: 0,
            detail: String::new(),
        };
        if resolved.is_empty() {
            outcome.status = OperationStatus::Succeeded;
            outcome.detail = "No resolvable associations to load".to_string();
            outcomes.push(outcome);
            return Ok(((), "No resolvable associations to load".to_string()));
        }

        let result = match self
            .connector
            .bulk_load(&target, &ObjectDescriptor::insert(ASSOCIATION_OBJECT))
        {
            Ok(result) => result,
            Err(e) => {
                outcome.detail = e.to_string();
                outcomes.push(outcome);
                return Err(MigrationError::connector("Bulk loading associations", e));
            }
        };
        outcome.job_id = result.job_id.clone();
        outcome.records_processed = result.records_processed;
        outcome.records_failed = result.records_failed;

        if !result.success || result.records_failed > 0 {
            let detail = format!(
                "{} of {} record(s) failed (job {})",
                result.records_failed,
                result.records_processed,
                result.job_id.as_deref().unwrap_or("unknown")
            );
            outcome.detail = detail.clone();
            outcomes.push(outcome);
            return Err(MigrationError::TaskFailed(detail));
        }

        let message = format!("{} association(s) loaded", result.records_processed);
        outcome.status = OperationStatus::Succeeded;
        outcome.detail = message.clone();
        outcomes.push(outcome);
        Ok(((), message))
    }
}
