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

//! # Analyze
//!
//! First stage. Captures the org identity, counts TM1 records, inventories
//! sharing rules and computes hard/soft dependencies. Everything later
//! stages need to know about the source org starts here.

use crate::application::context::{timestamp, StageContext};
use crate::application::dependency_analyzer::DependencyAnalyzer;
use crate::application::record_counter::RecordCounter;
use crate::application::runtime::RuntimeContext;
use crate::application::task_bundle::{StatusLog, TaskBundle};
use crate::domain::entities::{MetadataComponent, Severity, SkippedItem, StatusRecord, Tm1Entity};
use crate::domain::errors::{MigrationError, Result};
use crate::domain::pipeline_state::{PipelineRun, PipelineState};
use crate::domain::reports::{
    AnalysisReport, ObjectSharingRuleCounts, ReportType, Tm1MetadataCounts, SCHEMA_VERSION,
};
use crate::domain::sharing_rules::{sharing_rules_path, ObjectSharingRules};
use crate::ports::org_port::OrgConnector;
use log::warn;
use std::sync::Arc;

/// Sharing rules retrieved for one object: the raw XML and its parsed form.
pub struct RetrievedRules {
    pub object: String,
    pub xml: Option<String>,
    pub rules: ObjectSharingRules,
}

/// Retrieves sharing rules object by object. An object that fails to
/// retrieve or parse is skipped; the others are still returned.
pub fn retrieve_sharing_rules(
    connector: &dyn OrgConnector,
    runtime: &RuntimeContext,
    objects: &[String],
) -> (Vec<RetrievedRules>, Vec<SkippedItem>) {
    let results = runtime.fan_out(objects, |object| {
        let component = MetadataComponent::new("SharingRules", object.as_str());
        connector.retrieve_metadata(std::slice::from_ref(&component))
    });

    let mut retrieved = Vec::new();
    let mut skipped = Vec::new();
    for (object, result) in objects.iter().zip(results) {
        let skip = |reason: String| {
            warn!("Skipping sharing rules of {}: {}", object, reason);
            SkippedItem {
                kind: "SharingRules".to_string(),
                name: object.clone(),
                reason,
            }
        };
        let files = match result {
            Ok(files) => files,
            Err(e) => {
                skipped.push(skip(e.to_string()));
                continue;
            }
        };
        let expected = sharing_rules_path(object);
        let xml = files.into_iter().find(|f| f.path == expected).map(|f| f.content);
        let parsed = match &xml {
            Some(xml) => ObjectSharingRules::parse(object, xml),
            None => Ok(ObjectSharingRules {
                object: object.clone(),
                rules: vec![],
            }),
        };
        match parsed {
            Ok(rules) => retrieved.push(RetrievedRules {
                object: object.clone(),
                xml,
                rules,
            }),
            Err(e) => skipped.push(skip(e.to_string())),
        }
    }
    (retrieved, skipped)
}

pub fn metadata_counts(retrieved: &[RetrievedRules], skipped: Vec<SkippedItem>) -> Tm1MetadataCounts {
    Tm1MetadataCounts {
        objects: retrieved
            .iter()
            .map(|r| r.rules.counts())
            .collect::<Vec<ObjectSharingRuleCounts>>(),
        skipped,
    }
}

/// Runs the Analyze stage and writes `tm1-analysis.json`.
pub fn run_analyze(ctx: &StageContext, connector: Arc<dyn OrgConnector>) -> Result<AnalysisReport> {
    let mut run = PipelineRun::resume(PipelineState::NotStarted);
    let mut log = StatusLog::new(ctx.status.clone());

    let result = analyze(ctx, connector, &mut log);
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            run.abort();
            return Err(e);
        }
    };
    ctx.write_report(&report)?;
    run.advance(PipelineState::Analyzed)?;
    Ok(report)
}

fn analyze(
    ctx: &StageContext,
    connector: Arc<dyn OrgConnector>,
    log: &mut StatusLog,
) -> Result<AnalysisReport> {
    let org_info = TaskBundle::new("Org identity", "Reading the connected org...")
        .throw_on_failure(true)
        .run(log, || {
            let info = connector
                .org_info()
                .map_err(|e| MigrationError::connector("Reading org identity", e))?;
            let message = format!("Connected to {} ({})", info.username, info.org_id);
            Ok((info, message))
        })?
        .ok_or_else(|| MigrationError::Aborted("org identity unavailable".into()))?;

    let counter = RecordCounter::new(connector.clone(), ctx.runtime.clone());
    let record_counts = TaskBundle::new("Record counts", "Counting TM1 records...")
        .throw_on_failure(true)
        .run(log, || {
            let counts = counter.count_all(&Tm1Entity::ALL)?;
            let message = format!(
                "{} territories, {} user assignments, {} rules",
                counts.territory, counts.user_territory, counts.ata_rule
            );
            Ok((counts, message))
        })?
        .unwrap_or_default();

    let metadata = TaskBundle::new("Sharing rules", "Inventorying sharing rules...")
        .run(log, || {
            let (retrieved, skipped) = retrieve_sharing_rules(
                connector.as_ref(),
                &ctx.runtime,
                &ctx.settings.sharing_objects,
            );
            let counts = metadata_counts(&retrieved, skipped);
            let total: u64 = counts.objects.iter().map(|o| o.sharing_rules_count).sum();
            if !counts.skipped.is_empty() && counts.objects.is_empty() {
                return Err(MigrationError::Skipped(format!(
                    "no sharing rules could be retrieved ({} object(s) skipped)",
                    counts.skipped.len()
                )));
            }
            let message = format!(
                "{} sharing rule(s) on {} object(s), {} skipped",
                total,
                counts.objects.len(),
                counts.skipped.len()
            );
            Ok((counts, message))
        })?
        .unwrap_or_default();

    let analyzer = DependencyAnalyzer::new(connector.clone(), ctx.runtime.clone())?;
    let hard_dependencies = TaskBundle::new("Hard dependencies", "Querying the dependency index...")
        .throw_on_failure(true)
        .run(log, || {
            let set = analyzer.hard_dependencies()?;
            let message = format!("{} hard dependencies", set.dependency_count);
            Ok((set, message))
        })?
        .unwrap_or_default();
    if hard_dependencies.dependency_count > 0 {
        log.record(StatusRecord::new(
            Severity::Warning,
            "Migration blockers",
            format!(
                "{} component(s) reference TM1 objects and must be reworked before TM1 is disabled",
                hard_dependencies.dependency_count
            ),
        ));
    }

    let soft_dependencies = TaskBundle::new("Soft dependencies", "Scanning artifact bodies...")
        .run(log, || {
            let set = analyzer.soft_dependencies()?;
            let message = format!(
                "{} soft dependencies (advisory), {} artifact(s) skipped",
                set.dependency_count, set.skipped_count
            );
            Ok((set, message))
        })?
        .unwrap_or_default();

    Ok(AnalysisReport {
        schema_version: SCHEMA_VERSION,
        report_type: ReportType::Analysis,
        generated_at: timestamp(),
        org_info,
        record_counts,
        metadata_counts: metadata,
        hard_dependencies,
        soft_dependencies,
        statuses: log.records().to_vec(),
    })
}
