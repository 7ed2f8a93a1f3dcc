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

//! # Extract
//!
//! Pulls the TM1 rows and sharing rules out of the org onto disk and
//! reconciles what was pulled against what Analyze counted.

use crate::application::analyzer::{metadata_counts, retrieve_sharing_rules};
use crate::application::context::{timestamp, verify_connected_org, StageContext};
use crate::application::csv_rows::records_to_csv;
use crate::application::record_counter::RecordCounter;
use crate::application::runtime::first_error;
use crate::application::task_bundle::{StatusLog, TaskBundle};
use crate::domain::entities::{OutputFile, Severity, StatusRecord, Tm1Entity, Tm1RecordCounts};
use crate::domain::errors::Result;
use crate::domain::pipeline_state::{PipelineRun, PipelineState};
use crate::domain::reconcile::{reconcile, reconcile_metadata};
use crate::domain::reports::{AnalysisReport, ExtractionReport, ReportType, SCHEMA_VERSION};
use crate::domain::sharing_rules::sharing_rules_path;
use crate::ports::org_port::OrgConnector;
use log::warn;
use std::sync::Arc;

/// Runs the Extract stage and writes `tm1-extraction.json`.
pub fn run_extract(ctx: &StageContext, connector: Arc<dyn OrgConnector>) -> Result<ExtractionReport> {
    let analysis: AnalysisReport = ctx.read_report()?;
    let mut run = PipelineRun::resume(PipelineState::Analyzed);
    let mut log = StatusLog::new(ctx.status.clone());

    match extract(ctx, connector, &analysis, &mut log) {
        Ok(report) => {
            ctx.write_report(&report)?;
            run.advance(PipelineState::Extracted)?;
            Ok(report)
        }
        Err(e) => {
            run.abort();
            Err(e)
        }
    }
}

fn extract(
    ctx: &StageContext,
    connector: Arc<dyn OrgConnector>,
    analysis: &AnalysisReport,
    log: &mut StatusLog,
) -> Result<ExtractionReport> {
    TaskBundle::new("Org identity", "Checking the connected org...")
        .throw_on_failure(true)
        .run(log, || {
            let info = verify_connected_org(connector.as_ref(), &analysis.org_info)?;
            Ok(((), format!("Connected org {} matches the analysis", info.org_id)))
        })?;

    ctx.clear_report::<ExtractionReport>()?;
    ctx.workspace.remove_dir(&ctx.paths.tm1_data_dir())?;
    ctx.workspace.remove_dir(&ctx.paths.tm1_metadata_dir())?;

    let mut actual_counts = Tm1RecordCounts::default();
    let mut files: Vec<OutputFile> = Vec::new();

    let extracted = TaskBundle::new("Extract records", "Extracting TM1 records...")
        .throw_on_failure(true)
        .run(log, || {
            let entities = Tm1Entity::EXTRACTED;
            let results = ctx
                .runtime
                .fan_out(&entities, |e| connector.query(&e.extract_query()));
            let rows = first_error(results, |i| format!("Extracting {}", entities[i]))?;

            let mut written = Vec::new();
            for (entity, records) in entities.iter().zip(rows) {
                let csv = records_to_csv(entity.fields(), &records)?;
                let path = ctx.paths.tm1_data_dir().join(entity.file_name());
                let count = records.len() as u64;
                written.push((*entity, count, ctx.write_output(&path, &csv, Some(count))?));
            }
            let total: u64 = written.iter().map(|(_, n, _)| n).sum();
            Ok((written, format!("{} record(s) written", total)))
        })?
        .unwrap_or_default();
    for (entity, count, file) in extracted {
        actual_counts.set(entity, count);
        files.push(file);
    }

    let counter = RecordCounter::new(connector.clone(), ctx.runtime.clone());
    let counted = TaskBundle::new("Count shares and groups", "Counting manual shares and groups...")
        .throw_on_failure(true)
        .run(log, || {
            let counts = counter.count_all(&[Tm1Entity::AccountShare, Tm1Entity::Group])?;
            let message = format!(
                "{} manual account share(s), {} territory group(s)",
                counts.account_share, counts.group
            );
            Ok((counts, message))
        })?
        .unwrap_or_default();
    actual_counts.set(Tm1Entity::AccountShare, counted.account_share);
    actual_counts.set(Tm1Entity::Group, counted.group);

    let metadata = TaskBundle::new("Retrieve sharing rules", "Retrieving sharing rules...")
        .run(log, || {
            let (retrieved, skipped) = retrieve_sharing_rules(
                connector.as_ref(),
                &ctx.runtime,
                &ctx.settings.sharing_objects,
            );
            let mut written = Vec::new();
            for r in &retrieved {
                if let Some(xml) = &r.xml {
                    let path = ctx.paths.tm1_metadata_dir().join(sharing_rules_path(&r.object));
                    written.push(ctx.write_output(&path, xml.as_bytes(), None)?);
                }
            }
            let message = format!(
                "{} object(s) retrieved, {} skipped",
                retrieved.len(),
                skipped.len()
            );
            Ok(((metadata_counts(&retrieved, skipped), written), message))
        })?;
    let metadata_counts = match metadata {
        Some((counts, written)) => {
            files.extend(written);
            counts
        }
        None => Default::default(),
    };

    let mut discrepancies = reconcile(&analysis.record_counts, &actual_counts);
    discrepancies.extend(reconcile_metadata(&analysis.metadata_counts, &metadata_counts));
    for d in &discrepancies {
        warn!(
            "Count discrepancy for {}: expected {}, extracted {}",
            d.entity, d.expected, d.actual
        );
    }
    if !discrepancies.is_empty() {
        log.record(StatusRecord::new(
            Severity::Warning,
            "Reconciliation",
            format!(
                "{} count discrepancy(ies) between analysis and extraction",
                discrepancies.len()
            ),
        ));
    }

    files.sort();
    Ok(ExtractionReport {
        schema_version: SCHEMA_VERSION,
        report_type: ReportType::Extraction,
        generated_at: timestamp(),
        org_info: analysis.org_info.clone(),
        actual_counts,
        metadata_counts,
        discrepancies,
        files,
        statuses: log.records().to_vec(),
    })
}
