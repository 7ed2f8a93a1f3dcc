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

//! Which reports exist, and what pipeline state they add up to.

use crate::application::context::StageContext;
use crate::domain::errors::{MigrationError, Result};
use crate::domain::pipeline_state::PipelineState;
use crate::domain::reports::{
    AnalysisReport, DeploymentReport, ExtractionReport, LoadReport, Report, ReportType,
    TransformationReport,
};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportPresence {
    Missing,
    Valid,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub report_type: ReportType,
    pub path: PathBuf,
    pub presence: ReportPresence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub reports: Vec<ReportEntry>,
    pub state: PipelineState,
}

fn inspect<R: Report>(ctx: &StageContext) -> Result<(ReportEntry, Option<R>)> {
    let path = ctx.paths.report(R::REPORT_TYPE);
    let (presence, report) = match ctx.try_read_report::<R>() {
        Ok(Some(r)) => (ReportPresence::Valid, Some(r)),
        Ok(None) => (ReportPresence::Missing, None),
        Err(MigrationError::InvalidReport { reason, .. }) => (ReportPresence::Invalid(reason), None),
        Err(e) => return Err(e),
    };
    Ok((
        ReportEntry {
            report_type: R::REPORT_TYPE,
            path,
            presence,
        },
        report,
    ))
}

/// Inspects the output directory. Each stage only counts as done when every
/// stage before it is done too.
pub fn pipeline_status(ctx: &StageContext) -> Result<PipelineStatus> {
    let (analysis, a) = inspect::<AnalysisReport>(ctx)?;
    let (extraction, e) = inspect::<ExtractionReport>(ctx)?;
    let (transformation, t) = inspect::<TransformationReport>(ctx)?;
    let (deployment, _) = inspect::<DeploymentReport>(ctx)?;
    let (load, l) = inspect::<LoadReport>(ctx)?;

    let state = match (a, e, t, l) {
        (Some(_), Some(_), Some(_), Some(load)) => load.final_state,
        (Some(_), Some(_), Some(_), None) => PipelineState::Transformed,
        (Some(_), Some(_), None, _) => PipelineState::Extracted,
        (Some(_), None, _, _) => PipelineState::Analyzed,
        (None, _, _, _) => PipelineState::NotStarted,
    };

    Ok(PipelineStatus {
        reports: vec![analysis, extraction, transformation, deployment, load],
        state,
    })
}
