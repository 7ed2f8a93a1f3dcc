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

//! # Deploy
//!
//! Pushes the Territory2 model package written by Transform into the
//! target org and records the model's lifecycle state. Activation is a
//! manual step in Setup; Load refuses to run until the model is active.
//!
//! The deployment report is written even when the deploy fails so the
//! per-component problems are on disk for the operator.

use crate::application::context::{timestamp, verify_connected_org, StageContext};
use crate::application::task_bundle::{StatusLog, TaskBundle};
use crate::domain::entities::{
    ComponentResult, MetadataFile, ModelState, Severity, StatusRecord,
};
use crate::domain::errors::{MigrationError, Result};
use crate::domain::reports::{
    DeploymentReport, ReportType, TransformationReport, SCHEMA_VERSION,
};
use crate::ports::org_port::OrgConnector;
use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Runs the Deploy stage and writes `tm2-deployment.json`.
pub fn run_deploy(ctx: &StageContext, connector: Arc<dyn OrgConnector>) -> Result<DeploymentReport> {
    let transformation: TransformationReport = ctx.read_report()?;
    let mut log = StatusLog::new(ctx.status.clone());

    TaskBundle::new("Org identity", "Checking the connected org...")
        .throw_on_failure(true)
        .run(&mut log, || {
            let info = verify_connected_org(connector.as_ref(), &transformation.org_info)?;
            Ok(((), format!("Connected org {} matches the reports", info.org_id)))
        })?;

    ctx.clear_report::<DeploymentReport>()?;
    let model_name = transformation.model_name.clone();
    let mut components: Vec<ComponentResult> = Vec::new();
    let deployed = TaskBundle::new(
        "Deploy Territory2 model",
        &format!("Deploying territory model {}...", model_name),
    )
    .run(&mut log, || {
        let files = read_package(ctx, &transformation)?;
        if files.is_empty() {
            return Err(MigrationError::Precondition(format!(
                "no package found in {}",
                ctx.paths.tm2_metadata_dir().display()
            )));
        }
        let result = connector
            .deploy_metadata(&files)
            .map_err(|e| MigrationError::connector("Deploying Territory2 model", e))?;
        components = result.components.clone();
        if !result.success {
            return Err(MigrationError::TaskFailed(result.failure_summary()));
        }
        Ok(((), format!("{} component(s) deployed", result.components.len())))
    })?
    .is_some();

    let model_state = TaskBundle::new("Read model state", "Reading the Territory2 model state...")
        .run(&mut log, || {
            let state = model_state(connector.as_ref(), &model_name)?;
            let message = match state {
                Some(s) => format!("Model {} is {}", model_name, s),
                None => format!("Model {} not found in the org", model_name),
            };
            Ok((state, message))
        })?
        .flatten();

    match model_state {
        Some(ModelState::Active) => {}
        Some(state) if deployed => {
            log.record(StatusRecord::new(
                Severity::Warning,
                "Model not active",
                format!(
                    "Model {} is {}; activate it in Setup before running load",
                    model_name, state
                ),
            ));
        }
        _ => {}
    }

    let report = DeploymentReport {
        schema_version: SCHEMA_VERSION,
        report_type: ReportType::Deployment,
        generated_at: timestamp(),
        org_info: transformation.org_info.clone(),
        model_name,
        success: deployed,
        components,
        model_state,
        statuses: log.records().to_vec(),
    };
    ctx.write_report(&report)?;
    if deployed {
        info!("Deployment finished");
    } else {
        warn!("Deployment failed; see {}", ctx.paths.report(ReportType::Deployment).display());
    }
    Ok(report)
}

/// Looks up the lifecycle state of the model named `model_name`.
pub fn model_state(connector: &dyn OrgConnector, model_name: &str) -> Result<Option<ModelState>> {
    let soql = format!(
        "SELECT Id, DeveloperName, State FROM Territory2Model WHERE DeveloperName = '{}'",
        model_name.replace('\'', "\\'")
    );
    let rows = connector
        .query(&soql)
        .map_err(|e| MigrationError::connector("Reading Territory2Model state", e))?;
    Ok(rows
        .first()
        .and_then(|r| r.get("State"))
        .and_then(|v| v.as_str())
        .map(ModelState::from_api))
}

/// Reads the Territory2 package Transform recorded, verifying each file's
/// digest, in deployment order: `package.xml`, the model, the type, the
/// territories parent-first as listed in `deploymentOrder`, then the rules.
pub fn read_package(
    ctx: &StageContext,
    transformation: &TransformationReport,
) -> Result<Vec<MetadataFile>> {
    let root = ctx.paths.tm2_metadata_dir();
    let position: HashMap<&str, usize> = transformation
        .deployment_order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut ranked = Vec::new();
    for path in ctx.recorded_under(&transformation.files, &root) {
        let rel = ctx.paths.relative(&path);
        let rel = rel
            .strip_prefix(&format!("{}/", ctx.paths.relative(&root)))
            .unwrap_or(&rel)
            .to_string();
        let rank = package_rank(&rel, &position).ok_or_else(|| MigrationError::InvalidReport {
            path: ctx.paths.report(ReportType::Transformation).display().to_string(),
            reason: format!("{} is not listed in deploymentOrder", rel),
        })?;
        let bytes = ctx.read_recorded(ReportType::Transformation, &transformation.files, &path)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        ranked.push((rank, MetadataFile { path: rel, content }));
    }
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.path.cmp(&b.1.path)));
    Ok(ranked.into_iter().map(|(_, file)| file).collect())
}

/// Sort key of a package file. `None` for a territory missing from the order.
fn package_rank(rel: &str, position: &HashMap<&str, usize>) -> Option<(u8, usize)> {
    let file = Path::new(rel);
    let rank = match file.extension().and_then(|e| e.to_str()) {
        _ if rel == "package.xml" => (0, 0),
        Some("territory2Model") => (1, 0),
        Some("territory2Type") => (2, 0),
        Some("territory2") => {
            let name = file.file_stem()?.to_str()?;
            (3, *position.get(name)?)
        }
        Some("territory2Rule") => (4, 0),
        _ => (5, 0),
    };
    Some(rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::MockOrg;
    use crate::application::transformer::run_transform;
    use crate::application::transformer::tests::extracted_workspace;
    use crate::domain::entities::DeployResult;
    use crate::domain::errors::ConnectorError;
    use crate::domain::reports::tests::org;
    use crate::infrastructure::artifacts::metadata_xml_adapter::MetadataXmlAdapter;
    use serde_json::json;

    fn transformed_workspace(dir: &Path) -> StageContext {
        let ctx = extracted_workspace(dir);
        run_transform(&ctx, &MetadataXmlAdapter::new("60.0"), None).unwrap();
        ctx
    }

    fn target_org(state: &str) -> MockOrg {
        MockOrg::default().with_rows(
            "FROM Territory2Model",
            vec![json!({"Id": "0MA1", "DeveloperName": "IMPORTED_TERRITORY", "State": state})],
        )
    }

    #[test]
    fn test_deploys_package_and_reads_state() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = transformed_workspace(dir.path());
        let org = Arc::new(target_org("Planning"));

        let report = run_deploy(&ctx, org.clone()).unwrap();
        assert!(report.success);
        assert_eq!(report.model_state, Some(ModelState::Planning));
        assert!(report
            .statuses
            .iter()
            .any(|s| s.title == "Model not active" && s.severity == Severity::Warning));

        let deployed = org.deployed.lock().unwrap();
        assert_eq!(deployed.len(), 1);
        let paths: Vec<&str> = deployed[0].iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"package.xml"));
        assert!(paths.contains(&"territory2Models/IMPORTED_TERRITORY/territories/West.territory2"));
        assert!(dir.path().join("tm2-deployment.json").exists());
    }

    #[test]
    fn test_failed_deploy_still_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = transformed_workspace(dir.path());
        let org = target_org("Planning").with_deploy_result(Ok(DeployResult {
            success: false,
            components: vec![ComponentResult {
                component_type: "Territory2".into(),
                full_name: "IMPORTED_TERRITORY.West".into(),
                success: false,
                problem: Some("Invalid access level".into()),
            }],
            error_message: None,
        }));

        let report = run_deploy(&ctx, Arc::new(org)).unwrap();
        assert!(!report.success);
        assert_eq!(report.components.len(), 1);
        let failure = report
            .statuses
            .iter()
            .find(|s| s.title == "Deploy Territory2 model")
            .unwrap();
        assert_eq!(failure.severity, Severity::Warning);
        assert!(failure.message.contains("Invalid access level"));
        assert!(dir.path().join("tm2-deployment.json").exists());
    }

    #[test]
    fn test_connector_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = transformed_workspace(dir.path());
        let org = target_org("Active")
            .with_deploy_result(Err(ConnectorError::Network("ECONNRESET".into())));
        let report = run_deploy(&ctx, Arc::new(org)).unwrap();
        assert!(!report.success);
        assert_eq!(report.model_state, Some(ModelState::Active));
    }

    #[test]
    fn test_package_is_sent_parent_first() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = extracted_workspace(dir.path());
        let transformation = run_transform(&ctx, &MetadataXmlAdapter::new("60.0"), None).unwrap();
        let org = Arc::new(target_org("Active"));
        run_deploy(&ctx, org.clone()).unwrap();

        let deployed = org.deployed.lock().unwrap();
        let paths: Vec<&str> = deployed[0].iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths[0], "package.xml");
        assert!(paths[1].ends_with(".territory2Model"));
        assert_eq!(paths[2], "territory2Types/Imported.territory2Type");

        let territories: Vec<String> = paths
            .iter()
            .filter_map(|p| p.strip_suffix(".territory2"))
            .filter_map(|p| p.rsplit('/').next())
            .map(str::to_string)
            .collect();
        assert_eq!(territories, transformation.deployment_order);
        let at = |name: &str| territories.iter().position(|t| t == name).unwrap();
        assert!(at("West") < at("Region_3"));
        assert!(at("East") < at("Region_10"));
    }

    #[test]
    fn test_edited_package_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = transformed_workspace(dir.path());
        std::fs::write(
            dir.path()
                .join("tm2/metadata/territory2Models/IMPORTED_TERRITORY/territories/West.territory2"),
            "<Territory2/>",
        )
        .unwrap();
        let org = Arc::new(target_org("Active"));
        let err = run_deploy(&ctx, org.clone()).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidReport { .. }));
        assert_eq!(org.calls("deploy_metadata"), 0);
        assert!(!dir.path().join("tm2-deployment.json").exists());
    }

    #[test]
    fn test_refuses_other_org() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = transformed_workspace(dir.path());
        let mut other = org();
        other.org_id = "00D000000000009EAA".into();
        let target = Arc::new(target_org("Active").with_org(other));
        let err = run_deploy(&ctx, target.clone()).unwrap_err();
        assert!(matches!(err, MigrationError::OrgMismatch { .. }));
        assert_eq!(target.calls("deploy_metadata"), 0);
        assert!(!dir.path().join("tm2-deployment.json").exists());
    }

    #[test]
    fn test_requires_transformation_report() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = extracted_workspace(dir.path());
        let err = run_deploy(&ctx, Arc::new(target_org("Active"))).unwrap_err();
        assert!(matches!(err, MigrationError::ReportNotFound(_)));
    }
}
