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

//! # sf CLI Adapter
//!
//! Reaches the org by shelling out to the Salesforce `sf` CLI with `--json`
//! and parsing its envelope:
//!
//! ```text
//! {"status": 0, "result": {...}}
//! {"status": 1, "name": "INVALID_SESSION_ID", "message": "..."}
//! ```
//!
//! Authentication, session refresh and per-call retries are the CLI's job.
//! This adapter only maps CLI error names onto `ConnectorError` kinds.

use crate::domain::entities::{
    ComponentResult, DeployResult, LoadResult, MetadataComponent, MetadataFile,
    ObjectDescriptor, OrgInfo, Record,
};
use crate::domain::errors::{ConnectorError, ConnectorResult};
use crate::domain::sharing_rules::{escape_xml, METADATA_NAMESPACE};
use crate::ports::org_port::OrgConnector;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Minutes the CLI waits for deploys and bulk jobs.
const WAIT_MINUTES: &str = "60";

pub struct SfCliAdapter {
    binary: String,
    target_org: String,
    api_version: String,
}

impl SfCliAdapter {
    pub fn new(
        binary: impl Into<String>,
        target_org: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            target_org: target_org.into(),
            api_version: api_version.into(),
        }
    }

    /// Checks that the configured binary runs at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Runs `sf <args> --target-org <org> --json` and returns `result`.
    fn run(&self, args: &[&str]) -> ConnectorResult<Value> {
        debug!("{} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .args(["--target-org", self.target_org.as_str(), "--json"])
            .env("SF_DISABLE_AUTOUPDATE", "true")
            .output()
            .map_err(|e| ConnectorError::Command(format!("failed to run {}: {}", self.binary, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify("", stderr.trim()));
        }
        parse_envelope(&stdout)
    }

    fn query_with(&self, soql: &str, tooling: bool) -> ConnectorResult<Value> {
        let mut args = vec!["data", "query", "--query", soql];
        if tooling {
            args.push("--use-tooling-api");
        }
        self.run(&args)
    }
}

impl OrgConnector for SfCliAdapter {
    fn org_info(&self) -> ConnectorResult<OrgInfo> {
        parse_org_info(&self.run(&["org", "display"])?)
    }

    fn query(&self, soql: &str) -> ConnectorResult<Vec<Record>> {
        parse_records(&self.query_with(soql, false)?)
    }

    fn tooling_query(&self, soql: &str) -> ConnectorResult<Vec<Record>> {
        parse_records(&self.query_with(soql, true)?)
    }

    fn query_count(&self, soql: &str) -> ConnectorResult<u64> {
        let result = self.query_with(soql, false)?;
        result
            .get("totalSize")
            .and_then(Value::as_u64)
            .ok_or_else(|| ConnectorError::Query(format!("no totalSize in count result for {}", soql)))
    }

    fn retrieve_metadata(
        &self,
        components: &[MetadataComponent],
    ) -> ConnectorResult<Vec<MetadataFile>> {
        let dir = tempfile::tempdir().map_err(io_error)?;
        let manifest = dir.path().join("package.xml");
        std::fs::write(&manifest, manifest_xml(components, &self.api_version)).map_err(io_error)?;
        let target = dir.path().join("retrieved");
        let manifest_arg = manifest.to_string_lossy().into_owned();
        let target_arg = target.to_string_lossy().into_owned();

        self.run(&[
            "project",
            "retrieve",
            "start",
            "--manifest",
            &manifest_arg,
            "--target-metadata-dir",
            &target_arg,
            "--unzip",
            "--wait",
            WAIT_MINUTES,
        ])?;

        let mut files = Vec::new();
        for path in walk(&target).map_err(io_error)? {
            let rel = package_relative(&target, &path);
            if rel == "package.xml" {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(io_error)?;
            files.push(MetadataFile { path: rel, content });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        info!("Retrieved {} metadata file(s)", files.len());
        Ok(files)
    }

    fn deploy_metadata(&self, files: &[MetadataFile]) -> ConnectorResult<DeployResult> {
        let dir = tempfile::tempdir().map_err(io_error)?;
        for file in files {
            let path = dir.path().join(&file.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
            std::fs::write(&path, &file.content).map_err(io_error)?;
        }
        let dir_arg = dir.path().to_string_lossy().into_owned();
        let result = self.run(&[
            "project",
            "deploy",
            "start",
            "--metadata-dir",
            &dir_arg,
            "--wait",
            WAIT_MINUTES,
        ]);
        match result {
            Ok(value) => Ok(parse_deploy_result(&value)),
            // component failures come back as a non-zero status with a result
            Err(ConnectorError::Metadata(detail)) => Ok(DeployResult {
                success: false,
                components: vec![],
                error_message: Some(detail),
            }),
            Err(e) => Err(e),
        }
    }

    fn bulk_load(&self, csv_path: &Path, object: &ObjectDescriptor) -> ConnectorResult<LoadResult> {
        let file_arg = csv_path.to_string_lossy().into_owned();
        let args = [
            "data",
            "import",
            "bulk",
            "--sobject",
            object.sobject.as_str(),
            "--file",
            file_arg.as_str(),
            "--wait",
            WAIT_MINUTES,
        ];
        info!("Bulk loading {} into {}", csv_path.display(), object.sobject);
        parse_load_result(&self.run(&args)?)
    }
}

fn io_error(e: std::io::Error) -> ConnectorError {
    ConnectorError::Command(e.to_string())
}

/// Maps a CLI error name (or, failing that, its message) to an error kind.
pub fn classify(name: &str, message: &str) -> ConnectorError {
    let haystack = format!("{} {}", name, message);
    let detail = if name.is_empty() {
        message.to_string()
    } else {
        format!("{}: {}", name, message)
    };
    let has = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

    if has(&["REQUEST_LIMIT_EXCEEDED", "ConcurrentRequestLimit", "TooManyRequests"]) {
        ConnectorError::RateLimited(detail)
    } else if has(&[
        "INVALID_SESSION_ID",
        "NoAuthInfoFound",
        "NamedOrgNotFound",
        "NoOrgFound",
        "expired access/refresh token",
    ]) {
        ConnectorError::Auth(detail)
    } else if has(&["ECONNRESET", "ETIMEDOUT", "ENOTFOUND", "ECONNREFUSED", "socket hang up"]) {
        ConnectorError::Network(detail)
    } else if has(&["MALFORMED_QUERY", "INVALID_FIELD", "INVALID_TYPE", "INVALID_QUERY"]) {
        ConnectorError::Query(detail)
    } else if has(&["FailedDeploy", "DeployFailed", "RetrieveFailed"]) {
        ConnectorError::Metadata(detail)
    } else {
        ConnectorError::Command(detail)
    }
}

/// Unwraps the `--json` envelope into its `result`.
pub fn parse_envelope(stdout: &str) -> ConnectorResult<Value> {
    let envelope: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| ConnectorError::Command(format!("unparseable sf output: {}", e)))?;
    let status = envelope.get("status").and_then(Value::as_i64).unwrap_or(1);
    if status == 0 {
        return Ok(envelope.get("result").cloned().unwrap_or(Value::Null));
    }
    let name = envelope.get("name").and_then(Value::as_str).unwrap_or_default();
    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("sf command failed");
    // failed deploys carry their component failures in `result`
    if let Some(result) = envelope.get("result").filter(|r| r.get("details").is_some()) {
        let summary = parse_deploy_result(result);
        if !summary.components.is_empty() {
            return Err(ConnectorError::Metadata(summary.failure_summary()));
        }
    }
    Err(classify(name, message))
}

pub fn parse_org_info(result: &Value) -> ConnectorResult<OrgInfo> {
    let text = |key: &str| result.get(key).and_then(Value::as_str).map(str::to_string);
    let org_id = text("id").ok_or_else(|| ConnectorError::Command("org display returned no id".into()))?;
    Ok(OrgInfo {
        org_id,
        username: text("username").unwrap_or_default(),
        alias: text("alias"),
        login_url: text("loginUrl").unwrap_or_default(),
        instance_url: text("instanceUrl").unwrap_or_default(),
    })
}

pub fn parse_records(result: &Value) -> ConnectorResult<Vec<Record>> {
    let records = result
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| ConnectorError::Query("query result has no records".into()))?;
    Ok(records
        .iter()
        .filter_map(|r| r.as_object().cloned())
        .collect())
}

/// `details.componentFailures` may be a single object or an array.
fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v @ Value::Object(_)) => vec![v],
        _ => vec![],
    }
}

pub fn parse_deploy_result(result: &Value) -> DeployResult {
    let details = result.get("details");
    let component = |c: &Value, success: bool| ComponentResult {
        component_type: c
            .get("componentType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        full_name: c
            .get("fullName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        success,
        problem: c.get("problem").and_then(Value::as_str).map(str::to_string),
    };
    let mut components: Vec<ComponentResult> =
        as_list(details.and_then(|d| d.get("componentSuccesses")))
            .into_iter()
            .map(|c| component(c, true))
            .filter(|c| c.full_name != "package.xml")
            .collect();
    components.extend(
        as_list(details.and_then(|d| d.get("componentFailures")))
            .into_iter()
            .map(|c| component(c, false)),
    );
    let success = result
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        && components.iter().all(|c| c.success);
    DeployResult {
        success,
        components,
        error_message: result
            .get("errorMessage")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

pub fn parse_load_result(result: &Value) -> ConnectorResult<LoadResult> {
    let count = |key: &str| result.get(key).and_then(Value::as_u64).unwrap_or(0);
    let failed = count("failedRecords");
    let processed = match result.get("processedRecords").and_then(Value::as_u64) {
        Some(n) => n,
        None => count("successfulRecords") + failed,
    };
    Ok(LoadResult {
        job_id: result.get("jobId").and_then(Value::as_str).map(str::to_string),
        records_processed: processed,
        records_failed: failed,
        success: failed == 0,
    })
}

/// `package.xml` naming the components to retrieve.
pub fn manifest_xml(components: &[MetadataComponent], api_version: &str) -> String {
    let mut by_type: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for c in components {
        by_type
            .entry(c.component_type.as_str())
            .or_default()
            .push(c.full_name.as_str());
    }
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(out, "<Package xmlns=\"{}\">", METADATA_NAMESPACE);
    for (component_type, mut members) in by_type {
        members.sort_unstable();
        out.push_str("    <types>\n");
        for m in members {
            let _ = writeln!(out, "        <members>{}</members>", escape_xml(m));
        }
        let _ = writeln!(out, "        <name>{}</name>", escape_xml(component_type));
        out.push_str("    </types>\n");
    }
    let _ = writeln!(out, "    <version>{}</version>", escape_xml(api_version));
    out.push_str("</Package>\n");
    out
}

fn walk(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(walk(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

/// Path below the retrieve root, without the `unpackaged/` wrapper.
fn package_relative(root: &Path, path: &Path) -> String {
    let parts: Vec<String> = path
        .strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let parts = match parts.first().map(String::as_str) {
        Some("unpackaged") => &parts[1..],
        _ => &parts[..],
    };
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            classify("REQUEST_LIMIT_EXCEEDED", "ConcurrentPerOrgLongTxn Limit exceeded"),
            ConnectorError::RateLimited(_)
        ));
        assert!(matches!(
            classify("INVALID_SESSION_ID", "Session expired or invalid"),
            ConnectorError::Auth(_)
        ));
        assert!(matches!(
            classify("NoAuthInfoFound", "No authorization information found"),
            ConnectorError::Auth(_)
        ));
        assert!(matches!(
            classify("", "request to https://x failed, reason: read ECONNRESET"),
            ConnectorError::Network(_)
        ));
        assert!(matches!(
            classify("MALFORMED_QUERY", "unexpected token"),
            ConnectorError::Query(_)
        ));
        assert!(matches!(classify("SomethingElse", "boom"), ConnectorError::Command(_)));
    }

    #[test]
    fn test_envelope() {
        let ok = parse_envelope(r#"{"status":0,"result":{"totalSize":3}}"#).unwrap();
        assert_eq!(ok["totalSize"], 3);

        let err = parse_envelope(
            r#"{"status":1,"name":"INVALID_SESSION_ID","message":"Session expired"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConnectorError::Auth("INVALID_SESSION_ID: Session expired".into())
        );
        assert!(matches!(parse_envelope("not json"), Err(ConnectorError::Command(_))));
    }

    #[test]
    fn test_failed_deploy_envelope_is_metadata_error() {
        let stdout = json!({
            "status": 1,
            "name": "FailedDeploy",
            "message": "Deploy failed.",
            "result": {
                "success": false,
                "details": {
                    "componentFailures": {
                        "componentType": "Territory2",
                        "fullName": "IMPORTED_TERRITORY.West",
                        "problem": "Invalid access level"
                    }
                }
            }
        })
        .to_string();
        match parse_envelope(&stdout) {
            Err(ConnectorError::Metadata(detail)) => assert!(detail.contains("Invalid access level")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_org_info_and_records() {
        let info = parse_org_info(&json!({
            "id": "00D000000000001EAA",
            "username": "admin@example.com",
            "alias": "source",
            "instanceUrl": "https://example.my.salesforce.com"
        }))
        .unwrap();
        assert_eq!(info.org_id, "00D000000000001EAA");
        assert_eq!(info.alias.as_deref(), Some("source"));
        assert_eq!(info.login_url, "");

        let records = parse_records(&json!({
            "totalSize": 1,
            "records": [{"attributes": {"type": "Territory"}, "Id": "T01"}]
        }))
        .unwrap();
        assert_eq!(records[0]["Id"], "T01");
        assert!(parse_records(&json!({})).is_err());
    }

    #[test]
    fn test_deploy_result_mixed() {
        let result = parse_deploy_result(&json!({
            "success": false,
            "details": {
                "componentSuccesses": [
                    {"componentType": "", "fullName": "package.xml"},
                    {"componentType": "Territory2Model", "fullName": "IMPORTED_TERRITORY"}
                ],
                "componentFailures": [
                    {"componentType": "Territory2", "fullName": "IMPORTED_TERRITORY.East", "problem": "bad"}
                ]
            }
        }));
        assert!(!result.success);
        assert_eq!(result.components.len(), 2);
        assert_eq!(result.failure_summary(), "Territory2 IMPORTED_TERRITORY.East: bad");
    }

    #[test]
    fn test_load_result() {
        let result = parse_load_result(&json!({
            "jobId": "750000000000001",
            "processedRecords": 25,
            "successfulRecords": 24,
            "failedRecords": 1
        }))
        .unwrap();
        assert_eq!(result.records_processed, 25);
        assert!(!result.success);

        let result = parse_load_result(&json!({"successfulRecords": 3, "failedRecords": 0})).unwrap();
        assert_eq!(result.records_processed, 3);
        assert!(result.success);
    }

    #[test]
    fn test_manifest() {
        let xml = manifest_xml(
            &[
                MetadataComponent::new("SharingRules", "Lead"),
                MetadataComponent::new("SharingRules", "Account"),
            ],
            "60.0",
        );
        assert!(xml.contains("<members>Account</members>\n        <members>Lead</members>"));
        assert!(xml.contains("<name>SharingRules</name>"));
        assert!(xml.contains("<version>60.0</version>"));
    }

    #[test]
    fn test_package_relative_strips_unpackaged() {
        let root = Path::new("/tmp/r");
        assert_eq!(
            package_relative(root, Path::new("/tmp/r/unpackaged/sharingRules/Account.sharingRules")),
            "sharingRules/Account.sharingRules"
        );
        assert_eq!(
            package_relative(root, Path::new("/tmp/r/sharingRules/Lead.sharingRules")),
            "sharingRules/Lead.sharingRules"
        );
    }
}
