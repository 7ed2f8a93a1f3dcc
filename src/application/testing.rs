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

//! Hand-written mock org shared by the stage tests.

use crate::domain::entities::{
    ComponentResult, DeployResult, LoadResult, MetadataComponent, MetadataFile, ObjectDescriptor,
    OrgInfo, Record, Tm1Entity, Tm1RecordCounts,
};
use crate::domain::errors::{ConnectorError, ConnectorResult};
use crate::domain::reports::tests::org;
use crate::ports::org_port::OrgConnector;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Scripted org. Queries are answered by the first registered needle the
/// SOQL contains; everything it was asked is recorded.
#[derive(Default)]
pub struct MockOrg {
    org: Option<OrgInfo>,
    counts: Tm1RecordCounts,
    count_failures: HashMap<String, ConnectorError>,
    rows: Vec<(String, ConnectorResult<Vec<Record>>)>,
    tooling: Vec<(String, ConnectorResult<Vec<Record>>)>,
    sharing_rules: HashMap<String, String>,
    retrieve_failures: HashMap<String, ConnectorError>,
    deploy_results: Mutex<VecDeque<ConnectorResult<DeployResult>>>,
    bulk_failure: Option<ConnectorError>,
    calls: Mutex<Vec<String>>,
    pub deployed: Mutex<Vec<Vec<MetadataFile>>>,
    pub loaded: Mutex<Vec<(PathBuf, String, String)>>,
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

impl MockOrg {
    pub fn with_org(mut self, org: OrgInfo) -> Self {
        self.org = Some(org);
        self
    }

    pub fn with_counts(mut self, counts: Tm1RecordCounts) -> Self {
        self.counts = counts;
        self
    }

    pub fn failing_count(mut self, entity: &str, err: ConnectorError) -> Self {
        self.count_failures.insert(entity.to_string(), err);
        self
    }

    pub fn with_rows(mut self, needle: &str, rows: Vec<Value>) -> Self {
        self.rows
            .push((needle.to_string(), Ok(rows.into_iter().map(record).collect())));
        self
    }

    pub fn with_tooling(mut self, needle: &str, rows: Vec<Value>) -> Self {
        self.tooling
            .push((needle.to_string(), Ok(rows.into_iter().map(record).collect())));
        self
    }

    pub fn failing_tooling(mut self, needle: &str, err: ConnectorError) -> Self {
        self.tooling.push((needle.to_string(), Err(err)));
        self
    }

    pub fn with_sharing_rules(mut self, object: &str, xml: &str) -> Self {
        self.sharing_rules.insert(object.to_string(), xml.to_string());
        self
    }

    pub fn failing_retrieve(mut self, object: &str, err: ConnectorError) -> Self {
        self.retrieve_failures.insert(object.to_string(), err);
        self
    }

    /// Queues the result of the next deploy. Unqueued deploys succeed.
    pub fn with_deploy_result(self, result: ConnectorResult<DeployResult>) -> Self {
        if let Ok(mut queue) = self.deploy_results.lock() {
            queue.push_back(result);
        }
        self
    }

    pub fn failing_bulk_load(mut self, err: ConnectorError) -> Self {
        self.bulk_failure = Some(err);
        self
    }

    /// Number of calls made to `method`.
    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == method)
            .count()
    }

    fn track(&self, method: &str) {
        self.calls.lock().unwrap().push(method.to_string());
    }

    fn answer(
        table: &[(String, ConnectorResult<Vec<Record>>)],
        soql: &str,
    ) -> ConnectorResult<Vec<Record>> {
        table
            .iter()
            .find(|(needle, _)| soql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_else(|| Ok(vec![]))
    }
}

impl OrgConnector for MockOrg {
    fn org_info(&self) -> ConnectorResult<OrgInfo> {
        self.track("org_info");
        Ok(self.org.clone().unwrap_or_else(org))
    }

    fn query(&self, soql: &str) -> ConnectorResult<Vec<Record>> {
        self.track("query");
        Self::answer(&self.rows, soql)
    }

    fn tooling_query(&self, soql: &str) -> ConnectorResult<Vec<Record>> {
        self.track("tooling_query");
        Self::answer(&self.tooling, soql)
    }

    fn query_count(&self, soql: &str) -> ConnectorResult<u64> {
        self.track("query_count");
        let object = soql
            .split("FROM ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or_default();
        if let Some(err) = self.count_failures.get(object) {
            return Err(err.clone());
        }
        Ok(Tm1Entity::ALL
            .iter()
            .find(|e| e.api_name() == object)
            .map_or(0, |e| self.counts.get(*e)))
    }

    fn retrieve_metadata(
        &self,
        components: &[MetadataComponent],
    ) -> ConnectorResult<Vec<MetadataFile>> {
        self.track("retrieve_metadata");
        let mut files = Vec::new();
        for c in components {
            if let Some(err) = self.retrieve_failures.get(&c.full_name) {
                return Err(err.clone());
            }
            if let Some(xml) = self.sharing_rules.get(&c.full_name) {
                files.push(MetadataFile {
                    path: format!("sharingRules/{}.sharingRules", c.full_name),
                    content: xml.clone(),
                });
            }
        }
        Ok(files)
    }

    fn deploy_metadata(&self, files: &[MetadataFile]) -> ConnectorResult<DeployResult> {
        self.track("deploy_metadata");
        self.deployed.lock().unwrap().push(files.to_vec());
        if let Some(result) = self.deploy_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(DeployResult {
            success: true,
            components: files
                .iter()
                .filter(|f| f.path != "package.xml")
                .map(|f| ComponentResult {
                    component_type: f.path.split('/').next().unwrap_or_default().to_string(),
                    full_name: f.path.clone(),
                    success: true,
                    problem: None,
                })
                .collect(),
            error_message: None,
        })
    }

    fn bulk_load(&self, csv_path: &Path, object: &ObjectDescriptor) -> ConnectorResult<LoadResult> {
        self.track("bulk_load");
        let content = std::fs::read_to_string(csv_path).unwrap_or_default();
        let rows = content.lines().count().saturating_sub(1) as u64;
        self.loaded
            .lock()
            .unwrap()
            .push((csv_path.to_path_buf(), object.sobject.clone(), content));
        if let Some(err) = &self.bulk_failure {
            return Err(err.clone());
        }
        Ok(LoadResult {
            job_id: Some("750000000000001".into()),
            records_processed: rows,
            records_failed: 0,
            success: true,
        })
    }
}
