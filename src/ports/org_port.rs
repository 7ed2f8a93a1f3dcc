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

//! # Org Port
//!
//! In Hexagonal Architecture, a **Port** is a contract. This one describes
//! what the pipeline needs from a Salesforce org: queries, metadata
//! retrieve/deploy and bulk data loads.
//!
//! The pipeline never cares *how* the org is reached. The production adapter
//! shells out to the `sf` CLI; tests plug in a mock that counts calls.

use crate::domain::entities::{
    DeployResult, LoadResult, MetadataComponent, MetadataFile, ObjectDescriptor, OrgInfo, Record,
};
use crate::domain::errors::ConnectorResult;
use std::path::Path;

/// Authenticated access to one org.
///
/// Implementations must be `Send + Sync`: stages fan independent calls out
/// over a worker pool. Rate limiting must come back as
/// `ConnectorError::RateLimited` so the caller can requeue the call, and
/// expired sessions as `ConnectorError::Auth`.
pub trait OrgConnector: Send + Sync {
    /// Identity of the org this connector is authenticated against.
    fn org_info(&self) -> ConnectorResult<OrgInfo>;

    /// Runs a SOQL query and returns every row.
    fn query(&self, soql: &str) -> ConnectorResult<Vec<Record>>;

    /// Same as `query`, against the Tooling API.
    fn tooling_query(&self, soql: &str) -> ConnectorResult<Vec<Record>>;

    /// Runs an aggregate `SELECT COUNT() ...` query.
    fn query_count(&self, soql: &str) -> ConnectorResult<u64>;

    /// Retrieves metadata components. Returned paths are relative to the
    /// package root, e.g. `sharingRules/Account.sharingRules`.
    fn retrieve_metadata(&self, components: &[MetadataComponent])
        -> ConnectorResult<Vec<MetadataFile>>;

    /// Deploys a package (including its `package.xml`) and waits for the result.
    fn deploy_metadata(&self, files: &[MetadataFile]) -> ConnectorResult<DeployResult>;

    /// Bulk-loads a CSV file into `object` and waits for the job to finish.
    fn bulk_load(&self, csv_path: &Path, object: &ObjectDescriptor) -> ConnectorResult<LoadResult>;
}
