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

//! # Artifact Port
//!
//! Turns a translated plan into deployable metadata files. The orchestrator
//! only sees `MetadataFile` values; the XML shape of Territory2 metadata is
//! the adapter's business.

use crate::domain::entities::MetadataFile;
use crate::domain::errors::Result;
use crate::domain::mapping::Tm2Plan;
use crate::domain::sharing_rules::ObjectSharingRules;

pub trait ArtifactPort: Send + Sync {
    /// Model, type, territories and rules, plus the `package.xml` listing them.
    fn territory_package(&self, plan: &Tm2Plan) -> Result<Vec<MetadataFile>>;

    /// Sharing rules plus their `package.xml`.
    fn sharing_rules_package(&self, rules: &[ObjectSharingRules]) -> Result<Vec<MetadataFile>>;
}
