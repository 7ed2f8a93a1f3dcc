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

//! Counts TM1 records with aggregate queries, one per entity, fanned out
//! over the worker pool.

use crate::application::runtime::{first_error, RuntimeContext};
use crate::domain::entities::{Tm1Entity, Tm1RecordCounts};
use crate::domain::errors::Result;
use crate::ports::org_port::OrgConnector;
use log::debug;
use std::sync::Arc;

pub struct RecordCounter {
    connector: Arc<dyn OrgConnector>,
    runtime: RuntimeContext,
}

impl RecordCounter {
    pub fn new(connector: Arc<dyn OrgConnector>, runtime: RuntimeContext) -> Self {
        Self { connector, runtime }
    }

    /// Counts every entity in `entities`. Any failure fails the whole count:
    /// a partial snapshot would be reconciled against later as if complete.
    pub fn count_all(&self, entities: &[Tm1Entity]) -> Result<Tm1RecordCounts> {
        let results = self
            .runtime
            .fan_out(entities, |e| self.connector.query_count(&e.count_query()));
        let counts = first_error(results, |i| format!("Counting {}", entities[i]))?;

        let mut snapshot = Tm1RecordCounts::default();
        for (entity, count) in entities.iter().zip(counts) {
            debug!("{}: {} record(s)", entity, count);
            snapshot.set(*entity, count);
        }
        Ok(snapshot)
    }
}
