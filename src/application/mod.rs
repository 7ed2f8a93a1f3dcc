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

//! Stage runners and the services they share.

pub mod analyzer;
pub mod context;
pub mod csv_rows;
pub mod dependency_analyzer;
pub mod deployer;
pub mod extractor;
pub mod orchestrator;
pub mod record_counter;
pub mod runtime;
pub mod status;
pub mod task_bundle;
pub mod transformer;

#[cfg(test)]
pub mod testing;
