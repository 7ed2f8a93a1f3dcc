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

//! Pure migration logic: entities, reports, translation rules and the
//! pipeline state machine. Nothing in here touches the org or the disk.

pub mod entities;
pub mod errors;
pub mod mapping;
pub mod pipeline_state;
pub mod reconcile;
pub mod reports;
pub mod sharing_rules;
