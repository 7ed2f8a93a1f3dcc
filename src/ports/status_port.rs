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

use crate::domain::entities::StatusRecord;

/// Receives the user-facing progress of a stage.
pub trait StatusSink: Send + Sync {
    /// A task bundle is about to start.
    fn announce(&self, message: &str);

    /// A task bundle finished. Called exactly once per bundle.
    fn emit(&self, record: &StatusRecord);

    /// Asks the operator to approve an irreversible step. Sinks that cannot
    /// ask anyone decline.
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}
