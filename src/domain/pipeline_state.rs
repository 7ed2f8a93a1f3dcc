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

//! # Pipeline States
//!
//! The migration moves through a fixed sequence of states:
//!
//! `NOT_STARTED → ANALYZED → EXTRACTED → TRANSFORMED → DEPLOY_VALIDATED →
//! DEPLOYED → LOADED → REPORTED`
//!
//! `ABORTED` is reachable from any non-terminal state. `REPORTED` may also be
//! reached straight from `DEPLOY_VALIDATED` or `DEPLOYED` when a non-fatal
//! task failed and the remaining work was skipped.

use crate::domain::errors::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    NotStarted,
    Analyzed,
    Extracted,
    Transformed,
    DeployValidated,
    Deployed,
    Loaded,
    Reported,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Reported | PipelineState::Aborted)
    }

    pub fn allowed_transitions(&self) -> Vec<PipelineState> {
        use PipelineState::*;
        match self {
            NotStarted => vec![Analyzed, Aborted],
            Analyzed => vec![Extracted, Aborted],
            Extracted => vec![Transformed, Aborted],
            Transformed => vec![DeployValidated, Aborted],
            DeployValidated => vec![Deployed, Reported, Aborted],
            Deployed => vec![Loaded, Reported, Aborted],
            Loaded => vec![Reported, Aborted],
            Reported => vec![],
            Aborted => vec![],
        }
    }

    pub fn can_transition_to(&self, to: PipelineState) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::NotStarted => "NOT_STARTED",
            PipelineState::Analyzed => "ANALYZED",
            PipelineState::Extracted => "EXTRACTED",
            PipelineState::Transformed => "TRANSFORMED",
            PipelineState::DeployValidated => "DEPLOY_VALIDATED",
            PipelineState::Deployed => "DEPLOYED",
            PipelineState::Loaded => "LOADED",
            PipelineState::Reported => "REPORTED",
            PipelineState::Aborted => "ABORTED",
        };
        write!(f, "{}", s)
    }
}

/// Tracks one invocation's walk through the state machine.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    state: PipelineState,
}

impl PipelineRun {
    /// Starts a run at `state`, e.g. `TRANSFORMED` once the input reports
    /// of a later stage have been validated.
    pub fn resume(state: PipelineState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Moves to `to`, rejecting transitions the state machine does not allow.
    pub fn advance(&mut self, to: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(MigrationError::Precondition(format!(
                "illegal pipeline transition {} -> {}",
                self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Moves to `ABORTED`. A no-op if the run already finished.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = PipelineState::Aborted;
        }
    }
}
