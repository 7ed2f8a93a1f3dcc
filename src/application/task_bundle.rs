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

//! # Task Bundles
//!
//! Every step of a stage that does real work runs inside a bundle:
//!
//! 1. the pre-message is announced,
//! 2. the task runs,
//! 3. exactly one status record is emitted: `SUCCESS`, or on failure
//!    `WARNING` (the run continues) or `ERROR` (the error is handed back to
//!    abort the run).
//!
//! A failure aborts when the bundle is marked `throw_on_failure`, or when
//! the error is a precondition failure: a missing or invalid report, an org
//! mismatch or an inactive model abort whatever bundle they surface in.
//!
//! A `StatusLog` is the single owner of a stage's status records. Bundles
//! append to it; the stage copies it into its report at the end.

use crate::domain::entities::{overall_severity, Severity, StatusRecord};
use crate::domain::errors::{ErrorKind, Result};
use crate::ports::status_port::StatusSink;
use log::{error, info, warn};
use std::sync::Arc;

/// Collects status records and forwards each one to the sink as it arrives.
pub struct StatusLog {
    sink: Arc<dyn StatusSink>,
    records: Vec<StatusRecord>,
}

impl StatusLog {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, record: StatusRecord) {
        self.sink.emit(&record);
        self.records.push(record);
    }

    pub fn announce(&self, message: &str) {
        info!("{}", message);
        self.sink.announce(message);
    }

    pub fn confirm(&self, prompt: &str) -> bool {
        self.sink.confirm(prompt)
    }

    pub fn records(&self) -> &[StatusRecord] {
        &self.records
    }

    pub fn severity(&self) -> Severity {
        overall_severity(&self.records)
    }

    pub fn into_records(self) -> Vec<StatusRecord> {
        self.records
    }
}

/// A unit of pipeline work with its messaging.
pub struct TaskBundle {
    title: String,
    pre_message: String,
    throw_on_failure: bool,
}

impl TaskBundle {
    pub fn new(title: impl Into<String>, pre_message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pre_message: pre_message.into(),
            throw_on_failure: false,
        }
    }

    /// Marks the bundle fatal: a failure aborts the whole run.
    pub fn throw_on_failure(mut self, fatal: bool) -> Self {
        self.throw_on_failure = fatal;
        self
    }

    /// Runs `task`. On success it returns the value and the message for the
    /// `SUCCESS` record.
    ///
    /// Returns `Ok(Some(value))` on success, `Ok(None)` after a non-fatal
    /// failure and `Err` after a fatal one.
    pub fn run<T, F>(self, log: &mut StatusLog, task: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Result<(T, String)>,
    {
        log.announce(&self.pre_message);
        match task() {
            Ok((value, message)) => {
                info!("{}: {}", self.title, message);
                log.record(StatusRecord::new(Severity::Success, self.title, message));
                Ok(Some(value))
            }
            Err(e) if self.throw_on_failure || e.kind() == ErrorKind::Precondition => {
                error!("{} failed: {}", self.title, e);
                log.record(StatusRecord::new(
                    Severity::Error,
                    self.title,
                    e.to_string(),
                ));
                Err(e)
            }
            Err(e) => {
                warn!("{} failed, continuing: {}", self.title, e);
                log.record(StatusRecord::new(
                    Severity::Warning,
                    self.title,
                    e.to_string(),
                ));
                Ok(None)
            }
        }
    }

    /// Records that the bundle was not attempted. Emits a `WARNING` titled
    /// "<title> skipped" instead of running anything.
    pub fn skip(self, log: &mut StatusLog, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{} skipped: {}", self.title, reason);
        log.record(StatusRecord::new(
            Severity::Warning,
            format!("{} skipped", self.title),
            reason,
        ));
    }
}
