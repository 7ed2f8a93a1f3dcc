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

//! Core error definitions for the territory migrator.
//!
//! Two enums live here:
//! - `ConnectorError` is what an org connector hands back. Its variants are
//!   the distinguishable kinds a connector must surface (auth, rate limit,
//!   network, ...).
//! - `MigrationError` is what every stage returns. Connector errors are
//!   wrapped with the stage/operation that was running when they happened.

use thiserror::Error;

/// Errors surfaced by an `OrgConnector` implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited by the org: {0}")]
    RateLimited(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("metadata operation failed: {0}")]
    Metadata(String),

    #[error("connector command failed: {0}")]
    Command(String),
}

impl ConnectorError {
    /// Too many concurrent requests is the only condition the pipeline may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::RateLimited(_))
    }
}

/// The error kinds a stage can fail with. `Precondition` errors abort the
/// run from any task bundle; the others abort only from a fatal bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing/invalid prior report, org mismatch, inactive target model.
    Precondition,
    /// A single item could not be processed and was skipped.
    PartialOperation,
    /// A deploy or load sub-task failed.
    StageTask,
    /// Auth, rate limiting or network failure reported by the connector.
    Connector,
    /// Local I/O, serialization or configuration problems.
    Internal,
}

/// Error types encountered while running a migration stage.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Org mismatch: report was produced for org {expected} but connected org is {actual}")]
    OrgMismatch { expected: String, actual: String },

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Invalid report {path}: {reason}")]
    InvalidReport { path: String, reason: String },

    #[error("{context}: {source}")]
    Connector {
        context: String,
        #[source]
        source: ConnectorError,
    },

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Item skipped: {0}")]
    Skipped(String),

    #[error("Transformation error: {0}")]
    Transform(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline aborted: {0}")]
    Aborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MigrationError {
    /// Wraps a connector error with the operation that was running.
    pub fn connector(context: impl Into<String>, source: ConnectorError) -> Self {
        MigrationError::Connector {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Precondition(_)
            | MigrationError::OrgMismatch { .. }
            | MigrationError::ReportNotFound(_)
            | MigrationError::InvalidReport { .. }
            | MigrationError::Aborted(_) => ErrorKind::Precondition,
            MigrationError::Skipped(_) => ErrorKind::PartialOperation,
            MigrationError::TaskFailed(_) => ErrorKind::StageTask,
            MigrationError::Connector { .. } => ErrorKind::Connector,
            MigrationError::Transform(_)
            | MigrationError::Config(_)
            | MigrationError::Io(_)
            | MigrationError::Json(_)
            | MigrationError::Csv(_) => ErrorKind::Internal,
        }
    }
}

/// A specialized Result type for the migrator.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Result type returned by org connector calls.
pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;
