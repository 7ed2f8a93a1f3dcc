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

//! # Runtime Context
//!
//! This module is the "Engine Room" of a stage. It owns the worker pool that
//! bounds how many calls we have in flight against the org at once.
//!
//! 1. **Thread Pool**: a dedicated `rayon` pool, sized once per invocation.
//! 2. **CPU Scaling**: if no explicit concurrency is configured, a percentage
//!    of the local cores is used.
//! 3. **Rate Limits**: Salesforce rejects bursts with `REQUEST_LIMIT_EXCEEDED`.
//!    Calls that come back rate-limited are requeued and run again one at a
//!    time, after the parallel pass has drained.

use crate::domain::errors::{ConnectorResult, MigrationError, Result};
use log::{info, warn};
use rayon::prelude::*;
use std::sync::Arc;

/// How many serial passes a rate-limited call gets after the parallel pass.
const RATE_LIMIT_REQUEUES: usize = 2;

/// `RuntimeContext` holds the resources shared by every task of a stage.
#[derive(Clone)]
pub struct RuntimeContext {
    /// `Arc` so the context can be cloned into collaborators cheaply.
    pub pool: Arc<rayon::ThreadPool>,
    /// The number of calls we allow in flight at once.
    pub num_threads: usize,
}

impl RuntimeContext {
    /// Builds the worker pool.
    ///
    /// `concurrency` wins when set. Otherwise we take `cpu_percent` (default
    /// 50%) of the local cores, always at least one thread.
    pub fn init(concurrency: Option<usize>, cpu_percent: Option<u8>) -> Result<Self> {
        let cpu_percent = cpu_percent.unwrap_or(50);
        let total_cpus = num_cpus::get();
        let num_threads = concurrency
            .unwrap_or_else(|| (total_cpus as f64 * (cpu_percent as f64 / 100.0)).ceil() as usize);
        let num_threads = std::cmp::max(1, num_threads);

        info!(
            "Initializing worker pool with {} threads (Target CPU: {}%)",
            num_threads, cpu_percent
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("tm-worker-{}", i))
            .build()
            .map_err(|e| MigrationError::Config(format!("Failed to build worker pool: {}", e)))?;

        Ok(Self {
            pool: Arc::new(pool),
            num_threads,
        })
    }

    /// Runs `task` for every item on the pool and returns the results in
    /// input order.
    ///
    /// Results are collected only after each task completed, so callers can
    /// fold them into a report without any locking. Rate-limited results are
    /// retried serially; every other error is returned as is.
    pub fn fan_out<I, T, F>(&self, items: &[I], task: F) -> Vec<ConnectorResult<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> ConnectorResult<T> + Sync,
    {
        let mut results: Vec<ConnectorResult<T>> =
            self.pool.install(|| items.par_iter().map(&task).collect());

        for pass in 1..=RATE_LIMIT_REQUEUES {
            let limited: Vec<usize> = results
                .iter()
                .enumerate()
                .filter(|(_, r)| matches!(r, Err(e) if e.is_retryable()))
                .map(|(i, _)| i)
                .collect();
            if limited.is_empty() {
                break;
            }
            warn!(
                "{} call(s) were rate limited; requeueing serially (pass {}/{})",
                limited.len(),
                pass,
                RATE_LIMIT_REQUEUES
            );
            for i in limited {
                results[i] = task(&items[i]);
            }
        }
        results
    }
}

/// A context for tests: two threads, independent of the machine.
#[cfg(test)]
pub fn test_runtime() -> RuntimeContext {
    RuntimeContext::init(Some(2), None).unwrap()
}

/// Keeps the first error of a batch, wrapped with `context`.
pub fn first_error<T>(
    results: Vec<ConnectorResult<T>>,
    context: impl Fn(usize) -> String,
) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(results.len());
    for (i, r) in results.into_iter().enumerate() {
        match r {
            Ok(v) => out.push(v),
            Err(e) => return Err(MigrationError::connector(context(i), e)),
        }
    }
    Ok(out)
}
