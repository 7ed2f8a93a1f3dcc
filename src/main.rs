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

//! # TM1 to TM2 Territory Migrator
//!
//! Migrates a Salesforce org from Territory Management 1.0 to Territory
//! Management 2.0 in five independently re-runnable stages:
//! `analyze`, `extract`, `transform`, `deploy` and `load`. Each stage reads
//! the reports of the stages before it from the output directory and writes
//! its own.
//!
//! This application follows the **Hexagonal Architecture** (Ports and Adapters)
//! to maintain a strict separation between migration logic and the org.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;

use crate::application::analyzer::run_analyze;
use crate::application::context::StageContext;
use crate::application::deployer::run_deploy;
use crate::application::extractor::run_extract;
use crate::application::orchestrator::LoadOrchestrator;
use crate::application::runtime::RuntimeContext;
use crate::application::status::{pipeline_status, ReportPresence};
use crate::application::transformer::run_transform;
use crate::config::{AppConfig, CliArgs, Commands};
use crate::domain::entities::Severity;
use crate::domain::errors::{MigrationError, Result};
use crate::infrastructure::artifacts::metadata_xml_adapter::MetadataXmlAdapter;
use crate::infrastructure::console::console_status_sink::ConsoleStatusSink;
use crate::infrastructure::local_storage::directory_layout::DirectoryLayout;
use crate::infrastructure::local_storage::local_file_store::LocalFileStore;
use crate::infrastructure::sf_cli::sf_cli_adapter::SfCliAdapter;
use crate::ports::org_port::OrgConnector;
use clap::Parser;
use log::{error, info, warn};
use std::process;
use std::sync::Arc;

fn main() {
    // 1. Initialize Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config
    let mut config = if let Some(config_path) = &args.config {
        match AppConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config: {}", e);
                process::exit(1);
            }
        }
    } else {
        AppConfig::default()
    };

    // Merge CLI overrides
    config.merge_cli(&args);

    if let Err(e) = config.validate(args.command.needs_org()) {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    match run(&args.command, &config) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{:?} failed: {}", args.command, e);
            process::exit(1);
        }
    }
}

/// Runs one stage. `Ok(false)` means the report was written but records a
/// failure the exit code must reflect.
fn run(command: &Commands, config: &AppConfig) -> Result<bool> {
    // 4. Setup Parallelism
    let runtime = RuntimeContext::init(config.pipeline.concurrency, config.pipeline.cpu_percent)?;

    // 5. Initialize Hexagonal Components
    let store = Arc::new(LocalFileStore::new());
    let ctx = StageContext {
        paths: Arc::new(DirectoryLayout::new(&config.pipeline.output_dir)),
        reports: store.clone(),
        workspace: store,
        status: Arc::new(ConsoleStatusSink::stdio()),
        runtime,
        settings: config.pipeline_settings(),
    };
    let connector = || -> Result<Arc<dyn OrgConnector>> {
        let sf = SfCliAdapter::new(
            config.org.sf_binary.clone(),
            config.org.target_org.clone(),
            config.org.api_version.clone(),
        );
        if !sf.is_available() {
            return Err(MigrationError::Config(format!(
                "`{}` not found; install the Salesforce CLI or set org.sf_binary",
                config.org.sf_binary
            )));
        }
        Ok(Arc::new(sf))
    };
    let artifacts = Arc::new(MetadataXmlAdapter::new(config.org.api_version.clone()));

    // 6. Run the stage
    info!("Output directory: {}", config.pipeline.output_dir);
    match command {
        Commands::Analyze => {
            let report = run_analyze(&ctx, connector()?)?;
            info!(
                "Analysis finished: {} territories, {} hard dependencies",
                report.record_counts.territory, report.hard_dependencies.dependency_count
            );
            Ok(true)
        }
        Commands::Extract => {
            let report = run_extract(&ctx, connector()?)?;
            info!(
                "Extraction finished: {} file(s), {} discrepancies",
                report.files.len(),
                report.discrepancies.len()
            );
            Ok(true)
        }
        Commands::Transform { offline } => {
            let connector = if *offline { None } else { Some(connector()?) };
            let report = run_transform(&ctx, artifacts.as_ref(), connector)?;
            info!(
                "Transformation finished: {} Territory2, {} untranslatable",
                report.territory2_count, report.untranslatable_count
            );
            Ok(true)
        }
        Commands::Deploy => {
            let report = run_deploy(&ctx, connector()?)?;
            Ok(report.success)
        }
        Commands::Load { .. } => {
            let report = LoadOrchestrator::new(&ctx, connector()?, artifacts).run()?;
            if report.status != Severity::Success {
                warn!("Load finished with status {:?}", report.status);
            }
            Ok(report.status != Severity::Error)
        }
        Commands::Status => {
            let status = pipeline_status(&ctx)?;
            for entry in &status.reports {
                let presence = match &entry.presence {
                    ReportPresence::Missing => "missing".to_string(),
                    ReportPresence::Valid => "ok".to_string(),
                    ReportPresence::Invalid(reason) => format!("invalid ({})", reason),
                };
                info!(
                    "{:<14} {} {}",
                    format!("{:?}", entry.report_type),
                    entry.path.display(),
                    presence
                );
            }
            info!("Pipeline state: {}", status.state);
            Ok(true)
        }
    }
}
