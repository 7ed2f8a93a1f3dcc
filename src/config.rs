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

//! Configuration: a YAML or JSON file, overridden by command-line flags.

use crate::application::context::PipelineSettings;
use crate::domain::errors::{MigrationError, Result};
use crate::domain::mapping::IMPORTED_MODEL;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub org: OrgConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OrgConfig {
    /// Alias or username known to the `sf` CLI.
    pub target_org: String,
    pub api_version: String,
    pub sf_binary: String,
}

impl Default for OrgConfig {
    fn default() -> Self {
        Self {
            target_org: String::new(),
            api_version: "60.0".to_string(),
            sf_binary: "sf".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: String,
    pub concurrency: Option<usize>,
    pub cpu_percent: Option<u8>,
    pub model_name: String,
    pub sharing_objects: Vec<String>,
    pub assume_yes: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            output_dir: "./tm-migration".to_string(),
            concurrency: None,
            cpu_percent: None,
            model_name: IMPORTED_MODEL.to_string(),
            sharing_objects: settings.sharing_objects,
            assume_yes: false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Migrates Territory Management 1.0 orgs to Territory Management 2.0", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Org alias or username
    #[arg(long, global = true)]
    pub target_org: Option<String>,

    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Maximum concurrent org calls
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[arg(long, global = true)]
    pub api_version: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Count TM1 records and find dependencies
    Analyze,
    /// Pull TM1 records and sharing rules to disk
    Extract,
    /// Translate the extracted files into a Territory2 package
    Transform {
        /// Do not contact the org to verify its identity
        #[arg(long)]
        offline: bool,
    },
    /// Deploy the Territory2 model package
    Deploy,
    /// Deploy sharing rules and load user associations (model must be active)
    Load {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show which stages have completed
    Status,
}

impl Commands {
    /// Whether the command talks to the org at all.
    pub fn needs_org(&self) -> bool {
        !matches!(
            self,
            Commands::Status | Commands::Transform { offline: true }
        )
    }
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| MigrationError::Config(format!("cannot open {}: {}", path, e)))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents)
                .map_err(|e| MigrationError::Config(format!("{}: {}", path, e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| MigrationError::Config(format!("{}: {}", path, e)))?
        };

        Ok(config)
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(o) = &args.target_org {
            self.org.target_org = o.clone();
        }
        if let Some(v) = &args.api_version {
            self.org.api_version = v.clone();
        }
        if let Some(o) = &args.output {
            self.pipeline.output_dir = o.clone();
        }
        if let Some(c) = args.concurrency {
            self.pipeline.concurrency = Some(c);
        }
        if let Commands::Load { yes: true } = args.command {
            self.pipeline.assume_yes = true;
        }
    }

    pub fn validate(&self, needs_org: bool) -> Result<()> {
        if needs_org && self.org.target_org.trim().is_empty() {
            return Err(MigrationError::Config(
                "no target org: set org.target_org or pass --target-org".into(),
            ));
        }
        if self.pipeline.output_dir.trim().is_empty() {
            return Err(MigrationError::Config("pipeline.output_dir is empty".into()));
        }
        if self.pipeline.concurrency == Some(0) {
            return Err(MigrationError::Config("pipeline.concurrency must be at least 1".into()));
        }
        if matches!(self.pipeline.cpu_percent, Some(p) if p == 0 || p > 100) {
            return Err(MigrationError::Config("pipeline.cpu_percent must be 1-100".into()));
        }
        if self.pipeline.model_name.trim().is_empty() {
            return Err(MigrationError::Config("pipeline.model_name is empty".into()));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            model_name: self.pipeline.model_name.clone(),
            sharing_objects: self.pipeline.sharing_objects.clone(),
            assume_yes: self.pipeline.assume_yes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml = r#"
org:
  target_org: "source-sandbox"
pipeline:
  output_dir: "./out"
  concurrency: 4
  sharing_objects: ["Account"]
"#;
        let file = write_temp(".yaml", yaml);
        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.org.target_org, "source-sandbox");
        assert_eq!(config.org.api_version, "60.0");
        assert_eq!(config.org.sf_binary, "sf");
        assert_eq!(config.pipeline.concurrency, Some(4));
        assert_eq!(config.pipeline.model_name, "IMPORTED_TERRITORY");
        assert_eq!(config.pipeline.sharing_objects, vec!["Account"]);
    }

    #[test]
    fn test_load_json_config() {
        let file = write_temp(".json", r#"{"org": {"target_org": "prod"}}"#);
        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.org.target_org, "prod");
        assert_eq!(config.pipeline.output_dir, "./tm-migration");
    }

    #[test]
    fn test_cli_overrides() {
        let args = CliArgs::parse_from([
            "tm-migrator",
            "--target-org",
            "uat",
            "load",
            "--yes",
            "--output",
            "/tmp/mig",
        ]);
        let mut config = AppConfig::default();
        config.merge_cli(&args);
        assert_eq!(config.org.target_org, "uat");
        assert_eq!(config.pipeline.output_dir, "/tmp/mig");
        assert!(config.pipeline.assume_yes);
        assert!(config.pipeline_settings().assume_yes);
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate(true).is_err());
        assert!(config.validate(false).is_ok());

        config.org.target_org = "src".into();
        config.pipeline.concurrency = Some(0);
        assert!(config.validate(true).is_err());

        config.pipeline.concurrency = Some(2);
        config.pipeline.output_dir = String::new();
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn test_offline_transform_needs_no_org() {
        assert!(!Commands::Transform { offline: true }.needs_org());
        assert!(Commands::Transform { offline: false }.needs_org());
        assert!(!Commands::Status.needs_org());
        assert!(Commands::Load { yes: false }.needs_org());
    }
}
