use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::core::processes::StageOverride;
use crate::core::profiles::Profile;
use crate::core::resources::{MemorySize, ResourceCeiling, WallTime};
use crate::{CaduceusError, Result};

/// Fully resolved pipeline configuration.
///
/// Built once at startup from hard defaults, then an optional TOML params
/// file, then command-line overrides. Read-only for the rest of the run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub consensus_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub vadr_model_dir: Option<PathBuf>,
    pub ceiling: ResourceCeiling,
    pub profile: Option<Profile>,
    pub tools: ToolPaths,
    pub reports: ReportConfig,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub process_overrides: BTreeMap<String, StageOverride>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            consensus_dir: None,
            output_dir: PathBuf::from("results"),
            vadr_model_dir: None,
            ceiling: ResourceCeiling::default(),
            profile: None,
            tools: ToolPaths::default(),
            reports: ReportConfig::default(),
            process_overrides: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Build the configuration: defaults, then the params file, then CLI
    /// flags. Returns the still-unvalidated config.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = &cli.params_file {
            config.apply_params_file(path)?;
        }
        config.apply_cli(cli);
        Ok(config)
    }

    fn apply_params_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let file: ParamsFile = toml::from_str(&contents).map_err(|e| {
            CaduceusError::Config(format!(
                "failed to parse params file {}: {}",
                path.display(),
                e
            ))
        })?;
        if let Some(dir) = file.consensus_dir {
            self.consensus_dir = Some(dir);
        }
        if let Some(dir) = file.output_dir {
            self.output_dir = dir;
        }
        if let Some(dir) = file.vadr_model_dir {
            self.vadr_model_dir = Some(dir);
        }
        if let Some(n) = file.max_cpus {
            self.ceiling.max_cpus = n;
        }
        if let Some(m) = file.max_memory {
            self.ceiling.max_memory = m;
        }
        if let Some(t) = file.max_time {
            self.ceiling.max_time = t;
        }
        if let Some(p) = file.profile {
            self.profile = Some(p);
        }
        if let Some(tools) = file.tools {
            self.tools = tools;
        }
        if let Some(reports) = file.reports {
            self.reports = reports;
        }
        if let Some(process) = file.process {
            self.process_overrides = process;
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.consensus_dir {
            self.consensus_dir = Some(dir.clone());
        }
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(dir) = &cli.vadr_model_dir {
            self.vadr_model_dir = Some(dir.clone());
        }
        if let Some(n) = cli.max_cpus {
            self.ceiling.max_cpus = n;
        }
        if let Some(m) = cli.max_memory {
            self.ceiling.max_memory = m;
        }
        if let Some(t) = cli.max_time {
            self.ceiling.max_time = t;
        }
        self.profile = cli.profile.or(self.profile);
    }

    /// Check the one mandatory parameter. Runs after help handling and
    /// before any clamping or plan construction.
    pub fn validate(&self) -> Result<()> {
        match &self.consensus_dir {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(()),
            _ => Err(CaduceusError::Config(
                "required parameter --consensus_dir is not set".to_string(),
            )),
        }
    }
}

/// Locations of the external tools the pipeline stages invoke.
///
/// The governor only records these paths; invoking them is the workflow
/// engine's job. Bare names are resolved on PATH at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub vadr: PathBuf,
    pub vadr_trim: PathBuf,
    pub table2asn: PathBuf,
    pub table2asn_pre: PathBuf,
    pub table2asn_post: PathBuf,
    pub classifier: PathBuf,
    pub assembler: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            vadr: PathBuf::from("v-annotate.pl"),
            vadr_trim: PathBuf::from("fasta-trim-terminal-ambigs.pl"),
            table2asn: PathBuf::from("table2asn"),
            table2asn_pre: PathBuf::from("pre_table2asn.py"),
            table2asn_post: PathBuf::from("post_table2asn.py"),
            classifier: PathBuf::from("classify_consensus.py"),
            assembler: PathBuf::from("assemble_segments.py"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Which run reports the engine should produce. All on by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_true")]
    pub timeline: bool,
    #[serde(default = "default_true")]
    pub report: bool,
    #[serde(default = "default_true")]
    pub trace: bool,
    #[serde(default = "default_true")]
    pub dag: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timeline: true,
            report: true,
            trace: true,
            dag: true,
        }
    }
}

/// Shape of the optional TOML params file. Every field is optional; CLI
/// flags override anything set here.
#[derive(Debug, Default, Deserialize)]
struct ParamsFile {
    consensus_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    vadr_model_dir: Option<PathBuf>,
    max_cpus: Option<u32>,
    max_memory: Option<MemorySize>,
    max_time: Option<WallTime>,
    profile: Option<Profile>,
    tools: Option<ToolPaths>,
    reports: Option<ReportConfig>,
    process: Option<BTreeMap<String, StageOverride>>,
}
