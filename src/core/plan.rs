//! The resolved launch plan handed to the workflow engine.

use chrono::Local;
use colored::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::core::config::{PipelineConfig, ReportConfig, ToolPaths};
use crate::core::processes::{self, ProcessDirective, Stage};
use crate::core::profiles::ExecutionSettings;
use crate::{CaduceusError, Result};

/// Subdirectory of the output directory where the engine drops its run
/// reports and where the plan snapshot is written.
pub const PIPELINE_INFO_DIR: &str = "pipeline_info";

/// Everything the engine needs to schedule the pipeline: resolved params,
/// clamped per-stage resources, execution flags, tool locations, and the
/// report paths. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    pub params: ResolvedParams,
    pub execution: ExecutionSettings,
    pub processes: Vec<ProcessDirective>,
    pub tools: ToolPaths,
    pub artifacts: ReportArtifacts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedParams {
    pub consensus_dir: PathBuf,
    pub output_dir: PathBuf,
    pub vadr_model_dir: Option<PathBuf>,
}

/// Paths of the engine-produced run reports, all under
/// `<output_dir>/pipeline_info/`. `None` means the report is disabled.
#[derive(Debug, Clone, Serialize)]
pub struct ReportArtifacts {
    pub timeline: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub trace: Option<PathBuf>,
    pub dag: Option<PathBuf>,
}

impl ReportArtifacts {
    pub fn new(output_dir: &Path, reports: &ReportConfig, timestamp: &str) -> Self {
        let dir = output_dir.join(PIPELINE_INFO_DIR);
        let path = |enabled: bool, name: &str, ext: &str| {
            enabled.then(|| dir.join(format!("{}_{}.{}", name, timestamp, ext)))
        };
        Self {
            timeline: path(reports.timeline, "execution_timeline", "html"),
            report: path(reports.report, "execution_report", "html"),
            trace: path(reports.trace, "execution_trace", "txt"),
            dag: path(reports.dag, "pipeline_dag", "svg"),
        }
    }
}

impl LaunchPlan {
    /// Resolve a validated configuration into a launch plan. Clamping of
    /// every stage request happens here, once.
    pub fn build(config: &PipelineConfig) -> Result<Self> {
        let consensus_dir = config.consensus_dir.clone().ok_or_else(|| {
            CaduceusError::Config("required parameter --consensus_dir is not set".to_string())
        })?;

        let known: Vec<&str> = Stage::all().iter().map(|s| s.key()).collect();
        for key in config.process_overrides.keys() {
            if !known.contains(&key.as_str()) {
                warn!("params file overrides unknown process '{}'", key);
            }
        }

        let processes = Stage::all()
            .iter()
            .map(|stage| {
                processes::resolve_stage(
                    *stage,
                    config.process_overrides.get(stage.key()),
                    &config.ceiling,
                )
            })
            .collect();

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        Ok(Self {
            params: ResolvedParams {
                consensus_dir,
                output_dir: config.output_dir.clone(),
                vadr_model_dir: config.vadr_model_dir.clone(),
            },
            execution: config
                .profile
                .map(|p| p.settings())
                .unwrap_or_default(),
            processes,
            tools: config.tools.clone(),
            artifacts: ReportArtifacts::new(&config.output_dir, &config.reports, &timestamp),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CaduceusError::Other(format!("failed to serialize launch plan: {}", e)))
    }

    /// Write the plan snapshot under `<output_dir>/pipeline_info/`.
    pub fn write_snapshot(&self, output_dir: &Path) -> Result<PathBuf> {
        let dir = output_dir.join(PIPELINE_INFO_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join("launch_plan.json");
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    /// Print a human summary of the plan.
    pub fn render_summary(&self, verbose: bool) {
        println!("\n{}", "Launch Plan".bold());

        println!("├─ {}", "Parameters".bold());
        println!("│  ├─ consensus_dir: {}", self.params.consensus_dir.display());
        println!("│  ├─ output_dir: {}", self.params.output_dir.display());
        match &self.params.vadr_model_dir {
            Some(dir) => println!("│  └─ vadr_model_dir: {}", dir.display()),
            None => println!("│  └─ vadr_model_dir: {}", "VADR default models".dimmed()),
        }

        println!("├─ {}", "Execution".bold());
        println!("│  └─ {}", self.execution.describe());

        println!("├─ {}", "Processes".bold());
        for (i, p) in self.processes.iter().enumerate() {
            let branch = if i == self.processes.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!(
                "│  {} {}: {} cpus, {} memory, {} time",
                branch, p.stage, p.cpus, p.memory, p.time
            );
        }

        if verbose {
            println!("├─ {}", "Tools".bold());
            println!("│  ├─ vadr: {}", self.tools.vadr.display());
            println!("│  ├─ vadr_trim: {}", self.tools.vadr_trim.display());
            println!("│  ├─ table2asn: {}", self.tools.table2asn.display());
            println!("│  ├─ table2asn_pre: {}", self.tools.table2asn_pre.display());
            println!("│  ├─ table2asn_post: {}", self.tools.table2asn_post.display());
            println!("│  ├─ classifier: {}", self.tools.classifier.display());
            println!("│  └─ assembler: {}", self.tools.assembler.display());
        }

        println!("└─ {}", "Run reports".bold());
        let artifacts = [
            ("timeline", &self.artifacts.timeline),
            ("report", &self.artifacts.report),
            ("trace", &self.artifacts.trace),
            ("dag", &self.artifacts.dag),
        ];
        for (i, (name, path)) in artifacts.iter().enumerate() {
            let branch = if i == artifacts.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            match path {
                Some(path) => println!("   {} {}: {}", branch, name, path.display()),
                None => println!("   {} {}: {}", branch, name, "disabled".dimmed()),
            }
        }
    }
}
