use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::Write;
use std::path::PathBuf;

use caduceus::cli::Cli;
use caduceus::core::processes::{Resolved, Stage};
use caduceus::core::resources::{MemorySize, ResourceValue, WallTime};
use caduceus::{CaduceusError, LaunchPlan, PipelineConfig};

fn parse(args: &[&str]) -> Cli {
    let argv: Vec<&str> = std::iter::once("caduceus")
        .chain(args.iter().copied())
        .collect();
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn help_short_circuits_validation() {
    // --help wins even though consensus_dir is missing
    let err = Cli::try_parse_from(["caduceus", "--help"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DisplayHelp);

    let help = Cli::command().render_long_help().to_string();
    assert!(help.contains("--consensus_dir"));
    assert!(help.contains("--max_cpus"));
    assert!(help.contains("--profile"));
}

#[test]
fn missing_consensus_dir_fails_before_any_clamping() {
    let config = PipelineConfig::resolve(&parse(&[])).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, CaduceusError::Config(_)));
    assert!(err.to_string().contains("consensus_dir"));
}

#[test]
fn requested_resources_clamp_to_configured_ceilings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[process.assemble]
cpus = 32
memory = "128GB"
time = "72h"
"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let cli = parse(&["--consensus_dir", "genomes", "--params-file", &path]);
    let config = PipelineConfig::resolve(&cli).unwrap();
    config.validate().unwrap();

    let plan = LaunchPlan::build(&config).unwrap();
    let assemble = plan
        .processes
        .iter()
        .find(|p| p.stage == Stage::Assemble)
        .unwrap();
    assert_eq!(assemble.cpus, Resolved::Value(ResourceValue::Cpus(16)));
    assert_eq!(
        assemble.memory,
        Resolved::Value(ResourceValue::Memory(MemorySize::from_gb(64)))
    );
    assert_eq!(
        assemble.time,
        Resolved::Value(ResourceValue::Time(WallTime::from_hours(48)))
    );
}

#[test]
fn cli_ceilings_override_params_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
consensus_dir = "from_file"
max_cpus = 4
"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let cli = parse(&["--params-file", &path, "--max_cpus", "8"]);
    let config = PipelineConfig::resolve(&cli).unwrap();
    assert_eq!(config.consensus_dir, Some(PathBuf::from("from_file")));
    assert_eq!(config.ceiling.max_cpus, 8);
}

#[test]
fn malformed_stage_request_survives_the_whole_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[process.classify]
time = "whenever"
"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let cli = parse(&["--consensus_dir", "genomes", "--params-file", &path]);
    let config = PipelineConfig::resolve(&cli).unwrap();
    config.validate().unwrap();

    let plan = LaunchPlan::build(&config).unwrap();
    let classify = plan
        .processes
        .iter()
        .find(|p| p.stage == Stage::Classify)
        .unwrap();
    assert_eq!(classify.time, Resolved::Verbatim("whenever".to_string()));

    // the pass-through value lands verbatim in the serialized plan
    let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();
    let entry = json["processes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["stage"] == "classify")
        .unwrap()
        .clone();
    assert_eq!(entry["time"], "whenever");
}

#[test]
fn snapshot_and_reports_share_pipeline_info() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results");
    let cli = parse(&[
        "--consensus_dir",
        "genomes",
        "--output_dir",
        out.to_str().unwrap(),
        "--profile",
        "slurm",
    ]);
    let config = PipelineConfig::resolve(&cli).unwrap();
    config.validate().unwrap();

    let plan = LaunchPlan::build(&config).unwrap();
    assert_eq!(plan.execution.enabled_backends(), 0);
    assert!(plan.execution.executor.is_some());

    let snapshot = plan.write_snapshot(&config.output_dir).unwrap();
    assert!(snapshot.exists());
    assert_eq!(
        snapshot.parent().unwrap(),
        plan.artifacts.timeline.as_ref().unwrap().parent().unwrap()
    );
}
