use clap::Parser;
use std::path::PathBuf;

use crate::core::profiles::Profile;
use crate::core::resources::{MemorySize, WallTime};

#[derive(Parser, Debug)]
#[command(
    name = "caduceus",
    version,
    about = "Parameter and resource governor for the viral consensus annotation pipeline",
    long_about = "Caduceus validates pipeline parameters, clamps per-process resource \
                  requests against global ceilings, selects an execution profile, and \
                  emits the resolved launch plan consumed by the workflow engine. \
                  Annotation (VADR), submission formatting (table2asn), classification, \
                  and assembly are carried out by external tools whose locations are \
                  configured here, never implemented here."
)]
pub struct Cli {
    /// Directory of consensus genome FASTA files to annotate (required)
    #[arg(long = "consensus_dir", value_name = "DIR")]
    pub consensus_dir: Option<PathBuf>,

    /// Directory where results and run reports are written (default: results)
    #[arg(long = "output_dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory of VADR model files used by the annotation stage
    #[arg(long = "vadr_model_dir", value_name = "DIR")]
    pub vadr_model_dir: Option<PathBuf>,

    /// Maximum CPUs any single process may request (default: 16)
    #[arg(long = "max_cpus", value_name = "N")]
    pub max_cpus: Option<u32>,

    /// Maximum memory any single process may request, e.g. 64GB (default: 64GB)
    #[arg(long = "max_memory", value_name = "SIZE")]
    pub max_memory: Option<MemorySize>,

    /// Maximum wall time any single process may request, e.g. 48h (default: 48h)
    #[arg(long = "max_time", value_name = "DURATION")]
    pub max_time: Option<WallTime>,

    /// Execution profile: docker, singularity, conda, slurm, sge, lsf, or pbs
    #[arg(long, value_name = "NAME")]
    pub profile: Option<Profile>,

    /// TOML file of parameter overrides; command-line flags win over file values
    #[arg(long, value_name = "FILE", env = "CADUCEUS_PARAMS")]
    pub params_file: Option<PathBuf>,

    /// Print the resolved launch plan as JSON and exit without writing anything
    #[arg(long)]
    pub plan_only: bool,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
