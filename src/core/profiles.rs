//! Execution profiles: container backends and HPC schedulers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named execution profile.
///
/// Container backends are mutually exclusive. Scheduler profiles leave
/// every container flag off and set the engine executor instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Profile {
    Docker,
    Singularity,
    Conda,
    Scheduler(Scheduler),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduler {
    Slurm,
    Sge,
    Lsf,
    Pbs,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Profile::Docker),
            "singularity" => Ok(Profile::Singularity),
            "conda" => Ok(Profile::Conda),
            "slurm" => Ok(Profile::Scheduler(Scheduler::Slurm)),
            "sge" => Ok(Profile::Scheduler(Scheduler::Sge)),
            "lsf" => Ok(Profile::Scheduler(Scheduler::Lsf)),
            "pbs" | "pbspro" => Ok(Profile::Scheduler(Scheduler::Pbs)),
            _ => Err(format!("Unknown profile: {}", s)),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Docker => write!(f, "docker"),
            Profile::Singularity => write!(f, "singularity"),
            Profile::Conda => write!(f, "conda"),
            Profile::Scheduler(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scheduler::Slurm => "slurm",
            Scheduler::Sge => "sge",
            Scheduler::Lsf => "lsf",
            Scheduler::Pbs => "pbs",
        };
        write!(f, "{}", name)
    }
}

impl TryFrom<String> for Profile {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Profile> for String {
    fn from(p: Profile) -> Self {
        p.to_string()
    }
}

/// Engine-facing execution-environment flags derived from a profile.
///
/// Invariant: at most one container backend is enabled, and none when an
/// HPC executor is set. The default is a bare local run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSettings {
    pub docker_enabled: bool,
    pub singularity_enabled: bool,
    /// Bind host paths into the container automatically. Singularity only.
    pub singularity_auto_mounts: bool,
    pub conda_enabled: bool,
    /// Engine executor name when running under an HPC scheduler.
    pub executor: Option<Scheduler>,
}

impl Profile {
    pub fn settings(&self) -> ExecutionSettings {
        let mut settings = ExecutionSettings::default();
        match self {
            Profile::Docker => settings.docker_enabled = true,
            Profile::Singularity => {
                settings.singularity_enabled = true;
                settings.singularity_auto_mounts = true;
            }
            Profile::Conda => settings.conda_enabled = true,
            Profile::Scheduler(s) => settings.executor = Some(*s),
        }
        settings
    }
}

impl ExecutionSettings {
    /// Number of container backends enabled; never more than one.
    pub fn enabled_backends(&self) -> usize {
        [
            self.docker_enabled,
            self.singularity_enabled,
            self.conda_enabled,
        ]
        .iter()
        .filter(|enabled| **enabled)
        .count()
    }

    /// One-line description for the run summary.
    pub fn describe(&self) -> String {
        if self.docker_enabled {
            "docker".to_string()
        } else if self.singularity_enabled {
            "singularity (auto mounts)".to_string()
        } else if self.conda_enabled {
            "conda".to_string()
        } else if let Some(executor) = self.executor {
            format!("{} executor", executor)
        } else {
            "local".to_string()
        }
    }
}
