//! Per-stage resource requests and their resolution against the ceilings.

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::resources::{
    ClampOutcome, MemorySize, ResourceCeiling, ResourceKind, ResourceValue, WallTime,
};

/// Exit status a scheduler uses when it kills a task that outgrew its
/// allocation. The engine retries once on this status and on nothing else.
pub const SCHEDULER_KILL_EXIT_STATUS: i32 = 143;

/// The pipeline stages the governor assigns resources to. Each delegates
/// its actual work to an external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    VadrAnnotate,
    Table2asn,
    Classify,
    Assemble,
}

impl Stage {
    pub fn all() -> [Stage; 4] {
        [
            Stage::VadrAnnotate,
            Stage::Table2asn,
            Stage::Classify,
            Stage::Assemble,
        ]
    }

    /// Key used for the stage in params files and the launch plan.
    pub fn key(&self) -> &'static str {
        match self {
            Stage::VadrAnnotate => "vadr_annotate",
            Stage::Table2asn => "table2asn",
            Stage::Classify => "classify",
            Stage::Assemble => "assemble",
        }
    }

    /// Resources the stage asks for before clamping.
    pub fn default_request(&self) -> ResourceRequest {
        match self {
            Stage::VadrAnnotate => {
                ResourceRequest::new(4, MemorySize::from_gb(8), WallTime::from_hours(6))
            }
            Stage::Table2asn => {
                ResourceRequest::new(2, MemorySize::from_gb(4), WallTime::from_hours(4))
            }
            Stage::Classify => {
                ResourceRequest::new(4, MemorySize::from_gb(8), WallTime::from_hours(8))
            }
            Stage::Assemble => {
                ResourceRequest::new(8, MemorySize::from_gb(32), WallTime::from_hours(24))
            }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// What one unit of work asks for. Created per stage, discarded once
/// clamped into a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRequest {
    pub cpus: u32,
    pub memory: MemorySize,
    pub time: WallTime,
}

impl ResourceRequest {
    pub fn new(cpus: u32, memory: MemorySize, time: WallTime) -> Self {
        Self { cpus, memory, time }
    }
}

/// Raw per-stage override from a params file.
///
/// Values stay untyped until clamp time so a malformed entry degrades to a
/// pass-through instead of failing the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOverride {
    pub cpus: Option<RawValue>,
    pub memory: Option<RawValue>,
    pub time: Option<RawValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Int(n) => write!(f, "{}", n),
            RawValue::Float(x) => write!(f, "{}", x),
            RawValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Retry policy forwarded to the engine: one retry, only when the task was
/// killed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    pub retry_exit_status: i32,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_exit_status: SCHEDULER_KILL_EXIT_STATUS,
            max_retries: 1,
        }
    }
}

/// A resolved resource entry. `Verbatim` carries a value that failed
/// coercion and was passed through unclamped.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Value(ResourceValue),
    Verbatim(String),
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Value(v) => write!(f, "{}", v),
            Resolved::Verbatim(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Resolved {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Resolved::Value(ResourceValue::Cpus(n)) => serializer.serialize_u32(*n),
            Resolved::Value(v) => serializer.serialize_str(&v.to_string()),
            Resolved::Verbatim(s) => serializer.serialize_str(s),
        }
    }
}

/// A stage's resource directive after clamping, ready for the engine.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessDirective {
    pub stage: Stage,
    pub cpus: Resolved,
    pub memory: Resolved,
    pub time: Resolved,
    pub retry: RetryPolicy,
}

/// Resolve a stage: defaults, then any override, each clamped to the
/// ceiling. Runs once per stage at plan time.
pub fn resolve_stage(
    stage: Stage,
    overrides: Option<&StageOverride>,
    ceiling: &ResourceCeiling,
) -> ProcessDirective {
    let defaults = stage.default_request();
    let cpus = resolve_field(
        ResourceKind::Cpus,
        ResourceValue::Cpus(defaults.cpus),
        overrides.and_then(|o| o.cpus.as_ref()),
        ceiling,
    );
    let memory = resolve_field(
        ResourceKind::Memory,
        ResourceValue::Memory(defaults.memory),
        overrides.and_then(|o| o.memory.as_ref()),
        ceiling,
    );
    let time = resolve_field(
        ResourceKind::Time,
        ResourceValue::Time(defaults.time),
        overrides.and_then(|o| o.time.as_ref()),
        ceiling,
    );
    ProcessDirective {
        stage,
        cpus,
        memory,
        time,
        retry: RetryPolicy::default(),
    }
}

fn resolve_field(
    kind: ResourceKind,
    default_value: ResourceValue,
    raw: Option<&RawValue>,
    ceiling: &ResourceCeiling,
) -> Resolved {
    match raw {
        Some(raw) => match ceiling.clamp_raw(kind, &raw.to_string()) {
            ClampOutcome::Kept(v) | ClampOutcome::Capped(v) => Resolved::Value(v),
            ClampOutcome::PassThrough { original, .. } => Resolved::Verbatim(original),
        },
        None => Resolved::Value(ceiling.clamp(default_value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_defaults_stay_within_default_ceiling() {
        let ceiling = ResourceCeiling::default();
        for stage in Stage::all() {
            let defaults = stage.default_request();
            let directive = resolve_stage(stage, None, &ceiling);
            assert_eq!(directive.cpus, Resolved::Value(ResourceValue::Cpus(defaults.cpus)));
            assert_eq!(
                directive.memory,
                Resolved::Value(ResourceValue::Memory(defaults.memory))
            );
            assert_eq!(directive.time, Resolved::Value(ResourceValue::Time(defaults.time)));
        }
    }

    #[test]
    fn override_exceeding_ceiling_is_capped() {
        let ceiling = ResourceCeiling::default();
        let overrides = StageOverride {
            cpus: Some(RawValue::Int(32)),
            memory: Some(RawValue::Text("128GB".to_string())),
            time: Some(RawValue::Text("72h".to_string())),
        };
        let directive = resolve_stage(Stage::Assemble, Some(&overrides), &ceiling);
        assert_eq!(directive.cpus, Resolved::Value(ResourceValue::Cpus(16)));
        assert_eq!(
            directive.memory,
            Resolved::Value(ResourceValue::Memory(MemorySize::from_gb(64)))
        );
        assert_eq!(
            directive.time,
            Resolved::Value(ResourceValue::Time(WallTime::from_hours(48)))
        );
    }

    #[test]
    fn malformed_override_forwards_verbatim() {
        let ceiling = ResourceCeiling::default();
        let overrides = StageOverride {
            memory: Some(RawValue::Text("a lot".to_string())),
            ..Default::default()
        };
        let directive = resolve_stage(Stage::Classify, Some(&overrides), &ceiling);
        assert_eq!(directive.memory, Resolved::Verbatim("a lot".to_string()));
        // the other fields still resolve from defaults
        assert_eq!(directive.cpus, Resolved::Value(ResourceValue::Cpus(4)));
    }

    #[test]
    fn retry_policy_targets_scheduler_kill() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_exit_status, 143);
        assert_eq!(policy.max_retries, 1);
    }
}
