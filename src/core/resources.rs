//! Resource units and the clamping rules applied to every process request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A memory quantity in bytes.
///
/// Parses the size strings pipeline users actually write: `64GB`, `64.GB`,
/// `512 MB`, `6.5GB`, or a bare byte count. Multipliers are binary
/// (1 GB = 2^30 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemorySize(u64);

impl MemorySize {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn from_mb(mb: u64) -> Self {
        Self(mb << 20)
    }

    pub const fn from_gb(gb: u64) -> Self {
        Self(gb << 30)
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for MemorySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty memory value".to_string());
        }
        match s.find(|c: char| c.is_ascii_alphabetic()) {
            // No unit suffix: a plain byte count
            None => s
                .parse::<u64>()
                .map(MemorySize)
                .map_err(|_| format!("invalid memory value '{}'", s)),
            Some(idx) => {
                let (num, unit) = s.split_at(idx);
                // "64.GB" is accepted alongside "64GB" and "64 GB"
                let num = num.trim().trim_end_matches('.');
                let value: f64 = num
                    .parse()
                    .map_err(|_| format!("invalid memory value '{}'", s))?;
                if value < 0.0 || !value.is_finite() {
                    return Err(format!("invalid memory value '{}'", s));
                }
                let scale: u64 = match unit.trim().to_ascii_uppercase().as_str() {
                    "B" => 1,
                    "KB" | "K" => 1 << 10,
                    "MB" | "M" => 1 << 20,
                    "GB" | "G" => 1 << 30,
                    "TB" | "T" => 1 << 40,
                    "PB" | "P" => 1 << 50,
                    other => return Err(format!("unknown memory unit '{}'", other)),
                };
                Ok(MemorySize((value * scale as f64).round() as u64))
            }
        }
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(&str, u64); 5] = [
            ("PB", 1 << 50),
            ("TB", 1 << 40),
            ("GB", 1 << 30),
            ("MB", 1 << 20),
            ("KB", 1 << 10),
        ];
        for (suffix, scale) in UNITS {
            if self.0 >= scale {
                return if self.0 % scale == 0 {
                    write!(f, "{}{}", self.0 / scale, suffix)
                } else {
                    write!(f, "{:.1}{}", self.0 as f64 / scale as f64, suffix)
                };
            }
        }
        write!(f, "{}B", self.0)
    }
}

impl TryFrom<String> for MemorySize {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MemorySize> for String {
    fn from(m: MemorySize) -> Self {
        m.to_string()
    }
}

/// A wall-clock time limit with one-second resolution.
///
/// Parses `48h`, `1d 6h`, `90m`, `30s`, `2.5h`, or a bare second count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallTime(u64);

impl WallTime {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn from_mins(mins: u64) -> Self {
        Self(mins * 60)
    }

    pub const fn from_hours(hours: u64) -> Self {
        Self(hours * 3_600)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl FromStr for WallTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration".to_string());
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            // No unit suffix: a plain second count
            return s
                .parse::<u64>()
                .map(WallTime)
                .map_err(|_| format!("invalid duration '{}'", s));
        }

        let mut total = 0.0f64;
        let mut rest = s;
        while !rest.is_empty() {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            let num_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            if num_len == 0 {
                return Err(format!("invalid duration '{}'", s));
            }
            let value: f64 = rest[..num_len]
                .parse()
                .map_err(|_| format!("invalid duration '{}'", s))?;
            rest = &rest[num_len..];
            let unit_len = rest
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            if unit_len == 0 {
                return Err(format!("invalid duration '{}': missing unit", s));
            }
            let secs = match rest[..unit_len].to_ascii_lowercase().as_str() {
                "d" | "day" | "days" => 86_400.0,
                "h" | "hr" | "hour" | "hours" => 3_600.0,
                "m" | "min" | "minute" | "minutes" => 60.0,
                "s" | "sec" | "second" | "seconds" => 1.0,
                other => return Err(format!("unknown time unit '{}'", other)),
            };
            total += value * secs;
            rest = &rest[unit_len..];
        }
        Ok(WallTime(total.round() as u64))
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0s");
        }
        let mut secs = self.0;
        let days = secs / 86_400;
        secs %= 86_400;
        let hours = secs / 3_600;
        secs %= 3_600;
        let mins = secs / 60;
        secs %= 60;
        if days > 0 {
            write!(f, "{}d", days)?;
        }
        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if mins > 0 {
            write!(f, "{}m", mins)?;
        }
        if secs > 0 {
            write!(f, "{}s", secs)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for WallTime {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WallTime> for String {
    fn from(t: WallTime) -> Self {
        t.to_string()
    }
}

/// The three resource dimensions a process request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Cpus,
    Memory,
    Time,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Cpus => "cpus",
            ResourceKind::Memory => "memory",
            ResourceKind::Time => "time",
        };
        write!(f, "{}", name)
    }
}

/// A typed resource value, one variant per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceValue {
    Cpus(u32),
    Memory(MemorySize),
    Time(WallTime),
}

impl ResourceValue {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceValue::Cpus(_) => ResourceKind::Cpus,
            ResourceValue::Memory(_) => ResourceKind::Memory,
            ResourceValue::Time(_) => ResourceKind::Time,
        }
    }
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::Cpus(n) => write!(f, "{}", n),
            ResourceValue::Memory(m) => write!(f, "{}", m),
            ResourceValue::Time(t) => write!(f, "{}", t),
        }
    }
}

/// Global per-process resource ceilings, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCeiling {
    pub max_cpus: u32,
    pub max_memory: MemorySize,
    pub max_time: WallTime,
}

impl Default for ResourceCeiling {
    fn default() -> Self {
        Self {
            max_cpus: 16,
            max_memory: MemorySize::from_gb(64),
            max_time: WallTime::from_hours(48),
        }
    }
}

/// Outcome of clamping one requested value.
///
/// `PassThrough` is the leniency rule inherited from the pipeline: a value
/// that cannot be coerced to its resource kind is logged and forwarded
/// unclamped instead of failing the run.
#[derive(Debug, Clone, PartialEq)]
pub enum ClampOutcome {
    /// Request was within the ceiling and kept as-is.
    Kept(ResourceValue),
    /// Request exceeded the ceiling and was reduced to it.
    Capped(ResourceValue),
    /// Request could not be coerced; the original is forwarded unclamped.
    PassThrough { original: String, reason: String },
}

impl ResourceCeiling {
    /// Clamp a typed value to the ceiling for its dimension.
    pub fn clamp(&self, value: ResourceValue) -> ResourceValue {
        match value {
            ResourceValue::Cpus(n) => ResourceValue::Cpus(n.min(self.max_cpus)),
            ResourceValue::Memory(m) => ResourceValue::Memory(m.min(self.max_memory)),
            ResourceValue::Time(t) => ResourceValue::Time(t.min(self.max_time)),
        }
    }

    /// Coerce a raw string to `kind`, then clamp it.
    pub fn clamp_raw(&self, kind: ResourceKind, raw: &str) -> ClampOutcome {
        let parsed = match kind {
            ResourceKind::Cpus => raw
                .trim()
                .parse::<u32>()
                .map(ResourceValue::Cpus)
                .map_err(|e| e.to_string()),
            ResourceKind::Memory => raw.parse::<MemorySize>().map(ResourceValue::Memory),
            ResourceKind::Time => raw.parse::<WallTime>().map(ResourceValue::Time),
        };
        match parsed {
            Ok(value) => {
                let clamped = self.clamp(value);
                if clamped == value {
                    ClampOutcome::Kept(value)
                } else {
                    ClampOutcome::Capped(clamped)
                }
            }
            Err(reason) => {
                warn!(
                    "cannot coerce {} value '{}' ({}), passing through unclamped",
                    kind, raw, reason
                );
                ClampOutcome::PassThrough {
                    original: raw.to_string(),
                    reason,
                }
            }
        }
    }
}

/// Warnings (never errors) for ceilings that exceed what the host offers.
pub fn host_capacity_warnings(ceiling: &ResourceCeiling) -> Vec<String> {
    use humansize::{format_size, BINARY};
    use sysinfo::System;

    let mut notes = Vec::new();

    let host_cpus = num_cpus::get() as u32;
    if ceiling.max_cpus > host_cpus {
        notes.push(format!(
            "max_cpus {} exceeds the {} logical CPUs on this host",
            ceiling.max_cpus, host_cpus
        ));
    }

    let system = System::new_all();
    let host_memory = system.total_memory();
    if host_memory > 0 && ceiling.max_memory.bytes() > host_memory {
        notes.push(format!(
            "max_memory {} exceeds host memory of {}",
            ceiling.max_memory,
            format_size(host_memory, BINARY)
        ));
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("64GB", 64 << 30 ; "plain gigabytes")]
    #[test_case("64.GB", 64 << 30 ; "dotted unit")]
    #[test_case("512 MB", 512 << 20 ; "space before unit")]
    #[test_case("6.5GB", 6_979_321_856 ; "fractional gigabytes")]
    #[test_case("2TB", 2u64 << 40 ; "terabytes")]
    #[test_case("100KB", 100 << 10 ; "kilobytes")]
    #[test_case("1024", 1024 ; "bare byte count")]
    fn parses_memory(input: &str, bytes: u64) {
        assert_eq!(input.parse::<MemorySize>().unwrap().bytes(), bytes);
    }

    #[test_case("" ; "empty")]
    #[test_case("plenty" ; "no number")]
    #[test_case("64XB" ; "unknown unit")]
    #[test_case("-1GB" ; "negative")]
    fn rejects_malformed_memory(input: &str) {
        assert!(input.parse::<MemorySize>().is_err());
    }

    #[test_case("48h", 48 * 3_600 ; "hours")]
    #[test_case("1d 6h", 30 * 3_600 ; "days and hours")]
    #[test_case("1d6h", 30 * 3_600 ; "no separator")]
    #[test_case("90m", 5_400 ; "minutes")]
    #[test_case("30s", 30 ; "seconds")]
    #[test_case("2.5h", 9_000 ; "fractional hours")]
    #[test_case("3600", 3_600 ; "bare second count")]
    fn parses_time(input: &str, secs: u64) {
        assert_eq!(input.parse::<WallTime>().unwrap().as_secs(), secs);
    }

    #[test_case("" ; "empty")]
    #[test_case("h" ; "unit only")]
    #[test_case("48x" ; "unknown unit")]
    #[test_case("soon" ; "no number")]
    fn rejects_malformed_time(input: &str) {
        assert!(input.parse::<WallTime>().is_err());
    }

    #[test]
    fn memory_display_round_trips() {
        assert_eq!(MemorySize::from_gb(64).to_string(), "64GB");
        assert_eq!(MemorySize::from_mb(512).to_string(), "512MB");
        assert_eq!(MemorySize::from_bytes((1 << 30) + (1 << 29)).to_string(), "1.5GB");
        assert_eq!(MemorySize::from_bytes(512).to_string(), "512B");
    }

    #[test]
    fn time_display_decomposes() {
        assert_eq!(WallTime::from_hours(30).to_string(), "1d6h");
        assert_eq!(WallTime::from_mins(90).to_string(), "1h30m");
        assert_eq!(WallTime::from_secs(0).to_string(), "0s");
    }

    #[test]
    fn clamp_caps_each_dimension() {
        let ceiling = ResourceCeiling::default();
        assert_eq!(
            ceiling.clamp(ResourceValue::Cpus(32)),
            ResourceValue::Cpus(16)
        );
        assert_eq!(
            ceiling.clamp(ResourceValue::Memory(MemorySize::from_gb(128))),
            ResourceValue::Memory(MemorySize::from_gb(64))
        );
        assert_eq!(
            ceiling.clamp(ResourceValue::Time(WallTime::from_hours(72))),
            ResourceValue::Time(WallTime::from_hours(48))
        );
    }

    #[test]
    fn clamp_keeps_requests_within_ceiling() {
        let ceiling = ResourceCeiling::default();
        assert_eq!(
            ceiling.clamp(ResourceValue::Cpus(4)),
            ResourceValue::Cpus(4)
        );
        match ceiling.clamp_raw(ResourceKind::Memory, "8GB") {
            ClampOutcome::Kept(ResourceValue::Memory(m)) => {
                assert_eq!(m, MemorySize::from_gb(8));
            }
            other => panic!("expected kept value, got {:?}", other),
        }
    }

    #[test]
    fn raw_clamp_reports_capping() {
        let ceiling = ResourceCeiling::default();
        match ceiling.clamp_raw(ResourceKind::Time, "72h") {
            ClampOutcome::Capped(ResourceValue::Time(t)) => {
                assert_eq!(t, WallTime::from_hours(48));
            }
            other => panic!("expected capped value, got {:?}", other),
        }
    }

    #[test]
    fn malformed_request_passes_through() {
        let ceiling = ResourceCeiling::default();
        match ceiling.clamp_raw(ResourceKind::Cpus, "plenty") {
            ClampOutcome::PassThrough { original, .. } => assert_eq!(original, "plenty"),
            other => panic!("expected pass-through, got {:?}", other),
        }
    }
}
