use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

pub const EDGE_TOLERANCE_RANGE: RangeInclusive<f64> = 2.0..=40.0;
pub const MIN_OVERLAP_RATIO_RANGE: RangeInclusive<f64> = 0.1..=0.9;

pub const DEFAULT_CONFIG: &str = include_str!("../../tandem.default.toml");

pub fn config_file() -> PathBuf { dirs::home_dir().unwrap_or_default().join(".tandem.toml") }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "yes")]
    pub auto_grouping: bool,
    #[serde(default)]
    pub non_activating_raise: bool,
    #[serde(default)]
    pub include_other_spaces: bool,
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub timing: TimingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_grouping: true,
            non_activating_raise: false,
            include_other_spaces: false,
            detector: DetectorSettings::default(),
            store: StoreSettings::default(),
            timing: TimingSettings::default(),
        }
    }
}

/// Tolerances for the adjacency detector.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DetectorSettings {
    /// Distance in pixels at which two edges count as touching.
    #[serde(default = "default_edge_tolerance")]
    pub edge_tolerance: f64,
    /// Fraction of the shorter side that must overlap along the touching edge.
    #[serde(default = "default_min_overlap_ratio")]
    pub min_overlap_ratio: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            edge_tolerance: default_edge_tolerance(),
            min_overlap_ratio: default_min_overlap_ratio(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    /// A frame change above this on any axis counts as a move.
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            move_threshold: default_move_threshold(),
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct TimingSettings {
    /// Delay between the last trigger of a burst and the refresh it causes.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "debounce_ms", default = "default_debounce")]
    pub debounce: Duration,
    /// Cooldown after the engine reorders windows itself.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "suppression_ms", default = "default_suppression")]
    pub suppression: Duration,
    /// Period of the background reconciliation.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "tick_ms", default = "default_tick")]
    pub tick: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "tick_log_interval_ms", default = "default_tick_log_interval")]
    pub tick_log_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(
        rename = "diagnostic_dump_interval_ms",
        default = "default_diagnostic_dump_interval"
    )]
    pub diagnostic_dump_interval: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            suppression: default_suppression(),
            tick: default_tick(),
            tick_log_interval: default_tick_log_interval(),
            diagnostic_dump_interval: default_diagnostic_dump_interval(),
        }
    }
}

/// Brings an edge tolerance into its supported range.
pub fn clamp_edge_tolerance(value: f64) -> f64 {
    clamp_to(value, &EDGE_TOLERANCE_RANGE, default_edge_tolerance())
}

/// Brings an overlap ratio into its supported range.
pub fn clamp_min_overlap_ratio(value: f64) -> f64 {
    clamp_to(value, &MIN_OVERLAP_RATIO_RANGE, default_min_overlap_ratio())
}

fn clamp_to(value: f64, range: &RangeInclusive<f64>, fallback: f64) -> f64 {
    if value.is_nan() {
        return fallback;
    }
    value.clamp(*range.start(), *range.end())
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.detector.validate());
        issues.extend(self.store.validate());
        issues.extend(self.timing.validate());

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        self.detector.auto_fix_values() + self.store.auto_fix_values() + self.timing.auto_fix_values()
    }
}

impl DetectorSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !EDGE_TOLERANCE_RANGE.contains(&self.edge_tolerance) {
            issues.push(format!(
                "edge_tolerance must be between {} and {}, got {}",
                EDGE_TOLERANCE_RANGE.start(),
                EDGE_TOLERANCE_RANGE.end(),
                self.edge_tolerance
            ));
        }

        if !MIN_OVERLAP_RATIO_RANGE.contains(&self.min_overlap_ratio) {
            issues.push(format!(
                "min_overlap_ratio must be between {} and {}, got {}",
                MIN_OVERLAP_RATIO_RANGE.start(),
                MIN_OVERLAP_RATIO_RANGE.end(),
                self.min_overlap_ratio
            ));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if !EDGE_TOLERANCE_RANGE.contains(&self.edge_tolerance) {
            self.edge_tolerance = clamp_edge_tolerance(self.edge_tolerance);
            fixes += 1;
        }

        if !MIN_OVERLAP_RATIO_RANGE.contains(&self.min_overlap_ratio) {
            self.min_overlap_ratio = clamp_min_overlap_ratio(self.min_overlap_ratio);
            fixes += 1;
        }

        fixes
    }
}

impl StoreSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(self.move_threshold >= 0.0) {
            issues.push(format!(
                "move_threshold must be non-negative, got {}",
                self.move_threshold
            ));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if !(self.move_threshold >= 0.0) {
            self.move_threshold = default_move_threshold();
            fixes += 1;
        }

        fixes
    }
}

impl TimingSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.tick.is_zero() {
            issues.push("tick_ms must be positive".to_string());
        }

        if self.suppression < self.debounce {
            issues.push(format!(
                "suppression_ms ({}) should not be shorter than debounce_ms ({})",
                self.suppression.as_millis(),
                self.debounce.as_millis()
            ));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.tick.is_zero() {
            self.tick = default_tick();
            fixes += 1;
        }

        if self.suppression < self.debounce {
            self.suppression = self.debounce;
            fixes += 1;
        }

        fixes
    }
}

fn yes() -> bool { true }

fn default_edge_tolerance() -> f64 { 8.0 }

fn default_min_overlap_ratio() -> f64 { 0.25 }

fn default_move_threshold() -> f64 { 4.0 }

fn default_debounce() -> Duration { Duration::from_millis(60) }

fn default_suppression() -> Duration { Duration::from_millis(300) }

fn default_tick() -> Duration { Duration::from_secs(2) }

fn default_tick_log_interval() -> Duration { Duration::from_secs(5) }

fn default_diagnostic_dump_interval() -> Duration { Duration::from_secs(15) }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> { Ok(toml::from_str(buf)?) }

    /// Save the current config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> { self.settings.validate() }

    /// Attempts to fix configuration values automatically.
    /// Returns the number of fixes applied.
    pub fn auto_fix_values(&mut self) -> usize { self.settings.auto_fix_values() }
}
