use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::kernel::event::{Action, ForceTarget};
use crate::kernel::gate::MINIMUM_WINDOW_SECS;
use crate::kernel::telemetry::DEFAULT_CAPACITY;
use crate::kernel::time::TICK_MS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid probe config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Probe settings. Every field has a default, so a partial TOML file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub general: GeneralConfig,
    pub trace: TraceConfig,
    pub keys: KeyBindings,
    pub discovery: DiscoveryConfig,
    pub locator: LocatorConfig,
    pub sink: SinkConfig,
    pub driver: DriverConfig,
}

impl ProbeConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Defaults when `path` does not exist; a present but malformed file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Write probe logs at all. When off the probe is inert.
    pub enable_probe_log: bool,
    /// Dump the call stack for stack-watched methods to tell native from reflective calls.
    pub enable_stacks: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enable_probe_log: true,
            enable_stacks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Initial armed state of the trace gate.
    pub enable_trace: bool,
    /// Window length opened by a forced `OnClick`.
    pub trace_seconds: f64,
    pub minimum_window: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enable_trace: true,
            trace_seconds: 3.0,
            minimum_window: MINIMUM_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub mark: String,
    pub force_button_press: String,
    pub force_on_click: String,
    pub trace_toggle: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            mark: "F1".to_string(),
            force_button_press: "F2".to_string(),
            force_on_click: "F3".to_string(),
            trace_toggle: "F4".to_string(),
        }
    }
}

impl KeyBindings {
    /// Maps a key name (case-insensitive) to its action.
    pub fn action_for(&self, key: &str) -> Option<Action> {
        let key = key.trim();
        if key.eq_ignore_ascii_case(&self.mark) {
            Some(Action::Mark)
        } else if key.eq_ignore_ascii_case(&self.force_button_press) {
            Some(Action::ForceInvoke(ForceTarget::ButtonPress))
        } else if key.eq_ignore_ascii_case(&self.force_on_click) {
            Some(Action::ForceInvoke(ForceTarget::OnClick))
        } else if key.eq_ignore_ascii_case(&self.trace_toggle) {
            Some(Action::ToggleTrace)
        } else {
            None
        }
    }

    pub fn key_for(&self, action: &Action) -> &str {
        match action {
            Action::Mark => &self.mark,
            Action::ToggleTrace => &self.trace_toggle,
            Action::ForceInvoke(ForceTarget::ButtonPress) => &self.force_button_press,
            Action::ForceInvoke(ForceTarget::OnClick) => &self.force_on_click,
        }
    }
}

/// A target-type method hooked unconditionally with pre and post callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedMethod {
    pub name: String,
    pub label: String,
}

impl WatchedMethod {
    fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub target_type: String,
    /// Module scanned for candidate trace methods.
    pub candidate_module: String,
    pub keywords: Vec<String>,
    pub max_candidates: usize,
    /// Candidates with more parameters than this are skipped.
    pub max_params: usize,
    pub watched_methods: Vec<WatchedMethod>,
    /// Watched methods whose pre callback dumps the call stack.
    pub stack_methods: Vec<String>,
    /// Stack frame fragments that mark a reflective call.
    pub reflective_markers: Vec<String>,
}

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "Map", "MiniMap", "Minimap", "Marker", "Waypoint", "Ping", "Indicator", "Compass", "Toast",
    "Popup", "Notify", "Notification", "Money", "Value", "Reward", "Price", "Extraction", "Haul",
    "Goal", "UI",
];

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_type: "ExtractionPoint".to_string(),
            candidate_module: "Assembly-CSharp".to_string(),
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_candidates: 160,
            max_params: 3,
            watched_methods: vec![
                WatchedMethod::new("OnClick", "EP.OnClick"),
                WatchedMethod::new("ButtonPress", "EP.ButtonPress"),
                WatchedMethod::new("StateSet", "EP.StateSet"),
                WatchedMethod::new("StateSetRPC", "EP.StateSetRPC"),
                WatchedMethod::new("HaulGoalSetRPC", "EP.HaulGoalSetRPC"),
                WatchedMethod::new("ExtractionPointSurplusRPC", "EP.ExtractionPointSurplusRPC"),
                WatchedMethod::new("ButtonDenyRPC", "EP.ButtonDenyRPC"),
                WatchedMethod::new(
                    "ActivateTheFirstExtractionPointAutomaticallyWhenAPlayerLeaveTruck",
                    "EP.AutoActivateFromTruckDoor",
                ),
            ],
            stack_methods: vec!["ButtonPress".to_string(), "OnClick".to_string()],
            reflective_markers: vec![
                "RuntimeMethodInfo.Invoke".to_string(),
                "MethodBase.Invoke".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Minimum seconds between two non-forced cache rebuilds.
    pub cooldown_seconds: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub directory: PathBuf,
    pub capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("probe/logs"),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub tick_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { tick_ms: TICK_MS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = ProbeConfig::from_toml("[trace]\ntrace_seconds = 1.5\n").unwrap();
        assert_eq!(cfg.trace.trace_seconds, 1.5);
        assert!(cfg.trace.enable_trace);
        assert_eq!(cfg.sink.capacity, 20_000);
        assert_eq!(cfg.discovery.max_candidates, 160);
    }

    #[test]
    fn key_lookup_is_case_insensitive() {
        let keys = KeyBindings::default();
        assert_eq!(keys.action_for("f1"), Some(Action::Mark));
        assert_eq!(keys.action_for(" F4 "), Some(Action::ToggleTrace));
        assert_eq!(
            keys.action_for("F3"),
            Some(Action::ForceInvoke(ForceTarget::OnClick))
        );
        assert_eq!(keys.action_for("F9"), None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(ProbeConfig::from_toml("[trace]\ntrace_seconds = \"soon\"").is_err());
    }
}
