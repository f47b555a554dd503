//! Manager configuration.
//!
//! `ManagerConfig` is the flat set of recognized options with defaults.
//! `SetupOptions` is a partial patch merged into it by `Manager::setup`;
//! unknown JSON keys are ignored, not errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::BackendKind;
use crate::error::{Error, Result};

/// Native push cadence used when `native_poll_interval_ms` is unset.
pub const NATIVE_POLL_FALLBACK_MS: u64 = 20;

/// Which backend the manager tries first, and whether it may fall back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    #[default]
    NativeFirst,
    PluginFirst,
    PluginOnly,
}

impl BackendMode {
    /// Backends to probe, in order.
    pub fn candidates(self) -> &'static [BackendKind] {
        match self {
            BackendMode::NativeFirst => &[BackendKind::Native, BackendKind::Plugin],
            BackendMode::PluginFirst => &[BackendKind::Plugin, BackendKind::Native],
            BackendMode::PluginOnly => &[BackendKind::Plugin],
        }
    }
}

/// What a manager-level `set_global_volume` touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VolumeScope {
    /// Every live sound.
    #[default]
    AllSounds,
    /// Only the default volume for sounds created afterwards.
    Defaults,
}

/// Per-sound defaults applied when `SoundOptions` leaves a field unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundDefaults {
    pub volume: u8,
    pub pan: i8,
    pub autoplay: bool,
    pub auto_load: bool,
    pub loops: u32,
}

impl Default for SoundDefaults {
    fn default() -> Self {
        Self {
            volume: 100,
            pan: 0,
            autoplay: false,
            auto_load: false,
            loops: 1,
        }
    }
}

/// Process-lifetime manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub base_url: String,
    pub backend_mode: BackendMode,
    pub plugin_poll_interval_ms: u64,
    pub native_poll_interval_ms: Option<u64>,
    /// Backend init and per-sound load deadline. 0 means wait forever.
    pub load_timeout_ms: u64,
    pub debug: bool,
    pub trace_positions: bool,
    pub volume_scope: VolumeScope,
    pub defaults: SoundDefaults,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            base_url: "./plugin/".into(),
            backend_mode: BackendMode::default(),
            plugin_poll_interval_ms: 50,
            native_poll_interval_ms: None,
            load_timeout_ms: 1000,
            debug: false,
            trace_positions: false,
            volume_scope: VolumeScope::default(),
            defaults: SoundDefaults::default(),
        }
    }
}

impl ManagerConfig {
    pub fn native_poll_interval(&self) -> u64 {
        self.native_poll_interval_ms
            .filter(|&ms| ms > 0)
            .unwrap_or(NATIVE_POLL_FALLBACK_MS)
    }

    /// Polling cadence for a backend kind.
    pub fn poll_interval(&self, kind: BackendKind) -> u64 {
        match kind {
            BackendKind::Plugin => self.plugin_poll_interval_ms.max(1),
            BackendKind::Native => self.native_poll_interval(),
        }
    }

    pub fn load_timeout(&self) -> Option<u64> {
        (self.load_timeout_ms > 0).then_some(self.load_timeout_ms)
    }

    /// Merge every field the patch sets.
    pub fn apply(&mut self, patch: SetupOptions) {
        if let Some(v) = patch.base_url {
            self.base_url = v;
        }
        if let Some(v) = patch.backend_mode {
            self.backend_mode = v;
        }
        if let Some(v) = patch.plugin_poll_interval_ms {
            self.plugin_poll_interval_ms = v;
        }
        if let Some(v) = patch.native_poll_interval_ms {
            self.native_poll_interval_ms = Some(v);
        }
        if let Some(v) = patch.load_timeout_ms {
            self.load_timeout_ms = v;
        }
        if let Some(v) = patch.debug {
            self.debug = v;
        }
        if let Some(v) = patch.trace_positions {
            self.trace_positions = v;
        }
        if let Some(v) = patch.volume_scope {
            self.volume_scope = v;
        }
        if let Some(v) = patch.defaults {
            self.defaults = v;
        }
    }
}

/// Partial configuration accepted by `Manager::setup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    pub base_url: Option<String>,
    pub backend_mode: Option<BackendMode>,
    pub plugin_poll_interval_ms: Option<u64>,
    pub native_poll_interval_ms: Option<u64>,
    pub load_timeout_ms: Option<u64>,
    pub debug: Option<bool>,
    pub trace_positions: Option<bool>,
    pub volume_scope: Option<VolumeScope>,
    pub defaults: Option<SoundDefaults>,
}

impl SetupOptions {
    /// Parse a JSON object. Unknown keys are ignored; a recognized key with
    /// the wrong type is `InvalidOptions`.
    pub fn from_json(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::InvalidOptions("setup expects a JSON object".into()));
        }
        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidOptions(e.to_string()))
    }

    pub fn backend_mode(mut self, mode: BackendMode) -> Self {
        self.backend_mode = Some(mode);
        self
    }

    pub fn load_timeout_ms(mut self, ms: u64) -> Self {
        self.load_timeout_ms = Some(ms);
        self
    }

    pub fn plugin_poll_interval_ms(mut self, ms: u64) -> Self {
        self.plugin_poll_interval_ms = Some(ms);
        self
    }

    pub fn volume_scope(mut self, scope: VolumeScope) -> Self {
        self.volume_scope = Some(scope);
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = Some(on);
        self
    }
}
