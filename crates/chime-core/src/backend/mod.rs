//! Backend capability contract.
//!
//! A `BackendDriver` represents one playback technology (the plugin bridge
//! or native audio). The manager probes drivers to pick the active one,
//! then asks it for one `BackendAdapter` per sound. The manager never knows
//! which concrete backend it is talking to.
//!
//! All methods are called from the manager's context. Adapters report
//! asynchronous progress through the `SoundSink` they get on `load`.

pub mod events;
#[cfg(feature = "http")]
pub mod http;
pub mod media;
#[cfg(feature = "native")]
pub mod native;
pub mod plugin;

use serde::{Deserialize, Serialize};

use crate::config::ManagerConfig;
use crate::error::Result;

pub use events::{DriverSignal, DriverSink, EventQueue, SoundSignal, SoundSink};

/// The two backend variants the manager selects between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Plugin,
    Native,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Plugin => f.write_str("plugin"),
            BackendKind::Native => f.write_str("native"),
        }
    }
}

/// How position updates reach a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// The manager queries `position_ms` on a timer.
    Polled,
    /// The adapter pushes `Position` signals itself.
    Pushed,
}

/// Outcome of a capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Ready,
    /// Result arrives later through the `DriverSink`.
    Pending,
    Failed(String),
}

/// What an adapter needs to open a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    /// Cadence for pushed position signals.
    pub update_interval_ms: u64,
}

/// Per-sound playback resource.
///
/// Operations with no meaning for a backend return `Error::Unsupported`;
/// callers degrade silently. Every call after `dispose` returns
/// `Error::BackendUnavailable`.
pub trait BackendAdapter: Send {
    /// Start opening `request.url`. Completion or failure is signalled
    /// through `sink`, never returned.
    fn load(&mut self, request: &LoadRequest, sink: SoundSink) -> Result<()>;
    /// Release the loaded source, keeping the adapter usable.
    fn unload(&mut self) -> Result<()>;
    /// Start playback from the current backend position.
    fn play(&mut self) -> Result<()>;
    /// Stop playback and rewind to 0.
    fn stop(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn seek(&mut self, position_ms: u64) -> Result<()>;
    /// Volume 0-100.
    fn set_volume(&mut self, volume: u8) -> Result<()>;
    /// Pan -100 (left) to 100 (right).
    fn set_pan(&mut self, pan: i8) -> Result<()>;
    fn set_mute(&mut self, muted: bool) -> Result<()>;
    fn position_ms(&self) -> Result<u64>;
    fn duration_ms(&self) -> Result<Option<u64>>;
    /// Called on every manager tick. Polled backends report load completion
    /// and end of stream from here.
    fn poll(&mut self) {}
    /// Release everything. Idempotent.
    fn dispose(&mut self);
}

/// Backend variant: capability probe plus adapter factory.
pub trait BackendDriver: Send {
    fn kind(&self) -> BackendKind;
    fn update_mode(&self) -> UpdateMode;
    /// Check whether this backend can play at all. A `Pending` result must
    /// be followed by exactly one `sink.ready()` or `sink.failed(..)`.
    fn probe(&mut self, config: &ManagerConfig, sink: DriverSink) -> Probe;
    /// Called on every manager tick, used to advance a pending probe.
    fn poll(&mut self) {}
    fn create_adapter(&mut self) -> Result<Box<dyn BackendAdapter>>;
    /// Tear down backend-wide resources (reboot, destruct).
    fn shutdown(&mut self) {}
}
