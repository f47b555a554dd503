//! Plugin backend — sounds hosted by an external player plugin.
//!
//! The plugin itself (its movie, embedding and scripting wire format) is an
//! external collaborator reached through the narrow `PluginBridge` trait:
//! one handshake, then numbered slots that each hold one source.
//! Plugins do not push progress, so this backend is `Polled`: the manager
//! asks for positions on the plugin cadence and `poll` picks up load and
//! end-of-stream status.
//!
//! `HeadlessBridge` is an in-process bridge driven by the manager clock.
//! It stands in for the plugin in headless hosts and tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    BackendAdapter, BackendDriver, BackendKind, DriverSink, LoadRequest, Probe, SoundSink,
    UpdateMode,
};
use crate::clock::Clock;
use crate::config::ManagerConfig;
use crate::error::{Error, Result};

/// Load progress of one bridge slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotLoad {
    Pending,
    Loaded { duration_ms: Option<u64> },
    Failed(String),
}

/// The plugin's scripting bridge.
pub trait PluginBridge: Send {
    /// Ask the plugin movie at `base_url` whether it is up.
    fn handshake(&mut self, base_url: &str) -> Probe;
    fn open(&mut self, slot: u32, url: &str) -> Result<()>;
    fn close(&mut self, slot: u32);
    fn load_status(&self, slot: u32) -> SlotLoad;
    fn start(&mut self, slot: u32) -> Result<()>;
    /// Stop and rewind.
    fn halt(&mut self, slot: u32) -> Result<()>;
    fn set_paused(&mut self, slot: u32, paused: bool) -> Result<()>;
    fn seek(&mut self, slot: u32, position_ms: u64) -> Result<()>;
    fn set_volume(&mut self, slot: u32, volume: u8) -> Result<()>;
    fn set_pan(&mut self, slot: u32, pan: i8) -> Result<()>;
    fn position(&self, slot: u32) -> Result<u64>;
    fn finished(&self, slot: u32) -> bool;
    /// Volume and pan last applied to a slot.
    fn mix(&self, slot: u32) -> Option<(u8, i8)>;
    /// Forget the handshake and every slot.
    fn reset(&mut self) {}
}

pub type SharedBridge = Arc<Mutex<Box<dyn PluginBridge>>>;

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Backend driver over a plugin bridge.
pub struct PluginDriver {
    bridge: SharedBridge,
    next_slot: u32,
    pending: Option<(DriverSink, String)>,
}

impl PluginDriver {
    pub fn new(bridge: impl PluginBridge + 'static) -> Self {
        Self {
            bridge: Arc::new(Mutex::new(Box::new(bridge))),
            next_slot: 1,
            pending: None,
        }
    }

    pub fn bridge(&self) -> SharedBridge {
        Arc::clone(&self.bridge)
    }
}

impl BackendDriver for PluginDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Plugin
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Polled
    }

    fn probe(&mut self, config: &ManagerConfig, sink: DriverSink) -> Probe {
        let probe = self.bridge.lock().handshake(&config.base_url);
        if probe == Probe::Pending {
            self.pending = Some((sink, config.base_url.clone()));
        }
        probe
    }

    fn poll(&mut self) {
        let Some((sink, base_url)) = self.pending.as_ref() else {
            return;
        };
        match self.bridge.lock().handshake(base_url) {
            Probe::Pending => return,
            Probe::Ready => sink.ready(),
            Probe::Failed(reason) => sink.failed(reason),
        }
        self.pending = None;
    }

    fn create_adapter(&mut self) -> Result<Box<dyn BackendAdapter>> {
        let slot = self.next_slot;
        self.next_slot += 1;
        Ok(Box::new(PluginAdapter::new(Arc::clone(&self.bridge), slot)))
    }

    fn shutdown(&mut self) {
        self.pending = None;
        self.bridge.lock().reset();
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// One sound slot in the plugin.
pub struct PluginAdapter {
    bridge: SharedBridge,
    slot: u32,
    sink: Option<SoundSink>,
    load_reported: bool,
    loaded: bool,
    finish_reported: bool,
    volume: u8,
    muted: bool,
    disposed: bool,
}

impl PluginAdapter {
    fn new(bridge: SharedBridge, slot: u32) -> Self {
        Self {
            bridge,
            slot,
            sink: None,
            load_reported: false,
            loaded: false,
            finish_reported: false,
            volume: 100,
            muted: false,
            disposed: false,
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    fn alive(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::BackendUnavailable(format!(
                "plugin slot {} disposed",
                self.slot
            )));
        }
        Ok(())
    }
}

impl BackendAdapter for PluginAdapter {
    fn load(&mut self, request: &LoadRequest, sink: SoundSink) -> Result<()> {
        self.alive()?;
        self.bridge.lock().open(self.slot, &request.url)?;
        self.sink = Some(sink);
        self.load_reported = false;
        self.loaded = false;
        self.finish_reported = false;
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        self.alive()?;
        self.bridge.lock().close(self.slot);
        self.sink = None;
        self.loaded = false;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.alive()?;
        self.finish_reported = false;
        self.bridge.lock().start(self.slot)
    }

    fn stop(&mut self) -> Result<()> {
        self.alive()?;
        self.bridge.lock().halt(self.slot)
    }

    fn pause(&mut self) -> Result<()> {
        self.alive()?;
        self.bridge.lock().set_paused(self.slot, true)
    }

    fn resume(&mut self) -> Result<()> {
        self.alive()?;
        self.bridge.lock().set_paused(self.slot, false)
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.alive()?;
        self.finish_reported = false;
        self.bridge.lock().seek(self.slot, position_ms)
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.alive()?;
        self.volume = volume;
        if self.muted {
            return Ok(());
        }
        self.bridge.lock().set_volume(self.slot, volume)
    }

    fn set_pan(&mut self, pan: i8) -> Result<()> {
        self.alive()?;
        self.bridge.lock().set_pan(self.slot, pan)
    }

    // The bridge has no mute; emulate it with volume.
    fn set_mute(&mut self, muted: bool) -> Result<()> {
        self.alive()?;
        self.muted = muted;
        let volume = if muted { 0 } else { self.volume };
        self.bridge.lock().set_volume(self.slot, volume)
    }

    fn position_ms(&self) -> Result<u64> {
        self.alive()?;
        self.bridge.lock().position(self.slot)
    }

    fn duration_ms(&self) -> Result<Option<u64>> {
        self.alive()?;
        match self.bridge.lock().load_status(self.slot) {
            SlotLoad::Loaded { duration_ms } => Ok(duration_ms),
            _ => Ok(None),
        }
    }

    fn poll(&mut self) {
        if self.disposed {
            return;
        }
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let bridge = self.bridge.lock();
        if !self.load_reported {
            match bridge.load_status(self.slot) {
                SlotLoad::Pending => return,
                SlotLoad::Loaded { duration_ms } => {
                    self.loaded = true;
                    sink.loaded(duration_ms);
                }
                SlotLoad::Failed(reason) => sink.load_failed(reason),
            }
            self.load_reported = true;
        }
        if self.loaded && !self.finish_reported && bridge.finished(self.slot) {
            self.finish_reported = true;
            sink.finished();
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.bridge.lock().close(self.slot);
        self.sink = None;
        self.disposed = true;
    }
}

// ---------------------------------------------------------------------------
// Headless bridge
// ---------------------------------------------------------------------------

struct Slot {
    url: String,
    opened_at: u64,
    playing: bool,
    paused: bool,
    /// Clock time at which `offset_ms` was last captured.
    anchor_ms: u64,
    offset_ms: u64,
    volume: u8,
    pan: i8,
}

/// Clock-driven in-process plugin bridge.
pub struct HeadlessBridge {
    clock: Arc<dyn Clock>,
    /// `None`: the handshake never completes.
    handshake_after_ms: Option<u64>,
    handshake_started: Option<u64>,
    load_latency_ms: u64,
    catalog: HashMap<String, u64>,
    permissive: bool,
    slots: HashMap<u32, Slot>,
}

impl HeadlessBridge {
    /// Immediate handshake, instant loads, only catalogued tracks load.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            handshake_after_ms: Some(0),
            handshake_started: None,
            load_latency_ms: 0,
            catalog: HashMap::new(),
            permissive: false,
            slots: HashMap::new(),
        }
    }

    pub fn with_track(mut self, url: impl Into<String>, duration_ms: u64) -> Self {
        self.catalog.insert(url.into(), duration_ms);
        self
    }

    /// Load any url; unknown urls have no duration and never finish.
    pub fn permissive(mut self) -> Self {
        self.permissive = true;
        self
    }

    pub fn handshake_after(mut self, ms: u64) -> Self {
        self.handshake_after_ms = Some(ms);
        self
    }

    pub fn unresponsive(mut self) -> Self {
        self.handshake_after_ms = None;
        self
    }

    pub fn load_latency(mut self, ms: u64) -> Self {
        self.load_latency_ms = ms;
        self
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn slot(&self, slot: u32) -> Result<&Slot> {
        self.slots
            .get(&slot)
            .ok_or_else(|| Error::BackendUnavailable(format!("plugin slot {} not open", slot)))
    }

    fn slot_mut(&mut self, slot: u32) -> Result<&mut Slot> {
        self.slots
            .get_mut(&slot)
            .ok_or_else(|| Error::BackendUnavailable(format!("plugin slot {} not open", slot)))
    }

    fn duration_of(&self, s: &Slot) -> Option<u64> {
        self.catalog.get(&s.url).copied()
    }

    fn status_of(&self, s: &Slot) -> SlotLoad {
        if self.now().saturating_sub(s.opened_at) < self.load_latency_ms {
            return SlotLoad::Pending;
        }
        match self.duration_of(s) {
            Some(d) => SlotLoad::Loaded {
                duration_ms: Some(d),
            },
            None if self.permissive => SlotLoad::Loaded { duration_ms: None },
            None => SlotLoad::Failed(format!("no such track: {}", s.url)),
        }
    }

    fn position_of(&self, s: &Slot) -> u64 {
        let raw = if s.playing && !s.paused {
            s.offset_ms + self.now().saturating_sub(s.anchor_ms)
        } else {
            s.offset_ms
        };
        match self.duration_of(s) {
            Some(d) => raw.min(d),
            None => raw,
        }
    }
}

impl PluginBridge for HeadlessBridge {
    fn handshake(&mut self, _base_url: &str) -> Probe {
        let now = self.now();
        let started = *self.handshake_started.get_or_insert(now);
        match self.handshake_after_ms {
            Some(after) if now.saturating_sub(started) >= after => Probe::Ready,
            _ => Probe::Pending,
        }
    }

    fn open(&mut self, slot: u32, url: &str) -> Result<()> {
        let now = self.now();
        self.slots.insert(
            slot,
            Slot {
                url: url.to_string(),
                opened_at: now,
                playing: false,
                paused: false,
                anchor_ms: now,
                offset_ms: 0,
                volume: 100,
                pan: 0,
            },
        );
        Ok(())
    }

    fn close(&mut self, slot: u32) {
        self.slots.remove(&slot);
    }

    fn load_status(&self, slot: u32) -> SlotLoad {
        match self.slots.get(&slot) {
            Some(s) => self.status_of(s),
            None => SlotLoad::Failed(format!("plugin slot {} not open", slot)),
        }
    }

    fn start(&mut self, slot: u32) -> Result<()> {
        if !matches!(self.load_status(slot), SlotLoad::Loaded { .. }) {
            return Err(Error::BackendUnavailable(format!(
                "plugin slot {} not loaded",
                slot
            )));
        }
        let now = self.now();
        let s = self.slot_mut(slot)?;
        s.playing = true;
        s.paused = false;
        s.anchor_ms = now;
        Ok(())
    }

    fn halt(&mut self, slot: u32) -> Result<()> {
        let s = self.slot_mut(slot)?;
        s.playing = false;
        s.paused = false;
        s.offset_ms = 0;
        Ok(())
    }

    fn set_paused(&mut self, slot: u32, paused: bool) -> Result<()> {
        let position = self.position(slot)?;
        let now = self.now();
        let s = self.slot_mut(slot)?;
        if s.paused == paused {
            return Ok(());
        }
        s.offset_ms = position;
        s.anchor_ms = now;
        s.paused = paused;
        Ok(())
    }

    fn seek(&mut self, slot: u32, position_ms: u64) -> Result<()> {
        let limit = self.duration_of(self.slot(slot)?);
        let now = self.now();
        let s = self.slot_mut(slot)?;
        s.offset_ms = limit.map_or(position_ms, |d| position_ms.min(d));
        s.anchor_ms = now;
        Ok(())
    }

    fn set_volume(&mut self, slot: u32, volume: u8) -> Result<()> {
        self.slot_mut(slot)?.volume = volume;
        Ok(())
    }

    fn set_pan(&mut self, slot: u32, pan: i8) -> Result<()> {
        self.slot_mut(slot)?.pan = pan;
        Ok(())
    }

    fn position(&self, slot: u32) -> Result<u64> {
        Ok(self.position_of(self.slot(slot)?))
    }

    fn finished(&self, slot: u32) -> bool {
        let Some(s) = self.slots.get(&slot) else {
            return false;
        };
        match self.duration_of(s) {
            Some(d) => s.playing && self.position_of(s) >= d,
            None => false,
        }
    }

    fn mix(&self, slot: u32) -> Option<(u8, i8)> {
        self.slots.get(&slot).map(|s| (s.volume, s.pan))
    }

    fn reset(&mut self) {
        self.handshake_started = None;
        self.slots.clear();
    }
}
