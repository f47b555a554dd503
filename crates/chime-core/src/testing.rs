//! Scripted backend for unit tests: records every adapter call and lets the
//! test emit backend signals by hand.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{
    BackendAdapter, BackendDriver, BackendKind, DriverSink, LoadRequest, Probe, SoundSink,
    UpdateMode,
};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Load(String),
    Unload,
    Play,
    Stop,
    Pause,
    Resume,
    Seek(u64),
    Volume(u8),
    Pan(i8),
    Mute(bool),
    Dispose,
}

#[derive(Default)]
struct RecorderState {
    calls: Vec<Call>,
    sink: Option<SoundSink>,
    position_ms: u64,
    pan_unsupported: bool,
}

/// Test-side view of one scripted adapter.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<RecorderState>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn clear(&self) {
        self.inner.lock().calls.clear();
    }

    /// Sink handed over by the latest `load`.
    pub fn sink(&self) -> SoundSink {
        self.inner
            .lock()
            .sink
            .clone()
            .expect("adapter has not been loaded")
    }

    pub fn set_position(&self, ms: u64) {
        self.inner.lock().position_ms = ms;
    }

    pub fn set_pan_unsupported(&self) {
        self.inner.lock().pan_unsupported = true;
    }

    fn record(&self, call: Call) {
        self.inner.lock().calls.push(call);
    }
}

pub struct ScriptedAdapter {
    rec: Recorder,
    disposed: bool,
}

impl ScriptedAdapter {
    pub fn new(rec: Recorder) -> Self {
        Self {
            rec,
            disposed: false,
        }
    }

    fn call(&self, call: Call) -> Result<()> {
        if self.disposed {
            return Err(Error::BackendUnavailable("disposed".into()));
        }
        self.rec.record(call);
        Ok(())
    }
}

impl BackendAdapter for ScriptedAdapter {
    fn load(&mut self, request: &LoadRequest, sink: SoundSink) -> Result<()> {
        self.call(Call::Load(request.url.clone()))?;
        self.rec.inner.lock().sink = Some(sink);
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        self.call(Call::Unload)
    }

    fn play(&mut self) -> Result<()> {
        self.call(Call::Play)
    }

    fn stop(&mut self) -> Result<()> {
        self.call(Call::Stop)
    }

    fn pause(&mut self) -> Result<()> {
        self.call(Call::Pause)
    }

    fn resume(&mut self) -> Result<()> {
        self.call(Call::Resume)
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.call(Call::Seek(position_ms))
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.call(Call::Volume(volume))
    }

    fn set_pan(&mut self, pan: i8) -> Result<()> {
        if self.rec.inner.lock().pan_unsupported {
            return Err(Error::Unsupported("pan"));
        }
        self.call(Call::Pan(pan))
    }

    fn set_mute(&mut self, muted: bool) -> Result<()> {
        self.call(Call::Mute(muted))
    }

    fn position_ms(&self) -> Result<u64> {
        Ok(self.rec.inner.lock().position_ms)
    }

    fn duration_ms(&self) -> Result<Option<u64>> {
        Ok(None)
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.rec.record(Call::Dispose);
            self.disposed = true;
        }
    }
}

#[derive(Default)]
struct ScriptState {
    adapters: Vec<Recorder>,
    sink: Option<DriverSink>,
    probes: usize,
    shutdowns: usize,
}

/// Test-side view of a scripted driver.
#[derive(Clone, Default)]
pub struct DriverScript {
    inner: Arc<Mutex<ScriptState>>,
}

impl DriverScript {
    /// Recorder of the `index`-th adapter created.
    pub fn adapter(&self, index: usize) -> Recorder {
        self.inner.lock().adapters[index].clone()
    }

    pub fn adapter_count(&self) -> usize {
        self.inner.lock().adapters.len()
    }

    /// Settle a pending probe.
    pub fn complete_probe(&self, ok: bool) {
        let sink = self.inner.lock().sink.clone().expect("no pending probe");
        if ok {
            sink.ready();
        } else {
            sink.failed("scripted failure");
        }
    }

    pub fn probes(&self) -> usize {
        self.inner.lock().probes
    }

    pub fn shutdowns(&self) -> usize {
        self.inner.lock().shutdowns
    }
}

pub struct ScriptedDriver {
    kind: BackendKind,
    update_mode: UpdateMode,
    probe: Probe,
    script: DriverScript,
}

impl ScriptedDriver {
    pub fn new(kind: BackendKind, probe: Probe) -> (Self, DriverScript) {
        let script = DriverScript::default();
        let driver = Self {
            kind,
            update_mode: UpdateMode::Pushed,
            probe,
            script: script.clone(),
        };
        (driver, script)
    }

    pub fn polled(mut self) -> Self {
        self.update_mode = UpdateMode::Polled;
        self
    }
}

impl BackendDriver for ScriptedDriver {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    fn probe(&mut self, _config: &ManagerConfig, sink: DriverSink) -> Probe {
        let mut state = self.script.inner.lock();
        state.probes += 1;
        state.sink = Some(sink);
        self.probe.clone()
    }

    fn create_adapter(&mut self) -> Result<Box<dyn BackendAdapter>> {
        let rec = Recorder::default();
        self.script.inner.lock().adapters.push(rec.clone());
        Ok(Box::new(ScriptedAdapter::new(rec)))
    }

    fn shutdown(&mut self) {
        self.script.inner.lock().shutdowns += 1;
    }
}
