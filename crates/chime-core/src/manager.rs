//! chime manager — the façade over backends and sounds.
//!
//! The manager is an explicit context object. Hosts call `start()` once,
//! then `tick()` regularly (a frame callback, a timer, a CLI loop). Every
//! state transition, callback and backend signal is handled inside those
//! calls, on the host's thread.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::events::BackendEvent;
use crate::backend::{BackendDriver, BackendKind, DriverSignal, DriverSink, EventQueue, Probe};
use crate::clock::{Clock, SystemClock};
use crate::config::{ManagerConfig, SetupOptions, VolumeScope};
use crate::error::{log_err, Error, Result};
use crate::models::{clamp_volume, LoadOptions, PlayOptions, SoundCommand, SoundInfo, SoundOptions};
use crate::registry::{BatchOutcome, SoundRegistry};
use crate::sound::{SoundContext, SoundHandle};

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Uninitialized,
    Initializing,
    Ready,
    TimedOut,
    Destroyed,
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReadyState::Uninitialized => "uninitialized",
            ReadyState::Initializing => "initializing",
            ReadyState::Ready => "ready",
            ReadyState::TimedOut => "timed out",
            ReadyState::Destroyed => "destroyed",
        })
    }
}

/// Snapshot handed to ready/timeout callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyStatus {
    pub state: ReadyState,
    pub backend: Option<BackendKind>,
    /// Why initialization failed, when it did.
    pub error: Option<String>,
}

pub type ReadyCallback = Box<dyn FnMut(&ReadyStatus)>;

struct Registered {
    callback: ReadyCallback,
    fired: bool,
}

fn fire_all(callbacks: &mut [Registered], status: &ReadyStatus) {
    for reg in callbacks.iter_mut().filter(|r| !r.fired) {
        reg.fired = true;
        (reg.callback)(status);
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct Manager {
    config: ManagerConfig,
    /// Setup applied after initialization, waiting for reboot/reset.
    staged: Option<ManagerConfig>,
    state: ReadyState,
    drivers: Vec<Box<dyn BackendDriver>>,
    active: Option<usize>,
    /// Backends still to probe in this initialization.
    candidates: Vec<BackendKind>,
    probing: Option<usize>,
    init_deadline: Option<u64>,
    /// Bumped per initialization so stale probe results are ignored.
    generation: u64,
    last_error: Option<String>,
    registry: SoundRegistry,
    queue: EventQueue,
    tokens: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
    on_ready: Vec<Registered>,
    on_timeout: Vec<Registered>,
    muted: bool,
}

impl Manager {
    /// A manager with no backends, driven by `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            config: ManagerConfig::default(),
            staged: None,
            state: ReadyState::Uninitialized,
            drivers: Vec::new(),
            active: None,
            candidates: Vec::new(),
            probing: None,
            init_deadline: None,
            generation: 0,
            last_error: None,
            registry: SoundRegistry::new(),
            queue: EventQueue::new(),
            tokens: Arc::new(AtomicU64::new(0)),
            clock,
            on_ready: Vec::new(),
            on_timeout: Vec::new(),
            muted: false,
        }
    }

    /// A manager on the monotonic system clock.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }

    /// Register a backend. Drivers are matched to `backend_mode` by kind.
    pub fn with_driver(mut self, driver: impl BackendDriver + 'static) -> Self {
        self.add_driver(Box::new(driver));
        self
    }

    pub fn add_driver(&mut self, driver: Box<dyn BackendDriver>) {
        if self.drivers.iter().any(|d| d.kind() == driver.kind()) {
            log::warn!("chime: replacing {} driver", driver.kind());
            self.drivers.retain(|d| d.kind() != driver.kind());
        }
        self.drivers.push(driver);
    }

    // -----------------------------------------------------------------------
    // Configuration and state
    // -----------------------------------------------------------------------

    /// Merge options into the configuration. Before `start` they apply
    /// immediately; once initialized they are staged for the next
    /// `reboot`/`reset`.
    pub fn setup(&mut self, opts: SetupOptions) -> Result<()> {
        match self.state {
            ReadyState::Destroyed => Err(Error::ManagerDestroyed),
            ReadyState::Uninitialized => {
                self.config.apply(opts);
                Ok(())
            }
            ReadyState::Initializing => Err(Error::invalid_state("setup", self.state)),
            ReadyState::Ready | ReadyState::TimedOut => {
                let mut staged = self.staged.take().unwrap_or_else(|| self.config.clone());
                staged.apply(opts);
                self.staged = Some(staged);
                log::info!("chime: setup staged until next reboot");
                Ok(())
            }
        }
    }

    pub fn setup_json(&mut self, value: &Value) -> Result<()> {
        self.setup(SetupOptions::from_json(value)?)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ReadyState::Ready
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        self.active.map(|i| self.drivers[i].kind())
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn status(&self) -> ReadyStatus {
        ReadyStatus {
            state: self.state,
            backend: self.active_backend(),
            error: self.last_error.clone(),
        }
    }

    /// Call `callback` once the manager is ready; immediately when it
    /// already is.
    pub fn on_ready(&mut self, callback: impl FnMut(&ReadyStatus) + 'static) -> Result<()> {
        self.register(true, Box::new(callback))
    }

    /// Call `callback` once initialization times out; immediately when it
    /// already has.
    pub fn on_timeout(&mut self, callback: impl FnMut(&ReadyStatus) + 'static) -> Result<()> {
        self.register(false, Box::new(callback))
    }

    fn register(&mut self, ready: bool, mut callback: ReadyCallback) -> Result<()> {
        self.alive()?;
        let settled = if ready {
            ReadyState::Ready
        } else {
            ReadyState::TimedOut
        };
        let fired = self.state == settled;
        if fired {
            callback(&self.status());
        }
        let list = if ready {
            &mut self.on_ready
        } else {
            &mut self.on_timeout
        };
        list.push(Registered { callback, fired });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Begin backend selection. Does nothing once initialization started.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            ReadyState::Destroyed => return Err(Error::ManagerDestroyed),
            ReadyState::Uninitialized => {}
            _ => return Ok(()),
        }
        self.state = ReadyState::Initializing;
        self.generation += 1;
        self.last_error = None;
        self.candidates = self.config.backend_mode.candidates().to_vec();
        log::info!(
            "chime: starting ({:?}, timeout {}ms)",
            self.config.backend_mode,
            self.config.load_timeout_ms
        );
        self.probe_next();
        Ok(())
    }

    fn probe_next(&mut self) {
        while !self.candidates.is_empty() {
            let kind = self.candidates.remove(0);
            let Some(idx) = self.drivers.iter().position(|d| d.kind() == kind) else {
                log::debug!("chime: no {} driver registered", kind);
                continue;
            };
            let sink = DriverSink::new(self.queue.clone(), kind, self.generation);
            match self.drivers[idx].probe(&self.config, sink) {
                Probe::Ready => return self.settle_ready(idx),
                Probe::Pending => {
                    self.probing = Some(idx);
                    // Each pending candidate gets its own window.
                    self.init_deadline = self
                        .config
                        .load_timeout()
                        .map(|t| self.clock.now_ms() + t);
                    return;
                }
                Probe::Failed(reason) => {
                    log::warn!("chime: {} backend unavailable: {}", kind, reason);
                    self.last_error = Some(format!("{}: {}", kind, reason));
                }
            }
        }
        let reason = self
            .last_error
            .clone()
            .unwrap_or_else(|| "no backend available".into());
        self.settle_timeout(reason);
    }

    fn settle_ready(&mut self, idx: usize) {
        self.active = Some(idx);
        self.probing = None;
        self.init_deadline = None;
        self.candidates.clear();
        self.state = ReadyState::Ready;
        self.last_error = None;
        log::info!("chime: ready on {} backend", self.drivers[idx].kind());
        let status = self.status();
        fire_all(&mut self.on_ready, &status);
    }

    fn settle_timeout(&mut self, reason: String) {
        self.probing = None;
        self.init_deadline = None;
        self.candidates.clear();
        self.state = ReadyState::TimedOut;
        log::warn!("chime: initialization failed: {}", reason);
        self.last_error = Some(reason);
        let status = self.status();
        fire_all(&mut self.on_timeout, &status);
    }

    /// Give up on the candidate that did not answer in time and move on.
    /// The generation bump makes its late answer stale.
    fn abandon_candidate(&mut self) {
        let reason = format!("did not respond within {}ms", self.config.load_timeout_ms);
        if let Some(idx) = self.probing.take() {
            let kind = self.drivers[idx].kind();
            log::warn!("chime: {} backend {}", kind, reason);
            self.last_error = Some(format!("{}: {}", kind, reason));
        } else {
            self.last_error = Some(format!("backend {}", reason));
        }
        self.init_deadline = None;
        self.generation += 1;
        self.probe_next();
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Drive the manager: poll backends, deliver backend signals, enforce
    /// init and load deadlines.
    pub fn tick(&mut self) {
        if self.state == ReadyState::Destroyed {
            return;
        }
        let now = self.clock.now_ms();

        if let Some(idx) = self.probing {
            self.drivers[idx].poll();
        }
        if let Some(idx) = self.active {
            self.drivers[idx].poll();
        }
        self.registry.for_each(|s| s.poll_backend(now));

        for event in self.queue.drain() {
            self.dispatch_event(event);
        }

        if self.state == ReadyState::Initializing
            && self.init_deadline.is_some_and(|deadline| now >= deadline)
        {
            self.abandon_candidate();
        }

        self.registry.for_each(|s| s.check_load_deadline(now));
        self.registry.prune_destroyed();
    }

    fn dispatch_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Driver {
                kind,
                generation,
                signal,
            } => {
                let probing = self.probing.map(|i| self.drivers[i].kind());
                if generation != self.generation
                    || self.state != ReadyState::Initializing
                    || probing != Some(kind)
                {
                    log::debug!("chime: stale {} probe result ignored", kind);
                    return;
                }
                let Some(idx) = self.probing else {
                    return;
                };
                match signal {
                    DriverSignal::Ready => self.settle_ready(idx),
                    DriverSignal::Failed(reason) => {
                        log::warn!("chime: {} backend unavailable: {}", kind, reason);
                        self.last_error = Some(format!("{}: {}", kind, reason));
                        self.probing = None;
                        self.init_deadline = None;
                        self.probe_next();
                    }
                }
            }
            BackendEvent::Sound { id, token, signal } => match self.registry.get_mut(&id) {
                Some(sound) => sound.handle_signal(token, signal),
                None => log::debug!("chime: signal for unknown sound {} dropped", id),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Sounds
    // -----------------------------------------------------------------------

    /// Register a new sound on the active backend.
    pub fn create_sound(&mut self, opts: SoundOptions) -> Result<&mut SoundHandle> {
        self.alive()?;
        if self.state != ReadyState::Ready {
            return Err(Error::BackendUnavailable(format!("manager is {}", self.state)));
        }
        opts.validate()?;
        let autoplay = opts.autoplay.unwrap_or(self.config.defaults.autoplay);
        let auto_load = opts.auto_load.unwrap_or(self.config.defaults.auto_load);
        if (autoplay || auto_load) && opts.url.is_none() {
            return Err(Error::InvalidOptions(format!(
                "sound {}: autoplay and auto_load need a url",
                opts.id
            )));
        }
        if self.registry.contains(&opts.id) {
            return Err(Error::DuplicateIdentifier(opts.id.clone()));
        }

        let idx = self
            .active
            .ok_or_else(|| Error::BackendUnavailable("no active backend".into()))?;
        let adapter = self.drivers[idx].create_adapter()?;
        let ctx = SoundContext {
            queue: self.queue.clone(),
            tokens: Arc::clone(&self.tokens),
            clock: Arc::clone(&self.clock),
            load_timeout_ms: self.config.load_timeout(),
            poll_interval_ms: self.config.poll_interval(self.drivers[idx].kind()),
            update_mode: self.drivers[idx].update_mode(),
            debug: self.config.debug,
            trace_positions: self.config.trace_positions,
        };
        if self.config.debug {
            log::info!("chime: creating sound {}", opts.id);
        }

        let muted = self.muted;
        let sound = self
            .registry
            .create(&opts, adapter, ctx, &self.config.defaults)?;
        if muted {
            sound.mute()?;
        }
        if autoplay {
            let context = format!("autoplay {}", opts.id);
            log_err(sound.play(PlayOptions::default()).map(|_| ()), &context);
        } else if auto_load {
            let context = format!("auto-load {}", opts.id);
            log_err(sound.load(LoadOptions::default()).map(|_| ()), &context);
        }
        Ok(sound)
    }

    pub fn sound(&self, id: &str) -> Option<&SoundHandle> {
        self.registry.get(id)
    }

    pub fn sound_mut(&mut self, id: &str) -> Option<&mut SoundHandle> {
        self.registry.get_mut(id)
    }

    pub fn sound_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn sound_info(&self, id: &str) -> Option<SoundInfo> {
        self.registry.get(id).map(SoundHandle::info)
    }

    pub fn destroy_sound(&mut self, id: &str) -> Result<()> {
        self.alive()?;
        self.registry.destroy(id)?;
        if self.config.debug {
            log::info!("chime: destroyed sound {}", id);
        }
        Ok(())
    }

    fn with_sound(
        &mut self,
        id: &str,
        op: impl FnOnce(&mut SoundHandle) -> Result<&mut SoundHandle>,
    ) -> Result<()> {
        self.alive()?;
        let sound = self
            .registry
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        op(sound).map(|_| ())
    }

    pub fn load(&mut self, id: &str, opts: LoadOptions) -> Result<()> {
        self.with_sound(id, |s| s.load(opts))
    }

    pub fn unload(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::unload)
    }

    pub fn play(&mut self, id: &str, opts: PlayOptions) -> Result<()> {
        self.with_sound(id, |s| s.play(opts))
    }

    pub fn pause(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::pause)
    }

    pub fn resume(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::resume)
    }

    pub fn toggle_pause(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::toggle_pause)
    }

    pub fn stop(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::stop)
    }

    pub fn set_position(&mut self, id: &str, position_ms: u64) -> Result<()> {
        self.with_sound(id, |s| s.set_position(position_ms))
    }

    pub fn set_volume(&mut self, id: &str, volume: i32) -> Result<()> {
        self.with_sound(id, |s| s.set_volume(volume))
    }

    pub fn set_pan(&mut self, id: &str, pan: i32) -> Result<()> {
        self.with_sound(id, |s| s.set_pan(pan))
    }

    pub fn mute(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::mute)
    }

    pub fn unmute(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::unmute)
    }

    pub fn toggle_mute(&mut self, id: &str) -> Result<()> {
        self.with_sound(id, SoundHandle::toggle_mute)
    }

    // -----------------------------------------------------------------------
    // Global operations (best effort)
    // -----------------------------------------------------------------------

    pub fn stop_all(&mut self) -> Result<BatchOutcome> {
        self.alive()?;
        Ok(self.registry.try_each(|s| s.stop().map(|_| ())))
    }

    /// Pause every playing sound.
    pub fn pause_all(&mut self) -> Result<BatchOutcome> {
        self.alive()?;
        Ok(self.registry.try_each(|s| {
            if s.is_playing() {
                s.pause()?;
            }
            Ok(())
        }))
    }

    /// Resume every paused sound.
    pub fn resume_all(&mut self) -> Result<BatchOutcome> {
        self.alive()?;
        Ok(self.registry.try_each(|s| {
            if s.is_playing() {
                s.resume()?;
            }
            Ok(())
        }))
    }

    /// Mute every sound, including ones created later.
    pub fn mute_all(&mut self) -> Result<BatchOutcome> {
        self.alive()?;
        self.muted = true;
        Ok(self.registry.try_each(|s| s.mute().map(|_| ())))
    }

    pub fn unmute_all(&mut self) -> Result<BatchOutcome> {
        self.alive()?;
        self.muted = false;
        Ok(self.registry.try_each(|s| s.unmute().map(|_| ())))
    }

    /// Manager-level volume, applied per `volume_scope`.
    pub fn set_global_volume(&mut self, volume: i32) -> Result<BatchOutcome> {
        self.alive()?;
        match self.config.volume_scope {
            VolumeScope::AllSounds => {
                Ok(self.registry.try_each(|s| s.set_volume(volume).map(|_| ())))
            }
            VolumeScope::Defaults => {
                self.config.defaults.volume = clamp_volume(volume);
                Ok(BatchOutcome::default())
            }
        }
    }

    /// Apply a serialized command.
    pub fn command(&mut self, cmd: SoundCommand) -> Result<()> {
        fn report(outcome: BatchOutcome, what: &str) {
            for (id, e) in &outcome.failed {
                log::warn!("chime: {} skipped {}: {}", what, id, e);
            }
        }

        match cmd {
            SoundCommand::Create(opts) => self.create_sound(opts).map(|_| ()),
            SoundCommand::Destroy { id } => self.destroy_sound(&id),
            SoundCommand::Load { id, options } => self.load(&id, options),
            SoundCommand::Unload { id } => self.unload(&id),
            SoundCommand::Play { id, options } => self.play(&id, options),
            SoundCommand::Pause { id } => self.pause(&id),
            SoundCommand::Resume { id } => self.resume(&id),
            SoundCommand::TogglePause { id } => self.toggle_pause(&id),
            SoundCommand::Stop { id } => self.stop(&id),
            SoundCommand::SetPosition { id, position_ms } => self.set_position(&id, position_ms),
            SoundCommand::SetVolume { id, volume } => self.set_volume(&id, volume),
            SoundCommand::SetPan { id, pan } => self.set_pan(&id, pan),
            SoundCommand::Mute { id } => self.mute(&id),
            SoundCommand::Unmute { id } => self.unmute(&id),
            SoundCommand::ToggleMute { id } => self.toggle_mute(&id),
            SoundCommand::StopAll => self.stop_all().map(|o| report(o, "stop_all")),
            SoundCommand::PauseAll => self.pause_all().map(|o| report(o, "pause_all")),
            SoundCommand::ResumeAll => self.resume_all().map(|o| report(o, "resume_all")),
            SoundCommand::MuteAll => self.mute_all().map(|o| report(o, "mute_all")),
            SoundCommand::UnmuteAll => self.unmute_all().map(|o| report(o, "unmute_all")),
            SoundCommand::SetGlobalVolume { volume } => self
                .set_global_volume(volume)
                .map(|o| report(o, "set_global_volume")),
        }
    }

    /// Parse and apply a JSON command.
    pub fn command_json(&mut self, value: &Value) -> Result<()> {
        let cmd = SoundCommand::from_value(value)
            .ok_or_else(|| Error::InvalidOptions(format!("unrecognized command: {}", value)))?;
        self.command(cmd)
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Destroy every sound, shut backends down and initialize again with
    /// any staged setup. With `reset_events` the ready/timeout callbacks are
    /// dropped; otherwise they fire again on the new outcome.
    pub fn reboot(&mut self, reset_events: bool) -> Result<()> {
        self.alive()?;
        log::info!("chime: rebooting");
        self.teardown();
        if reset_events {
            self.on_ready.clear();
            self.on_timeout.clear();
        } else {
            for reg in self.on_ready.iter_mut().chain(self.on_timeout.iter_mut()) {
                reg.fired = false;
            }
        }
        self.start()
    }

    /// Back to `Uninitialized`: no sounds, no callbacks, staged setup
    /// applied. `start` must be called again.
    pub fn reset(&mut self) -> Result<()> {
        self.alive()?;
        self.teardown();
        self.on_ready.clear();
        self.on_timeout.clear();
        self.muted = false;
        Ok(())
    }

    /// Release everything. Idempotent; every later operation fails with
    /// `ManagerDestroyed`.
    pub fn destruct(&mut self) {
        if self.state == ReadyState::Destroyed {
            return;
        }
        self.teardown();
        self.on_ready.clear();
        self.on_timeout.clear();
        self.state = ReadyState::Destroyed;
        log::info!("chime: destructed");
    }

    fn teardown(&mut self) {
        self.registry.destroy_all();
        for driver in self.drivers.iter_mut() {
            driver.shutdown();
        }
        self.queue.clear();
        if let Some(staged) = self.staged.take() {
            self.config = staged;
        }
        self.active = None;
        self.probing = None;
        self.candidates.clear();
        self.init_deadline = None;
        self.last_error = None;
        self.state = ReadyState::Uninitialized;
    }

    fn alive(&self) -> Result<()> {
        if self.state == ReadyState::Destroyed {
            return Err(Error::ManagerDestroyed);
        }
        Ok(())
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.destruct();
    }
}
