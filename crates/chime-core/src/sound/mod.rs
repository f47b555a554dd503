//! Per-sound state and lifecycle.
//!
//! A `SoundHandle` owns exactly one backend adapter. User-facing state
//! (play state, volume, pan, mute, position) lives here and is always
//! updated synchronously; backend commands are applied immediately once the
//! source is loaded and queued in order before that.

pub mod watch;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::{BackendAdapter, EventQueue, LoadRequest, SoundSignal, SoundSink, UpdateMode};
use crate::clock::Clock;
use crate::config::SoundDefaults;
use crate::error::{log_err, Error, Result};
use crate::models::{
    clamp_pan, clamp_volume, LoadOptions, LoadState, PlayOptions, PlayState, SoundInfo,
    SoundOptions,
};

pub use watch::{PositionWatchRegistry, WatchCallback, WatchId};

/// Lifecycle notification delivered to `on_event` listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundEvent {
    Loaded,
    LoadFailed(Error),
    Play,
    Pause,
    Resume,
    Stop,
    Finish,
    Position(u64),
    Error(String),
}

pub type EventListener = Box<dyn FnMut(&SoundInfo, &SoundEvent)>;

/// Manager-wide settings every handle needs.
#[derive(Clone)]
pub(crate) struct SoundContext {
    pub queue: EventQueue,
    /// Source of load tokens, shared by all sounds of one manager.
    pub tokens: Arc<AtomicU64>,
    pub clock: Arc<dyn Clock>,
    pub load_timeout_ms: Option<u64>,
    pub poll_interval_ms: u64,
    pub update_mode: UpdateMode,
    pub debug: bool,
    pub trace_positions: bool,
}

impl SoundContext {
    fn next_token(&self) -> u64 {
        self.tokens.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendCommand {
    Play,
    Stop,
    Pause,
    Resume,
    Seek(u64),
    SetVolume(u8),
    SetPan(i8),
    SetMute(bool),
}

pub struct SoundHandle {
    id: String,
    url: Option<String>,
    play_state: PlayState,
    paused: bool,
    load_state: LoadState,
    volume: u8,
    pan: i8,
    muted: bool,
    position_ms: u64,
    duration_ms: Option<u64>,
    loops: u32,
    loops_remaining: u32,
    stop_at: Option<u64>,
    adapter: Box<dyn BackendAdapter>,
    ctx: SoundContext,
    token: u64,
    load_deadline: Option<u64>,
    pending: VecDeque<BackendCommand>,
    watches: PositionWatchRegistry,
    listeners: Vec<EventListener>,
    /// Last position watches were evaluated up to.
    watch_floor: Option<u64>,
    last_poll_ms: Option<u64>,
    destroyed: bool,
}

impl SoundHandle {
    pub(crate) fn new(
        opts: &SoundOptions,
        defaults: &SoundDefaults,
        adapter: Box<dyn BackendAdapter>,
        ctx: SoundContext,
    ) -> Self {
        let loops = opts.loops.unwrap_or(defaults.loops).max(1);
        Self {
            id: opts.id.clone(),
            url: opts.url.clone(),
            play_state: PlayState::Stopped,
            paused: false,
            load_state: LoadState::Unloaded,
            volume: clamp_volume(opts.volume.unwrap_or(i32::from(defaults.volume))),
            pan: clamp_pan(opts.pan.unwrap_or(i32::from(defaults.pan))),
            muted: false,
            position_ms: 0,
            duration_ms: None,
            loops,
            loops_remaining: 0,
            stop_at: None,
            adapter,
            ctx,
            token: 0,
            load_deadline: None,
            pending: VecDeque::new(),
            watches: PositionWatchRegistry::new(),
            listeners: Vec::new(),
            watch_floor: None,
            last_poll_ms: None,
            destroyed: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn pan(&self) -> i8 {
        self.pan
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn info(&self) -> SoundInfo {
        SoundInfo {
            id: self.id.clone(),
            url: self.url.clone(),
            play_state: self.play_state,
            paused: self.paused,
            load_state: self.load_state,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            volume: self.volume,
            pan: self.pan,
            muted: self.muted,
            loops_remaining: self.loops_remaining,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Load `opts.url`, or the current url when unset. Loading the url that
    /// is already loading or loaded does nothing.
    pub fn load(&mut self, opts: LoadOptions) -> Result<&mut Self> {
        self.alive("load")?;
        let url = opts
            .url
            .or_else(|| self.url.clone())
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::InvalidOptions(format!("sound {}: no url to load", self.id)))?;

        let active = matches!(self.load_state, LoadState::Loading | LoadState::Loaded);
        if !(active && self.url.as_deref() == Some(url.as_str())) {
            self.reset_playback();
            self.cancel_load();
            if active {
                log_err(self.adapter.unload(), &format!("unload {}", self.id));
            }
            self.begin_load(url)?;
        }

        if opts.autoplay && self.play_state == PlayState::Stopped {
            self.play(PlayOptions::default())?;
        }
        Ok(self)
    }

    pub fn play(&mut self, opts: PlayOptions) -> Result<&mut Self> {
        self.alive("play")?;
        if opts.loops == Some(0) {
            return Err(Error::InvalidOptions(format!(
                "sound {}: loops must be at least 1",
                self.id
            )));
        }
        if let Some(v) = opts.volume {
            self.set_volume(v)?;
        }
        if let Some(p) = opts.pan {
            self.set_pan(p)?;
        }
        if let Some(loops) = opts.loops {
            self.loops = loops;
        }

        let restarting = self.play_state == PlayState::Playing;
        if restarting && opts.resume {
            return self.resume();
        }

        if matches!(self.load_state, LoadState::Unloaded | LoadState::Failed) {
            self.load(LoadOptions::default())?;
        }

        let from = match opts.from {
            Some(ms) => self.clamp_position(ms),
            None if restarting => 0,
            None => self.position_ms,
        };
        self.stop_at = opts.to;
        self.loops_remaining = self.loops - 1;
        self.position_ms = from;
        self.watches.rearm_from(from);
        self.watch_floor = from.checked_sub(1);
        self.last_poll_ms = None;
        self.play_state = PlayState::Playing;
        self.paused = false;

        if from > 0 || restarting {
            self.dispatch(BackendCommand::Seek(from));
        }
        self.dispatch(BackendCommand::Play);
        self.log_debug(format_args!("play from {}ms", from));
        self.emit(SoundEvent::Play);
        Ok(self)
    }

    /// Stop and rewind. Cancels a load still in flight.
    pub fn stop(&mut self) -> Result<&mut Self> {
        self.alive("stop")?;
        match self.load_state {
            LoadState::Loading => {
                self.cancel_load();
                self.load_state = LoadState::Unloaded;
                log_err(self.adapter.unload(), &format!("unload {}", self.id));
            }
            LoadState::Loaded => self.dispatch(BackendCommand::Stop),
            _ => {}
        }
        self.reset_playback();
        Ok(self)
    }

    pub fn pause(&mut self) -> Result<&mut Self> {
        self.alive("pause")?;
        self.require_playing("pause")?;
        if !self.paused {
            self.dispatch(BackendCommand::Pause);
            self.paused = true;
            self.emit(SoundEvent::Pause);
        }
        Ok(self)
    }

    pub fn resume(&mut self) -> Result<&mut Self> {
        self.alive("resume")?;
        self.require_playing("resume")?;
        if self.paused {
            self.dispatch(BackendCommand::Resume);
            self.paused = false;
            self.last_poll_ms = None;
            self.emit(SoundEvent::Resume);
        }
        Ok(self)
    }

    pub fn toggle_pause(&mut self) -> Result<&mut Self> {
        self.alive("toggle pause")?;
        self.require_playing("toggle pause")?;
        if self.paused {
            self.resume()
        } else {
            self.pause()
        }
    }

    /// Seek, clamped to the known duration.
    pub fn set_position(&mut self, position_ms: u64) -> Result<&mut Self> {
        self.alive("set position")?;
        let target = self.clamp_position(position_ms);
        self.position_ms = target;
        self.watches.rearm_from(target);
        self.watch_floor = target.checked_sub(1);
        if self.play_state == PlayState::Playing {
            self.dispatch(BackendCommand::Seek(target));
        }
        Ok(self)
    }

    pub fn set_volume(&mut self, volume: i32) -> Result<&mut Self> {
        self.alive("set volume")?;
        self.volume = clamp_volume(volume);
        if !self.muted {
            self.dispatch(BackendCommand::SetVolume(self.volume));
        }
        Ok(self)
    }

    pub fn set_pan(&mut self, pan: i32) -> Result<&mut Self> {
        self.alive("set pan")?;
        self.pan = clamp_pan(pan);
        self.dispatch(BackendCommand::SetPan(self.pan));
        Ok(self)
    }

    pub fn mute(&mut self) -> Result<&mut Self> {
        self.alive("mute")?;
        if !self.muted {
            self.muted = true;
            self.dispatch(BackendCommand::SetMute(true));
            self.dispatch(BackendCommand::SetVolume(0));
        }
        Ok(self)
    }

    pub fn unmute(&mut self) -> Result<&mut Self> {
        self.alive("unmute")?;
        if self.muted {
            self.muted = false;
            self.dispatch(BackendCommand::SetMute(false));
            self.dispatch(BackendCommand::SetVolume(self.volume));
        }
        Ok(self)
    }

    pub fn toggle_mute(&mut self) -> Result<&mut Self> {
        if self.muted {
            self.unmute()
        } else {
            self.mute()
        }
    }

    /// Release the backend source, keeping the sound registered.
    pub fn unload(&mut self) -> Result<&mut Self> {
        self.alive("unload")?;
        let active = matches!(self.load_state, LoadState::Loading | LoadState::Loaded);
        self.reset_playback();
        self.cancel_load();
        if active {
            log_err(self.adapter.unload(), &format!("unload {}", self.id));
        }
        self.load_state = LoadState::Unloaded;
        self.duration_ms = None;
        Ok(self)
    }

    /// Release the adapter and every callback. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.cancel_load();
        self.adapter.dispose();
        self.watches.clear();
        self.listeners.clear();
        self.pending.clear();
        self.play_state = PlayState::Stopped;
        self.paused = false;
        self.load_state = LoadState::Unloaded;
        self.destroyed = true;
        self.log_debug(format_args!("destroyed"));
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    /// Call `callback` every time playback crosses `threshold_ms` going
    /// forward.
    pub fn on_position(
        &mut self,
        threshold_ms: u64,
        callback: impl FnMut(&SoundInfo) + 'static,
    ) -> WatchId {
        self.watches.add(threshold_ms, Box::new(callback), true)
    }

    /// Like `on_position`, removed after the first crossing.
    pub fn on_position_once(
        &mut self,
        threshold_ms: u64,
        callback: impl FnMut(&SoundInfo) + 'static,
    ) -> WatchId {
        self.watches.add(threshold_ms, Box::new(callback), false)
    }

    /// Remove the watch `id` at `threshold_ms`, or every watch there.
    pub fn clear_on_position(&mut self, threshold_ms: u64, id: Option<WatchId>) -> usize {
        self.watches.remove(threshold_ms, id)
    }

    pub fn on_event(&mut self, listener: impl FnMut(&SoundInfo, &SoundEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // -----------------------------------------------------------------------
    // Backend path (driven by the manager)
    // -----------------------------------------------------------------------

    pub(crate) fn handle_signal(&mut self, token: u64, signal: SoundSignal) {
        if self.destroyed || token != self.token {
            log::debug!("chime: {}: stale signal {:?} dropped", self.id, signal);
            return;
        }
        match signal {
            SoundSignal::Loaded { duration_ms } => {
                if self.load_state != LoadState::Loading {
                    return;
                }
                self.load_state = LoadState::Loaded;
                self.load_deadline = None;
                if duration_ms.is_some() {
                    self.duration_ms = duration_ms;
                }
                self.log_debug(format_args!("loaded ({:?}ms)", duration_ms));
                while let Some(cmd) = self.pending.pop_front() {
                    self.apply(cmd);
                }
                self.emit(SoundEvent::Loaded);
            }
            SoundSignal::LoadFailed(reason) => {
                let url = self.url.clone().unwrap_or_default();
                self.fail_load(Error::LoadFailed { url, reason });
            }
            SoundSignal::Position(ms) => self.advance_position(ms),
            SoundSignal::Duration(ms) => self.duration_ms = Some(ms),
            SoundSignal::Finished => self.finish(),
            SoundSignal::Error(message) => {
                log::warn!("chime: {}: backend error: {}", self.id, message);
                self.emit(SoundEvent::Error(message));
            }
        }
    }

    /// Fail a load that has outlived its deadline.
    pub(crate) fn check_load_deadline(&mut self, now_ms: u64) {
        if self.load_state != LoadState::Loading {
            return;
        }
        let (Some(deadline), Some(timeout_ms)) = (self.load_deadline, self.ctx.load_timeout_ms)
        else {
            return;
        };
        if now_ms >= deadline {
            let url = self.url.clone().unwrap_or_default();
            self.fail_load(Error::LoadTimeout { url, timeout_ms });
        }
    }

    /// Let the adapter report progress; query position for polled backends.
    pub(crate) fn poll_backend(&mut self, now_ms: u64) {
        if self.destroyed {
            return;
        }
        self.adapter.poll();
        if self.ctx.update_mode != UpdateMode::Polled
            || self.load_state != LoadState::Loaded
            || self.play_state != PlayState::Playing
            || self.paused
        {
            return;
        }
        let due = self
            .last_poll_ms
            .map_or(true, |last| now_ms >= last + self.ctx.poll_interval_ms);
        if !due {
            return;
        }
        self.last_poll_ms = Some(now_ms);
        match self.adapter.position_ms() {
            Ok(ms) => self.advance_position(ms),
            Err(e) => log::debug!("chime: {}: position query failed: {}", self.id, e),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn alive(&self, op: &'static str) -> Result<()> {
        if self.destroyed {
            return Err(Error::invalid_state(op, "destroyed"));
        }
        Ok(())
    }

    fn require_playing(&self, op: &'static str) -> Result<()> {
        if self.play_state != PlayState::Playing {
            return Err(Error::invalid_state(op, self.play_state));
        }
        Ok(())
    }

    fn clamp_position(&self, ms: u64) -> u64 {
        self.duration_ms.map_or(ms, |d| ms.min(d))
    }

    fn begin_load(&mut self, url: String) -> Result<()> {
        let token = self.ctx.next_token();
        self.token = token;
        self.url = Some(url.clone());
        self.duration_ms = None;
        self.load_state = LoadState::Loading;
        self.load_deadline = self
            .ctx
            .load_timeout_ms
            .map(|t| self.ctx.clock.now_ms() + t);

        self.pending.clear();
        self.pending.push_back(BackendCommand::SetMute(self.muted));
        self.pending
            .push_back(BackendCommand::SetVolume(self.effective_volume()));
        self.pending.push_back(BackendCommand::SetPan(self.pan));

        let request = LoadRequest {
            url,
            update_interval_ms: self.ctx.poll_interval_ms,
        };
        let sink = SoundSink::new(self.ctx.queue.clone(), self.id.clone(), token);
        self.log_debug(format_args!("loading {}", request.url));
        if let Err(e) = self.adapter.load(&request, sink) {
            self.fail_load(e.clone());
            return Err(e);
        }
        Ok(())
    }

    /// Invalidate the in-flight load so its late signals are ignored.
    fn cancel_load(&mut self) {
        if self.load_state == LoadState::Loading {
            self.token = self.ctx.next_token();
            self.load_deadline = None;
            self.pending.clear();
        }
    }

    fn fail_load(&mut self, error: Error) {
        log::warn!("chime: {}: {}", self.id, error);
        self.token = self.ctx.next_token();
        self.load_state = LoadState::Failed;
        self.load_deadline = None;
        self.pending.clear();
        log_err(self.adapter.unload(), &format!("unload {}", self.id));
        self.play_state = PlayState::Stopped;
        self.paused = false;
        self.position_ms = 0;
        self.watches.rearm_all();
        self.watch_floor = None;
        self.emit(SoundEvent::LoadFailed(error));
    }

    /// Stopped at 0 with every watch armed again.
    fn reset_playback(&mut self) {
        let was_playing = self.play_state == PlayState::Playing;
        self.play_state = PlayState::Stopped;
        self.paused = false;
        self.position_ms = 0;
        self.stop_at = None;
        self.watches.rearm_all();
        self.watch_floor = None;
        if was_playing {
            self.emit(SoundEvent::Stop);
        }
    }

    fn advance_position(&mut self, ms: u64) {
        if self.play_state != PlayState::Playing || self.paused {
            return;
        }
        let ms = self.clamp_position(ms);
        if ms < self.position_ms {
            self.watches.rearm_from(ms);
            self.watch_floor = ms.checked_sub(1);
        }
        let floor = self.watch_floor;
        self.position_ms = ms;
        let info = self.info();
        self.watches.evaluate(floor, ms, &info);
        self.watch_floor = Some(ms);
        if self.ctx.trace_positions {
            log::trace!("chime: {}: position {}ms", self.id, ms);
        }
        self.emit(SoundEvent::Position(ms));

        if self.stop_at.is_some_and(|to| ms >= to) {
            self.finish();
        }
    }

    fn finish(&mut self) {
        if self.play_state != PlayState::Playing {
            return;
        }
        if self.loops_remaining > 0 {
            self.loops_remaining -= 1;
            self.position_ms = 0;
            self.watches.rearm_all();
            self.watch_floor = None;
            self.last_poll_ms = None;
            self.dispatch(BackendCommand::Seek(0));
            self.dispatch(BackendCommand::Play);
            self.log_debug(format_args!("looping, {} left", self.loops_remaining));
            return;
        }
        self.dispatch(BackendCommand::Stop);
        self.play_state = PlayState::Stopped;
        self.paused = false;
        self.position_ms = 0;
        self.stop_at = None;
        self.watches.rearm_all();
        self.watch_floor = None;
        self.emit(SoundEvent::Finish);
    }

    fn effective_volume(&self) -> u8 {
        if self.muted {
            0
        } else {
            self.volume
        }
    }

    /// Apply now when loaded, queue while loading, drop otherwise: state is
    /// replayed from the handle on the next load.
    fn dispatch(&mut self, cmd: BackendCommand) {
        match self.load_state {
            LoadState::Loaded if self.pending.is_empty() => self.apply(cmd),
            LoadState::Loaded | LoadState::Loading => self.pending.push_back(cmd),
            LoadState::Unloaded | LoadState::Failed => {}
        }
    }

    fn apply(&mut self, cmd: BackendCommand) {
        let result = match cmd {
            BackendCommand::Play => self.adapter.play(),
            BackendCommand::Stop => self.adapter.stop(),
            BackendCommand::Pause => self.adapter.pause(),
            BackendCommand::Resume => self.adapter.resume(),
            BackendCommand::Seek(ms) => self.adapter.seek(ms),
            BackendCommand::SetVolume(v) => self.adapter.set_volume(v),
            BackendCommand::SetPan(p) => self.adapter.set_pan(p),
            BackendCommand::SetMute(m) => self.adapter.set_mute(m),
        };
        if let Err(e) = &result {
            if !matches!(e, Error::Unsupported(_)) {
                self.emit(SoundEvent::Error(e.to_string()));
            }
        }
        log_err(result, &format!("{} {:?}", self.id, cmd));
    }

    fn emit(&mut self, event: SoundEvent) {
        if self.listeners.is_empty() {
            return;
        }
        let info = self.info();
        for listener in self.listeners.iter_mut() {
            listener(&info, &event);
        }
    }

    fn log_debug(&self, args: std::fmt::Arguments<'_>) {
        if self.ctx.debug {
            log::info!("chime: {}: {}", self.id, args);
        }
    }
}

impl std::fmt::Debug for SoundHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundHandle")
            .field("id", &self.id)
            .field("play_state", &self.play_state)
            .field("paused", &self.paused)
            .field("load_state", &self.load_state)
            .field("position_ms", &self.position_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::UpdateMode;
    use crate::clock::ManualClock;
    use crate::testing::{Call, Recorder, ScriptedAdapter};

    struct Fixture {
        clock: ManualClock,
        queue: EventQueue,
        rec: Recorder,
        sound: SoundHandle,
    }

    impl Fixture {
        fn new(opts: SoundOptions) -> Self {
            Self::with_mode(opts, UpdateMode::Pushed)
        }

        fn with_mode(opts: SoundOptions, update_mode: UpdateMode) -> Self {
            let clock = ManualClock::new();
            let queue = EventQueue::new();
            let rec = Recorder::default();
            let ctx = SoundContext {
                queue: queue.clone(),
                tokens: Arc::new(AtomicU64::new(0)),
                clock: Arc::new(clock.clone()),
                load_timeout_ms: Some(1000),
                poll_interval_ms: 50,
                update_mode,
                debug: false,
                trace_positions: false,
            };
            let sound = SoundHandle::new(
                &opts,
                &SoundDefaults::default(),
                Box::new(ScriptedAdapter::new(rec.clone())),
                ctx,
            );
            Self {
                clock,
                queue,
                rec,
                sound,
            }
        }

        /// Deliver queued backend signals, as the manager does on tick.
        fn pump(&mut self) {
            for event in self.queue.drain() {
                if let crate::backend::events::BackendEvent::Sound { token, signal, .. } = event {
                    self.sound.handle_signal(token, signal);
                }
            }
        }

        fn load_now(&mut self, duration_ms: Option<u64>) {
            self.rec.sink().loaded(duration_ms);
            self.pump();
            self.rec.clear();
        }
    }

    fn events(sound: &mut SoundHandle) -> Rc<RefCell<Vec<SoundEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        sound.on_event(move |_, e| sink.borrow_mut().push(e.clone()));
        log
    }

    #[test]
    fn commands_queue_until_loaded_then_flush_in_order() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.play(PlayOptions::default()).unwrap();
        f.sound.set_volume(40).unwrap();
        f.sound.set_pan(-20).unwrap();
        assert_eq!(f.rec.calls(), vec![Call::Load("a.mp3".into())]);
        assert_eq!(f.sound.play_state(), PlayState::Playing);

        f.rec.sink().loaded(Some(3000));
        f.pump();
        assert_eq!(
            f.rec.calls(),
            vec![
                Call::Load("a.mp3".into()),
                Call::Mute(false),
                Call::Volume(100),
                Call::Pan(0),
                Call::Play,
                Call::Volume(40),
                Call::Pan(-20),
            ]
        );
        assert_eq!(f.sound.duration_ms(), Some(3000));
    }

    #[test]
    fn play_then_stop_resets_position() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        f.sound.play(PlayOptions::default()).unwrap();
        f.rec.sink().position(800);
        f.pump();
        assert_eq!(f.sound.position_ms(), 800);

        f.sound.stop().unwrap();
        assert_eq!(f.sound.play_state(), PlayState::Stopped);
        assert_eq!(f.sound.position_ms(), 0);
        assert_eq!(f.rec.calls(), vec![Call::Play, Call::Stop]);
    }

    #[test]
    fn same_url_load_is_idempotent() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.sound.load(LoadOptions::url("a.mp3")).unwrap();
        assert_eq!(f.rec.calls(), vec![Call::Load("a.mp3".into())]);

        f.sound.load(LoadOptions::url("b.mp3")).unwrap();
        assert_eq!(
            f.rec.calls(),
            vec![
                Call::Load("a.mp3".into()),
                Call::Unload,
                Call::Load("b.mp3".into())
            ]
        );
    }

    #[test]
    fn load_without_url_is_invalid() {
        let mut f = Fixture::new(SoundOptions {
            id: "bare".into(),
            ..SoundOptions::default()
        });
        assert!(matches!(
            f.sound.load(LoadOptions::default()),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            f.sound.play(PlayOptions::default()),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[test]
    fn pause_from_stopped_is_invalid_state() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        assert!(matches!(
            f.sound.pause(),
            Err(Error::InvalidState { op: "pause", .. })
        ));
        assert!(matches!(
            f.sound.resume(),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            f.sound.toggle_pause(),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn pause_resume_toggle() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        let log = events(&mut f.sound);
        f.sound.play(PlayOptions::default()).unwrap();
        f.sound.pause().unwrap().pause().unwrap();
        assert!(f.sound.is_paused());
        f.sound.toggle_pause().unwrap();
        assert!(!f.sound.is_paused());

        assert_eq!(
            *log.borrow(),
            vec![SoundEvent::Play, SoundEvent::Pause, SoundEvent::Resume]
        );
        assert_eq!(f.rec.calls(), vec![Call::Play, Call::Pause, Call::Resume]);
    }

    #[test]
    fn positions_ignored_while_paused() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        f.sound.play(PlayOptions::default()).unwrap();
        f.sound.pause().unwrap();
        f.rec.sink().position(900);
        f.pump();
        assert_eq!(f.sound.position_ms(), 0);
    }

    #[test]
    fn watch_fires_once_and_rearms_on_seek() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        let hits = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&hits);
        f.sound
            .on_position(1500, move |info| seen.borrow_mut().push(info.position_ms));

        f.sound.play(PlayOptions::default()).unwrap();
        for ms in [400, 1000, 1600, 2000] {
            f.rec.sink().position(ms);
        }
        f.pump();
        assert_eq!(*hits.borrow(), vec![1600]);

        f.sound.set_position(1000).unwrap();
        f.rec.sink().position(1100);
        f.rec.sink().position(1550);
        f.pump();
        assert_eq!(*hits.borrow(), vec![1600, 1550]);
    }

    #[test]
    fn seek_onto_threshold_rearms_it() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        let hits = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&hits);
        f.sound
            .on_position(1500, move |info| seen.borrow_mut().push(info.position_ms));

        f.sound.play(PlayOptions::default()).unwrap();
        f.rec.sink().position(1800);
        f.pump();
        assert_eq!(*hits.borrow(), vec![1800]);

        f.sound.set_position(1500).unwrap();
        assert_eq!(f.rec.calls().last(), Some(&Call::Seek(1500)));
        f.rec.sink().position(1500);
        f.pump();
        assert_eq!(*hits.borrow(), vec![1800, 1500]);
    }

    #[test]
    fn backward_report_rearms_like_a_seek() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(None);
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        f.sound.on_position(500, move |_| *c.borrow_mut() += 1);

        f.sound.play(PlayOptions::default()).unwrap();
        f.rec.sink().position(600);
        f.rec.sink().position(100);
        f.rec.sink().position(700);
        f.pump();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn volume_and_pan_clamp() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.set_volume(150).unwrap();
        assert_eq!(f.sound.volume(), 100);
        f.sound.set_volume(-5).unwrap();
        assert_eq!(f.sound.volume(), 0);
        f.sound.set_pan(-250).unwrap();
        assert_eq!(f.sound.pan(), -100);
        f.sound.set_pan(101).unwrap();
        assert_eq!(f.sound.pan(), 100);
    }

    #[test]
    fn mute_forwards_zero_and_unmute_restores() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3").volume(65));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(1000));

        f.sound.mute().unwrap();
        f.sound.set_volume(30).unwrap();
        assert_eq!(f.rec.calls(), vec![Call::Mute(true), Call::Volume(0)]);
        f.rec.clear();

        f.sound.toggle_mute().unwrap();
        assert_eq!(f.rec.calls(), vec![Call::Mute(false), Call::Volume(30)]);
        assert!(!f.sound.is_muted());
    }

    #[test]
    fn unsupported_pan_keeps_state() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.rec.set_pan_unsupported();
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(1000));
        let log = events(&mut f.sound);
        f.sound.set_pan(40).unwrap();
        assert_eq!(f.sound.pan(), 40);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn stop_during_load_discards_late_loaded() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.play(PlayOptions::default()).unwrap();
        let stale = f.rec.sink();
        f.sound.stop().unwrap();
        assert_eq!(f.sound.load_state(), LoadState::Unloaded);

        stale.loaded(Some(1000));
        f.pump();
        assert_eq!(f.sound.load_state(), LoadState::Unloaded);
        assert!(!f.rec.calls().contains(&Call::Play));
    }

    #[test]
    fn load_deadline_fails_with_timeout() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        let log = events(&mut f.sound);
        f.sound.play(PlayOptions::default()).unwrap();
        f.clock.advance(999);
        f.sound.check_load_deadline(f.clock.now_ms());
        assert_eq!(f.sound.load_state(), LoadState::Loading);

        f.clock.advance(1);
        f.sound.check_load_deadline(f.clock.now_ms());
        assert_eq!(f.sound.load_state(), LoadState::Failed);
        assert_eq!(f.sound.play_state(), PlayState::Stopped);
        assert!(matches!(
            log.borrow().last(),
            Some(SoundEvent::LoadFailed(Error::LoadTimeout {
                timeout_ms: 1000,
                ..
            }))
        ));

        f.rec.sink().loaded(Some(1000));
        f.pump();
        assert_eq!(f.sound.load_state(), LoadState::Failed);
    }

    #[test]
    fn finish_loops_then_stops() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3").loops(2));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(1000));
        let log = events(&mut f.sound);
        f.sound.play(PlayOptions::default()).unwrap();

        f.rec.sink().finished();
        f.pump();
        assert!(f.sound.is_playing());
        assert_eq!(f.rec.calls(), vec![Call::Play, Call::Seek(0), Call::Play]);

        f.rec.sink().finished();
        f.pump();
        assert_eq!(f.sound.play_state(), PlayState::Stopped);
        assert_eq!(log.borrow().last(), Some(&SoundEvent::Finish));
    }

    #[test]
    fn play_to_finishes_early() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        f.sound
            .play(PlayOptions::default().from_ms(1000).to_ms(2000))
            .unwrap();
        assert_eq!(f.rec.calls(), vec![Call::Seek(1000), Call::Play]);

        f.rec.sink().position(2100);
        f.pump();
        assert_eq!(f.sound.play_state(), PlayState::Stopped);
        assert_eq!(f.sound.position_ms(), 0);
    }

    #[test]
    fn play_while_playing_restarts_unless_resume() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        f.sound.play(PlayOptions::default()).unwrap();
        f.rec.sink().position(1200);
        f.pump();
        f.sound.pause().unwrap();
        f.rec.clear();

        f.sound.play(PlayOptions::default().resume()).unwrap();
        assert_eq!(f.rec.calls(), vec![Call::Resume]);
        assert_eq!(f.sound.position_ms(), 1200);

        f.sound.play(PlayOptions::default()).unwrap();
        assert_eq!(f.sound.position_ms(), 0);
        assert_eq!(f.rec.calls(), vec![Call::Resume, Call::Seek(0), Call::Play]);
    }

    #[test]
    fn polled_backend_is_queried_on_cadence() {
        let mut f = Fixture::with_mode(SoundOptions::new("a", "a.mp3"), UpdateMode::Polled);
        f.sound.load(LoadOptions::default()).unwrap();
        f.load_now(Some(5000));
        f.sound.play(PlayOptions::default()).unwrap();

        f.rec.set_position(120);
        f.sound.poll_backend(f.clock.now_ms());
        assert_eq!(f.sound.position_ms(), 120);

        f.rec.set_position(140);
        f.clock.advance(20);
        f.sound.poll_backend(f.clock.now_ms());
        assert_eq!(f.sound.position_ms(), 120);

        f.clock.advance(30);
        f.sound.poll_backend(f.clock.now_ms());
        assert_eq!(f.sound.position_ms(), 140);
    }

    #[test]
    fn destroy_is_idempotent_and_blocks_calls() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        f.sound.on_position(10, |_| {});
        f.sound.destroy();
        f.sound.destroy();
        assert_eq!(f.sound.watch_count(), 0);
        assert_eq!(f.rec.calls(), vec![Call::Dispose]);
        assert!(matches!(
            f.sound.play(PlayOptions::default()),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn load_failure_reaches_listeners() {
        let mut f = Fixture::new(SoundOptions::new("a", "a.mp3"));
        let log = events(&mut f.sound);
        f.sound.play(PlayOptions::default()).unwrap();
        f.rec.sink().load_failed("404");
        f.pump();
        assert_eq!(f.sound.load_state(), LoadState::Failed);
        assert!(matches!(
            log.borrow().last(),
            Some(SoundEvent::LoadFailed(Error::LoadFailed { .. }))
        ));
    }
}
