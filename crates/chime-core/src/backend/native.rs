//! Native backend — symphonia decode + cpal output.
//!
//! Per sound:
//! 1. `load` probes the source on a worker thread and reports duration
//! 2. `play` spawns a decoder thread feeding a ring buffer
//! 3. an output thread drains the ring into a cpal stream
//!
//! Position counts the frames the output callback has taken from the ring,
//! so buffered audio does not run it ahead. The output thread pushes it to
//! the sink at the requested cadence and reports end of stream once the ring
//! has drained.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::{SeekMode, SeekTo};
use symphonia::core::units::Time;

use super::media;
use super::{
    BackendAdapter, BackendDriver, BackendKind, DriverSink, LoadRequest, Probe, SoundSink,
    UpdateMode,
};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};

/// No seek requested.
const NO_SEEK: u64 = u64::MAX;
/// Duration not known.
const NO_DURATION: u64 = u64::MAX;
/// About one second of 48 kHz stereo.
const RING_CAPACITY: usize = 48_000 * 2;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Native audio driver: available when the host has a default output device.
#[derive(Default)]
pub struct NativeDriver;

impl NativeDriver {
    pub fn new() -> Self {
        Self
    }
}

impl BackendDriver for NativeDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Pushed
    }

    fn probe(&mut self, _config: &ManagerConfig, _sink: DriverSink) -> Probe {
        match cpal::default_host().default_output_device() {
            Some(device) => {
                log::info!(
                    "chime: native output on {}",
                    device.name().unwrap_or_else(|_| "unknown device".into())
                );
                Probe::Ready
            }
            None => Probe::Failed("no output device".into()),
        }
    }

    fn create_adapter(&mut self) -> Result<Box<dyn BackendAdapter>> {
        Ok(Box::new(NativeAdapter::new()))
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct NativeState {
    playing: AtomicBool,
    paused: AtomicBool,
    muted: AtomicBool,
    /// 0-100.
    volume: AtomicU32,
    /// -100 to 100.
    pan: AtomicI32,
    duration_ms: AtomicU64,
    sample_rate: AtomicU32,
    channels: AtomicU32,
    /// Channel count the output stream was opened with.
    output_channels: AtomicU32,
    /// Rate the output stream runs at; 0 until it is open.
    output_rate: AtomicU32,
    /// Source position the played frame count starts from.
    base_ms: AtomicU64,
    /// Frames the output callback has taken from the ring since `base_ms`.
    /// Only changed with the ring lock held.
    played_frames: AtomicU64,
    samples: Mutex<SampleRing>,
    stop_signal: AtomicBool,
    seek_to_ms: AtomicU64,
    /// Decoder reached end of stream.
    finished: AtomicBool,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl NativeState {
    fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            volume: AtomicU32::new(100),
            pan: AtomicI32::new(0),
            duration_ms: AtomicU64::new(NO_DURATION),
            sample_rate: AtomicU32::new(44_100),
            channels: AtomicU32::new(2),
            output_channels: AtomicU32::new(2),
            output_rate: AtomicU32::new(0),
            base_ms: AtomicU64::new(0),
            played_frames: AtomicU64::new(0),
            samples: Mutex::new(SampleRing::new(capacity)),
            stop_signal: AtomicBool::new(false),
            seek_to_ms: AtomicU64::new(NO_SEEK),
            finished: AtomicBool::new(false),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Signal decoder and output threads and wait for them.
    fn halt(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.samples.lock().clear();
        self.output_rate.store(0, Ordering::SeqCst);

        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Restart position accounting at `ms`.
    fn rebase(&self, ms: u64) {
        let _ring = self.samples.lock();
        self.base_ms.store(ms, Ordering::SeqCst);
        self.played_frames.store(0, Ordering::SeqCst);
    }

    /// Position of the audio handed to the device, clamped to the duration.
    fn played_ms(&self) -> u64 {
        let ms = position_from_frames(
            self.base_ms.load(Ordering::SeqCst),
            self.played_frames.load(Ordering::SeqCst),
            self.output_rate.load(Ordering::SeqCst),
        );
        match self.duration_ms.load(Ordering::SeqCst) {
            NO_DURATION => ms,
            d => ms.min(d),
        }
    }

    fn gain(&self) -> f32 {
        if self.muted.load(Ordering::SeqCst) {
            0.0
        } else {
            self.volume.load(Ordering::SeqCst) as f32 / 100.0
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// One native sound.
pub struct NativeAdapter {
    state: Arc<NativeState>,
    url: Option<String>,
    update_interval_ms: u64,
    sink: Option<SoundSink>,
    disposed: bool,
}

impl NativeAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(NativeState::new()),
            url: None,
            update_interval_ms: 20,
            sink: None,
            disposed: false,
        }
    }

    fn alive(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::BackendUnavailable("native sound disposed".into()));
        }
        Ok(())
    }
}

impl Default for NativeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendAdapter for NativeAdapter {
    fn load(&mut self, request: &LoadRequest, sink: SoundSink) -> Result<()> {
        self.alive()?;
        self.state.halt();
        self.state.rebase(0);
        self.state.duration_ms.store(NO_DURATION, Ordering::SeqCst);
        self.state.seek_to_ms.store(NO_SEEK, Ordering::SeqCst);
        self.url = Some(request.url.clone());
        self.update_interval_ms = request.update_interval_ms.max(1);
        self.sink = Some(sink.clone());

        let url = request.url.clone();
        let state = Arc::clone(&self.state);
        thread::Builder::new()
            .name("chime-load".into())
            .spawn(move || match media::probe_source(&url) {
                Ok(format) => {
                    state.sample_rate.store(format.sample_rate, Ordering::SeqCst);
                    state.channels.store(format.channels, Ordering::SeqCst);
                    if let Some(d) = format.duration_ms {
                        state.duration_ms.store(d, Ordering::SeqCst);
                    }
                    sink.loaded(format.duration_ms);
                }
                Err(e) => sink.load_failed(e.to_string()),
            })
            .map_err(|e| Error::BackendUnavailable(format!("spawn load thread: {}", e)))?;
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        self.alive()?;
        self.state.halt();
        self.url = None;
        self.sink = None;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.alive()?;
        let (Some(url), Some(sink)) = (self.url.clone(), self.sink.clone()) else {
            return Err(Error::BackendUnavailable("no source loaded".into()));
        };
        self.state.halt();

        let state = &self.state;
        if state.seek_to_ms.load(Ordering::SeqCst) == NO_SEEK {
            state.rebase(0);
        }
        state.stop_signal.store(false, Ordering::SeqCst);
        state.playing.store(true, Ordering::SeqCst);
        state.paused.store(false, Ordering::SeqCst);
        state.finished.store(false, Ordering::SeqCst);

        let mut threads = state.threads.lock();

        let decoder_state = Arc::clone(state);
        let decoder_sink = sink.clone();
        threads.push(thread::spawn(move || {
            if let Err(e) = decode_to_ring(&url, &decoder_state) {
                log::error!("chime: decode error: {}", e);
                decoder_sink.error(format!("decode: {}", e));
            }
            decoder_state.finished.store(true, Ordering::SeqCst);
        }));

        let output_state = Arc::clone(state);
        let interval = self.update_interval_ms;
        threads.push(thread::spawn(move || {
            match output_from_ring(Arc::clone(&output_state), &sink, interval) {
                Ok(()) => {
                    if !output_state.stop_signal.load(Ordering::SeqCst) {
                        sink.finished();
                    }
                }
                Err(e) => {
                    log::error!("chime: output error: {}", e);
                    output_state.stop_signal.store(true, Ordering::SeqCst);
                    sink.error(format!("output: {}", e));
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.alive()?;
        self.state.halt();
        self.state.seek_to_ms.store(NO_SEEK, Ordering::SeqCst);
        self.state.rebase(0);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.alive()?;
        self.state.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.alive()?;
        self.state.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.alive()?;
        let target = match self.state.duration_ms.load(Ordering::SeqCst) {
            NO_DURATION => position_ms,
            d => position_ms.min(d),
        };
        self.state.rebase(target);
        self.state.seek_to_ms.store(target, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.alive()?;
        self.state.volume.store(u32::from(volume.min(100)), Ordering::SeqCst);
        Ok(())
    }

    fn set_pan(&mut self, pan: i8) -> Result<()> {
        self.alive()?;
        if self.state.output_channels.load(Ordering::SeqCst) < 2 {
            return Err(Error::Unsupported("pan on a mono output"));
        }
        self.state
            .pan
            .store(i32::from(pan).clamp(-100, 100), Ordering::SeqCst);
        Ok(())
    }

    fn set_mute(&mut self, muted: bool) -> Result<()> {
        self.alive()?;
        self.state.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    fn position_ms(&self) -> Result<u64> {
        self.alive()?;
        Ok(self.state.played_ms())
    }

    fn duration_ms(&self) -> Result<Option<u64>> {
        self.alive()?;
        Ok(match self.state.duration_ms.load(Ordering::SeqCst) {
            NO_DURATION => None,
            d => Some(d),
        })
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.state.halt();
        self.url = None;
        self.sink = None;
        self.disposed = true;
    }
}

impl Drop for NativeAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ---------------------------------------------------------------------------
// Decoder / output threads
// ---------------------------------------------------------------------------

fn decode_to_ring(url: &str, state: &NativeState) -> std::result::Result<(), BoxError> {
    let mut format = media::open_reader(url)?;
    let track = format.default_track().ok_or("no default track")?;
    let track_id = track.id;
    let params = media::format_of(&track.codec_params);
    let sample_rate = params.sample_rate.max(1);
    let channels = params.channels.max(1) as usize;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    // The output thread picks the device rate once its stream is open.
    let device_rate = loop {
        if state.stop_signal.load(Ordering::SeqCst) {
            return Ok(());
        }
        match state.output_rate.load(Ordering::SeqCst) {
            0 => thread::sleep(Duration::from_millis(5)),
            rate => break rate,
        }
    };
    let mut resampler = if device_rate != sample_rate {
        log::info!("chime: resampling {}Hz -> {}Hz", sample_rate, device_rate);
        Some(LinearResampler::new(sample_rate, device_rate, channels as u16))
    } else {
        None
    };

    loop {
        if state.stop_signal.load(Ordering::SeqCst) {
            break;
        }

        let seek_ms = state.seek_to_ms.swap(NO_SEEK, Ordering::SeqCst);
        if seek_ms != NO_SEEK {
            let time = Time::new(seek_ms / 1000, (seek_ms % 1000) as f64 / 1000.0);
            let to = SeekTo::Time {
                time,
                track_id: Some(track_id),
            };
            match format.seek(SeekMode::Accurate, to) {
                Ok(_) => {
                    decoder.reset();
                    let mut ring = state.samples.lock();
                    ring.clear();
                    state.base_ms.store(seek_ms, Ordering::SeqCst);
                    state.played_frames.store(0, Ordering::SeqCst);
                }
                Err(e) => log::warn!("chime: seek to {}ms failed: {}", seek_ms, e),
            }
        }

        while state.paused.load(Ordering::SeqCst) {
            if state.stop_signal.load(Ordering::SeqCst) {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(10));
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = match resampler.as_mut() {
            Some(rs) => rs.process(sample_buf.samples()),
            None => sample_buf.samples().to_vec(),
        };
        if !push_frames(state, &samples, channels) {
            return Ok(());
        }
    }

    Ok(())
}

/// Push whole frames as the ring frees up, so packets larger than the ring
/// still get through. Returns false when stopped first.
fn push_frames(state: &NativeState, samples: &[f32], channels: usize) -> bool {
    let channels = channels.max(1);
    let mut rest = samples;
    loop {
        {
            let mut ring = state.samples.lock();
            let n = ring.free().min(rest.len()) / channels * channels;
            ring.push(&rest[..n]);
            rest = &rest[n..];
        }
        if rest.is_empty() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
        if state.stop_signal.load(Ordering::SeqCst) {
            return false;
        }
    }
}

/// Stream rate and channel count chosen for one playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputPlan {
    rate: u32,
    channels: u16,
}

/// One supported output range: format, channels, min and max rate.
type OutputRange = (cpal::SampleFormat, u16, u32, u32);

/// Play at the track rate when an f32 range covers it, else at the device
/// default, which must be f32.
fn plan_output(
    track_rate: u32,
    track_channels: u16,
    ranges: &[OutputRange],
    default: (cpal::SampleFormat, u16, u32),
) -> std::result::Result<OutputPlan, String> {
    let track_channels = track_channels.max(1);
    let matching = ranges.iter().find(|(fmt, ch, min, max)| {
        *fmt == cpal::SampleFormat::F32
            && *ch >= track_channels
            && *min <= track_rate
            && *max >= track_rate
    });
    if let Some((_, ch, _, _)) = matching {
        return Ok(OutputPlan {
            rate: track_rate,
            channels: track_channels.max(2).min(*ch),
        });
    }
    let (fmt, channels, rate) = default;
    if fmt != cpal::SampleFormat::F32 {
        return Err(format!("device does not support f32 output (got {:?})", fmt));
    }
    Ok(OutputPlan { rate, channels })
}

fn device_plan(
    device: &cpal::Device,
    track_rate: u32,
    track_channels: u16,
) -> std::result::Result<OutputPlan, BoxError> {
    let ranges: Vec<OutputRange> = device
        .supported_output_configs()
        .map(|configs| {
            configs
                .map(|r| {
                    (
                        r.sample_format(),
                        r.channels(),
                        r.min_sample_rate().0,
                        r.max_sample_rate().0,
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    let default_cfg = device.default_output_config()?;
    let default = (
        default_cfg.sample_format(),
        default_cfg.channels(),
        default_cfg.sample_rate().0,
    );
    Ok(plan_output(track_rate, track_channels, &ranges, default)?)
}

/// Fill one device buffer from the ring and count the frames consumed.
fn render(state: &NativeState, data: &mut [f32], out_channels: u16) {
    if state.paused.load(Ordering::SeqCst) {
        data.fill(0.0);
        return;
    }
    let ring_ch = state.channels.load(Ordering::SeqCst).max(1) as u16;
    {
        let mut ring = state.samples.lock();
        let pulled = if ring_ch == out_channels || out_channels == 0 {
            ring.pull(data)
        } else {
            let frames = data.len() / out_channels as usize;
            let mut tmp = vec![0.0f32; frames * ring_ch as usize];
            let n = ring.pull(&mut tmp);
            adapt_channels(&tmp, ring_ch, data, out_channels);
            n
        };
        state
            .played_frames
            .fetch_add((pulled / ring_ch as usize) as u64, Ordering::SeqCst);
    }
    let gain = state.gain();
    let (left, right) = pan_gains(state.pan.load(Ordering::SeqCst));
    apply_gains(data, out_channels, gain * left, gain * right);
}

fn output_from_ring(
    state: Arc<NativeState>,
    sink: &SoundSink,
    interval_ms: u64,
) -> std::result::Result<(), BoxError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or("no output device")?;

    let track_rate = state.sample_rate.load(Ordering::SeqCst);
    let track_channels = state.channels.load(Ordering::SeqCst).max(1) as u16;
    let plan = device_plan(&device, track_rate, track_channels)?;
    let config = cpal::StreamConfig {
        channels: plan.channels,
        sample_rate: cpal::SampleRate(plan.rate),
        buffer_size: cpal::BufferSize::Default,
    };
    state
        .output_channels
        .store(u32::from(plan.channels), Ordering::SeqCst);

    let cb_state = Arc::clone(&state);
    let out_channels = plan.channels;
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(&cb_state, data, out_channels),
        move |err| {
            log::error!("chime: cpal error: {}", err);
        },
        None,
    )?;

    stream.play()?;
    state.output_rate.store(plan.rate, Ordering::SeqCst);

    let tick = Duration::from_millis(interval_ms.clamp(1, 25));
    let mut last_reported: Option<u64> = None;
    loop {
        if state.stop_signal.load(Ordering::SeqCst) {
            break;
        }
        let pos = state.played_ms();
        let due = last_reported.map_or(true, |last| pos < last || pos >= last + interval_ms);
        if due && !state.paused.load(Ordering::SeqCst) {
            sink.position(pos);
            last_reported = Some(pos);
        }
        let finished = state.finished.load(Ordering::SeqCst);
        if finished && state.samples.lock().len == 0 {
            break;
        }
        thread::sleep(tick);
    }

    state.playing.store(false, Ordering::SeqCst);
    Ok(())
}

/// Source position after `frames` output frames at `rate`, from `base_ms`.
fn position_from_frames(base_ms: u64, frames: u64, rate: u32) -> u64 {
    if rate == 0 {
        return base_ms;
    }
    base_ms + frames * 1000 / u64::from(rate)
}

// ---------------------------------------------------------------------------
// DSP helpers
// ---------------------------------------------------------------------------

/// Left/right gains for a pan of -100..=100. Centre leaves both at unity.
fn pan_gains(pan: i32) -> (f32, f32) {
    let p = pan.clamp(-100, 100) as f32 / 100.0;
    if p >= 0.0 {
        (1.0 - p, 1.0)
    } else {
        (1.0, 1.0 + p)
    }
}

/// Scale interleaved frames; channels past the first two take the left gain.
fn apply_gains(data: &mut [f32], channels: u16, left: f32, right: f32) {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        for s in data.iter_mut() {
            *s *= left.max(right);
        }
        return;
    }
    for frame in data.chunks_mut(channels) {
        for (c, s) in frame.iter_mut().enumerate() {
            *s *= if c == 1 { right } else { left };
        }
    }
}

struct SampleRing {
    buf: Vec<f32>,
    read_pos: usize,
    write_pos: usize,
    len: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity],
            read_pos: 0,
            write_pos: 0,
            len: 0,
        }
    }

    fn free(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Samples past capacity are dropped.
    fn push(&mut self, samples: &[f32]) {
        let cap = self.buf.len();
        for &s in samples.iter().take(self.free()) {
            self.buf[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % cap;
            self.len += 1;
        }
    }

    /// Fill `out`, zero-padding on underflow. Returns samples read.
    fn pull(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.len);
        let cap = self.buf.len();
        for sample in out.iter_mut().take(n) {
            *sample = self.buf[self.read_pos];
            self.read_pos = (self.read_pos + 1) % cap;
        }
        self.len -= n;
        out[n..].fill(0.0);
        n
    }

    fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.len = 0;
    }
}

struct LinearResampler {
    ratio: f64,
    phase: f64,
    channels: usize,
}

impl LinearResampler {
    fn new(src_rate: u32, dst_rate: u32, channels: u16) -> Self {
        Self {
            ratio: f64::from(dst_rate) / f64::from(src_rate.max(1)),
            phase: 0.0,
            channels: usize::from(channels.max(1)),
        }
    }

    fn is_needed(&self) -> bool {
        (self.ratio - 1.0).abs() > 0.001
    }

    fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if !self.is_needed() {
            return input.to_vec();
        }
        let ch = self.channels;
        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }
        let out_frames = (in_frames as f64 * self.ratio).ceil() as usize;
        let mut output = Vec::with_capacity(out_frames * ch);

        for _ in 0..out_frames {
            let idx = self.phase as usize;
            if idx >= in_frames {
                break;
            }
            let frac = (self.phase - idx as f64) as f32;
            let next = (idx + 1).min(in_frames - 1);
            for c in 0..ch {
                let s0 = input[idx * ch + c];
                let s1 = input[next * ch + c];
                output.push(s0 + (s1 - s0) * frac);
            }
            self.phase += 1.0 / self.ratio;
        }

        self.phase = (self.phase - in_frames as f64).max(0.0);
        output
    }
}

/// Up/down-mix interleaved samples between channel counts.
fn adapt_channels(src: &[f32], src_ch: u16, dst: &mut [f32], dst_ch: u16) {
    let src_ch = usize::from(src_ch.max(1));
    let dst_ch = usize::from(dst_ch.max(1));
    let sample = |i: usize| src.get(i).copied().unwrap_or(0.0);

    for (f, frame) in dst.chunks_mut(dst_ch).enumerate() {
        let off = f * src_ch;
        if src_ch == 1 {
            frame.fill(sample(off));
        } else if dst_ch == 1 {
            let sum: f32 = (0..src_ch).map(|c| sample(off + c)).sum();
            frame[0] = sum / src_ch as f32;
        } else {
            for (c, out) in frame.iter_mut().enumerate() {
                *out = if c < src_ch { sample(off + c) } else { 0.0 };
            }
        }
    }
}
