//! Sound option records and state snapshots.
//!
//! Options structs replace positional optional arguments: every field is
//! optional and falls back to the manager's `SoundDefaults`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MIN_VOLUME: i32 = 0;
pub const MAX_VOLUME: i32 = 100;
pub const MIN_PAN: i32 = -100;
pub const MAX_PAN: i32 = 100;

pub fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(MIN_VOLUME, MAX_VOLUME) as u8
}

pub fn clamp_pan(pan: i32) -> i8 {
    pan.clamp(MIN_PAN, MAX_PAN) as i8
}

/// Playback status. Paused is a flag on top of `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayState::Stopped => f.write_str("stopped"),
            PlayState::Playing => f.write_str("playing"),
        }
    }
}

/// Backend resource status of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// Creation parameters for a sound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundOptions {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub volume: Option<i32>,
    #[serde(default)]
    pub pan: Option<i32>,
    #[serde(default)]
    pub autoplay: Option<bool>,
    #[serde(default)]
    pub auto_load: Option<bool>,
    #[serde(default)]
    pub loops: Option<u32>,
}

impl SoundOptions {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn volume(mut self, volume: i32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn pan(mut self, pan: i32) -> Self {
        self.pan = Some(pan);
        self
    }

    pub fn autoplay(mut self, on: bool) -> Self {
        self.autoplay = Some(on);
        self
    }

    pub fn auto_load(mut self, on: bool) -> Self {
        self.auto_load = Some(on);
        self
    }

    pub fn loops(mut self, loops: u32) -> Self {
        self.loops = Some(loops);
        self
    }

    /// Synchronous checks done before a sound is registered.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidOptions("sound id must not be empty".into()));
        }
        if matches!(self.url.as_deref(), Some(u) if u.trim().is_empty()) {
            return Err(Error::InvalidOptions(format!("sound {}: url is empty", self.id)));
        }
        if self.loops == Some(0) {
            return Err(Error::InvalidOptions(format!("sound {}: loops must be at least 1", self.id)));
        }
        Ok(())
    }
}

/// Options for a single `play` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayOptions {
    /// Start position. Defaults to the current position of a stopped sound.
    pub from: Option<u64>,
    /// Finish when the position reaches this value.
    pub to: Option<u64>,
    pub loops: Option<u32>,
    pub volume: Option<i32>,
    pub pan: Option<i32>,
    /// Resume a paused sound instead of restarting it.
    pub resume: bool,
}

impl PlayOptions {
    pub fn from_ms(mut self, ms: u64) -> Self {
        self.from = Some(ms);
        self
    }

    pub fn to_ms(mut self, ms: u64) -> Self {
        self.to = Some(ms);
        self
    }

    pub fn loops(mut self, loops: u32) -> Self {
        self.loops = Some(loops);
        self
    }

    pub fn resume(mut self) -> Self {
        self.resume = true;
        self
    }
}

/// Options for `load`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// New source. `None` reuses the sound's current url.
    pub url: Option<String>,
    pub autoplay: bool,
}

impl LoadOptions {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            autoplay: false,
        }
    }

    pub fn autoplay(mut self) -> Self {
        self.autoplay = true;
        self
    }
}

/// Read-only view of a sound, handed to callbacks and serialized over FFI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundInfo {
    pub id: String,
    pub url: Option<String>,
    pub play_state: PlayState,
    pub paused: bool,
    pub load_state: LoadState,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: u8,
    pub pan: i8,
    pub muted: bool,
    pub loops_remaining: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_volume_and_pan() {
        assert_eq!(clamp_volume(-20), 0);
        assert_eq!(clamp_volume(55), 55);
        assert_eq!(clamp_volume(250), 100);
        assert_eq!(clamp_pan(-300), -100);
        assert_eq!(clamp_pan(300), 100);
        assert_eq!(clamp_pan(-7), -7);
    }

    #[test]
    fn validate_rejects_empty_id_and_url() {
        assert!(SoundOptions::new("a", "x.mp3").validate().is_ok());
        assert!(matches!(
            SoundOptions::new("  ", "x.mp3").validate(),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            SoundOptions::new("a", "").validate(),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            SoundOptions::new("a", "x.mp3").loops(0).validate(),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[test]
    fn sound_options_from_json_defaults_missing_fields() {
        let opts: SoundOptions =
            serde_json::from_value(serde_json::json!({"id": "a", "url": "x.mp3", "volume": 50}))
                .unwrap();
        assert_eq!(opts.volume, Some(50));
        assert_eq!(opts.autoplay, None);
        assert_eq!(opts.pan, None);
    }
}
