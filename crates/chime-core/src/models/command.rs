//! Serializable command surface.
//!
//! SoundCommand is a tagged enum so hosts (FFI, CLI, scripts) can drive the
//! manager with JSON like `{"action": "play", "id": "a"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sound::{LoadOptions, PlayOptions, SoundOptions};

/// One manager command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SoundCommand {
    Create(SoundOptions),
    Destroy { id: String },
    Load {
        id: String,
        #[serde(default)]
        options: LoadOptions,
    },
    Unload { id: String },
    Play {
        id: String,
        #[serde(default)]
        options: PlayOptions,
    },
    Pause { id: String },
    Resume { id: String },
    TogglePause { id: String },
    Stop { id: String },
    SetPosition { id: String, position_ms: u64 },
    SetVolume { id: String, volume: i32 },
    SetPan { id: String, pan: i32 },
    Mute { id: String },
    Unmute { id: String },
    ToggleMute { id: String },
    StopAll,
    PauseAll,
    ResumeAll,
    MuteAll,
    UnmuteAll,
    SetGlobalVolume { volume: i32 },
}

impl SoundCommand {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(v: &Value) -> Option<Self> {
        serde_json::from_value(v.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_without_options() {
        let cmd = SoundCommand::from_value(&serde_json::json!({"action": "play", "id": "a"}));
        assert_eq!(
            cmd,
            Some(SoundCommand::Play {
                id: "a".into(),
                options: PlayOptions::default()
            })
        );
    }

    #[test]
    fn parses_create_inline_options() {
        let cmd = SoundCommand::from_value(&serde_json::json!({
            "action": "create",
            "id": "a",
            "url": "x.mp3",
            "volume": 50,
            "autoplay": true
        }))
        .unwrap();
        match cmd {
            SoundCommand::Create(opts) => {
                assert_eq!(opts.id, "a");
                assert_eq!(opts.volume, Some(50));
                assert_eq!(opts.autoplay, Some(true));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(SoundCommand::from_value(&serde_json::json!({"action": "explode"})).is_none());
    }

    #[test]
    fn unit_actions_serialize_with_tag_only() {
        assert_eq!(
            SoundCommand::StopAll.to_value(),
            serde_json::json!({"action": "stop_all"})
        );
    }
}
