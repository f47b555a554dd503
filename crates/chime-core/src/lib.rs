//! chime-core — cross-backend sound playback manager.
//!
//! Many logical sounds multiplexed over one of two backends, with a single
//! consistent lifecycle regardless of which backend plays them.
//!
//! # Architecture
//!
//! ```text
//! Manager        setup, backend selection, readiness, global operations
//!  └ SoundRegistry   id → SoundHandle, creation order
//!     └ SoundHandle  play state, volume/pan/mute, watches, listeners
//!        └ BackendAdapter  plugin slot (polled) or native stream (pushed)
//! ```
//!
//! Commands flow down synchronously. Backend signals flow up through an
//! `EventQueue` that the manager drains on `tick()`.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod registry;
pub mod sound;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use backend::{BackendAdapter, BackendDriver, BackendKind, Probe, UpdateMode};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BackendMode, ManagerConfig, SetupOptions, SoundDefaults, VolumeScope};
pub use error::{Error, Result};
pub use manager::{Manager, ReadyState, ReadyStatus};
pub use models::{
    LoadOptions, LoadState, PlayOptions, PlayState, SoundCommand, SoundInfo, SoundOptions,
};
pub use registry::BatchOutcome;
pub use sound::{SoundEvent, SoundHandle, WatchId};

/// Manager with every built-in backend: native output (feature `native`)
/// and the plugin backend over a permissive headless bridge.
pub fn standard_manager(clock: Arc<dyn Clock>) -> Manager {
    let bridge = backend::plugin::HeadlessBridge::new(Arc::clone(&clock)).permissive();
    let manager = Manager::new(clock).with_driver(backend::plugin::PluginDriver::new(bridge));
    #[cfg(feature = "native")]
    let manager = manager.with_driver(backend::native::NativeDriver::new());
    manager
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn plugin_session(clock: &ManualClock) -> Manager {
        let mut manager = standard_manager(Arc::new(clock.clone()));
        manager
            .setup_json(&serde_json::json!({
                "backend_mode": "plugin_only",
                "plugin_poll_interval_ms": 25,
                "flash_version": 9
            }))
            .unwrap();
        manager.start().unwrap();
        manager
    }

    #[test]
    fn standard_manager_runs_headless_in_plugin_mode() {
        let clock = ManualClock::new();
        let manager = plugin_session(&clock);
        assert_eq!(manager.active_backend(), Some(BackendKind::Plugin));
        assert_eq!(manager.config().plugin_poll_interval_ms, 25);
    }

    #[test]
    fn json_session_tracks_position() {
        let clock = ManualClock::new();
        let mut manager = plugin_session(&clock);
        for cmd in [
            serde_json::json!({"action": "create", "id": "fx", "url": "fx.ogg", "volume": 80}),
            serde_json::json!({"action": "play", "id": "fx", "options": {"from": 200}}),
        ] {
            manager.command_json(&cmd).unwrap();
        }

        let positions = Rc::new(RefCell::new(Vec::new()));
        let p = Rc::clone(&positions);
        manager.sound_mut("fx").unwrap().on_event(move |_, e| {
            if let SoundEvent::Position(ms) = e {
                p.borrow_mut().push(*ms);
            }
        });

        for _ in 0..4 {
            clock.advance(25);
            manager.tick();
        }
        let info = manager.sound_info("fx").unwrap();
        assert_eq!(info.play_state, PlayState::Playing);
        assert_eq!(info.load_state, LoadState::Loaded);
        assert_eq!(info.duration_ms, None);
        assert!(info.position_ms >= 200);
        let seen = positions.borrow();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn destruct_then_everything_is_refused() {
        let clock = ManualClock::new();
        let mut manager = plugin_session(&clock);
        manager
            .create_sound(SoundOptions::new("a", "a.mp3"))
            .unwrap();
        manager.destruct();
        assert_eq!(manager.sound_ids(), Vec::<String>::new());
        assert_eq!(
            manager.command(SoundCommand::StopAll),
            Err(Error::ManagerDestroyed)
        );
        assert_eq!(manager.reboot(false), Err(Error::ManagerDestroyed));
    }
}
