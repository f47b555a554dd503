//! chime data models.
//!
//! Plain option records and snapshots. Callbacks never live here: these
//! types are what crosses the JSON and FFI boundaries.

pub mod command;
pub mod sound;

pub use command::SoundCommand;
pub use sound::{
    clamp_pan, clamp_volume, LoadOptions, LoadState, PlayOptions, PlayState, SoundInfo,
    SoundOptions,
};
