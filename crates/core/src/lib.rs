//! Core library for the Hues beat-synchronised audio/visual show.
//!
//! A resource pack bundles hues, songs with rhythm strings, and images. The
//! crate loads packs concurrently through a [`Fetcher`], keeps the active
//! selections in a [`RespackRegistry`], schedules songs on an
//! [`AudioOutput`], and turns the output clock into beats that drive hue and
//! image changes. Hosts observe all of it through [`EngineEvent`] listeners.

pub mod assets;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fetch;
pub mod loader;
pub mod mapping;
pub mod registry;
pub mod timeline;

#[cfg(test)]
mod testing;

pub use assets::{Category, Hue, Image, ResourcePack, Song};
#[cfg(feature = "rodio-output")]
pub use audio::RodioOutput;
pub use audio::{AudioBuffer, AudioDecoder, AudioOutput, SilentOutput, SymphoniaDecoder};
pub use config::{AppConfig, AudioConfig, PlaybackConfig, RespackConfig};
pub use engine::{Engine, DEFAULT_BEAT_STRING_LENGTH};
pub use error::{HuesError, Result};
pub use events::{BeatInfo, EngineEvent, EventKind, Listener, ListenerId};
pub use fetch::{FileFetcher, Fetcher, MemoryFetcher};
pub use loader::{AssetLoader, LoadProgress};
pub use mapping::{AutoMode, BeatEffect};
pub use registry::RespackRegistry;
pub use timeline::{Beat, PlaybackState, Scheduler};
