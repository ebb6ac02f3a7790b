//! The engine instance that owns every piece of live state: loaded packs,
//! active selections, auto mode, playback and listeners.
//!
//! Everything here runs on one control thread. Loading is the only
//! concurrent part and it never touches playback state.

use rand::{rngs::SmallRng, SeedableRng};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    assets::ResourcePack,
    audio::{AudioDecoder, AudioOutput},
    config::AppConfig,
    events::{
        BeatInfo, EngineEvent, EventBus, EventKind, HueInfo, ImageInfo, Listener, ListenerId,
        SongInfo,
    },
    fetch::{respack_url, Fetcher},
    loader::{AssetLoader, LoadProgress},
    mapping::{actions_for, pick_excluding, AutoMode, BeatEffect},
    registry::RespackRegistry,
    timeline::{self, Beat, BeatClock, PlaybackState, Scheduler},
    HuesError, Result,
};

/// Default length of [`Engine::beat_string`] for callers without a preference.
pub const DEFAULT_BEAT_STRING_LENGTH: usize = 256;

pub struct Engine<F, O> {
    fetcher: F,
    output: O,
    decoder: Box<dyn AudioDecoder>,
    config: AppConfig,
    registry: RespackRegistry,
    scheduler: Scheduler,
    beat_clock: BeatClock,
    events: EventBus,
    rng: SmallRng,
    auto_mode: AutoMode,
    hue_index: Option<usize>,
    song_index: Option<usize>,
    image_index: Option<usize>,
}

impl<F: Fetcher, O: AudioOutput> Engine<F, O> {
    pub fn new(fetcher: F, output: O, decoder: Box<dyn AudioDecoder>, config: AppConfig) -> Self {
        Self {
            fetcher,
            output,
            decoder,
            auto_mode: config.playback.auto_mode,
            config,
            registry: RespackRegistry::new(),
            scheduler: Scheduler::new(),
            beat_clock: BeatClock::new(),
            events: EventBus::new(),
            rng: SmallRng::from_os_rng(),
            hue_index: None,
            song_index: None,
            image_index: None,
        }
    }

    /// Replaces the random source with a seeded one, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &RespackRegistry {
        &self.registry
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn playback(&self) -> Option<&PlaybackState> {
        self.scheduler.state()
    }

    pub fn current_beat(&self) -> Beat {
        self.beat_clock.current()
    }

    // Auto mode

    pub fn auto_mode(&self) -> AutoMode {
        self.auto_mode
    }

    pub fn set_auto_mode(&mut self, mode: AutoMode) {
        info!(%mode, "auto mode changed");
        self.auto_mode = mode;
        self.events.emit(&EngineEvent::AutoModeChange(mode));
    }

    // Listeners

    pub fn add_listener(&mut self, event: &str, listener: Listener) -> Result<ListenerId> {
        self.events.add_listener(event, listener)
    }

    pub fn remove_listener(&mut self, event: &str, listener: &Listener) -> Result<usize> {
        self.events.remove_listener(event, listener)
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    // Loading

    async fn load_pack(&self, url: &Url) -> Result<ResourcePack> {
        let loader = AssetLoader::new(
            &self.fetcher,
            self.decoder.as_ref(),
            &self.config.audio.track_formats,
        );
        let events = &self.events;
        loader
            .load(url, &|progress: LoadProgress| {
                events.emit(&EngineEvent::Progress {
                    completed: progress.completed,
                    added: progress.added,
                })
            })
            .await
    }

    /// Loads the pack at `url` and registers it, returning its name. Nothing
    /// is registered when any part of the pack fails.
    pub async fn load_respack(&mut self, url: &Url) -> Result<String> {
        let pack = self.load_pack(url).await?;
        let name = pack.name.clone();
        self.registry.insert(pack);
        Ok(name)
    }

    /// Loads a pack by name (or absolute URL) relative to the configured
    /// respack location.
    pub async fn load_respack_named(&mut self, name: &str) -> Result<String> {
        let url = respack_url(&self.config.respacks.base_url()?, name)?;
        self.load_respack(&url).await
    }

    /// Loads the builtin and default packs together, then activates the
    /// default pack's content and picks starting selections. Playback is not
    /// started.
    pub async fn load_default_respack(&mut self) -> Result<()> {
        self.events.emit(&EngineEvent::ProgressStart);

        let base = self.config.respacks.base_url()?;
        let builtin_url = respack_url(&base, &self.config.respacks.builtin)?;
        let default_url = respack_url(&base, &self.config.respacks.default_pack)?;
        let (builtin, default) =
            futures::try_join!(self.load_pack(&builtin_url), self.load_pack(&default_url))?;

        let builtin_name = builtin.name.clone();
        let default_name = default.name.clone();
        let (has_hues, has_songs, has_images) = (
            default.hues.is_some(),
            default.songs.is_some(),
            default.images.is_some(),
        );
        self.registry.insert(builtin);
        self.registry.insert(default);

        if has_hues {
            self.registry.add_hues(&default_name, None)?;
        } else {
            self.registry.add_hues(&builtin_name, None)?;
        }
        self.random_hue();

        if has_songs {
            self.registry.add_songs(&default_name, None)?;
            let preset = self.config.playback.default_song;
            if preset < self.registry.songs().len() {
                self.song_index = Some(preset);
            } else {
                warn!(preset, songs = self.registry.songs().len(), "ignoring default song");
            }
        }

        if has_images {
            self.registry.add_images(&default_name, None)?;
            match self.config.playback.default_image {
                Some(index) if index < self.registry.images().len() => self.change_image(index)?,
                Some(index) => {
                    warn!(index, "ignoring default image");
                    self.random_image();
                }
                None => {
                    self.random_image();
                }
            }
        }

        info!(respack = %default_name, "default respack ready");
        self.events.emit(&EngineEvent::ProgressEnd);
        Ok(())
    }

    // Active lists

    pub fn add_hues(&mut self, respack: &str, indices: Option<&[usize]>) -> Result<()> {
        self.registry.add_hues(respack, indices)
    }

    pub fn add_songs(&mut self, respack: &str, indices: Option<&[usize]>) -> Result<()> {
        self.registry.add_songs(respack, indices)
    }

    pub fn add_images(&mut self, respack: &str, indices: Option<&[usize]>) -> Result<()> {
        self.registry.add_images(respack, indices)
    }

    // Hues and images

    pub fn current_hue(&self) -> Option<HueInfo> {
        let index = self.hue_index?;
        let hue = self.registry.hues().get(index)?.clone();
        Some(HueInfo { index, hue })
    }

    /// Switches to a random hue other than the current one. Does nothing with
    /// no active hues.
    pub fn random_hue(&mut self) -> Option<usize> {
        let index = pick_excluding(&mut self.rng, self.registry.hues().len(), self.hue_index)?;
        let hue = self.registry.hues()[index].clone();
        debug!(index, hue = %hue.name, "hue change");
        self.hue_index = Some(index);
        self.events.emit(&EngineEvent::HueChange(HueInfo { index, hue }));
        Some(index)
    }

    pub fn current_image(&self) -> Option<ImageInfo> {
        let index = self.image_index?;
        let image = self.registry.images().get(index)?.clone();
        Some(ImageInfo { index, image })
    }

    pub fn change_image(&mut self, index: usize) -> Result<()> {
        let images = self.registry.images();
        let image = images
            .get(index)
            .ok_or(HuesError::IndexOutOfRange {
                what: "image",
                index,
                len: images.len(),
            })?
            .clone();
        debug!(index, image = %image.name, "image change");
        self.image_index = Some(index);
        self.events.emit(&EngineEvent::ImageChange(ImageInfo { index, image }));
        Ok(())
    }

    /// Switches to a random image other than the current one. Does nothing
    /// with no active images.
    pub fn random_image(&mut self) -> Option<usize> {
        let index = pick_excluding(&mut self.rng, self.registry.images().len(), self.image_index)?;
        self.change_image(index).ok()?;
        Some(index)
    }

    // Songs

    pub fn current_song(&self) -> Option<SongInfo> {
        if let Some(state) = self.scheduler.state() {
            return Some(SongInfo {
                index: state.song_index,
                song: state.song.clone(),
            });
        }
        let index = self.song_index?;
        let song = self.registry.songs().get(index)?.clone();
        Some(SongInfo { index, song })
    }

    /// Stops whatever is playing and starts the song at `index`.
    pub fn change_song(&mut self, index: usize) -> Result<()> {
        let songs = self.registry.songs();
        let song = songs
            .get(index)
            .ok_or(HuesError::IndexOutOfRange {
                what: "song",
                index,
                len: songs.len(),
            })?
            .clone();

        self.scheduler.change_song(&mut self.output, index, song.clone())?;
        self.song_index = Some(index);
        self.beat_clock.start();
        self.events.emit(&EngineEvent::SongChange(SongInfo { index, song }));

        if self.auto_mode == AutoMode::Auto {
            self.random_image();
        }
        Ok(())
    }

    /// Restarts the selected song.
    pub fn play_song(&mut self) -> Result<()> {
        let index = self.song_index.ok_or(HuesError::NoSongSelected)?;
        self.change_song(index)
    }

    pub fn prev_song(&mut self) -> Result<()> {
        let len = self.registry.songs().len();
        if len == 0 {
            return Err(HuesError::NoSongs);
        }
        let index = match self.song_index {
            Some(index) if index > 0 && index < len => index - 1,
            _ => len - 1,
        };
        self.change_song(index)
    }

    pub fn next_song(&mut self) -> Result<()> {
        let len = self.registry.songs().len();
        if len == 0 {
            return Err(HuesError::NoSongs);
        }
        let index = match self.song_index {
            Some(index) if index + 1 < len => index + 1,
            _ => 0,
        };
        self.change_song(index)
    }

    /// Stops playback. The beat clock notices on its next tick.
    pub fn stop_song(&mut self) {
        self.scheduler.stop(&mut self.output);
    }

    /// Upcoming rhythm from the current beat, exactly `length` characters
    /// while a song is selected and empty otherwise.
    pub fn beat_string(&self, length: usize) -> String {
        if let Some(state) = self.scheduler.state() {
            return timeline::beat_string(
                &state.song.rhythm,
                state.buildup_rhythm.as_deref(),
                self.beat_clock.current(),
                length,
            );
        }
        match self.current_song() {
            Some(SongInfo { song, .. }) => {
                let buildup = song.padded_buildup_rhythm(song.beat_duration());
                timeline::beat_string(&song.rhythm, buildup.as_deref(), Beat::Idle, length)
            }
            None => String::new(),
        }
    }

    // Beat clock

    /// One beat clock step; call once per display refresh. Returns whether
    /// the clock wants another tick.
    pub fn tick(&mut self) -> bool {
        let time = self.output.current_time();
        let Some((beat, character)) = self.scheduler.state().map(|state| state.resolve(time)) else {
            if self.beat_clock.halt() {
                self.events.emit(&EngineEvent::Beat(BeatInfo {
                    beat: Beat::Idle,
                    character: None,
                    effect: None,
                }));
            }
            return false;
        };

        let previous = self.beat_clock.current();
        if !self.beat_clock.observe(beat) {
            return true;
        }

        let effect = character.map(BeatEffect::from_char);
        debug!(?beat, ?character, ?effect, "beat");
        let actions = effect
            .map(|effect| actions_for(effect, self.auto_mode))
            .unwrap_or_default();
        if actions.change_hue {
            self.random_hue();
        }
        let loop_wrapped = beat == Beat::Loop(0) && previous != Beat::Idle;
        if actions.change_image || (self.auto_mode == AutoMode::Auto && loop_wrapped) {
            self.random_image();
        }

        self.events.emit(&EngineEvent::Beat(BeatInfo {
            beat,
            character,
            effect,
        }));
        true
    }
}

impl<F, O> std::fmt::Debug for Engine<F, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("respacks", &self.registry.names())
            .field("auto_mode", &self.auto_mode)
            .field("hue_index", &self.hue_index)
            .field("song_index", &self.song_index)
            .field("image_index", &self.image_index)
            .field("playing", &self.scheduler.is_playing())
            .field("events", &self.events)
            .finish()
    }
}
