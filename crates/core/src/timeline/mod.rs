//! Song scheduling against the output clock, and beat resolution from it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    assets::Song,
    audio::{AudioOutput, SourceId},
    Result,
};

/// Position in the current song's rhythm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Beat {
    /// Nothing playing, or the clock has not reached the song yet.
    #[default]
    Idle,
    Buildup(usize),
    Loop(usize),
}

impl Beat {
    pub fn buildup_index(self) -> Option<usize> {
        match self {
            Beat::Buildup(index) => Some(index),
            _ => None,
        }
    }

    pub fn loop_index(self) -> Option<usize> {
        match self {
            Beat::Loop(index) => Some(index),
            _ => None,
        }
    }
}

/// The one live playback. Replaced wholesale on every song change.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub song_index: usize,
    pub song: Arc<Song>,
    pub beat_duration: f64,
    /// Padded buildup rhythm; `None` for songs without a buildup.
    pub buildup_rhythm: Option<String>,
    pub buildup_start: f64,
    pub loop_start: f64,
    buildup_source: Option<SourceId>,
    loop_source: SourceId,
}

impl PlaybackState {
    pub fn loop_duration(&self) -> f64 {
        self.song.loop_buffer.duration()
    }

    /// Resolves the beat and its rhythm character at output time `time`.
    pub fn resolve(&self, time: f64) -> (Beat, Option<char>) {
        if self.beat_duration <= 0.0 {
            return (Beat::Idle, None);
        }

        if let Some(rhythm) = self.buildup_rhythm.as_deref() {
            if time < self.loop_start {
                if time < self.buildup_start {
                    return (Beat::Idle, None);
                }
                let index = ((time - self.buildup_start) / self.beat_duration).floor() as usize;
                return (Beat::Buildup(index), rhythm.chars().nth(index));
            }
        }

        if time >= self.loop_start {
            let beats = self.song.loop_beats();
            let offset = (time - self.loop_start) % self.loop_duration();
            let index = ((offset / self.beat_duration).floor() as usize).min(beats.saturating_sub(1));
            return (Beat::Loop(index), self.song.rhythm.chars().nth(index));
        }

        (Beat::Idle, None)
    }
}

/// Owns the live [`PlaybackState`] and the output sources backing it.
#[derive(Debug, Default)]
pub struct Scheduler {
    state: Option<PlaybackState>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&PlaybackState> {
        self.state.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_some()
    }

    /// Tears down current playback, then schedules `song`'s buildup at the
    /// output's current time and its loop right after it.
    pub fn change_song<O: AudioOutput + ?Sized>(
        &mut self,
        output: &mut O,
        song_index: usize,
        song: Arc<Song>,
    ) -> Result<&PlaybackState> {
        self.stop(output);

        let beat_duration = song.beat_duration();
        let buildup_rhythm = song.padded_buildup_rhythm(beat_duration);
        let buildup = song
            .buildup_buffer
            .as_ref()
            .filter(|buffer| !buffer.is_empty())
            .cloned();
        let buildup_duration = buildup.as_ref().map(|b| b.duration()).unwrap_or(0.0);

        let buildup_start = output.current_time();
        let loop_start = buildup_start + buildup_duration;
        info!(
            song = %song.title,
            beat_duration,
            buildup_duration,
            loop_duration = song.loop_buffer.duration(),
            beats = song.loop_beats(),
            "switching song"
        );

        let buildup_source = match buildup {
            Some(buffer) => Some(output.schedule(buffer, buildup_start, false)?),
            None => None,
        };
        let loop_source = match output.schedule(song.loop_buffer.clone(), loop_start, true) {
            Ok(id) => id,
            Err(err) => {
                if let Some(id) = buildup_source {
                    output.stop(id);
                }
                return Err(err);
            }
        };

        Ok(&*self.state.insert(PlaybackState {
            song_index,
            song,
            beat_duration,
            buildup_rhythm,
            buildup_start,
            loop_start,
            buildup_source,
            loop_source,
        }))
    }

    /// Stops and releases both sources. Safe with nothing playing.
    pub fn stop<O: AudioOutput + ?Sized>(&mut self, output: &mut O) {
        if let Some(state) = self.state.take() {
            debug!(song = %state.song.title, "stopping playback");
            if let Some(id) = state.buildup_source {
                output.stop(id);
            }
            output.stop(state.loop_source);
        }
    }
}

/// Tracks the last reported beat so only transitions are dispatched.
#[derive(Debug, Default)]
pub struct BeatClock {
    running: bool,
    current: Beat,
}

impl BeatClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current(&self) -> Beat {
        self.current
    }

    /// Starts the clock for a new playback. The previous playback's beat is
    /// forgotten, so the first beat of the new one is always a transition.
    pub fn start(&mut self) {
        if !self.running {
            debug!("starting beat clock");
            self.running = true;
        }
        self.current = Beat::Idle;
    }

    /// Records `beat`, returning whether it differs from the previous one.
    pub fn observe(&mut self, beat: Beat) -> bool {
        if beat == self.current {
            return false;
        }
        self.current = beat;
        true
    }

    /// Stops the clock. Returns `true` the first time, when the caller owes
    /// listeners a final idle beat.
    pub fn halt(&mut self) -> bool {
        if !self.running {
            return false;
        }
        debug!("stopping beat clock");
        self.running = false;
        self.current = Beat::Idle;
        true
    }
}

/// Upcoming rhythm characters from `beat`, continued with repeats of the loop
/// rhythm. Exactly `length` characters unless `rhythm` is empty.
pub fn beat_string(rhythm: &str, buildup_rhythm: Option<&str>, beat: Beat, length: usize) -> String {
    let mut beats: String = match (beat, buildup_rhythm) {
        (Beat::Buildup(index), Some(buildup)) => buildup.chars().skip(index).collect(),
        (Beat::Loop(index), _) => rhythm.chars().skip(index).collect(),
        (_, Some(buildup)) => buildup.to_string(),
        _ => String::new(),
    };

    if !rhythm.is_empty() {
        let mut count = beats.chars().count();
        while count < length {
            beats.push_str(rhythm);
            count += rhythm.chars().count();
        }
    }
    beats.chars().take(length).collect()
}
