use std::{sync::Arc, time::Instant};

use crate::Result;

mod decoder;
#[cfg(feature = "rodio-output")]
mod rodio_output;

pub use decoder::SymphoniaDecoder;
#[cfg(feature = "rodio-output")]
pub use rodio_output::RodioOutput;

/// Decoded PCM audio, interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    /// A silent buffer of (approximately) the requested length.
    pub fn silence(seconds: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = (seconds * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0.0; frames * usize::from(channels)], sample_rate, channels)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Turns fetched bytes into playable audio. `extension` is the container
/// format the bytes were fetched as and only serves as a probing hint.
pub trait AudioDecoder {
    fn decode(&self, bytes: Vec<u8>, extension: &str) -> Result<AudioBuffer>;
}

/// Handle to one scheduled buffer on an [`AudioOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

/// Device-side playback: a clock plus "play this buffer at time T".
pub trait AudioOutput {
    /// Current time in seconds, in the output's own clock domain.
    fn current_time(&self) -> f64;

    /// Schedules `buffer` to start at `start_at`; a looping source repeats
    /// with a period equal to the buffer duration until stopped.
    fn schedule(&mut self, buffer: Arc<AudioBuffer>, start_at: f64, looping: bool)
        -> Result<SourceId>;

    /// Stops and releases a source. Unknown ids are ignored.
    fn stop(&mut self, source: SourceId);
}

/// Monotonic clock used by outputs without a device clock of their own.
#[derive(Debug, Clone)]
pub enum PlaybackClock {
    Realtime(Instant),
    Manual { time_seconds: f64 },
}

impl PlaybackClock {
    pub fn start() -> Self {
        Self::Realtime(Instant::now())
    }

    pub fn manual() -> Self {
        Self::Manual { time_seconds: 0.0 }
    }

    pub fn time(&self) -> f64 {
        match self {
            PlaybackClock::Realtime(epoch) => epoch.elapsed().as_secs_f64(),
            PlaybackClock::Manual { time_seconds } => *time_seconds,
        }
    }

    /// Moves a manual clock forward; realtime clocks ignore this.
    pub fn advance(&mut self, delta: f64) {
        if let PlaybackClock::Manual { time_seconds } = self {
            *time_seconds = (*time_seconds + delta).max(0.0);
        }
    }

    pub fn set(&mut self, time: f64) {
        if let PlaybackClock::Manual { time_seconds } = self {
            *time_seconds = time.max(0.0);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub buffer: Arc<AudioBuffer>,
    pub start_at: f64,
    pub looping: bool,
}

/// Output that keeps the schedule but produces no sound. Used for headless
/// runs and for driving the engine from tests with a manual clock.
#[derive(Debug)]
pub struct SilentOutput {
    clock: PlaybackClock,
    sources: Vec<ScheduledSource>,
    next_id: u64,
}

impl SilentOutput {
    pub fn new(clock: PlaybackClock) -> Self {
        Self {
            clock,
            sources: Vec::new(),
            next_id: 0,
        }
    }

    pub fn realtime() -> Self {
        Self::new(PlaybackClock::start())
    }

    pub fn manual() -> Self {
        Self::new(PlaybackClock::manual())
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    /// Sources scheduled and not yet stopped.
    pub fn active_sources(&self) -> &[ScheduledSource] {
        &self.sources
    }
}

impl AudioOutput for SilentOutput {
    fn current_time(&self) -> f64 {
        self.clock.time()
    }

    fn schedule(
        &mut self,
        buffer: Arc<AudioBuffer>,
        start_at: f64,
        looping: bool,
    ) -> Result<SourceId> {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.sources.push(ScheduledSource {
            id,
            buffer,
            start_at,
            looping,
        });
        Ok(id)
    }

    fn stop(&mut self, source: SourceId) {
        self.sources.retain(|scheduled| scheduled.id != source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn duration_counts_frames_not_samples() {
        let stereo = AudioBuffer::silence(2.0, 100, 2);
        assert_eq!(stereo.samples.len(), 400);
        assert_relative_eq!(stereo.duration(), 2.0);
    }

    #[test]
    fn manual_clock_only_moves_when_told() {
        let mut output = SilentOutput::manual();
        assert_eq!(output.current_time(), 0.0);
        output.clock_mut().advance(1.5);
        assert_relative_eq!(output.current_time(), 1.5);
        output.clock_mut().set(0.25);
        assert_relative_eq!(output.current_time(), 0.25);
    }

    #[test]
    fn stopping_releases_scheduled_sources() {
        let mut output = SilentOutput::manual();
        let buffer = Arc::new(AudioBuffer::silence(1.0, 10, 1));
        let first = output.schedule(buffer.clone(), 0.0, false).unwrap();
        let second = output.schedule(buffer, 1.0, true).unwrap();
        assert_ne!(first, second);

        output.stop(first);
        output.stop(first);
        assert_eq!(output.active_sources().len(), 1);
        assert!(output.active_sources()[0].looping);
    }
}
