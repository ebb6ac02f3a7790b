use std::{collections::HashMap, sync::Arc, time::Duration};

use rodio::{buffer::SamplesBuffer, OutputStream, OutputStreamHandle, Sink, Source};

use super::{AudioBuffer, AudioOutput, PlaybackClock, SourceId};
use crate::{HuesError, Result};

/// Plays scheduled buffers on the default output device. rodio exposes no
/// device clock, so start times are turned into delays against a wall clock
/// started when the device was opened.
pub struct RodioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    clock: PlaybackClock,
    sinks: HashMap<SourceId, Sink>,
    next_id: u64,
}

impl RodioOutput {
    pub fn open() -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| HuesError::Audio(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
            clock: PlaybackClock::start(),
            sinks: HashMap::new(),
            next_id: 0,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn current_time(&self) -> f64 {
        self.clock.time()
    }

    fn schedule(
        &mut self,
        buffer: Arc<AudioBuffer>,
        start_at: f64,
        looping: bool,
    ) -> Result<SourceId> {
        let sink = Sink::try_new(&self.handle).map_err(|e| HuesError::Audio(e.to_string()))?;
        let delay = Duration::from_secs_f64((start_at - self.current_time()).max(0.0));
        let source = SamplesBuffer::new(buffer.channels, buffer.sample_rate, buffer.samples.to_vec());

        if looping {
            sink.append(source.repeat_infinite().delay(delay));
        } else {
            sink.append(source.delay(delay));
        }

        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.sinks.insert(id, sink);
        Ok(id)
    }

    fn stop(&mut self, source: SourceId) {
        if let Some(sink) = self.sinks.remove(&source) {
            sink.stop();
        }
    }
}
