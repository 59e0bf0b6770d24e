// Audio context: one render graph, its destination and (optionally) a device output
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::audio::buffer::AudioBuffer;
use crate::audio::decoder::AudioDecoder;
use crate::audio::graph::{AudioDestinationNode, AudioGraph};
use crate::audio::node::AudioBufferSourceNode;
use crate::audio::output::AudioOutput;
use crate::audio::resampler::Resampler;
use crate::error::{Error, Result};
use crate::settings::{OutputBackend, OutputSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Closed,
}

/// An isolated audio graph
///
/// A device context renders to the platform output from a dedicated thread.
/// An offline context has no device; frames are pulled with `render`.
pub struct AudioContext {
    graph: Arc<AudioGraph>,
    output: Mutex<Option<AudioOutput>>,
    host: Option<&'static str>,
}

impl AudioContext {
    /// Context on the default output device
    ///
    /// Blocks until the output thread has opened the device and started the
    /// stream, or reported why it could not.
    pub fn new() -> Result<Self> {
        let (output, graph) = AudioOutput::open()?;
        let host = Some(output.host_name());

        Ok(Self {
            graph,
            output: Mutex::new(Some(output)),
            host,
        })
    }

    /// Context without a device
    pub fn offline(sample_rate: u32, channels: u16) -> Self {
        Self {
            graph: AudioGraph::new(sample_rate, channels),
            output: Mutex::new(None),
            host: None,
        }
    }

    pub fn from_settings(settings: &OutputSettings) -> Result<Self> {
        match settings.backend {
            OutputBackend::Device => Self::new(),
            OutputBackend::Offline => {
                Ok(Self::offline(settings.offline_sample_rate, settings.offline_channels))
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.graph.channels()
    }

    /// Audio host name for device contexts, `None` when offline
    pub fn host_name(&self) -> Option<&'static str> {
        self.host
    }

    pub fn state(&self) -> ContextState {
        if self.graph.is_closed() {
            ContextState::Closed
        } else {
            ContextState::Running
        }
    }

    pub fn destination(&self) -> AudioDestinationNode {
        AudioDestinationNode {
            graph: Arc::clone(&self.graph),
        }
    }

    pub fn create_buffer_source(&self) -> AudioBufferSourceNode {
        AudioBufferSourceNode::new(Arc::clone(&self.graph))
    }

    /// Decode a payload into a buffer at this context's sample rate
    ///
    /// Runs on the blocking pool; `hint` is a name whose extension helps
    /// pick the container format.
    pub async fn decode_audio_data(&self, data: Bytes, hint: Option<String>) -> Result<Arc<AudioBuffer>> {
        let target_rate = self.sample_rate();

        let decoded = tokio::task::spawn_blocking(move || -> Result<AudioBuffer> {
            let buffer = AudioDecoder::open(data, hint.as_deref())?.decode_all()?;
            if buffer.sample_rate() == target_rate {
                return Ok(buffer);
            }

            let samples = Resampler::resample(
                buffer.samples(),
                buffer.sample_rate(),
                target_rate,
                buffer.channels(),
            )?;
            let resampled = AudioBuffer::new(samples, target_rate, buffer.channels());
            if resampled.is_empty() {
                return Err(Error::Decode(format!(
                    "No frames left after resampling {} frames from {}Hz to {}Hz",
                    buffer.frames(),
                    buffer.sample_rate(),
                    target_rate
                )));
            }
            Ok(resampled)
        })
        .await
        .map_err(|e| Error::Decode(format!("Decode task failed: {}", e)))??;

        debug!(
            "Decoded buffer: {} frames, {:?}",
            decoded.frames(),
            decoded.duration()
        );
        Ok(Arc::new(decoded))
    }

    /// Pull interleaved frames from the graph
    ///
    /// Meant for offline contexts; on a device context this competes with
    /// the output thread for the same frames.
    pub fn render(&self, out: &mut [f32]) {
        self.graph.render(out);
    }

    /// Disconnect every node and release the output device
    pub fn close(&self) {
        self.graph.close();
        if let Some(mut output) = self.output.lock().take() {
            output.close();
        }
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioContext")
            .field("sample_rate", &self.sample_rate())
            .field("channels", &self.channels())
            .field("host", &self.host)
            .field("state", &self.state())
            .finish()
    }
}
