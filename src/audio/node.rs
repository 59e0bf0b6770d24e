// Buffer source node: plays one decoded buffer, optionally looping
use parking_lot::Mutex;
use std::sync::Arc;

use crate::audio::buffer::AudioBuffer;
use crate::audio::graph::{AudioDestinationNode, AudioGraph, SharedSource};
use crate::error::{Error, Result};

/// Playback lifecycle of a source node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Created, `start` not called yet
    Idle,
    Playing,
    /// Stopped, or reached the end of a non-looping buffer
    Ended,
}

pub(crate) struct SourceState {
    pub(crate) buffer: Option<Arc<AudioBuffer>>,
    pub(crate) looping: bool,
    pub(crate) connected: bool,
    pub(crate) playback: PlaybackState,
    pub(crate) position: usize,
}

impl SourceState {
    fn new() -> Self {
        Self {
            buffer: None,
            looping: false,
            connected: false,
            playback: PlaybackState::Idle,
            position: 0,
        }
    }

    /// Add this node's frames into `out` (interleaved, `channels` wide)
    pub(crate) fn render_into(&mut self, out: &mut [f32], channels: usize) {
        if self.playback != PlaybackState::Playing {
            return;
        }
        // Started without a buffer: silence until one is assigned
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        let frames = buffer.frames();
        if frames == 0 {
            return;
        }

        for frame in out.chunks_exact_mut(channels) {
            if self.position >= frames {
                if self.looping {
                    self.position = 0;
                } else {
                    self.playback = PlaybackState::Ended;
                    break;
                }
            }
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample += buffer.sample(self.position, ch);
            }
            self.position += 1;
        }
    }
}

/// Handle to a buffer source node
///
/// Clones share the same node. The buffer is expected at the context sample
/// rate; `AudioContext::decode_audio_data` always produces one.
#[derive(Clone)]
pub struct AudioBufferSourceNode {
    shared: SharedSource,
    graph: Arc<AudioGraph>,
}

impl AudioBufferSourceNode {
    pub(crate) fn new(graph: Arc<AudioGraph>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SourceState::new())),
            graph,
        }
    }

    pub fn buffer(&self) -> Option<Arc<AudioBuffer>> {
        self.shared.lock().buffer.clone()
    }

    /// Assign (or clear) the buffer; playback restarts from its first frame
    pub fn set_buffer(&self, buffer: Option<Arc<AudioBuffer>>) {
        let mut state = self.shared.lock();
        state.buffer = buffer;
        state.position = 0;
    }

    pub fn loop_enabled(&self) -> bool {
        self.shared.lock().looping
    }

    pub fn set_loop(&self, looping: bool) {
        self.shared.lock().looping = looping;
    }

    /// Connect to the destination of the context that created this node
    pub fn connect(&self, destination: &AudioDestinationNode) -> Result<()> {
        self.check_destination(destination)?;
        self.graph.attach(&self.shared, |_| {})
    }

    /// Assign `buffer`, connect and enable looping as one step
    ///
    /// Either all three happen or, if the context is closed, none of them.
    pub(crate) fn connect_looping(
        &self,
        destination: &AudioDestinationNode,
        buffer: Arc<AudioBuffer>,
    ) -> Result<()> {
        self.check_destination(destination)?;
        self.graph.attach(&self.shared, |state| {
            state.buffer = Some(buffer);
            state.position = 0;
            state.looping = true;
        })
    }

    fn check_destination(&self, destination: &AudioDestinationNode) -> Result<()> {
        if !Arc::ptr_eq(&self.graph, &destination.graph) {
            return Err(Error::InvalidState(
                "Cannot connect a node to the destination of another context".to_string(),
            ));
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        self.graph.detach(&self.shared);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    /// Begin playback. May be called once per node.
    pub fn start(&self) -> Result<()> {
        if self.graph.is_closed() {
            return Err(Error::InvalidState("Audio context is closed".to_string()));
        }

        let mut state = self.shared.lock();
        if state.playback != PlaybackState::Idle {
            return Err(Error::InvalidState("start() may only be called once".to_string()));
        }
        state.playback = PlaybackState::Playing;
        Ok(())
    }

    pub fn stop(&self) {
        self.shared.lock().playback = PlaybackState::Ended;
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.shared.lock().playback
    }
}

impl std::fmt::Debug for AudioBufferSourceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("AudioBufferSourceNode")
            .field("has_buffer", &state.buffer.is_some())
            .field("loop", &state.looping)
            .field("connected", &state.connected)
            .field("playback", &state.playback)
            .finish()
    }
}
