// Render graph shared between a context, its nodes and the output thread
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::node::SourceState;
use crate::error::{Error, Result};

pub(crate) type SharedSource = Arc<Mutex<SourceState>>;

pub(crate) struct AudioGraph {
    sample_rate: u32,
    channels: u16,
    inputs: Mutex<Vec<SharedSource>>,
    closed: AtomicBool,
}

impl AudioGraph {
    pub(crate) fn new(sample_rate: u32, channels: u16) -> Arc<Self> {
        Arc::new(Self {
            sample_rate,
            channels: channels.max(1),
            inputs: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn channels(&self) -> u16 {
        self.channels
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed and drop every connection
    pub(crate) fn close(&self) {
        let mut inputs = self.inputs.lock();
        self.closed.store(true, Ordering::Release);
        for input in inputs.drain(..) {
            input.lock().connected = false;
        }
    }

    /// Connect `source`, applying `configure` to its state in the same step
    ///
    /// The inputs lock is held throughout, so a concurrent `close` sees
    /// either nothing or the fully configured, connected node.
    pub(crate) fn attach(
        &self,
        source: &SharedSource,
        configure: impl FnOnce(&mut SourceState),
    ) -> Result<()> {
        let mut inputs = self.inputs.lock();
        if self.is_closed() {
            return Err(Error::InvalidState("Audio context is closed".to_string()));
        }

        if !inputs.iter().any(|s| Arc::ptr_eq(s, source)) {
            inputs.push(Arc::clone(source));
        }
        let mut state = source.lock();
        configure(&mut state);
        state.connected = true;
        Ok(())
    }

    pub(crate) fn detach(&self, source: &SharedSource) {
        let mut inputs = self.inputs.lock();
        inputs.retain(|s| !Arc::ptr_eq(s, source));
        source.lock().connected = false;
    }

    pub(crate) fn input_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Fill `out` with interleaved frames mixed from every connected input
    pub(crate) fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        if self.is_closed() {
            return;
        }

        let channels = self.channels as usize;
        let whole = out.len() - out.len() % channels;
        let out = &mut out[..whole];

        for input in self.inputs.lock().iter() {
            input.lock().render_into(out, channels);
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

/// Final node of a context; whatever is connected here reaches the output
#[derive(Clone)]
pub struct AudioDestinationNode {
    pub(crate) graph: Arc<AudioGraph>,
}

impl AudioDestinationNode {
    pub fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    pub fn channel_count(&self) -> u16 {
        self.graph.channels()
    }

    /// Number of source nodes currently connected
    pub fn input_count(&self) -> usize {
        self.graph.input_count()
    }
}

impl std::fmt::Debug for AudioDestinationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDestinationNode")
            .field("sample_rate", &self.sample_rate())
            .field("channels", &self.channel_count())
            .field("inputs", &self.input_count())
            .finish()
    }
}
