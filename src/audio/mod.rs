// Audio graph module
// Uses Symphonia for decoding, rubato for resampling and cpal for output

pub mod buffer;
pub mod context;
pub mod decoder;
mod graph;
pub mod node;
pub mod output;
pub mod resampler;

pub use buffer::AudioBuffer;
pub use context::{AudioContext, ContextState};
pub use graph::AudioDestinationNode;
pub use node::{AudioBufferSourceNode, PlaybackState};
