// turberfield-audio - looping audio resources fetched over HTTP
// Module declarations
pub mod audio;
pub mod error;
pub mod loader;
pub mod server;
pub mod settings;

pub use audio::{AudioBuffer, AudioBufferSourceNode, AudioContext, AudioDestinationNode, PlaybackState};
pub use error::{Error, Result};
pub use loader::{request_path, AudioLoopLoader, LoopHandle, LoopStatus};
pub use settings::{LoaderSettings, OutputBackend, OutputSettings};
