// Settings module
// Loader configuration persisted as JSON

#[allow(clippy::module_inception)]
pub mod settings;

pub use settings::{LoaderSettings, OutputBackend, OutputSettings};
