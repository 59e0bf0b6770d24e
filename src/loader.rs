//! Loop loading: fetch `/audio/<name>`, decode, and bind to a looping source node
//!
//! `AudioLoopLoader::get_loop` returns a [`LoopHandle`] straight away. The
//! fetch and decode run on the tokio runtime; the handle reports how that
//! went through [`LoopHandle::status`] and [`LoopHandle::ready`]. The node
//! is configured (buffer set, connected to the destination, loop flag on)
//! only when both steps succeed, and it is never started by the loader.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioBufferSourceNode, AudioContext};
use crate::error::{Error, Result};
use crate::settings::LoaderSettings;

/// Request path for a resource name; the name is used verbatim
pub fn request_path(name: &str) -> String {
    format!("/audio/{}", name)
}

/// Progress of a loop load
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStatus {
    Loading,
    /// Buffer assigned, node connected and looping
    Ready,
    Failed(Error),
}

pub struct AudioLoopLoader {
    client: reqwest::Client,
    settings: LoaderSettings,
    runtime: Handle,
}

impl AudioLoopLoader {
    /// Must be called from within a tokio runtime; loads are spawned onto it.
    pub fn new(settings: LoaderSettings) -> Result<Self> {
        settings.validate()?;

        let runtime = Handle::try_current().map_err(|_| {
            Error::Unsupported("AudioLoopLoader needs a running tokio runtime".to_string())
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings,
            runtime,
        })
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Full URL requested for `name`
    pub fn url_for(&self, name: &str) -> String {
        format!("{}{}", self.settings.base(), request_path(name))
    }

    /// Start loading `name` as a loop in a new audio context
    ///
    /// Returns before any network or decode work happens. Fails only when
    /// the audio context itself cannot be created.
    ///
    /// With the `device` backend this blocks the calling thread while the
    /// output thread opens the device: `AudioContext::new` waits on a channel
    /// until cpal has built and started the stream. Call it from
    /// `spawn_blocking` if that delay matters to the caller's runtime. The
    /// `offline` backend never blocks.
    pub fn get_loop(&self, name: &str) -> Result<LoopHandle> {
        let context = Arc::new(AudioContext::from_settings(&self.settings.output)?);
        let node = context.create_buffer_source();

        let (status_tx, status_rx) = watch::channel(LoopStatus::Loading);
        let cancel = CancellationToken::new();

        let task = LoadTask {
            client: self.client.clone(),
            url: self.url_for(name),
            name: name.to_string(),
            context: Arc::clone(&context),
            node: node.clone(),
        };
        let token = cancel.clone();

        self.runtime.spawn(async move {
            let name = task.name.clone();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                result = task.run() => result,
            };

            let status = match outcome {
                Ok(()) => {
                    info!("Loop {} ready", name);
                    LoopStatus::Ready
                }
                Err(Error::Cancelled) => {
                    debug!("Loop {} cancelled", name);
                    LoopStatus::Failed(Error::Cancelled)
                }
                Err(e @ Error::Decode(_)) => {
                    error!("Loop {}: {}", name, e);
                    LoopStatus::Failed(e)
                }
                Err(e) => {
                    warn!("Loop {} failed to load: {}", name, e);
                    LoopStatus::Failed(e)
                }
            };
            status_tx.send_replace(status);
        });

        Ok(LoopHandle {
            name: name.to_string(),
            path: request_path(name),
            context,
            node,
            status: status_rx,
            cancel,
        })
    }
}

struct LoadTask {
    client: reqwest::Client,
    url: String,
    name: String,
    context: Arc<AudioContext>,
    node: AudioBufferSourceNode,
}

impl LoadTask {
    async fn run(self) -> Result<()> {
        debug!("GET {}", self.url);
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await?
            .error_for_status()?;
        let data = response.bytes().await?;
        debug!("Received {} bytes for {}", data.len(), self.name);

        let buffer = self
            .context
            .decode_audio_data(data, Some(self.name.clone()))
            .await?;

        // Buffer, connection and loop flag land together or not at all
        self.node.connect_looping(&self.context.destination(), buffer)
    }
}

/// A pending or loaded loop: its context, its node and the load outcome
///
/// Dropping the handle cancels a load still in flight. `close` also stops
/// the node and releases the context's output.
pub struct LoopHandle {
    name: String,
    path: String,
    context: Arc<AudioContext>,
    node: AudioBufferSourceNode,
    status: watch::Receiver<LoopStatus>,
    cancel: CancellationToken,
}

impl LoopHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request_path(&self) -> &str {
        &self.path
    }

    pub fn node(&self) -> &AudioBufferSourceNode {
        &self.node
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn status(&self) -> LoopStatus {
        self.status.borrow().clone()
    }

    /// Wait until the load succeeds or fails
    pub async fn ready(&self) -> Result<()> {
        let mut status = self.status.clone();
        let outcome = status
            .wait_for(|s| *s != LoopStatus::Loading)
            .await
            .map(|s| (*s).clone())
            .map_err(|_| Error::Cancelled)?;

        match outcome {
            LoopStatus::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Abandon the load; a node that is already configured is left as is
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel, stop and disconnect the node, and close the context
    pub fn close(self) {
        self.cancel();
        self.node.stop();
        self.node.disconnect();
        self.context.close();
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("name", &self.name)
            .field("status", &*self.status.borrow())
            .field("node", &self.node)
            .finish()
    }
}
