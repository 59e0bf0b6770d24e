// Audio output using cpal
// The stream lives on its own thread and pulls frames from the context graph

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

use crate::audio::graph::AudioGraph;
use crate::error::{Error, Result};

pub struct AudioOutput {
    host: &'static str,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutput {
    /// Open the default output device and start pulling from a new graph
    ///
    /// The platform's default host is tried first, then every other
    /// available host. Fails with `Error::Unsupported` when none of them
    /// has an output device.
    pub(crate) fn open() -> Result<(Self, Arc<AudioGraph>)> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let (host, stream, graph) = match Self::start_stream() {
                    Ok(started) => started,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok((host, graph)));

                // Keep the stream alive until the owner hangs up
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output on {} stopped", host);
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        let (host, graph) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Output thread exited during startup".to_string()))??;

        Ok((
            Self {
                host,
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            },
            graph,
        ))
    }

    fn start_stream() -> Result<(&'static str, Stream, Arc<AudioGraph>)> {
        let (host, device, config) = Self::select_device()?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        let graph = AudioGraph::new(sample_rate, channels);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), Arc::clone(&graph))?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), Arc::clone(&graph))?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), Arc::clone(&graph))?
            }
            format => return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", format))),
        };

        stream.play().map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!("Audio output on {} host: {}Hz, {} channels", host, sample_rate, channels);
        Ok((host, stream, graph))
    }

    fn select_device() -> Result<(&'static str, cpal::Device, cpal::SupportedStreamConfig)> {
        let default_id = cpal::default_host().id();
        let mut candidates = vec![default_id];
        candidates.extend(cpal::available_hosts().into_iter().filter(|id| *id != default_id));

        for id in candidates {
            let host = match cpal::host_from_id(id) {
                Ok(host) => host,
                Err(e) => {
                    debug!("Audio host {} unavailable: {}", id.name(), e);
                    continue;
                }
            };
            let Some(device) = host.default_output_device() else {
                debug!("Audio host {} has no output device", id.name());
                continue;
            };
            match device.default_output_config() {
                Ok(config) => return Ok((id.name(), device, config)),
                Err(e) => debug!("Audio host {} has no usable output config: {}", id.name(), e),
            }
        }

        Err(Error::Unsupported("No audio host provides an output device".to_string()))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        graph: Arc<AudioGraph>,
    ) -> Result<Stream> {
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                graph.render(&mut scratch);

                for (sample, &value) in data.iter_mut().zip(scratch.iter()) {
                    *sample = T::from_sample(value);
                }
            },
            move |err| {
                error!("Audio output error: {}", err);
            },
            None,
        ).map_err(|e| Error::AudioOutput(format!("Failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    /// Name of the audio host the stream runs on
    pub fn host_name(&self) -> &'static str {
        self.host
    }

    /// Stop the stream and wait for the output thread to exit
    pub fn close(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.close();
    }
}
