//! Shared fixtures for loader and server integration tests.
//!
//! `AssetServer` is an in-process HTTP server with canned responses per
//! resource name. It records every request path exactly as received, so
//! tests can check what the loader actually put on the wire.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::Mutex;

use turberfield_audio::{LoaderSettings, OutputSettings};

/// Generate a 16-bit PCM WAV file containing a sine wave.
pub fn sine_wav(freq_hz: f32, frames: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut data = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut data), spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = (t * freq_hz * 2.0 * std::f32::consts::PI).sin() * 0.5;
            let sample = (value * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    data
}

#[derive(Clone)]
pub struct Asset {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl Asset {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: None,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: Vec::new(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct Shared {
    assets: HashMap<String, Asset>,
    requests: Vec<String>,
}

pub struct AssetServer {
    addr: SocketAddr,
    shared: Arc<Mutex<Shared>>,
}

impl AssetServer {
    /// Start a server on an ephemeral port. Unknown names get a 404.
    pub async fn start(assets: Vec<(&str, Asset)>) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            assets: assets
                .into_iter()
                .map(|(name, asset)| (name.to_string(), asset))
                .collect(),
            requests: Vec::new(),
        }));

        let router = Router::new()
            .fallback(respond)
            .with_state(Arc::clone(&shared));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, shared }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request paths in arrival order, as sent by the client
    pub fn requests(&self) -> Vec<String> {
        self.shared.lock().requests.clone()
    }
}

async fn respond(State(shared): State<Arc<Mutex<Shared>>>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    let asset = {
        let mut shared = shared.lock();
        shared.requests.push(path.clone());
        path.strip_prefix("/audio/")
            .and_then(|name| shared.assets.get(name).cloned())
    };

    let Some(asset) = asset else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(delay) = asset.delay {
        tokio::time::sleep(delay).await;
    }
    (asset.status, [(header::CONTENT_TYPE, "audio/wav")], asset.body).into_response()
}

/// Loader settings pointing at `base_url` with an offline output
pub fn offline_settings(base_url: &str, sample_rate: u32) -> LoaderSettings {
    LoaderSettings {
        base_url: base_url.to_string(),
        request_timeout_ms: 10_000,
        output: OutputSettings::offline(sample_rate, 2),
    }
}

/// An address nothing is listening on
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
