//! turberfield-audio command line
//!
//! `play` loads a loop from an asset server and plays it on the default
//! output device; `serve` runs that asset server over a directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turberfield_audio::{server, AudioLoopLoader, LoaderSettings};

#[derive(Parser, Debug)]
#[command(name = "turberfield-audio")]
#[command(about = "Fetch, decode and loop audio served under /audio/")]
#[command(version)]
struct Args {
    /// Directory containing audio.json
    #[arg(long, env = "TURBERFIELD_SETTINGS_DIR")]
    settings_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a resource and play it as a loop
    Play {
        /// Resource name, requested as /audio/<name>
        name: String,

        /// Asset server base URL
        #[arg(long, env = "TURBERFIELD_BASE_URL")]
        base_url: Option<String>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Serve a directory of audio files at /audio/<name>
    Serve {
        /// Directory holding the audio files
        root: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "TURBERFIELD_PORT")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turberfield_audio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut settings = match &args.settings_dir {
        Some(dir) => LoaderSettings::load(dir).context("Failed to load settings")?,
        None => LoaderSettings::default(),
    };

    match args.command {
        Command::Play {
            name,
            base_url,
            seconds,
        } => {
            if let Some(base_url) = base_url {
                settings.base_url = base_url;
            }
            play(settings, &name, seconds.map(Duration::from_secs)).await
        }
        Command::Serve { root, port } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            server::serve(root, addr)
                .await
                .context("Audio asset server failed")
        }
    }
}

async fn play(settings: LoaderSettings, name: &str, limit: Option<Duration>) -> Result<()> {
    let loader = AudioLoopLoader::new(settings).context("Failed to create loader")?;
    let handle = loader
        .get_loop(name)
        .context("Failed to create audio context")?;

    info!("Loading {}", loader.url_for(name));
    handle
        .ready()
        .await
        .with_context(|| format!("Failed to load {}", name))?;

    handle.node().start().context("Failed to start playback")?;
    if let Some(buffer) = handle.node().buffer() {
        info!("Looping {} ({:?} per cycle)", name, buffer.duration());
    }

    match limit {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    info!("Stopping {}", name);
    handle.close();
    Ok(())
}
