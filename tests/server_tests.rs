//! Asset routes serving `/audio/<path>` from a directory.

mod fixtures;

use std::path::Path;

use fixtures::{offline_settings, sine_wav};
use turberfield_audio::server::{audio_routes, AUDIO_CONTENT_TYPE};
use turberfield_audio::AudioLoopLoader;

async fn spawn_server(root: &Path) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = audio_routes(root.to_path_buf());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_serves_file_as_wav() {
    let dir = tempfile::tempdir().unwrap();
    let wav = sine_wav(440.0, 100, 8000, 1);
    std::fs::write(dir.path().join("theme.wav"), &wav).unwrap();
    let base = spawn_server(dir.path()).await;

    let response = reqwest::get(format!("{}/audio/theme.wav", base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap().to_str().unwrap(),
        AUDIO_CONTENT_TYPE
    );
    assert_eq!(response.bytes().await.unwrap().to_vec(), wav);
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;

    let response = reqwest::get(format!("{}/audio/nope.wav", base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_separator_in_name_is_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("x.wav"), b"RIFF").unwrap();
    let base = spawn_server(dir.path()).await;

    let response = reqwest::get(format!("{}/audio/sub%2Fx.wav", base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = reqwest::get(format!("{}/audio/..", base)).await.unwrap();
    assert_ne!(response.status().as_u16(), 200);
}

/// Status code for `GET <path>` sent as-is, without client-side dot-segment removal
async fn raw_status(base: &str, path: &str) -> u16 {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let addr = base.trim_start_matches("http://");
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n", path, addr);
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    response.split_whitespace().nth(1).unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_dot_names_are_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;

    assert_eq!(raw_status(&base, "/audio/.").await, 403);
    assert_eq!(raw_status(&base, "/audio/..").await, 403);
}

#[tokio::test]
async fn test_directory_is_404() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("folder.wav")).unwrap();
    let base = spawn_server(dir.path()).await;

    let response = reqwest::get(format!("{}/audio/folder.wav", base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_loader_against_asset_routes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ambience.wav"), sine_wav(200.0, 1600, 8000, 2)).unwrap();
    let base = spawn_server(dir.path()).await;

    let loader = AudioLoopLoader::new(offline_settings(&base, 8000)).unwrap();
    let handle = loader.get_loop("ambience.wav").unwrap();
    handle.ready().await.unwrap();

    let buffer = handle.node().buffer().unwrap();
    assert_eq!(buffer.channels(), 2);
    assert_eq!(buffer.frames(), 1600);
    assert!(handle.node().loop_enabled());
}
