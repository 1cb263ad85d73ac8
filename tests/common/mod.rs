//! Shared utilities for integration and load testing.

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use emoji_compositor::config::ServiceConfig;
use emoji_compositor::http::HttpServer;
use emoji_compositor::lifecycle::Shutdown;

#[allow(dead_code)]
pub const RED: [u8; 4] = [255, 0, 0, 255];
#[allow(dead_code)]
pub const BLUE: [u8; 4] = [0, 0, 255, 255];

/// Unique scratch directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "emoji_compositor_it_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a solid-color 64x64 PNG named `<name>.png`.
pub fn write_solid_png(dir: &Path, name: &str, color: [u8; 4]) {
    let img = image::RgbaImage::from_pixel(64, 64, image::Rgba(color));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.join(format!("{name}.png")), buf).unwrap();
}

/// Asset dir holding "red" and "blue", plus a config pointing at it.
pub fn fixture_config(name: &str, addr: SocketAddr) -> (PathBuf, ServiceConfig) {
    let dir = temp_dir(name);
    write_solid_png(&dir, "red", RED);
    write_solid_png(&dir, "blue", BLUE);

    let mut config = ServiceConfig::default();
    config.listener.bind_address = addr.to_string();
    config.assets.root = dir.display().to_string();
    config.static_files.enabled = false;
    (dir, config)
}

/// Start a server on `config.listener.bind_address`; stops when `shutdown` fires.
pub async fn start_server(config: ServiceConfig, shutdown: &Shutdown) {
    let listener = tokio::net::TcpListener::bind(&config.listener.bind_address)
        .await
        .unwrap();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
