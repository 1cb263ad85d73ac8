//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, CORS headers)
//! - Serve static files for everything outside the API
//! - Bind the plain listener, or the TLS listener plus its redirect listener
//! - Stop gracefully when the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::compose::{AssetStore, CompositeCache, CompositeService};
use crate::config::ServiceConfig;
use crate::http::generate::{generate, preflight};
use crate::http::redirect::redirect_router;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::CorsHeaders;
use crate::http::stats::stats;

/// Grace period for in-flight TLS connections after shutdown is signalled.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CompositeService>,
}

/// HTTP server for the compositing service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    service: Arc<CompositeService>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Self {
        let service = Arc::new(CompositeService::new(
            AssetStore::from_config(&config.assets),
            CompositeCache::new(config.cache.max_entries),
        ));
        Self::with_service(config, service)
    }

    /// Create a server around an existing compositing service.
    pub fn with_service(config: ServiceConfig, service: Arc<CompositeService>) -> Self {
        let state = AppState {
            service: service.clone(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            service,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/generate", get(generate).options(preflight))
            .route("/stats", get(stats));

        if config.static_files.enabled {
            router = router.fallback_service(ServeDir::new(&config.static_files.root));
        }

        let router = router
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        CorsHeaders::from_config(&config.cors)
            .apply(router)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The compositing service behind the handlers.
    pub fn service(&self) -> Arc<CompositeService> {
        self.service.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            cache_capacity = self.service.cache().capacity(),
            asset_root = %self.service.assets().root().display(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `listener.bind_address`, plus the optional plaintext
    /// redirect listener, until `shutdown` fires.
    pub async fn run_tls(
        self,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        if let Some(tls_config) = &self.config.listener.tls {
            if let Some(redirect_address) = &tls_config.redirect_address {
                let listener = TcpListener::bind(redirect_address).await?;
                let router = redirect_router(&tls_config.redirect_origin);
                let mut redirect_shutdown = shutdown.resubscribe();
                tracing::info!(
                    address = %redirect_address,
                    origin = %tls_config.redirect_origin,
                    "Redirect listener starting"
                );
                tokio::spawn(async move {
                    let served = axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            let _ = redirect_shutdown.recv().await;
                        })
                        .await;
                    if let Err(e) = served {
                        tracing::error!(error = %e, "Redirect listener failed");
                    }
                });
            }
        }

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(
            address = %addr,
            cache_capacity = self.service.cache().capacity(),
            asset_root = %self.service.assets().root().display(),
            "HTTPS server starting"
        );

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::assets::tests::{temp_dir, write_solid_png};
    use crate::http::response::CACHE_HIT;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn test_server(name: &str) -> (PathBuf, HttpServer) {
        let dir = temp_dir(name);
        let assets = dir.join("assets");
        let build = dir.join("build");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::create_dir_all(&build).unwrap();
        write_solid_png(&assets, "red", (64, 64), [255, 0, 0, 255]);
        write_solid_png(&assets, "blue", (64, 64), [0, 0, 255, 255]);
        std::fs::write(build.join("index.html"), "<html>emoji</html>").unwrap();

        let mut config = ServiceConfig::default();
        config.assets.root = assets.display().to_string();
        config.static_files.root = build.display().to_string();
        (dir, HttpServer::new(config))
    }

    async fn send(server: &HttpServer, method: Method, uri: &str) -> axum::response::Response {
        server
            .router()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn assert_cors(response: &axum::response::Response) {
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    }

    #[tokio::test]
    async fn generate_miss_then_hit() {
        let (dir, server) = test_server("server_generate");
        let uri = "/generate?top=red&bottom=blue&percent=50";

        let first = send(&server, Method::GET, uri).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(first.headers()[CACHE_HIT], "false");
        assert!(first.headers().contains_key("x-request-id"));
        assert_cors(&first);
        let first_len: usize = first.headers()[header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let first_body = to_bytes(first.into_body(), usize::MAX).await.unwrap();
        assert_eq!(first_body.len(), first_len);

        let second = send(&server, Method::GET, uri).await;
        assert_eq!(second.headers()[CACHE_HIT], "true");
        let second_body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(first_body, second_body);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn invalid_requests_are_400_with_cors() {
        let (dir, server) = test_server("server_invalid");
        for uri in [
            "/generate?top=red&bottom=blue",
            "/generate?top=red&bottom=blue&percent=150",
            "/generate?top=red&bottom=blue&percent=half",
            "/generate?top=..%2Fsecret&bottom=blue&percent=5",
        ] {
            let response = send(&server, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_cors(&response);
        }
        assert!(server.service().cache().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn repeated_query_keys_use_first_value() {
        let (dir, server) = test_server("server_repeated_keys");
        let response = send(
            &server,
            Method::GET,
            "/generate?top=red&top=blue&bottom=blue&percent=50",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let img = image::load_from_memory(&body).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 63).0, [0, 0, 255, 255]);

        let canonical = send(&server, Method::GET, "/generate?top=red&bottom=blue&percent=50").await;
        assert_eq!(canonical.headers()[CACHE_HIT], "true");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_asset_is_500() {
        let (dir, server) = test_server("server_missing");
        let response = send(&server, Method::GET, "/generate?top=missing&bottom=blue&percent=50").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_cors(&response);
        assert!(server.service().cache().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn preflight_is_empty_200() {
        let (dir, server) = test_server("server_preflight");
        let response = send(&server, Method::OPTIONS, "/generate").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn static_files_served_from_build_dir() {
        let (dir, server) = test_server("server_static");
        let found = send(&server, Method::GET, "/index.html").await;
        assert_eq!(found.status(), StatusCode::OK);
        let body = to_bytes(found.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<html>emoji</html>");

        let missing = send(&server, Method::GET, "/nope.js").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn stats_report_cache_activity() {
        let (dir, server) = test_server("server_stats");
        send(&server, Method::GET, "/generate?top=red&bottom=blue&percent=10").await;
        send(&server, Method::GET, "/generate?top=red&bottom=blue&percent=10").await;

        let response = send(&server, Method::GET, "/stats").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["entries"], 1);
        assert_eq!(json["capacity"], 25_000);
        assert_eq!(json["hits"], 1);
        assert_eq!(json["misses"], 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
