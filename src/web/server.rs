//! HTTP server

use axum::Router;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::camera::Camera;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::imaging::FontCache;
use crate::web::routes::{method_router, ROUTES};

/// State shared by all handlers
pub struct AppState {
    pub camera: Camera,
    pub config: AppConfig,
    pub fonts: Arc<FontCache>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, camera: Camera) -> Self {
        let fonts = Arc::new(FontCache::new(config.imaging.font_path.clone()));
        Self {
            camera,
            config,
            fonts,
            started_at: Utc::now(),
        }
    }
}

/// Build the router from the static route table
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();
    for route in ROUTES {
        tracing::debug!("Adding handler '{}' at {}", route.name, route.path);
        router = router.route(route.path, method_router(route.kind));
    }

    let static_files = &state.config.static_files;
    if static_files.enabled {
        tracing::info!("Serving static files from {}", static_files.dir.display());
        router = router.fallback_service(ServeDir::new(&static_files.dir));
    }

    let max_requests = state.config.server.max_simultaneous_requests;
    router
        .with_state(state)
        .layer(GlobalConcurrencyLimitLayer::new(max_requests))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
}

/// Web server
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: AppConfig, camera: Camera) -> Self {
        Self {
            state: Arc::new(AppState::new(config, camera)),
        }
    }

    /// Address the server listens on
    pub fn addr(&self) -> Result<SocketAddr> {
        let server = &self.state.config.server;
        format!("{}:{}", server.bind_address, server.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address: {}", e)))
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let addr = self.addr()?;
        let app = build_router(self.state.clone());

        tracing::info!("Web server starting on http://{}", addr);
        tracing::info!(
            "Request concurrency limited to {}",
            self.state.config.server.max_simultaneous_requests
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::MockBackend;
    use crate::config::StaticConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(config: AppConfig) -> Arc<AppState> {
        let camera = Camera::new(Box::new(MockBackend::new()), Duration::from_secs(5));
        Arc::new(AppState::new(config, camera))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ORIGIN, "http://dashboard.local")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_say_hi() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app.oneshot(get("/sayhi")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert_eq!(body_json(response).await, serde_json::json!({"say": "hi"}));
    }

    #[tokio::test]
    async fn test_still_png() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(get("/still?hres=100&vres=75&channel=r"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let img = image::load_from_memory(&body).unwrap();
        assert_eq!((img.width(), img.height()), (100, 75));
        assert_eq!(img.color(), image::ColorType::L8);
    }

    #[tokio::test]
    async fn test_still_jpeg() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(get("/still?hres=64&vres=48&grey=true&output=JPEG"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert!(response.headers().contains_key("x-capture-id"));
    }

    #[tokio::test]
    async fn test_invalid_channel() {
        let state = test_state(AppConfig::default());
        let app = build_router(state.clone());
        let response = app
            .oneshot(get("/still?hres=64&vres=48&channel=q"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body = body_json(response).await;
        assert_eq!(body["code"], 400);
        assert_eq!(body["error"], "Invalid image color channel 'q' specified");
        // Rejected before the camera was used
        assert_eq!(state.camera.stats().captures, 0);
    }

    #[tokio::test]
    async fn test_annotation_without_font_is_server_error() {
        let mut config = AppConfig::default();
        config.imaging.font_path = "/nonexistent/font.ttf".into();
        let app = build_router(test_state(config));
        let response = app
            .oneshot(get("/still?hres=64&vres=48&text=hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "No annotation font available");
    }

    #[tokio::test]
    async fn test_busy_camera() {
        let state = test_state(AppConfig::default());
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(get("/stream?codec=mjpeg&hres=32&vres=24&fps=5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=picam_frame_boundary"
        );
        assert!(state.camera.is_busy());

        let busy = app.clone().oneshot(get("/still?hres=64&vres=48")).await.unwrap();
        assert_eq!(busy.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(busy).await["code"], 503);

        // Client goes away, camera is released
        drop(response);
        assert!(!state.camera.is_busy());
        let ok = app.oneshot(get("/still?hres=64&vres=48")).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bounded_mjpeg_stream() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(get("/stream?codec=mjpeg&hres=32&vres=24&fps=100&t=30"))
            .await
            .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert_eq!(text.matches("--picam_frame_boundary\r\n").count(), 3);
    }

    #[tokio::test]
    async fn test_h264_unsupported_by_mock() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app.oneshot(get("/stream")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_status_and_handlers() {
        let state = test_state(AppConfig::default());
        let app = build_router(state);

        let status = body_json(app.clone().oneshot(get("/status")).await.unwrap()).await;
        assert_eq!(status["backend"], "mock");
        assert_eq!(status["busy"], false);
        assert_eq!(status["stats"]["captures"], 0);

        let handlers = body_json(app.oneshot(get("/handlers")).await.unwrap()).await;
        let paths: Vec<&str> = handlers
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["path"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"/still"));
        assert!(paths.contains(&"/stream"));
    }

    #[tokio::test]
    async fn test_unknown_output_type() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app.oneshot(get("/sayhi?output=CSV")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_static_files() {
        let dir = std::env::temp_dir().join(format!("picam-static-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>camera</h1>").unwrap();

        let mut config = AppConfig::default();
        config.static_files = StaticConfig {
            enabled: true,
            dir: dir.clone(),
        };
        let app = build_router(test_state(config));

        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>camera</h1>");

        // Routes still win over static files
        let response = app.oneshot(get("/sayhi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_addr() {
        let camera = Camera::new(Box::new(MockBackend::new()), Duration::from_secs(5));
        let mut config = AppConfig::default();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.http_port = 9090;
        let server = WebServer::new(config, camera);
        assert_eq!(server.addr().unwrap().to_string(), "127.0.0.1:9090");
    }
}
