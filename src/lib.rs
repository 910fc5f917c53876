//! # picam-web
//!
//! HTTP front-end for the Raspberry Pi camera module.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        HTTP clients (LAN)                        │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ GET /still /stream /status ...
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  web::server   concurrency limit · CORS · tracing · static files │
//! │  web::routes   static path → handler table                       │
//! │  web::handlers query args → CaptureSettings / VideoSettings      │
//! └───────────────┬──────────────────────────────────┬───────────────┘
//!                 │                                  │
//!                 ▼                                  ▼
//! ┌───────────────────────────────┐   ┌──────────────────────────────┐
//! │  camera::Camera               │   │  imaging                     │
//! │  one exclusive gate,          │   │  annotate → channel → grey   │
//! │  fails fast when busy         │   │  PNG / JPEG encoding         │
//! └───────────────┬───────────────┘   └──────────────────────────────┘
//!                 │
//!                 ▼
//! ┌───────────────────────────────┐   ┌──────────────────────────────┐
//! │  camera::RpicamBackend        │   │  stream                      │
//! │  rpicam-still / rpicam-vid    │──▶│  MJPEG multipart, H.264 raw  │
//! └───────────────────────────────┘   └──────────────────────────────┘
//! ```

pub mod camera;
pub mod config;
pub mod error;
pub mod imaging;
pub mod stream;
pub mod web;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// Default number of requests served at once
    pub const DEFAULT_MAX_REQUESTS: usize = 8;

    /// Default still resolution, the full sensor of the v2 camera module
    pub const DEFAULT_STILL_WIDTH: u32 = 3264;
    pub const DEFAULT_STILL_HEIGHT: u32 = 2464;

    /// Default video resolution and frame rate
    pub const DEFAULT_VIDEO_WIDTH: u32 = 1920;
    pub const DEFAULT_VIDEO_HEIGHT: u32 = 1080;
    pub const DEFAULT_VIDEO_FRAMERATE: u32 = 30;

    /// Slack added to settle and exposure time before a capture times out
    pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 30;

    /// Largest accepted width or height
    pub const MAX_DIMENSION: u32 = 8192;

    /// Highest accepted video frame rate
    pub const MAX_FRAMERATE: u32 = 120;

    /// Annotation defaults
    pub const DEFAULT_FONT_PATH: &str =
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf";
    pub const DEFAULT_TEXT_SIZE: u32 = 16;
    pub const MAX_TEXT_SIZE: u32 = 512;

    /// Default JPEG quality (1-100)
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;

    /// Read size for video process output
    pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

    /// An MJPEG frame larger than this is treated as corrupt
    pub const MAX_MJPEG_FRAME_SIZE: usize = 16 * 1024 * 1024;
}
