//! Camera subsystem module

pub mod backend;
pub mod gate;
pub mod mock;
pub mod rpicam;
pub mod settings;

pub use backend::{CameraBackend, VideoStream};
pub use gate::{Camera, CameraStats};
pub use mock::MockBackend;
pub use rpicam::RpicamBackend;
pub use settings::{CaptureSettings, VideoCodec, VideoSettings};

use std::time::Duration;

use crate::config::{BackendKind, CameraConfig};

/// Build the camera described by the configuration
pub fn open_camera(config: &CameraConfig) -> Camera {
    let backend: Box<dyn CameraBackend> = match config.backend {
        BackendKind::Rpicam => Box::new(RpicamBackend::new(config)),
        BackendKind::Mock => Box::new(MockBackend::new()),
    };
    tracing::info!("Using {} camera backend", backend.name());
    Camera::new(backend, Duration::from_secs(config.capture_timeout_secs))
}
