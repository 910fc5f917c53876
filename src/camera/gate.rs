//! Exclusive access to the camera
//!
//! The sensor can serve only one capture or recording at a time. Requests
//! that arrive while it is in use fail immediately with
//! [`CameraError::Busy`] instead of waiting.

use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use image::RgbImage;
use parking_lot::Mutex;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::camera::backend::{CameraBackend, VideoStream};
use crate::camera::settings::{CaptureSettings, VideoSettings};
use crate::error::CameraError;

/// Usage counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct CameraStats {
    pub captures: u64,
    pub streams: u64,
    pub busy_rejections: u64,
    pub failures: u64,
    pub last_capture: Option<DateTime<Utc>>,
}

/// Camera handle shared by all request handlers
pub struct Camera {
    backend: Box<dyn CameraBackend>,
    gate: Arc<Semaphore>,
    /// Added to the settle and exposure time to bound a capture
    capture_slack: Duration,
    stats: Mutex<CameraStats>,
}

impl Camera {
    pub fn new(backend: Box<dyn CameraBackend>, capture_slack: Duration) -> Self {
        Self {
            backend,
            gate: Arc::new(Semaphore::new(1)),
            capture_slack,
            stats: Mutex::new(CameraStats::default()),
        }
    }

    /// Name of the driver in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Whether a capture or recording currently holds the camera
    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Snapshot of the usage counters
    pub fn stats(&self) -> CameraStats {
        self.stats.lock().clone()
    }

    fn acquire(&self) -> Result<OwnedSemaphorePermit, CameraError> {
        self.gate.clone().try_acquire_owned().map_err(|_| {
            self.stats.lock().busy_rejections += 1;
            tracing::warn!("Camera request rejected: camera is busy");
            CameraError::Busy
        })
    }

    /// Take a still image at exactly the requested resolution
    pub async fn capture(&self, settings: &CaptureSettings) -> Result<RgbImage, CameraError> {
        let _guard = self.acquire()?;

        let deadline = settings.deadline(self.capture_slack);
        tracing::debug!(
            "Starting capture {}x{} on {} (deadline {:?})",
            settings.width,
            settings.height,
            self.backend.name(),
            deadline
        );

        let result = match tokio::time::timeout(deadline, self.backend.capture(settings)).await {
            Ok(result) => result,
            Err(_) => Err(CameraError::Timeout(deadline.as_secs())),
        };

        let mut stats = self.stats.lock();
        match result {
            Ok(frame) => {
                stats.captures += 1;
                stats.last_capture = Some(Utc::now());
                Ok(crop_to(frame, settings.width, settings.height))
            }
            Err(e) => {
                stats.failures += 1;
                tracing::error!("Capture failed: {}", e);
                Err(e)
            }
        }
    }

    /// Start a recording. The camera stays reserved until the returned stream
    /// finishes or is dropped.
    pub async fn record(&self, settings: &VideoSettings) -> Result<VideoStream, CameraError> {
        let guard = self.acquire()?;

        tracing::debug!(
            "Starting {:?} recording {}x{}@{} on {}",
            settings.codec,
            settings.width,
            settings.height,
            settings.framerate,
            self.backend.name()
        );

        match self.backend.record(settings).await {
            Ok(inner) => {
                self.stats.lock().streams += 1;
                Ok(GuardedStream { inner, _guard: guard }.boxed())
            }
            Err(e) => {
                self.stats.lock().failures += 1;
                tracing::error!("Recording failed to start: {}", e);
                Err(e)
            }
        }
    }
}

/// Drop the padding the sensor adds beyond the requested size
fn crop_to(frame: RgbImage, width: u32, height: u32) -> RgbImage {
    if frame.width() == width && frame.height() == height {
        return frame;
    }
    if frame.width() < width || frame.height() < height {
        tracing::warn!(
            "Camera returned {}x{}, smaller than requested {}x{}",
            frame.width(),
            frame.height(),
            width,
            height
        );
        return frame;
    }
    image::imageops::crop_imm(&frame, 0, 0, width, height).to_image()
}

/// Video stream that keeps the camera reserved while alive
struct GuardedStream {
    inner: VideoStream,
    _guard: OwnedSemaphorePermit,
}

impl Stream for GuardedStream {
    type Item = Result<bytes::Bytes, CameraError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
