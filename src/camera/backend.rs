//! Driver abstraction for the camera hardware

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use image::RgbImage;

use crate::camera::settings::{CaptureSettings, VideoSettings};
use crate::error::CameraError;

/// Encoded video as it comes off the camera, in arbitrary chunk sizes
pub type VideoStream = BoxStream<'static, Result<Bytes, CameraError>>;

/// A camera driver.
///
/// Implementations do not serialize access themselves; callers go through
/// [`Camera`](crate::camera::Camera), which guarantees that at most one
/// capture or recording is in progress.
pub trait CameraBackend: Send + Sync {
    /// Short identifier used in logs and status output
    fn name(&self) -> &'static str;

    /// Take one still frame. The returned image may be larger than the
    /// requested resolution when the sensor pads its buffers.
    fn capture<'a>(
        &'a self,
        settings: &'a CaptureSettings,
    ) -> BoxFuture<'a, Result<RgbImage, CameraError>>;

    /// Start a recording. The stream ends when the recording does; dropping
    /// it stops the camera.
    fn record<'a>(
        &'a self,
        settings: &'a VideoSettings,
    ) -> BoxFuture<'a, Result<VideoStream, CameraError>>;
}
