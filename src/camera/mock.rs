//! Synthetic camera for development machines and tests
//!
//! Produces a colour gradient test pattern. Frames are generated at the
//! padded sensor resolution, like the real hardware, so cropping is
//! exercised too.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::camera::backend::{CameraBackend, VideoStream};
use crate::camera::settings::{CaptureSettings, VideoCodec, VideoSettings};
use crate::error::CameraError;
use crate::imaging::{encode, EncodeFormat};

const MOCK_JPEG_QUALITY: u8 = 80;

/// Test pattern camera
pub struct MockBackend {
    frames_generated: Arc<AtomicU64>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            frames_generated: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total frames produced so far
    pub fn frames_generated(&self) -> u64 {
        self.frames_generated.load(Ordering::Relaxed)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Red ramps left to right, green top to bottom, blue cycles per frame
pub fn test_pattern(width: u32, height: u32, frame: u64, hflip: bool, vflip: bool) -> RgbImage {
    let blue = (frame.wrapping_mul(16) % 256) as u8;
    let mut img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x as u64 * 255 / width.max(1) as u64) as u8;
        let g = (y as u64 * 255 / height.max(1) as u64) as u8;
        Rgb([r, g, blue])
    });
    if hflip {
        image::imageops::flip_horizontal_in_place(&mut img);
    }
    if vflip {
        image::imageops::flip_vertical_in_place(&mut img);
    }
    img
}

impl CameraBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capture<'a>(
        &'a self,
        settings: &'a CaptureSettings,
    ) -> BoxFuture<'a, Result<RgbImage, CameraError>> {
        Box::pin(async move {
            if settings.settle_time_secs > 0 {
                tokio::time::sleep(Duration::from_secs(settings.settle_time_secs)).await;
            }
            let (width, height) = settings.padded_resolution();
            let frame = self.frames_generated.fetch_add(1, Ordering::Relaxed);
            Ok(test_pattern(width, height, frame, settings.hflip, settings.vflip))
        })
    }

    fn record<'a>(
        &'a self,
        settings: &'a VideoSettings,
    ) -> BoxFuture<'a, Result<VideoStream, CameraError>> {
        Box::pin(async move {
            if settings.codec != VideoCodec::Mjpeg {
                return Err(CameraError::Unsupported {
                    backend: "mock",
                    what: format!("{} video", settings.codec.as_arg()),
                });
            }

            let period = Duration::from_secs_f64(1.0 / settings.framerate.max(1) as f64);
            let ticker = tokio::time::interval(period);
            let counter = self.frames_generated.clone();
            let limit = settings.frame_limit();
            let settings = settings.clone();

            let frames = stream::unfold(ticker, |mut ticker| async move {
                ticker.tick().await;
                Some(((), ticker))
            })
            .map(move |_| {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                let img = test_pattern(
                    settings.width,
                    settings.height,
                    n,
                    settings.hflip,
                    settings.vflip,
                );
                let img = image::DynamicImage::ImageRgb8(img);
                encode(&img, EncodeFormat::Jpeg, MOCK_JPEG_QUALITY)
                    .map_err(|e| CameraError::CaptureFailed(e.to_string()))
            });

            let stream: VideoStream = match limit {
                Some(limit) => frames.take(limit as usize).boxed(),
                None => frames.boxed(),
            };
            Ok(stream)
        })
    }
}
