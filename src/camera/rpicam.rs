//! Raspberry Pi camera driver built on the vendor `rpicam-apps` tools
//!
//! Stills are taken with `rpicam-still`, encoded as PNG on stdout and
//! decoded here. Video comes from `rpicam-vid` writing the encoded stream to
//! stdout. Child processes are killed when their future or stream is dropped.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use image::{ImageFormat, RgbImage};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use crate::camera::backend::{CameraBackend, VideoStream};
use crate::camera::settings::{CaptureSettings, VideoCodec, VideoSettings};
use crate::config::CameraConfig;
use crate::constants::STREAM_CHUNK_SIZE;
use crate::error::CameraError;

/// Driver that shells out to `rpicam-still` / `rpicam-vid`
pub struct RpicamBackend {
    still_command: String,
    video_command: String,
}

impl RpicamBackend {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            still_command: config.still_command.clone(),
            video_command: config.video_command.clone(),
        }
    }

    fn spawn_error(command: &str, e: std::io::Error) -> CameraError {
        CameraError::Spawn {
            command: command.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Command line for a single still
pub fn still_args(settings: &CaptureSettings) -> Vec<String> {
    // Preview runs for the settle time so AGC and AWB can converge
    let settle_ms = (settings.settle_time_secs * 1000).max(1);

    let mut args = vec![
        "--nopreview".to_string(),
        "--timeout".to_string(),
        settle_ms.to_string(),
        "--width".to_string(),
        settings.width.to_string(),
        "--height".to_string(),
        settings.height.to_string(),
        "--framerate".to_string(),
        format!("{:.4}", settings.framerate()),
    ];

    if settings.hflip {
        args.push("--hflip".to_string());
    }
    if settings.vflip {
        args.push("--vflip".to_string());
    }
    if let Some(iso) = settings.iso {
        // ISO 100 corresponds to unity analogue gain
        args.push("--gain".to_string());
        args.push(format!("{:.2}", iso as f64 / 100.0));
    }
    if let Some(shutter) = settings.shutter_speed_us {
        args.push("--shutter".to_string());
        args.push(shutter.to_string());
    }
    if let Some(awb) = &settings.awb_mode {
        args.push("--awb".to_string());
        args.push(awb.clone());
    }
    if let Some(exposure) = &settings.exposure_mode {
        args.push("--exposure".to_string());
        args.push(exposure.clone());
    }
    if let Some(mode) = &settings.sensor_mode {
        args.push("--mode".to_string());
        args.push(mode.clone());
    }

    args.extend(["--encoding", "png", "--output", "-"].map(String::from));
    args
}

/// Command line for a recording
pub fn video_args(settings: &VideoSettings) -> Vec<String> {
    let mut args = vec![
        "--nopreview".to_string(),
        "--timeout".to_string(),
        settings.duration_ms.to_string(),
        "--width".to_string(),
        settings.width.to_string(),
        "--height".to_string(),
        settings.height.to_string(),
        "--framerate".to_string(),
        settings.framerate.to_string(),
        "--codec".to_string(),
        settings.codec.as_arg().to_string(),
    ];

    if settings.codec == VideoCodec::H264 {
        // Repeat SPS/PPS on every I-frame so a client can start decoding
        args.push("--inline".to_string());
    }
    if settings.hflip {
        args.push("--hflip".to_string());
    }
    if settings.vflip {
        args.push("--vflip".to_string());
    }
    if let Some(bitrate) = settings.bitrate {
        args.push("--bitrate".to_string());
        args.push(bitrate.to_string());
    }

    args.extend(["--output", "-"].map(String::from));
    args
}

impl CameraBackend for RpicamBackend {
    fn name(&self) -> &'static str {
        "rpicam"
    }

    fn capture<'a>(
        &'a self,
        settings: &'a CaptureSettings,
    ) -> BoxFuture<'a, Result<RgbImage, CameraError>> {
        Box::pin(async move {
            let args = still_args(settings);
            tracing::debug!("Running {} {}", self.still_command, args.join(" "));

            let output = Command::new(&self.still_command)
                .args(&args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| Self::spawn_error(&self.still_command, e))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(CameraError::ProcessFailed {
                    status: output.status.to_string(),
                    stderr: last_line(&stderr).to_string(),
                });
            }

            let img = image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
                .map_err(|e| CameraError::CaptureFailed(format!("undecodable frame: {}", e)))?;
            Ok(img.to_rgb8())
        })
    }

    fn record<'a>(
        &'a self,
        settings: &'a VideoSettings,
    ) -> BoxFuture<'a, Result<VideoStream, CameraError>> {
        Box::pin(async move {
            let args = video_args(settings);
            tracing::debug!("Running {} {}", self.video_command, args.join(" "));

            let mut child = Command::new(&self.video_command)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| Self::spawn_error(&self.video_command, e))?;

            let stdout = child.stdout.take().ok_or_else(|| {
                CameraError::CaptureFailed("video process has no stdout".to_string())
            })?;

            Ok(child_output_stream(child, stdout))
        })
    }
}

/// Read the child's stdout in chunks. The child is owned by the stream so it
/// lives exactly as long as someone is reading.
fn child_output_stream(child: Child, stdout: ChildStdout) -> VideoStream {
    stream::unfold(Some((child, stdout)), |state| async move {
        let (mut child, mut stdout) = state?;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        match stdout.read(&mut buf).await {
            Ok(0) => {
                match child.wait().await {
                    Ok(status) => tracing::debug!("Video process exited with {}", status),
                    Err(e) => tracing::warn!("Failed to reap video process: {}", e),
                }
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some((child, stdout))))
            }
            Err(e) => Some((Err(CameraError::StreamRead(e.to_string())), None)),
        }
    })
    .boxed()
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
}
