//! HTTP API handlers

use axum::{
    extract::{Query, State},
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::camera::settings::{sensor_mode_for_index, MAX_SENSOR_MODE};
use crate::camera::{CameraStats, CaptureSettings, VideoCodec, VideoSettings};
use crate::config::{CameraConfig, ImagingConfig};
use crate::constants::{MAX_DIMENSION, MAX_FRAMERATE, MAX_TEXT_SIZE};
use crate::error::{Error, ImagingError, Result};
use crate::imaging::{parse_color, Channel, PostProcess};
use crate::web::args::{RequestArgs, OUTPUT_PARAM};
use crate::web::content::{respond, ContentType, HandlerOutput};
use crate::web::error::ApiError;
use crate::web::routes::ROUTES;
use crate::web::server::AppState;

type Params = Query<HashMap<String, String>>;

/// System status
#[derive(Serialize)]
pub struct SystemStatus {
    pub backend: &'static str,
    pub busy: bool,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub version: &'static str,
    pub stats: CameraStats,
}

async fn respond_json(
    state: &AppState,
    args: &RequestArgs,
    value: serde_json::Value,
) -> Result<Response> {
    respond(
        HandlerOutput::Json(value),
        args.get_content_type()?,
        state.config.imaging.jpeg_quality,
    )
    .await
}

/// Say hi
pub async fn say_hi(
    State(state): State<Arc<AppState>>,
    Query(params): Params,
) -> std::result::Result<Response, ApiError> {
    let args = RequestArgs::new(params);
    Ok(respond_json(&state, &args, json!({ "say": "hi" })).await?)
}

/// Get camera and service status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(params): Params,
) -> std::result::Result<Response, ApiError> {
    let args = RequestArgs::new(params);
    let status = SystemStatus {
        backend: state.camera.backend_name(),
        busy: state.camera.is_busy(),
        started_at: state.started_at,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        version: env!("CARGO_PKG_VERSION"),
        stats: state.camera.stats(),
    };
    let value = serde_json::to_value(status).map_err(Error::from)?;
    Ok(respond_json(&state, &args, value).await?)
}

/// List the route table
pub async fn list_handlers(
    State(state): State<Arc<AppState>>,
    Query(params): Params,
) -> std::result::Result<Response, ApiError> {
    let args = RequestArgs::new(params);
    let value = serde_json::to_value(ROUTES).map_err(Error::from)?;
    Ok(respond_json(&state, &args, value).await?)
}

/// Capture a still image
pub async fn still_image(
    State(state): State<Arc<AppState>>,
    Query(params): Params,
) -> std::result::Result<Response, ApiError> {
    let args = RequestArgs::new(params);

    // Validate everything before touching the camera
    let settings = capture_settings(&args, &state.config.camera)?;
    let post = post_process(&args, &state.config.imaging)?;
    let format = still_format(&args);
    if post.text.is_some() {
        state.fonts.font()?;
    }

    let capture_id = Uuid::new_v4();
    tracing::info!(
        "Capture {}: still {}x{} as {:?}",
        capture_id,
        settings.width,
        settings.height,
        format
    );

    let frame = state.camera.capture(&settings).await?;

    let fonts = state.fonts.clone();
    let image = tokio::task::spawn_blocking(move || post.apply(frame, &fonts))
        .await
        .map_err(|e| ImagingError::Encode(e.to_string()))??;

    let output = HandlerOutput::Image {
        image,
        capture_id,
        format,
    };
    Ok(respond(output, format, state.config.imaging.jpeg_quality).await?)
}

/// Stream video from the camera
pub async fn video_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Params,
) -> std::result::Result<Response, ApiError> {
    let args = RequestArgs::new(params);
    let settings = video_settings(&args, &state.config.camera)?;

    tracing::info!(
        "Starting {} stream {}x{}@{}",
        settings.codec.as_arg(),
        settings.width,
        settings.height,
        settings.framerate
    );

    let stream = state.camera.record(&settings).await?;
    let output = HandlerOutput::Video {
        codec: settings.codec,
        stream,
    };
    let requested = match settings.codec {
        VideoCodec::H264 => ContentType::H264,
        VideoCodec::Mjpeg => ContentType::Mjpeg,
    };
    Ok(respond(output, requested, state.config.imaging.jpeg_quality).await?)
}

/// Stills are PNG unless JPEG is asked for
fn still_format(args: &RequestArgs) -> ContentType {
    match args.get(OUTPUT_PARAM).map(ContentType::parse) {
        Some(Ok(ContentType::Jpeg)) => ContentType::Jpeg,
        _ => ContentType::Png,
    }
}

fn dimension(args: &RequestArgs, name: &str, default: u32) -> Result<u32> {
    let value = args.get_int_arg(name, default as i64);
    if value < 1 || value > MAX_DIMENSION as i64 {
        return Err(Error::InvalidRequest(format!(
            "'{}' must be between 1 and {}, got {}",
            name, MAX_DIMENSION, value
        )));
    }
    Ok(value as u32)
}

fn non_negative(args: &RequestArgs, name: &str) -> Result<Option<u32>> {
    match args.get_opt_int_arg(name) {
        None => Ok(None),
        Some(v) if (0..=u32::MAX as i64).contains(&v) => Ok(Some(v as u32)),
        Some(v) => Err(Error::InvalidRequest(format!(
            "'{}' must not be negative, got {}",
            name, v
        ))),
    }
}

/// Camera parameters of a `/still` request
pub fn capture_settings(args: &RequestArgs, config: &CameraConfig) -> Result<CaptureSettings> {
    let width = dimension(args, "hres", config.still_width)?;
    let height = dimension(args, "vres", config.still_height)?;

    let mut settings = CaptureSettings::new(width, height);
    settings.shutter_speed_us = non_negative(args, "ss")?;
    settings.iso = non_negative(args, "iso")?;
    settings.settle_time_secs = non_negative(args, "st")?.unwrap_or(0) as u64;
    settings.exposure_mode = args.get_argument("ex", None);
    settings.awb_mode = args.get_argument("awb", None);
    settings.hflip = args.get_boolean_arg("hflip", false);
    settings.vflip = args.get_boolean_arg("vflip", false);
    settings.sensor_mode = sensor_mode(args)?;
    Ok(settings)
}

/// Legacy `md` index mapped to a driver mode. Non-numeric values count as 0.
fn sensor_mode(args: &RequestArgs) -> Result<Option<String>> {
    match args.get_int_arg("md", 0) {
        0 => Ok(None),
        index => sensor_mode_for_index(index)
            .map(|mode| Some(mode.to_string()))
            .ok_or_else(|| {
                Error::InvalidRequest(format!(
                    "'md' must be between 0 and {}, got {}",
                    MAX_SENSOR_MODE, index
                ))
            }),
    }
}

/// Post-processing parameters of a `/still` request
pub fn post_process(args: &RequestArgs, config: &ImagingConfig) -> Result<PostProcess> {
    let text_size = args.get_int_arg("textsize", config.text_size as i64);
    if text_size < 1 || text_size > MAX_TEXT_SIZE as i64 {
        return Err(Error::InvalidRequest(format!(
            "'textsize' must be between 1 and {}, got {}",
            MAX_TEXT_SIZE, text_size
        )));
    }

    let color = args
        .get_argument("textcolor", Some(config.text_color.as_str()))
        .unwrap_or_else(|| config.text_color.clone());

    Ok(PostProcess {
        text: args.get_argument("text", None),
        text_size: text_size as u32,
        text_color: parse_color(&color)?,
        channel: args.get("channel").map(Channel::parse).transpose()?,
        grey: args.get_boolean_arg("grey", false),
    })
}

/// Recording parameters of a `/stream` request
pub fn video_settings(args: &RequestArgs, config: &CameraConfig) -> Result<VideoSettings> {
    let width = dimension(args, "hres", config.video_width)?;
    let height = dimension(args, "vres", config.video_height)?;

    let framerate = args.get_int_arg("fps", config.video_framerate as i64);
    if framerate < 1 || framerate > MAX_FRAMERATE as i64 {
        return Err(Error::InvalidRequest(format!(
            "'fps' must be between 1 and {}, got {}",
            MAX_FRAMERATE, framerate
        )));
    }

    let mut settings = VideoSettings::new(width, height, framerate as u32);
    if let Some(codec) = args.get("codec") {
        settings.codec = VideoCodec::parse(codec)
            .ok_or_else(|| Error::InvalidRequest(format!("Unsupported codec '{}'", codec)))?;
    }
    settings.duration_ms = non_negative(args, "t")?.unwrap_or(0) as u64;
    settings.bitrate = non_negative(args, "bitrate")?;
    settings.hflip = args.get_boolean_arg("hflip", false);
    settings.vflip = args.get_boolean_arg("vflip", false);
    Ok(settings)
}
