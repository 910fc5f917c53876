//! Response encodings and the content-type switch

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use image::DynamicImage;
use serde_json::Value;
use uuid::Uuid;

use crate::camera::{VideoCodec, VideoStream};
use crate::error::{Error, ImagingError, Result};
use crate::imaging::{encode, EncodeFormat};
use crate::stream::{h264_response, mjpeg_response, H264_CONTENT_TYPE, MJPEG_CONTENT_TYPE};

/// Encodings a handler result can be rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Png,
    Jpeg,
    H264,
    Mjpeg,
}

impl ContentType {
    /// Parse the `output` argument, case-insensitive
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "JSON" => Ok(Self::Json),
            "PNG" => Ok(Self::Png),
            "JPEG" | "JPG" => Ok(Self::Jpeg),
            "H264" => Ok(Self::H264),
            "MJPEG" => Ok(Self::Mjpeg),
            _ => Err(Error::InvalidRequest(format!(
                "Unsupported output type '{}'",
                value
            ))),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::H264 => H264_CONTENT_TYPE,
            Self::Mjpeg => MJPEG_CONTENT_TYPE,
        }
    }
}

/// What a handler produced, before encoding
pub enum HandlerOutput {
    Json(Value),
    Image {
        image: DynamicImage,
        capture_id: Uuid,
        /// Image format the handler insists on
        format: ContentType,
    },
    Video {
        codec: VideoCodec,
        stream: VideoStream,
    },
}

impl HandlerOutput {
    /// Content type fixed by the result itself, overriding the request
    pub fn forced_content_type(&self) -> Option<ContentType> {
        match self {
            Self::Json(_) => None,
            Self::Image { format, .. } => Some(*format),
            Self::Video { codec: VideoCodec::H264, .. } => Some(ContentType::H264),
            Self::Video { codec: VideoCodec::Mjpeg, .. } => Some(ContentType::Mjpeg),
        }
    }
}

/// Encode a handler result for the wire
pub async fn respond(
    output: HandlerOutput,
    requested: ContentType,
    jpeg_quality: u8,
) -> Result<Response> {
    let content_type = output.forced_content_type().unwrap_or(requested);

    match (content_type, output) {
        (ContentType::Json, HandlerOutput::Json(value)) => {
            let body = serde_json::to_string_pretty(&value)?;
            Ok(([(header::CONTENT_TYPE, content_type.mime())], body).into_response())
        }
        (ContentType::Png | ContentType::Jpeg, HandlerOutput::Image { image, capture_id, .. }) => {
            let format = if content_type == ContentType::Png {
                EncodeFormat::Png
            } else {
                EncodeFormat::Jpeg
            };
            let bytes = tokio::task::spawn_blocking(move || encode(&image, format, jpeg_quality))
                .await
                .map_err(|e| ImagingError::Encode(e.to_string()))??;
            tracing::debug!(
                "Encoded capture {} as {:?} ({} bytes)",
                capture_id,
                format,
                bytes.len()
            );
            Ok((
                [
                    (header::CONTENT_TYPE, content_type.mime().to_string()),
                    (header::HeaderName::from_static("x-capture-id"), capture_id.to_string()),
                ],
                bytes,
            )
                .into_response())
        }
        (ContentType::H264, HandlerOutput::Video { stream, .. }) => Ok(h264_response(stream)),
        (ContentType::Mjpeg, HandlerOutput::Video { stream, .. }) => Ok(mjpeg_response(stream)),
        (ContentType::Png | ContentType::Jpeg, _) => {
            Err(ImagingError::Encode("results are not an image".to_string()).into())
        }
        (other, _) => Err(Error::InvalidRequest(format!(
            "Unable to convert results to {:?}",
            other
        ))),
    }
}
