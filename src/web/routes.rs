//! Static route table
//!
//! Every endpoint is listed here once, with the metadata served by
//! `/handlers`. The router is built from this table.

use axum::routing::{get, MethodRouter};
use serde::Serialize;
use std::sync::Arc;

use crate::web::handlers;
use crate::web::server::AppState;

/// Which handler serves a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    SayHi,
    Still,
    Stream,
    Status,
    Handlers,
}

/// Documented request parameter
#[derive(Debug, Serialize)]
pub struct ParamInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// One row of the route table
#[derive(Debug, Serialize)]
pub struct RouteInfo {
    pub name: &'static str,
    pub path: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamInfo],
    #[serde(skip)]
    pub kind: RouteKind,
}

const fn param(name: &'static str, description: &'static str) -> ParamInfo {
    ParamInfo { name, description }
}

const STILL_PARAMS: &[ParamInfo] = &[
    param("hres", "Horizontal resolution in pixels (default 3264)"),
    param("vres", "Vertical resolution in pixels (default 2464)"),
    param("ss", "Shutter speed in microseconds"),
    param("iso", "Sensor ISO"),
    param("st", "Settle time in seconds before exposure (default 0)"),
    param("ex", "Exposure mode"),
    param("awb", "Auto white balance mode"),
    param("md", "Sensor mode"),
    param("hflip", "Mirror horizontally"),
    param("vflip", "Mirror vertically"),
    param("channel", "Keep a single colour channel: r, g or b"),
    param("grey", "Convert to greyscale"),
    param("text", "Annotation drawn in the top left corner"),
    param("textsize", "Annotation size in pixels (default 16)"),
    param("textcolor", "Annotation colour name or #rrggbb (default white)"),
    param("output", "PNG (default) or JPEG"),
];

const STREAM_PARAMS: &[ParamInfo] = &[
    param("hres", "Horizontal resolution in pixels (default 1920)"),
    param("vres", "Vertical resolution in pixels (default 1080)"),
    param("fps", "Frame rate (default 30)"),
    param("codec", "h264 (default) or mjpeg"),
    param("t", "Recording length in milliseconds, 0 streams until disconnect"),
    param("bitrate", "Encoder bitrate in bits per second"),
    param("hflip", "Mirror horizontally"),
    param("vflip", "Mirror vertically"),
];

pub const ROUTES: &[RouteInfo] = &[
    RouteInfo {
        name: "Say Hi",
        path: "/sayhi",
        description: "Says Hi. 'Cause it's a nice thing to do",
        params: &[],
        kind: RouteKind::SayHi,
    },
    RouteInfo {
        name: "Still Image",
        path: "/still",
        description: "Captures a still image",
        params: STILL_PARAMS,
        kind: RouteKind::Still,
    },
    RouteInfo {
        name: "Video Stream",
        path: "/stream",
        description: "Streams video from the camera",
        params: STREAM_PARAMS,
        kind: RouteKind::Stream,
    },
    RouteInfo {
        name: "Status",
        path: "/status",
        description: "Camera state and usage counters",
        params: &[],
        kind: RouteKind::Status,
    },
    RouteInfo {
        name: "Handlers",
        path: "/handlers",
        description: "Lists the available endpoints",
        params: &[],
        kind: RouteKind::Handlers,
    },
];

/// Method router for a table entry
pub fn method_router(kind: RouteKind) -> MethodRouter<Arc<AppState>> {
    match kind {
        RouteKind::SayHi => get(handlers::say_hi),
        RouteKind::Still => get(handlers::still_image),
        RouteKind::Stream => get(handlers::video_stream),
        RouteKind::Status => get(handlers::get_status),
        RouteKind::Handlers => get(handlers::list_handlers),
    }
}
