//! Capture and recording parameters, and the exposure timing model

use serde::Serialize;
use std::time::Duration;

/// Frame rate used for stills when no shutter speed is requested
pub const DEFAULT_STILL_FRAMERATE: f64 = 24.0;

/// Sensor buffers are allocated in blocks of this many columns
pub const WIDTH_ALIGNMENT: u32 = 32;

/// Sensor buffers are allocated in blocks of this many rows
pub const HEIGHT_ALIGNMENT: u32 = 16;

/// Legacy sensor mode indexes of the v2 camera module (IMX219), as
/// `width:height:bit-depth:packing`. Index 0 lets the driver choose.
const SENSOR_MODES: &[&str] = &[
    "1920:1080:10:P",
    "3280:2464:10:P",
    "3280:2464:10:P",
    "1640:1232:10:P",
    "1640:922:10:P",
    "1280:720:10:P",
    "640:480:10:P",
];

/// Highest accepted sensor mode index
pub const MAX_SENSOR_MODE: i64 = SENSOR_MODES.len() as i64;

/// Driver mode string for a legacy sensor mode index. `None` for index 0
/// and for indexes with no known mode.
pub fn sensor_mode_for_index(index: i64) -> Option<&'static str> {
    if index < 1 {
        return None;
    }
    SENSOR_MODES.get(index as usize - 1).copied()
}

/// Parameters for a single still capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    /// Exposure time in microseconds, sensor default when unset
    pub shutter_speed_us: Option<u32>,
    pub iso: Option<u32>,
    pub awb_mode: Option<String>,
    pub exposure_mode: Option<String>,
    /// Time given to the gain and white balance loops before exposure
    pub settle_time_secs: u64,
    pub hflip: bool,
    pub vflip: bool,
    pub sensor_mode: Option<String>,
}

impl CaptureSettings {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            shutter_speed_us: None,
            iso: None,
            awb_mode: None,
            exposure_mode: None,
            settle_time_secs: 0,
            hflip: false,
            vflip: false,
            sensor_mode: None,
        }
    }

    /// Whole seconds one exposure occupies, at least one when a shutter speed
    /// is set
    pub fn exposure_period_secs(&self) -> Option<u64> {
        self.shutter_speed_us
            .map(|us| (us as u64).div_ceil(1_000_000).max(1))
    }

    /// Sensor frame rate for the capture. A long shutter needs a frame period
    /// at least as long as the exposure itself.
    pub fn framerate(&self) -> f64 {
        match self.exposure_period_secs() {
            Some(period) => 1.0 / period as f64,
            None => DEFAULT_STILL_FRAMERATE,
        }
    }

    /// Upper bound on how long the capture may take, given `slack` on top of
    /// settle and exposure time
    pub fn deadline(&self, slack: Duration) -> Duration {
        let exposure = self.exposure_period_secs().unwrap_or(0);
        Duration::from_secs(self.settle_time_secs + exposure) + slack
    }

    /// Resolution of the buffer the sensor actually fills
    pub fn padded_resolution(&self) -> (u32, u32) {
        (
            self.width.div_ceil(WIDTH_ALIGNMENT) * WIDTH_ALIGNMENT,
            self.height.div_ceil(HEIGHT_ALIGNMENT) * HEIGHT_ALIGNMENT,
        )
    }
}

/// Video encodings the camera can produce directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Mjpeg,
}

impl VideoCodec {
    /// Parse a codec name, case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "h264" => Some(Self::H264),
            "mjpeg" | "mjpg" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    /// Name understood by `rpicam-vid --codec`
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Mjpeg => "mjpeg",
        }
    }
}

/// Parameters for a video recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub codec: VideoCodec,
    /// Recording length, zero records until the client goes away
    pub duration_ms: u64,
    pub hflip: bool,
    pub vflip: bool,
    /// Encoder bitrate in bits per second
    pub bitrate: Option<u32>,
}

impl VideoSettings {
    pub fn new(width: u32, height: u32, framerate: u32) -> Self {
        Self {
            width,
            height,
            framerate,
            codec: VideoCodec::H264,
            duration_ms: 0,
            hflip: false,
            vflip: false,
            bitrate: None,
        }
    }

    /// Number of frames a bounded recording produces
    pub fn frame_limit(&self) -> Option<u64> {
        if self.duration_ms == 0 {
            None
        } else {
            Some((self.duration_ms * self.framerate as u64).div_ceil(1000).max(1))
        }
    }
}
