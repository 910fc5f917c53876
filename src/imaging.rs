//! Image post-processing and encoding
//!
//! The pipeline applied to a captured frame is fixed: annotate, then extract
//! a colour channel, then convert to greyscale. Each step is optional.

use ab_glyph::{FontVec, PxScale};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ImagingError;

/// Output encodings for still images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Png,
    Jpeg,
}

/// Colour channel of an RGB image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub fn parse(name: &str) -> Result<Self, ImagingError> {
        match name {
            "r" => Ok(Self::Red),
            "g" => Ok(Self::Green),
            "b" => Ok(Self::Blue),
            other => Err(ImagingError::InvalidChannel(other.to_string())),
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }
}

/// Parse a colour name or `#rgb` / `#rrggbb` hex value
pub fn parse_color(name: &str) -> Result<Rgb<u8>, ImagingError> {
    let invalid = || ImagingError::InvalidColor(name.to_string());

    if let Some(hex) = name.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()
            .ok_or_else(invalid)?;
        return match digits.as_slice() {
            [r, g, b] => Ok(Rgb([r * 17, g * 17, b * 17])),
            [r1, r2, g1, g2, b1, b2] => Ok(Rgb([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2])),
            _ => Err(invalid()),
        };
    }

    let rgb = match name.to_ascii_lowercase().as_str() {
        "white" => [255, 255, 255],
        "black" => [0, 0, 0],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "gray" | "grey" => [128, 128, 128],
        "silver" => [192, 192, 192],
        _ => return Err(invalid()),
    };
    Ok(Rgb(rgb))
}

/// Lazily loaded annotation font, shared by all requests
pub struct FontCache {
    path: PathBuf,
    font: Mutex<Option<Arc<FontVec>>>,
}

impl FontCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            font: Mutex::new(None),
        }
    }

    /// Load the font on first use
    pub fn font(&self) -> Result<Arc<FontVec>, ImagingError> {
        let mut slot = self.font.lock();
        if let Some(font) = slot.as_ref() {
            return Ok(font.clone());
        }

        let data = std::fs::read(&self.path).map_err(|e| {
            tracing::error!("Annotation font {} unavailable: {}", self.path.display(), e);
            ImagingError::FontUnavailable
        })?;
        let font = FontVec::try_from_vec(data).map_err(|e| ImagingError::FontLoad {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!("Loaded annotation font {}", self.path.display());
        let font = Arc::new(font);
        *slot = Some(font.clone());
        Ok(font)
    }
}

/// Draw `text` in the top left corner
pub fn annotate(img: &mut RgbImage, text: &str, size: u32, color: Rgb<u8>, font: &FontVec) {
    imageproc::drawing::draw_text_mut(img, color, 0, 0, PxScale::from(size as f32), font, text);
}

/// Keep only one colour channel
pub fn split_channel(img: &DynamicImage, channel: Channel) -> DynamicImage {
    let rgb = img.to_rgb8();
    let idx = channel.index();
    let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        Luma([rgb.get_pixel(x, y)[idx]])
    });
    DynamicImage::ImageLuma8(gray)
}

/// Convert to 8-bit luma
pub fn greyscale(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) => img,
        other => DynamicImage::ImageLuma8(other.to_luma8()),
    }
}

/// Post-processing requested for a still
#[derive(Debug, Clone)]
pub struct PostProcess {
    pub text: Option<String>,
    pub text_size: u32,
    pub text_color: Rgb<u8>,
    pub channel: Option<Channel>,
    pub grey: bool,
}

impl PostProcess {
    /// No processing at all
    pub fn none() -> Self {
        Self {
            text: None,
            text_size: 16,
            text_color: Rgb([255, 255, 255]),
            channel: None,
            grey: false,
        }
    }

    /// Run the pipeline on a captured frame
    pub fn apply(
        &self,
        mut frame: RgbImage,
        fonts: &FontCache,
    ) -> Result<DynamicImage, ImagingError> {
        if let Some(text) = &self.text {
            let font = fonts.font()?;
            annotate(&mut frame, text, self.text_size, self.text_color, &font);
        }

        let mut img = DynamicImage::ImageRgb8(frame);
        if let Some(channel) = self.channel {
            img = split_channel(&img, channel);
        }
        if self.grey {
            img = greyscale(img);
        }
        Ok(img)
    }
}

/// Encode an image as PNG or JPEG
pub fn encode(
    img: &DynamicImage,
    format: EncodeFormat,
    jpeg_quality: u8,
) -> Result<Bytes, ImagingError> {
    let mut buf = Vec::new();
    match format {
        EncodeFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| ImagingError::Encode(e.to_string()))?;
        }
        EncodeFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
            let result = match img {
                DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
                other => encoder.encode_image(&other.to_rgb8()),
            };
            result.map_err(|e| ImagingError::Encode(e.to_string()))?;
        }
    }
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_FONT: &str =
        concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/fonts/DejaVuSansMono.ttf");

    fn sample() -> RgbImage {
        RgbImage::from_fn(4, 4, |x, y| Rgb([10 * x as u8, 20 * y as u8, 200]))
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("white").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_color("Red").unwrap(), Rgb([255, 0, 0]));
        assert_eq!(parse_color("#00ff80").unwrap(), Rgb([0, 255, 128]));
        assert_eq!(parse_color("#f0a").unwrap(), Rgb([255, 0, 170]));
        assert!(matches!(parse_color("mauve"), Err(ImagingError::InvalidColor(_))));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!(Channel::parse("g").unwrap(), Channel::Green);
        let err = Channel::parse("x").unwrap_err();
        assert_eq!(err.to_string(), "Invalid image color channel 'x' specified");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_split_channel() {
        let img = DynamicImage::ImageRgb8(sample());
        let red = split_channel(&img, Channel::Red).into_luma8();
        assert_eq!(red.get_pixel(3, 0)[0], 30);
        let blue = split_channel(&img, Channel::Blue).into_luma8();
        assert_eq!(blue.get_pixel(1, 1)[0], 200);
    }

    #[test]
    fn test_greyscale() {
        let grey = greyscale(DynamicImage::ImageRgb8(sample()));
        assert!(matches!(grey, DynamicImage::ImageLuma8(_)));

        // Already single channel
        let red = split_channel(&DynamicImage::ImageRgb8(sample()), Channel::Red);
        let again = greyscale(red.clone());
        assert_eq!(again.into_luma8(), red.into_luma8());
    }

    #[test]
    fn test_pipeline_order() {
        let fonts = FontCache::new("/nonexistent/font.ttf");
        let post = PostProcess {
            channel: Some(Channel::Green),
            grey: true,
            ..PostProcess::none()
        };
        let out = post.apply(sample(), &fonts).unwrap().into_luma8();
        // Channel extraction wins over the later greyscale conversion
        assert_eq!(out.get_pixel(0, 2)[0], 40);
    }

    #[test]
    fn test_annotate_draws_in_text_color() {
        let fonts = FontCache::new(TEST_FONT);
        let font = fonts.font().unwrap();
        let mut img = RgbImage::new(96, 48);
        annotate(&mut img, "MW", 24, Rgb([255, 0, 0]), &font);

        let (mut full, mut touched) = (0, 0);
        for (x, y, px) in img.enumerate_pixels() {
            if px.0 == [0, 0, 0] {
                continue;
            }
            touched += 1;
            assert!(x < 48 && y < 32, "text drawn outside the corner at {x},{y}");
            assert_eq!((px[1], px[2]), (0, 0));
            if px[0] == 255 {
                full += 1;
            }
        }
        assert!(touched > 20);
        assert!(full > 0);
    }

    #[test]
    fn test_annotation_survives_channel_split() {
        let fonts = FontCache::new(TEST_FONT);
        let frame = RgbImage::from_pixel(96, 48, Rgb([0, 0, 255]));
        let post = PostProcess {
            text: Some("MW".to_string()),
            text_size: 24,
            text_color: Rgb([255, 0, 0]),
            channel: Some(Channel::Red),
            ..PostProcess::none()
        };
        let red = post.apply(frame, &fonts).unwrap().into_luma8();

        // The background has no red, so anything bright is the annotation
        let bright: Vec<_> = red
            .enumerate_pixels()
            .filter(|(_, _, px)| px[0] > 128)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!bright.is_empty());
        assert!(bright.iter().all(|&(x, y)| x < 48 && y < 32));
        assert_eq!(red.get_pixel(90, 44)[0], 0);
    }

    #[test]
    fn test_font_is_cached() {
        let fonts = FontCache::new(TEST_FONT);
        let a = fonts.font().unwrap();
        let b = fonts.font().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_annotation_without_font() {
        let fonts = FontCache::new("/nonexistent/font.ttf");
        let post = PostProcess {
            text: Some("hello".to_string()),
            ..PostProcess::none()
        };
        assert!(matches!(
            post.apply(sample(), &fonts),
            Err(ImagingError::FontUnavailable)
        ));
    }

    #[test]
    fn test_encode_signatures() {
        let img = DynamicImage::ImageRgb8(sample());
        let png = encode(&img, EncodeFormat::Png, 90).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let jpeg = encode(&img, EncodeFormat::Jpeg, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let gray = greyscale(img);
        let jpeg = encode(&gray, EncodeFormat::Jpeg, 90).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
    }
}
