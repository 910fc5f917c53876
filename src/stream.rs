//! Streaming response bodies for recorded video
//!
//! H.264 is passed through as a chunked `video/h264` body. MJPEG output is
//! cut into individual JPEG frames and served as
//! `multipart/x-mixed-replace`, which browsers render natively in an
//! `<img>` tag.

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{stream, StreamExt, TryStreamExt};

use crate::camera::VideoStream;
use crate::constants::MAX_MJPEG_FRAME_SIZE;
use crate::error::CameraError;

macro_rules! mjpeg_boundary {
    () => {
        "picam_frame_boundary"
    };
}

/// Separates frames in the multipart body
pub const MJPEG_BOUNDARY: &str = mjpeg_boundary!();

/// Content type of an MJPEG response, boundary included
pub const MJPEG_CONTENT_TYPE: &str =
    concat!("multipart/x-mixed-replace; boundary=", mjpeg_boundary!());

/// Content type of a raw H.264 response
pub const H264_CONTENT_TYPE: &str = "video/h264";

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Reassembles JPEG frames from a concatenated MJPEG byte stream.
///
/// Frames are delimited by the start-of-image and end-of-image markers.
/// Entropy-coded data byte-stuffs `0xFF`, so an EOI marker can only appear
/// at the end of a frame.
pub struct MjpegSplitter {
    buf: Vec<u8>,
    in_frame: bool,
    /// Where to resume searching for EOI
    scan_from: usize,
    frames_dropped: u64,
}

impl MjpegSplitter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            in_frame: false,
            scan_from: 0,
            frames_dropped: 0,
        }
    }

    /// Feed the next chunk, returning every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            if !self.in_frame {
                match find_marker(&self.buf, SOI) {
                    Some(pos) => {
                        self.buf.drain(..pos);
                        self.in_frame = true;
                        self.scan_from = SOI.len();
                    }
                    None => {
                        // A trailing 0xFF may be the first half of a marker
                        let keep = usize::from(self.buf.last() == Some(&0xFF));
                        let cut = self.buf.len() - keep;
                        self.buf.drain(..cut);
                        break;
                    }
                }
            }

            match find_marker(&self.buf[self.scan_from..], EOI) {
                Some(rel) => {
                    let end = self.scan_from + rel + EOI.len();
                    frames.push(Bytes::copy_from_slice(&self.buf[..end]));
                    self.buf.drain(..end);
                    self.in_frame = false;
                    self.scan_from = 0;
                }
                None => {
                    if self.buf.len() > MAX_MJPEG_FRAME_SIZE {
                        tracing::warn!(
                            "Discarding {} bytes without end-of-image marker",
                            self.buf.len()
                        );
                        self.frames_dropped += 1;
                        self.buf.clear();
                        self.in_frame = false;
                        self.scan_from = 0;
                    } else {
                        self.scan_from = self.buf.len().saturating_sub(1).max(SOI.len());
                    }
                    break;
                }
            }
        }

        frames
    }

    /// Frames abandoned because they grew past the size limit
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Bytes held waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for MjpegSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Wrap one JPEG frame as a multipart part
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {len}\r\n\r\n",
        boundary = MJPEG_BOUNDARY,
        len = jpeg.len()
    );
    let mut part = Vec::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Turn raw MJPEG output into a stream of multipart parts
pub fn mjpeg_parts(
    chunks: VideoStream,
) -> impl futures_util::Stream<Item = Result<Bytes, CameraError>> + Send {
    let mut splitter = MjpegSplitter::new();
    chunks.flat_map(move |chunk| {
        let items: Vec<Result<Bytes, CameraError>> = match chunk {
            Ok(data) => splitter
                .push(&data)
                .iter()
                .map(|frame| Ok(multipart_part(frame)))
                .collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
    })
}

fn no_cache_headers(content_type: &'static str) -> [(header::HeaderName, &'static str); 4] {
    [
        (header::CONTENT_TYPE, content_type),
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        (header::PRAGMA, "no-cache"),
        (header::EXPIRES, "0"),
    ]
}

fn log_stream_error(e: &CameraError) {
    tracing::warn!("Video stream aborted: {}", e);
}

/// `multipart/x-mixed-replace` response for an MJPEG recording
pub fn mjpeg_response(chunks: VideoStream) -> Response {
    let body = Body::from_stream(mjpeg_parts(chunks).inspect_err(log_stream_error));
    (no_cache_headers(MJPEG_CONTENT_TYPE), body).into_response()
}

/// Chunked `video/h264` response carrying the raw Annex-B stream
pub fn h264_response(chunks: VideoStream) -> Response {
    let body = Body::from_stream(chunks.inspect_err(log_stream_error));
    (no_cache_headers(H264_CONTENT_TYPE), body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(fill: u8, len: usize) -> Vec<u8> {
        let mut f = vec![0xFF, 0xD8];
        f.extend(std::iter::repeat(fill).take(len));
        f.extend_from_slice(&[0xFF, 0xD9]);
        f
    }

    #[test]
    fn test_split_whole_frames() {
        let mut splitter = MjpegSplitter::new();
        let mut data = frame(1, 10);
        data.extend(frame(2, 5));

        let frames = splitter.push(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), frame(1, 10).as_slice());
        assert_eq!(frames[1].as_ref(), frame(2, 5).as_slice());
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn test_split_across_marker_boundary() {
        let mut splitter = MjpegSplitter::new();
        let data = frame(7, 4);

        // Cut inside the EOI marker
        assert!(splitter.push(&data[..data.len() - 1]).is_empty());
        let frames = splitter.push(&data[data.len() - 1..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), data.as_slice());
    }

    #[test]
    fn test_leading_garbage_dropped() {
        let mut splitter = MjpegSplitter::new();
        let mut data = vec![0x00, 0x12, 0xFF];
        data.extend(frame(3, 3));

        let frames = splitter.push(&data);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][..2], SOI);
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut splitter = MjpegSplitter::new();
        splitter.push(&SOI);
        splitter.push(&vec![0u8; MAX_MJPEG_FRAME_SIZE + 1]);
        assert_eq!(splitter.frames_dropped(), 1);
        assert_eq!(splitter.pending(), 0);

        let frames = splitter.push(&frame(9, 2));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_multipart_part() {
        let part = multipart_part(b"abc");
        let text = String::from_utf8_lossy(&part);
        assert!(text.starts_with("--picam_frame_boundary\r\n"));
        assert!(text.contains("Content-Length: 3\r\n\r\nabc\r\n"));
    }

    #[tokio::test]
    async fn test_mjpeg_parts_from_chunks() {
        let data = [frame(1, 6), frame(2, 6)].concat();
        let chunks: Vec<Result<Bytes, CameraError>> = data
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let parts: Vec<_> = mjpeg_parts(stream::iter(chunks).boxed()).collect().await;
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.is_ok()));
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_frames(
            sizes in prop::collection::vec(0usize..40, 1..6),
            cuts in prop::collection::vec(1usize..17, 1..20),
        ) {
            let frames: Vec<Vec<u8>> = sizes
                .iter()
                .enumerate()
                .map(|(i, &len)| frame(i as u8 + 1, len))
                .collect();
            let data = frames.concat();

            let mut splitter = MjpegSplitter::new();
            let mut out = Vec::new();
            let mut pos = 0;
            let mut cut = cuts.iter().cycle();
            while pos < data.len() {
                let end = (pos + cut.next().copied().unwrap_or(1)).min(data.len());
                out.extend(splitter.push(&data[pos..end]));
                pos = end;
            }

            let out: Vec<Vec<u8>> = out.iter().map(|b| b.to_vec()).collect();
            prop_assert_eq!(out, frames);
        }
    }
}
