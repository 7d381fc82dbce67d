//! Video frame access.
//!
//! The resolver reads videos through two small traits: a [`VideoBackend`]
//! opens a file and yields a [`VideoSource`], which reports
//! [`VideoDiagnostics`] and decodes individual frames. [`FfmpegBackend`] is
//! the production implementation on top of `ffmpeg-next`; tests substitute
//! their own backends to script decoder behaviour.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};
use image::{DynamicImage, RgbImage};

use crate::error::ThumbnailError;
use crate::metadata::{VideoDiagnostics, format_kilobytes, fourcc_to_string};
use crate::progress::CancellationToken;

/// An opened video that can decode single frames.
pub trait VideoSource {
    /// Container facts gathered when the video was opened.
    fn diagnostics(&self) -> &VideoDiagnostics;

    /// Decode the frame at `frame_number` (0-indexed).
    fn read_frame(&mut self, frame_number: u64) -> Result<DynamicImage, ThumbnailError>;
}

/// Opens videos for the resolver.
///
/// Backends are shared with the decode worker thread, hence `Send + Sync`.
/// The returned source never leaves the thread that opened it.
pub trait VideoBackend: Send + Sync {
    /// Open `path`. The source should stop decoding once `cancellation`
    /// is cancelled.
    fn open(
        &self,
        path: &Path,
        cancellation: CancellationToken,
    ) -> Result<Box<dyn VideoSource>, ThumbnailError>;
}

/// [`VideoBackend`] backed by FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl VideoBackend for FfmpegBackend {
    fn open(
        &self,
        path: &Path,
        cancellation: CancellationToken,
    ) -> Result<Box<dyn VideoSource>, ThumbnailError> {
        Ok(Box::new(FfmpegVideo::open(path, cancellation)?))
    }
}

/// A video file opened with FFmpeg.
pub struct FfmpegVideo {
    input_context: Input,
    stream_index: usize,
    time_base: Rational,
    diagnostics: VideoDiagnostics,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for FfmpegVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegVideo")
            .field("stream_index", &self.stream_index)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl FfmpegVideo {
    /// Open a video file and gather its diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Decode`] if the file is missing, cannot be
    /// demuxed, or has no video stream.
    pub fn open(path: &Path, cancellation: CancellationToken) -> Result<Self, ThumbnailError> {
        let byte_size = fs::metadata(path)
            .map_err(|error| {
                ThumbnailError::Decode(format!(
                    "video file is not readable: {}: {error}",
                    path.display()
                ))
            })?
            .len();

        log::debug!(
            "Opening video: {} (size: {})",
            path.display(),
            format_kilobytes(byte_size)
        );

        // Initialise ffmpeg (safe to call multiple times).
        ffmpeg_next::init().map_err(|error| {
            ThumbnailError::Decode(format!("FFmpeg initialisation failed: {error}"))
        })?;

        let input_context = ffmpeg_next::format::input(path).map_err(|error| {
            ThumbnailError::Decode(format!(
                "could not open video, file may be corrupted or in an unsupported format \
                 (size: {}): {error}",
                format_kilobytes(byte_size)
            ))
        })?;

        let (stream_index, time_base, diagnostics) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or_else(|| ThumbnailError::Decode("no video stream found".to_string()))?;

            let decoder_context = CodecContext::from_parameters(stream.parameters())?;
            let codec_name = decoder_context.id().name().to_string();
            let decoder = decoder_context.decoder().video()?;

            let frames_per_second = rational_to_f64(stream.avg_frame_rate())
                .or_else(|| rational_to_f64(stream.rate()))
                .unwrap_or(0.0);

            let frame_count = if stream.frames() > 0 {
                stream.frames() as u64
            } else if frames_per_second > 0.0 && input_context.duration() > 0 {
                // Container duration is in microseconds.
                let seconds = input_context.duration() as f64 / 1_000_000.0;
                (seconds * frames_per_second) as u64
            } else {
                0
            };

            let codec_tag = {
                let raw_tag = unsafe { (*stream.parameters().as_ptr()).codec_tag };
                let tag = fourcc_to_string(raw_tag);
                if tag == "unknown" { codec_name } else { tag }
            };

            let diagnostics = VideoDiagnostics {
                frame_count,
                width: decoder.width(),
                height: decoder.height(),
                frames_per_second,
                codec_tag,
                backend_name: backend_name(input_context.format().name()),
                byte_size,
            };
            (stream.index(), stream.time_base(), diagnostics)
        };

        log::debug!("Video properties: {diagnostics}");

        Ok(Self {
            input_context,
            stream_index,
            time_base,
            diagnostics,
            cancellation,
        })
    }

    fn check_cancelled(&self) -> Result<(), ThumbnailError> {
        if self.cancellation.is_cancelled() {
            return Err(ThumbnailError::Decode("decode cancelled".to_string()));
        }
        Ok(())
    }
}

impl VideoSource for FfmpegVideo {
    fn diagnostics(&self) -> &VideoDiagnostics {
        &self.diagnostics
    }

    /// Seeks to the nearest keyframe before the target and decodes forward
    /// until the requested frame (or the first frame past it) is reached.
    fn read_frame(&mut self, frame_number: u64) -> Result<DynamicImage, ThumbnailError> {
        self.check_cancelled()?;

        let frames_per_second = self.diagnostics.frames_per_second;
        let time_base = self.time_base;
        let stream_index = self.stream_index;

        let decoder = {
            let stream = self
                .input_context
                .stream(stream_index)
                .ok_or_else(|| ThumbnailError::Decode("video stream disappeared".to_string()))?;
            CodecContext::from_parameters(stream.parameters())?
                .decoder()
                .video()?
        };

        // Container-level seeks take AV_TIME_BASE (microsecond) timestamps.
        let target = frame_number_to_microseconds(frame_number, frames_per_second);
        self.input_context.seek(target, ..target)?;

        let mut locator = FrameLocator::new(frame_number, time_base, frames_per_second);
        let packets = self
            .input_context
            .packets()
            .filter(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet);
        let mut decoder = FfmpegDecoder(decoder);
        let decoded_frame = decode_frame(&mut decoder, packets, &mut locator, &self.cancellation)?;

        convert_frame_to_image(&decoded_frame)
    }
}

/// Packets the decoder may reject during one frame read before giving up.
const MAX_REJECTED_PACKETS: u32 = 64;

/// The decoding half of a frame read, kept apart from the demuxer so the
/// packet handling does not depend on real media.
trait FrameDecoder {
    type Packet;
    type Frame;

    fn send_packet(&mut self, packet: &Self::Packet) -> Result<(), FfmpegError>;
    fn send_eof(&mut self) -> Result<(), FfmpegError>;
    fn receive_frame(&mut self) -> Option<Self::Frame>;
    fn frame_pts(frame: &Self::Frame) -> Option<i64>;
}

struct FfmpegDecoder(VideoDecoder);

impl FrameDecoder for FfmpegDecoder {
    type Packet = Packet;
    type Frame = VideoFrame;

    fn send_packet(&mut self, packet: &Packet) -> Result<(), FfmpegError> {
        self.0.send_packet(packet)
    }

    fn send_eof(&mut self) -> Result<(), FfmpegError> {
        self.0.send_eof()
    }

    fn receive_frame(&mut self) -> Option<VideoFrame> {
        let mut frame = VideoFrame::empty();
        self.0.receive_frame(&mut frame).ok().map(|()| frame)
    }

    fn frame_pts(frame: &VideoFrame) -> Option<i64> {
        frame.pts()
    }
}

/// Decides when a decoded frame has reached the requested frame number.
///
/// Positions come from presentation timestamps when the frame rate is
/// known. Without one, decoded frames are counted instead; the seek lands on
/// the start of the stream in that case.
struct FrameLocator {
    target: u64,
    time_base: Rational,
    frames_per_second: f64,
    decoded: u64,
}

impl FrameLocator {
    fn new(target: u64, time_base: Rational, frames_per_second: f64) -> Self {
        Self {
            target,
            time_base,
            frames_per_second,
            decoded: 0,
        }
    }

    fn reached(&mut self, pts: Option<i64>) -> bool {
        let position = if self.frames_per_second > 0.0 {
            pts_to_frame_number(pts.unwrap_or(0), self.time_base, self.frames_per_second)
        } else {
            self.decoded
        };
        self.decoded += 1;
        position >= self.target
    }
}

/// Feed packets to the decoder until a frame at or past the locator's target
/// comes out.
///
/// Packets the decoder rejects (damaged slices, bad NAL units) are skipped,
/// up to [`MAX_REJECTED_PACKETS`] per read.
fn decode_frame<D: FrameDecoder>(
    decoder: &mut D,
    packets: impl IntoIterator<Item = D::Packet>,
    locator: &mut FrameLocator,
    cancellation: &CancellationToken,
) -> Result<D::Frame, ThumbnailError> {
    let mut rejected = 0_u32;
    let mut last_error = None;

    for packet in packets {
        if cancellation.is_cancelled() {
            return Err(ThumbnailError::Decode("decode cancelled".to_string()));
        }

        match decoder.send_packet(&packet) {
            Ok(()) => {}
            Err(FfmpegError::Eof) => break,
            Err(FfmpegError::Other { errno }) if errno == EAGAIN => {}
            Err(error) => {
                rejected += 1;
                log::debug!("Decoder rejected packet ({rejected} so far): {error}");
                if rejected >= MAX_REJECTED_PACKETS {
                    return Err(ThumbnailError::Decode(format!(
                        "decoder rejected {rejected} packets, last error: {error}"
                    )));
                }
                last_error = Some(error);
                continue;
            }
        }

        while let Some(frame) = decoder.receive_frame() {
            if locator.reached(D::frame_pts(&frame)) {
                return Ok(frame);
            }
        }
    }

    if let Err(error) = decoder.send_eof() {
        log::debug!("Flushing decoder failed: {error}");
    }
    while let Some(frame) = decoder.receive_frame() {
        if locator.reached(D::frame_pts(&frame)) {
            return Ok(frame);
        }
    }

    let cause = last_error
        .map(|error| format!(" ({rejected} packets rejected, last error: {error})"))
        .unwrap_or_default();
    Err(ThumbnailError::Decode(format!(
        "could not locate frame {} in the video stream{cause}",
        locator.target
    )))
}

fn backend_name(demuxer: &str) -> String {
    let version = unsafe { ffmpeg_sys_next::avformat_version() };
    format!(
        "ffmpeg/libavformat {}.{}.{} ({demuxer})",
        version >> 16,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

fn rational_to_f64(rational: Rational) -> Option<f64> {
    if rational.denominator() == 0 || rational.numerator() <= 0 {
        return None;
    }
    Some(rational.numerator() as f64 / rational.denominator() as f64)
}

/// Convert a frame number to a container seek timestamp in microseconds.
fn frame_number_to_microseconds(frame_number: u64, frames_per_second: f64) -> i64 {
    if frame_number == 0 || frames_per_second <= 0.0 || !frames_per_second.is_finite() {
        return 0;
    }
    let seconds = frame_number as f64 / frames_per_second;
    Duration::try_from_secs_f64(seconds)
        .map(|duration| duration.as_micros() as i64)
        .unwrap_or(0)
}

/// Rescale a PTS value to a frame number.
fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    if time_base.denominator() == 0 || pts <= 0 {
        return 0;
    }
    let scaled = pts as f64 * time_base.numerator() as f64 * frames_per_second;
    (scaled / time_base.denominator() as f64) as u64
}

/// Convert a decoded frame of any pixel format to an RGB image.
fn convert_frame_to_image(decoded_frame: &VideoFrame) -> Result<DynamicImage, ThumbnailError> {
    let width = decoded_frame.width();
    let height = decoded_frame.height();
    if width == 0 || height == 0 {
        return Err(ThumbnailError::Decode(format!(
            "decoder produced an empty frame ({width}x{height})"
        )));
    }

    let mut scaler = ScalingContext::get(
        decoded_frame.format(),
        width,
        height,
        Pixel::RGB24,
        width,
        height,
        ScalingFlags::BILINEAR,
    )?;
    let mut rgb_frame = VideoFrame::empty();
    scaler.run(decoded_frame, &mut rgb_frame)?;

    let buffer = frame_to_rgb_buffer(&rgb_frame, width, height);
    let rgb_image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        ThumbnailError::Decode("failed to construct RGB image from decoded frame data".to_string())
    })?;
    Ok(DynamicImage::ImageRgb8(rgb_image))
}

/// Copy pixel data from an RGB24 frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3),
/// which [`RgbImage::from_raw`] does not accept.
fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_targets() {
        assert_eq!(frame_number_to_microseconds(0, 30.0), 0);
        assert_eq!(frame_number_to_microseconds(30, 30.0), 1_000_000);
        assert_eq!(frame_number_to_microseconds(10, 0.0), 0);
        assert_eq!(frame_number_to_microseconds(10, f64::NAN), 0);
    }

    #[test]
    fn pts_rescaling() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(pts_to_frame_number(90_000, time_base, 25.0), 25);
        assert_eq!(pts_to_frame_number(-5, time_base, 25.0), 0);
        assert_eq!(pts_to_frame_number(100, Rational::new(1, 0), 25.0), 0);
    }

    #[test]
    fn frame_rates() {
        assert_eq!(rational_to_f64(Rational::new(30_000, 1001)).map(|f| f.round()), Some(30.0));
        assert_eq!(rational_to_f64(Rational::new(0, 1)), None);
        assert_eq!(rational_to_f64(Rational::new(25, 0)), None);
    }

    // ── Decode loop ────────────────────────────────────────────────────

    #[derive(Clone, Copy)]
    struct ScriptedPacket {
        corrupt: bool,
        pts: i64,
    }

    /// Decoder that emits one frame per accepted packet, carrying its pts.
    #[derive(Default)]
    struct ScriptedDecoder {
        queued: Vec<i64>,
        sent: usize,
    }

    impl FrameDecoder for ScriptedDecoder {
        type Packet = ScriptedPacket;
        type Frame = i64;

        fn send_packet(&mut self, packet: &ScriptedPacket) -> Result<(), FfmpegError> {
            self.sent += 1;
            if packet.corrupt {
                return Err(FfmpegError::InvalidData);
            }
            self.queued.push(packet.pts);
            Ok(())
        }

        fn send_eof(&mut self) -> Result<(), FfmpegError> {
            Ok(())
        }

        fn receive_frame(&mut self) -> Option<i64> {
            if self.queued.is_empty() {
                None
            } else {
                Some(self.queued.remove(0))
            }
        }

        fn frame_pts(frame: &i64) -> Option<i64> {
            Some(*frame)
        }
    }

    /// Packets at 25 fps in a 1/25 time base, so pts equals frame number.
    fn packets(count: i64, corrupt: &[i64]) -> Vec<ScriptedPacket> {
        (0..count)
            .map(|pts| ScriptedPacket {
                corrupt: corrupt.contains(&pts),
                pts,
            })
            .collect()
    }

    fn locator(target: u64, frames_per_second: f64) -> FrameLocator {
        FrameLocator::new(target, Rational::new(1, 25), frames_per_second)
    }

    #[test]
    fn corrupt_leading_packets_are_skipped() {
        let mut decoder = ScriptedDecoder::default();
        let frame = decode_frame(
            &mut decoder,
            packets(20, &[0, 1, 2]),
            &mut locator(0, 25.0),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(frame, 3);
        assert_eq!(decoder.sent, 4);
    }

    #[test]
    fn target_reached_past_a_corrupt_packet() {
        let frame = decode_frame(
            &mut ScriptedDecoder::default(),
            packets(40, &[0, 7]),
            &mut locator(10, 25.0),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(frame, 10);
    }

    #[test]
    fn rejected_packets_are_capped() {
        let mut decoder = ScriptedDecoder::default();
        let all: Vec<i64> = (0..200).collect();
        let error = decode_frame(
            &mut decoder,
            packets(200, &all),
            &mut locator(0, 25.0),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert_eq!(decoder.sent, MAX_REJECTED_PACKETS as usize);
        match error {
            ThumbnailError::Decode(message) => {
                assert!(message.contains("rejected 64 packets"), "{message}");
                assert!(message.contains("last error"), "{message}");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_rate_counts_decoded_frames() {
        // Timestamps are useless without a frame rate; only the count matters.
        let stream = (0..20).map(|_| ScriptedPacket {
            corrupt: false,
            pts: 0,
        });
        let mut decoder = ScriptedDecoder::default();
        decode_frame(
            &mut decoder,
            stream,
            &mut locator(10, 0.0),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(decoder.sent, 11);
    }

    #[test]
    fn cancelled_decode_stops_before_sending() {
        let token = CancellationToken::new();
        token.cancel();
        let mut decoder = ScriptedDecoder::default();
        let mut locator = locator(0, 25.0);

        let error = decode_frame(&mut decoder, packets(5, &[]), &mut locator, &token).unwrap_err();

        assert!(matches!(error, ThumbnailError::Decode(_)), "{error:?}");
        assert_eq!(decoder.sent, 0);
    }

    #[test]
    fn target_past_the_end_reports_rejections() {
        let error = decode_frame(
            &mut ScriptedDecoder::default(),
            packets(20, &[4]),
            &mut locator(30, 25.0),
            &CancellationToken::new(),
        )
        .unwrap_err();

        match error {
            ThumbnailError::Decode(message) => {
                assert!(message.contains("could not locate frame 30"), "{message}");
                assert!(message.contains("1 packets rejected"), "{message}");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
