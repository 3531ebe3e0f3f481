use std::path::Path;

use crate::encode::ready::ReadySignal;
use crate::foundation::core::{Canvas, MediaTime};
use crate::foundation::error::EncodeResult;
use crate::foundation::math::gcd_u64;
use crate::render::pixel_pool::{PixelBuffer, PixelBufferPool};
use crate::settings::{RenderSettings, VideoExtension};
use crate::timeline::Timeline;

/// Video codec requested from the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
}

/// Pixel layout of buffers handed to the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit RGBA, premultiplied alpha, tightly packed.
    Rgba8Premul,
}

/// What the encoder is asked to produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputSettings {
    /// Target codec.
    pub codec: VideoCodec,
    /// Output dimensions.
    pub size: Canvas,
    /// Container format.
    pub container: VideoExtension,
    /// Period of one frame for constant-rate encoders. Every appended timestamp and the end
    /// time are whole multiples of it.
    pub frame_duration: MediaTime,
    /// Background for flattening alpha, straight RGBA8.
    pub background_rgba: [u8; 4],
}

impl OutputSettings {
    /// H.264 output for `timeline` rendered with `settings`.
    pub fn for_timeline(settings: &RenderSettings, timeline: &Timeline) -> Self {
        Self {
            codec: VideoCodec::H264,
            size: settings.size,
            container: settings.video_extension,
            frame_duration: timeline.frame_duration(),
            background_rgba: settings.background_rgba,
        }
    }

    /// Frame rate as a reduced `(numerator, denominator)` in frames per second.
    ///
    /// `None` when `frame_duration` is not positive.
    pub fn frame_rate(&self) -> Option<(u64, u64)> {
        let ticks = u64::try_from(self.frame_duration.value())
            .ok()
            .filter(|&t| t > 0)?;
        let timescale = u64::from(self.frame_duration.timescale());
        let common = gcd_u64(timescale, ticks);
        Some((timescale / common, ticks / common))
    }
}

/// Description of the single video input stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputDescriptor {
    /// Buffer dimensions.
    pub size: Canvas,
    /// Buffer layout.
    pub pixel_format: PixelFormat,
}

/// Why an encoder refused a buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppendError {
    /// No capacity right now; the frame was not consumed.
    #[error("encoder is not ready for more data")]
    NotReady,
    /// The timestamp is not after the previously appended one.
    #[error("presentation time {got} is not after {last}")]
    OutOfOrder {
        /// Last accepted timestamp.
        last: MediaTime,
        /// Rejected timestamp.
        got: MediaTime,
    },
    /// The encoder is not writing (not started, already finished, or dead).
    #[error("encoder is closed: {0}")]
    Closed(String),
}

/// The platform encoder an encode session drives.
///
/// Call order: `can_apply_output_settings`, `can_add_input`, `start_writing`, then any number of
/// `append_pixel_buffer` calls gated by [`VideoEncoder::ready_signal`], then `mark_as_finished`,
/// `end_session_at` and finally `finish_writing`.
///
/// Appends are never concurrent; the session serializes them through `&mut self` and the
/// single-slot readiness permit.
pub trait VideoEncoder: Send + 'static {
    /// Whether the encoder can produce `settings`.
    fn can_apply_output_settings(&self, settings: &OutputSettings) -> bool;

    /// Whether the encoder accepts an input stream described by `input`.
    fn can_add_input(&self, settings: &OutputSettings, input: &InputDescriptor) -> bool;

    /// Open the output at time zero and hand back the pool appended buffers must come from.
    fn start_writing(
        &mut self,
        settings: &OutputSettings,
        input: &InputDescriptor,
    ) -> EncodeResult<PixelBufferPool>;

    /// Capacity signal for appends.
    fn ready_signal(&self) -> ReadySignal;

    /// Append `buffer` to be shown from `presentation_time`.
    ///
    /// Ownership of the buffer moves to the encoder. Rejected buffers are dropped, which returns
    /// them to their pool.
    fn append_pixel_buffer(
        &mut self,
        buffer: PixelBuffer,
        presentation_time: MediaTime,
    ) -> Result<(), AppendError>;

    /// No more buffers will be appended.
    fn mark_as_finished(&mut self);

    /// The output ends at `end`.
    fn end_session_at(&mut self, end: MediaTime);

    /// File the encoder writes, if any.
    fn output_path(&self) -> Option<&Path>;

    /// Flush and finalize the container. Blocks until done.
    fn finish_writing(self) -> EncodeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_period(ticks: i64) -> OutputSettings {
        OutputSettings {
            codec: VideoCodec::H264,
            size: Canvas {
                width: 2,
                height: 2,
            },
            container: VideoExtension::Mov,
            frame_duration: MediaTime::from_ticks(ticks),
            background_rgba: [0, 0, 0, 255],
        }
    }

    #[test]
    fn frame_rate_is_the_reduced_inverse_period() {
        assert_eq!(with_period(60).frame_rate(), Some((10, 1)));
        assert_eq!(with_period(20).frame_rate(), Some((30, 1)));
        assert_eq!(with_period(606).frame_rate(), Some((100, 101)));
        assert_eq!(with_period(1).frame_rate(), Some((600, 1)));
        assert_eq!(with_period(0).frame_rate(), None);
    }
}
