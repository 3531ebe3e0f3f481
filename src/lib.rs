//! stillreel turns an ordered sequence of still images, each with a display duration, into one
//! H.264 video file.
//!
//! The public API is facade-first:
//!
//! - Describe the output with [`RenderSettings`]
//! - Build [`Frame`]s from [`SourceImage`]s
//! - Call [`ImageAnimator::render`] (system `ffmpeg`) or [`ImageAnimator::render_with`] for any
//!   [`VideoEncoder`]
//!
//! Lower layers are public too: [`Timeline`] resolves durations into exact presentation
//! timestamps, [`FrameCompositor`] scales each image into a pooled [`PixelBuffer`], and
//! [`EncodeSession`] drives an encoder under single-slot backpressure.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Public render facade.
pub mod animator;
/// Source image loading.
pub mod assets;
pub mod encode;
pub mod render;
pub mod session;
/// Render configuration.
pub mod settings;
/// Durations resolved to presentation timestamps.
pub mod timeline;

pub use crate::foundation::core::{Canvas, MediaTime, Rect, Size, TIMESCALE};
pub use crate::foundation::error::{EncodeError, EncodeErrorKind, EncodeResult};

pub use crate::animator::{DeliverOn, ImageAnimator};
pub use crate::assets::image::SourceImage;
pub use crate::encode::encoder::{
    AppendError, InputDescriptor, OutputSettings, PixelFormat, VideoCodec, VideoEncoder,
};
pub use crate::encode::ffmpeg::{FfmpegEncoder, is_ffmpeg_on_path};
pub use crate::encode::memory::{
    InMemoryEncoder, InMemoryEncoderOpts, RecordedFrame, Recording, RecordingHandle,
};
pub use crate::encode::ready::{ReadyPermit, ReadySignal};
pub use crate::render::compositor::{FrameCompositor, fit_rect};
pub use crate::render::pixel_pool::{
    PixelBuffer, PixelBufferLock, PixelBufferPool, PixelBufferPoolStats,
};
pub use crate::session::encode_session::{EncodeSession, SessionState, SessionStats, Submission};
pub use crate::settings::{ContentMode, RenderSettings, VideoExtension};
pub use crate::timeline::{Frame, Timeline, TimelineEntry};
pub use tokio_util::sync::CancellationToken;
