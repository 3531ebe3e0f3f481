//! Encoder seam and the encoders shipped with the crate.
//!
//! [`encoder::VideoEncoder`] is what an encode session drives. [`ffmpeg::FfmpegEncoder`] produces
//! real H.264 files through the system `ffmpeg`; [`memory::InMemoryEncoder`] records appended
//! frames for inspection.

/// Encoder trait and its configuration types.
pub mod encoder;
/// System `ffmpeg` encoder.
pub mod ffmpeg;
/// Recording encoder.
pub mod memory;
/// Readiness signalling between session and encoder.
pub mod ready;
