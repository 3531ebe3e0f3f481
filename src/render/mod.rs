//! Image-to-pixel-buffer composition.

/// Scales source images into output-sized pixel buffers.
pub mod compositor;
/// Bounded pixel buffer pool.
pub mod pixel_pool;
