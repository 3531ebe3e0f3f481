use std::sync::{Arc, Mutex, Weak};

use crate::foundation::core::Canvas;
use crate::foundation::error::{EncodeError, EncodeResult};

/// Pool accounting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PixelBufferPoolStats {
    /// Buffers currently handed out.
    pub outstanding: usize,
    /// Buffers parked in the pool, ready for reuse.
    pub retained: usize,
    /// Fresh allocations over the pool lifetime.
    pub allocated: u64,
    /// Reuses of a parked buffer.
    pub reused: u64,
}

struct PoolState {
    free: Vec<vello_cpu::Pixmap>,
    stats: PixelBufferPoolStats,
}

struct PoolShared {
    width: u16,
    height: u16,
    max_buffers: usize,
    state: Mutex<PoolState>,
}

/// Bounded pool of fixed-size premultiplied RGBA8 buffers.
///
/// Each encode session owns its own pool. At most `max_buffers` buffers exist at once; a
/// [`PixelBuffer`] returns its memory to the pool when dropped.
#[derive(Clone)]
pub struct PixelBufferPool {
    shared: Arc<PoolShared>,
}

impl PixelBufferPool {
    /// Create a pool of `canvas`-sized buffers.
    pub fn new(canvas: Canvas, max_buffers: usize) -> EncodeResult<Self> {
        let width: u16 = canvas.width.try_into().map_err(|_| {
            EncodeError::settings(format!("pixel buffer width exceeds u16: {}", canvas.width))
        })?;
        let height: u16 = canvas.height.try_into().map_err(|_| {
            EncodeError::settings(format!(
                "pixel buffer height exceeds u16: {}",
                canvas.height
            ))
        })?;
        if width == 0 || height == 0 {
            return Err(EncodeError::settings(
                "pixel buffer width/height must be non-zero",
            ));
        }
        Ok(Self {
            shared: Arc::new(PoolShared {
                width,
                height,
                max_buffers,
                state: Mutex::new(PoolState {
                    free: Vec::new(),
                    stats: PixelBufferPoolStats::default(),
                }),
            }),
        })
    }

    /// Buffer dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: u32::from(self.shared.width),
            height: u32::from(self.shared.height),
        }
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PixelBufferPoolStats {
        match self.shared.state.lock() {
            Ok(st) => st.stats,
            Err(_) => PixelBufferPoolStats::default(),
        }
    }

    /// Take a buffer, reusing a parked one when possible.
    ///
    /// Returns `None` when `max_buffers` are already outstanding. Buffer contents are
    /// unspecified; callers clear before drawing.
    pub fn create_pixel_buffer(&self) -> Option<PixelBuffer> {
        let mut st = self.shared.state.lock().ok()?;
        let pixmap = if let Some(p) = st.free.pop() {
            st.stats.retained = st.stats.retained.saturating_sub(1);
            st.stats.reused = st.stats.reused.saturating_add(1);
            p
        } else if st.stats.outstanding < self.shared.max_buffers {
            st.stats.allocated = st.stats.allocated.saturating_add(1);
            vello_cpu::Pixmap::new(self.shared.width, self.shared.height)
        } else {
            return None;
        };
        st.stats.outstanding += 1;
        drop(st);

        Some(PixelBuffer {
            pixmap: Some(pixmap),
            width: self.shared.width,
            height: self.shared.height,
            pool: Arc::downgrade(&self.shared),
        })
    }
}

impl std::fmt::Debug for PixelBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBufferPool")
            .field("width", &self.shared.width)
            .field("height", &self.shared.height)
            .field("max_buffers", &self.shared.max_buffers)
            .field("stats", &self.stats())
            .finish()
    }
}

/// One frame's worth of premultiplied RGBA8 pixels, on loan from a [`PixelBufferPool`].
///
/// Dropping the buffer returns it to the pool. If the pool is gone the memory is freed.
pub struct PixelBuffer {
    pixmap: Option<vello_cpu::Pixmap>,
    width: u16,
    height: u16,
    pool: Weak<PoolShared>,
}

impl PixelBuffer {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    /// Read-only view of the pixel bytes, tightly packed, row-major.
    pub fn data(&self) -> &[u8] {
        match self.pixmap.as_ref() {
            Some(p) => p.data_as_u8_slice(),
            None => &[],
        }
    }

    /// Lock the buffer for writing. The lock ends when the guard drops.
    pub fn lock_base_address(&mut self) -> PixelBufferLock<'_> {
        PixelBufferLock { buffer: self }
    }

    fn pixmap_mut(&mut self) -> Option<&mut vello_cpu::Pixmap> {
        self.pixmap.as_mut()
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        let Some(pixmap) = self.pixmap.take() else {
            return;
        };
        let Some(shared) = self.pool.upgrade() else {
            return;
        };
        let Ok(mut st) = shared.state.lock() else {
            return;
        };
        st.stats.outstanding = st.stats.outstanding.saturating_sub(1);
        st.free.push(pixmap);
        st.stats.retained += 1;
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Write access to a locked [`PixelBuffer`].
pub struct PixelBufferLock<'a> {
    buffer: &'a mut PixelBuffer,
}

impl PixelBufferLock<'_> {
    /// Mutable pixel bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match self.buffer.pixmap_mut() {
            Some(p) => p.data_as_u8_slice_mut(),
            None => &mut [],
        }
    }

    /// Clear every pixel to transparent black.
    pub fn clear(&mut self) {
        self.bytes_mut().fill(0);
    }

    pub(crate) fn pixmap_mut(&mut self) -> Option<&mut vello_cpu::Pixmap> {
        self.buffer.pixmap_mut()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pixel_pool.rs"]
mod tests;
