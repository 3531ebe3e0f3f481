use crate::assets::image::SourceImage;
use crate::foundation::core::{Affine, Canvas, Rect, Size};
use crate::foundation::error::{EncodeError, EncodeResult};
use crate::render::pixel_pool::{PixelBuffer, PixelBufferPool};
use crate::settings::ContentMode;

/// Placement of an `image`-sized picture inside a `target` canvas under `mode`.
///
/// The scale is the min (`AspectFit`) or max (`AspectFill`) of the per-axis ratios and the result
/// is centered, so fill overflows both sides equally and fit letterboxes both sides equally.
pub fn fit_rect(image: Size, target: Size, mode: ContentMode) -> Rect {
    let horizontal = target.width / image.width;
    let vertical = target.height / image.height;
    let scale = match mode {
        ContentMode::AspectFill => horizontal.max(vertical),
        ContentMode::AspectFit => horizontal.min(vertical),
    };

    let scaled = Size::new(image.width * scale, image.height * scale);
    let x = (target.width - scaled.width) / 2.0;
    let y = (target.height - scaled.height) / 2.0;
    Rect::from_origin_size((x, y), scaled)
}

/// Draws source images into pool buffers at a fixed output size.
///
/// Keeps one `vello_cpu` render context alive across frames.
pub struct FrameCompositor {
    canvas: Canvas,
    mode: ContentMode,
    ctx: Option<vello_cpu::RenderContext>,
}

impl FrameCompositor {
    /// Create a compositor for `canvas`-sized output.
    pub fn new(canvas: Canvas, mode: ContentMode) -> Self {
        Self {
            canvas,
            mode,
            ctx: None,
        }
    }

    /// Output size.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Scaling policy.
    pub fn content_mode(&self) -> ContentMode {
        self.mode
    }

    /// Render `image` into a fresh buffer from `pool`.
    ///
    /// Fails with [`EncodeError::PixelBufferUnavailable`] when the pool is exhausted.
    pub fn compose(
        &mut self,
        image: &SourceImage,
        pool: &PixelBufferPool,
    ) -> EncodeResult<PixelBuffer> {
        if pool.canvas() != self.canvas {
            return Err(EncodeError::settings(format!(
                "pixel buffer pool is {}x{}, compositor expects {}x{}",
                pool.canvas().width,
                pool.canvas().height,
                self.canvas.width,
                self.canvas.height
            )));
        }
        let mut buffer = pool
            .create_pixel_buffer()
            .ok_or(EncodeError::PixelBufferUnavailable)?;

        let placement = fit_rect(image.size(), self.canvas.size(), self.mode);
        let scale = placement.width() / image.size().width;
        let transform = Affine::translate((placement.x0, placement.y0)) * Affine::scale(scale);

        // Pool dimensions are validated to fit u16.
        let w = self.canvas.width as u16;
        let h = self.canvas.height as u16;
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(transform));
        ctx.set_paint(image.paint().clone());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            image.size().width,
            image.size().height,
        ));
        ctx.flush();

        {
            let mut lock = buffer.lock_base_address();
            lock.clear();
            let Some(dst) = lock.pixmap_mut() else {
                return Err(EncodeError::PixelBufferUnavailable);
            };
            ctx.render_to_pixmap(dst);
        }

        self.ctx = Some(ctx);
        Ok(buffer)
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
