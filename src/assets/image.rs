use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::foundation::core::Size;
use crate::foundation::error::{EncodeError, EncodeResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// An immutable source bitmap.
///
/// Pixels are decoded once and held as a premultiplied `vello_cpu` image paint, so cloning is
/// cheap and drawing the image into many output frames never re-decodes it.
#[derive(Clone)]
pub struct SourceImage {
    width: u32,
    height: u32,
    paint: vello_cpu::Image,
}

impl SourceImage {
    /// Build from straight-alpha RGBA8 pixels.
    pub fn from_rgba8(img: image::RgbaImage) -> EncodeResult<Self> {
        let (width, height) = img.dimensions();
        let mut premul = img.into_raw();
        premultiply_rgba8_in_place(&mut premul);
        Self::from_premul_bytes(&premul, width, height)
    }

    /// Build from any decoded `image` buffer.
    pub fn from_dynamic(img: &image::DynamicImage) -> EncodeResult<Self> {
        Self::from_rgba8(img.to_rgba8())
    }

    /// Decode an encoded image (PNG, JPEG, ...) from memory.
    pub fn decode(bytes: &[u8]) -> EncodeResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        Self::from_dynamic(&dyn_img)
    }

    /// Decode an image file.
    pub fn open(path: impl AsRef<Path>) -> EncodeResult<Self> {
        let path = path.as_ref();
        let dyn_img =
            image::open(path).with_context(|| format!("open image '{}'", path.display()))?;
        Self::from_dynamic(&dyn_img)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel dimensions as a floating-point size.
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub(crate) fn paint(&self) -> &vello_cpu::Image {
        &self.paint
    }

    fn from_premul_bytes(bytes: &[u8], width: u32, height: u32) -> EncodeResult<Self> {
        if width == 0 || height == 0 {
            return Err(EncodeError::Other(anyhow::anyhow!(
                "source image must have non-zero dimensions, got {width}x{height}"
            )));
        }
        let pixmap = pixmap_from_premul_bytes(bytes, width, height)?;
        Ok(Self {
            width,
            height,
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
        })
    }
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> EncodeResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| anyhow::anyhow!("source image width exceeds u16: {width}"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| anyhow::anyhow!("source image height exceeds u16: {height}"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(anyhow::anyhow!("source image byte len mismatch").into());
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| {
            vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]])
        })
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}
