/// Source bitmaps fed into the compositor.
pub mod image;
