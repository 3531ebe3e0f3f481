use super::*;

fn solid(w: u32, h: u32, rgba: [u8; 4]) -> SourceImage {
    SourceImage::from_rgba8(image::RgbaImage::from_pixel(w, h, image::Rgba(rgba))).unwrap()
}

fn alpha_at(buf: &PixelBuffer, x: u32, y: u32) -> u8 {
    let i = ((y * buf.width() + x) * 4 + 3) as usize;
    buf.data()[i]
}

#[test]
fn fit_never_exceeds_target() {
    let target = Size::new(640.0, 480.0);
    for image in [
        Size::new(1920.0, 1080.0),
        Size::new(100.0, 900.0),
        Size::new(64.0, 48.0),
        Size::new(3.0, 7.0),
    ] {
        let r = fit_rect(image, target, ContentMode::AspectFit);
        assert!(r.width() <= target.width + 1e-9);
        assert!(r.height() <= target.height + 1e-9);
        assert!(r.x0 >= -1e-9 && r.y0 >= -1e-9);
        // One axis always touches the canvas edge.
        assert!(
            (r.width() - target.width).abs() < 1e-9 || (r.height() - target.height).abs() < 1e-9
        );
    }
}

#[test]
fn fill_always_covers_target() {
    let target = Size::new(640.0, 480.0);
    for image in [
        Size::new(1920.0, 1080.0),
        Size::new(100.0, 900.0),
        Size::new(64.0, 48.0),
        Size::new(3.0, 7.0),
    ] {
        let r = fit_rect(image, target, ContentMode::AspectFill);
        assert!(r.width() >= target.width - 1e-9);
        assert!(r.height() >= target.height - 1e-9);
        assert!(r.x0 <= 1e-9 && r.y0 <= 1e-9);
        assert!(r.x1 >= target.width - 1e-9 && r.y1 >= target.height - 1e-9);
    }
}

#[test]
fn fit_rect_is_centered() {
    let r = fit_rect(
        Size::new(200.0, 100.0),
        Size::new(100.0, 100.0),
        ContentMode::AspectFit,
    );
    assert_eq!(r, Rect::new(0.0, 25.0, 100.0, 75.0));

    let r = fit_rect(
        Size::new(200.0, 100.0),
        Size::new(100.0, 100.0),
        ContentMode::AspectFill,
    );
    assert_eq!(r, Rect::new(-50.0, 0.0, 150.0, 100.0));
}

#[test]
fn compose_fit_letterboxes_wide_image() {
    let canvas = Canvas {
        width: 8,
        height: 8,
    };
    let pool = PixelBufferPool::new(canvas, 2).unwrap();
    let mut comp = FrameCompositor::new(canvas, ContentMode::AspectFit);

    let buf = comp.compose(&solid(4, 2, [255, 0, 0, 255]), &pool).unwrap();
    assert_eq!((buf.width(), buf.height()), (8, 8));
    // Image occupies rows 2..6.
    assert_eq!(alpha_at(&buf, 4, 0), 0);
    assert_eq!(alpha_at(&buf, 4, 7), 0);
    assert!(alpha_at(&buf, 4, 4) >= 250);
    assert!(alpha_at(&buf, 0, 3) >= 250);
}

#[test]
fn compose_fill_covers_every_corner() {
    let canvas = Canvas {
        width: 8,
        height: 8,
    };
    let pool = PixelBufferPool::new(canvas, 2).unwrap();
    let mut comp = FrameCompositor::new(canvas, ContentMode::AspectFill);

    let buf = comp.compose(&solid(4, 2, [0, 255, 0, 255]), &pool).unwrap();
    for (x, y) in [(0, 0), (7, 0), (0, 7), (7, 7), (4, 4)] {
        assert!(alpha_at(&buf, x, y) >= 250, "pixel ({x},{y}) not covered");
    }
}

#[test]
fn reused_buffer_is_cleared_before_drawing() {
    let canvas = Canvas {
        width: 8,
        height: 8,
    };
    let pool = PixelBufferPool::new(canvas, 1).unwrap();
    let mut fill = FrameCompositor::new(canvas, ContentMode::AspectFill);
    let mut fit = FrameCompositor::new(canvas, ContentMode::AspectFit);

    let img = solid(4, 2, [9, 9, 9, 255]);
    drop(fill.compose(&img, &pool).unwrap());
    let buf = fit.compose(&img, &pool).unwrap();
    assert_eq!(pool.stats().reused, 1);
    assert_eq!(alpha_at(&buf, 4, 0), 0);
}

#[test]
fn exhausted_pool_reports_unavailable_buffer() {
    let canvas = Canvas {
        width: 4,
        height: 4,
    };
    let pool = PixelBufferPool::new(canvas, 1).unwrap();
    let mut comp = FrameCompositor::new(canvas, ContentMode::AspectFit);
    let img = solid(2, 2, [1, 1, 1, 255]);

    let _held = comp.compose(&img, &pool).unwrap();
    let err = comp.compose(&img, &pool).unwrap_err();
    assert!(matches!(err, EncodeError::PixelBufferUnavailable));
}
