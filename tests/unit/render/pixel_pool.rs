use super::*;

fn canvas(w: u32, h: u32) -> Canvas {
    Canvas {
        width: w,
        height: h,
    }
}

#[test]
fn pool_honors_buffer_cap() {
    let pool = PixelBufferPool::new(canvas(8, 8), 2).unwrap();
    let a = pool.create_pixel_buffer().unwrap();
    let b = pool.create_pixel_buffer().unwrap();
    assert!(pool.create_pixel_buffer().is_none());

    drop(a);
    let c = pool.create_pixel_buffer().unwrap();
    assert!(pool.create_pixel_buffer().is_none());

    let st = pool.stats();
    assert_eq!(st.outstanding, 2);
    assert_eq!(st.allocated, 2);
    assert_eq!(st.reused, 1);
    drop((b, c));
    assert_eq!(pool.stats().retained, 2);
}

#[test]
fn buffers_match_pool_dimensions() {
    let pool = PixelBufferPool::new(canvas(6, 4), 1).unwrap();
    let mut buf = pool.create_pixel_buffer().unwrap();
    assert_eq!((buf.width(), buf.height()), (6, 4));
    assert_eq!(buf.data().len(), 6 * 4 * 4);

    {
        let mut lock = buf.lock_base_address();
        lock.bytes_mut().fill(7);
    }
    assert!(buf.data().iter().all(|&b| b == 7));

    buf.lock_base_address().clear();
    assert!(buf.data().iter().all(|&b| b == 0));
}

#[test]
fn zero_capacity_pool_never_yields() {
    let pool = PixelBufferPool::new(canvas(2, 2), 0).unwrap();
    assert!(pool.create_pixel_buffer().is_none());
}

#[test]
fn oversized_or_empty_pool_is_rejected() {
    assert!(PixelBufferPool::new(canvas(70_000, 2), 1).is_err());
    assert!(PixelBufferPool::new(canvas(0, 2), 1).is_err());
}

#[test]
fn buffer_outliving_pool_is_freed() {
    let pool = PixelBufferPool::new(canvas(2, 2), 1).unwrap();
    let buf = pool.create_pixel_buffer().unwrap();
    drop(pool);
    drop(buf);
}
