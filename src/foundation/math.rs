/// 64-bit FNV-1a, used to fingerprint pixel buffers.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Fnv1a64(u64);

impl Fnv1a64 {
    pub(crate) const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    pub(crate) fn new() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        self.0 = bytes.iter().fold(self.0, |h, &b| {
            (h ^ u64::from(b)).wrapping_mul(Self::PRIME)
        });
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}

/// `x * y / 255`, rounded.
pub(crate) fn mul_div255(x: u8, y: u8) -> u8 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u8
}

/// Premultiply straight-alpha RGBA8 in place.
pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3];
        for c in &mut px[..3] {
            *c = mul_div255(*c, a);
        }
    }
}

/// Composite premultiplied RGBA8 over an opaque background given as straight RGBA8.
///
/// Buffers are zipped pixel by pixel; output alpha is always 255.
pub(crate) fn flatten_over_background(dst: &mut [u8], src_premul: &[u8], background: [u8; 4]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = s[3];
        if a == u8::MAX {
            d.copy_from_slice(s);
            continue;
        }
        let uncovered = u8::MAX - a;
        for i in 0..3 {
            d[i] = s[i].saturating_add(mul_div255(background[i], uncovered));
        }
        d[3] = u8::MAX;
    }
}

/// Greatest common divisor. `gcd(0, n) == n`.
pub(crate) fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
