use crate::foundation::error::{EncodeError, EncodeResult};

pub use kurbo::{Affine, Rect, Size};

/// Timescale used for every timeline timestamp, in units per second.
///
/// 600 is divisible by 24, 25, 30 and 60, so common frame durations are exact.
pub const TIMESCALE: u32 = 600;

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated canvas with non-zero dimensions.
    pub fn new(width: u32, height: u32) -> EncodeResult<Self> {
        if width == 0 || height == 0 {
            return Err(EncodeError::settings("canvas width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Canvas dimensions as a floating-point size.
    pub fn size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// Bytes needed for one tightly packed RGBA8 frame.
    pub fn rgba8_byte_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

/// Rational timestamp `value / timescale` seconds.
///
/// Equality and ordering compare the represented instant, so `600/600 == 30/30`. The timescale is
/// never zero; deserializing one fails.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawMediaTime")]
pub struct MediaTime {
    value: i64,
    timescale: u32,
}

#[derive(serde::Deserialize)]
struct RawMediaTime {
    value: i64,
    timescale: u32,
}

impl TryFrom<RawMediaTime> for MediaTime {
    type Error = EncodeError;

    fn try_from(raw: RawMediaTime) -> EncodeResult<Self> {
        Self::new(raw.value, raw.timescale)
    }
}

impl MediaTime {
    /// Zero at the default [`TIMESCALE`].
    pub const ZERO: Self = Self {
        value: 0,
        timescale: TIMESCALE,
    };

    /// Create `value / timescale` seconds. Fails with [`EncodeError::TimingError`] for a zero
    /// timescale.
    pub fn new(value: i64, timescale: u32) -> EncodeResult<Self> {
        if timescale == 0 {
            return Err(EncodeError::timing("timescale must be non-zero"));
        }
        Ok(Self { value, timescale })
    }

    /// Create a timestamp at the default [`TIMESCALE`].
    pub const fn from_ticks(value: i64) -> Self {
        Self {
            value,
            timescale: TIMESCALE,
        }
    }

    /// Convert seconds to the nearest tick at the default [`TIMESCALE`].
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_ticks((secs * f64::from(TIMESCALE)).round() as i64)
    }

    /// Tick count.
    pub const fn value(self) -> i64 {
        self.value
    }

    /// Ticks per second.
    pub const fn timescale(self) -> u32 {
        self.timescale
    }

    /// Convert to floating-point seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.value as f64 / f64::from(self.timescale)
    }

    /// Return this time expressed at `timescale`, rounding to the nearest tick.
    ///
    /// `None` when `timescale` is zero.
    pub fn rescale(self, timescale: u32) -> Option<Self> {
        (timescale != 0).then(|| self.rescale_nonzero(timescale))
    }

    /// Number of whole `period`s between zero and this time.
    ///
    /// Rounds down. Negative times and non-positive periods give 0.
    pub fn periods_of(self, period: MediaTime) -> u64 {
        if self.value <= 0 || period.value <= 0 {
            return 0;
        }
        let num = i128::from(self.value) * i128::from(period.timescale);
        let den = i128::from(period.value) * i128::from(self.timescale);
        u64::try_from(num / den).unwrap_or(u64::MAX)
    }

    /// Saturating addition. `rhs` is rescaled to `self.timescale` first.
    pub fn saturating_add(self, rhs: Self) -> Self {
        let rhs = rhs.rescale_nonzero(self.timescale);
        Self {
            value: self.value.saturating_add(rhs.value),
            timescale: self.timescale,
        }
    }

    fn rescale_nonzero(self, timescale: u32) -> Self {
        if timescale == self.timescale {
            return self;
        }
        let num = i128::from(self.value) * i128::from(timescale);
        let den = i128::from(self.timescale);
        let value = div_round(num, den).clamp(i128::from(i64::MIN), i128::from(i64::MAX));
        Self {
            value: value as i64,
            timescale,
        }
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let a = i128::from(self.value) * i128::from(other.timescale);
        let b = i128::from(other.value) * i128::from(self.timescale);
        a.cmp(&b)
    }
}

impl std::ops::Add for MediaTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl std::fmt::Display for MediaTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({:.3}s)", self.value, self.timescale, self.as_secs_f64())
    }
}

fn div_round(num: i128, den: i128) -> i128 {
    if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
