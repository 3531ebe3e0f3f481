use crate::assets::image::SourceImage;
use crate::foundation::core::MediaTime;
use crate::foundation::error::{EncodeError, EncodeResult};
use crate::foundation::math::gcd_u64;

/// One source image paired with how long it stays on screen.
#[derive(Clone, Debug)]
pub struct Frame {
    image: SourceImage,
    duration_secs: f64,
}

impl Frame {
    /// Create a frame. `duration_secs` must be finite and positive.
    pub fn new(image: SourceImage, duration_secs: f64) -> EncodeResult<Self> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(EncodeError::InvalidDuration(duration_secs));
        }
        Ok(Self {
            image,
            duration_secs,
        })
    }

    /// The source image.
    pub fn image(&self) -> &SourceImage {
        &self.image
    }

    /// Display duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}

/// A timeline entry: an image and the time it becomes visible.
#[derive(Clone, Debug)]
pub struct TimelineEntry {
    /// The image to show.
    pub image: SourceImage,
    /// Presentation timestamp.
    pub presentation_time: MediaTime,
}

/// Frames resolved to absolute presentation timestamps.
///
/// Timestamps start at zero and are strictly increasing. Each frame's duration is quantized to
/// the timescale once, and both the timestamps and the total are sums of those quantized
/// durations, so the last entry plus its duration lands exactly on [`Timeline::total_duration`].
#[derive(Clone, Debug)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    total_duration: MediaTime,
    frame_duration: MediaTime,
}

impl Timeline {
    /// Resolve `frames` into a timeline.
    pub fn build(frames: &[Frame]) -> EncodeResult<Self> {
        if frames.is_empty() {
            return Err(EncodeError::EmptyInput);
        }

        let mut entries = Vec::with_capacity(frames.len());
        let mut elapsed = MediaTime::ZERO;
        let mut step = 0u64;
        for frame in frames {
            let duration = MediaTime::from_secs_f64(frame.duration_secs());
            let Ok(ticks) = u64::try_from(duration.value()) else {
                return Err(EncodeError::InvalidDuration(frame.duration_secs()));
            };
            if ticks == 0 {
                return Err(EncodeError::InvalidDuration(frame.duration_secs()));
            }
            step = gcd_u64(step, ticks);
            entries.push(TimelineEntry {
                image: frame.image().clone(),
                presentation_time: elapsed,
            });
            elapsed = elapsed + duration;
        }

        Ok(Self {
            entries,
            total_duration: elapsed,
            frame_duration: MediaTime::from_ticks(step as i64),
        })
    }

    /// Entries in presentation order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Number of entries (never zero).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; a timeline cannot be built from zero frames.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all frame durations.
    pub fn total_duration(&self) -> MediaTime {
        self.total_duration
    }

    /// Longest constant frame period that every timestamp falls on.
    ///
    /// The greatest common divisor of all frame durations. A constant-rate stream with this
    /// period shows every entry for a whole number of frames (at least one) and ends exactly at
    /// [`Timeline::total_duration`].
    pub fn frame_duration(&self) -> MediaTime {
        self.frame_duration
    }

    /// The last entry, which the encoder repeats at [`Timeline::total_duration`].
    pub fn last(&self) -> &TimelineEntry {
        // `build` rejects empty input, so there is always a last entry.
        &self.entries[self.entries.len() - 1]
    }
}
