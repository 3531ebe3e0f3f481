use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context as _;

use crate::encode::encoder::{AppendError, InputDescriptor, OutputSettings, VideoEncoder};
use crate::encode::ready::{ReadyPermit, ReadySignal};
use crate::foundation::core::MediaTime;
use crate::foundation::error::{EncodeError, EncodeResult};
use crate::foundation::math::Fnv1a64;
use crate::render::pixel_pool::{PixelBuffer, PixelBufferPool};

/// Behavior knobs for [`InMemoryEncoder`].
#[derive(Clone, Debug)]
pub struct InMemoryEncoderOpts {
    /// Pool capacity handed to the session.
    pub max_buffers: usize,
    /// Answer for `can_apply_output_settings`.
    pub accept_output_settings: bool,
    /// Answer for `can_add_input`.
    pub accept_input: bool,
    /// When set, `finish_writing` fails with this message.
    pub finish_error: Option<String>,
    /// Keep readiness permits after each append until [`RecordingHandle::release_one`].
    pub hold_permits: bool,
    /// When set, an empty file is created here on start and a JSON manifest of the recorded
    /// frames is written on finish.
    pub manifest_path: Option<PathBuf>,
}

impl Default for InMemoryEncoderOpts {
    fn default() -> Self {
        Self {
            max_buffers: 2,
            accept_output_settings: true,
            accept_input: true,
            finish_error: None,
            hold_permits: false,
            manifest_path: None,
        }
    }
}

/// One appended buffer.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RecordedFrame {
    /// Presentation timestamp.
    pub presentation_time: MediaTime,
    /// Buffer width.
    pub width: u32,
    /// Buffer height.
    pub height: u32,
    /// FNV-1a hash of the pixel bytes.
    pub checksum: u64,
    /// Copied pixel bytes (premultiplied RGBA8).
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Everything an [`InMemoryEncoder`] observed.
#[derive(Clone, Debug, Default)]
pub struct Recording {
    /// Settings passed to `start_writing`.
    pub settings: Option<OutputSettings>,
    /// Appended frames in order.
    pub frames: Vec<RecordedFrame>,
    /// Whether `mark_as_finished` was called.
    pub marked_finished: bool,
    /// Value passed to `end_session_at`.
    pub end_time: Option<MediaTime>,
    /// Whether `finish_writing` succeeded.
    pub finished: bool,
}

#[derive(serde::Serialize)]
struct Manifest<'a> {
    container: &'static str,
    width: u32,
    height: u32,
    frame_duration: MediaTime,
    end_time: Option<MediaTime>,
    frames: &'a [RecordedFrame],
}

/// Shared view into an [`InMemoryEncoder`]'s recording, usable after the encoder moved away.
#[derive(Clone, Debug, Default)]
pub struct RecordingHandle {
    recording: Arc<Mutex<Recording>>,
    held: Arc<Mutex<Vec<ReadyPermit>>>,
}

impl RecordingHandle {
    /// Copy of the current recording.
    pub fn snapshot(&self) -> Recording {
        lock(&self.recording).clone()
    }

    /// Number of readiness permits parked by `hold_permits`.
    pub fn held_permits(&self) -> usize {
        lock(&self.held).len()
    }

    /// Free the oldest parked permit. Returns `false` when none was parked.
    pub fn release_one(&self) -> bool {
        let mut held = lock(&self.held);
        if held.is_empty() {
            return false;
        }
        drop(held.remove(0));
        true
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Encoder that records appended frames instead of producing video.
///
/// Used by tests and for inspecting what a session would send to a real encoder.
#[derive(Debug)]
pub struct InMemoryEncoder {
    opts: InMemoryEncoderOpts,
    ready: ReadySignal,
    handle: RecordingHandle,
    pool: Option<PixelBufferPool>,
    last_time: Option<MediaTime>,
}

impl InMemoryEncoder {
    /// Create an encoder with `opts`.
    pub fn new(opts: InMemoryEncoderOpts) -> Self {
        Self {
            opts,
            ready: ReadySignal::single_slot(),
            handle: RecordingHandle::default(),
            pool: None,
            last_time: None,
        }
    }

    /// Handle for inspecting the recording.
    pub fn recording(&self) -> RecordingHandle {
        self.handle.clone()
    }
}

impl Default for InMemoryEncoder {
    fn default() -> Self {
        Self::new(InMemoryEncoderOpts::default())
    }
}

impl VideoEncoder for InMemoryEncoder {
    fn can_apply_output_settings(&self, settings: &OutputSettings) -> bool {
        self.opts.accept_output_settings && settings.frame_rate().is_some()
    }

    fn can_add_input(&self, settings: &OutputSettings, input: &InputDescriptor) -> bool {
        self.opts.accept_input && input.size == settings.size
    }

    fn start_writing(
        &mut self,
        settings: &OutputSettings,
        input: &InputDescriptor,
    ) -> EncodeResult<PixelBufferPool> {
        if self.pool.is_some() {
            return Err(EncodeError::writer("in-memory encoder already started"));
        }
        if let Some(path) = self.opts.manifest_path.as_ref() {
            std::fs::write(path, b"").map_err(|e| {
                EncodeError::writer(format!("failed to create '{}': {e}", path.display()))
            })?;
        }
        let pool = PixelBufferPool::new(input.size, self.opts.max_buffers)?;
        lock(&self.handle.recording).settings = Some(settings.clone());
        self.pool = Some(pool.clone());
        Ok(pool)
    }

    fn ready_signal(&self) -> ReadySignal {
        self.ready.clone()
    }

    fn append_pixel_buffer(
        &mut self,
        buffer: PixelBuffer,
        presentation_time: MediaTime,
    ) -> Result<(), AppendError> {
        if self.pool.is_none() {
            return Err(AppendError::Closed("not started".to_owned()));
        }
        if lock(&self.handle.recording).marked_finished {
            return Err(AppendError::Closed("input already marked finished".to_owned()));
        }
        let permit = self.ready.try_claim().ok_or(AppendError::NotReady)?;
        if let Some(last) = self.last_time
            && presentation_time <= last
        {
            return Err(AppendError::OutOfOrder {
                last,
                got: presentation_time,
            });
        }
        self.last_time = Some(presentation_time);

        let mut hash = Fnv1a64::new();
        hash.update(buffer.data());
        lock(&self.handle.recording).frames.push(RecordedFrame {
            presentation_time,
            width: buffer.width(),
            height: buffer.height(),
            checksum: hash.finish(),
            data: buffer.data().to_vec(),
        });
        drop(buffer);

        if self.opts.hold_permits {
            lock(&self.handle.held).push(permit);
        }
        Ok(())
    }

    fn mark_as_finished(&mut self) {
        lock(&self.handle.recording).marked_finished = true;
    }

    fn end_session_at(&mut self, end: MediaTime) {
        lock(&self.handle.recording).end_time = Some(end);
    }

    fn output_path(&self) -> Option<&Path> {
        self.opts.manifest_path.as_deref()
    }

    fn finish_writing(self) -> EncodeResult<()> {
        self.ready.close();
        lock(&self.handle.held).clear();
        if self.pool.is_none() {
            return Err(EncodeError::finalization("in-memory encoder never started"));
        }
        if let Some(msg) = self.opts.finish_error {
            return Err(EncodeError::finalization(msg));
        }

        let mut recording = lock(&self.handle.recording);
        if let Some(path) = self.opts.manifest_path.as_ref() {
            let settings = recording
                .settings
                .as_ref()
                .ok_or_else(|| EncodeError::finalization("missing output settings"))?;
            let manifest = Manifest {
                container: settings.container.as_str(),
                width: settings.size.width,
                height: settings.size.height,
                frame_duration: settings.frame_duration,
                end_time: recording.end_time,
                frames: &recording.frames,
            };
            let json = serde_json::to_vec_pretty(&manifest).context("serialize manifest")?;
            std::fs::write(path, json)
                .with_context(|| format!("write manifest '{}'", path.display()))?;
        }
        recording.finished = true;
        Ok(())
    }
}
