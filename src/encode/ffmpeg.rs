use std::io::{Read as _, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;

use crate::encode::encoder::{
    AppendError, InputDescriptor, OutputSettings, PixelFormat, VideoCodec, VideoEncoder,
};
use crate::encode::ready::{ReadyPermit, ReadySignal};
use crate::foundation::core::MediaTime;
use crate::foundation::error::{EncodeError, EncodeResult};
use crate::foundation::math::flatten_over_background;
use crate::render::pixel_pool::{PixelBuffer, PixelBufferPool};

/// Buffers in flight: one being composed, one held by the writer, one spare.
const POOL_BUFFERS: usize = 3;

enum WriterMsg {
    Frame {
        buffer: PixelBuffer,
        index: u64,
        permit: ReadyPermit,
    },
    End {
        index: u64,
    },
}

struct Writer {
    child: Child,
    tx: SyncSender<WriterMsg>,
    thread: JoinHandle<Result<u64, String>>,
    stderr_drain: JoinHandle<std::io::Result<Vec<u8>>>,
}

/// Encoder that spawns the system `ffmpeg` and streams raw frames to its stdin.
///
/// Output is H.264 (`libx264`, `yuv420p`) in a MOV or MP4 container at the constant rate given
/// by [`OutputSettings::frame_duration`]. Each appended buffer is held by a writer thread until
/// the next timestamp arrives and is then written once per frame period it spans. With a period
/// that divides every timestamp, per-image durations survive the constant-rate stream exactly. The readiness permit for an append is released only after the previous frame has been
/// written, which makes a slow `ffmpeg` push back on the session.
pub struct FfmpegEncoder {
    out_path: PathBuf,
    ready: ReadySignal,
    settings: Option<OutputSettings>,
    writer: Option<Writer>,
    last_time: Option<MediaTime>,
    end_time: Option<MediaTime>,
    marked_finished: bool,
}

impl FfmpegEncoder {
    /// Create an encoder writing to `out_path`. Nothing is spawned until `start_writing`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            ready: ReadySignal::single_slot(),
            settings: None,
            writer: None,
            last_time: None,
            end_time: None,
            marked_finished: false,
        }
    }

    /// Output file path.
    pub fn out_path(&self) -> &Path {
        &self.out_path
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn can_apply_output_settings(&self, settings: &OutputSettings) -> bool {
        let size = settings.size;
        if settings.codec != VideoCodec::H264
            || size.width == 0
            || size.height == 0
            || settings.frame_rate().is_none()
        {
            return false;
        }
        // yuv420p needs even dimensions; pool buffers are u16-sized.
        if !size.width.is_multiple_of(2) || !size.height.is_multiple_of(2) {
            return false;
        }
        if size.width > u32::from(u16::MAX) || size.height > u32::from(u16::MAX) {
            return false;
        }
        is_ffmpeg_on_path()
    }

    fn can_add_input(&self, settings: &OutputSettings, input: &InputDescriptor) -> bool {
        input.size == settings.size && input.pixel_format == PixelFormat::Rgba8Premul
    }

    fn start_writing(
        &mut self,
        settings: &OutputSettings,
        input: &InputDescriptor,
    ) -> EncodeResult<PixelBufferPool> {
        if self.writer.is_some() {
            return Err(EncodeError::writer("ffmpeg encoder already started"));
        }
        let (rate_num, rate_den) = settings
            .frame_rate()
            .ok_or_else(|| EncodeError::writer("frame duration must be positive"))?;
        ensure_parent_dir(&self.out_path)?;
        let pool = PixelBufferPool::new(input.size, POOL_BUFFERS)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Input: flattened RGBA8 frames, one per frame period.
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", settings.size.width, settings.size.height),
            "-r",
            &format!("{rate_num}/{rate_den}"),
            "-i",
            "pipe:0",
        ]);
        // Output: h264 + yuv420p for broad compatibility.
        cmd.args([
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
            "-f",
            settings.container.as_str(),
        ])
        .arg(&self.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            EncodeError::writer(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncodeError::writer("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncodeError::writer("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let (tx, rx) = mpsc::sync_channel(1);
        let ready = self.ready.clone();
        let bg_rgba = settings.background_rgba;
        let frame_len = settings.size.rgba8_byte_len();
        let thread = std::thread::Builder::new()
            .name("stillreel-ffmpeg-writer".to_owned())
            .spawn(move || {
                let out = run_writer(rx, stdin, bg_rgba, frame_len);
                if out.is_err() {
                    ready.close();
                }
                out
            })
            .map_err(|e| EncodeError::writer(format!("failed to spawn writer thread: {e}")))?;

        tracing::debug!(
            out = %self.out_path.display(),
            width = settings.size.width,
            height = settings.size.height,
            rate = %format_args!("{rate_num}/{rate_den}"),
            container = settings.container.as_str(),
            "ffmpeg started"
        );

        self.writer = Some(Writer {
            child,
            tx,
            thread,
            stderr_drain,
        });
        self.settings = Some(settings.clone());
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
        let (Some(writer), Some(settings)) = (self.writer.as_ref(), self.settings.as_ref()) else {
            return Err(AppendError::Closed("ffmpeg encoder not started".to_owned()));
        };
        if self.marked_finished {
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

        let index = presentation_time.periods_of(settings.frame_duration);
        match writer.tx.try_send(WriterMsg::Frame {
            buffer,
            index,
            permit,
        }) {
            Ok(()) => {
                self.last_time = Some(presentation_time);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(AppendError::NotReady),
            Err(TrySendError::Disconnected(_)) => {
                self.ready.close();
                Err(AppendError::Closed("ffmpeg writer stopped".to_owned()))
            }
        }
    }

    fn mark_as_finished(&mut self) {
        self.marked_finished = true;
    }

    fn end_session_at(&mut self, end: MediaTime) {
        self.end_time = Some(end);
    }

    fn output_path(&self) -> Option<&Path> {
        Some(&self.out_path)
    }

    fn finish_writing(mut self) -> EncodeResult<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| EncodeError::finalization("ffmpeg encoder not started"))?;
        let period = self
            .settings
            .as_ref()
            .map_or(MediaTime::ZERO, |s| s.frame_duration);
        let end = self
            .end_time
            .or(self.last_time)
            .unwrap_or(MediaTime::ZERO);

        // A send failure means the writer already exited; its error surfaces from `join`.
        let _ = writer.tx.send(WriterMsg::End {
            index: end.periods_of(period),
        });
        drop(writer.tx);

        let written = writer
            .thread
            .join()
            .map_err(|_| EncodeError::finalization("ffmpeg writer thread panicked"))?;
        let mut child = writer.child;
        let status = child.wait().map_err(|e| {
            EncodeError::finalization(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = writer
            .stderr_drain
            .join()
            .map_err(|_| EncodeError::finalization("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| EncodeError::finalization(format!("ffmpeg stderr read failed: {e}")))?;
        self.ready.close();

        let stderr = String::from_utf8_lossy(&stderr_bytes);
        let frames = written
            .map_err(|e| EncodeError::finalization(format!("{e}; ffmpeg: {}", stderr.trim())))?;
        if !status.success() {
            return Err(EncodeError::finalization(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        tracing::debug!(out = %self.out_path.display(), frames, "ffmpeg finished");
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Abandoned without finishing: stop ffmpeg instead of letting it finalize a partial file.
        if let Some(writer) = self.writer.take() {
            drop(writer.tx);
            let mut child = writer.child;
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn run_writer<W: Write>(
    rx: Receiver<WriterMsg>,
    mut stdin: W,
    bg_rgba: [u8; 4],
    frame_len: usize,
) -> Result<u64, String> {
    let mut scratch = vec![0u8; frame_len];
    let mut pending: Option<(PixelBuffer, u64)> = None;
    let mut written = 0u64;

    for msg in rx {
        match msg {
            WriterMsg::Frame {
                buffer,
                index,
                permit,
            } => {
                if let Some((prev, prev_index)) = pending.take() {
                    let repeat = index.saturating_sub(prev_index);
                    written += write_repeated(&mut stdin, &mut scratch, &prev, repeat, bg_rgba)?;
                }
                pending = Some((buffer, index));
                drop(permit);
            }
            WriterMsg::End { index } => {
                if let Some((prev, prev_index)) = pending.take() {
                    let repeat = index.saturating_sub(prev_index);
                    written += write_repeated(&mut stdin, &mut scratch, &prev, repeat, bg_rgba)?;
                }
                break;
            }
        }
    }

    stdin
        .flush()
        .map_err(|e| format!("failed to flush ffmpeg stdin: {e}"))?;
    Ok(written)
}

fn write_repeated<W: Write>(
    stdin: &mut W,
    scratch: &mut [u8],
    buffer: &PixelBuffer,
    repeat: u64,
    bg_rgba: [u8; 4],
) -> Result<u64, String> {
    if repeat == 0 {
        return Ok(0);
    }
    if buffer.data().len() != scratch.len() {
        return Err(format!(
            "pixel buffer size mismatch: got {} bytes, expected {}",
            buffer.data().len(),
            scratch.len()
        ));
    }
    flatten_over_background(scratch, buffer.data(), bg_rgba);
    for _ in 0..repeat {
        stdin
            .write_all(scratch)
            .map_err(|e| format!("failed to write frame to ffmpeg stdin: {e}"))?;
    }
    Ok(repeat)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> EncodeResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
