use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::encode::encoder::{
    AppendError, InputDescriptor, OutputSettings, PixelFormat, VideoEncoder,
};
use crate::encode::ready::ReadySignal;
use crate::foundation::core::MediaTime;
use crate::foundation::error::{EncodeError, EncodeErrorKind, EncodeResult};
use crate::render::compositor::FrameCompositor;
use crate::render::pixel_pool::PixelBufferPool;
use crate::settings::RenderSettings;
use crate::timeline::Timeline;

/// Lifecycle of an [`EncodeSession`].
///
/// `Idle -> Writing -> Finishing -> Finished`, with any step able to end in `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Created, encoder not configured yet.
    Idle,
    /// Accepting frames.
    Writing,
    /// Input closed, container being finalized.
    Finishing,
    /// Output complete.
    Finished,
    /// Terminal failure.
    Failed(EncodeErrorKind),
}

impl SessionState {
    /// `true` for `Finished` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_))
    }
}

/// Outcome of one [`EncodeSession::submit_next`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// A frame was composed and appended.
    Appended {
        /// Timestamp the frame was appended at.
        presentation_time: MediaTime,
        /// `true` for the closing duplicate at the total duration.
        last: bool,
    },
    /// The encoder had no capacity; the frame stays pending.
    Deferred,
    /// Every frame, including the closing duplicate, has been appended.
    Exhausted,
}

/// Append counters for one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames accepted by the encoder, including the closing duplicate.
    pub frames_appended: u64,
    /// Submissions that found the encoder busy.
    pub deferrals: u64,
}

struct Active<E> {
    encoder: E,
    ready: ReadySignal,
    pool: PixelBufferPool,
    compositor: FrameCompositor,
}

/// Pushes one [`Timeline`] through one [`VideoEncoder`].
///
/// Every entry is composed into a pool buffer and appended at its presentation time. The last
/// image is appended once more at the total duration so the final frame keeps its full
/// duration, then the container is finalized on a blocking worker.
pub struct EncodeSession<E: VideoEncoder> {
    settings: RenderSettings,
    timeline: Timeline,
    encoder: Option<E>,
    active: Option<Active<E>>,
    // Entries are 0..len; `len` is the closing duplicate; past that, exhausted.
    cursor: usize,
    last_time: Option<MediaTime>,
    state: SessionState,
    stats: SessionStats,
}

impl<E: VideoEncoder> EncodeSession<E> {
    /// Create an idle session. The encoder is not touched until [`EncodeSession::start`].
    pub fn new(encoder: E, settings: &RenderSettings, timeline: Timeline) -> Self {
        Self {
            settings: settings.clone(),
            timeline,
            encoder: Some(encoder),
            active: None,
            cursor: 0,
            last_time: None,
            state: SessionState::Idle,
            stats: SessionStats::default(),
        }
    }

    /// Create a session and start it.
    #[tracing::instrument(skip(encoder, settings, timeline), fields(frames = timeline.len()))]
    pub fn open(encoder: E, settings: &RenderSettings, timeline: Timeline) -> EncodeResult<Self> {
        let mut session = Self::new(encoder, settings, timeline);
        session.start()?;
        Ok(session)
    }

    /// Configure the encoder: output settings, then input, then start writing.
    ///
    /// Any refusal fails the session with [`EncodeError::InvalidWriter`]. Encoders may block
    /// here (spawning a process, opening files); async callers should run this on a blocking
    /// worker.
    pub fn start(&mut self) -> EncodeResult<()> {
        if self.state != SessionState::Idle {
            return Err(EncodeError::SessionClosed);
        }
        let mut encoder = self.encoder.take().ok_or(EncodeError::SessionClosed)?;

        let output = OutputSettings::for_timeline(&self.settings, &self.timeline);
        let input = InputDescriptor {
            size: self.settings.size,
            pixel_format: PixelFormat::Rgba8Premul,
        };

        if !encoder.can_apply_output_settings(&output) {
            return Err(self.fail(EncodeError::writer(format!(
                "encoder cannot produce {}x{} {} with frame period {}",
                output.size.width,
                output.size.height,
                output.container.as_str(),
                output.frame_duration
            ))));
        }
        if !encoder.can_add_input(&output, &input) {
            return Err(self.fail(EncodeError::writer(format!(
                "encoder rejected {}x{} {:?} input",
                input.size.width, input.size.height, input.pixel_format
            ))));
        }
        let pool = match encoder.start_writing(&output, &input) {
            Ok(pool) => pool,
            Err(err @ EncodeError::InvalidWriter(_)) => return Err(self.fail(err)),
            Err(err) => {
                return Err(self.fail(EncodeError::writer(format!(
                    "start writing failed: {err}"
                ))));
            }
        };
        if pool.canvas() != self.settings.size {
            return Err(self.fail(EncodeError::writer(format!(
                "encoder pool is {}x{}, expected {}x{}",
                pool.canvas().width,
                pool.canvas().height,
                self.settings.size.width,
                self.settings.size.height
            ))));
        }

        let ready = encoder.ready_signal();
        let compositor = FrameCompositor::new(self.settings.size, self.settings.content_mode);
        self.active = Some(Active {
            encoder,
            ready,
            pool,
            compositor,
        });
        self.state = SessionState::Writing;
        tracing::debug!(
            out = %self.settings.output_path().display(),
            total = %self.timeline.total_duration(),
            "encode session writing"
        );
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Append counters so far.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The timeline being encoded.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Output path named by the settings.
    pub fn output_path(&self) -> PathBuf {
        self.settings.output_path()
    }

    /// `true` while writing and the encoder has capacity for one more frame.
    pub fn is_ready_for_more_data(&self) -> bool {
        self.state == SessionState::Writing
            && self.active.as_ref().is_some_and(|a| a.ready.is_ready())
    }

    /// Compose and append the next pending frame if the encoder is ready.
    ///
    /// Never appends while the encoder is busy; returns [`Submission::Deferred`] instead and
    /// keeps the frame for the next call. Fails with [`EncodeError::SessionClosed`] outside
    /// `Writing`.
    pub fn submit_next(&mut self, cancel: &CancellationToken) -> EncodeResult<Submission> {
        if self.state != SessionState::Writing {
            return Err(EncodeError::SessionClosed);
        }
        if cancel.is_cancelled() {
            return Err(self.fail(EncodeError::Cancelled));
        }

        let entries = self.timeline.entries();
        let (entry, presentation_time, last) = match self.cursor {
            i if i < entries.len() => (&entries[i], entries[i].presentation_time, false),
            i if i == entries.len() => (
                self.timeline.last(),
                self.timeline.total_duration(),
                true,
            ),
            _ => return Ok(Submission::Exhausted),
        };

        let Some(active) = self.active.as_mut() else {
            return Err(EncodeError::SessionClosed);
        };
        if !active.ready.is_ready() {
            self.stats.deferrals += 1;
            tracing::trace!(cursor = self.cursor, "encoder busy, deferring");
            return Ok(Submission::Deferred);
        }
        if let Some(prev) = self.last_time
            && presentation_time <= prev
        {
            let err = EncodeError::timing(format!(
                "frame at {presentation_time} does not follow {prev}"
            ));
            return Err(self.fail(err));
        }

        let appended = active
            .compositor
            .compose(&entry.image, &active.pool)
            .and_then(|buffer| {
                match active.encoder.append_pixel_buffer(buffer, presentation_time) {
                    Ok(()) => Ok(true),
                    Err(AppendError::NotReady) => Ok(false),
                    Err(AppendError::OutOfOrder { last, got }) => Err(EncodeError::timing(
                        format!("encoder rejected {got}: not after {last}"),
                    )),
                    Err(AppendError::Closed(msg)) => Err(EncodeError::encoder(msg)),
                }
            });

        match appended {
            Ok(true) => {
                self.cursor += 1;
                self.last_time = Some(presentation_time);
                self.stats.frames_appended += 1;
                tracing::trace!(pts = %presentation_time, last, "frame appended");
                Ok(Submission::Appended {
                    presentation_time,
                    last,
                })
            }
            Ok(false) => {
                self.stats.deferrals += 1;
                Ok(Submission::Deferred)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Submit frames until the timeline is exhausted, waiting on readiness in between.
    ///
    /// Checks `cancel` before every submission and while waiting.
    pub async fn drive(&mut self, cancel: &CancellationToken) -> EncodeResult<()> {
        loop {
            match self.submit_next(cancel)? {
                Submission::Appended { .. } => {}
                Submission::Exhausted => return Ok(()),
                Submission::Deferred => {
                    let ready = match self.active.as_ref() {
                        Some(active) => active.ready.clone(),
                        None => return Err(EncodeError::SessionClosed),
                    };
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(self.fail(EncodeError::Cancelled)),
                        open = ready.ready() => {
                            if !open {
                                return Err(self.fail(EncodeError::encoder(
                                    "encoder stopped accepting data",
                                )));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Close the input, set the end time to the total duration and finalize the container.
    ///
    /// Finalization runs on a blocking worker; this resolves once it completes.
    pub async fn finish(&mut self) -> EncodeResult<PathBuf> {
        if self.state != SessionState::Writing {
            return Err(EncodeError::SessionClosed);
        }
        if self.cursor <= self.timeline.len() {
            let err = EncodeError::timing(format!(
                "finish requested with {} of {} frames appended",
                self.cursor,
                self.timeline.len() + 1
            ));
            return Err(self.fail(err));
        }
        let Some(Active { mut encoder, .. }) = self.active.take() else {
            return Err(EncodeError::SessionClosed);
        };

        self.state = SessionState::Finishing;
        let end = self.timeline.total_duration();
        encoder.mark_as_finished();
        encoder.end_session_at(end);
        tracing::debug!(end = %end, "finalizing output");

        let outcome = tokio::task::spawn_blocking(move || encoder.finish_writing())
            .await
            .map_err(|e| EncodeError::finalization(format!("finalize task failed: {e}")))
            .and_then(|res| res);

        match outcome {
            Ok(()) => {
                self.state = SessionState::Finished;
                let out = self.output_path();
                tracing::info!(
                    out = %out.display(),
                    frames = self.stats.frames_appended,
                    deferrals = self.stats.deferrals,
                    "encode session finished"
                );
                Ok(out)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// [`EncodeSession::drive`] then [`EncodeSession::finish`].
    pub async fn run(&mut self, cancel: &CancellationToken) -> EncodeResult<PathBuf> {
        self.drive(cancel).await?;
        self.finish().await
    }

    fn fail(&mut self, err: EncodeError) -> EncodeError {
        self.state = SessionState::Failed(err.kind());
        tracing::warn!(error = %err, "encode session failed");
        err
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/encode_session.rs"]
mod tests;
