use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::encode::encoder::VideoEncoder;
use crate::encode::ffmpeg::FfmpegEncoder;
use crate::foundation::error::{EncodeError, EncodeResult};
use crate::session::encode_session::EncodeSession;
use crate::settings::RenderSettings;
use crate::timeline::{Frame, Timeline};

/// Where a [`ImageAnimator::spawn_render`] callback runs.
#[derive(Clone, Debug, Default)]
pub enum DeliverOn {
    /// On the task that drove the render, right after it completes.
    #[default]
    Driver,
    /// On a task spawned onto the given runtime.
    Runtime(tokio::runtime::Handle),
}

/// Renders a sequence of still images into one video file.
///
/// Each render owns its own encode session and buffer pool, so renders with different file
/// names can run concurrently.
#[derive(Clone, Debug)]
pub struct ImageAnimator {
    settings: RenderSettings,
}

impl ImageAnimator {
    /// Create an animator for `settings`.
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    /// The settings every render uses.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `frames` with the system `ffmpeg` to [`RenderSettings::output_path`].
    pub async fn render(&self, frames: &[Frame]) -> EncodeResult<PathBuf> {
        let encoder = FfmpegEncoder::new(self.settings.output_path());
        self.render_with(frames, encoder, &CancellationToken::new())
            .await
    }

    /// Render `frames` through `encoder`.
    ///
    /// Empty input fails with [`EncodeError::EmptyInput`] before anything touches the
    /// filesystem. The encoder must write to [`RenderSettings::output_path`]; any other target
    /// fails with [`EncodeError::InvalidWriter`], also before the filesystem is touched. A stale
    /// file at the output path is removed first. On failure any partial output is removed
    /// before the error is returned.
    ///
    /// Encoder setup and teardown run on blocking workers.
    #[tracing::instrument(
        skip_all,
        fields(out = %self.settings.output_path().display(), frames = frames.len())
    )]
    pub async fn render_with<E: VideoEncoder>(
        &self,
        frames: &[Frame],
        encoder: E,
        cancel: &CancellationToken,
    ) -> EncodeResult<PathBuf> {
        if frames.is_empty() {
            return Err(EncodeError::EmptyInput);
        }
        self.settings.validate()?;
        let timeline = Timeline::build(frames)?;

        let out = self.settings.output_path();
        match encoder.output_path() {
            Some(target) if target == out.as_path() => {}
            Some(target) => {
                return Err(EncodeError::writer(format!(
                    "encoder writes '{}' but the output path is '{}'",
                    target.display(),
                    out.display()
                )));
            }
            None => return Err(EncodeError::writer("encoder does not write an output file")),
        }
        remove_stale_output(&out)?;

        let settings = self.settings.clone();
        let span = tracing::Span::current();
        let opened = tokio::task::spawn_blocking(move || {
            span.in_scope(|| EncodeSession::open(encoder, &settings, timeline))
        })
        .await
        .map_err(|e| EncodeError::writer(format!("encoder setup task failed: {e}")))
        .and_then(|res| res);

        let result = match opened {
            Ok(mut session) => {
                let result = session.run(cancel).await;
                // Release the encoder before touching its output.
                if let Err(e) = tokio::task::spawn_blocking(move || drop(session)).await {
                    tracing::warn!(error = %e, "encoder teardown task failed");
                }
                result
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(path) => {
                tracing::info!(out = %path.display(), "render complete");
                Ok(path)
            }
            Err(err) => {
                remove_partial_output(&out);
                Err(err)
            }
        }
    }

    /// Run [`ImageAnimator::render_with`] on a spawned task and hand the result to `callback`.
    ///
    /// `deliver_on` picks where the callback runs. The returned handle completes after the
    /// callback has run.
    pub fn spawn_render<E, F>(
        &self,
        frames: Vec<Frame>,
        encoder: E,
        cancel: CancellationToken,
        deliver_on: DeliverOn,
        callback: F,
    ) -> JoinHandle<()>
    where
        E: VideoEncoder,
        F: FnOnce(EncodeResult<PathBuf>) + Send + 'static,
    {
        let animator = self.clone();
        tokio::spawn(async move {
            let result = animator.render_with(&frames, encoder, &cancel).await;
            match deliver_on {
                DeliverOn::Driver => callback(result),
                DeliverOn::Runtime(handle) => {
                    if let Err(err) = handle.spawn(async move { callback(result) }).await {
                        tracing::warn!(error = %err, "render callback task failed");
                    }
                }
            }
        })
    }
}

fn remove_stale_output(path: &Path) -> EncodeResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed stale output");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EncodeError::FileSystem(e)),
    }
}

fn remove_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "leaving partial output"),
    }
}
