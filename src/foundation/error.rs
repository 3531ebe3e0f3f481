/// Result alias used across the crate.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Canonical error taxonomy for rendering an image sequence into a video.
///
/// Every failure is terminal for the encode session that produced it.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    /// Zero frames were given to a render.
    #[error("empty input: at least one frame is required")]
    EmptyInput,

    /// A frame duration is not a positive, finite number of seconds.
    #[error("invalid duration: {0}s")]
    InvalidDuration(f64),

    /// Render settings violate an invariant.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The encoder could not be configured for the requested output or input.
    #[error("invalid writer: {0}")]
    InvalidWriter(String),

    /// The pixel buffer pool could not produce a buffer.
    #[error("pixel buffer unavailable")]
    PixelBufferUnavailable,

    /// A frame was appended out of order or at an already written timestamp.
    #[error("timing error: {0}")]
    TimingError(String),

    /// Removing a stale output file failed.
    #[error("filesystem error: {0}")]
    FileSystem(#[source] std::io::Error),

    /// The container could not be finalized.
    #[error("finalization error: {0}")]
    Finalization(String),

    /// The encoder stopped accepting data mid-stream.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// The render was cancelled before completion.
    #[error("render cancelled")]
    Cancelled,

    /// The session already reached a terminal state.
    #[error("encode session is closed")]
    SessionClosed,

    /// Anything else, with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fieldless mirror of [`EncodeError`], used to record why a session failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncodeErrorKind {
    /// See [`EncodeError::EmptyInput`].
    EmptyInput,
    /// See [`EncodeError::InvalidDuration`].
    InvalidDuration,
    /// See [`EncodeError::InvalidSettings`].
    InvalidSettings,
    /// See [`EncodeError::InvalidWriter`].
    InvalidWriter,
    /// See [`EncodeError::PixelBufferUnavailable`].
    PixelBufferUnavailable,
    /// See [`EncodeError::TimingError`].
    TimingError,
    /// See [`EncodeError::FileSystem`].
    FileSystem,
    /// See [`EncodeError::Finalization`].
    Finalization,
    /// See [`EncodeError::Encoder`].
    Encoder,
    /// See [`EncodeError::Cancelled`].
    Cancelled,
    /// See [`EncodeError::SessionClosed`].
    SessionClosed,
    /// See [`EncodeError::Other`].
    Other,
}

impl EncodeError {
    /// Build an [`EncodeError::InvalidSettings`].
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    /// Build an [`EncodeError::InvalidWriter`].
    pub fn writer(msg: impl Into<String>) -> Self {
        Self::InvalidWriter(msg.into())
    }

    /// Build an [`EncodeError::TimingError`].
    pub fn timing(msg: impl Into<String>) -> Self {
        Self::TimingError(msg.into())
    }

    /// Build an [`EncodeError::Finalization`].
    pub fn finalization(msg: impl Into<String>) -> Self {
        Self::Finalization(msg.into())
    }

    /// Build an [`EncodeError::Encoder`].
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> EncodeErrorKind {
        match self {
            Self::EmptyInput => EncodeErrorKind::EmptyInput,
            Self::InvalidDuration(_) => EncodeErrorKind::InvalidDuration,
            Self::InvalidSettings(_) => EncodeErrorKind::InvalidSettings,
            Self::InvalidWriter(_) => EncodeErrorKind::InvalidWriter,
            Self::PixelBufferUnavailable => EncodeErrorKind::PixelBufferUnavailable,
            Self::TimingError(_) => EncodeErrorKind::TimingError,
            Self::FileSystem(_) => EncodeErrorKind::FileSystem,
            Self::Finalization(_) => EncodeErrorKind::Finalization,
            Self::Encoder(_) => EncodeErrorKind::Encoder,
            Self::Cancelled => EncodeErrorKind::Cancelled,
            Self::SessionClosed => EncodeErrorKind::SessionClosed,
            Self::Other(_) => EncodeErrorKind::Other,
        }
    }
}
