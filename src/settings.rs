use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::Canvas;
use crate::foundation::error::{EncodeError, EncodeResult};

/// Output container format. The file extension follows the variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoExtension {
    /// QuickTime `.mov`.
    #[default]
    Mov,
    /// MPEG-4 `.mp4`.
    Mp4,
}

impl VideoExtension {
    /// File extension without the leading dot.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mov => "mov",
            Self::Mp4 => "mp4",
        }
    }
}

/// How a source image is scaled into the output canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    /// Cover the whole canvas, cropping overflow.
    AspectFill,
    /// Show the whole image, letterboxing the rest.
    #[default]
    AspectFit,
}

/// Configuration for one render.
///
/// Loaded from JSON or built in code; every field except `size` and `video_filename` has a
/// default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderSettings {
    /// Output video dimensions.
    pub size: Canvas,
    /// Output file stem; the extension comes from `video_extension`.
    pub video_filename: String,
    /// Container format.
    #[serde(default)]
    pub video_extension: VideoExtension,
    /// Scaling policy for source images.
    #[serde(default)]
    pub content_mode: ContentMode,
    /// Directory the output file is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Background used to flatten transparent pixels (letterbox bars), straight RGBA8.
    #[serde(default = "default_background_rgba")]
    pub background_rgba: [u8; 4],
}

fn default_output_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir)
}

fn default_background_rgba() -> [u8; 4] {
    [0, 0, 0, 255]
}

impl RenderSettings {
    /// Settings with default extension, content mode, directory and background.
    pub fn new(size: Canvas, video_filename: impl Into<String>) -> Self {
        Self {
            size,
            video_filename: video_filename.into(),
            video_extension: VideoExtension::default(),
            content_mode: ContentMode::default(),
            output_dir: default_output_dir(),
            background_rgba: default_background_rgba(),
        }
    }

    /// Parse and validate settings from a JSON string.
    pub fn from_json_str(json: &str) -> EncodeResult<Self> {
        let settings: Self = serde_json::from_str(json).context("parse render settings JSON")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate settings from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> EncodeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read render settings '{}'", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Check invariants.
    pub fn validate(&self) -> EncodeResult<()> {
        if self.size.width == 0 || self.size.height == 0 {
            return Err(EncodeError::settings("output width/height must be non-zero"));
        }
        if self.video_filename.trim().is_empty() {
            return Err(EncodeError::settings("video filename must not be empty"));
        }
        Ok(())
    }

    /// Full path of the output file: `output_dir/video_filename.<ext>`.
    pub fn output_path(&self) -> PathBuf {
        let mut name = self.video_filename.clone();
        name.push('.');
        name.push_str(self.video_extension.as_str());
        self.output_dir.join(name)
    }

    /// Copy with a different file stem.
    pub fn with_video_filename(mut self, video_filename: impl Into<String>) -> Self {
        self.video_filename = video_filename.into();
        self
    }

    /// Copy with a different container format.
    pub fn with_video_extension(mut self, video_extension: VideoExtension) -> Self {
        self.video_extension = video_extension;
        self
    }

    /// Copy with a different scaling policy.
    pub fn with_content_mode(mut self, content_mode: ContentMode) -> Self {
        self.content_mode = content_mode;
        self
    }

    /// Copy with a different output directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}
