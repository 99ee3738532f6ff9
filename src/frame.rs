//! Captured camera frames.
//!
//! A [`CapturedFrame`] owns an encoded image in a temporary file. The file is
//! deleted when the frame is dropped, so moving frames into the request that
//! uploads them is enough to discard them once that request returns.

use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Guesses the format from a file extension, defaulting to JPEG.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("png") => Self::Png,
            _ => Self::Jpeg,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

pub struct CapturedFrame {
    file: NamedTempFile,
    format: ImageFormat,
    captured_at: Instant,
}

impl CapturedFrame {
    /// Writes the encoded image to transient storage.
    ///
    /// # Errors
    /// Returns an error if the temporary file cannot be created or written.
    pub fn from_bytes(bytes: &[u8], format: ImageFormat) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("facegate-frame-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            file,
            format,
            captured_at: Instant::now(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Moment the frame was taken, on the tokio clock.
    #[must_use]
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Name sent as the multipart file name.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.file
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .map_or_else(
                || format!("frame.{}", self.format.extension()),
                ToString::to_string,
            )
    }

    /// # Errors
    /// Returns an error if the frame file cannot be read.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    /// Size of the encoded image in bytes.
    ///
    /// # Errors
    /// Returns an error if the frame file metadata cannot be read.
    pub fn size(&self) -> std::io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }
}

impl std::fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("path", &self.path())
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Paths of frames that are still on disk; used to check nothing leaks.
#[must_use]
pub fn paths(frames: &[CapturedFrame]) -> Vec<PathBuf> {
    frames.iter().map(|frame| frame.path().to_path_buf()).collect()
}
