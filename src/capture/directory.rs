//! Camera backed by image files on disk.
//!
//! Replays the JPEG/PNG files of a directory (sorted by name, cycling) or a
//! single image file. Every capture copies the image into a fresh temporary
//! frame, so frames are owned and discarded exactly like camera frames.

use super::camera::{CameraDescriptor, CameraDevice, CameraError, CameraProvider, LensFacing};
use crate::frame::{CapturedFrame, ImageFormat};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::fs;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct DirectoryCamera {
    source: PathBuf,
    facing: LensFacing,
}

impl DirectoryCamera {
    /// `source` is a directory of images or a single image file.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            facing: LensFacing::Front,
        }
    }

    #[must_use]
    pub fn facing(mut self, facing: LensFacing) -> Self {
        self.facing = facing;
        self
    }

    fn descriptor(&self) -> CameraDescriptor {
        CameraDescriptor {
            id: format!("file://{}", self.source.display()),
            label: self
                .source
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("images")
                .to_string(),
            facing: self.facing,
        }
    }
}

#[async_trait]
impl CameraProvider for DirectoryCamera {
    async fn cameras(&self) -> Result<Vec<CameraDescriptor>, CameraError> {
        if fs::try_exists(&self.source).await? {
            Ok(vec![self.descriptor()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn open(
        &self,
        descriptor: &CameraDescriptor,
    ) -> Result<Arc<dyn CameraDevice>, CameraError> {
        let images = list_images(&self.source).await?;
        if images.is_empty() {
            return Err(CameraError::NotFound);
        }
        debug!(images = images.len(), source = %self.source.display(), "image camera opened");

        Ok(Arc::new(DirectoryDevice {
            descriptor: descriptor.clone(),
            images,
            next: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }))
    }
}

struct DirectoryDevice {
    descriptor: CameraDescriptor,
    images: Vec<PathBuf>,
    next: AtomicUsize,
    released: AtomicBool,
}

#[async_trait]
impl CameraDevice for DirectoryDevice {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    async fn capture(&self) -> Result<CapturedFrame, CameraError> {
        if self.released.load(Ordering::Acquire) {
            return Err(CameraError::Released);
        }

        let index = self.next.fetch_add(1, Ordering::AcqRel) % self.images.len();
        let path = &self.images[index];
        let bytes = fs::read(path)
            .await
            .map_err(|err| CameraError::Capture(format!("{}: {err}", path.display())))?;

        Ok(CapturedFrame::from_bytes(&bytes, ImageFormat::from_path(path))?)
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png"
            )
        })
}

async fn list_images(source: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let metadata = fs::metadata(source).await?;
    if metadata.is_file() {
        return Ok(if is_image(source) {
            vec![source.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut images = Vec::new();
    let mut entries = fs::read_dir(source).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();

    Ok(images)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_images_in_name_order_and_cycles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"second").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let camera = DirectoryCamera::new(dir.path());
        let cameras = camera.cameras().await.unwrap();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].facing, LensFacing::Front);

        let device = camera.open(&cameras[0]).await.unwrap();
        let first = device.capture().await.unwrap();
        let second = device.capture().await.unwrap();
        let third = device.capture().await.unwrap();

        assert_eq!(first.read().await.unwrap(), b"first");
        assert_eq!(first.format(), ImageFormat::Jpeg);
        assert_eq!(second.read().await.unwrap(), b"second");
        assert_eq!(second.format(), ImageFormat::Png);
        assert_eq!(third.read().await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn single_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("face.jpg");
        std::fs::write(&image, b"face").unwrap();

        let camera = DirectoryCamera::new(&image).facing(LensFacing::Back);
        let cameras = camera.cameras().await.unwrap();
        assert_eq!(cameras[0].facing, LensFacing::Back);

        let device = camera.open(&cameras[0]).await.unwrap();
        assert_eq!(device.capture().await.unwrap().read().await.unwrap(), b"face");

        device.release();
        assert!(matches!(device.capture().await, Err(CameraError::Released)));
    }

    #[tokio::test]
    async fn missing_or_empty_sources() {
        let dir = tempfile::tempdir().unwrap();

        let missing = DirectoryCamera::new(dir.path().join("nope"));
        assert!(missing.cameras().await.unwrap().is_empty());

        let empty = DirectoryCamera::new(dir.path());
        let cameras = empty.cameras().await.unwrap();
        assert!(matches!(
            empty.open(&cameras[0]).await,
            Err(CameraError::NotFound)
        ));
    }
}
