//! Camera abstraction and exclusive ownership.
//!
//! A device is only ever driven through a [`CameraLease`]. Leases are tracked in
//! a process-wide registry so no two flows hold the same device, and the device
//! is released exactly once, whichever of `release()` or `Drop` runs first.

use crate::frame::CapturedFrame;
use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("no camera available")]
    NotFound,
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("camera {0} is already in use")]
    Busy(String),
    #[error("camera has been released")]
    Released,
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("camera I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LensFacing {
    Front,
    Back,
    External,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDescriptor {
    pub id: String,
    pub label: String,
    pub facing: LensFacing,
}

#[async_trait]
pub trait CameraProvider: Send + Sync {
    async fn cameras(&self) -> Result<Vec<CameraDescriptor>, CameraError>;

    async fn open(
        &self,
        descriptor: &CameraDescriptor,
    ) -> Result<Arc<dyn CameraDevice>, CameraError>;
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    fn descriptor(&self) -> &CameraDescriptor;

    async fn capture(&self) -> Result<CapturedFrame, CameraError>;

    /// Frees the hardware. Must not block and must tolerate a pending capture.
    fn release(&self);
}

/// Front-facing camera if there is one, otherwise the first listed.
#[must_use]
pub fn select_camera(cameras: &[CameraDescriptor]) -> Option<&CameraDescriptor> {
    cameras
        .iter()
        .find(|camera| camera.facing == LensFacing::Front)
        .or_else(|| cameras.first())
}

fn registry() -> MutexGuard<'static, HashSet<String>> {
    static OWNED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    OWNED
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Registry entry for one device id; removed when released or dropped.
struct Claim {
    id: String,
    held: AtomicBool,
}

impl Claim {
    fn take(id: &str) -> Result<Self, CameraError> {
        if !registry().insert(id.to_string()) {
            return Err(CameraError::Busy(id.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            held: AtomicBool::new(true),
        })
    }

    fn release(&self) {
        if self.held.swap(false, Ordering::AcqRel) {
            registry().remove(&self.id);
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct CameraLease {
    device: Arc<dyn CameraDevice>,
    claim: Claim,
    released: AtomicBool,
}

impl CameraLease {
    /// Picks a camera and opens it exclusively.
    ///
    /// # Errors
    /// Returns `NotFound` when there is no camera, `Busy` when another flow owns
    /// it, or whatever the provider reports while opening.
    #[instrument(skip_all)]
    pub async fn acquire(provider: &dyn CameraProvider) -> Result<Self, CameraError> {
        let cameras = provider.cameras().await?;
        let descriptor = select_camera(&cameras).ok_or(CameraError::NotFound)?;

        let claim = Claim::take(&descriptor.id)?;
        let device = provider.open(descriptor).await?;
        debug!(camera = %descriptor.id, facing = ?descriptor.facing, "camera acquired");

        Ok(Self {
            device,
            claim,
            released: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &CameraDescriptor {
        self.device.descriptor()
    }

    /// # Errors
    /// Returns `Released` after the lease was released, or the device error.
    pub async fn capture(&self) -> Result<CapturedFrame, CameraError> {
        if self.is_released() {
            return Err(CameraError::Released);
        }
        self.device.capture().await
    }

    /// Releases the device; returns `false` if it was already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.device.release();
        self.claim.release();
        debug!(camera = %self.descriptor().id, "camera released");
        true
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraLease")
            .field("camera", self.descriptor())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fake {
    //! Scripted camera used by the capture tests.

    use super::*;
    use crate::frame::ImageFormat;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    #[derive(Default)]
    pub struct Counters {
        pub opened: AtomicUsize,
        pub released: AtomicUsize,
        pub captures: Mutex<Vec<Instant>>,
    }

    impl Counters {
        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn capture_times(&self) -> Vec<Instant> {
            self.captures.lock().unwrap().clone()
        }
    }

    pub struct FakeCamera {
        pub cameras: Vec<CameraDescriptor>,
        /// 1-based capture number that fails, if any.
        pub fail_capture_at: Option<usize>,
        pub deny_open: bool,
        pub counters: Arc<Counters>,
    }

    impl FakeCamera {
        pub fn new() -> Self {
            let id = format!("fake-{}", uuid::Uuid::new_v4().simple());
            Self {
                cameras: vec![
                    CameraDescriptor {
                        id: format!("{id}-back"),
                        label: "Back".to_string(),
                        facing: LensFacing::Back,
                    },
                    CameraDescriptor {
                        id: format!("{id}-front"),
                        label: "Front".to_string(),
                        facing: LensFacing::Front,
                    },
                ],
                fail_capture_at: None,
                deny_open: false,
                counters: Arc::new(Counters::default()),
            }
        }
    }

    struct FakeDevice {
        descriptor: CameraDescriptor,
        fail_capture_at: Option<usize>,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl CameraProvider for FakeCamera {
        async fn cameras(&self) -> Result<Vec<CameraDescriptor>, CameraError> {
            Ok(self.cameras.clone())
        }

        async fn open(
            &self,
            descriptor: &CameraDescriptor,
        ) -> Result<Arc<dyn CameraDevice>, CameraError> {
            if self.deny_open {
                return Err(CameraError::PermissionDenied("camera permission denied".to_string()));
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeDevice {
                descriptor: descriptor.clone(),
                fail_capture_at: self.fail_capture_at,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    #[async_trait]
    impl CameraDevice for FakeDevice {
        fn descriptor(&self) -> &CameraDescriptor {
            &self.descriptor
        }

        async fn capture(&self) -> Result<CapturedFrame, CameraError> {
            let taken = {
                let mut captures = self.counters.captures.lock().unwrap();
                captures.push(Instant::now());
                captures.len()
            };
            if self.fail_capture_at == Some(taken) {
                return Err(CameraError::Capture("sensor timeout".to_string()));
            }
            Ok(CapturedFrame::from_bytes(b"\xFF\xD8fake", ImageFormat::Jpeg)?)
        }

        fn release(&self) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
