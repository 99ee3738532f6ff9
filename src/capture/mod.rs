//! Camera-driven capture flow for enrollment and liveness verification.
//!
//! ```text
//! Initializing ──▶ Scanning ──▶ Verifying ──▶ Success
//!      │              │             │
//!      └──────────────┴─────────────┴──▶ Failed ──retry──▶ Scanning
//! ```
//!
//! The orchestrator owns the camera from the first `run` until it is disposed
//! or dropped. Disposal is synchronous: it releases the camera even while a
//! capture or the verifier is pending, and a verification result arriving
//! afterwards is discarded.

pub mod camera;
pub mod directory;
pub mod settings;

pub use camera::{
    CameraDescriptor, CameraDevice, CameraError, CameraLease, CameraProvider, LensFacing,
};
pub use directory::DirectoryCamera;
pub use settings::CaptureSettings;

use crate::frame::CapturedFrame;
use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Initializing,
    Scanning,
    Verifying,
    Success,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    /// One still frame for registration.
    Enrollment,
    /// A timed sequence of frames for login.
    Liveness,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed,
    Failed(String),
    /// The flow was disposed before it finished.
    Disposed,
    /// The call is not valid in the current state.
    Rejected,
}

/// Scanning stopped before frames were handed over.
enum Interrupted {
    Disposed,
    Camera(CameraError),
}

struct Shared {
    state: watch::Sender<CaptureState>,
    failure: Mutex<Option<String>>,
    lease: Mutex<Option<Arc<CameraLease>>>,
    disposed: AtomicBool,
    cancel: watch::Sender<bool>,
}

impl Shared {
    fn lease(&self) -> MutexGuard<'_, Option<Arc<CameraLease>>> {
        self.lease.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failure(&self) -> MutexGuard<'_, Option<String>> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.send_replace(true);
        if let Some(lease) = self.lease().take() {
            lease.release();
        }
        debug!("capture flow disposed");
    }
}

/// Cloneable handle used to observe or dispose a running flow.
#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<Shared>,
}

impl CaptureHandle {
    /// Releases the camera now. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    #[must_use]
    pub fn state(&self) -> CaptureState {
        *self.shared.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }
}

pub struct CaptureOrchestrator {
    provider: Arc<dyn CameraProvider>,
    mode: CaptureMode,
    settings: CaptureSettings,
    shared: Arc<Shared>,
}

impl CaptureOrchestrator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        mode: CaptureMode,
        settings: CaptureSettings,
    ) -> Self {
        let (state, _) = watch::channel(CaptureState::Initializing);
        let (cancel, _) = watch::channel(false);

        Self {
            provider,
            mode,
            settings,
            shared: Arc::new(Shared {
                state,
                failure: Mutex::new(None),
                lease: Mutex::new(None),
                disposed: AtomicBool::new(false),
                cancel,
            }),
        }
    }

    #[must_use]
    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    #[must_use]
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    #[must_use]
    pub fn state(&self) -> CaptureState {
        *self.shared.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.shared.state.subscribe()
    }

    /// Detail of the last failure while in `Failed`.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.shared.failure().clone()
    }

    pub fn dispose(&self) {
        self.shared.dispose();
    }

    /// Acquires the camera, captures, and hands the frames to `verify`.
    ///
    /// Only valid from `Initializing`.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn run<F, Fut>(&mut self, verify: F) -> CaptureOutcome
    where
        F: FnOnce(Vec<CapturedFrame>) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        if self.shared.is_disposed() {
            return CaptureOutcome::Disposed;
        }
        if self.state() != CaptureState::Initializing {
            return CaptureOutcome::Rejected;
        }

        if let Err(interrupted) = self.ensure_camera().await {
            return self.interrupted(interrupted);
        }

        self.scan_and_verify(verify).await
    }

    /// Starts over after a failure, re-acquiring the camera if needed.
    ///
    /// Only valid from `Failed`.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn retry<F, Fut>(&mut self, verify: F) -> CaptureOutcome
    where
        F: FnOnce(Vec<CapturedFrame>) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        if self.shared.is_disposed() {
            return CaptureOutcome::Disposed;
        }
        if self.state() != CaptureState::Failed {
            return CaptureOutcome::Rejected;
        }

        if self.pause(self.settings.restart_delay).await.is_err() {
            return CaptureOutcome::Disposed;
        }
        if let Err(interrupted) = self.ensure_camera().await {
            return self.interrupted(interrupted);
        }

        self.scan_and_verify(verify).await
    }

    async fn scan_and_verify<F, Fut>(&mut self, verify: F) -> CaptureOutcome
    where
        F: FnOnce(Vec<CapturedFrame>) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        *self.shared.failure() = None;
        self.set_state(CaptureState::Scanning);

        let frames = match self.scan().await {
            Ok(frames) => frames,
            Err(interrupted) => return self.interrupted(interrupted),
        };

        self.set_state(CaptureState::Verifying);
        debug!(frames = frames.len(), "verifying");
        let result = verify(frames).await;

        if self.shared.is_disposed() {
            debug!("flow disposed during verification, discarding result");
            return CaptureOutcome::Disposed;
        }

        match result {
            Ok(()) => {
                info!("capture verified");
                self.set_state(CaptureState::Success);
                // The result stands even if the flow is disposed while exiting.
                let _ = self.pause(self.settings.exit_delay).await;
                CaptureOutcome::Completed
            }
            Err(detail) => {
                debug!(%detail, "verification rejected");
                self.fail(detail.clone());
                CaptureOutcome::Failed(detail)
            }
        }
    }

    async fn scan(&self) -> Result<Vec<CapturedFrame>, Interrupted> {
        let mut frames = Vec::new();

        match self.mode {
            CaptureMode::Enrollment => {
                self.pause(self.settings.enrollment_settle).await?;
                frames.push(self.capture().await?);
                self.pause(self.settings.enrollment_hold).await?;
            }
            CaptureMode::Liveness => {
                self.pause(self.settings.start_delay).await?;
                for index in 0..self.settings.liveness_frames {
                    if index > 0 {
                        self.pause(self.settings.frame_interval).await?;
                    }
                    frames.push(self.capture().await?);
                }
            }
        }

        Ok(frames)
    }

    async fn capture(&self) -> Result<CapturedFrame, Interrupted> {
        let lease = self
            .shared
            .lease()
            .clone()
            .ok_or(Interrupted::Disposed)?;
        let mut cancelled = self.shared.cancel.subscribe();

        tokio::select! {
            frame = lease.capture() => frame.map_err(|err| {
                if self.shared.is_disposed() {
                    Interrupted::Disposed
                } else {
                    Interrupted::Camera(err)
                }
            }),
            _ = cancelled.wait_for(|disposed| *disposed) => Err(Interrupted::Disposed),
        }
    }

    async fn pause(&self, duration: Duration) -> Result<(), Interrupted> {
        if duration.is_zero() {
            return if self.shared.is_disposed() {
                Err(Interrupted::Disposed)
            } else {
                Ok(())
            };
        }

        let mut cancelled = self.shared.cancel.subscribe();
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            _ = cancelled.wait_for(|disposed| *disposed) => Err(Interrupted::Disposed),
        }
    }

    /// Makes sure a live lease is held.
    async fn ensure_camera(&self) -> Result<(), Interrupted> {
        let held = self
            .shared
            .lease()
            .as_ref()
            .is_some_and(|lease| !lease.is_released());
        if held {
            return Ok(());
        }

        let lease = CameraLease::acquire(self.provider.as_ref())
            .await
            .map_err(Interrupted::Camera)?;

        let mut slot = self.shared.lease();
        if self.shared.is_disposed() {
            drop(slot);
            lease.release();
            return Err(Interrupted::Disposed);
        }
        *slot = Some(Arc::new(lease));

        Ok(())
    }

    fn interrupted(&self, interrupted: Interrupted) -> CaptureOutcome {
        match interrupted {
            Interrupted::Disposed => CaptureOutcome::Disposed,
            Interrupted::Camera(err) => {
                warn!(error = %err, "capture aborted");
                let detail = camera_message(&err);
                self.fail(detail.clone());
                CaptureOutcome::Failed(detail)
            }
        }
    }

    fn fail(&self, detail: String) {
        *self.shared.failure() = Some(detail);
        self.set_state(CaptureState::Failed);
    }

    fn set_state(&self, state: CaptureState) {
        if self.shared.is_disposed() {
            return;
        }
        debug!(?state, "capture state");
        self.shared.state.send_replace(state);
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl std::fmt::Debug for CaptureOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureOrchestrator")
            .field("mode", &self.mode)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn camera_message(err: &CameraError) -> String {
    match err {
        CameraError::NotFound => "No camera found.".to_string(),
        CameraError::PermissionDenied(_) => "Camera permission denied.".to_string(),
        CameraError::Busy(_) => "The camera is in use by another flow.".to_string(),
        CameraError::Released => "The camera was released.".to_string(),
        CameraError::Capture(detail) => format!("Capture failed: {detail}"),
        CameraError::Io(err) => format!("Camera error: {err}"),
    }
}
