use crate::{
    api,
    capture::{CaptureMode, CaptureOrchestrator, CaptureOutcome, CaptureSettings, DirectoryCamera},
    cli::{
        actions::session::render,
        globals::{Connection, GlobalArgs},
    },
    frame::CapturedFrame,
    session::SessionManager,
};
use anyhow::{Result, anyhow, bail};
use std::{future::Future, path::PathBuf, sync::Arc};
use tracing::{info, warn};

#[derive(Debug)]
pub struct RegisterArgs {
    pub connection: Connection,
    pub name: String,
    pub phone: String,
    pub image: PathBuf,
    pub settings: CaptureSettings,
}

#[derive(Debug)]
pub struct LoginArgs {
    pub connection: Connection,
    pub name: Option<String>,
    pub frames_dir: PathBuf,
    pub settings: CaptureSettings,
    pub attempts: u8,
}

/// Enroll a new user from a still image.
/// # Errors
/// Returns an error if the input is invalid, someone is already signed in, or
/// the capture or registration fails.
pub async fn register(args: RegisterArgs) -> Result<()> {
    let name = api::validate_name(&args.name).map_err(|err| anyhow!(err.user_message()))?;
    let phone = api::validate_phone(&args.phone).map_err(|err| anyhow!(err.user_message()))?;

    let globals = GlobalArgs::new(&args.connection)?;
    let session = globals.session.clone();
    ready_to_authenticate(&session).await?;

    let camera = Arc::new(DirectoryCamera::new(&args.image));
    let mut flow = CaptureOrchestrator::new(camera, CaptureMode::Enrollment, args.settings);

    let outcome = drive(&mut flow, 1, || {
        let session = session.clone();
        let name = name.clone();
        let phone = phone.clone();
        move |frames: Vec<CapturedFrame>| async move {
            let Some(image) = frames.into_iter().next() else {
                return Err("No frame was captured.".to_string());
            };
            if session.register_with_face(&name, &phone, image).await {
                Ok(())
            } else {
                Err(rejection(&session))
            }
        }
    })
    .await;

    finish(&session, outcome, "registration")
}

/// Sign in with a liveness capture, retrying up to `attempts` times.
/// # Errors
/// Returns an error if no display name is known, someone is already signed
/// in, or every attempt fails.
pub async fn login(args: LoginArgs) -> Result<()> {
    let globals = GlobalArgs::new(&args.connection)?;
    let session = globals.session.clone();
    ready_to_authenticate(&session).await?;

    let name = match args.name.or_else(|| session.snapshot().saved_username) {
        Some(name) => api::validate_name(&name).map_err(|err| anyhow!(err.user_message()))?,
        None => bail!("no saved user, pass --name"),
    };
    info!(name = %name, attempts = args.attempts, "starting liveness login");

    let camera = Arc::new(DirectoryCamera::new(&args.frames_dir));
    let mut flow = CaptureOrchestrator::new(camera, CaptureMode::Liveness, args.settings);

    let outcome = drive(&mut flow, args.attempts, || {
        let session = session.clone();
        let name = name.clone();
        move |frames: Vec<CapturedFrame>| async move {
            if session.login_face(&name, frames).await {
                Ok(())
            } else {
                Err(rejection(&session))
            }
        }
    })
    .await;

    finish(&session, outcome, "login")
}

async fn ready_to_authenticate(session: &SessionManager) -> Result<()> {
    if session.bootstrap().await {
        let name = session
            .snapshot()
            .profile
            .map(|profile| profile.name)
            .unwrap_or_default();
        bail!("already signed in as {name}, run `facegate logout` first");
    }
    if !session.status().can_authenticate() {
        bail!("session unavailable: {}", rejection(session));
    }
    Ok(())
}

/// Runs the flow, then retries while it keeps failing. Ctrl-C disposes the
/// flow, which releases the camera and discards any pending result.
async fn drive<M, V, Fut>(
    flow: &mut CaptureOrchestrator,
    attempts: u8,
    make_verifier: M,
) -> CaptureOutcome
where
    M: Fn() -> V,
    V: FnOnce(Vec<CapturedFrame>) -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    let handle = flow.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, releasing camera");
            handle.dispose();
        }
    });

    let mut states = flow.subscribe();
    let progress = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!(?state, "capture");
        }
    });

    let mut outcome = flow.run(make_verifier()).await;
    let mut attempt = 1;
    while let CaptureOutcome::Failed(detail) = &outcome {
        if attempt >= attempts {
            break;
        }
        attempt += 1;
        warn!(attempt, %detail, "capture failed, trying again");
        outcome = flow.retry(make_verifier()).await;
    }

    flow.dispose();
    interrupt.abort();
    progress.abort();
    outcome
}

fn rejection(session: &SessionManager) -> String {
    session
        .snapshot()
        .error
        .unwrap_or_else(|| "Verification failed.".to_string())
}

fn finish(session: &SessionManager, outcome: CaptureOutcome, operation: &str) -> Result<()> {
    match outcome {
        CaptureOutcome::Completed => {
            print!("{}", render(&session.snapshot()));
            Ok(())
        }
        CaptureOutcome::Failed(detail) => bail!("{operation} failed: {detail}"),
        CaptureOutcome::Disposed => bail!("{operation} cancelled"),
        CaptureOutcome::Rejected => bail!("{operation} could not start"),
    }
}
