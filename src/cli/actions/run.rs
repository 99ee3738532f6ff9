use crate::cli::actions::{Action, capture, session};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Status(args) => session::status(args).await,
        Action::WhoAmI(args) => session::whoami(args).await,
        Action::Logout(args) => session::logout(args).await,
        Action::Forget(args) => session::forget(args).await,
        Action::ClearDatabase(args) => session::clear_database(args).await,
        Action::Register(args) => capture::register(args).await,
        Action::Login(args) => capture::login(args).await,
    }
}
