pub mod capture;
pub mod session;

// Internal "interpreter" for `Action`.
mod run;

#[derive(Debug)]
pub enum Action {
    Status(session::Args),
    WhoAmI(session::Args),
    Logout(session::Args),
    Forget(session::Args),
    ClearDatabase(session::Args),
    Register(capture::RegisterArgs),
    Login(capture::LoginArgs),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
