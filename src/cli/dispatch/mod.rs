use crate::{
    capture::CaptureSettings,
    cli::{
        actions::{
            Action,
            capture::{LoginArgs, RegisterArgs},
            session::Args,
        },
        commands::{self, capture::Options},
        globals::Connection,
    },
};
use anyhow::{Context, Result, bail};
use std::path::PathBuf;

fn required<T: Clone + Send + Sync + 'static>(matches: &clap::ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let connection = Connection::parse(matches)?;

    let action = match matches.subcommand() {
        Some((commands::CMD_STATUS, _)) => Action::Status(Args { connection }),
        Some((commands::CMD_WHOAMI, _)) => Action::WhoAmI(Args { connection }),
        Some((commands::CMD_LOGOUT, _)) => Action::Logout(Args { connection }),
        Some((commands::CMD_FORGET, _)) => Action::Forget(Args { connection }),
        Some((commands::CMD_ADMIN, admin)) => match admin.subcommand_name() {
            Some(commands::CMD_CLEAR_DB) => Action::ClearDatabase(Args { connection }),
            _ => bail!("unknown admin command"),
        },
        Some((commands::CMD_REGISTER, sub)) => Action::Register(RegisterArgs {
            connection,
            name: required::<String>(sub, commands::ARG_NAME)?,
            phone: required::<String>(sub, commands::ARG_PHONE)?,
            image: required::<PathBuf>(sub, commands::ARG_IMAGE)?,
            settings: CaptureSettings::default(),
        }),
        Some((commands::CMD_LOGIN, sub)) => {
            let options = Options::parse(sub)?;
            Action::Login(LoginArgs {
                connection,
                name: sub.get_one::<String>(commands::ARG_NAME).cloned(),
                frames_dir: required::<PathBuf>(sub, commands::ARG_FRAMES_DIR)?,
                settings: options.settings,
                attempts: options.attempts,
            })
        }
        _ => bail!("no command given, see --help"),
    };

    Ok(action)
}
