use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;
use tracing::Level;

/// `-v` count to level; errors only when no flag is given.
const fn verbosity_level(count: u8) -> Level {
    match count {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Parses the command line, installs logging and resolves the action to run.
///
/// # Errors
///
/// Returns an error if the log format is unknown, logging cannot be installed,
/// or the arguments do not map to an action.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let level = verbosity_level(
        matches
            .get_one::<u8>(commands::logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );

    let log_format = matches
        .get_one::<String>(commands::logging::ARG_LOG_FORMAT)
        .map_or(Ok(telemetry::LogFormat::default()), |value| value.parse())?;

    telemetry::init(level, log_format)?;

    dispatch::handler(&matches)
}
