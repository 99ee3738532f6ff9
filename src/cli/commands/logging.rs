use clap::{Arg, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

/// Highest meaningful `-v` count; anything above still means trace.
pub const MAX_VERBOSITY: u8 = 4;

/// Accepts a level name or a `-v` count, so `FACEGATE_LOG_LEVEL=debug` and
/// `-vvv` mean the same thing.
#[must_use]
pub fn log_level_parser() -> ValueParser {
    ValueParser::from(|level: &str| -> Result<u8, String> {
        if let Ok(count) = level.parse::<u8>() {
            return if count <= MAX_VERBOSITY {
                Ok(count)
            } else {
                Err(format!("verbosity must be 0-{MAX_VERBOSITY}"))
            };
        }

        match level.to_ascii_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(MAX_VERBOSITY),
            other => Err(format!(
                "unknown log level `{other}`, expected error, warn, info, debug or trace"
            )),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help(
                    "Log more to stderr: -v warn, -vv info, -vvv debug, -vvvv trace. \
                     Only errors are logged by default",
                )
                .env("FACEGATE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(log_level_parser()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Log line format on stderr")
                .env("FACEGATE_LOG_FORMAT")
                .global(true)
                .default_value("pretty")
                .value_parser(["pretty", "json"]),
        )
}
