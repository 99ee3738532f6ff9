pub mod capture;
pub mod logging;
pub mod server;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

pub const CMD_STATUS: &str = "status";
pub const CMD_REGISTER: &str = "register";
pub const CMD_LOGIN: &str = "login";
pub const CMD_WHOAMI: &str = "whoami";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_FORGET: &str = "forget";
pub const CMD_ADMIN: &str = "admin";
pub const CMD_CLEAR_DB: &str = "clear-db";

pub const ARG_NAME: &str = "name";
pub const ARG_PHONE: &str = "phone";
pub const ARG_IMAGE: &str = "image";
pub const ARG_FRAMES_DIR: &str = "frames-dir";

fn register() -> Command {
    Command::new(CMD_REGISTER)
        .about("Enroll a new user from a face image")
        .arg(
            Arg::new(ARG_NAME)
                .short('n')
                .long("name")
                .help("Display name, 2 to 100 characters")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PHONE)
                .short('p')
                .long("phone")
                .help("Phone number, example: +15550000")
                .required(true),
        )
        .arg(
            Arg::new(ARG_IMAGE)
                .short('i')
                .long("image")
                .help("Face image (JPEG or PNG), or a directory holding one")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

fn login() -> Command {
    let command = Command::new(CMD_LOGIN)
        .about("Log in with a liveness capture")
        .arg(
            Arg::new(ARG_NAME)
                .short('n')
                .long("name")
                .help("Display name (default: the last authenticated user)"),
        )
        .arg(
            Arg::new(ARG_FRAMES_DIR)
                .short('f')
                .long("frames-dir")
                .help("Directory of face images replayed as camera frames")
                .env("FACEGATE_FRAMES_DIR")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        );

    capture::with_args(command)
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("facegate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new(CMD_STATUS).about("Restore the session and print its status"))
        .subcommand(register())
        .subcommand(login())
        .subcommand(Command::new(CMD_WHOAMI).about("Fetch the current user profile"))
        .subcommand(Command::new(CMD_LOGOUT).about("Remove tokens and the saved user"))
        .subcommand(
            Command::new(CMD_FORGET).about("Forget the saved user of an expired session"),
        )
        .subcommand(
            Command::new(CMD_ADMIN)
                .about("Administrative commands")
                .subcommand_required(true)
                .subcommand(
                    Command::new(CMD_CLEAR_DB).about("Delete every enrolled user on the server"),
                ),
        );

    let command = server::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "http://localhost:8000/api/v1";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "facegate");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        assert!(command.get_subcommands().any(|c| c.get_name() == CMD_LOGIN));
    }

    #[test]
    fn test_check_register() {
        temp_env::with_vars([("FACEGATE_SERVER_URL", None::<String>)], || {
            let matches = new().get_matches_from(vec![
                "facegate",
                "--server-url",
                URL,
                "register",
                "--name",
                "Alice",
                "--phone",
                "+15550000",
                "--image",
                "/tmp/alice.jpg",
            ]);

            assert_eq!(
                matches.get_one::<String>(server::ARG_SERVER_URL).cloned(),
                Some(URL.to_string())
            );
            let (name, sub) = matches.subcommand().unwrap();
            assert_eq!(name, CMD_REGISTER);
            assert_eq!(
                sub.get_one::<String>(ARG_NAME).cloned(),
                Some("Alice".to_string())
            );
            assert_eq!(
                sub.get_one::<String>(ARG_PHONE).cloned(),
                Some("+15550000".to_string())
            );
            assert_eq!(
                sub.get_one::<PathBuf>(ARG_IMAGE).cloned(),
                Some(PathBuf::from("/tmp/alice.jpg"))
            );
        });
    }

    #[test]
    fn test_check_login_defaults() {
        temp_env::with_vars(
            [
                ("FACEGATE_SERVER_URL", Some(URL)),
                ("FACEGATE_FRAMES_DIR", Some("/tmp/frames")),
                ("FACEGATE_FRAMES", None),
                ("FACEGATE_FRAME_INTERVAL_MS", None),
                ("FACEGATE_START_DELAY_MS", None),
                ("FACEGATE_ATTEMPTS", None),
            ],
            || {
                let matches = new().get_matches_from(vec!["facegate", "login"]);
                let (name, sub) = matches.subcommand().unwrap();
                assert_eq!(name, CMD_LOGIN);
                assert_eq!(sub.get_one::<String>(ARG_NAME), None);
                assert_eq!(
                    sub.get_one::<PathBuf>(ARG_FRAMES_DIR).cloned(),
                    Some(PathBuf::from("/tmp/frames"))
                );
                assert_eq!(sub.get_one::<u8>(capture::ARG_FRAMES).copied(), Some(3));
                assert_eq!(
                    sub.get_one::<u64>(capture::ARG_FRAME_INTERVAL_MS).copied(),
                    Some(400)
                );
                assert_eq!(
                    sub.get_one::<u64>(capture::ARG_START_DELAY_MS).copied(),
                    Some(800)
                );
                assert_eq!(sub.get_one::<u8>(capture::ARG_ATTEMPTS).copied(), Some(1));
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("FACEGATE_SERVER_URL", Some(URL)),
                ("FACEGATE_STORE_DIR", Some("/tmp/facegate")),
                ("FACEGATE_LOG_LEVEL", Some("info")),
                ("FACEGATE_LOG_FORMAT", Some("json")),
            ],
            || {
                let matches = new().get_matches_from(vec!["facegate", "status"]);
                assert_eq!(
                    matches.get_one::<String>(server::ARG_SERVER_URL).cloned(),
                    Some(URL.to_string())
                );
                assert_eq!(
                    matches.get_one::<PathBuf>(server::ARG_STORE_DIR).cloned(),
                    Some(PathBuf::from("/tmp/facegate"))
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
                assert_eq!(
                    matches
                        .get_one::<String>(logging::ARG_LOG_FORMAT)
                        .map(String::as_str),
                    Some("json")
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // every level name maps onto a -v count
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("FACEGATE_LOG_LEVEL", Some(level)),
                    ("FACEGATE_SERVER_URL", Some(URL)),
                ],
                || {
                    let matches = new().get_matches_from(vec!["facegate", "whoami"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // every level name maps onto a -v count
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("FACEGATE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "facegate".to_string(),
                    "--server-url".to_string(),
                    URL.to_string(),
                    "logout".to_string(),
                ];

                // -v is global, so it is accepted after the subcommand too
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_missing_arguments() {
        temp_env::with_vars(
            [
                ("FACEGATE_SERVER_URL", None::<&str>),
                ("FACEGATE_FRAMES_DIR", None),
            ],
            || {
                let result = new().try_get_matches_from(vec!["facegate", "status"]);
                assert_eq!(
                    result.map_err(|e| e.kind()).err(),
                    Some(clap::error::ErrorKind::MissingRequiredArgument)
                );

                let result =
                    new().try_get_matches_from(vec!["facegate", "--server-url", URL, "login"]);
                assert_eq!(
                    result.map_err(|e| e.kind()).err(),
                    Some(clap::error::ErrorKind::MissingRequiredArgument)
                );
            },
        );
    }

    #[test]
    fn test_frames_out_of_range() {
        temp_env::with_vars([("FACEGATE_FRAMES", None::<&str>)], || {
            let result = new().try_get_matches_from(vec![
                "facegate",
                "--server-url",
                URL,
                "login",
                "--frames-dir",
                "/tmp/frames",
                "--frames",
                "0",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ValueValidation)
            );
        });
    }

    #[test]
    fn test_admin_requires_subcommand() {
        let result = new().try_get_matches_from(vec!["facegate", "--server-url", URL, "admin"]);
        assert!(result.is_err());

        let matches = new().get_matches_from(vec![
            "facegate",
            "--server-url",
            URL,
            "admin",
            "clear-db",
        ]);
        let admin = matches.subcommand_matches(CMD_ADMIN);
        assert!(admin.is_some_and(|m| m.subcommand_name() == Some(CMD_CLEAR_DB)));
    }
}
