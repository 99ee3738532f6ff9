use crate::cli::globals::{Connection, StoreLocation};
use crate::credentials::EncryptedFileStorage;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_SERVER_URL: &str = "server-url";
pub const ARG_STORE_DIR: &str = "store-dir";
pub const ARG_MEMORY_STORE: &str = "memory-store";
#[cfg(feature = "keyring")]
pub const ARG_KEYRING: &str = "keyring";

impl Connection {
    /// Parse server and credential store arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the server URL is missing or no store directory can
    /// be determined.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let server_url = match matches.get_one::<String>(ARG_SERVER_URL) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_SERVER_URL}"),
        };

        #[cfg(feature = "keyring")]
        if matches.get_flag(ARG_KEYRING) {
            return Ok(Self {
                server_url,
                store: StoreLocation::Keyring,
            });
        }

        let store = if matches.get_flag(ARG_MEMORY_STORE) {
            StoreLocation::Memory
        } else {
            let dir = matches
                .get_one::<PathBuf>(ARG_STORE_DIR)
                .cloned()
                .or_else(EncryptedFileStorage::default_dir)
                .ok_or_else(|| {
                    anyhow::anyhow!("no data directory found, pass --{ARG_STORE_DIR}")
                })?;
            StoreLocation::Directory(dir)
        };

        Ok(Self { server_url, store })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(
            Arg::new(ARG_SERVER_URL)
                .short('s')
                .long("server-url")
                .help("Verification service base URL, example: http://localhost:8000/api/v1")
                .env("FACEGATE_SERVER_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_STORE_DIR)
                .long("store-dir")
                .help("Directory holding the encrypted credentials (default: per-user data dir)")
                .env("FACEGATE_STORE_DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_MEMORY_STORE)
                .long("memory-store")
                .help("Keep credentials in memory only; nothing is written to disk (overrides --store-dir)")
                .action(ArgAction::SetTrue),
        );

    #[cfg(feature = "keyring")]
    let command = command.arg(
        Arg::new(ARG_KEYRING)
            .long("keyring")
            .help("Store credentials in the OS keychain")
            .action(ArgAction::SetTrue)
            .conflicts_with(ARG_MEMORY_STORE),
    );

    command
}
