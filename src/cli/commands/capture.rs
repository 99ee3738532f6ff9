use crate::capture::CaptureSettings;
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_FRAMES: &str = "frames";
pub const ARG_FRAME_INTERVAL_MS: &str = "frame-interval-ms";
pub const ARG_START_DELAY_MS: &str = "start-delay-ms";
pub const ARG_ATTEMPTS: &str = "attempts";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    pub settings: CaptureSettings,
    pub attempts: u8,
}

impl Options {
    /// Parse liveness capture arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a numeric argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_u64 = |id: &str| {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let frames = matches
            .get_one::<u8>(ARG_FRAMES)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_FRAMES}"))?;

        let settings = CaptureSettings::default()
            .with_liveness_frames(usize::from(frames))
            .with_frame_interval(Duration::from_millis(get_u64(ARG_FRAME_INTERVAL_MS)?))
            .with_start_delay(Duration::from_millis(get_u64(ARG_START_DELAY_MS)?));

        Ok(Self {
            settings,
            attempts: matches.get_one::<u8>(ARG_ATTEMPTS).copied().unwrap_or(1),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRAMES)
                .long("frames")
                .help("Number of liveness frames to capture")
                .env("FACEGATE_FRAMES")
                .default_value("3")
                .value_parser(clap::value_parser!(u8).range(1..=10)),
        )
        .arg(
            Arg::new(ARG_FRAME_INTERVAL_MS)
                .long("frame-interval-ms")
                .help("Delay between liveness frames in milliseconds")
                .env("FACEGATE_FRAME_INTERVAL_MS")
                .default_value("400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_START_DELAY_MS)
                .long("start-delay-ms")
                .help("Delay before the first liveness frame in milliseconds")
                .env("FACEGATE_START_DELAY_MS")
                .default_value("800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_ATTEMPTS)
                .long("attempts")
                .help("How many times to capture and verify before giving up")
                .env("FACEGATE_ATTEMPTS")
                .default_value("1")
                .value_parser(clap::value_parser!(u8).range(1..=5)),
        )
}
