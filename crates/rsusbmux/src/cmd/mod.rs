use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use rsusbmux_client::MuxConfig;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod devices;
pub mod doctor;
pub mod tunnel;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List currently attached devices.
    Devices(DevicesArgs),
    /// Stream attach/detach events.
    Watch(WatchArgs),
    /// Open a tunnel to a device port and pipe stdin/stdout through it.
    Tunnel(TunnelArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Devices(args) => devices::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Tunnel(args) => tunnel::run(args),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Daemon connection flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct MuxArgs {
    /// Daemon socket path (Unix-like platforms).
    #[arg(long, env = "USBMUX_SOCKET_PATH")]
    pub socket_path: Option<PathBuf>,

    /// Daemon TCP port on 127.0.0.1 (Windows).
    #[arg(long, env = "USBMUX_SOCKET_PORT")]
    pub socket_port: Option<u16>,

    /// Handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

impl MuxArgs {
    pub fn to_config(&self) -> CliResult<MuxConfig> {
        let mut config = MuxConfig::default();
        if let Some(path) = &self.socket_path {
            config.socket_path = path.clone();
        }
        if let Some(port) = self.socket_port {
            config.socket_port = port;
        }
        config.handshake_timeout = parse_duration(&self.timeout)?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct DevicesArgs {
    #[command(flatten)]
    pub mux: MuxArgs,

    /// Quiet period to wait for the device table to settle (e.g. 200ms).
    #[arg(long, default_value = "200ms")]
    pub settle: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub mux: MuxArgs,

    /// Emit synthetic attach events for devices already present.
    #[arg(long)]
    pub include_existing: bool,

    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct TunnelArgs {
    #[command(flatten)]
    pub mux: MuxArgs,

    /// Device port to connect to.
    #[arg(long, short = 'p')]
    pub port: u16,

    /// Specific device id. Default: first device that accepts the port.
    #[arg(long)]
    pub device: Option<u32>,

    /// Budget for waiting on a suitable device (e.g. 2s).
    #[arg(long, default_value = "2s")]
    pub max_wait: String,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub mux: MuxArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
