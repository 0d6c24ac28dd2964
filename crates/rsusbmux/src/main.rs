mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rsusbmux", version, about = "usbmux device tunnel CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devices_subcommand() {
        let cli = Cli::try_parse_from([
            "rsusbmux",
            "devices",
            "--socket-path",
            "/tmp/muxd.sock",
            "--settle",
            "100ms",
        ])
        .expect("devices args should parse");

        assert!(matches!(cli.command, Command::Devices(_)));
    }

    #[test]
    fn parses_tunnel_subcommand_with_port() {
        let cli = Cli::try_parse_from(["rsusbmux", "tunnel", "--port", "5000", "--device", "3"])
            .expect("tunnel args should parse");

        match cli.command {
            Command::Tunnel(args) => {
                assert_eq!(args.port, 5000);
                assert_eq!(args.device, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tunnel_requires_a_port() {
        let err = Cli::try_parse_from(["rsusbmux", "tunnel"])
            .expect_err("tunnel without --port should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_global_format_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["rsusbmux", "watch", "--format", "json"])
            .expect("watch args should parse");
        assert!(matches!(cli.command, Command::Watch(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
