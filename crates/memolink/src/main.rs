mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "memolink",
    version,
    about = "Download exposure records from Nikon F90/F90X memo holders"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", env = "MEMOLINK_FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "MEMOLINK_LOG",
        default_value = "warn",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
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
    fn parses_download_with_session_flags() {
        let cli = Cli::try_parse_from([
            "memolink",
            "download",
            "/dev/ttyUSB0",
            "--timeout",
            "3s",
            "--ring-bounds-addr",
            "0xFE00",
            "--raw-lookup",
        ])
        .expect("download args should parse");

        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.session.port, "/dev/ttyUSB0");
        assert_eq!(args.session.memory_map.ring_bounds_addr, Some(0xFE00));
        assert!(args.decoder.raw_lookup);
    }

    #[test]
    fn rejects_bad_address() {
        let err = Cli::try_parse_from(["memolink", "info", "COM3", "--total-shots-addr", "zz"])
            .expect_err("bad address should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn decode_rejects_unknown_frame_size() {
        let err = Cli::try_parse_from(["memolink", "decode", "ring.bin", "--frame-size", "8"])
            .expect_err("frame size 8 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn decode_rejects_odd_frame_sizes() {
        for size in ["3", "5"] {
            let err = Cli::try_parse_from(["memolink", "decode", "ring.bin", "--frame-size", size])
                .expect_err("odd frame size should fail");
            assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
        }
        let cli = Cli::try_parse_from(["memolink", "decode", "ring.bin", "--frame-size", "6"])
            .expect("frame size 6 should parse");
        let Command::Decode(args) = cli.command else {
            panic!("expected decode");
        };
        assert_eq!(args.frame_size.bytes(), 6);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["memolink", "list", "--format", "json"])
            .expect("list args should parse");
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Command::List));
    }
}
