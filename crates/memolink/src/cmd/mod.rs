use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use memolink_roll::{RawLookup, RollDecoder};
use memolink_session::{MemoryMap, Session, SessionConfig, StorageMode};
use memolink_transport::{SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod download;
pub mod dump;
pub mod info;
pub mod list;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports on this host.
    List,
    /// Identify the camera and print its counters and memo layout.
    Info(InfoArgs),
    /// Download and decode every roll stored in the camera.
    Download(DownloadArgs),
    /// Save the raw ring contents to a file.
    Dump(DumpArgs),
    /// Decode a raw ring dump offline.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::List => list::run(format),
        Command::Info(args) => info::run(args, format),
        Command::Download(args) => download::run(args, format),
        Command::Dump(args) => dump::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Serial port the memo holder is attached to (e.g. /dev/ttyUSB0, COM3).
    #[arg(env = "MEMOLINK_PORT")]
    pub port: String,
    /// Baud rate the camera listens on after wake-up.
    #[arg(long, env = "MEMOLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Read timeout, also the deadline of one multi-chunk read (e.g. 2s, 500ms).
    #[arg(long, env = "MEMOLINK_TIMEOUT", default_value = "2s")]
    pub timeout: String,
    /// Pause after wake-up and speed changes.
    #[arg(long, env = "MEMOLINK_SETTLE", default_value = "200ms")]
    pub settle: String,
    /// Stay at the wake-up baud rate instead of switching to 9600.
    #[arg(long)]
    pub low_speed: bool,
    #[command(flatten)]
    pub memory_map: MemoryMapArgs,
}

/// Overrides for camera register addresses (hex with 0x, or decimal).
#[derive(Args, Debug, Default)]
pub struct MemoryMapArgs {
    #[arg(long, value_name = "ADDR", value_parser = parse_address, env = "MEMOLINK_TOTAL_SHOTS_ADDR")]
    pub total_shots_addr: Option<u16>,
    #[arg(long, value_name = "ADDR", value_parser = parse_address, env = "MEMOLINK_ROLL_NUMBER_ADDR")]
    pub roll_number_addr: Option<u16>,
    #[arg(long, value_name = "ADDR", value_parser = parse_address, env = "MEMOLINK_FRAME_NUMBER_ADDR")]
    pub frame_number_addr: Option<u16>,
    #[arg(long, value_name = "ADDR", value_parser = parse_address, env = "MEMOLINK_RING_BOUNDS_ADDR")]
    pub ring_bounds_addr: Option<u16>,
    #[arg(long, value_name = "ADDR", value_parser = parse_address, env = "MEMOLINK_MEMO_SETTINGS_ADDR")]
    pub memo_settings_addr: Option<u16>,
}

impl MemoryMapArgs {
    pub fn apply(&self, base: MemoryMap) -> MemoryMap {
        MemoryMap {
            total_shots_addr: self.total_shots_addr.unwrap_or(base.total_shots_addr),
            roll_number_addr: self.roll_number_addr.unwrap_or(base.roll_number_addr),
            frame_number_addr: self.frame_number_addr.unwrap_or(base.frame_number_addr),
            ring_bounds_addr: self.ring_bounds_addr.unwrap_or(base.ring_bounds_addr),
            memo_settings_addr: self.memo_settings_addr.unwrap_or(base.memo_settings_addr),
        }
    }
}

impl SessionArgs {
    pub fn serial_config(&self) -> CliResult<SerialConfig> {
        Ok(SerialConfig {
            port: self.port.clone(),
            baud_rate: self.baud,
            timeout: parse_timeout(&self.timeout)?,
        })
    }

    pub fn session_config(&self, decoder: RollDecoder) -> CliResult<SessionConfig> {
        Ok(SessionConfig {
            memory_map: self.memory_map.apply(MemoryMap::default()),
            settle_delay: parse_duration(&self.settle)?,
            high_speed: !self.low_speed,
            decoder,
        })
    }

    /// Build a closed session over the configured serial port.
    pub fn session(&self, decoder: RollDecoder) -> CliResult<Session<SerialTransport>> {
        let transport = SerialTransport::new(self.serial_config()?);
        Ok(Session::with_config(transport, self.session_config(decoder)?))
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[command(flatten)]
    pub decoder: DecoderArgs,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// File to write the ring contents to.
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw ring dump (as written by `dump`).
    pub file: PathBuf,
    /// Record width in bytes: 2 minimum, 4 intermediate, 6 maximum.
    #[arg(long, value_name = "BYTES", default_value = "4")]
    pub frame_size: FrameSize,
    #[command(flatten)]
    pub decoder: DecoderArgs,
}

/// Record widths of the camera's storage modes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FrameSize {
    #[value(name = "2", alias = "minimum")]
    Minimum,
    #[value(name = "4", alias = "intermediate")]
    Intermediate,
    #[value(name = "6", alias = "maximum")]
    Maximum,
}

impl From<FrameSize> for StorageMode {
    fn from(size: FrameSize) -> Self {
        match size {
            FrameSize::Minimum => StorageMode::Minimum,
            FrameSize::Intermediate => StorageMode::Intermediate,
            FrameSize::Maximum => StorageMode::Maximum,
        }
    }
}

impl FrameSize {
    pub fn bytes(self) -> usize {
        StorageMode::from(self).frame_size()
    }
}

#[derive(Args, Debug, Default)]
pub struct DecoderArgs {
    /// Print raw setting codes instead of readable values.
    #[arg(long)]
    pub raw_lookup: bool,
    /// Camera make written to each frame.
    #[arg(long)]
    pub make: Option<String>,
    /// Camera model written to each frame. A live download uses the model
    /// the camera reports instead.
    #[arg(long)]
    pub model: Option<String>,
}

impl DecoderArgs {
    pub fn decoder(&self) -> RollDecoder {
        let mut decoder = if self.raw_lookup {
            RollDecoder::with_lookup(std::sync::Arc::new(RawLookup))
        } else {
            RollDecoder::new()
        };
        if let Some(make) = &self.make {
            decoder = decoder.make(make.as_str());
        }
        if let Some(model) = &self.model {
            decoder = decoder.model(model.as_str());
        }
        decoder
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_address(input: &str) -> Result<u16, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid address (expected 0x0000-0xFFFF): {input}"))
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let timeout = parse_duration(input)?;
    if timeout.is_zero() {
        return Err(CliError::usage("timeout must be greater than zero"));
    }
    Ok(timeout)
}

/// Progress reporter for stderr; silent when stderr is not a terminal.
pub fn progress_printer(label: &'static str) -> impl FnMut(u8) {
    use std::io::{IsTerminal, Write};

    let enabled = std::io::stderr().is_terminal();
    move |percent| {
        if !enabled {
            return;
        }
        let mut err = std::io::stderr();
        let _ = write!(err, "\r{label}: {percent:>3}%");
        if percent >= 100 {
            let _ = writeln!(err);
        }
        let _ = err.flush();
    }
}
