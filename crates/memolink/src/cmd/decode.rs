use tracing::{info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::{print_rolls, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = std::fs::read(&args.file)
        .map_err(|err| io_error(&format!("read {}", args.file.display()), err))?;

    let decoder = args.decoder.decoder();
    let rolls = decoder.decode_rolls(&raw, args.frame_size.bytes());
    if rolls.is_empty() && !raw.is_empty() {
        warn!(bytes = raw.len(), "no rolls found in dump");
    }
    info!(rolls = rolls.len(), "dump decoded");

    print_rolls(&rolls, format);
    Ok(SUCCESS)
}
