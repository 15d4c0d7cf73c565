use memolink_roll::RollDecoder;
use tracing::info;

use crate::cmd::{progress_printer, DumpArgs};
use crate::exit::{io_error, session_error, CliResult, SUCCESS};

pub fn run(args: DumpArgs) -> CliResult<i32> {
    let mut session = args.session.session(RollDecoder::new())?;
    let camera = session
        .init(progress_printer("connecting"))
        .map_err(|err| session_error("init failed", err))?;

    let raw = session
        .extract_payload(&camera.geometry, progress_printer("reading"))
        .map_err(|err| session_error("ring read failed", err))?;
    session.close(false);

    std::fs::write(&args.output, &raw).map_err(|err| {
        io_error(&format!("write {}", args.output.display()), err)
    })?;
    info!(
        bytes = raw.len(),
        frame_size = camera.geometry.frame_size(),
        path = %args.output.display(),
        "ring dump written"
    );
    Ok(SUCCESS)
}
