use memolink_roll::RollDecoder;

use crate::cmd::{progress_printer, InfoArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_camera_info, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.session.session(RollDecoder::new())?;
    let info = session
        .init(progress_printer("connecting"))
        .map_err(|err| session_error("init failed", err))?;
    session.close(false);

    print_camera_info(&info, format);
    Ok(SUCCESS)
}
