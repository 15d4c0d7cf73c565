use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memolink_roll::Roll;
use memolink_session::{Camera, Event, Request, Response};
use memolink_transport::CloseHandle;
use tracing::{debug, info};

use crate::cmd::{progress_printer, DownloadArgs};
use crate::exit::{kind_code, session_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_rolls, OutputFormat};

const EVENT_POLL: Duration = Duration::from_millis(250);

pub fn run(args: DownloadArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.session.session(args.decoder.decoder())?;

    let cancelled = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(session.close_handle(), cancelled.clone())?;

    let camera = Camera::spawn(session).map_err(|err| session_error("worker start failed", err))?;
    camera
        .send(Request::Init)
        .and_then(|()| camera.send(Request::DownloadRolls))
        .map_err(|err| session_error("request failed", err))?;

    let rolls = wait_for_rolls(&camera, &cancelled)?;
    let _ = camera.send(Request::Close { force: false });
    drop(camera);

    print_rolls(&rolls, format);
    Ok(SUCCESS)
}

fn wait_for_rolls(camera: &Camera, cancelled: &AtomicBool) -> CliResult<Vec<Roll>> {
    let mut connecting = progress_printer("connecting");
    let mut reading = progress_printer("reading");
    let mut initialised = false;

    loop {
        let event = camera
            .recv_timeout(EVENT_POLL)
            .map_err(|err| session_error("worker stopped", err))?;
        match event {
            None => {
                // A Ctrl-C that lands before the port opens is undone by the open.
                if cancelled.load(Ordering::SeqCst) {
                    camera.cancel();
                }
                continue;
            }
            Some(Event::Progress { percent }) if initialised => reading(percent),
            Some(Event::Progress { percent }) => connecting(percent),
            Some(Event::Response { response }) => match response {
                Response::RollData(rolls) => return Ok(rolls),
                Response::CurrentRoll(current) => {
                    initialised = true;
                    debug!(roll = current.roll, frame = current.frame, "current roll");
                }
                Response::Model(model) => info!(%model, "camera identified"),
                Response::TotalShots(total) => info!(total_shots = total, "shutter count"),
                Response::MemoryInfo(geometry) => info!(
                    bytes_used = geometry.bytes_used(),
                    frame_size = geometry.frame_size(),
                    "memo ring"
                ),
                Response::PortOpened | Response::PortClosed => {}
            },
            Some(Event::Error { kind, message }) => {
                if cancelled.load(Ordering::SeqCst) {
                    return Err(CliError::new(FAILURE, "download cancelled"));
                }
                return Err(CliError::new(
                    kind_code(kind),
                    format!("download failed: {message}"),
                ));
            }
        }
    }
}

fn install_ctrlc_handler(link: CloseHandle, cancelled: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        cancelled.store(true, Ordering::SeqCst);
        link.close();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
