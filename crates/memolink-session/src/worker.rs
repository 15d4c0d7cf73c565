use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use memolink_transport::{CloseHandle, SerialLink, TransportError};
use tracing::{debug, error};

use crate::error::{Result, SessionError};
use crate::events::{Event, Response};
use crate::session::Session;

/// Work the camera worker can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Open, identify, switch speed and read counters and geometry.
    Init,
    QueryModel,
    TotalShots,
    Geometry,
    CurrentRoll,
    /// Extract and decode the ring.
    DownloadRolls,
    Close { force: bool },
}

/// Handle to a session running on its own thread.
///
/// Requests queue in a single slot, so at most one runs while one waits.
/// Results come back as [`Event`]s.
pub struct Camera {
    requests: Option<SyncSender<Request>>,
    events: Receiver<Event>,
    close_handle: CloseHandle,
    worker: Option<JoinHandle<()>>,
}

impl Camera {
    /// Move `session` onto a worker thread.
    pub fn spawn<L>(session: Session<L>) -> Result<Self>
    where
        L: SerialLink + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::sync_channel(1);
        let (event_tx, event_rx) = mpsc::channel();
        let close_handle = session.close_handle();

        let worker = thread::Builder::new()
            .name("memolink-camera".to_string())
            .spawn(move || run(session, request_rx, event_tx))
            .map_err(TransportError::Io)?;

        Ok(Self {
            requests: Some(request_tx),
            events: event_rx,
            close_handle,
            worker: Some(worker),
        })
    }

    /// Queue a request, blocking while the slot is taken.
    pub fn send(&self, request: Request) -> Result<()> {
        self.requests
            .as_ref()
            .ok_or(SessionError::WorkerGone)?
            .send(request)
            .map_err(|_| SessionError::WorkerGone)
    }

    /// Queue a request without blocking. Returns `false` when busy.
    pub fn try_send(&self, request: Request) -> Result<bool> {
        let requests = self.requests.as_ref().ok_or(SessionError::WorkerGone)?;
        match requests.try_send(request) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(SessionError::WorkerGone),
        }
    }

    /// Event stream of the worker.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Event>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::WorkerGone),
        }
    }

    /// Close the link under the running request so it fails fast.
    pub fn cancel(&self) {
        debug!("cancelling camera request");
        self.close_handle.close();
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.requests.take();
        self.close_handle.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("camera worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

fn run<L: SerialLink>(mut session: Session<L>, requests: Receiver<Request>, events: Sender<Event>) {
    debug!("camera worker started");
    for request in requests {
        debug!(?request, "camera request");
        let progress = |percent: u8| {
            let _ = events.send(Event::progress(percent));
        };
        let respond = |response: Response| {
            let _ = events.send(Event::response(response));
        };
        if let Err(err) = execute(&mut session, request, progress, respond) {
            error!(?request, kind = %err.kind(), error = %err, "camera request failed");
            let _ = events.send(Event::error(&err));
        }
    }

    if session.is_open() {
        session.close(true);
    }
    debug!("camera worker stopped");
}

/// Run one request, handing each response to `respond` as soon as it is known.
pub(crate) fn execute<L: SerialLink>(
    session: &mut Session<L>,
    request: Request,
    progress: impl FnMut(u8),
    mut respond: impl FnMut(Response),
) -> Result<()> {
    match request {
        Request::Init => {
            let info = session.init_with(progress, || respond(Response::PortOpened))?;
            respond(Response::Model(info.model));
            respond(Response::TotalShots(info.total_shots));
            respond(Response::MemoryInfo(info.geometry));
            respond(Response::CurrentRoll(info.current_roll));
        }
        Request::QueryModel => respond(Response::Model(session.query_model()?)),
        Request::TotalShots => respond(Response::TotalShots(session.query_total_shots()?)),
        Request::Geometry => respond(Response::MemoryInfo(session.query_geometry()?)),
        Request::CurrentRoll => respond(Response::CurrentRoll(session.query_current_roll()?)),
        Request::DownloadRolls => respond(Response::RollData(session.download_rolls(progress)?)),
        Request::Close { force } => {
            if session.close(force) {
                respond(Response::PortClosed);
            }
        }
    }
    Ok(())
}
