//! Scripted in-memory link for tests.
//!
//! A `MockLink` records every write and serves replies either from a queue
//! filled up-front with [`MockLink::push_rx`] or from a responder closure
//! that is called with each written command, which is enough to emulate a
//! camera. Clones share state, so a test can keep a probe after moving the
//! link into a session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::DEFAULT_BAUD_RATE;
use crate::error::{Result, TransportError};
use crate::traits::{CloseHandle, SerialLink};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// In-memory [`SerialLink`] with scripted replies.
#[derive(Clone)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
    close_handle: CloseHandle,
}

struct MockState {
    open: bool,
    fail_open: bool,
    baud_rate: u32,
    timeout: Duration,
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    flushes: usize,
    baud_changes: Vec<u32>,
    responder: Option<Responder>,
}

impl MockLink {
    /// Create a closed mock link with a short timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_millis(50))
    }

    /// Create a closed mock link with an explicit timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                open: false,
                fail_open: false,
                baud_rate: DEFAULT_BAUD_RATE,
                timeout,
                rx: VecDeque::new(),
                writes: Vec::new(),
                flushes: 0,
                baud_changes: Vec::new(),
                responder: None,
            })),
            close_handle: CloseHandle::new(true),
        }
    }

    /// Install a closure that produces the reply bytes for each write.
    pub fn with_responder(self, responder: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) -> Self {
        self.state().responder = Some(Box::new(responder));
        self
    }

    /// Make the next `open` fail as if the device were missing.
    pub fn fail_open(self) -> Self {
        self.state().fail_open = true;
        self
    }

    /// Queue bytes to be returned by subsequent reads.
    pub fn push_rx(&self, bytes: &[u8]) {
        self.state().rx.extend(bytes.iter().copied());
    }

    /// Every write call so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// Number of `flush_input` calls so far.
    pub fn flushes(&self) -> usize {
        self.state().flushes
    }

    /// Baud rates applied with `set_baud_rate`, in order.
    pub fn baud_changes(&self) -> Vec<u32> {
        self.state().baud_changes.clone()
    }

    /// Bytes still waiting to be read.
    pub fn pending_rx(&self) -> usize {
        self.state().rx.len()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<()> {
        if self.close_handle.is_closed() || !self.state().open {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for MockLink {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.fail_open {
            return Err(TransportError::NoConnection {
                port: "mock".to_string(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "no such device"),
            });
        }
        state.open = true;
        self.close_handle.reopen();
        Ok(())
    }

    fn close(&mut self, force: bool) -> bool {
        let mut state = self.state();
        if !state.open && !force {
            return false;
        }
        state.open = false;
        self.close_handle.close();
        true
    }

    fn is_open(&self) -> bool {
        self.state().open && !self.close_handle.is_closed()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_open()?;
        let mut guard = self.state();
        let state = &mut *guard;
        state.writes.push(bytes.to_vec());
        if let Some(responder) = state.responder.as_mut() {
            let reply = responder(bytes);
            state.rx.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        self.check_open()?;
        let mut state = self.state();
        let take = n.min(state.rx.len());
        let bytes: Vec<u8> = state.rx.drain(..take).collect();
        drop(state);
        if bytes.is_empty() && n > 0 {
            // Stand-in for the driver blocking on an idle line.
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(bytes)
    }

    fn flush_input(&mut self) -> Result<()> {
        self.check_open()?;
        let mut state = self.state();
        state.rx.clear();
        state.flushes += 1;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.check_open()?;
        let mut state = self.state();
        state.baud_rate = baud_rate;
        state.baud_changes.push(baud_rate);
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.state().baud_rate
    }

    fn timeout(&self) -> Duration {
        self.state().timeout
    }

    fn close_handle(&self) -> CloseHandle {
        self.close_handle.clone()
    }
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MockLink")
            .field("open", &state.open)
            .field("baud_rate", &state.baud_rate)
            .field("pending_rx", &state.rx.len())
            .finish()
    }
}
