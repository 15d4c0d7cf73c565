//! Tokio facade over a blocking session.
//!
//! The session runs inside `spawn_blocking`; each call is shipped to it as a
//! job and answered over a oneshot channel. Progress of every call goes to a
//! shared unbounded channel.

use memolink_roll::Roll;
use memolink_transport::{CloseHandle, SerialLink};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::ring::RingGeometry;
use crate::session::{CameraInfo, CurrentRoll, Session};

type Job<L> = Box<dyn FnOnce(&mut Session<L>, &dyn Fn(u8)) + Send>;

/// Async handle to a session owned by a blocking task.
pub struct AsyncCamera<L> {
    jobs: mpsc::Sender<Job<L>>,
    close_handle: CloseHandle,
    worker: JoinHandle<()>,
}

impl<L: SerialLink + Send + 'static> AsyncCamera<L> {
    /// Move `session` onto a blocking task. Must be called inside a Tokio
    /// runtime.
    pub fn spawn(session: Session<L>) -> (Self, mpsc::UnboundedReceiver<u8>) {
        let (jobs_tx, mut jobs_rx) = mpsc::channel::<Job<L>>(1);
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let close_handle = session.close_handle();

        let worker = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let progress = move |percent: u8| {
                let _ = progress_tx.send(percent);
            };
            while let Some(job) = jobs_rx.blocking_recv() {
                job(&mut session, &progress);
            }
            if session.is_open() {
                session.close(true);
            }
            debug!("async camera worker stopped");
        });

        (
            Self {
                jobs: jobs_tx,
                close_handle,
                worker,
            },
            progress_rx,
        )
    }

    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<L>, &dyn Fn(u8)) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<L> = Box::new(move |session, progress| {
            let _ = reply_tx.send(f(session, progress));
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| SessionError::WorkerGone)?;
        reply_rx.await.map_err(|_| SessionError::WorkerGone)?
    }

    pub async fn init(&self) -> Result<CameraInfo> {
        self.call(|session, progress| session.init(progress)).await
    }

    pub async fn query_model(&self) -> Result<String> {
        self.call(|session, _| session.query_model()).await
    }

    pub async fn total_shots(&self) -> Result<u16> {
        self.call(|session, _| session.query_total_shots()).await
    }

    pub async fn geometry(&self) -> Result<RingGeometry> {
        self.call(|session, _| session.query_geometry()).await
    }

    pub async fn current_roll(&self) -> Result<CurrentRoll> {
        self.call(|session, _| session.query_current_roll()).await
    }

    pub async fn download_rolls(&self) -> Result<Vec<Roll>> {
        self.call(|session, progress| session.download_rolls(progress))
            .await
    }

    pub async fn close(&self, force: bool) -> Result<bool> {
        self.call(move |session, _| Ok(session.close(force))).await
    }

    /// Close the link under the running call so it fails fast.
    pub fn cancel(&self) {
        self.close_handle.close();
    }

    /// Stop the worker and wait for it to release the link.
    pub async fn shutdown(self) -> Result<()> {
        let Self { jobs, worker, .. } = self;
        drop(jobs);
        worker.await.map_err(|_| SessionError::WorkerGone)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::SessionConfig;
    use crate::error::ErrorKind;
    use crate::testing::CameraEmulator;

    fn spawn() -> (
        AsyncCamera<memolink_transport::MockLink>,
        mpsc::UnboundedReceiver<u8>,
        memolink_transport::MockLink,
    ) {
        let link = CameraEmulator::loaded().into_link(Duration::from_millis(100));
        let probe = link.clone();
        let config = SessionConfig {
            settle_delay: Duration::ZERO,
            ..SessionConfig::default()
        };
        let (camera, progress) = AsyncCamera::spawn(Session::with_config(link, config));
        (camera, progress, probe)
    }

    #[tokio::test]
    async fn init_and_download() {
        let (camera, mut progress, _) = spawn();

        let info = camera.init().await.unwrap();
        assert_eq!(info.model, "F90X");
        assert_eq!(info.total_shots, 0x1234);

        let rolls = camera.download_rolls().await.unwrap();
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].frames.len(), 8);

        let mut percents = Vec::new();
        while let Ok(p) = progress.try_recv() {
            percents.push(p);
        }
        assert_eq!(percents, vec![12, 25, 37, 50, 62, 75, 87, 100, 80, 100]);
    }

    #[tokio::test]
    async fn cancelled_call_reports_no_connection() {
        let (camera, _progress, _) = spawn();
        camera.init().await.unwrap();

        camera.cancel();
        let err = camera.total_shots().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoConnection);
    }

    #[tokio::test]
    async fn shutdown_releases_link() {
        let (camera, _progress, probe) = spawn();
        camera.init().await.unwrap();
        assert!(camera.close(false).await.unwrap());
        assert!(!camera.close(false).await.unwrap());

        camera.shutdown().await.unwrap();
        assert!(!probe.is_open());
    }
}
