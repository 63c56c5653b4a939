//! Polling Worker - owns the thread the polling loop runs on
//!
//! The loop busy-polls, so it gets a dedicated OS thread instead of a tokio
//! task. The handle requests a cooperative stop and joins the thread, which
//! hands back the stopped loop (and with it the input lines).

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};

use super::polling_loop::{LoopControl, LoopPhase, PollingLoop, Ready, Stopped};

// Worker errors
#[derive(Debug, thiserror::Error)]
pub enum PollingError {
    #[error("Failed to spawn polling thread: {0}")]
    SpawnError(#[from] std::io::Error),

    #[error("Polling thread panicked")]
    WorkerPanicked,

    #[error("Polling thread already joined")]
    AlreadyJoined,
}

pub struct PollingHandle {
    control: Arc<LoopControl>,
    thread: Option<JoinHandle<PollingLoop<Stopped>>>,
}

impl PollingHandle {
    /// Move `polling` onto a new thread named after its settings and start it.
    pub fn spawn(polling: PollingLoop<Ready>) -> Result<Self, PollingError> {
        let thread_name = polling.settings().thread_name.clone();
        info!("Spawning polling worker thread '{}'", thread_name);

        let control = Arc::new(LoopControl::new());
        let worker_control = control.clone();
        let thread = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || polling.run(&worker_control))?;

        debug!("Polling worker spawned: {:?}", thread.thread().id());
        Ok(Self {
            control,
            thread: Some(thread),
        })
    }

    pub fn phase(&self) -> LoopPhase {
        self.control.phase()
    }

    /// Signal the worker without waiting for it.
    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    /// Signal the worker and wait for the iteration in flight to finish.
    pub fn stop(mut self) -> Result<PollingLoop<Stopped>, PollingError> {
        self.join()
    }

    fn join(&mut self) -> Result<PollingLoop<Stopped>, PollingError> {
        let thread = self.thread.take().ok_or(PollingError::AlreadyJoined)?;
        info!("Stopping polling worker");
        self.control.request_stop();
        match thread.join() {
            Ok(stopped) => {
                info!("Polling worker stopped");
                Ok(stopped)
            }
            Err(_) => {
                error!("Polling worker panicked");
                Err(PollingError::WorkerPanicked)
            }
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            warn!("Polling handle dropped while the worker was running, stopping it");
            if let Err(e) = self.join() {
                error!("Failed to stop polling worker on drop: {}", e);
            }
        }
    }
}
