//! Encoder Service - lifecycle of the whole subsystem
//!
//! ```text
//! start():  reserve pins ──► spawn polling worker ──► publish attribute
//! stop():   unpublish attribute ──► stop + join worker ──► release pins
//! ```
//!
//! Stop runs in that order so no reader can observe the attribute once the
//! lines behind it are gone.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::{ConfigError, EncodioConfig};
use crate::encoder::{
    EncoderChannel, LoopPhase, PollingError, PollingHandle, PollingLoop, PositionSnapshot,
    PositionStore,
};
use crate::gpio::{self, GpioError};
use crate::publish::{AttributePublisher, PublishError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("GPIO error: {0}")]
    GpioError(#[from] GpioError),

    #[error("Polling error: {0}")]
    PollingError(#[from] PollingError),

    #[error("Publication error: {0}")]
    PublishError(#[from] PublishError),

    #[error("Task error: {0}")]
    TaskError(String),
}

/// Fields drop in declaration order, so a service dropped without
/// [`stop`](EncoderService::stop) still unpublishes before the worker is
/// stopped and the pins are released.
pub struct EncoderService {
    publisher: AttributePublisher,
    worker: PollingHandle,
    store: Arc<PositionStore>,
}

impl EncoderService {
    /// Reserve the configured GPIO lines and start the subsystem.
    ///
    /// Pin reservation failure aborts startup before the worker runs.
    pub async fn start(config: &EncodioConfig) -> Result<Self, ServiceError> {
        info!("ENC: starting...");
        config.validate()?;
        let (enc1, enc2) = gpio::reserve_channels(&config.encoders)?;
        let service = Self::start_with_channels(config, enc1, enc2).await?;
        info!("ENC: starting done.");
        Ok(service)
    }

    /// Start the subsystem on already reserved channels.
    pub async fn start_with_channels(
        config: &EncodioConfig,
        enc1: EncoderChannel,
        enc2: EncoderChannel,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let store = Arc::new(PositionStore::new());
        let polling = PollingLoop::create(enc1, enc2, store.clone(), config.polling.clone());

        info!("ENC: starting thread...");
        let worker = PollingHandle::spawn(polling)?;
        info!("ENC: starting thread done.");

        let publisher = AttributePublisher::publish(store.clone(), &config.publish).await;

        Ok(Self {
            publisher,
            worker,
            store,
        })
    }

    /// Attribute text, `"<enc1> <enc2>"`.
    pub fn read(&self) -> String {
        self.publisher.read()
    }

    pub fn positions(&self) -> (i32, i32) {
        self.store.read()
    }

    pub fn store(&self) -> Arc<PositionStore> {
        self.store.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PositionSnapshot> {
        self.publisher.subscribe()
    }

    pub fn phase(&self) -> LoopPhase {
        self.worker.phase()
    }

    pub fn is_published(&self) -> bool {
        self.publisher.is_attached()
    }

    /// Unpublish, stop the worker, release the pins. Returns the final
    /// positions.
    ///
    /// The worker is stopped and the pins are released even if unpublishing
    /// fails; that error is reported afterwards.
    pub async fn stop(self) -> Result<(i32, i32), ServiceError> {
        info!("ENC: stopping...");
        let Self {
            publisher, worker, ..
        } = self;

        let unpublished = publisher.unpublish().await;
        if let Err(e) = &unpublished {
            error!("Failed to unpublish attribute: {}", e);
        }

        info!("ENC: stopping thread...");
        let stopped = tokio::task::spawn_blocking(move || worker.stop())
            .await
            .map_err(|e| ServiceError::TaskError(e.to_string()))??;
        info!("ENC: stopping thread done.");

        info!("ENC: stopping gpio...");
        let positions = stopped.release();
        info!("ENC: stopping gpio done.");

        unpublished?;
        debug!("Final positions: {:?}", positions);
        info!("ENC: stopping done.");
        Ok(positions)
    }
}
