//! Typed operations on one relay module, plus its keep-alive loop.

use crate::core::address::MacAddress;
use crate::core::command::{Command, CommandTag, GpioStatus, HeartBeatAck, ModuleInfo, Response};
use crate::core::session::Session;
use crate::error::{ProtocolError, Result};
use crate::protocol::correlator::Correlator;
use crate::utils::timeout::KEEPALIVE_INTERVAL;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Handle to one device reachable through a shared [`Correlator`].
///
/// Clones share the session, so message ids stay unique across them.
#[derive(Clone)]
pub struct Device {
    session: Arc<Session>,
    destination: SocketAddr,
    correlator: Correlator,
    fallback_interval: Duration,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.session.address())
            .field("destination", &self.destination)
            .field("fallback_interval", &self.fallback_interval)
            .finish()
    }
}

impl Device {
    pub fn new(session: Session, destination: SocketAddr, correlator: Correlator) -> Self {
        Self {
            session: Arc::new(session),
            destination,
            correlator,
            fallback_interval: KEEPALIVE_INTERVAL,
        }
    }

    /// Interval the keep-alive loop waits after a failed heartbeat
    pub fn with_fallback_interval(mut self, interval: Duration) -> Self {
        self.fallback_interval = interval;
        self
    }

    pub fn address(&self) -> MacAddress {
        self.session.address()
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn request(&self, command: Command) -> Result<Response> {
        self.correlator
            .send(&self.session, &command, self.destination)
            .await?
            .await
    }

    #[instrument(skip(self), fields(address = %self.address()))]
    pub async fn heart_beat(&self) -> Result<HeartBeatAck> {
        match self.request(Command::HeartBeat).await? {
            Response::HeartBeatAck(ack) => Ok(ack),
            other => Err(unexpected(CommandTag::HeartBeat, &other)),
        }
    }

    #[instrument(skip(self), fields(address = %self.address()))]
    pub async fn query_module_info(&self) -> Result<ModuleInfo> {
        match self.request(Command::QueryModuleInfo).await? {
            Response::ModuleInfo(info) => Ok(info),
            other => Err(unexpected(CommandTag::QueryModuleInfo, &other)),
        }
    }

    #[instrument(skip(self), fields(address = %self.address()))]
    pub async fn get_gpio_status(&self, flag: u8) -> Result<GpioStatus> {
        match self.request(Command::GetGpioStatus { flag }).await? {
            Response::GpioStatus(status) => Ok(status),
            other => Err(unexpected(CommandTag::GetGpioStatus, &other)),
        }
    }

    #[instrument(skip(self), fields(address = %self.address()))]
    pub async fn set_gpio_status(&self, flag: u8, state: bool) -> Result<GpioStatus> {
        match self.request(Command::SetGpioStatus { flag, state }).await? {
            Response::GpioStatus(status) => Ok(status),
            other => Err(unexpected(CommandTag::SetGpioStatus, &other)),
        }
    }

    /// Call `handler` for every relay change this device reports on its own.
    ///
    /// Replaces any handler registered earlier for the same device. Each call
    /// runs on its own task, so the handler may await requests to the device.
    pub fn on_gpio_change<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(GpioStatus) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.correlator.reports().register(self.address(), handler)
    }

    /// Send heartbeats until `cancel` fires.
    ///
    /// After a successful heartbeat the loop waits for the interval the device
    /// reported; after any failure it waits the fallback interval and retries.
    pub async fn heart_beat_loop(&self, cancel: CancellationToken) {
        let address = self.address();
        info!(%address, "Keep-alive loop started");

        loop {
            let interval = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.heart_beat() => self.next_interval(result),
            };

            debug!(%address, interval_ms = interval.as_millis(), "Next heartbeat scheduled");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(%address, "Keep-alive loop stopped");
    }

    /// Run [`Device::heart_beat_loop`] on its own task.
    pub fn spawn_heart_beat_loop(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let device = self.clone();
        tokio::spawn(async move { device.heart_beat_loop(cancel).await })
    }

    fn next_interval(&self, result: Result<HeartBeatAck>) -> Duration {
        match result {
            Ok(ack) if ack.interval > 0 => Duration::from_secs(u64::from(ack.interval)),
            Ok(_) => self.fallback_interval,
            Err(e) if e.is_network_error() => {
                warn!(address = %self.address(), error = %e, "Heartbeat failed");
                self.fallback_interval
            }
            Err(e) => {
                error!(address = %self.address(), error = %e, "Heartbeat rejected");
                self.fallback_interval
            }
        }
    }
}

pub(crate) fn unexpected(expected: CommandTag, received: &Response) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        expected,
        received: received.kind(),
    }
}
