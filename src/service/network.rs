//! Device registry over one shared UDP endpoint.
//!
//! Every registered device shares the same socket, correlator and receive
//! loop. Replies are told apart by the device address in the packet header.

use crate::config::NetworkConfig;
use crate::core::address::MacAddress;
use crate::core::session::Session;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::correlator::Correlator;
use crate::service::device::Device;
use crate::transport::udp::{receive_loop, UdpChannel};
use crate::utils::crypto::KeyRing;
use crate::utils::metrics::global_metrics;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

struct Registration {
    device: Device,
    keep_alive: Option<CancellationToken>,
}

impl Registration {
    fn stop(&self) {
        if let Some(token) = &self.keep_alive {
            token.cancel();
        }
    }
}

pub struct RecSwitchNetwork {
    config: NetworkConfig,
    channel: Arc<UdpChannel>,
    keys: Arc<KeyRing>,
    correlator: Correlator,
    devices: RwLock<HashMap<MacAddress, Registration>>,
    shutdown: CancellationToken,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl RecSwitchNetwork {
    /// Build the registry. Nothing is bound until [`RecSwitchNetwork::bind`].
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let keys = Arc::new(KeyRing::new(config.device.cipher_keys()?));
        let channel = Arc::new(UdpChannel::new());
        let correlator = Correlator::new(
            channel.clone(),
            keys.clone(),
            config.client.request_timeout,
        );

        Ok(Self {
            config,
            channel,
            keys,
            correlator,
            devices: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            receiver: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Bind the shared socket and start the receive loop.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// the configured port is 0.
    #[instrument(skip(self), fields(local = %self.config.transport.local_address))]
    pub async fn bind(&self) -> Result<SocketAddr> {
        let local: SocketAddr = self.config.transport.local_address.parse().map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Invalid local address '{}': {e}",
                self.config.transport.local_address
            ))
        })?;

        let socket = self.channel.bind(local).await?;
        let bound = socket.local_addr()?;

        let handle = tokio::spawn(receive_loop(
            socket,
            self.correlator.clone(),
            self.config.transport.max_datagram_size,
            self.shutdown.child_token(),
        ));

        let previous = self
            .receiver
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.to_string()))?
            .replace(handle);
        if let Some(previous) = previous {
            warn!("Replacing an existing receive loop");
            previous.abort();
        }

        Ok(bound)
    }

    /// Register the device with hardware address `mac` listening at `ip`.
    ///
    /// Starts its keep-alive loop when the configuration asks for it. A device
    /// registered again replaces the earlier registration. Must be called from
    /// within a Tokio runtime when the keep-alive loop is enabled.
    #[instrument(skip(self))]
    pub fn register_device(&self, mac: &str, ip: IpAddr) -> Result<Device> {
        let address = MacAddress::parse(mac)?;
        let session = Session::from_config(address, &self.config.device)?;
        self.keys.insert(address, session.keys().clone())?;

        let destination = SocketAddr::new(ip, self.config.transport.remote_port);
        let device = Device::new(session, destination, self.correlator.clone())
            .with_fallback_interval(self.config.client.heartbeat_interval);

        let keep_alive = if self.config.client.start_heart_beat_loop {
            let token = self.shutdown.child_token();
            device.spawn_heart_beat_loop(token.clone());
            Some(token)
        } else {
            None
        };

        let mut devices = self
            .devices
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_LOCK.to_string()))?;
        let previous = devices.insert(
            address,
            Registration {
                device: device.clone(),
                keep_alive,
            },
        );
        if let Some(previous) = previous {
            previous.stop();
        }

        info!(%address, %destination, "Device registered");
        Ok(device)
    }

    /// Forget the device, stopping its keep-alive loop and report handler.
    pub fn unregister_device(&self, address: &MacAddress) -> Result<bool> {
        let removed = self
            .devices
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_LOCK.to_string()))?
            .remove(address);

        let Some(registration) = removed else {
            return Ok(false);
        };

        registration.stop();
        self.keys.remove(address)?;
        self.correlator.reports().unregister(address)?;
        info!(%address, "Device unregistered");
        Ok(true)
    }

    pub fn get_device(&self, address: &MacAddress) -> Option<Device> {
        self.devices
            .read()
            .ok()?
            .get(address)
            .map(|registration| registration.device.clone())
    }

    pub fn devices(&self) -> Vec<MacAddress> {
        self.devices
            .read()
            .map(|devices| devices.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Stop every loop, detach the socket and fail all pending requests.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.channel.detach();
        let cancelled = self.correlator.cancel_all();

        let receiver = self
            .receiver
            .lock()
            .map(|mut slot| slot.take())
            .unwrap_or_default();
        if let Some(receiver) = receiver {
            let _ = receiver.await;
        }

        info!(cancelled, "Network shut down");
        global_metrics().log_metrics();
    }
}

impl Drop for RecSwitchNetwork {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
