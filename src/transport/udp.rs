//! UDP channel shared by every device.
//!
//! The socket is attached after binding; until then the channel reports
//! itself unavailable and sends fail with `ChannelUnavailable`.

use crate::error::{ProtocolError, Result};
use crate::protocol::correlator::Correlator;
use crate::transport::Transmit;
use crate::utils::metrics::global_metrics;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

#[derive(Debug, Default)]
pub struct UdpChannel {
    socket: RwLock<Option<Arc<UdpSocket>>>,
}

impl UdpChannel {
    /// Channel with no socket attached yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a socket on `local` and attach it.
    #[instrument(skip(self))]
    pub async fn bind(&self, local: SocketAddr) -> Result<Arc<UdpSocket>> {
        let socket = Arc::new(UdpSocket::bind(local).await?);
        info!(local = %socket.local_addr()?, "UDP endpoint bound");
        self.attach(Arc::clone(&socket));
        Ok(socket)
    }

    pub fn attach(&self, socket: Arc<UdpSocket>) {
        let mut slot = self
            .socket
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(socket);
    }

    /// Detach the socket; later sends fail with `ChannelUnavailable`.
    pub fn detach(&self) -> Option<Arc<UdpSocket>> {
        let mut slot = self
            .socket
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.take()
    }

    fn current(&self) -> Option<Arc<UdpSocket>> {
        self.socket
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transmit for UdpChannel {
    fn is_available(&self) -> bool {
        self.current().is_some()
    }

    async fn send_to(&self, packet: &[u8], destination: SocketAddr) -> Result<()> {
        let socket = self.current().ok_or(ProtocolError::ChannelUnavailable)?;
        let sent = socket.send_to(packet, destination).await.inspect_err(|_| {
            global_metrics().connection_error();
        })?;
        global_metrics().packet_sent(sent as u64);
        trace!(%destination, len = sent, "Datagram sent");
        Ok(())
    }
}

/// Feed every datagram read from `socket` into `correlator` until cancelled.
///
/// Routing a datagram never waits on user code: relay change handlers run on
/// their own tasks, so a handler may issue device requests, and cancelling the
/// loop does not cut off a handler that is already running.
#[instrument(skip_all, fields(local = ?socket.local_addr().ok()))]
pub async fn receive_loop(
    socket: Arc<UdpSocket>,
    correlator: Correlator,
    max_datagram_size: usize,
    cancel: CancellationToken,
) {
    let mut buffer = vec![0u8; max_datagram_size];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Receive loop cancelled");
                return;
            }
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, remote)) => {
                    global_metrics().packet_received(len as u64);
                    let outcome = correlator.on_packet_received(&buffer[..len]);
                    debug!(%remote, len, ?outcome, "Datagram processed");
                }
                Err(e) => {
                    // ICMP port-unreachable surfaces here on some platforms; keep reading.
                    global_metrics().connection_error();
                    error!(error = %e, "Failed to receive datagram");
                }
            }
        }
    }
}
