//! # Transport Layer
//!
//! The correlator never owns a socket. It transmits through a [`Transmit`]
//! implementation injected at construction, which may report itself as
//! unavailable (for example before a socket has been bound).
//!
//! ## Components
//! - **Transmit**: send primitive with an availability probe
//! - **UDP**: tokio `UdpSocket` channel and its receive loop

use crate::error::Result;
use async_trait::async_trait;
use std::net::SocketAddr;

pub mod udp;

/// Outbound datagram channel.
#[async_trait]
pub trait Transmit: Send + Sync {
    /// Whether datagrams can currently be sent.
    fn is_available(&self) -> bool;

    /// Send one datagram to `destination`.
    async fn send_to(&self, packet: &[u8], destination: SocketAddr) -> Result<()>;
}
