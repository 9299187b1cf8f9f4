//! # RecSwitch Protocol
//!
//! Client-side engine for RecSwitch smart relay modules on a local network.
//!
//! Devices speak a compact datagram protocol over UDP: a clear 9-byte header
//! carrying the device's hardware address, followed by an optionally
//! AES-128-CBC encrypted payload holding a message id and one command.
//!
//! ## Layers
//! - [`core`]: wire format, commands and per-device sessions
//! - [`protocol`]: request/reply correlation and unsolicited report routing
//! - [`transport`]: the injected send channel and the UDP receive loop
//! - [`service`]: typed device API, device registry and a blocking client
//!
//! ## Example
//! ```no_run
//! use recswitch_protocol::config::NetworkConfig;
//! use recswitch_protocol::service::RecSwitchNetwork;
//!
//! # async fn run() -> recswitch_protocol::error::Result<()> {
//! let network = RecSwitchNetwork::new(NetworkConfig::default())?;
//! network.bind().await?;
//!
//! let device = network.register_device("1A:2B:3C:4D:5E:6F", "192.168.1.40".parse().unwrap())?;
//! let status = device.set_gpio_status(0, true).await?;
//! assert!(status.state);
//!
//! network.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::address::MacAddress;
pub use crate::core::command::{Command, GpioStatus, HeartBeatAck, ModuleInfo, Response};
pub use crate::core::session::Session;
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::correlator::{Correlator, Delivery, PendingReply};
pub use crate::service::{BlockingClient, Device, RecSwitchNetwork};
