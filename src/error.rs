//! # Error Types
//!
//! Error handling for the RecSwitch protocol engine.
//!
//! This module defines every failure the codec, correlator and device API can
//! report, from malformed datagrams up to request timeouts.
//!
//! ## Error Categories
//! - **Packet Errors**: [`InvalidPacket`] covers everything the decoder rejects
//! - **Network Errors**: timeouts, missing transport, socket I/O
//! - **Usage Errors**: malformed device addresses, relay indexes out of range
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! Decode failures are never retried. The correlator drops undecodable
//! datagrams instead of failing a pending request, because the message id of
//! a broken packet cannot be trusted.
//!
//! ## Example Usage
//! ```rust
//! use recswitch_protocol::core::codec;
//! use recswitch_protocol::error::{InvalidPacket, ProtocolError};
//! use recswitch_protocol::utils::crypto::CipherKeys;
//!
//! match codec::decode(&[0x01, 0x00], &CipherKeys::default()) {
//!     Err(ProtocolError::InvalidPacket(InvalidPacket::TooShort { len })) => assert_eq!(len, 2),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::core::command::CommandTag;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Synchronization errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";
    pub const ERR_CORRELATOR_LOCK: &str = "Failed to acquire lock on pending request table";
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on report dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on report dispatcher";
    pub const ERR_REGISTRY_LOCK: &str = "Failed to acquire lock on device registry";
    pub const ERR_KEYRING_LOCK: &str = "Failed to acquire lock on key ring";
}

/// Reasons a datagram is rejected by the decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPacket {
    #[error("Packet too short: {len} bytes")]
    TooShort { len: usize },

    #[error("Unsupported protocol version: {0:#04x}")]
    BadVersion(u8),

    #[error("Payload could not be decrypted")]
    Undecryptable,

    #[error("Declared payload length {declared} does not match {available} available bytes")]
    LengthMismatch { declared: usize, available: usize },

    #[error("Unknown command tag: {tag:#04x}")]
    UnknownCommand { tag: u8 },

    #[error("{command:?} body truncated: needed {needed} bytes, {available} available")]
    TruncatedBody {
        command: CommandTag,
        needed: usize,
        available: usize,
    },

    #[error("Module info field is not valid UTF-8")]
    InvalidText,
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid packet: {0}")]
    InvalidPacket(#[from] InvalidPacket),

    #[error("Request timed out")]
    Timeout,

    #[error("Transport channel unavailable")]
    ChannelUnavailable,

    #[error("Request cancelled before completion")]
    Cancelled,

    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid GPIO flag {0}, expected 0 to 3")]
    InvalidGpioFlag(u8),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Message id {0} already has a request in flight")]
    DuplicateMessageId(u16),

    #[error("Unexpected response to {expected:?}: {received}")]
    UnexpectedResponse {
        expected: CommandTag,
        received: &'static str,
    },

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Failures caused by the network rather than by the data exchanged.
    ///
    /// The keep-alive loop absorbs these and retries after its fallback
    /// interval.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout
                | ProtocolError::ChannelUnavailable
                | ProtocolError::Cancelled
                | ProtocolError::Io(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
