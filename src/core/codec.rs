//! Stateless translation between commands and RecSwitch datagrams.
//!
//! [`encode`] turns a [`Command`] into wire bytes for one [`Session`],
//! allocating the message id as its only side effect. [`decode`] turns any
//! inbound datagram into a [`Decoded`] value, picking decryption keys by the
//! address in the clear header.

use crate::core::address::MacAddress;
use crate::core::command::{Command, CommandTag, GpioStatus, Response};
use crate::core::packet::{HeaderFlags, Packet};
use crate::core::session::Session;
use crate::error::Result;
use crate::utils::crypto::KeyResolver;
use tracing::trace;

/// A parsed inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub address: MacAddress,
    pub message_id: u16,
    pub command: CommandTag,
    pub flags: HeaderFlags,
    pub response: Response,
}

impl Decoded {
    /// Rebuild the command a request-type packet carries.
    ///
    /// Returns `None` when the packet does not hold enough data to do so
    /// (relay commands always do; heartbeats and module queries carry no
    /// fields).
    pub fn to_command(&self) -> Option<Command> {
        match (self.command, &self.response) {
            (CommandTag::SetGpioStatus, Response::GpioStatus(GpioStatus { flag, state })) => {
                Some(Command::SetGpioStatus {
                    flag: *flag,
                    state: *state,
                })
            }
            (CommandTag::GetGpioStatus, Response::GpioStatus(GpioStatus { flag, .. })) => {
                Some(Command::GetGpioStatus { flag: *flag })
            }
            (CommandTag::ReportGpioChange, Response::GpioStatus(GpioStatus { flag, state })) => {
                Some(Command::ReportGpioChange {
                    flag: *flag,
                    state: *state,
                })
            }
            (CommandTag::HeartBeat, _) => Some(Command::HeartBeat),
            (CommandTag::QueryModuleInfo, _) => Some(Command::QueryModuleInfo),
            _ => None,
        }
    }

    pub fn is_reback(&self) -> bool {
        self.flags.is_reback()
    }
}

fn session_flags(session: &Session) -> HeaderFlags {
    if session.use_encryption() {
        HeaderFlags::ENCRYPTED
    } else {
        HeaderFlags::BLANK
    }
}

/// Serialize a request, returning the freshly allocated message id with the bytes.
pub fn encode(session: &Session, command: &Command) -> Result<(u16, Vec<u8>)> {
    command.validate()?;

    let message_id = session.next_message_id();
    let mut message = Vec::with_capacity(8);
    command.write_message(&mut message);

    let packet = Packet {
        flags: session_flags(session),
        address: session.address(),
        message_id,
        device_type: session.device_type(),
        factory_code: session.factory_code(),
        license_data: session.license_data(),
        message,
    };

    let bytes = packet.to_bytes(session.keys())?;
    trace!(
        address = %packet.address,
        message_id,
        command = ?command.tag(),
        len = bytes.len(),
        "Encoded request"
    );
    Ok((message_id, bytes))
}

/// Serialize the device side of an exchange: a reply when `reback` is set,
/// otherwise a device-initiated packet such as a relay change report.
pub fn encode_response(
    session: &Session,
    message_id: u16,
    command: CommandTag,
    response: &Response,
    reback: bool,
) -> Result<Vec<u8>> {
    let mut flags = session_flags(session);
    if reback {
        flags = flags.with(HeaderFlags::REBACK);
    }

    let mut message = vec![command.as_byte()];
    response.write_body(&mut message);

    Packet {
        flags,
        address: session.address(),
        message_id,
        device_type: session.device_type(),
        factory_code: session.factory_code(),
        license_data: session.license_data(),
        message,
    }
    .to_bytes(session.keys())
}

/// Parse an inbound datagram.
pub fn decode<K: KeyResolver + ?Sized>(data: &[u8], keys: &K) -> Result<Decoded> {
    let packet = Packet::from_bytes(data, keys)?;

    let (&tag, body) = packet
        .message
        .split_first()
        .ok_or(crate::error::InvalidPacket::TooShort { len: data.len() })?;
    let command = CommandTag::try_from(tag)?;
    let response = Response::parse(command, packet.flags.is_reback(), body)?;

    trace!(
        address = %packet.address,
        message_id = packet.message_id,
        ?command,
        reback = packet.flags.is_reback(),
        "Decoded packet"
    );

    Ok(Decoded {
        address: packet.address,
        message_id: packet.message_id,
        command,
        flags: packet.flags,
        response,
    })
}
