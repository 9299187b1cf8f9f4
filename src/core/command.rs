//! Commands sent to the device and the responses parsed out of its packets.
//!
//! The command message is the tail of the payload: a one-byte tag followed by a
//! variant-specific body. Relay commands share a four-byte body
//! `flag | frequency | duty | reserved`, where a duty of `0xFF` means the relay
//! is on.

use crate::error::{InvalidPacket, ProtocolError, Result};
use bytes::{Buf, BufMut};

pub const GPIO_FLAG_ON: u8 = 0xFF;
pub const GPIO_FLAG_OFF: u8 = 0x00;
pub const GPIO_RES: u8 = 0xFF;
pub const GPIO_FRE: u8 = 0x00;

/// Highest relay index a device accepts
pub const MAX_GPIO_FLAG: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandTag {
    SetGpioStatus = 0x01,
    GetGpioStatus = 0x02,
    ReportGpioChange = 0x06,
    HeartBeat = 0x61,
    QueryModuleInfo = 0x62,
}

impl CommandTag {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CommandTag {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0x01 => Ok(CommandTag::SetGpioStatus),
            0x02 => Ok(CommandTag::GetGpioStatus),
            0x06 => Ok(CommandTag::ReportGpioChange),
            0x61 => Ok(CommandTag::HeartBeat),
            0x62 => Ok(CommandTag::QueryModuleInfo),
            other => Err(InvalidPacket::UnknownCommand { tag: other }.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetGpioStatus { flag: u8, state: bool },
    GetGpioStatus { flag: u8 },
    /// Sent by the device on its own when a relay changes state.
    ReportGpioChange { flag: u8, state: bool },
    HeartBeat,
    QueryModuleInfo,
}

impl Command {
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::SetGpioStatus { .. } => CommandTag::SetGpioStatus,
            Command::GetGpioStatus { .. } => CommandTag::GetGpioStatus,
            Command::ReportGpioChange { .. } => CommandTag::ReportGpioChange,
            Command::HeartBeat => CommandTag::HeartBeat,
            Command::QueryModuleInfo => CommandTag::QueryModuleInfo,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Command::SetGpioStatus { flag, .. }
            | Command::GetGpioStatus { flag }
            | Command::ReportGpioChange { flag, .. }
                if *flag > MAX_GPIO_FLAG =>
            {
                Err(ProtocolError::InvalidGpioFlag(*flag))
            }
            _ => Ok(()),
        }
    }

    /// Write the tag and body.
    pub fn write_message<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.tag().as_byte());
        match self {
            Command::SetGpioStatus { flag, state } | Command::ReportGpioChange { flag, state } => {
                put_gpio_body(buf, *flag, *state)
            }
            Command::GetGpioStatus { flag } => put_gpio_body(buf, *flag, false),
            Command::HeartBeat | Command::QueryModuleInfo => {}
        }
    }
}

fn put_gpio_body<B: BufMut>(buf: &mut B, flag: u8, state: bool) {
    buf.put_u8(flag);
    buf.put_u8(GPIO_FRE);
    buf.put_u8(if state { GPIO_FLAG_ON } else { GPIO_FLAG_OFF });
    buf.put_u8(GPIO_RES);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioStatus {
    pub flag: u8,
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub hw_version: String,
    pub sw_version: String,
    pub device_name: String,
    pub status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeatAck {
    /// Seconds the device wants between heartbeats
    pub interval: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    GpioStatus(GpioStatus),
    ModuleInfo(ModuleInfo),
    HeartBeatAck(HeartBeatAck),
    /// Request-type packet without the reback flag, or an ack with no data.
    None,
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::GpioStatus(_) => "GpioStatus",
            Response::ModuleInfo(_) => "ModuleInfo",
            Response::HeartBeatAck(_) => "HeartBeatAck",
            Response::None => "None",
        }
    }

    /// Parse a command body (the bytes after the tag, padding included).
    pub fn parse(command: CommandTag, is_reback: bool, body: &[u8]) -> Result<Self> {
        let mut body = body;
        match command {
            CommandTag::SetGpioStatus
            | CommandTag::GetGpioStatus
            | CommandTag::ReportGpioChange => {
                ensure(command, &body, 4)?;
                let flag = body.get_u8();
                let _fre = body.get_u8();
                let duty = body.get_u8();
                let _res = body.get_u8();
                Ok(Response::GpioStatus(GpioStatus {
                    flag,
                    state: duty == GPIO_FLAG_ON,
                }))
            }
            CommandTag::HeartBeat => {
                if !is_reback {
                    return Ok(Response::None);
                }
                ensure(command, &body, 2)?;
                Ok(Response::HeartBeatAck(HeartBeatAck {
                    interval: body.get_u16(),
                }))
            }
            CommandTag::QueryModuleInfo => {
                if !is_reback {
                    return Ok(Response::None);
                }
                let hw_version = take_string(command, &mut body)?;
                let sw_version = take_string(command, &mut body)?;
                let device_name = take_string(command, &mut body)?;
                // Only the byte after the last field is a status; the device does
                // not send one between fields.
                ensure(command, &body, 1)?;
                let status = body.get_u8();
                Ok(Response::ModuleInfo(ModuleInfo {
                    hw_version,
                    sw_version,
                    device_name,
                    status,
                }))
            }
        }
    }

    /// Write the device-side body for this response.
    pub fn write_body<B: BufMut>(&self, buf: &mut B) {
        match self {
            Response::GpioStatus(status) => put_gpio_body(buf, status.flag, status.state),
            Response::HeartBeatAck(ack) => buf.put_u16(ack.interval),
            Response::ModuleInfo(info) => {
                for field in [&info.hw_version, &info.sw_version, &info.device_name] {
                    let bytes = field.as_bytes();
                    let len = bytes.len().min(u8::MAX as usize);
                    buf.put_u8(len as u8);
                    buf.put_slice(&bytes[..len]);
                }
                buf.put_u8(info.status);
            }
            Response::None => {}
        }
    }
}

fn ensure(command: CommandTag, body: &[u8], needed: usize) -> Result<()> {
    if body.remaining() < needed {
        return Err(InvalidPacket::TruncatedBody {
            command,
            needed,
            available: body.remaining(),
        }
        .into());
    }
    Ok(())
}

fn take_string(command: CommandTag, body: &mut &[u8]) -> Result<String> {
    ensure(command, body, 1)?;
    let len = body.get_u8() as usize;
    ensure(command, body, len)?;
    let value = std::str::from_utf8(&body[..len])
        .map_err(|_| ProtocolError::from(InvalidPacket::InvalidText))?
        .to_string();
    body.advance(len);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for tag in [
            CommandTag::SetGpioStatus,
            CommandTag::GetGpioStatus,
            CommandTag::ReportGpioChange,
            CommandTag::HeartBeat,
            CommandTag::QueryModuleInfo,
        ] {
            assert_eq!(CommandTag::try_from(tag.as_byte()).unwrap(), tag);
        }
        assert!(matches!(
            CommandTag::try_from(0x7F),
            Err(ProtocolError::InvalidPacket(InvalidPacket::UnknownCommand { tag: 0x7F }))
        ));
    }

    #[test]
    fn test_gpio_body_layout() {
        let mut buf = Vec::new();
        Command::SetGpioStatus { flag: 1, state: true }.write_message(&mut buf);
        assert_eq!(buf, [0x01, 0x01, 0x00, 0xFF, 0xFF]);

        buf.clear();
        Command::GetGpioStatus { flag: 0 }.write_message(&mut buf);
        assert_eq!(buf, [0x02, 0x00, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn test_flag_validation() {
        assert!(Command::GetGpioStatus { flag: 3 }.validate().is_ok());
        assert!(matches!(
            Command::GetGpioStatus { flag: 4 }.validate(),
            Err(ProtocolError::InvalidGpioFlag(4))
        ));
        assert!(Command::HeartBeat.validate().is_ok());
    }

    #[test]
    fn test_module_info_last_status_wins() {
        let mut body = vec![3];
        body.extend_from_slice(b"1.0");
        body.push(3);
        body.extend_from_slice(b"2.1");
        body.push(4);
        body.extend_from_slice(b"SW01");
        body.push(0x5A);
        body.extend_from_slice(&[0x04, 0x04]);

        let response = Response::parse(CommandTag::QueryModuleInfo, true, &body).unwrap();
        assert_eq!(
            response,
            Response::ModuleInfo(ModuleInfo {
                hw_version: "1.0".into(),
                sw_version: "2.1".into(),
                device_name: "SW01".into(),
                status: 0x5A,
            })
        );
    }

    #[test]
    fn test_module_info_truncated() {
        let body = [5, b'1', b'.'];
        assert!(matches!(
            Response::parse(CommandTag::QueryModuleInfo, true, &body),
            Err(ProtocolError::InvalidPacket(InvalidPacket::TruncatedBody { .. }))
        ));
    }

    #[test]
    fn test_request_without_reback_is_none() {
        assert_eq!(
            Response::parse(CommandTag::HeartBeat, false, &[]).unwrap(),
            Response::None
        );
        assert_eq!(
            Response::parse(CommandTag::QueryModuleInfo, false, &[0x04; 8]).unwrap(),
            Response::None
        );
    }

    #[test]
    fn test_heartbeat_interval_big_endian() {
        let response = Response::parse(CommandTag::HeartBeat, true, &[0x00, 0x1E]).unwrap();
        assert_eq!(response, Response::HeartBeatAck(HeartBeatAck { interval: 30 }));
    }
}
