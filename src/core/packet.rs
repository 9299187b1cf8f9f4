use crate::core::address::MacAddress;
use crate::error::{InvalidPacket, ProtocolError, Result};
use crate::utils::crypto::{CipherKeys, Crypto, KeyResolver, BLOCK_SIZE};
use crate::utils::metrics::global_metrics;
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

/// Protocol version byte every packet starts with
pub const PROTOCOL_VERSION: u8 = 0x01;

/// `version | flags | address(6) | payload_length`
pub const HEADER_LEN: usize = 9;

/// `reserved | message_id(2) | device_type | factory_code | license_data(2)`
pub const PAYLOAD_HEADER_LEN: usize = 7;

/// Payloads are padded to at least this many bytes
pub const MIN_PAYLOAD_LEN: usize = 16;

pub const PAYLOAD_PADDING: u8 = 0x04;
pub const PAYLOAD_RESERVED: u8 = 0x00;

/// The length field is a single byte
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

pub const DEFAULT_UDP_PORT: u16 = 18530;

/// Legacy TCP port of the device; not used by this crate
pub const DEFAULT_TCP_PORT: u16 = 17531;

/// Header flag bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    pub const BLANK: HeaderFlags = HeaderFlags(0b0000_0000);
    /// Packet is a reply to a request
    pub const REBACK: HeaderFlags = HeaderFlags(0b0000_0010);
    pub const LOCKED: HeaderFlags = HeaderFlags(0b0000_0100);
    pub const ENCRYPTED: HeaderFlags = HeaderFlags(0b0100_0000);

    pub const fn from_bits(bits: u8) -> Self {
        HeaderFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: HeaderFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn with(self, other: HeaderFlags) -> Self {
        HeaderFlags(self.0 | other.0)
    }

    pub fn is_reback(self) -> bool {
        self.contains(Self::REBACK)
    }

    pub fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }
}

impl fmt::Debug for HeaderFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeaderFlags({:#010b})", self.0)
    }
}

/// One datagram, with the payload in clear text.
///
/// `message` holds the command tag, its body and any trailing padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub flags: HeaderFlags,
    pub address: MacAddress,
    pub message_id: u16,
    pub device_type: u8,
    pub factory_code: u8,
    pub license_data: u16,
    pub message: Vec<u8>,
}

impl Packet {
    /// Serialize, padding the payload and encrypting it when the flags ask for it.
    pub fn to_bytes(&self, keys: &CipherKeys) -> Result<Vec<u8>> {
        let mut payload =
            BytesMut::with_capacity(MIN_PAYLOAD_LEN.max(PAYLOAD_HEADER_LEN + self.message.len()));
        payload.put_u8(PAYLOAD_RESERVED);
        payload.put_u16(self.message_id);
        payload.put_u8(self.device_type);
        payload.put_u8(self.factory_code);
        payload.put_u16(self.license_data);
        payload.put_slice(&self.message);

        let mut padded_len = payload.len().max(MIN_PAYLOAD_LEN);
        if self.flags.is_encrypted() {
            padded_len = padded_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        }
        payload.resize(padded_len, PAYLOAD_PADDING);

        let payload = if self.flags.is_encrypted() {
            global_metrics().encryption_attempt();
            let encrypted = Crypto::new(keys).encrypt(&payload)?;
            global_metrics().encryption_success();
            encrypted
        } else {
            payload.to_vec()
        };

        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::OversizedPacket(payload.len()));
        }

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.put_u8(PROTOCOL_VERSION);
        out.put_u8(self.flags.bits());
        out.put_slice(&self.address.address_bytes());
        out.put_u8(payload.len() as u8);
        out.put_slice(&payload);
        Ok(out)
    }

    /// Parse a datagram, resolving key material by the header address.
    pub fn from_bytes<K: KeyResolver + ?Sized>(data: &[u8], keys: &K) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(InvalidPacket::TooShort { len: data.len() }.into());
        }

        let mut header = &data[..HEADER_LEN];
        let version = header.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(InvalidPacket::BadVersion(version).into());
        }
        let flags = HeaderFlags::from_bits(header.get_u8());
        let mut address = [0u8; 6];
        header.copy_to_slice(&mut address);
        let address = MacAddress::new(address);
        let declared = header.get_u8() as usize;

        let body = &data[HEADER_LEN..];
        if body.len() != declared {
            return Err(InvalidPacket::LengthMismatch {
                declared,
                available: body.len(),
            }
            .into());
        }

        let payload = if flags.is_encrypted() {
            let plain = Crypto::new(&keys.resolve_keys(&address)).decrypt(body)?;
            // Wrong key material shows up as garbage in the reserved byte.
            if plain.len() <= PAYLOAD_HEADER_LEN || plain[0] != PAYLOAD_RESERVED {
                return Err(InvalidPacket::Undecryptable.into());
            }
            plain
        } else {
            if body.len() <= PAYLOAD_HEADER_LEN {
                return Err(InvalidPacket::TooShort { len: data.len() }.into());
            }
            body.to_vec()
        };

        let mut cursor = &payload[..PAYLOAD_HEADER_LEN];
        let _reserved = cursor.get_u8();
        let message_id = cursor.get_u16();
        let device_type = cursor.get_u8();
        let factory_code = cursor.get_u8();
        let license_data = cursor.get_u16();

        Ok(Packet {
            flags,
            address,
            message_id,
            device_type,
            factory_code,
            license_data,
            message: payload[PAYLOAD_HEADER_LEN..].to_vec(),
        })
    }
}
