//! Per-device protocol state.
//!
//! A [`Session`] holds what the codec needs to address one device: its
//! hardware address, key material, the payload header constants and the
//! rolling message-id generator.
//!
//! ## Message ids
//! Ids are drawn from a monotonic counter over `[1, 65535]` that wraps from
//! 65535 back to 1; 0 is never produced. The starting point is random unless
//! set with [`Session::with_initial_message_id`], so a restarted process does
//! not reuse the ids of replies still in flight from its predecessor.

use crate::config::DeviceConfig;
use crate::core::address::MacAddress;
use crate::error::Result;
use crate::utils::crypto::{CipherKeys, KeyResolver};
use std::sync::atomic::{AtomicU16, Ordering};

/// Device type byte written into every payload header
pub const DEFAULT_DEVICE_TYPE: u8 = 0xD1;

/// Factory code byte written into every payload header
pub const DEFAULT_FACTORY_CODE: u8 = 0xF1;

/// License word written into every payload header
pub const DEFAULT_LICENSE_DATA: u16 = 0x21B4;

/// Lock-free rolling message-id generator.
#[derive(Debug)]
pub struct MessageIds {
    last: AtomicU16,
}

impl MessageIds {
    /// Generator whose first id follows `last` (0 means the first id is 1).
    pub fn starting_after(last: u16) -> Self {
        Self {
            last: AtomicU16::new(last),
        }
    }

    /// Generator seeded at a random point of the id space.
    pub fn random() -> Self {
        Self::starting_after(rand::random::<u16>())
    }

    pub fn next_id(&self) -> u16 {
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(successor(last))
            })
            .unwrap_or_else(|last| last);
        successor(previous)
    }
}

#[inline]
fn successor(id: u16) -> u16 {
    if id == u16::MAX {
        1
    } else {
        id + 1
    }
}

#[derive(Debug)]
pub struct Session {
    address: MacAddress,
    keys: CipherKeys,
    use_encryption: bool,
    device_type: u8,
    factory_code: u8,
    license_data: u16,
    ids: MessageIds,
}

impl Session {
    /// Create a session with factory defaults for the device at `address`.
    pub fn new(address: &str) -> Result<Self> {
        Ok(Self::for_address(MacAddress::parse(address)?))
    }

    pub fn for_address(address: MacAddress) -> Self {
        Self {
            address,
            keys: CipherKeys::default(),
            use_encryption: true,
            device_type: DEFAULT_DEVICE_TYPE,
            factory_code: DEFAULT_FACTORY_CODE,
            license_data: DEFAULT_LICENSE_DATA,
            ids: MessageIds::random(),
        }
    }

    /// Create a session using the device section of the configuration.
    pub fn from_config(address: MacAddress, config: &DeviceConfig) -> Result<Self> {
        Ok(Self {
            address,
            keys: config.cipher_keys()?,
            use_encryption: config.use_encryption,
            device_type: config.device_type,
            factory_code: config.factory_code,
            license_data: config.license_data,
            ids: MessageIds::random(),
        })
    }

    pub fn with_keys(mut self, keys: CipherKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_encryption(mut self, use_encryption: bool) -> Self {
        self.use_encryption = use_encryption;
        self
    }

    /// Make the next allocated id `last + 1` (wrapping to 1 after 65535).
    pub fn with_initial_message_id(mut self, last: u16) -> Self {
        self.ids = MessageIds::starting_after(last);
        self
    }

    pub fn next_message_id(&self) -> u16 {
        self.ids.next_id()
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn address_bytes(&self) -> [u8; 6] {
        self.address.address_bytes()
    }

    pub fn keys(&self) -> &CipherKeys {
        &self.keys
    }

    pub fn use_encryption(&self) -> bool {
        self.use_encryption
    }

    pub fn device_type(&self) -> u8 {
        self.device_type
    }

    pub fn factory_code(&self) -> u8 {
        self.factory_code
    }

    pub fn license_data(&self) -> u16 {
        self.license_data
    }
}

impl KeyResolver for Session {
    fn resolve_keys(&self, _address: &MacAddress) -> CipherKeys {
        self.keys.clone()
    }
}
