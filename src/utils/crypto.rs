//! AES-128-CBC encryption layer for RecSwitch payloads.
//!
//! The device encrypts the whole payload section (payload header included)
//! with a fixed key and IV, block by block, without any padding scheme of its
//! own. Callers pad with the protocol filler byte before encrypting.

use crate::core::address::MacAddress;
use crate::error::{InvalidPacket, ProtocolError, Result};
use aes::Aes128;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Cipher block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Factory key shipped in device firmware
pub const DEFAULT_AES_KEY: &[u8; 16] = b"1234567890abcdef";

/// Factory IV shipped in device firmware
pub const DEFAULT_AES_IV: &[u8; 16] = b"1234567890abcdef";

/// Key and IV pair for one device.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CipherKeys {
    key: [u8; 16],
    iv: [u8; 16],
}

impl CipherKeys {
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// Build key material from the textual form used in configuration files.
    ///
    /// Both strings must be exactly 16 bytes long.
    pub fn from_strings(key: &str, iv: &str) -> Result<Self> {
        let key: [u8; 16] = key.as_bytes().try_into().map_err(|_| {
            ProtocolError::ConfigError(format!("AES key must be 16 bytes, got {}", key.len()))
        })?;
        let iv: [u8; 16] = iv.as_bytes().try_into().map_err(|_| {
            ProtocolError::ConfigError(format!("AES IV must be 16 bytes, got {}", iv.len()))
        })?;
        Ok(Self { key, iv })
    }

    pub fn key(&self) -> &[u8; 16] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }
}

impl Default for CipherKeys {
    fn default() -> Self {
        Self::new(*DEFAULT_AES_KEY, *DEFAULT_AES_IV)
    }
}

impl fmt::Debug for CipherKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherKeys").finish_non_exhaustive()
    }
}

/// Block cipher bound to one key/IV pair.
pub struct Crypto {
    keys: CipherKeys,
}

impl Crypto {
    pub fn new(keys: &CipherKeys) -> Self {
        Self { keys: keys.clone() }
    }

    /// Encrypt a block-aligned plaintext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() || plaintext.len() % BLOCK_SIZE != 0 {
            return Err(ProtocolError::EncryptionFailure);
        }

        let mut buf = plaintext.to_vec();
        let len = buf.len();
        Aes128CbcEnc::new(&self.keys.key.into(), &self.keys.iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| ProtocolError::EncryptionFailure)?;
        Ok(buf)
    }

    /// Decrypt a block-aligned ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            debug!(len = ciphertext.len(), "Ciphertext is not block aligned");
            return Err(InvalidPacket::Undecryptable.into());
        }

        let mut buf = ciphertext.to_vec();
        Aes128CbcDec::new(&self.keys.key.into(), &self.keys.iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| ProtocolError::from(InvalidPacket::Undecryptable))?;
        Ok(buf)
    }
}

/// Resolves the key material that applies to packets from a given device.
///
/// The decoder only learns which device a packet belongs to from the clear
/// header, so it asks a resolver before touching the encrypted payload.
pub trait KeyResolver {
    fn resolve_keys(&self, address: &MacAddress) -> CipherKeys;
}

impl KeyResolver for CipherKeys {
    fn resolve_keys(&self, _address: &MacAddress) -> CipherKeys {
        self.clone()
    }
}

/// Per-device key table with a fallback for unknown addresses.
#[derive(Debug, Default)]
pub struct KeyRing {
    fallback: CipherKeys,
    devices: RwLock<HashMap<MacAddress, CipherKeys>>,
}

impl KeyRing {
    pub fn new(fallback: CipherKeys) -> Self {
        Self {
            fallback,
            devices: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, address: MacAddress, keys: CipherKeys) -> Result<()> {
        let mut devices = self.devices.write().map_err(|_| {
            ProtocolError::Custom(crate::error::constants::ERR_KEYRING_LOCK.to_string())
        })?;
        devices.insert(address, keys);
        Ok(())
    }

    pub fn remove(&self, address: &MacAddress) -> Result<()> {
        let mut devices = self.devices.write().map_err(|_| {
            ProtocolError::Custom(crate::error::constants::ERR_KEYRING_LOCK.to_string())
        })?;
        devices.remove(address);
        Ok(())
    }
}

impl KeyResolver for KeyRing {
    fn resolve_keys(&self, address: &MacAddress) -> CipherKeys {
        // A poisoned table still holds valid keys; readers never mutate it.
        let devices = self
            .devices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        devices
            .get(address)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
