//! # Configuration Management
//!
//! Centralized configuration for the RecSwitch client.
//!
//! This module provides structured configuration for the local UDP endpoint,
//! the payload constants and key material of the devices, request timing, and
//! logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Security Considerations
//! - The default key and IV are the factory values every device ships with
//! - Disabling encryption is reported by `validate()` as a warning

use crate::core::packet::DEFAULT_UDP_PORT;
use crate::core::session::{DEFAULT_DEVICE_TYPE, DEFAULT_FACTORY_CODE, DEFAULT_LICENSE_DATA};
use crate::error::{ProtocolError, Result};
use crate::utils::crypto::CipherKeys;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Local endpoint configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Payload constants and key material of the devices
    #[serde(default)]
    pub device: DeviceConfig,

    /// Request timing
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("RECSWITCH_LOCAL_ADDRESS") {
            config.transport.local_address = addr;
        }

        if let Ok(port) = std::env::var("RECSWITCH_REMOTE_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                config.transport.remote_port = val;
            }
        }

        if let Ok(timeout) = std::env::var("RECSWITCH_REQUEST_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.request_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(heartbeat) = std::env::var("RECSWITCH_HEARTBEAT_INTERVAL_MS") {
            if let Ok(val) = heartbeat.parse::<u64>() {
                config.client.heartbeat_interval = Duration::from_millis(val);
            }
        }

        if let Ok(encryption) = std::env::var("RECSWITCH_USE_ENCRYPTION") {
            if let Ok(val) = encryption.parse::<bool>() {
                config.device.use_encryption = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.transport.validate());
        errors.extend(self.device.validate());
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Local UDP endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Address the shared socket binds to (e.g., "0.0.0.0:18530")
    pub local_address: String,

    /// UDP port devices listen on
    pub remote_port: u16,

    /// Receive buffer size; longer datagrams are truncated
    pub max_datagram_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            local_address: format!("0.0.0.0:{DEFAULT_UDP_PORT}"),
            remote_port: DEFAULT_UDP_PORT,
            max_datagram_size: 2048,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.local_address.is_empty() {
            errors.push("Local address cannot be empty".to_string());
        } else if self.local_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid local address format: '{}' (expected format: '0.0.0.0:18530')",
                self.local_address
            ));
        }

        if self.remote_port == 0 {
            errors.push("Remote port cannot be 0".to_string());
        }

        // Header plus the largest payload the length byte can describe
        if self.max_datagram_size < 264 {
            errors.push(format!(
                "Max datagram size too small: {} bytes (minimum: 264)",
                self.max_datagram_size
            ));
        } else if self.max_datagram_size > 65_507 {
            errors.push(format!(
                "Max datagram size too large: {} bytes (UDP maximum: 65507)",
                self.max_datagram_size
            ));
        }

        errors
    }
}

/// Payload constants and key material shared by the devices
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub device_type: u8,

    pub factory_code: u8,

    pub license_data: u16,

    /// Whether outgoing payloads are encrypted
    pub use_encryption: bool,

    /// 16-character AES key
    pub aes_key: String,

    /// 16-character AES initialization vector
    pub aes_iv: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let keys = CipherKeys::default();
        Self {
            device_type: DEFAULT_DEVICE_TYPE,
            factory_code: DEFAULT_FACTORY_CODE,
            license_data: DEFAULT_LICENSE_DATA,
            use_encryption: true,
            aes_key: String::from_utf8_lossy(keys.key()).into_owned(),
            aes_iv: String::from_utf8_lossy(keys.iv()).into_owned(),
        }
    }
}

impl DeviceConfig {
    pub fn cipher_keys(&self) -> Result<CipherKeys> {
        CipherKeys::from_strings(&self.aes_key, &self.aes_iv)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.aes_key.len() != 16 {
            errors.push(format!(
                "AES key must be exactly 16 bytes, got {}",
                self.aes_key.len()
            ));
        }

        if self.aes_iv.len() != 16 {
            errors.push(format!(
                "AES IV must be exactly 16 bytes, got {}",
                self.aes_iv.len()
            ));
        }

        if !self.use_encryption {
            errors.push(
                "WARNING: Encryption is disabled - devices may ignore clear-text packets"
                    .to_string(),
            );
        }

        errors
    }
}

/// Request timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Deadline for each request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Heartbeat interval used after a failed heartbeat
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Whether registering a device starts its keep-alive loop
    pub start_heart_beat_loop: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: timeout::DEFAULT_TIMEOUT,
            heartbeat_interval: timeout::KEEPALIVE_INTERVAL,
            start_heart_beat_loop: true,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.request_timeout.as_millis() < 10 {
            errors.push("Request timeout too short (minimum: 10ms)".to_string());
        } else if self.request_timeout.as_secs() > 60 {
            errors.push("Request timeout too long (maximum: 60s)".to_string());
        }

        if self.heartbeat_interval.as_millis() < 100 {
            errors.push("Heartbeat interval too short (minimum: 100ms)".to_string());
        } else if self.heartbeat_interval.as_secs() > 3600 {
            errors.push("Heartbeat interval too long (maximum: 1 hour)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("recswitch"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
