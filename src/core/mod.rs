//! # Core Protocol Components
//!
//! Wire format, per-device session state and the stateless codec.
//!
//! ## Components
//! - **Address**: six-byte device identity parsed from text
//! - **Session**: key material and the rolling message-id generator
//! - **Packet**: header layout, padding and the encryption layer
//! - **Command**: command tags, request bodies and typed responses
//! - **Codec**: `encode`/`decode` between commands and datagrams
//!
//! ## Wire Format
//! ```text
//! [Version(1)] [Flags(1)] [Address(6)] [Length(1)] [Payload(N)]
//! Payload: [Reserved(1)] [MessageId(2)] [DeviceType(1)] [FactoryCode(1)]
//!          [License(2)] [Tag(1)] [Body] [0x04 padding to >= 16 bytes]
//! ```
//!
//! ## Security
//! - AES-128-CBC over the whole payload when the encrypted flag is set
//! - Length and version are validated before any payload byte is read

pub mod address;
pub mod codec;
pub mod command;
pub mod packet;
pub mod session;
