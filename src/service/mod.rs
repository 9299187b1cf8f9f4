//! # Service Layer
//!
//! Device-facing API built on the correlator.
//!
//! ## Components
//! - **Device**: typed operations and the keep-alive loop for one module
//! - **RecSwitchNetwork**: registry of devices sharing one UDP endpoint
//! - **BlockingClient**: synchronous request/reply over a std socket

pub mod blocking;
pub mod device;
pub mod network;

pub use blocking::BlockingClient;
pub use device::Device;
pub use network::RecSwitchNetwork;
