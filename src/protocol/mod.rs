//! # Protocol Layer
//!
//! Request/response matching and routing of device-initiated packets.
//!
//! ## Components
//! - **Correlator**: pending request table with deadlines
//! - **Dispatcher**: per-device handlers for unsolicited relay changes

pub mod correlator;
pub mod dispatcher;
