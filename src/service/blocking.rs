//! Synchronous client for scripts and tools without an async runtime.
//!
//! One request at a time: the client sends, then reads datagrams until the
//! reply carrying the same device address and message id arrives or the
//! deadline passes. Anything else read meanwhile is discarded.

use crate::core::codec;
use crate::core::command::{Command, CommandTag, GpioStatus, HeartBeatAck, ModuleInfo, Response};
use crate::core::session::Session;
use crate::error::{ProtocolError, Result};
use crate::service::device::unexpected;
use crate::utils::metrics::{global_metrics, Timer};
use crate::utils::timeout::DEFAULT_TIMEOUT;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Debug)]
pub struct BlockingClient {
    socket: UdpSocket,
    timeout: Duration,
    max_datagram_size: usize,
}

impl BlockingClient {
    /// Bind a socket on `local`.
    pub fn bind(local: SocketAddr) -> Result<Self> {
        Ok(Self {
            socket: UdpSocket::bind(local)?,
            timeout: DEFAULT_TIMEOUT,
            max_datagram_size: 2048,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send `command` and wait for its reply.
    #[instrument(skip(self, session), fields(address = %session.address()))]
    pub fn request(
        &self,
        session: &Session,
        command: &Command,
        destination: SocketAddr,
    ) -> Result<Response> {
        let _timer = Timer::start("blocking_request");
        let (message_id, packet) = codec::encode(session, command)?;
        let sent = self.socket.send_to(&packet, destination)?;
        global_metrics().packet_sent(sent as u64);

        let deadline = Instant::now() + self.timeout;
        let mut buffer = vec![0u8; self.max_datagram_size];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                global_metrics().request_timed_out();
                return Err(ProtocolError::Timeout);
            }
            self.socket.set_read_timeout(Some(remaining))?;

            let (len, remote) = match self.socket.recv_from(&mut buffer) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    global_metrics().request_timed_out();
                    return Err(ProtocolError::Timeout);
                }
                Err(e) => return Err(e.into()),
            };
            global_metrics().packet_received(len as u64);

            match codec::decode(&buffer[..len], session) {
                Ok(decoded)
                    if decoded.address == session.address()
                        && decoded.message_id == message_id =>
                {
                    return Ok(decoded.response);
                }
                Ok(decoded) => {
                    global_metrics().packet_dropped();
                    debug!(%remote, message_id = decoded.message_id, "Skipping unrelated datagram");
                }
                Err(e) => {
                    global_metrics().decode_error();
                    debug!(%remote, error = %e, "Skipping undecodable datagram");
                }
            }
        }
    }

    pub fn heart_beat(&self, session: &Session, destination: SocketAddr) -> Result<HeartBeatAck> {
        match self.request(session, &Command::HeartBeat, destination)? {
            Response::HeartBeatAck(ack) => Ok(ack),
            other => Err(unexpected(CommandTag::HeartBeat, &other)),
        }
    }

    pub fn query_module_info(
        &self,
        session: &Session,
        destination: SocketAddr,
    ) -> Result<ModuleInfo> {
        match self.request(session, &Command::QueryModuleInfo, destination)? {
            Response::ModuleInfo(info) => Ok(info),
            other => Err(unexpected(CommandTag::QueryModuleInfo, &other)),
        }
    }

    pub fn get_gpio_status(
        &self,
        session: &Session,
        destination: SocketAddr,
        flag: u8,
    ) -> Result<GpioStatus> {
        match self.request(session, &Command::GetGpioStatus { flag }, destination)? {
            Response::GpioStatus(status) => Ok(status),
            other => Err(unexpected(CommandTag::GetGpioStatus, &other)),
        }
    }

    pub fn set_gpio_status(
        &self,
        session: &Session,
        destination: SocketAddr,
        flag: u8,
        state: bool,
    ) -> Result<GpioStatus> {
        match self.request(session, &Command::SetGpioStatus { flag, state }, destination)? {
            Response::GpioStatus(status) => Ok(status),
            other => Err(unexpected(CommandTag::SetGpioStatus, &other)),
        }
    }
}
