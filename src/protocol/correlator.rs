//! Request/response correlation.
//!
//! Every request sent through the [`Correlator`] is registered under its
//! `(device address, message id)` key together with a one-shot result slot and
//! a deadline timer. The entry is finalized exactly once: by a matching inbound
//! packet, by its deadline, or by the caller dropping the [`PendingReply`].
//! Whichever path removes the entry from the table wins; the others find
//! nothing and do nothing.
//!
//! ```text
//!            send()
//!              |
//!              v
//!          [Pending] --matching packet--> [Fulfilled]
//!              |
//!              +------- deadline -------> [TimedOut]
//!              |
//!              +---- handle dropped ----> (removed)
//! ```

use crate::core::address::MacAddress;
use crate::core::codec;
use crate::core::command::{Command, CommandTag, Response};
use crate::core::session::Session;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::ReportDispatcher;
use crate::transport::Transmit;
use crate::utils::crypto::KeyResolver;
use crate::utils::metrics::global_metrics;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Identifies one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub address: MacAddress,
    pub message_id: u16,
}

/// What happened to an inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Completed the pending request with this key
    Fulfilled(RequestKey),
    /// Unsolicited relay change handed to the device's handler
    Reported,
    /// Valid packet that matched nothing (stale, duplicate or unhandled)
    Dropped,
    /// Packet the decoder refused
    Rejected,
}

struct PendingRequest {
    sender: oneshot::Sender<Result<Response>>,
    deadline: JoinHandle<()>,
    command: CommandTag,
    sent_at: Instant,
}

type PendingTable = HashMap<RequestKey, PendingRequest>;

struct Shared {
    pending: Mutex<PendingTable>,
    channel: Arc<dyn Transmit>,
    keys: Arc<dyn KeyResolver + Send + Sync>,
    reports: ReportDispatcher,
    timeout: Duration,
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, PendingTable> {
        // Critical sections never panic, so a poisoned table is still consistent.
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take(&self, key: &RequestKey) -> Option<PendingRequest> {
        let request = self.table().remove(key)?;
        request.deadline.abort();
        Some(request)
    }

    fn complete(&self, key: RequestKey, response: Response) -> bool {
        let Some(request) = self.take(&key) else {
            return false;
        };

        let elapsed = request.sent_at.elapsed();
        if request.sender.send(Ok(response)).is_ok() {
            global_metrics().request_fulfilled();
            debug!(
                address = %key.address,
                message_id = key.message_id,
                command = ?request.command,
                elapsed_ms = elapsed.as_millis(),
                "Request fulfilled"
            );
        } else {
            global_metrics().request_cancelled();
            debug!(
                address = %key.address,
                message_id = key.message_id,
                "Reply arrived for an abandoned request"
            );
        }
        true
    }

    fn expire(&self, key: &RequestKey) -> bool {
        let Some(request) = self.take(key) else {
            debug!(
                address = %key.address,
                message_id = key.message_id,
                "Deadline fired for a completed request"
            );
            return false;
        };

        global_metrics().request_timed_out();
        warn!(
            address = %key.address,
            message_id = key.message_id,
            command = ?request.command,
            timeout_ms = self.timeout.as_millis(),
            "Request timed out"
        );
        let _ = request.sender.send(Err(ProtocolError::Timeout));
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let table = self
            .pending
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, request) in table.drain() {
            request.deadline.abort();
        }
    }
}

/// Matches outgoing requests to incoming replies, with timeout fallback.
///
/// Cheap to clone; clones share one pending table.
#[derive(Clone)]
pub struct Correlator {
    shared: Arc<Shared>,
}

impl Correlator {
    pub fn new(
        channel: Arc<dyn Transmit>,
        keys: Arc<dyn KeyResolver + Send + Sync>,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                channel,
                keys,
                reports: ReportDispatcher::new(),
                timeout,
            }),
        }
    }

    /// Handlers for unsolicited relay change reports
    pub fn reports(&self) -> &ReportDispatcher {
        &self.shared.reports
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    pub fn pending_count(&self) -> usize {
        self.shared.table().len()
    }

    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.shared.table().contains_key(key)
    }

    /// Encode `command`, register it and transmit it to `destination`.
    ///
    /// The returned handle resolves with the reply, or with `Timeout` once the
    /// deadline passes. Fails immediately with `ChannelUnavailable`, without
    /// registering anything, when the channel cannot send.
    #[instrument(skip(self, session, command), fields(address = %session.address(), command = ?command.tag()))]
    pub async fn send(
        &self,
        session: &Session,
        command: &Command,
        destination: SocketAddr,
    ) -> Result<PendingReply> {
        if !self.shared.channel.is_available() {
            return Err(ProtocolError::ChannelUnavailable);
        }

        let (message_id, packet) = codec::encode(session, command)?;
        let key = RequestKey {
            address: session.address(),
            message_id,
        };

        // Register before transmitting so an immediate reply finds its entry.
        let receiver = self.register(key, command.tag())?;

        if let Err(e) = self.shared.channel.send_to(&packet, destination).await {
            self.shared.take(&key);
            warn!(error = %e, message_id, "Failed to transmit request");
            return Err(e);
        }

        global_metrics().request_sent();
        debug!(message_id, %destination, len = packet.len(), "Request sent");

        Ok(PendingReply {
            key,
            receiver,
            shared: Arc::downgrade(&self.shared),
            finished: false,
        })
    }

    fn register(
        &self,
        key: RequestKey,
        command: CommandTag,
    ) -> Result<oneshot::Receiver<Result<Response>>> {
        let mut table = self
            .shared
            .pending
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_CORRELATOR_LOCK.to_string()))?;

        if table.contains_key(&key) {
            return Err(ProtocolError::DuplicateMessageId(key.message_id));
        }

        let (sender, receiver) = oneshot::channel();
        let deadline = self.spawn_deadline(key);
        table.insert(
            key,
            PendingRequest {
                sender,
                deadline,
                command,
                sent_at: Instant::now(),
            },
        );
        Ok(receiver)
    }

    fn spawn_deadline(&self, key: RequestKey) -> JoinHandle<()> {
        let shared = Arc::downgrade(&self.shared);
        let timeout = self.shared.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = shared.upgrade() {
                shared.expire(&key);
            }
        })
    }

    /// Time out the request for `key` if it is still pending.
    ///
    /// Returns false when the request already completed.
    pub fn on_deadline(&self, key: &RequestKey) -> bool {
        self.shared.expire(key)
    }

    /// Route one inbound datagram.
    ///
    /// Undecodable datagrams are dropped without touching any pending request.
    /// Relay change reports are handed to their handler on a separate task and
    /// never complete a pending request with another id.
    pub fn on_packet_received(&self, data: &[u8]) -> Delivery {
        let decoded = match codec::decode(data, self.shared.keys.as_ref()) {
            Ok(decoded) => decoded,
            Err(e) => {
                global_metrics().decode_error();
                warn!(error = %e, len = data.len(), "Dropping undecodable datagram");
                return Delivery::Rejected;
            }
        };

        let key = RequestKey {
            address: decoded.address,
            message_id: decoded.message_id,
        };

        if self.shared.complete(key, decoded.response.clone()) {
            return Delivery::Fulfilled(key);
        }

        match (decoded.command, decoded.response) {
            (CommandTag::ReportGpioChange, Response::GpioStatus(status)) => {
                match self.shared.reports.dispatch(&decoded.address, status) {
                    Ok(true) => {
                        global_metrics().unsolicited_report();
                        info!(
                            address = %decoded.address,
                            flag = status.flag,
                            state = status.state,
                            "Relay change reported"
                        );
                        Delivery::Reported
                    }
                    Ok(false) => {
                        global_metrics().packet_dropped();
                        debug!(address = %decoded.address, "No handler for relay change report");
                        Delivery::Dropped
                    }
                    Err(e) => {
                        global_metrics().packet_dropped();
                        warn!(error = %e, "Failed to dispatch relay change report");
                        Delivery::Dropped
                    }
                }
            }
            (command, _) => {
                global_metrics().packet_dropped();
                debug!(
                    address = %decoded.address,
                    message_id = decoded.message_id,
                    ?command,
                    "Dropping unmatched packet"
                );
                Delivery::Dropped
            }
        }
    }

    /// Fail every pending request with `Cancelled`. Returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingRequest> = self.shared.table().drain().map(|(_, r)| r).collect();
        let count = drained.len();
        for request in drained {
            request.deadline.abort();
            global_metrics().request_cancelled();
            let _ = request.sender.send(Err(ProtocolError::Cancelled));
        }
        if count > 0 {
            info!(count, "Cancelled pending requests");
        }
        count
    }
}

/// Handle to one in-flight request.
///
/// Resolves exactly once. Dropping it before it resolves abandons the request:
/// its entry is removed and its deadline timer aborted.
#[must_use = "dropping the handle abandons the request"]
pub struct PendingReply {
    key: RequestKey,
    receiver: oneshot::Receiver<Result<Response>>,
    shared: Weak<Shared>,
    finished: bool,
}

impl PendingReply {
    pub fn key(&self) -> RequestKey {
        self.key
    }

    pub fn message_id(&self) -> u16 {
        self.key.message_id
    }
}

impl Future for PendingReply {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(result) => {
                this.finished = true;
                // The sender only disappears unsent when the correlator is gone.
                Poll::Ready(result.unwrap_or_else(|_| Err(ProtocolError::Cancelled)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            if shared.take(&self.key).is_some() {
                global_metrics().request_cancelled();
                debug!(
                    address = %self.key.address,
                    message_id = self.key.message_id,
                    "Request abandoned by caller"
                );
            }
        }
    }
}
