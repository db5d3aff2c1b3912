mod stream;

use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::buffer::BufferSet;
use crate::error::{Error, Result};
use crate::protocol::{Operation, Packet, MAX_PACKET_LEN};
use crate::resilience::TimeoutConfig;
use stream::Stream;

/// One outstanding request, tracked so `receive_async` can enforce the
/// response-ordering contract and so `pending.len()` satisfies invariant 9.
struct PendingEntry {
    #[allow(dead_code)]
    correlation_id: u64,
    #[allow(dead_code)]
    packet_id: u32,
    #[allow(dead_code)]
    timestamp: u64,
}

/// Owns the TCP socket and the framed send/receive protocol. A connection is
/// a shared mutable resource used by one thread at a time: all calls on a
/// given `Transport` must be serialized by the caller, the same posture as
/// the teacher's `Conn`, which is a plain owned struct passed by `&mut self`.
pub struct Transport {
    socket: Option<Stream>,
    buffers: BufferSet,
    packet_id: u32,
    session_id: u32,
    correlation_counter: u64,
    pending: VecDeque<PendingEntry>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            socket: None,
            buffers: BufferSet::new(),
            packet_id: 0,
            session_id: 0,
            correlation_counter: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Outstanding requests sent but not yet received; satisfies invariant 9
    /// (`pending.len()` == sends since connect − receives since connect).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn connect(&mut self, host: &str, port: u16, tcp_nodelay: bool, timeouts: &TimeoutConfig) -> Result<()> {
        let socket = Stream::connect(host, port, timeouts.connect_timeout())?;
        socket.set_nodelay(tcp_nodelay)?;

        self.session_id = rand::thread_rng().next_u32();
        self.packet_id = 0;
        self.correlation_counter = 0;
        self.pending.clear();
        self.socket = Some(socket);

        tracing::debug!(target: "shinydb_client::transport", host, port, "connected");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.socket = None;
        self.pending.clear();
        tracing::debug!(target: "shinydb_client::transport", "disconnected");
    }

    /// Frame and send `operation`. Returns the `correlation_id` assigned to
    /// this request. `operation_deadline` is the overall exchange budget (if
    /// any, threaded through from `do_operation`); `write_timeout` is the
    /// independent per-write budget from `TimeoutConfig::write_ms`. The
    /// tighter of the two governs the socket-level deadline, per §4.3 (each
    /// budget "disables the corresponding deadline check" independently).
    pub fn send_async(
        &mut self,
        operation: Operation,
        operation_deadline: Option<Instant>,
        write_timeout: Option<Duration>,
    ) -> Result<u64> {
        let socket = self.socket.as_mut().ok_or(Error::ConnectionFailed)?;
        let deadline = combine_deadlines(write_timeout, operation_deadline);

        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(Error::WriteTimeout);
        }

        self.correlation_counter += 1;
        let correlation_id = self.correlation_counter;
        self.packet_id = self.packet_id.wrapping_add(1);
        let timestamp = now_millis();

        let packet = Packet {
            packet_id: self.packet_id,
            session_id: self.session_id,
            correlation_id,
            timestamp,
            operation,
        };

        let buf = self.buffers.new_write_buffer();
        packet.encode(buf);
        let payload_len = self.buffers.payload_len();
        if payload_len > MAX_PACKET_LEN {
            return Err(Error::BufferOverflow);
        }
        let buf = &mut self.buffers.write_buffer;
        let len_bytes = (payload_len as u32).to_le_bytes();
        buf[..4].copy_from_slice(&len_bytes);

        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::WriteTimeout);
            }
            socket.set_write_timeout(Some(remaining))?;
        }

        socket.write_all(buf)?;
        socket.flush()?;

        self.pending.push_back(PendingEntry { correlation_id, packet_id: self.packet_id, timestamp });
        Ok(correlation_id)
    }

    /// Read the next framed response, in send order. Does not use
    /// `correlation_id` to reorder; it pairs with the head of `pending` as a
    /// diagnostic aid only. `operation_deadline`/`read_timeout` combine the
    /// same way as in `send_async`.
    pub fn receive_async(
        &mut self,
        operation_deadline: Option<Instant>,
        read_timeout: Option<Duration>,
    ) -> Result<Packet> {
        let socket = self.socket.as_mut().ok_or(Error::ConnectionFailed)?;
        let deadline = combine_deadlines(read_timeout, operation_deadline);
        if self.pending.is_empty() {
            return Err(Error::InvalidResponse("no outstanding request".into()));
        }

        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::ReadTimeout);
            }
            socket.set_read_timeout(Some(remaining))?;
        }

        let mut len_buf = [0u8; 4];
        socket.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_PACKET_LEN {
            return Err(Error::InvalidResponse("packet exceeds 16 MiB cap".into()));
        }

        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::ReadTimeout);
            }
            socket.set_read_timeout(Some(remaining))?;
        }

        self.buffers.read_buffer.clear();
        self.buffers.read_buffer.resize(len, 0);
        socket.read_exact(&mut self.buffers.read_buffer)?;

        let packet = Packet::decode(&self.buffers.read_buffer)?;
        self.pending.pop_front();
        Ok(packet)
    }

    /// Send `operation` and wait for its reply, budgeting the whole exchange
    /// against `timeouts.operation_ms` while also honoring `write_ms`/
    /// `read_ms` independently on each half of the exchange (§4.3).
    pub fn do_operation(&mut self, operation: Operation, timeouts: &TimeoutConfig) -> Result<Packet> {
        let deadline = timeouts.operation_timeout().map(|d| Instant::now() + d);

        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(Error::Timeout);
        }
        self.send_async(operation, deadline, timeouts.write_timeout())?;

        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(Error::Timeout);
        }
        self.receive_async(deadline, timeouts.read_timeout())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Combines an independent per-call budget (`read_ms`/`write_ms`) with the
/// overall operation deadline, picking whichever is tighter. Either half may
/// be absent, per §4.3's "any unset budget disables the corresponding
/// deadline check".
fn combine_deadlines(io_timeout: Option<Duration>, operation_deadline: Option<Instant>) -> Option<Instant> {
    let io_deadline = io_timeout.map(|d| Instant::now() + d);
    match (io_deadline, operation_deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_transport_is_not_connected() {
        let transport = Transport::new();
        assert!(!transport.is_connected());
        assert_eq!(transport.pending_len(), 0);
    }

    #[test]
    fn send_without_connection_fails() {
        let mut transport = Transport::new();
        let err = transport.send_async(Operation::Flush, None, None).unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed));
    }

    #[test]
    fn receive_without_connection_fails() {
        let mut transport = Transport::new();
        let err = transport.receive_async(None, None).unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed));
    }

    #[test]
    fn combine_deadlines_picks_the_tighter_bound() {
        let now = Instant::now();
        let far = now + Duration::from_secs(60);
        let near = Some(Duration::from_millis(0));
        let combined = combine_deadlines(near, Some(far)).expect("some deadline");
        assert!(combined <= far);
        assert!(combine_deadlines(None, None).is_none());
        assert_eq!(combine_deadlines(None, Some(far)), Some(far));
    }
}
