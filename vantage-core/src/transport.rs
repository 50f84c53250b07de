//! UDP transport: one FramePacket out per frame, ActionPackets in.
//!
//! A single socket serves both directions. The send loop and the
//! receive loop share it through an `Arc`; `send_to` and `recv_from`
//! take `&self`, so no lock is needed.
//!
//! Frames are never split: each datagram is exactly
//! `HEADER_SIZE + length` bytes, and anything lost stays lost.
//!
//! Only the configured remote may drive the receive side; datagrams
//! from any other address are counted and dropped.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use tracing::debug;

use crate::error::VantageError;
use crate::protocol::{ACTION_PACKET_SIZE, ActionPacket, FramePacket, MAX_FRAME_PACKET_SIZE};

/// Receive buffer; large enough to notice oversized datagrams.
const RECV_BUFFER_SIZE: usize = 512;

// ── TransportStats ───────────────────────────────────────────────

/// Counters since the transport was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportStats {
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub datagrams_received: u64,
    pub malformed: u64,
    /// Datagrams from an address other than the remote.
    pub foreign: u64,
}

// ── DatagramTransport ────────────────────────────────────────────

/// What the send and receive loops need from a transport.
pub trait DatagramTransport: Send + Sync {
    /// Put one frame on the wire; returns the bytes sent.
    fn send_frame(
        &self,
        packet: &FramePacket,
        scratch: &mut BytesMut,
    ) -> Result<usize, VantageError>;

    /// Wait up to the receive timeout for one action. `Ok(None)` when
    /// nothing usable arrived.
    fn recv_action(&self) -> Result<Option<ActionPacket>, VantageError>;

    fn stats(&self) -> TransportStats;

    fn local_addr(&self) -> Result<SocketAddr, VantageError>;

    fn remote_addr(&self) -> SocketAddr;
}

// ── UdpTransport ─────────────────────────────────────────────────

pub struct UdpTransport {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    datagrams_received: AtomicU64,
    malformed: AtomicU64,
    foreign: AtomicU64,
}

impl UdpTransport {
    /// Bind `bind_addr` and target `remote_addr`.
    ///
    /// `recv_timeout` bounds each receive call so the receive loop can
    /// notice the stop signal.
    pub fn bind<A, B>(
        bind_addr: A,
        remote_addr: B,
        recv_timeout: Duration,
    ) -> Result<Self, VantageError>
    where
        A: ToSocketAddrs,
        B: ToSocketAddrs,
    {
        let remote_addr = remote_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| VantageError::Other("remote address resolved to nothing".into()))?;
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_read_timeout(Some(recv_timeout.max(Duration::from_millis(1))))?;
        Ok(Self::new(socket, remote_addr))
    }

    /// Wrap an already-bound socket.
    pub fn new(socket: UdpSocket, remote_addr: SocketAddr) -> Self {
        Self {
            socket,
            remote_addr,
            datagrams_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            foreign: AtomicU64::new(0),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, VantageError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Serialize `packet` into `scratch` and send it as one datagram.
    ///
    /// Returns the number of bytes put on the wire.
    pub fn send_frame(
        &self,
        packet: &FramePacket,
        scratch: &mut BytesMut,
    ) -> Result<usize, VantageError> {
        scratch.clear();
        packet.encode(scratch)?;
        debug_assert!(scratch.len() <= MAX_FRAME_PACKET_SIZE);

        let sent = self.socket.send_to(&scratch[..], self.remote_addr)?;
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        Ok(sent)
    }

    /// Wait up to the receive timeout for one ActionPacket.
    ///
    /// `Ok(None)` on timeout, for a datagram of the wrong size, or for
    /// one that did not come from the remote.
    pub fn recv_action(&self) -> Result<Option<ActionPacket>, VantageError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (len, from) = match self.socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);

        if from != self.remote_addr {
            self.foreign.fetch_add(1, Ordering::Relaxed);
            debug!("ignoring {len}-byte datagram from unexpected sender {from}");
            return Ok(None);
        }
        if len != ACTION_PACKET_SIZE {
            self.malformed.fetch_add(1, Ordering::Relaxed);
            debug!("discarding {len}-byte datagram from {from}");
            return Ok(None);
        }
        ActionPacket::decode(&buf[..len]).map(Some)
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            foreign: self.foreign.load(Ordering::Relaxed),
        }
    }
}

impl DatagramTransport for UdpTransport {
    fn send_frame(
        &self,
        packet: &FramePacket,
        scratch: &mut BytesMut,
    ) -> Result<usize, VantageError> {
        UdpTransport::send_frame(self, packet, scratch)
    }

    fn recv_action(&self) -> Result<Option<ActionPacket>, VantageError> {
        UdpTransport::recv_action(self)
    }

    fn stats(&self) -> TransportStats {
        UdpTransport::stats(self)
    }

    fn local_addr(&self) -> Result<SocketAddr, VantageError> {
        UdpTransport::local_addr(self)
    }

    fn remote_addr(&self) -> SocketAddr {
        UdpTransport::remote_addr(self)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::minimap::MinimapState;
    use crate::protocol::{HEADER_SIZE, KeyIdentity, KeySnapshot};

    fn pair() -> (UdpTransport, UdpSocket) {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let transport = UdpTransport::bind(
            "127.0.0.1:0",
            peer.local_addr().unwrap(),
            Duration::from_millis(500),
        )
        .unwrap();
        (transport, peer)
    }

    #[test]
    fn sends_header_plus_payload_only() {
        let (transport, peer) = pair();
        let packet = FramePacket {
            metrics: Metrics::default(),
            minimap: MinimapState::unlocalized(),
            frame_number: 5,
            keys: KeySnapshot::default(),
            payload: vec![0x42; 1000],
        };

        let mut scratch = BytesMut::new();
        let sent = transport.send_frame(&packet, &mut scratch).unwrap();
        assert_eq!(sent, HEADER_SIZE + 1000);

        let mut buf = vec![0u8; MAX_FRAME_PACKET_SIZE];
        let (len, _) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(len, HEADER_SIZE + 1000);
        assert_eq!(FramePacket::decode(&buf[..len]).unwrap(), packet);

        let stats = transport.stats();
        assert_eq!(stats.datagrams_sent, 1);
        assert_eq!(stats.bytes_sent, (HEADER_SIZE + 1000) as u64);
    }

    #[test]
    fn receive_times_out_quietly() {
        let (transport, _peer) = pair();
        assert!(transport.recv_action().unwrap().is_none());
    }

    #[test]
    fn receives_action_and_discards_malformed() {
        let (transport, peer) = pair();
        let to = transport.local_addr().unwrap();

        peer.send_to(&[1u8; 10], to).unwrap();
        let action = ActionPacket::new([KeyIdentity::virtual_key(65)].into_iter().collect());
        peer.send_to(&action.encode(), to).unwrap();

        assert!(transport.recv_action().unwrap().is_none());
        let got = transport.recv_action().unwrap().unwrap();
        assert_eq!(got, action);

        let stats = transport.stats();
        assert_eq!(stats.datagrams_received, 2);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn actions_from_other_senders_are_ignored() {
        let (transport, peer) = pair();
        let to = transport.local_addr().unwrap();
        let stranger = UdpSocket::bind("127.0.0.1:0").unwrap();

        let action = ActionPacket::new([KeyIdentity::virtual_key(65)].into_iter().collect());
        stranger.send_to(&action.encode(), to).unwrap();
        peer.send_to(&action.encode(), to).unwrap();

        assert!(transport.recv_action().unwrap().is_none());
        assert_eq!(transport.recv_action().unwrap(), Some(action));

        let stats = transport.stats();
        assert_eq!(stats.foreign, 1);
        assert_eq!(stats.malformed, 0);
    }
}
