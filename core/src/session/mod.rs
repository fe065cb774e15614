//! Session identity, lifecycle state machine, and per-connection runtime.
//!
//! A [`Session`] owns the TCP channel (always) and, when the UDP service is
//! enabled, a [`UdpChannel`]. It is created by the [`factory`], owned
//! exclusively by the [`registry`] between `insert` and `remove`, and ticked
//! by the [`crate::scheduler::UpdateScheduler`].

pub mod factory;
pub mod registry;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

pub use factory::SessionFactory;
pub use registry::SessionRegistry;

use crate::channel::{TcpChannel, UdpChannel};

/// 16-bit session identifier. `0` is reserved for "the server itself" and is
/// never assigned to a connected client.
pub type SessionId = u16;

/// 64-bit nonce binding a TCP-established identity to its UDP rendezvous.
pub type ConnectId = i64;

/// Session lifecycle state machine (§3): `Init -> Connected -> Closing -> Closed`.
/// Transitions are linear and never go backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Init = 0,
    Connected = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Connected,
            2 => SessionState::Closing,
            3 => SessionState::Closed,
            _ => SessionState::Init,
        }
    }
}

/// Per-connection state: identity, transports, lifecycle, and liveness.
///
/// `tcp` is behind a `Mutex` because both the session's own read loop (to
/// write replies) and the UDP rendezvous preprocessor may touch the UDP side
/// concurrently; `state` is a plain atomic since it only ever moves forward.
pub struct Session {
    pub id: SessionId,
    pub connect_id: ConnectId,
    pub tcp: Mutex<TcpChannel>,
    pub udp: Option<UdpChannel>,
    state: AtomicU8,
    last_activity: Mutex<Instant>,
}

impl Session {
    pub fn new(id: SessionId, connect_id: ConnectId, tcp: TcpChannel, udp: Option<UdpChannel>) -> Self {
        Session {
            id,
            connect_id,
            tcp: Mutex::new(tcp),
            udp,
            state: AtomicU8::new(SessionState::Init as u8),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.tcp.lock().peer_addr()
    }

    /// Advance keepalive/reliability timers. A no-op once the session is
    /// closing or closed (§4.1: a session removed mid-iteration may still
    /// receive one trailing tick).
    pub fn update(&self, _elapsed: std::time::Duration) {
        if self.is_closed() {
            return;
        }
        // Keepalive/retransmit timers live on the external TcpChannel/UdpChannel
        // reliability layer in a full deployment; this core only guarantees the
        // tick is delivered and is a safe no-op once closing.
    }

    /// Begin closing: `Connected -> Closing`. Idempotent.
    pub fn begin_close(&self) {
        if self.state() == SessionState::Connected || self.state() == SessionState::Init {
            self.set_state(SessionState::Closing);
        }
    }

    /// Finish closing: `Closing -> Closed`. Idempotent.
    pub fn finish_close(&self) {
        self.set_state(SessionState::Closed);
    }
}

/// Hooks an embedder implements to observe session and server lifecycle.
///
/// Default (no-op) bodies mean embedders only override what they need.
pub trait ServerEvents: Send + Sync {
    fn on_session_connected(&self, _session: &Session) {}
    fn on_session_closed(&self, _session: &Session) {}
    /// A one-way application message. Returning nothing back to the client.
    fn on_session_received(&self, _session: &Session, _payload: &[u8]) {}
    /// An RPC-style request that expects a response payload.
    fn on_session_request_received(&self, _session: &Session, payload: &[u8]) -> Vec<u8> {
        payload.to_vec()
    }
    fn on_session_errored(&self, _session: &Session, _error: &crate::error::ServerError) {}
    fn on_errored(&self, _error: &crate::error::ServerError) {}
}

/// A `ServerEvents` implementation that logs everything at `debug`/`warn` and
/// otherwise does nothing; used as the default when an embedder supplies none.
#[derive(Default)]
pub struct NoopEvents;

impl ServerEvents for NoopEvents {}
