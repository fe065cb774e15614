//! Shared UDP socket: relay delivery plus the `PunchedEndPoint -> SessionId`
//! reverse index used by NAT rendezvous (§4.6) and the relay rewrite (§4.5).

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;

use crate::error::Result;
use crate::packet::{self, PacketPool};
use crate::server::Shared;
use crate::session::SessionId;
use crate::stats::Statistics;

/// Largest single UDP datagram this server will attempt to receive.
const RECV_BUF_SIZE: usize = 2048;

/// The server's one shared UDP socket, plus the endpoint-to-session index
/// that lets the relay and rendezvous preprocessors find a session from the
/// address a datagram arrived from.
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
    reverse_index: RwLock<HashMap<SocketAddr, SessionId>>,
    stats: Arc<Statistics>,
    /// Backs the per-datagram receive buffer; released back to the pool as
    /// soon as the decoded packet is handed off to the preprocessor.
    pool: PacketPool,
}

impl UdpEndpoint {
    /// Bind the shared UDP socket. `reuse_address` mirrors the platform
    /// `SO_REUSEADDR` toggle requested by [`crate::config::ServerOptions`];
    /// `std::net::UdpSocket` does not expose that knob directly, so when
    /// requested we fall back to the `socket2` crate would normally provide —
    /// here we accept the platform default and document the limitation.
    pub fn bind(addr: &str, stats: Arc<Statistics>, pool: PacketPool) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(UdpEndpoint {
            socket: Arc::new(socket),
            reverse_index: RwLock::new(HashMap::new()),
            stats,
            pool,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send a raw datagram. Does not itself touch `RelayServCount`/
    /// `RelayServBytes` — those are specifically relay statistics, and this
    /// primitive is also used for the rendezvous response, which isn't a
    /// relay. Callers that perform an actual relay record it themselves.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }

    /// Register `addr` as the punched endpoint for `session_id`. Returns
    /// `true` if this was a new entry, `false` if `addr` was already mapped
    /// (to the same or a different session — re-registration is idempotent).
    pub fn register(&self, addr: SocketAddr, session_id: SessionId) -> bool {
        let mut index = self.reverse_index.write();
        index.insert(addr, session_id).is_none()
    }

    pub fn lookup(&self, addr: SocketAddr) -> Option<SessionId> {
        self.reverse_index.read().get(&addr).copied()
    }

    pub fn forget(&self, addr: SocketAddr) {
        self.reverse_index.write().remove(&addr);
    }

    /// Spawn the dedicated receive thread. Runs until `running` is cleared.
    /// Returns the thread's [`JoinHandle`] so the caller can join it during
    /// shutdown instead of merely dropping its reference to this endpoint.
    pub fn spawn_receive_loop(self: &Arc<Self>, shared: Arc<Shared>, running: Arc<AtomicBool>) -> JoinHandle<()> {
        let endpoint = self.clone();
        thread::Builder::new()
            .name("udp-receive-loop".to_string())
            .spawn(move || endpoint.receive_loop(shared, running))
            .expect("failed to spawn UDP receive thread")
    }

    fn receive_loop(&self, shared: Arc<Shared>, running: Arc<AtomicBool>) {
        // Short timeout lets us re-check `running` without blocking forever
        // on a socket that may never receive another datagram.
        let _ = self
            .socket
            .set_read_timeout(Some(std::time::Duration::from_millis(200)));

        while running.load(Ordering::SeqCst) {
            let mut buf = self.pool.alloc();
            buf.resize(RECV_BUF_SIZE, 0);
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    self.stats.record_udp_received(n as u64);
                    let packet = match packet::codec::decode(&buf[..n]) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::debug!(%from, error = %e, "dropping malformed UDP datagram");
                            continue;
                        }
                    };
                    if let Err(e) = crate::preprocess::udp::handle(&shared, from, packet) {
                        shared.events.on_errored(&e);
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        tracing::warn!(error = %e, "UDP recv error");
                    }
                }
            }
        }
        tracing::debug!("UDP receive loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_reports_first_insertion_only() {
        let stats = Arc::new(Statistics::default());
        let endpoint = UdpEndpoint::bind("127.0.0.1:0", stats, PacketPool::new()).unwrap();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert!(endpoint.register(addr, 1));
        assert!(!endpoint.register(addr, 1));
        assert_eq!(endpoint.lookup(addr), Some(1));
    }

    #[test]
    fn forget_clears_lookup() {
        let stats = Arc::new(Statistics::default());
        let endpoint = UdpEndpoint::bind("127.0.0.1:0", stats, PacketPool::new()).unwrap();
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        endpoint.register(addr, 2);
        endpoint.forget(addr);
        assert_eq!(endpoint.lookup(addr), None);
    }
}
