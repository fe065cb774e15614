//! Per-session UDP endpoint state.

use std::net::SocketAddr;

use parking_lot::RwLock;

/// The UDP-side state a session tracks once it begins rendezvous.
///
/// `punched_endpoint` is set exactly once per session (§3 invariant): the
/// first [`set_punched_endpoint`](Self::set_punched_endpoint) call wins and
/// reports `true`; every later call (even with a different address, e.g. a
/// client behind a roaming NAT) is a no-op reporting `false`, so callers can
/// make `add_session`-to-the-reverse-index idempotent.
#[derive(Default)]
pub struct UdpChannel {
    local_endpoint: RwLock<Option<SocketAddr>>,
    remote_endpoint: RwLock<Option<SocketAddr>>,
    punched_endpoint: RwLock<Option<SocketAddr>>,
}

impl UdpChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local_endpoint(&self, addr: SocketAddr) {
        *self.local_endpoint.write() = Some(addr);
    }

    pub fn local_endpoint(&self) -> Option<SocketAddr> {
        *self.local_endpoint.read()
    }

    pub fn set_remote_endpoint(&self, addr: SocketAddr) {
        *self.remote_endpoint.write() = Some(addr);
    }

    pub fn remote_endpoint(&self) -> Option<SocketAddr> {
        *self.remote_endpoint.read()
    }

    pub fn punched_endpoint(&self) -> Option<SocketAddr> {
        *self.punched_endpoint.read()
    }

    /// Attempt to set the punched endpoint. Returns `true` iff this call was
    /// the first to succeed (the caller should then register the session in
    /// the [`crate::net::udp_endpoint::UdpEndpoint`] reverse index).
    pub fn set_punched_endpoint(&self, addr: SocketAddr) -> bool {
        let mut slot = self.punched_endpoint.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(addr);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punched_endpoint_set_once() {
        let channel = UdpChannel::new();
        let a: SocketAddr = "127.0.0.1:1000".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:2000".parse().unwrap();

        assert!(channel.set_punched_endpoint(a));
        assert!(!channel.set_punched_endpoint(b));
        assert_eq!(channel.punched_endpoint(), Some(a));
    }
}
