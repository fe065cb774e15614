//! Server-level network plumbing: the TCP accept loop and the shared UDP
//! endpoint used for both relay and NAT rendezvous.

pub mod listener;
pub mod udp_endpoint;

pub use listener::accept_loop;
pub use udp_endpoint::UdpEndpoint;
