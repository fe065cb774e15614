//! Per-session transport channels.
//!
//! - [`tcp::TcpChannel`] — framed read/write over a `TcpStream`.
//! - [`udp::UdpChannel`] — the three endpoints (local/remote/punched) a
//!   session's UDP half tracks, plus the set-once `PunchedEndPoint` invariant.

pub mod tcp;
pub mod udp;

pub use tcp::TcpChannel;
pub use udp::UdpChannel;
