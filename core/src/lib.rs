//! # session-relay-core — multiplayer session server
//!
//! A dual TCP/UDP session server: clients hold a long-lived TCP connection
//! for reliable application messages and RPC, and optionally a UDP path for
//! latency-sensitive traffic, relayed peer-to-peer, or rendezvoused directly
//! once NAT traversal succeeds.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Server        — state machine, wiring    │
//! ├──────────────────────────────────────────┤
//! │  SessionRegistry / SessionFactory         │
//! │  UpdateScheduler  — periodic session tick │
//! │  RpcDispatcher    — request/response chain│
//! │  P2pManager       — group membership      │
//! ├──────────────────────────────────────────┤
//! │  TCP PreProcessor — keepalive, P2P control│
//! │  UDP PreProcessor — relay rewrite, NAT     │
//! │                     rendezvous             │
//! ├──────────────────────────────────────────┤
//! │  TcpChannel / UdpChannel — per-session I/O│
//! │  PacketCodec / PacketPool — wire framing  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use session_relay::{Server, ServerOptions};
//!
//! let options = ServerOptions::builder()
//!     .tcp_bind("0.0.0.0:9000")
//!     .is_service_udp(true)
//!     .udp_server_port(9001)
//!     .max_session(64)
//!     .build();
//!
//! let mut server = Server::new(options);
//! server.start().unwrap();
//! ```
//!
//! ## Crate layout
//!
//! - [`server`] — [`Server`] orchestrator and the `None -> ... -> Stopped` state machine.
//! - [`session`] — [`session::Session`], [`session::SessionRegistry`], [`session::SessionFactory`].
//! - [`channel`] — per-session [`channel::TcpChannel`] / [`channel::UdpChannel`].
//! - [`packet`] — wire header layout, [`packet::codec`], and [`packet::PacketPool`].
//! - [`net`] — the TCP accept loop and the shared [`net::UdpEndpoint`].
//! - [`preprocess`] — the TCP and UDP preprocessors (keepalive, relay, rendezvous).
//! - [`rpc`] — [`rpc::RpcDispatcher`] and the [`rpc::RpcService`] trait.
//! - [`scheduler`] — [`scheduler::UpdateScheduler`], the periodic per-session tick.
//! - [`p2p`] — [`p2p::P2pManager`] group membership.
//! - [`config`] — [`config::ServerOptions`] and its builder.
//! - [`stats`] — [`stats::Statistics`] atomic counters.
//! - [`error`] — [`error::ServerError`] and the [`error::Result`] alias.

pub mod channel;
pub mod config;
pub mod error;
pub mod net;
pub mod p2p;
pub mod packet;
pub mod preprocess;
pub mod rpc;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod stats;

pub use config::ServerOptions;
pub use error::{Result, ServerError};
pub use server::{Server, ServerState};
pub use session::{ServerEvents, Session, SessionState};
pub use stats::Statistics;
