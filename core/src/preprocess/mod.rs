//! Packet preprocessors: the first thing each transport does with a decoded
//! packet, before it reaches application-level dispatch.

pub mod tcp;
pub mod udp;

/// Whether a preprocessor fully handled a packet (no further dispatch) or
/// left it for the general read loop to hand off to `on_received`/
/// `on_request_received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
    Yes,
    No,
}
