//! Wire packet model: header layout, properties, and pooled buffers.
//!
//! ## Packet layout (bit-exact, shared with clients)
//!
//! ```text
//! <header, HEADER_SIZE = 8 bytes>
//!  - property:                u8
//!  - delivery_method:         u8
//!  - p2p_session_id:          u16 LE
//!  - session_id_for_connect:  u16 LE
//!  - payload_len:             u16 LE
//! <payload, payload_len bytes>
//! ```

pub mod codec;
pub mod pool;

pub use pool::{PacketPool, PooledPacket};

/// Size in bytes of the fixed packet header: property(1) + delivery_method(1)
/// + p2p_session_id(2) + session_id_for_connection(2) + payload_len(2).
pub const HEADER_SIZE: usize = 8;

/// Control/application tag carried by every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    AliveCheck,
    UserData,
    Ack,
    ViewRequest,
    JoinP2p,
    LeaveP2p,
    RequestConnection,
    ResponseConnection,
    /// Unrecognized property byte; preserved so decode never panics on
    /// forward-incompatible clients. Preprocessors treat this as "not consumed".
    Unknown(u8),
}

impl Property {
    fn to_byte(self) -> u8 {
        match self {
            Property::AliveCheck => 0,
            Property::UserData => 1,
            Property::Ack => 2,
            Property::ViewRequest => 3,
            Property::JoinP2p => 4,
            Property::LeaveP2p => 5,
            Property::RequestConnection => 6,
            Property::ResponseConnection => 7,
            Property::Unknown(b) => b,
        }
    }

    fn from_byte(b: u8) -> Self {
        match b {
            0 => Property::AliveCheck,
            1 => Property::UserData,
            2 => Property::Ack,
            3 => Property::ViewRequest,
            4 => Property::JoinP2p,
            5 => Property::LeaveP2p,
            6 => Property::RequestConnection,
            7 => Property::ResponseConnection,
            other => Property::Unknown(other),
        }
    }
}

/// Reliability mode for a packet; meaningful mainly to the per-session channel,
/// but the UDP rendezvous response is always sent `Unreliable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    Reliable,
    Unreliable,
}

impl DeliveryMethod {
    fn to_byte(self) -> u8 {
        match self {
            DeliveryMethod::Reliable => 0,
            DeliveryMethod::Unreliable => 1,
        }
    }

    fn from_byte(b: u8) -> Self {
        match b {
            1 => DeliveryMethod::Unreliable,
            _ => DeliveryMethod::Reliable,
        }
    }
}

/// A decoded packet: header fields plus an owned payload.
///
/// Produced by [`codec::decode`] and consumed by channels or the
/// preprocessors. The `p2p_session_id` field is rewritten in place by the
/// UDP relay preprocessor — see [`crate::preprocess::udp`].
#[derive(Debug, Clone)]
pub struct Packet {
    pub property: Property,
    pub delivery_method: DeliveryMethod,
    /// Relay target (when sending) or true sender (when relayed to a recipient). `0` = server-addressed.
    pub p2p_session_id: u16,
    /// Session being authenticated during UDP rendezvous. `0` = server-originated.
    pub session_id_for_connection: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(property: Property, delivery_method: DeliveryMethod) -> Self {
        Packet {
            property,
            delivery_method,
            p2p_session_id: 0,
            session_id_for_connection: 0,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}
