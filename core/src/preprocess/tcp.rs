//! TCP preprocessor (§4.5): keepalive and P2P group control, ahead of the
//! general one-way/request dispatch.

use std::sync::Arc;

use super::Consumed;
use crate::error::Result;
use crate::packet::{DeliveryMethod, Packet, Property};
use crate::server::Shared;
use crate::session::Session;

const PING_BYTE: u8 = 0xFF;
const PONG_BYTE: u8 = 0x00;

/// Preprocess one packet read off `session`'s TCP channel, then dispatch
/// whatever it doesn't consume to the application layer.
///
/// Errors are reported through [`crate::session::ServerEvents::on_errored`]
/// by the caller; this function still returns `Ok(())` after a consumed
/// packet so the read loop doesn't also attempt general dispatch.
pub fn handle(session: &Arc<Session>, shared: &Arc<Shared>, packet: Packet) -> Result<()> {
    match preprocess(session, shared, &packet)? {
        Consumed::Yes => Ok(()),
        Consumed::No => dispatch(session, shared, packet),
    }
}

fn preprocess(session: &Arc<Session>, shared: &Arc<Shared>, packet: &Packet) -> Result<Consumed> {
    match packet.property {
        Property::AliveCheck => {
            if packet.payload.first() == Some(&PING_BYTE) {
                let pong = Packet::new(Property::AliveCheck, DeliveryMethod::Reliable)
                    .with_payload(vec![PONG_BYTE]);
                session.tcp.lock().send(&pong)?;
            }
            Ok(Consumed::Yes)
        }
        Property::JoinP2p => {
            shared.p2p.join(session.id, packet.p2p_session_id);
            Ok(Consumed::Yes)
        }
        Property::LeaveP2p => {
            shared.p2p.leave(session.id);
            Ok(Consumed::Yes)
        }
        _ => Ok(Consumed::No),
    }
}

/// Non-consumed packets reach the RPC dispatch chain, falling back to the
/// embedder's one-way/request hooks. `ViewRequest` is the one property whose
/// name implies an expected reply; everything else is one-way.
fn dispatch(session: &Arc<Session>, shared: &Arc<Shared>, packet: Packet) -> Result<()> {
    if packet.property == Property::ViewRequest {
        let response_payload = shared
            .rpc
            .dispatch(session, &packet)
            .unwrap_or_else(|| shared.events.on_session_request_received(session, &packet.payload));
        let mut response = Packet::new(Property::ViewRequest, packet.delivery_method)
            .with_payload(response_payload);
        response.p2p_session_id = packet.p2p_session_id;
        response.session_id_for_connection = packet.session_id_for_connection;
        session.tcp.lock().send(&response)?;
    } else {
        shared.events.on_session_received(session, &packet.payload);
    }
    Ok(())
}
