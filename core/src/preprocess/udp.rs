//! UDP preprocessor (§4.6): relay rewrite and NAT rendezvous.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;
use crate::packet::{self, DeliveryMethod, Packet, Property};
use crate::server::Shared;

/// Preprocess one datagram decoded off the shared UDP socket.
///
/// Relay (`UserData`/`Ack`/`ViewRequest`) and rendezvous (`RequestConnection`)
/// are fully handled here. Anything else — including a relay packet
/// addressed to the server itself (`p2p_session_id == 0`) — is left for the
/// addressed session's own UDP channel to process.
pub fn handle(shared: &Arc<Shared>, from: SocketAddr, mut packet: Packet) -> Result<()> {
    match packet.property {
        Property::UserData | Property::Ack | Property::ViewRequest => relay(shared, from, &mut packet),
        Property::RequestConnection => rendezvous(shared, from, &packet),
        _ => Ok(()),
    }
}

fn relay(shared: &Arc<Shared>, from: SocketAddr, packet: &mut Packet) -> Result<()> {
    let target = packet.p2p_session_id;
    if target == 0 {
        // Server-addressed; not consumed by the relay. A full deployment
        // would route this to the owning session's own UDP channel.
        return Ok(());
    }

    let Some(udp) = shared.udp.read().clone() else {
        return Ok(());
    };

    let Some(target_session) = shared.registry.find(target) else {
        return Ok(());
    };
    let Some(target_endpoint) = target_session.udp.as_ref().and_then(|u| u.punched_endpoint()) else {
        return Ok(());
    };
    let Some(sender_id) = udp.lookup(from) else {
        return Ok(());
    };

    // Sender-identity rewrite: recipients see the true origin, never the
    // original target field.
    packet.p2p_session_id = sender_id;

    let mut encoded = shared.pool.alloc();
    packet::codec::encode_into(packet, &mut encoded);
    let n = udp.send_to(&encoded, target_endpoint)?;
    shared.stats.record_relay(n as u64);
    Ok(())
}

fn rendezvous(shared: &Arc<Shared>, from: SocketAddr, packet: &Packet) -> Result<()> {
    let sid = packet.session_id_for_connection;
    let Some(session) = shared.registry.find(sid) else {
        return Ok(());
    };

    let (connect_id, local_endpoint) = packet::codec::decode_request_connection(&packet.payload)?;
    if session.connect_id != connect_id {
        // ConnectId mismatch: silently ignored, no state change, no response.
        return Ok(());
    }

    let Some(udp) = shared.udp.read().clone() else {
        return Ok(());
    };
    let Some(session_udp) = &session.udp else {
        return Ok(());
    };

    session_udp.set_local_endpoint(local_endpoint);
    session_udp.set_remote_endpoint(from);

    // Idempotent: only the first successful set registers the reverse index
    // entry; a re-send after that still gets a fresh response.
    if session_udp.set_punched_endpoint(from) {
        udp.register(from, session.id);
    }

    // Not a relay: the rendezvous reply is server-originated, not forwarded
    // from another session, so it never touches RelayServCount/RelayServBytes.
    let response = Packet::new(Property::ResponseConnection, DeliveryMethod::Unreliable);
    let mut encoded = shared.pool.alloc();
    packet::codec::encode_into(&response, &mut encoded);
    udp.send_to(&encoded, from)?;
    Ok(())
}
