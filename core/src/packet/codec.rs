//! Header encode/decode and control-payload (de)serialization.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use super::{DeliveryMethod, HEADER_SIZE, Packet, Property};
use crate::error::{Result, ServerError};

/// Serialize a packet into a fresh byte buffer: header followed by payload.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + packet.payload.len());
    encode_into(packet, &mut buf);
    buf
}

/// Serialize a packet into `buf`, clearing it first. Lets a caller pass a
/// [`super::PooledPacket`] (derefs to `Vec<u8>`) so an outbound encode reuses
/// a pooled buffer instead of allocating a fresh `Vec` per packet.
pub fn encode_into(packet: &Packet, buf: &mut Vec<u8>) {
    buf.clear();
    buf.push(packet.property.to_byte());
    buf.push(packet.delivery_method.to_byte());
    buf.extend_from_slice(&packet.p2p_session_id.to_le_bytes());
    buf.extend_from_slice(&packet.session_id_for_connection.to_le_bytes());
    buf.extend_from_slice(&(packet.payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(&packet.payload);
}

/// Decode a complete `header + payload` buffer into a [`Packet`].
///
/// Returns [`ServerError::PreProcessError`] on a short buffer or a
/// payload-length mismatch; never panics on malformed input.
pub fn decode(buf: &[u8]) -> Result<Packet> {
    if buf.len() < HEADER_SIZE {
        return Err(ServerError::PreProcessError(format!(
            "short packet: {} bytes, need at least {HEADER_SIZE}",
            buf.len()
        )));
    }

    let property = Property::from_byte(buf[0]);
    let delivery_method = DeliveryMethod::from_byte(buf[1]);
    let p2p_session_id = u16::from_le_bytes([buf[2], buf[3]]);
    let session_id_for_connection = u16::from_le_bytes([buf[4], buf[5]]);
    let payload_len = u16::from_le_bytes([buf[6], buf[7]]) as usize;

    let payload_start = HEADER_SIZE;
    if buf.len() < payload_start + payload_len {
        return Err(ServerError::PreProcessError(format!(
            "payload length mismatch: header declares {payload_len}, buffer has {} bytes left",
            buf.len().saturating_sub(payload_start)
        )));
    }

    Ok(Packet {
        property,
        delivery_method,
        p2p_session_id,
        session_id_for_connection,
        payload: buf[payload_start..payload_start + payload_len].to_vec(),
    })
}

/// Length of an [`IPEndPoint`]-style encoding for the given family byte
/// (`4` -> IPv4, `6` -> IPv6), matching the on-wire `RequestConnection` payload.
fn endpoint_len(family: u8) -> usize {
    match family {
        6 => 1 + 16 + 2,
        _ => 1 + 4 + 2,
    }
}

/// `connectId: i64 LE`, then `IPEndPoint { family: u8, addr, port: u16 LE }`.
pub fn encode_request_connection(connect_id: i64, local: SocketAddr) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + 19);
    buf.extend_from_slice(&connect_id.to_le_bytes());
    encode_endpoint(&mut buf, local);
    buf
}

pub fn decode_request_connection(payload: &[u8]) -> Result<(i64, SocketAddr)> {
    if payload.len() < 8 + 1 {
        return Err(ServerError::PreProcessError(
            "RequestConnection payload too short".to_string(),
        ));
    }
    let connect_id = i64::from_le_bytes(payload[0..8].try_into().unwrap());
    let endpoint = decode_endpoint(&payload[8..])?;
    Ok((connect_id, endpoint))
}

fn encode_endpoint(buf: &mut Vec<u8>, addr: SocketAddr) {
    match addr.ip() {
        IpAddr::V4(v4) => {
            buf.push(4);
            buf.extend_from_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            buf.push(6);
            buf.extend_from_slice(&v6.octets());
        }
    }
    buf.extend_from_slice(&addr.port().to_le_bytes());
}

fn decode_endpoint(buf: &[u8]) -> Result<SocketAddr> {
    if buf.is_empty() {
        return Err(ServerError::PreProcessError("empty endpoint".to_string()));
    }
    let family = buf[0];
    let expected = endpoint_len(family);
    if buf.len() < expected {
        return Err(ServerError::PreProcessError(format!(
            "endpoint too short: {} bytes, need {expected}",
            buf.len()
        )));
    }
    let ip = match family {
        6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[1..17]);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&buf[1..5]);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
    };
    let port_offset = 1 + if family == 6 { 16 } else { 4 };
    let port = u16::from_le_bytes([buf[port_offset], buf[port_offset + 1]]);
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut packet = Packet::new(Property::UserData, DeliveryMethod::Unreliable)
            .with_payload(vec![0xDE, 0xAD]);
        packet.p2p_session_id = 2;
        packet.session_id_for_connection = 0;

        let encoded = encode(&packet);
        let decoded = decode(&encoded).unwrap();

        assert_eq!(decoded.property, Property::UserData);
        assert_eq!(decoded.delivery_method, DeliveryMethod::Unreliable);
        assert_eq!(decoded.p2p_session_id, 2);
        assert_eq!(decoded.payload, vec![0xDE, 0xAD]);
    }

    #[test]
    fn decode_short_buffer_errors() {
        assert!(decode(&[0, 0, 0]).is_err());
    }

    #[test]
    fn request_connection_round_trip_v4() {
        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        let encoded = encode_request_connection(0x1122_3344_5566_7788, addr);
        let (connect_id, decoded_addr) = decode_request_connection(&encoded).unwrap();
        assert_eq!(connect_id, 0x1122_3344_5566_7788);
        assert_eq!(decoded_addr, addr);
    }

    #[test]
    fn request_connection_round_trip_v6() {
        let addr: SocketAddr = "[::1]:8000".parse().unwrap();
        let encoded = encode_request_connection(42, addr);
        let (connect_id, decoded_addr) = decode_request_connection(&encoded).unwrap();
        assert_eq!(connect_id, 42);
        assert_eq!(decoded_addr, addr);
    }
}
