//! Framed TCP channel: one packet in, one packet out.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use crate::error::{Result, ServerError};
use crate::packet::{self, Packet, PacketPool};

/// Wraps a `TcpStream` split into a buffered-read half and a write half
/// (via `try_clone`, matching the reference stack's connection split),
/// reading exactly one framed packet at a time off the header's
/// `payload_len` field.
///
/// The raw header+payload bytes for both directions are staged in a
/// per-channel [`PacketPool`] buffer rather than a fresh `Vec` per packet —
/// the buffer is released back to the pool as soon as it goes out of scope
/// (after `decode`/`write_all` return), on every exit path including error.
pub struct TcpChannel {
    reader: TcpStream,
    writer: TcpStream,
    peer_addr: SocketAddr,
    pool: PacketPool,
}

impl TcpChannel {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let writer = stream.try_clone()?;
        Ok(TcpChannel {
            reader: stream,
            writer,
            peer_addr,
            pool: PacketPool::new(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Block until one full packet (header + payload) has been read, or the
    /// connection is closed/errors. `Ok(None)` means the peer closed cleanly
    /// between packets (EOF on the first byte of a header).
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut header = [0u8; packet::HEADER_SIZE];
        if !read_exact_or_eof(&mut self.reader, &mut header)? {
            return Ok(None);
        }

        let payload_len = u16::from_le_bytes([header[6], header[7]]) as usize;
        let mut full = self.pool.alloc();
        full.extend_from_slice(&header);
        full.resize(packet::HEADER_SIZE + payload_len, 0);
        self.reader
            .read_exact(&mut full[packet::HEADER_SIZE..])
            .map_err(|e| ServerError::SessionIoError(e.to_string()))?;

        packet::codec::decode(&full).map(Some)
    }

    /// Encode and write a packet to the peer.
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        let mut buf = self.pool.alloc();
        packet::codec::encode_into(packet, &mut buf);
        self.writer
            .write_all(&buf)
            .map_err(|e| ServerError::SessionIoError(e.to_string()))
    }

    /// Forcibly unblock a pending `read_packet()` call, used by
    /// [`crate::server::Server::stop`] to drain session read loops without
    /// waiting for the peer to disconnect on its own.
    pub fn shutdown(&self) {
        let _ = self.reader.shutdown(Shutdown::Both);
    }
}

/// Reads exactly `buf.len()` bytes. Returns `Ok(false)` only on a clean EOF
/// before any byte was read (peer closed between packets); a disconnect
/// mid-header is a [`ServerError::SessionIoError`].
fn read_exact_or_eof(stream: &mut TcpStream, buf: &mut [u8]) -> Result<bool> {
    let mut read = 0;
    while read < buf.len() {
        match stream.read(&mut buf[read..]) {
            Ok(0) if read == 0 => return Ok(false),
            Ok(0) => {
                return Err(ServerError::SessionIoError(
                    "connection closed mid-header".to_string(),
                ));
            }
            Ok(n) => read += n,
            Err(e) => return Err(ServerError::SessionIoError(e.to_string())),
        }
    }
    Ok(true)
}
