//! Non-blocking TCP accept loop and per-connection handling.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::channel::{TcpChannel, UdpChannel};
use crate::server::Shared;
use crate::session::{Session, SessionState};

/// Poll interval between non-blocking `accept()` attempts. Matches the
/// scheduler's own sweep granularity so `stop()` never has to wait long.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Non-blocking TCP accept loop, spawning one thread per accepted connection.
/// Returns once `running` is cleared by [`crate::server::Server::stop`].
pub fn accept_loop(listener: TcpListener, shared: Arc<Shared>, running: Arc<AtomicBool>) {
    if listener.set_nonblocking(true).is_err() {
        shared
            .events
            .on_errored(&crate::error::ServerError::Fatal(
                "failed to set TCP listener non-blocking".to_string(),
            ));
        return;
    }

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                let thread_shared = shared.clone();
                let thread_running = running.clone();
                let handle =
                    thread::spawn(move || handle_connection(stream, thread_shared, thread_running));
                shared.session_threads.lock().push(handle);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// Admit one connection: allocate an id, register the session, run its
/// request loop, and tear it down on exit (§4.1/§4.2).
fn handle_connection(stream: TcpStream, shared: Arc<Shared>, running: Arc<AtomicBool>) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(_) => return,
    };

    let channel = match TcpChannel::new(stream) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(%peer_addr, error = %e, "failed to set up TCP channel");
            return;
        }
    };

    let id = match shared.factory.allocate_id() {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(%peer_addr, "rejecting connection: session capacity exceeded");
            return;
        }
    };
    let connect_id = shared.factory.mint_connect_id();

    let udp = if shared.options.is_service_udp {
        Some(UdpChannel::new())
    } else {
        None
    };

    let session = Arc::new(Session::new(id, connect_id, channel, udp));
    if let Err(e) = shared.registry.insert(session.clone()) {
        tracing::warn!(%peer_addr, error = %e, "rejecting connection: registry full");
        shared.factory.release_id(id);
        return;
    }

    session.set_state(SessionState::Connected);
    shared.events.on_session_connected(&session);
    tracing::info!(%peer_addr, session_id = id, "session connected");

    run_session_loop(&session, &shared, &running);

    cleanup_session(&session, &shared, peer_addr);
}

fn run_session_loop(session: &Arc<Session>, shared: &Arc<Shared>, running: &Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::SeqCst) || session.is_closed() {
            return;
        }

        let packet = {
            let mut tcp = session.tcp.lock();
            tcp.read_packet()
        };

        match packet {
            Ok(Some(packet)) => {
                session.touch();
                if let Err(e) = crate::preprocess::tcp::handle(session, shared, packet) {
                    shared.events.on_session_errored(session, &e);
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                shared.events.on_session_errored(session, &e);
                return;
            }
        }
    }
}

fn cleanup_session(session: &Arc<Session>, shared: &Arc<Shared>, peer_addr: SocketAddr) {
    session.begin_close();
    shared.p2p.on_session_closed(session.id);
    if let Some(udp) = &session.udp {
        if let Some(punched) = udp.punched_endpoint() {
            if let Some(endpoint) = shared.udp.read().clone() {
                endpoint.forget(punched);
            }
        }
    }
    // finish_close()/on_session_closed() run before the session leaves the
    // registry, so a caller polling registry state (or, per `Server::stop`,
    // joining this thread) never observes the session gone while its
    // closed-callback is still about to fire.
    session.finish_close();
    shared.events.on_session_closed(session);
    shared.registry.remove(session.id);
    shared.factory.release_id(session.id);
    tracing::info!(%peer_addr, session_id = session.id, "session closed");
}
