//! High-level server orchestrator: the state machine that wires the
//! listener, registry, factory, UDP endpoint, scheduler, P2P manager, and
//! RPC dispatcher together.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::config::ServerOptions;
use crate::error::{Result, ServerError};
use crate::net::UdpEndpoint;
use crate::p2p::P2pManager;
use crate::packet::PacketPool;
use crate::rpc::RpcDispatcher;
use crate::scheduler::UpdateScheduler;
use crate::session::{NoopEvents, ServerEvents, SessionFactory, SessionRegistry};
use crate::stats::Statistics;

/// Server state machine (§3): `None -> Starting -> Started -> Stopping -> Stopped`.
/// Transitions are linear and never go backwards except via a fresh `start()`
/// from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    None = 0,
    Starting = 1,
    Started = 2,
    Stopping = 3,
    Stopped = 4,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ServerState::Starting,
            2 => ServerState::Started,
            3 => ServerState::Stopping,
            4 => ServerState::Stopped,
            _ => ServerState::None,
        }
    }
}

/// Everything a connection thread, the UDP receive thread, and the update
/// scheduler need shared access to. Held behind a single `Arc` so every
/// worker thread can clone a cheap handle to the whole server.
pub struct Shared {
    pub options: ServerOptions,
    pub registry: SessionRegistry,
    pub factory: SessionFactory,
    /// Bound lazily in `start()`, torn down in `stop()`; `None` whenever the
    /// server is stopped or UDP service is disabled.
    pub udp: RwLock<Option<Arc<UdpEndpoint>>>,
    pub p2p: P2pManager,
    pub rpc: RpcDispatcher,
    pub events: Arc<dyn ServerEvents>,
    pub stats: Arc<Statistics>,
    /// Shared pool backing the UDP receive buffer and the relay/rendezvous
    /// outbound encode buffers (§4.11); lets datagram handling reuse buffers
    /// across the whole server instead of allocating a fresh `Vec` per packet.
    pub pool: PacketPool,
    /// Actual bound TCP address, filled in once `start()` binds the listener.
    /// Lets a caller that passed `:0` (as tests do, to avoid port collisions)
    /// discover the port the OS actually chose.
    pub tcp_addr: RwLock<Option<SocketAddr>>,
    /// Handles for every per-connection thread the accept loop has spawned.
    /// `stop()` drains and joins all of these so it cannot return while a
    /// session's cleanup (and its `on_session_closed` callback) is still
    /// in flight on another thread.
    pub session_threads: Mutex<Vec<JoinHandle<()>>>,
}

/// The multiplayer session server.
///
/// Construct with [`Server::new`], register RPC handlers while `Stopped`,
/// then [`Server::start`]. [`Server::stop`] is synchronous and blocks until
/// the listener, all sessions, and the scheduler have shut down.
pub struct Server {
    shared: Arc<Shared>,
    state: AtomicU8,
    running: Arc<AtomicBool>,
    scheduler: Option<UpdateScheduler>,
    accept_handle: Option<JoinHandle<()>>,
    udp_handle: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        Self::with_events(options, Arc::new(NoopEvents))
    }

    pub fn with_events(options: ServerOptions, events: Arc<dyn ServerEvents>) -> Self {
        options.warn_on_questionable_interval();
        let stats = Arc::new(Statistics::default());
        let shared = Arc::new(Shared {
            registry: SessionRegistry::new(options.max_session),
            factory: SessionFactory::new(options.max_session),
            udp: RwLock::new(None),
            p2p: P2pManager::new(),
            rpc: RpcDispatcher::new(),
            events,
            stats,
            pool: PacketPool::new(),
            options,
            tcp_addr: RwLock::new(None),
            session_threads: Mutex::new(Vec::new()),
        });
        Server {
            shared,
            state: AtomicU8::new(ServerState::None as u8),
            running: Arc::new(AtomicBool::new(false)),
            scheduler: None,
            accept_handle: None,
            udp_handle: None,
        }
    }

    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> Arc<Statistics> {
        self.shared.stats.clone()
    }

    /// The TCP address actually bound by the last successful `start()`.
    /// Useful when `tcp_bind` requested port `0`.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        *self.shared.tcp_addr.read()
    }

    /// The UDP address actually bound by the last successful `start()`,
    /// when the UDP service is enabled.
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.shared.udp.read().as_ref().and_then(|u| u.local_addr().ok())
    }

    /// Register an RPC handler. Only permitted while `None` or `Stopped`.
    pub fn register_rpc_service(&self, handler: Arc<dyn crate::rpc::RpcService>) -> Result<()> {
        match self.state() {
            ServerState::None | ServerState::Stopped => self.shared.rpc.register(handler),
            _ => Err(ServerError::ConfigInvalid(
                "cannot register an RPC service while the server is running".to_string(),
            )),
        }
    }

    /// Start the server. Requires `None` or `Stopped`.
    pub fn start(&mut self) -> Result<()> {
        match self.state() {
            ServerState::None | ServerState::Stopped => {}
            _ => return Err(ServerError::AlreadyRunning),
        }
        self.state.store(ServerState::Starting as u8, Ordering::SeqCst);

        let listener = TcpListener::bind(&self.shared.options.tcp_bind)
            .map_err(ServerError::BindFailed)?;
        *self.shared.tcp_addr.write() = listener.local_addr().ok();

        if self.shared.options.is_service_udp {
            let addr = self.shared.options.udp_bind_addr();
            let endpoint = UdpEndpoint::bind(&addr, self.shared.stats.clone(), self.shared.pool.clone())
                .map_err(|e| match e {
                    ServerError::Io(io) => ServerError::BindFailed(io),
                    other => other,
                })?;
            *self.shared.udp.write() = Some(Arc::new(endpoint));
        }
        self.shared.rpc.close_registration();

        self.running.store(true, Ordering::SeqCst);

        let accept_shared = self.shared.clone();
        let accept_running = self.running.clone();
        let accept_handle = thread::Builder::new()
            .name("tcp-accept-loop".to_string())
            .spawn(move || crate::net::accept_loop(listener, accept_shared, accept_running))
            .map_err(|e| ServerError::Fatal(e.to_string()))?;
        self.accept_handle = Some(accept_handle);

        if let Some(udp_endpoint) = self.shared.udp.read().clone() {
            let handle = udp_endpoint.spawn_receive_loop(self.shared.clone(), self.running.clone());
            self.udp_handle = Some(handle);
        }

        let interval = Duration::from_millis(self.shared.options.session_update_interval_ms);
        self.scheduler = Some(UpdateScheduler::spawn(self.shared.clone(), interval));

        self.state.store(ServerState::Started as u8, Ordering::SeqCst);
        tracing::info!(
            name = %self.shared.options.name,
            tcp_bind = %self.shared.options.tcp_bind,
            udp = self.shared.options.is_service_udp,
            "server started"
        );
        Ok(())
    }

    /// Stop the server. Requires `Started`. Blocks until the listener, all
    /// sessions, and the update scheduler have shut down (§5 shutdown order).
    pub fn stop(&mut self) -> Result<()> {
        if self.state() != ServerState::Started {
            return Err(ServerError::NotStarted);
        }
        self.state.store(ServerState::Stopping as u8, Ordering::SeqCst);

        // (1) stop the listener: no new sessions are accepted once this
        // flag is observed by the accept loop's next poll.
        self.running.store(false, Ordering::SeqCst);

        // (2) shut down the session factory: force every live session's
        // socket closed so its read loop unblocks and runs its own cleanup,
        // then join every per-connection thread. Joining (rather than
        // polling the registry) guarantees `cleanup_session`'s
        // `finish_close()`/`on_session_closed` have already run for every
        // session by the time this call returns — no further callbacks fire
        // once `stop()` returns.
        self.shared.registry.for_each(|session| {
            session.begin_close();
            session.tcp.lock().shutdown();
        });
        if let Some(accept_handle) = self.accept_handle.take() {
            let _ = accept_handle.join();
        }
        let session_handles: Vec<_> = self.shared.session_threads.lock().drain(..).collect();
        for handle in session_handles {
            let _ = handle.join();
        }

        // (3) join the update scheduler.
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }

        // (4) join the UDP receive thread, then close the endpoint: dropping
        // the last Arc<UdpEndpoint> closes the socket once the receive loop
        // has actually exited.
        if let Some(udp_handle) = self.udp_handle.take() {
            let _ = udp_handle.join();
        }
        self.shared.udp.write().take();

        // (5) clear P2p state.
        self.shared.p2p.clear();
        *self.shared.tcp_addr.write() = None;

        // (6) transition to Stopped.
        self.shared.rpc.reopen_registration();
        self.state.store(ServerState::Stopped as u8, Ordering::SeqCst);
        tracing::info!("server stopped");
        Ok(())
    }

    /// Best-effort synchronous stop; failures are swallowed. Intended for use
    /// from `Drop` or other contexts where an error can't be propagated.
    pub fn dispose(&mut self) {
        if self.state() == ServerState::Started {
            if let Err(e) = self.stop() {
                tracing::warn!(error = %e, "error during dispose");
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.dispose();
    }
}
