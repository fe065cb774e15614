//! RPC dispatch chain (§4.7).
//!
//! Handlers are tried in registration order against a `(reader, writer)`
//! view of the packet; here that view is simply the decoded [`Packet`]
//! itself, since this crate's wire format has no separate reader/writer
//! cursor state to snapshot and restore — a handler either returns a
//! response payload or declines and the dispatcher moves to the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, ServerError};
use crate::packet::Packet;
use crate::session::Session;

/// A single RPC handler. Implementors inspect the request and either return
/// a response payload (`Some`, terminating the chain) or decline (`None`,
/// letting the dispatcher try the next handler).
pub trait RpcService: Send + Sync {
    /// Stable identity used to reject duplicate registration of the same
    /// handler instance.
    fn name(&self) -> &str;

    fn handle(&self, session: &Session, request: &Packet) -> Option<Vec<u8>>;
}

/// Ordered chain of [`RpcService`] handlers.
///
/// Registration is only permitted while the server is `None` or `Stopped`
/// (enforced by the caller passing `registration_open: false` once the
/// server starts); duplicate registration of the same handler name is
/// rejected.
pub struct RpcDispatcher {
    handlers: Mutex<Vec<Arc<dyn RpcService>>>,
    registration_open: AtomicBool,
}

impl RpcDispatcher {
    pub fn new() -> Self {
        RpcDispatcher {
            handlers: Mutex::new(Vec::new()),
            registration_open: AtomicBool::new(true),
        }
    }

    /// Register a handler. Fails if registration has been closed (server
    /// running) or a handler with the same name is already registered.
    pub fn register(&self, handler: Arc<dyn RpcService>) -> Result<()> {
        if !self.registration_open.load(Ordering::SeqCst) {
            return Err(ServerError::ConfigInvalid(
                "RPC handlers can only be registered while the server is stopped".to_string(),
            ));
        }
        let mut handlers = self.handlers.lock();
        if handlers.iter().any(|h| h.name() == handler.name()) {
            return Err(ServerError::ConfigInvalid(format!(
                "RPC handler '{}' already registered",
                handler.name()
            )));
        }
        handlers.push(handler);
        Ok(())
    }

    /// Close registration; called when the server transitions out of `None`/`Stopped`.
    pub fn close_registration(&self) {
        self.registration_open.store(false, Ordering::SeqCst);
    }

    /// Reopen registration; called on transition back to `Stopped`.
    pub fn reopen_registration(&self) {
        self.registration_open.store(true, Ordering::SeqCst);
    }

    /// Offer `request` to each handler in order; the first to return `Some`
    /// wins. `None` means no handler consumed the request.
    pub fn dispatch(&self, session: &Session, request: &Packet) -> Option<Vec<u8>> {
        let handlers = self.handlers.lock().clone();
        for handler in handlers.iter() {
            if let Some(response) = handler.handle(session, request) {
                return Some(response);
            }
        }
        None
    }
}

impl Default for RpcDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
