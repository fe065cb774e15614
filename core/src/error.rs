//! Error types for the session relay server.

/// Errors that can occur across the server stack.
///
/// Variants map to specific failure modes:
///
/// - **Transport**: [`Io`](Self::Io), [`BindFailed`](Self::BindFailed) — socket failures.
/// - **Session**: [`SessionIoError`](Self::SessionIoError), [`CapacityExceeded`](Self::CapacityExceeded).
/// - **Wire**: [`PreProcessError`](Self::PreProcessError) — malformed packets.
/// - **Server**: [`ConfigInvalid`](Self::ConfigInvalid), [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning), [`Fatal`](Self::Fatal).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A listener or UDP socket failed to bind.
    #[error("bind failed: {0}")]
    BindFailed(std::io::Error),

    /// The session registry is at `MaxSession` capacity.
    #[error("session capacity exceeded")]
    CapacityExceeded,

    /// A session's TCP or UDP channel failed; only that session is affected.
    #[error("session I/O error: {0}")]
    SessionIoError(String),

    /// A preprocessor failed to interpret or act on a packet.
    #[error("preprocess error: {0}")]
    PreProcessError(String),

    /// An operation was attempted in a state that forbids it (e.g. registering
    /// an RPC service while the server is running).
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// [`Server::start`](crate::server::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::server::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// An unrecoverable error that should bring the server down.
    #[error("fatal error: {0}")]
    Fatal(String),
}

/// Convenience alias for `Result<T, ServerError>`.
pub type Result<T> = std::result::Result<T, ServerError>;
