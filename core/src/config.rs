//! Server configuration (`ServerOptions`).

/// Server-level configuration consumed by [`Server::new`](crate::server::Server::new) /
/// [`Server::with_events`](crate::server::Server::with_events).
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Identifier used in log output, has no protocol meaning.
    pub name: String,
    /// TCP listener bind address (host:port).
    pub tcp_bind: String,
    /// Upper bound on concurrently registered sessions.
    pub max_session: u16,
    /// Whether the parallel UDP relay/rendezvous service is enabled.
    pub is_service_udp: bool,
    /// UDP bind address, used only when `is_service_udp` is true.
    pub udp_server_address: String,
    /// UDP bind port, used only when `is_service_udp` is true.
    pub udp_server_port: u16,
    /// Whether to set `SO_REUSEADDR` on the UDP socket.
    pub udp_reuse_address: bool,
    /// Interval, in milliseconds, between [`UpdateScheduler`](crate::scheduler::UpdateScheduler) ticks.
    /// `0` means "tick as fast as possible" (sleep 0 between sweeps).
    pub session_update_interval_ms: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: "session-relay".to_string(),
            tcp_bind: "0.0.0.0:9000".to_string(),
            max_session: 64,
            is_service_udp: false,
            udp_server_address: "0.0.0.0".to_string(),
            udp_server_port: 9001,
            udp_reuse_address: false,
            session_update_interval_ms: 1000,
        }
    }
}

impl ServerOptions {
    /// Start building options from the defaults.
    pub fn builder() -> ServerOptionsBuilder {
        ServerOptionsBuilder::default()
    }

    /// `host:port` for the UDP socket, assembled from `udp_server_address`/`udp_server_port`.
    pub fn udp_bind_addr(&self) -> String {
        format!("{}:{}", self.udp_server_address, self.udp_server_port)
    }

    /// Emit advisory warnings about `session_update_interval_ms` per the design notes:
    /// UDP-enabled servers should tick fast (<=30ms), TCP-only servers should tick slow (>=1000ms).
    /// These are warnings only, never enforced.
    pub fn warn_on_questionable_interval(&self) {
        if self.is_service_udp && self.session_update_interval_ms > 100 {
            tracing::warn!(
                interval_ms = self.session_update_interval_ms,
                "SessionUpdateInterval is high for a UDP-enabled server; consider <= 30ms"
            );
        } else if !self.is_service_udp && self.session_update_interval_ms < 1000 {
            tracing::warn!(
                interval_ms = self.session_update_interval_ms,
                "SessionUpdateInterval is low for a TCP-only server; consider >= 1000ms"
            );
        }
    }
}

/// Builder for [`ServerOptions`], mutating a default instance field by field.
#[derive(Debug, Clone, Default)]
pub struct ServerOptionsBuilder {
    opts: OptionalFields,
}

#[derive(Debug, Clone, Default)]
struct OptionalFields {
    name: Option<String>,
    tcp_bind: Option<String>,
    max_session: Option<u16>,
    is_service_udp: Option<bool>,
    udp_server_address: Option<String>,
    udp_server_port: Option<u16>,
    udp_reuse_address: Option<bool>,
    session_update_interval_ms: Option<u64>,
}

macro_rules! builder_field {
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.opts.$name = Some(value.into());
            self
        }
    };
}

impl ServerOptionsBuilder {
    builder_field!(name, String);
    builder_field!(tcp_bind, String);
    builder_field!(max_session, u16);
    builder_field!(is_service_udp, bool);
    builder_field!(udp_server_address, String);
    builder_field!(udp_server_port, u16);
    builder_field!(udp_reuse_address, bool);
    builder_field!(session_update_interval_ms, u64);

    /// Finalize the options, filling anything unset from [`ServerOptions::default`].
    pub fn build(self) -> ServerOptions {
        let default = ServerOptions::default();
        ServerOptions {
            name: self.opts.name.unwrap_or(default.name),
            tcp_bind: self.opts.tcp_bind.unwrap_or(default.tcp_bind),
            max_session: self.opts.max_session.unwrap_or(default.max_session),
            is_service_udp: self.opts.is_service_udp.unwrap_or(default.is_service_udp),
            udp_server_address: self
                .opts
                .udp_server_address
                .unwrap_or(default.udp_server_address),
            udp_server_port: self
                .opts
                .udp_server_port
                .unwrap_or(default.udp_server_port),
            udp_reuse_address: self
                .opts
                .udp_reuse_address
                .unwrap_or(default.udp_reuse_address),
            session_update_interval_ms: self
                .opts
                .session_update_interval_ms
                .unwrap_or(default.session_update_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let opts = ServerOptions::builder()
            .max_session(2)
            .is_service_udp(true)
            .udp_server_port(9100)
            .build();
        assert_eq!(opts.max_session, 2);
        assert!(opts.is_service_udp);
        assert_eq!(opts.udp_bind_addr(), "0.0.0.0:9100");
    }

    #[test]
    fn builder_keeps_unset_defaults() {
        let opts = ServerOptions::builder().name("custom").build();
        assert_eq!(opts.name, "custom");
        assert_eq!(opts.max_session, ServerOptions::default().max_session);
    }
}
