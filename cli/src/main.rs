use std::io;

use clap::Parser;
use session_relay::{Server, ServerOptions};

#[derive(Parser)]
#[command(
    name = "session-relay-server",
    about = "Standalone multiplayer session server: TCP/UDP transport, P2P relay, NAT rendezvous"
)]
struct Args {
    /// TCP bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:9000")]
    tcp_bind: String,

    /// Maximum number of concurrently registered sessions
    #[arg(long, default_value_t = 64)]
    max_session: u16,

    /// Enable the parallel UDP relay/rendezvous service
    #[arg(long)]
    udp: bool,

    /// UDP bind address, used only when `--udp` is set
    #[arg(long, default_value = "0.0.0.0")]
    udp_address: String,

    /// UDP bind port, used only when `--udp` is set
    #[arg(long, default_value_t = 9001)]
    udp_port: u16,

    /// Milliseconds between session update ticks
    #[arg(long, default_value_t = 1000)]
    update_interval_ms: u64,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let options = ServerOptions::builder()
        .tcp_bind(args.tcp_bind.clone())
        .max_session(args.max_session)
        .is_service_udp(args.udp)
        .udp_server_address(args.udp_address)
        .udp_server_port(args.udp_port)
        .session_update_interval_ms(args.update_interval_ms)
        .build();

    let mut server = Server::new(options);

    if let Err(e) = server.start() {
        eprintln!("Failed to start server: {e}");
        return;
    }

    println!("session relay server on {} — press Enter to stop", args.tcp_bind);
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    if let Err(e) = server.stop() {
        eprintln!("Error while stopping server: {e}");
    }
}
