//! Echo server: answers every request with the same payload.
//!
//! ```text
//! RUST_LOG=debug cargo run --example echo -- 127.0.0.1:6767
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use mxp_server::{DEFAULT_PORT, Message, MessageCodec, Server, TransportRef};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

async fn echo(transport: TransportRef, peer: SocketAddr, message: Message) {
    info!(%peer, kind = %message.kind(), id = message.message_id(), "echoing");
    let reply = match message.reply(message.payload().clone()) {
        Ok(reply) => reply,
        Err(err) => {
            warn!(%peer, error = %err, "cannot build reply");
            return;
        }
    };
    if let Err(err) = transport.send_to(&reply.encode(), peer).await {
        warn!(%peer, error = %err, "reply failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr: SocketAddr = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
    };

    let server = Arc::new(
        Server::builder(MessageCodec, echo)
            .buffer_size(1500)
            .max_in_flight(256)
            .bind(addr)
            .await?,
    );

    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve().await }
    });

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    server.shutdown().await?;
    serving.await??;

    Ok(())
}
