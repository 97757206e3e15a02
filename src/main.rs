use futures::prelude::*;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use termnet::*;

const DEFAULT_LISTEN: &str = "0.0.0.0:2222";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

    let mut listener = TcpListen::bind("termnet", &addr).await?;
    info!(id = listener.id(), "listening");

    while let Some(message) = listener.next().await {
        match message {
            Message::NewConnection(conn) => {
                let span = info_span!("conn", id = conn.id());
                let conn = conn
                    .with_filter(TelnetFilter::new().instrumented(span.clone()))
                    .with_filter(NewlineFilter::new().instrumented(span));
                info!(id = conn.id(), "new connection");
                start_loop_app(conn);
            }
            other => warn!(kind = other.kind(), "unexpected message from listener"),
        }
    }

    Ok(())
}
