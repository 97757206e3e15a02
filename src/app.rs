use crate::conn::Connection;
use crate::message::Message;

use futures::prelude::*;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Echo every data message back down `conn`.
///
/// Returns on `Disconnect` or when `conn` closes. Dropping the connection on
/// the way out closes it toward the filters, which unwinds the whole chain.
pub fn start_loop_app(conn: Connection) -> JoinHandle<()> {
    let id = format!("{}-LoopApp", conn.id());
    tokio::spawn(repeat(id, conn))
}

async fn repeat(id: String, mut conn: Connection) {
    while let Some(message) = conn.next().await {
        match message {
            Message::Data(data) => {
                if let Err(error) = conn.send(Message::Data(data)).await {
                    debug!(%id, ?error, "echo failed");
                    return;
                }
            }
            Message::Disconnect => {
                info!(%id, "disconnect received");
                return;
            }
            other => warn!(%id, kind = other.kind(), "unknown message type"),
        }
    }
    debug!(%id, "input channel closed");
}
