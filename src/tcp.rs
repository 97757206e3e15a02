use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::codec::Error;
use crate::conn::Connection;
use crate::message::Message;

use bytes::BytesMut;
use futures::channel::mpsc;
use futures::prelude::*;
use pin_project::pin_project;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::{select, sync::oneshot};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tracing::{debug, info, warn, Instrument};

/// Largest chunk handed up from a single socket read.
pub const READ_CHUNK: usize = 65535;

/// A listening socket, yielding a `NewConnection` per accepted client.
#[pin_project]
pub struct TcpListen {
    id: String,
    local_addr: SocketAddr,
    #[pin]
    notify: mpsc::Receiver<Message>,
}

impl TcpListen {
    /// Bind `addr` and start accepting. The listener's id is
    /// `<id>-TCP-<local address>`.
    pub async fn bind(id: &str, addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let id = format!("{id}-TCP-{local_addr}");
        let (notify_tx, notify) = mpsc::channel(0);

        let span = tracing::info_span!("listen", %id);
        tokio::spawn(accept_loop(id.clone(), listener, notify_tx).instrument(span));

        Ok(TcpListen {
            id,
            local_addr,
            notify,
        })
    }

    /// Identity of the listener.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Stream for TcpListen {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().notify.poll_next(cx)
    }
}

async fn accept_loop(id: String, listener: TcpListener, mut notify: mpsc::Sender<Message>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(?error, "accept failed");
                continue;
            }
        };
        info!(%peer, "accepted connection");

        let conn = start_stream(format!("{id}-{peer}"), stream);
        if notify.send(Message::NewConnection(conn)).await.is_err() {
            debug!("listener dropped, no longer accepting");
            return;
        }
    }
}

/// Turn a socket into a [`Connection`].
///
/// Reads arrive as `Data` chunks of at most [`READ_CHUNK`] bytes, followed by
/// `Disconnect` on orderly close or `Error` on failure. `Data` written to the
/// connection goes out the socket; `Disconnect` or closing the connection
/// shuts the socket down.
pub fn start_stream(id: String, stream: TcpStream) -> Connection {
    let (conn, remote) = Connection::pair(id);
    let (from_conn, to_conn) = remote.split();
    let (read, write) = stream.into_split();
    let (done_tx, done_rx) = oneshot::channel();

    let span = tracing::debug_span!("socket", id = conn.id());
    let reader = FramedRead::with_capacity(read, BytesCodec::new(), READ_CHUNK);
    let writer = FramedWrite::new(write, BytesCodec::new());
    tokio::spawn(read_loop(reader, from_conn, done_rx).instrument(span.clone()));
    tokio::spawn(write_loop(writer, to_conn, done_tx).instrument(span));

    conn
}

async fn read_loop(
    mut reader: FramedRead<OwnedReadHalf, BytesCodec>,
    mut from_conn: mpsc::Sender<Message>,
    mut done: oneshot::Receiver<()>,
) {
    loop {
        let (message, last) = select! {
            frame = reader.next() => match frame {
                Some(Ok(data)) => (Message::Data(data), false),
                Some(Err(error)) => (Message::Error(error), true),
                None => (Message::Disconnect, true),
            },
            _ = &mut done => break,
        };

        select! {
            sent = from_conn.send(message) => {
                if sent.is_err() {
                    debug!("reader has nobody to deliver to");
                    break;
                }
            }
            _ = &mut done => break,
        }

        if last {
            break;
        }
    }

    from_conn.close_channel();
    debug!("socket reader stopped");
}

async fn write_loop(
    mut writer: FramedWrite<OwnedWriteHalf, BytesCodec>,
    mut to_conn: mpsc::Receiver<Message>,
    done: oneshot::Sender<()>,
) {
    while let Some(message) = to_conn.next().await {
        match message {
            Message::Data(data) => {
                if let Err(error) = writer.send(data).await {
                    warn!(?error, "could not write full message out of socket");
                    break;
                }
            }
            Message::Disconnect => break,
            other => warn!(kind = other.kind(), "unknown message type"),
        }
    }

    if let Err(error) = futures::SinkExt::<BytesMut>::close(&mut writer).await {
        debug!(?error, "socket shutdown failed");
    }
    let _ = done.send(());
    debug!("socket writer stopped");
}
