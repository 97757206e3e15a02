use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::codec::Error;
use crate::filter::Filter;
use crate::message::Message;

use pin_project::pin_project;

use tracing::debug;

use futures::channel::mpsc;
use futures::prelude::*;
use tokio::{runtime::Handle, select};

/// One end of a bidirectional message pipe.
///
/// Reading yields what the other side produced; writing sends toward the
/// remote peer. Dropping the connection closes its sending half, which the
/// other side observes as end of stream.
#[pin_project]
pub struct Connection {
    id: String,
    #[pin]
    sink: mpsc::Sender<Message>,
    #[pin]
    stream: mpsc::Receiver<Message>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Sink<Message> for Connection {
    type Error = mpsc::SendError;

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().sink.poll_close(cx)
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().sink.poll_flush(cx)
    }

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().sink.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.project().sink.start_send(item)
    }
}

impl Stream for Connection {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().stream.poll_next(cx)
    }
}

impl Connection {
    /// Two connected ends sharing `id`.
    ///
    /// What one end sends, the other receives. The channels hold no buffer
    /// beyond the one slot each sender is guaranteed, so a sender waits for
    /// its previous message to be taken.
    pub fn pair(id: impl Into<String>) -> (Connection, Connection) {
        let id = id.into();
        let (left_tx, right_rx) = mpsc::channel::<Message>(0);
        let (right_tx, left_rx) = mpsc::channel::<Message>(0);

        let left = Connection {
            id: id.clone(),
            sink: left_tx,
            stream: left_rx,
        };
        let right = Connection {
            id,
            sink: right_tx,
            stream: right_rx,
        };

        (left, right)
    }

    /// Stable identity of this connection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop sending. The other side sees end of stream once it has drained
    /// what was already sent.
    pub fn close(&mut self) {
        self.sink.close_channel();
    }

    /// Take the raw channel halves apart.
    pub fn split(self) -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
        (self.sink, self.stream)
    }

    /// Wrap this connection in `filter`, returning the filtered connection.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_filter(self, filter: impl Filter) -> Connection {
        start_filter(Handle::current(), filter, self)
    }
}

/// Messages a filter hook produced for one direction, waiting for delivery.
///
/// Pushing never waits. The filter task hands queued messages on in order,
/// one at a time, as the receiving side takes them.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Message>,
}

impl Outbox {
    /// Queue `message` behind anything already waiting.
    pub fn push(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    /// Number of messages not yet delivered.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn deliver(&mut self, sink: &mut mpsc::Sender<Message>) -> Result<(), mpsc::SendError> {
        match self.queue.pop_front() {
            Some(message) => sink.start_send(message),
            None => Ok(()),
        }
    }
}

impl Sink<Message> for Outbox {
    type Error = Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.get_mut().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Where a filter's output goes.
#[derive(Debug, Default)]
pub struct Chan {
    /// Toward the wrapped connection, and on to the remote peer.
    pub upstream: Outbox,
    /// Toward the filter's client.
    pub downstream: Outbox,
}

fn start_filter(handle: Handle, mut filter: impl Filter, upstream: Connection) -> Connection {
    let id = format!("{}{}", upstream.id(), filter.suffix());
    let (ret, downstream) = Connection::pair(id.clone());
    let (mut up_tx, mut up_rx) = upstream.split();
    let (mut down_tx, mut down_rx) = downstream.split();

    let task = async move {
        let mut chan = Chan::default();
        if let Err(error) = filter.start(&mut chan).await {
            debug!(?error, "filter start error");
        }

        // An input is only read once everything its previous message produced
        // in the same direction has been taken, so a slow reader still pushes
        // back on its writer. Both outboxes drain while waiting on either input.
        loop {
            select! {
                biased;

                ready = future::poll_fn(|cx| up_tx.poll_ready(cx)), if !chan.upstream.is_empty() => {
                    if ready.and_then(|_| chan.upstream.deliver(&mut up_tx)).is_err() {
                        debug!("wrapped connection stopped reading");
                        break;
                    }
                }
                ready = future::poll_fn(|cx| down_tx.poll_ready(cx)), if !chan.downstream.is_empty() => {
                    if ready.and_then(|_| chan.downstream.deliver(&mut down_tx)).is_err() {
                        debug!("client stopped reading");
                        break;
                    }
                }
                to_send = down_rx.next(), if chan.upstream.is_empty() => {
                    match to_send {
                        Some(message) => {
                            if let Err(error) = filter.send_message(&mut chan, message).await {
                                debug!(?error, "upstream send error");
                            }
                        }
                        None => break,
                    }
                }
                recvd = up_rx.next(), if chan.downstream.is_empty() => {
                    match recvd {
                        Some(message) => {
                            if let Err(error) = filter.receive_message(&mut chan, message).await {
                                debug!(?error, "downstream send error");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let dropped = chan.upstream.len() + chan.downstream.len();
        if dropped > 0 {
            debug!(dropped, "discarding undelivered messages");
        }
        down_tx.close_channel();
        up_tx.close_channel();
        debug!(%id, "filter stopped");
    };

    handle.spawn(task);

    ret
}
