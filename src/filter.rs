use tracing::{Instrument, Span};

use crate::codec::Error;
use crate::conn::Chan;
use crate::message::Message;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::prelude::*;

/// A stage wrapping one [`Connection`](crate::Connection) and exposing another.
///
/// Every hook defaults to passing messages through untouched, so a filter
/// only overrides the direction it rewrites. Hooks run one at a time on the
/// filter's own task and may freely mutate `self`.
#[async_trait]
pub trait Filter: Send + 'static {
    /// Appended to the wrapped connection's id to form the new id.
    fn suffix(&self) -> &str;

    /// Runs once before any traffic is handled.
    async fn start(&mut self, _chan: &mut Chan) -> Result<(), Error> {
        Ok(())
    }

    /// A message from the wrapped connection, headed to the client.
    async fn receive_message(&mut self, chan: &mut Chan, message: Message) -> Result<(), Error> {
        match message {
            Message::Data(data) => self.receive_data(chan, data).await,
            other => Ok(chan.downstream.send(other).await?),
        }
    }

    /// A message from the client, headed to the wrapped connection.
    async fn send_message(&mut self, chan: &mut Chan, message: Message) -> Result<(), Error> {
        match message {
            Message::Data(data) => self.send_data(chan, data).await,
            other => Ok(chan.upstream.send(other).await?),
        }
    }

    /// Data from the wrapped connection.
    async fn receive_data(&mut self, chan: &mut Chan, data: BytesMut) -> Result<(), Error> {
        Ok(chan.downstream.send(Message::Data(data)).await?)
    }

    /// Data from the client.
    async fn send_data(&mut self, chan: &mut Chan, data: BytesMut) -> Result<(), Error> {
        Ok(chan.upstream.send(Message::Data(data)).await?)
    }
}

/// Combinators available on every [`Filter`].
pub trait FilterExt: Filter + Sized {
    /// Run every hook of this filter inside `span`.
    fn instrumented(self, span: Span) -> InstrumentedFilter<Self> {
        InstrumentedFilter { span, inner: self }
    }
}

impl<F> FilterExt for F where F: Filter {}

/// A [`Filter`] whose hooks run inside a tracing span.
pub struct InstrumentedFilter<F> {
    span: Span,
    inner: F,
}

#[async_trait]
impl<F> Filter for InstrumentedFilter<F>
where
    F: Filter,
{
    fn suffix(&self) -> &str {
        self.inner.suffix()
    }

    async fn start(&mut self, chan: &mut Chan) -> Result<(), Error> {
        self.inner.start(chan).instrument(self.span.clone()).await
    }

    async fn receive_message(&mut self, chan: &mut Chan, message: Message) -> Result<(), Error> {
        self.inner
            .receive_message(chan, message)
            .instrument(self.span.clone())
            .await
    }

    async fn send_message(&mut self, chan: &mut Chan, message: Message) -> Result<(), Error> {
        self.inner
            .send_message(chan, message)
            .instrument(self.span.clone())
            .await
    }
}
