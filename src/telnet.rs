use std::collections::HashSet;

use crate::codec::Error;
use crate::conn::Chan;
use crate::event::Event;
use crate::filter::Filter;
use crate::message::Message;
use crate::op::{Cmd, KnownOpt, Opt};
use crate::parser::{self, Parser};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::prelude::*;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

/// Telnet option negotiation and IAC handling.
///
/// On start it offers binary mode, echo and suppress-go-ahead, and asks the
/// peer for binary mode and suppress-go-ahead. Client data is held back until
/// the peer has answered every offer. All other options are refused.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    parser: Parser,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    pending_do: HashSet<Opt>,
    pending_will: HashSet<Opt>,
}

impl TelnetFilter {
    /// A filter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte delivered to the client when the peer sends Interrupt Process.
    pub fn with_char_interrupt(mut self, byte: u8) -> Self {
        self.parser.char_interrupt = byte;
        self
    }

    async fn send_negotiation(&mut self, chan: &mut Chan, cmd: Cmd, opt: Opt) -> Result<(), Error> {
        trace!(?cmd, ?opt, "sending negotiation");
        let mut buf = BytesMut::with_capacity(3);
        self.parser.encode(Event::Negotiation(cmd, opt), &mut buf)?;
        Ok(chan.upstream.send(Message::Data(buf)).await?)
    }

    async fn send_bytes(&mut self, chan: &mut Chan, data: BytesMut) -> Result<(), Error> {
        let mut buf = BytesMut::with_capacity(data.len());
        self.parser.encode(Event::Data(data), &mut buf)?;
        Ok(chan.upstream.send(Message::Data(buf)).await?)
    }

    async fn handle_negotiation(&mut self, chan: &mut Chan, cmd: Cmd, opt: Opt) -> Result<(), Error> {
        trace!(?cmd, ?opt, "received negotiation");
        let response = match (cmd, opt) {
            (Cmd::WILL, Opt::Known(KnownOpt::TRANSMIT_BINARY)) => {
                self.parser.receive_binary = true;
                Cmd::DO
            }
            // Keep the peer agreeable about echo so the server owns it.
            (Cmd::WILL, Opt::Known(KnownOpt::ECHO | KnownOpt::SUPPRESS_GA)) => Cmd::DO,
            (Cmd::WILL, _) => Cmd::DONT,
            (Cmd::WONT, _) => {
                if opt == Opt::BINARY {
                    self.parser.receive_binary = false;
                }
                Cmd::DONT
            }
            (Cmd::DO, Opt::Known(KnownOpt::TRANSMIT_BINARY)) => {
                self.parser.send_binary = true;
                Cmd::WILL
            }
            (Cmd::DO, Opt::Known(KnownOpt::ECHO | KnownOpt::SUPPRESS_GA)) => Cmd::WILL,
            (Cmd::DO, _) => Cmd::WONT,
            (Cmd::DONT, _) => {
                if opt == Opt::BINARY {
                    self.parser.send_binary = false;
                }
                Cmd::WONT
            }
            (other, _) => {
                warn!(cmd = ?other, "not a negotiation verb");
                return Ok(());
            }
        };

        self.ack_if_needed(chan, response, opt).await
    }

    /// Send `response` unless it would acknowledge one of our own requests.
    ///
    /// A peer's answer to something we asked for clears the pending entry and
    /// is never answered, otherwise both sides would keep acknowledging each
    /// other forever.
    async fn ack_if_needed(&mut self, chan: &mut Chan, response: Cmd, opt: Opt) -> Result<(), Error> {
        match response {
            Cmd::DO | Cmd::DONT => {
                if self.pending_do.remove(&opt) {
                    trace!(?opt, "peer answered our do/dont");
                    return Ok(());
                }
            }
            _ => {
                if self.pending_will.remove(&opt) {
                    trace!(?opt, "peer answered our will/wont");
                    if self.pending_will.is_empty() && !self.write_buffer.is_empty() {
                        let data = self.write_buffer.split();
                        debug!(len = data.len(), "negotiation done, flushing held data");
                        self.send_bytes(chan, data).await?;
                    }
                    return Ok(());
                }
            }
        }

        self.send_negotiation(chan, response, opt).await
    }
}

#[async_trait]
impl Filter for TelnetFilter {
    fn suffix(&self) -> &str {
        "-(telnet)"
    }

    async fn start(&mut self, chan: &mut Chan) -> Result<(), Error> {
        self.pending_will.insert(Opt::BINARY);
        self.pending_will.insert(Opt::ECHO);
        self.pending_will.insert(Opt::SUPPRESS_GA);

        self.pending_do.insert(Opt::BINARY);
        self.pending_do.insert(Opt::ECHO);
        self.pending_do.insert(Opt::SUPPRESS_GA);

        self.send_negotiation(chan, Cmd::WILL, Opt::BINARY).await?;
        self.send_negotiation(chan, Cmd::WILL, Opt::ECHO).await?;
        self.send_negotiation(chan, Cmd::WILL, Opt::SUPPRESS_GA).await?;

        self.send_negotiation(chan, Cmd::DO, Opt::BINARY).await?;
        self.send_negotiation(chan, Cmd::DONT, Opt::ECHO).await?;
        self.send_negotiation(chan, Cmd::DO, Opt::SUPPRESS_GA).await
    }

    async fn receive_data(&mut self, chan: &mut Chan, data: BytesMut) -> Result<(), Error> {
        self.read_buffer.extend_from_slice(&data);

        let mut out = BytesMut::new();
        loop {
            match self.parser.decode(&mut self.read_buffer) {
                Ok(Some(Event::Data(bytes))) => out.extend_from_slice(&bytes),
                Ok(Some(Event::Negotiation(cmd, opt))) => {
                    self.handle_negotiation(chan, cmd, opt).await?
                }
                Ok(None) => break,
                Err(Error::Parse(parser::Error::UnknownCommand(cmd))) => {
                    warn!(cmd, "received invalid command code");
                }
                Err(error) => return Err(error),
            }
        }

        if !self.read_buffer.is_empty() {
            trace!(buffered = ?self.read_buffer, "holding partial command");
        }

        if out.is_empty() {
            return Ok(());
        }
        Ok(chan.downstream.send(Message::Data(out)).await?)
    }

    async fn send_data(&mut self, chan: &mut Chan, data: BytesMut) -> Result<(), Error> {
        if !self.pending_will.is_empty() {
            self.write_buffer.extend_from_slice(&data);
            return Ok(());
        }

        self.send_bytes(chan, data).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::conn::Connection;
    use tokio::time::timeout;

    async fn recv(conn: &mut Connection) -> Option<Message> {
        timeout(Duration::from_secs(5), conn.next())
            .await
            .expect("timed out waiting for a message")
    }

    async fn recv_data(conn: &mut Connection) -> Vec<u8> {
        match recv(conn).await {
            Some(Message::Data(data)) => data.to_vec(),
            other => panic!("expected data, got {other:?}"),
        }
    }

    async fn quiet(conn: &mut Connection) -> bool {
        timeout(Duration::from_millis(50), conn.next()).await.is_err()
    }

    /// Wrap a fresh dummy in a telnet filter and drain the opening offers.
    async fn negotiated(filter: TelnetFilter) -> (Connection, Connection) {
        let (wrapped, mut remote) = Connection::pair("0");
        let telnet = wrapped.with_filter(filter);
        for _ in 0..6 {
            recv_data(&mut remote).await;
        }
        (telnet, remote)
    }

    #[tokio::test]
    async fn initial_negotiation_order() {
        let (wrapped, mut remote) = Connection::pair("0");
        let telnet = wrapped.with_filter(TelnetFilter::new());
        assert_eq!(telnet.id(), "0-(telnet)");

        assert_eq!(recv_data(&mut remote).await, vec![255, 251, 0]);
        assert_eq!(recv_data(&mut remote).await, vec![255, 251, 1]);
        assert_eq!(recv_data(&mut remote).await, vec![255, 251, 3]);
        assert_eq!(recv_data(&mut remote).await, vec![255, 253, 0]);
        assert_eq!(recv_data(&mut remote).await, vec![255, 254, 1]);
        assert_eq!(recv_data(&mut remote).await, vec![255, 253, 3]);
    }

    #[tokio::test]
    async fn client_data_waits_for_negotiation() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        telnet.send(Message::data("held")).await.unwrap();
        assert!(quiet(&mut remote).await);

        remote.send(Message::data([255, 253, 0, 255, 253, 1])).await.unwrap();
        assert!(quiet(&mut remote).await);
        remote.send(Message::data([255, 253, 3])).await.unwrap();

        assert_eq!(recv_data(&mut remote).await, b"held".to_vec());

        telnet.send(Message::data("after")).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, b"after".to_vec());
    }

    #[tokio::test]
    async fn refused_offers_release_held_data() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        telnet.send(Message::data("held\n")).await.unwrap();
        assert!(quiet(&mut remote).await);

        // A refusal answers an offer just as well as an agreement.
        remote.send(Message::data([255, 254, 0, 255, 254, 1])).await.unwrap();
        assert!(quiet(&mut remote).await);
        remote.send(Message::data([255, 254, 3])).await.unwrap();

        assert_eq!(recv_data(&mut remote).await, b"held\n\r".to_vec());
        assert!(quiet(&mut remote).await);
    }

    #[tokio::test]
    async fn answers_to_outstanding_offers_stay_silent() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        telnet.send(Message::data("a\n")).await.unwrap();

        remote.send(Message::data([255, 253, 0])).await.unwrap();
        assert!(quiet(&mut remote).await);
        remote.send(Message::data([255, 253, 1])).await.unwrap();
        assert!(quiet(&mut remote).await);

        // Last answer: held data goes out, already in binary mode.
        remote.send(Message::data([255, 253, 3])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, b"a\n".to_vec());
        assert!(quiet(&mut remote).await);
    }

    #[tokio::test]
    async fn outbound_escaping_follows_send_mode() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        // Refuse binary, accept the rest.
        remote
            .send(Message::data([255, 254, 0, 255, 253, 1, 255, 253, 3]))
            .await
            .unwrap();
        telnet.send(Message::data([1, 10, 255])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, vec![1, 10, 13, 255, 255]);

        // Binary requested again: peer initiated now, so we answer.
        remote.send(Message::data([255, 253, 0])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, vec![255, 251, 0]);
        telnet.send(Message::data([1, 10, 255])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, vec![1, 10, 255, 255]);
    }

    #[tokio::test]
    async fn inbound_translation_follows_receive_mode() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        remote.send(Message::data(b"a\nb\0c\xff\xff")).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, b"a\n\rbc\xff".to_vec());

        // WILL BINARY answers our DO and switches modes mid-chunk.
        remote.send(Message::data(b"x\n\xff\xfb\x00y\n\0")).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, b"x\n\ry\n\0".to_vec());
        assert!(quiet(&mut remote).await);
    }

    #[tokio::test]
    async fn split_command_is_reassembled() {
        let (_telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        remote.send(Message::data([255])).await.unwrap();
        remote.send(Message::data([251, 5])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, vec![255, 254, 5]);

        remote.send(Message::data([255, 253])).await.unwrap();
        remote.send(Message::data([24])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, vec![255, 252, 24]);
    }

    #[tokio::test]
    async fn split_escape_and_interrupt_are_reassembled() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        remote.send(Message::data([b'a', 255])).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, vec![b'a']);
        remote.send(Message::data([255, b'b', 255])).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, vec![255, b'b']);
        remote.send(Message::data([244])).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, vec![3]);
    }

    #[tokio::test]
    async fn acknowledgements_are_not_answered() {
        let (_telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        // Answers to our own offers and requests.
        remote
            .send(Message::data([255, 253, 0, 255, 251, 0, 255, 252, 1]))
            .await
            .unwrap();
        assert!(quiet(&mut remote).await);

        // The same option again is a fresh request.
        remote.send(Message::data([255, 251, 0])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, vec![255, 253, 0]);
        remote.send(Message::data([255, 251, 1])).await.unwrap();
        assert_eq!(recv_data(&mut remote).await, vec![255, 253, 1]);
    }

    #[tokio::test]
    async fn commands_without_output_send_nothing() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        remote
            .send(Message::data([255, 249, 255, 241, 255, 246]))
            .await
            .unwrap();
        assert!(quiet(&mut telnet).await);

        remote.send(Message::data([b'a', 255, 244, b'b'])).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, vec![b'a', 3, b'b']);
    }

    #[tokio::test]
    async fn unknown_command_loses_one_byte() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        remote.send(Message::data([b'a', 255, b'q', b'b'])).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, vec![b'a', b'b']);
    }

    #[tokio::test]
    async fn custom_interrupt_char() {
        let filter = TelnetFilter::new().with_char_interrupt(0x1c);
        let (mut telnet, mut remote) = negotiated(filter).await;

        remote.send(Message::data([255, 244])).await.unwrap();
        assert_eq!(recv_data(&mut telnet).await, vec![0x1c]);
    }

    #[tokio::test]
    async fn other_messages_pass_through() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        remote.send(Message::Disconnect).await.unwrap();
        assert!(matches!(recv(&mut telnet).await, Some(Message::Disconnect)));

        telnet.send(Message::Disconnect).await.unwrap();
        assert!(matches!(recv(&mut remote).await, Some(Message::Disconnect)));
    }

    #[tokio::test]
    async fn upstream_closure_closes_filter_once() {
        let (mut telnet, mut remote) = negotiated(TelnetFilter::new()).await;

        remote.close();
        assert!(recv(&mut telnet).await.is_none());
        assert!(recv(&mut telnet).await.is_none());
        // The wrapped connection's sending side is closed as well.
        assert!(recv(&mut remote).await.is_none());
    }
}
