use std::io;

use crate::event::Event;
use crate::op::Cmd;
use crate::parser::{self, Parser};
use crate::util::Escape;

use bytes::{BufMut, BytesMut};
use either::Either;
use futures::channel::mpsc;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Errors raised while running a filter.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed telnet input. Logged and skipped by the telnet filter.
    #[error("parse error: {0}")]
    Parse(#[from] parser::Error),
    /// Socket failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The other end of a channel went away.
    #[error("connection closed: {0}")]
    Closed(#[from] mpsc::SendError),
}

impl Decoder for Parser {
    type Error = Error;
    type Item = Event;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(loop {
            if buf.is_empty() {
                break None;
            }
            match self.parse(buf)? {
                Either::Left(true) => continue,
                Either::Left(false) => break None,
                Either::Right(item) => break item.into(),
            }
        })
    }
}

impl Encoder<Event> for Parser {
    type Error = io::Error;

    fn encode(&mut self, item: Event, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Event::Data(bytes) => {
                bytes.escape_to(dst, self.send_binary);
            }
            Event::Negotiation(cmd, opt) => {
                dst.reserve(3);
                dst.put_u8(Cmd::IAC.into());
                dst.put_u8(cmd.into());
                dst.put_u8(opt.into());
            }
        }

        Ok(())
    }
}
