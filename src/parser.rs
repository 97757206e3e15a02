use crate::event::Event;
use crate::op::{Cmd, Opt};
use crate::util::Escape;

use tracing::*;

use either::Either;

use thiserror::Error;

use bytes::{Buf, BufMut, BytesMut};

/// Default byte substituted for a received Interrupt Process (ETX, ^C).
pub const DEFAULT_CHAR_INTERRUPT: u8 = 3;

/// Incremental telnet parser.
///
/// Holds the negotiated transmission modes, since both the inbound newline
/// translation and the outbound escaping depend on them.
#[derive(Debug)]
pub struct Parser {
    /// The peer sends to us in binary mode.
    pub receive_binary: bool,
    /// We send to the peer in binary mode.
    pub send_binary: bool,
    /// Byte emitted in place of `IAC IP`.
    pub char_interrupt: u8,
}

impl Default for Parser {
    fn default() -> Self {
        Parser {
            receive_binary: false,
            send_binary: false,
            char_interrupt: DEFAULT_CHAR_INTERRUPT,
        }
    }
}

#[derive(Debug, Error)]
/// Telnet parse failures. None of them are fatal to a connection.
pub enum Error {
    #[error("Unknown telnet command: {0}")]
    /// `IAC` followed by a byte that is not a supported command.
    UnknownCommand(u8),
}

/// Result alias for the parser.
pub type Result<T> = std::result::Result<T, Error>;

impl Parser {
    /// Consume the next unit from `buf`.
    ///
    /// `Left(true)` means something was consumed without producing an event,
    /// `Left(false)` means `buf` holds only an incomplete command and more
    /// input is needed.
    #[instrument(level = "trace", skip(self, buf))]
    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<Either<bool, Event>> {
        trace!(?buf, "parsing telnet event");
        let data_len = buf
            .iter()
            .position(|b| *b == Cmd::IAC)
            .unwrap_or(buf.len());

        if data_len == 0 {
            return self.parse_iac(buf);
        }

        trace!("splitting the first {} bytes", data_len);
        let data = buf.split_to(data_len);
        let mut out = BytesMut::with_capacity(data.len());
        data.translate_to(&mut out, self.receive_binary);

        if out.is_empty() {
            return Ok(Either::Left(true));
        }
        Ok(Either::Right(Event::Data(out)))
    }

    fn parse_iac(&mut self, buf: &mut BytesMut) -> Result<Either<bool, Event>> {
        if buf.len() < 2 {
            return Ok(Either::Left(false));
        }

        let cmd_op = buf[1];
        let cmd = match Cmd::try_from(cmd_op) {
            Ok(cmd) => cmd,
            Err(_) => {
                buf.advance(2);
                return Err(Error::UnknownCommand(cmd_op));
            }
        };

        debug!(?cmd, "found command");

        match cmd {
            Cmd::IAC => {
                buf.advance(2);
                Ok(Either::Right(Event::Data(single(Cmd::IAC.into()))))
            }
            Cmd::GA | Cmd::NOP => {
                buf.advance(2);
                Ok(Either::Left(true))
            }
            Cmd::IP => {
                buf.advance(2);
                Ok(Either::Right(Event::Data(single(self.char_interrupt))))
            }
            Cmd::WILL | Cmd::WONT | Cmd::DO | Cmd::DONT => {
                let opt_op = match buf.get(2) {
                    Some(op) => *op,
                    None => return Ok(Either::Left(false)),
                };

                trace!("consuming 3 bytes");
                buf.advance(3);

                Ok(Either::Right(Event::Negotiation(cmd, Opt::from(opt_op))))
            }
            _ => {
                buf.advance(2);
                Err(Error::UnknownCommand(cmd_op))
            }
        }
    }
}

fn single(byte: u8) -> BytesMut {
    let mut out = BytesMut::with_capacity(1);
    out.put_u8(byte);
    out
}
