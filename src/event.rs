use crate::op::{Cmd, Opt};

use bytes::BytesMut;

/// A unit of decoded telnet traffic.
#[derive(Debug, Eq, Clone, PartialEq)]
pub enum Event {
    /// Plain data bytes, already translated for the current receive mode.
    Data(BytesMut),
    /// `IAC <WILL|WONT|DO|DONT> <opt>`.
    Negotiation(Cmd, Opt),
}
