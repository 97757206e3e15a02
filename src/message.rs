use std::io;

use bytes::BytesMut;

use crate::conn::Connection;

/// Everything that travels over a [`Connection`].
#[derive(Debug)]
pub enum Message {
    /// Orderly end of the stream.
    Disconnect,
    /// A freshly accepted connection. Only produced by listeners.
    NewConnection(Connection),
    /// Opaque payload bytes. The only variant filters rewrite.
    Data(BytesMut),
    /// Transport failure, relayed untouched.
    Error(io::Error),
}

impl Message {
    /// Build a `Data` message from anything byte-like.
    pub fn data(bytes: impl AsRef<[u8]>) -> Self {
        Message::Data(BytesMut::from(bytes.as_ref()))
    }

    /// Name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Disconnect => "Disconnect",
            Message::NewConnection(_) => "NewConnection",
            Message::Data(_) => "Data",
            Message::Error(_) => "Error",
        }
    }
}
