use crate::codec::Error;
use crate::conn::Chan;
use crate::filter::Filter;
use crate::message::Message;
use crate::util::{CR, LF};

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use futures::prelude::*;

/// Rewrites every line ending headed to the client as LF CR.
///
/// A lone LF or CR becomes LF CR. The second byte of an LF CR or CR LF pair
/// is dropped, including when the pair is split across two messages. Traffic
/// from the client is not touched.
#[derive(Debug, Default)]
pub struct NewlineFilter {
    last_char: u8,
}

impl NewlineFilter {
    /// A filter that has seen no input yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(&mut self, data: &[u8]) -> BytesMut {
        let mut out = BytesMut::with_capacity(data.len() + data.len() / 2);
        for &byte in data {
            match byte {
                LF if self.last_char == CR => {}
                CR if self.last_char == LF => {}
                LF | CR => {
                    out.put_u8(LF);
                    out.put_u8(CR);
                }
                b => out.put_u8(b),
            }
            self.last_char = byte;
        }
        out
    }
}

#[async_trait]
impl Filter for NewlineFilter {
    fn suffix(&self) -> &str {
        "-(newline)"
    }

    async fn receive_data(&mut self, chan: &mut Chan, data: BytesMut) -> Result<(), Error> {
        let out = self.normalize(&data);
        if out.is_empty() {
            return Ok(());
        }
        Ok(chan.downstream.send(Message::Data(out)).await?)
    }
}
