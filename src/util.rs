use bytes::{
    BufMut,
    BytesMut,
};

use crate::op::Cmd;

pub const NUL: u8 = 0;
pub const LF: u8 = 10;
pub const CR: u8 = 13;

pub trait Escape {
    /// Outbound: IAC is always doubled, LF becomes LF CR unless `binary`.
    fn escape_to(&self, dst: &mut BytesMut, binary: bool);
    /// Inbound: LF becomes LF CR and NUL is dropped unless `binary`.
    fn translate_to(&self, dst: &mut BytesMut, binary: bool);
}

impl Escape for [u8] {
    fn escape_to(&self, dst: &mut BytesMut, binary: bool) {
        dst.reserve(self.len());
        for byte in self {
            match *byte {
                b if b == Cmd::IAC => {
                    dst.put_u8(b);
                    dst.put_u8(b);
                }
                LF if !binary => {
                    dst.put_u8(LF);
                    dst.put_u8(CR);
                }
                b => dst.put_u8(b),
            }
        }
    }

    fn translate_to(&self, dst: &mut BytesMut, binary: bool) {
        dst.reserve(self.len());
        if binary {
            dst.put_slice(self);
            return;
        }
        for byte in self {
            match *byte {
                LF => {
                    dst.put_u8(LF);
                    dst.put_u8(CR);
                }
                NUL => {}
                b => dst.put_u8(b),
            }
        }
    }
}
