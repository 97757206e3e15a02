use num_enum::{
    IntoPrimitive,
    TryFromPrimitive,
};

#[derive(Copy, Clone, Debug, TryFromPrimitive, IntoPrimitive, PartialEq, Eq)]
#[repr(u8)]
/// A telnet command byte, as it follows an IAC.
pub enum Cmd {
    /// End of subnegotiation parameters.
    SE = 240,
    /// No operation.
    NOP = 241,
    /// Data Mark.
    DM = 242,
    /// NVT character BRK.
    Break = 243,
    /// Interrupt Process.
    IP = 244,
    /// Abort Output.
    AO = 245,
    /// Are You There.
    AYT = 246,
    /// Erase Character.
    EC = 247,
    /// Erase Line.
    EL = 248,
    /// Go Ahead.
    GA = 249,
    /// Start of subnegotiation.
    SB = 250,
    /// Sender wants to enable, or confirms it has enabled, an option.
    WILL = 251,
    /// Sender refuses to enable, or confirms it has disabled, an option.
    WONT = 252,
    /// Sender asks the peer to enable, or confirms the peer may enable, an option.
    DO = 253,
    /// Sender asks the peer to disable, or confirms the peer must not enable, an option.
    DONT = 254,
    /// Interpret As Command. Doubled, it is a literal 255 data byte.
    IAC = 255,
}

impl PartialEq<Cmd> for u8 {
    fn eq(&self, other: &Cmd) -> bool {
        *self == *other as u8
    }
}

impl PartialEq<u8> for Cmd {
    fn eq(&self, other: &u8) -> bool {
        *self as u8 == *other
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
/// A telnet option code.
pub enum Opt {
    /// An option this crate negotiates.
    Known(KnownOpt),
    /// Any other option. Always refused.
    Unknown(u8),
}

impl Opt {
    /// Binary transmission (RFC 856).
    pub const BINARY: Opt = Opt::Known(KnownOpt::TRANSMIT_BINARY);
    /// Echo (RFC 857).
    pub const ECHO: Opt = Opt::Known(KnownOpt::ECHO);
    /// Suppress Go-Ahead (RFC 858).
    pub const SUPPRESS_GA: Opt = Opt::Known(KnownOpt::SUPPRESS_GA);
}

impl From<u8> for Opt {
    fn from(other: u8) -> Self {
        match KnownOpt::try_from_primitive(other) {
            Ok(opt) => Opt::Known(opt),
            Err(_) => Opt::Unknown(other),
        }
    }
}

impl From<Opt> for u8 {
    fn from(other: Opt) -> u8 {
        match other {
            Opt::Known(opt) => opt as u8,
            Opt::Unknown(opt) => opt,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[allow(non_camel_case_types)]
/// The telnet options with non-default handling.
#[allow(missing_docs)]
pub enum KnownOpt {
    TRANSMIT_BINARY = 0,
    ECHO = 1,
    SUPPRESS_GA = 3,
}

impl PartialEq<Opt> for u8 {
    fn eq(&self, other: &Opt) -> bool {
        *self == u8::from(*other)
    }
}

impl PartialEq<u8> for Opt {
    fn eq(&self, other: &u8) -> bool {
        u8::from(*self) == *other
    }
}
