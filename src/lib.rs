#![warn(missing_docs)]

//! Composable message filters for telnet-style terminal services.
//!
//! A [`Connection`] is a pair of message channels with an id. Filters such as
//! [`TelnetFilter`] and [`NewlineFilter`] wrap one connection and expose
//! another with the same shape, so they stack in any order and an
//! application cannot tell a filtered connection from a raw one.

mod op;
mod util;
#[doc(inline)]
pub use op::*;
mod parser;
#[doc(inline)]
pub use parser::{Error as ParseError, Parser, DEFAULT_CHAR_INTERRUPT};
mod event;
#[doc(inline)]
pub use event::*;
mod codec;
#[doc(inline)]
pub use codec::*;

mod message;
#[doc(inline)]
pub use message::*;
mod conn;
#[doc(inline)]
pub use conn::*;
mod filter;
#[doc(inline)]
pub use filter::*;

mod telnet;
#[doc(inline)]
pub use telnet::TelnetFilter;
mod newline;
#[doc(inline)]
pub use newline::NewlineFilter;

mod app;
#[doc(inline)]
pub use app::start_loop_app;
mod tcp;
#[doc(inline)]
pub use tcp::*;
