//! # corvid-proto
//!
//! A Rust library for parsing and serializing IRC client protocol
//! messages, plus a sans-IO registration handshake state machine.
//!
//! ## Features
//!
//! - IRC message parsing with prefixes, commands, and parameters
//! - A closed [`Command`] enum so command matching is exhaustive
//! - Line framing with partial-read reassembly via the tokio codec
//!   framework
//! - Capability negotiation and registration as a pure state machine
//!
//! ## Quick Start
//!
//! ```
//! use corvid_proto::Message;
//!
//! let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
//! assert_eq!(msg.source_nickname(), Some("nick"));
//! assert_eq!(msg.target(), Some("#channel"));
//! assert_eq!(msg.payload(), Some("Hello!"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod handshake;
pub mod irc;
pub mod line;
pub mod message;
mod parser;
pub mod prefix;

pub use self::command::{CapSubCommand, Command};
pub use self::error::{MessageParseError, ProtocolError};
pub use self::handshake::{
    HandshakeAction, HandshakeConfig, HandshakeError, HandshakeMachine, HandshakeState,
};
pub use self::irc::IrcCodec;
pub use self::line::LineCodec;
pub use self::message::Message;
pub use self::prefix::Prefix;
