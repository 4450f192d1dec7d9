//! Sans-IO registration state machine.
//!
//! This module manages the client side of connection registration:
//! capability negotiation (`CAP LS` → `REQ` → `ACK`/`NAK` → `END`),
//! identity commands (`PASS`/`NICK`/`USER`), and recognition of the
//! replies that complete or abort the handshake. It performs no I/O:
//! it consumes parsed messages and produces messages to send, so it can
//! be driven by any loop and unit tested without a network.

mod machine;

pub use machine::HandshakeMachine;

use crate::message::Message;

/// Current state of the registration handshake.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// Initial state, nothing sent yet.
    #[default]
    Disconnected,
    /// Sent CAP LS, awaiting capability list.
    CapabilityNegotiation,
    /// Sent CAP END, awaiting welcome (001).
    Registering,
    /// Received 001, fully registered.
    Connected,
    /// Handshake aborted (server ERROR or fatal reply).
    Terminated,
}

/// Configuration for the handshake state machine.
#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    /// Desired nickname.
    pub nickname: String,
    /// Username (ident).
    pub username: String,
    /// Real name / GECOS.
    pub realname: String,
    /// Server password, if required.
    pub password: Option<String>,
    /// Capabilities to request (e.g., "multi-prefix").
    pub request_caps: Vec<String>,
}

/// Actions produced by the handshake state machine.
///
/// The caller is responsible for sending these messages to the server.
#[derive(Clone, Debug)]
pub enum HandshakeAction {
    /// Send this message to the server.
    ///
    /// Boxed to reduce enum size variance (Message is large).
    Send(Box<Message>),
    /// Registration is complete, proceed to normal operation.
    Complete,
    /// An error occurred during handshake.
    Error(HandshakeError),
}

/// Errors that can occur during handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeError {
    /// Nickname collision (ERR_NICKNAMEINUSE / ERR_ERRONEUSNICKNAME).
    NicknameInUse(String),
    /// Server sent ERROR.
    ServerError(String),
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NicknameInUse(nick) => write!(f, "nickname in use: {}", nick),
            Self::ServerError(msg) => write!(f, "server error: {}", msg),
        }
    }
}

impl std::error::Error for HandshakeError {}
