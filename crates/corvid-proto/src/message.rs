//! The owned IRC message type.
//!
//! One [`Message`] is produced per inbound line and is immutable after
//! construction; the dispatch pass for that line owns it and drops it
//! once every matched event has run.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::command::Command;
use crate::error::{MessageParseError, ProtocolError};
use crate::parser::ParsedLine;
use crate::prefix::Prefix;

/// An owned IRC message.
///
/// Contains the parsed representation of an IRC line: an optional
/// origin prefix and the command with its parameters.
///
/// # Example
///
/// ```
/// use corvid_proto::Message;
///
/// // Parse a message
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
///
/// // Construct a message
/// let msg = Message::privmsg("#channel", "Hello!");
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    /// Message origin (e.g., `nick!user@host`), absent on client-originated lines.
    pub prefix: Option<Prefix>,
    /// The IRC command and its parameters.
    pub command: Command,
}

impl Message {
    /// Get the nickname from the message prefix, if present.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(|p| p.nick())
    }

    /// Get the recipient of this message: a channel name, a nickname,
    /// or the literal `*` while the client has no identity yet.
    pub fn target(&self) -> Option<&str> {
        match &self.command {
            Command::PRIVMSG(target, _)
            | Command::NOTICE(target, _)
            | Command::MODE(target, _)
            | Command::JOIN(target, _)
            | Command::PART(target, _)
            | Command::KILL(target, _) => Some(target),
            Command::CAP(target, _, _) => target.as_deref(),
            Command::Response(_, args) | Command::Raw(_, args) => args.first().map(|a| a.as_str()),
            _ => None,
        }
    }

    /// Get the free-form payload of this message (the trailing argument).
    pub fn payload(&self) -> Option<&str> {
        match &self.command {
            Command::PRIVMSG(_, text) | Command::NOTICE(_, text) => Some(text),
            Command::PING(token, _) | Command::PONG(token, _) => Some(token),
            Command::ERROR(reason) => Some(reason),
            Command::QUIT(reason) | Command::PART(_, reason) | Command::KILL(_, reason) => {
                reason.as_deref()
            }
            Command::CAP(_, _, args) => args.as_deref(),
            Command::Response(_, args) | Command::Raw(_, args) => args.last().map(|a| a.as_str()),
            _ => None,
        }
    }

    /// Get the appropriate target for a response.
    ///
    /// For channel messages, returns the channel name.
    /// For private messages, returns the sender's nickname.
    pub fn response_target(&self) -> Option<&str> {
        match &self.command {
            Command::PRIVMSG(target, _) | Command::NOTICE(target, _)
                if target.starts_with('#') =>
            {
                Some(target)
            }
            _ => self.source_nickname(),
        }
    }

    /// Create a PRIVMSG message to a target with text.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::PRIVMSG(target.into(), text.into()).into()
    }

    /// Create a NOTICE message to a target with text.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::NOTICE(target.into(), text.into()).into()
    }

    /// Create a JOIN message for a channel, with an optional key.
    #[must_use]
    pub fn join(channel: impl Into<String>, key: Option<String>) -> Self {
        Command::JOIN(channel.into(), key).into()
    }

    /// Create a PONG message echoing a PING token.
    #[must_use]
    pub fn pong(token: impl Into<String>) -> Self {
        Command::PONG(token.into(), None).into()
    }

    /// Create a QUIT message with an optional parting reason.
    #[must_use]
    pub fn quit(reason: Option<String>) -> Self {
        Command::QUIT(reason).into()
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message {
            prefix: None,
            command,
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let trimmed = s.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let parsed = ParsedLine::parse(trimmed).map_err(|cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        })?;

        let prefix = parsed.prefix.map(Prefix::new_from_str);
        let command =
            Command::new(parsed.command, parsed.params.to_vec()).map_err(|cause| {
                ProtocolError::InvalidMessage {
                    string: s.to_owned(),
                    cause,
                }
            })?;

        Ok(Message { prefix, command })
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}\r\n", self.command)
    }
}
