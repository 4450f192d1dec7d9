//! Keepalive responder.

use corvid_proto::{Command, Message};
use tracing::trace;

use crate::event::{Context, Event};
use crate::events::names;

/// Answers server PING with PONG, echoing the token.
///
/// Urgent, and the reply jumps the send queue: an idle-timeout
/// disconnect must never be caused by a backed-up outbox.
pub struct PingEvent;

impl Event for PingEvent {
    fn name(&self) -> &str {
        names::PING
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::PING(..))
    }

    fn urgent(&self) -> bool {
        true
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Command::PING(token, _) = &msg.command {
            trace!(token = %token, "ping");
            ctx.send_front(Message::pong(token.clone()));
        }
        Ok(())
    }
}
