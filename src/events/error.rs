//! Fatal server notifications.

use corvid_proto::{Command, Message};
use tracing::error;

use crate::event::{Context, Event};
use crate::events::names;

/// ERROR from the server. Always terminal; the server closes the link
/// right after sending it.
pub struct ServerErrorEvent;

impl Event for ServerErrorEvent {
    fn name(&self) -> &str {
        names::SERVER_ERROR
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::ERROR(_))
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Command::ERROR(reason) = &msg.command {
            error!(reason = %reason, "server error");
        }
        ctx.shutdown();
        Ok(())
    }
}

/// KILL aimed at us. Treated like ERROR; a KILL for someone else is
/// not ours to act on.
pub struct KillEvent;

impl Event for KillEvent {
    fn name(&self) -> &str {
        names::KILL
    }

    fn matches(&self, msg: &Message, own_nick: &str) -> bool {
        matches!(&msg.command, Command::KILL(target, _) if target == own_nick)
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Command::KILL(_, comment) = &msg.command {
            error!(comment = ?comment, "killed by operator");
        }
        ctx.shutdown();
        Ok(())
    }
}
