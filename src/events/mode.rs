//! MODE changes.

use corvid_proto::{Command, Message};
use tracing::debug;

use crate::event::{CallbackSet, Context, Event};
use crate::events::names;

/// Channel and user mode changes. No mode state is tracked; the event
/// exists so plugins can watch for ops and bans.
pub struct ModeEvent {
    callbacks: CallbackSet,
}

impl ModeEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for ModeEvent {
    fn name(&self) -> &str {
        names::MODE
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::MODE(..))
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Command::MODE(target, modes) = &msg.command {
            debug!(target = %target, modes = ?modes, "mode change");
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_mode() {
        let msg: Message = ":serv MODE #roost +o alice".parse().unwrap();
        assert!(ModeEvent::new().matches(&msg, "corvid"));
    }
}
