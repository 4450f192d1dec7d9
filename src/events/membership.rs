//! Channel membership tracking.
//!
//! These events keep [`UserTable`] and [`ChannelTable`] in sync with
//! what the server tells us, then hand the message to any subscribed
//! plugin callbacks.

use corvid_proto::{Command, Message};
use tracing::debug;

use crate::event::{CallbackSet, Context, Event};
use crate::events::names;
use crate::state::Membership;

pub struct JoinEvent {
    callbacks: CallbackSet,
}

impl JoinEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for JoinEvent {
    fn name(&self) -> &str {
        names::JOIN
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::JOIN(..)) && msg.source_nickname().is_some()
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        let (Some(prefix), Command::JOIN(channels, _)) = (&msg.prefix, &msg.command) else {
            return Ok(());
        };
        let Some(user) = ctx.users.observe(prefix) else {
            return Ok(());
        };
        let nick = user.nick.clone();
        let membership = Membership {
            host: user.host.clone(),
            account: user.account.clone(),
        };
        // JOIN may carry a comma-separated list when echoed back to us.
        for channel in channels.split(',') {
            debug!(nick = %nick, channel = %channel, "join");
            ctx.channels
                .get_or_create(channel)
                .add_member(&nick, membership.clone());
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

pub struct PartEvent {
    callbacks: CallbackSet,
}

impl PartEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for PartEvent {
    fn name(&self) -> &str {
        names::PART
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::PART(..)) && msg.source_nickname().is_some()
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        let (Some(nick), Command::PART(channels, _)) = (msg.source_nickname(), &msg.command)
        else {
            return Ok(());
        };
        for channel in channels.split(',') {
            debug!(nick = %nick, channel = %channel, "part");
            if nick == ctx.nick {
                ctx.channels.remove(channel);
            } else if let Some(chan) = ctx.channels.get_mut(channel) {
                chan.remove_member(nick);
            }
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

pub struct QuitEvent {
    callbacks: CallbackSet,
}

impl QuitEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for QuitEvent {
    fn name(&self) -> &str {
        names::QUIT
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::QUIT(_)) && msg.source_nickname().is_some()
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Some(nick) = msg.source_nickname() {
            debug!(nick = %nick, "quit");
            for channel in ctx.channels.iter_mut() {
                channel.remove_member(nick);
            }
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

/// Someone (possibly us) changed nick. Own-nick bookkeeping lives in
/// the connection loop; this keeps the tables consistent.
pub struct NickChangeEvent {
    callbacks: CallbackSet,
}

impl NickChangeEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for NickChangeEvent {
    fn name(&self) -> &str {
        names::NICK_CHANGE
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::NICK(_)) && msg.source_nickname().is_some()
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        let (Some(old), Command::NICK(new)) = (msg.source_nickname(), &msg.command) else {
            return Ok(());
        };
        debug!(old = %old, new = %new, "nick change");
        let old = old.to_string();
        ctx.users.rename(&old, new);
        for channel in ctx.channels.iter_mut() {
            channel.rename_member(&old, new);
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}
