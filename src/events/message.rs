//! PRIVMSG and NOTICE routing.
//!
//! A PRIVMSG aimed at a channel and one aimed at us are distinct
//! events so plugins can subscribe to exactly the traffic they want.

use corvid_proto::{Command, Message};

use crate::event::{CallbackSet, Context, Event};
use crate::events::{is_channel, names};

pub struct ChannelMessageEvent {
    callbacks: CallbackSet,
}

impl ChannelMessageEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for ChannelMessageEvent {
    fn name(&self) -> &str {
        names::CHANNEL_MESSAGE
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(&msg.command, Command::PRIVMSG(target, _) if is_channel(target))
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Some(prefix) = &msg.prefix {
            ctx.users.observe(prefix);
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

pub struct PrivateMessageEvent {
    callbacks: CallbackSet,
}

impl PrivateMessageEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for PrivateMessageEvent {
    fn name(&self) -> &str {
        names::PRIVATE_MESSAGE
    }

    fn matches(&self, msg: &Message, own_nick: &str) -> bool {
        matches!(&msg.command, Command::PRIVMSG(target, _) if target == own_nick)
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Some(prefix) = &msg.prefix {
            ctx.users.observe(prefix);
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

/// All NOTICEs, channel or direct. Never answered automatically.
pub struct NoticeEvent {
    callbacks: CallbackSet,
}

impl NoticeEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for NoticeEvent {
    fn name(&self) -> &str {
        names::NOTICE
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::NOTICE(..))
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}
