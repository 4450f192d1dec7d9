//! Numeric reply handling.

use corvid_proto::{Command, Message};
use tracing::{error, info};

use crate::event::{CallbackSet, Context, Event};
use crate::events::names;

const RPL_WELCOME: u16 = 1;
const RPL_ENDOFMOTD: u16 = 376;
const ERR_NOMOTD: u16 = 422;
const ERR_NICKNAMEINUSE: u16 = 433;

/// 001. The server has accepted our registration.
pub struct WelcomeEvent {
    callbacks: CallbackSet,
}

impl WelcomeEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for WelcomeEvent {
    fn name(&self) -> &str {
        names::WELCOME
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::Response(RPL_WELCOME, _))
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if let Some(text) = msg.payload() {
            info!(welcome = %text, "registered with server");
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

/// 376 or 422. End of MOTD is the earliest point most networks accept
/// JOIN, so autojoin and the plugin load phase hang off it.
pub struct EndOfMotdEvent {
    callbacks: CallbackSet,
}

impl EndOfMotdEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for EndOfMotdEvent {
    fn name(&self) -> &str {
        names::END_OF_MOTD
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(
            msg.command,
            Command::Response(RPL_ENDOFMOTD, _) | Command::Response(ERR_NOMOTD, _)
        )
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        let config = ctx.config;
        if config.on_connect.join {
            for channel in &config.channels {
                info!(channel = %channel.name, "autojoin");
                ctx.send(Message::join(channel.name.clone(), channel.key.clone()));
            }
        }
        if config.on_connect.load_plugins {
            ctx.load_plugins();
        }
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}

/// 433 after registration. A failed mid-session NICK leaves us in an
/// inconsistent identity, so disconnect and let the outer loop retry.
pub struct NickInUseEvent;

impl Event for NickInUseEvent {
    fn name(&self) -> &str {
        names::NICK_IN_USE
    }

    fn matches(&self, msg: &Message, _own_nick: &str) -> bool {
        matches!(msg.command, Command::Response(ERR_NICKNAMEINUSE, _))
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        let wanted = match &msg.command {
            Command::Response(_, args) => args.get(1).map(String::as_str).unwrap_or("?"),
            _ => "?",
        };
        error!(nick = %wanted, "nickname in use, disconnecting");
        ctx.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests_support::Fixture;
    use crate::event::Control;

    #[test]
    fn test_end_of_motd_autojoins_and_loads_plugins() {
        let mut fx = Fixture::new();
        let msg: Message = ":serv 376 corvid :End of /MOTD".parse().unwrap();

        let mut event = EndOfMotdEvent::new();
        assert!(event.matches(&msg, "corvid"));
        event.run(&msg, &mut fx.ctx()).unwrap();

        assert_eq!(fx.outbox.len(), 1);
        assert_eq!(fx.outbox[0].to_string(), "JOIN #roost\r\n");
        assert!(matches!(fx.control.as_slice(), [Control::LoadPlugins]));
    }

    #[test]
    fn test_no_motd_counts_as_end() {
        let msg: Message = ":serv 422 corvid :MOTD missing".parse().unwrap();
        assert!(EndOfMotdEvent::new().matches(&msg, "corvid"));
    }

    #[test]
    fn test_nick_in_use_requests_shutdown() {
        let mut fx = Fixture::new();
        let msg: Message = ":serv 433 * corvid :Nickname is already in use".parse().unwrap();

        let mut event = NickInUseEvent;
        assert!(event.matches(&msg, "corvid"));
        event.run(&msg, &mut fx.ctx()).unwrap();

        assert!(matches!(fx.control.as_slice(), [Control::Shutdown]));
    }
}
