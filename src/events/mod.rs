//! Built-in events installed on every connection.
//!
//! Plugins subscribe to these by name with [`EventRegistry::subscribe`];
//! the [`names`] module holds the stable keys.

mod error;
mod loaded;
mod membership;
mod message;
mod mode;
mod numeric;
mod ping;

pub use loaded::PluginsLoadedEvent;

use crate::event::EventRegistry;

/// Stable registry keys for the built-in events.
pub mod names {
    pub const PING: &str = "ping";
    pub const WELCOME: &str = "welcome";
    pub const END_OF_MOTD: &str = "end_of_motd";
    pub const NICK_IN_USE: &str = "nick_in_use";
    pub const SERVER_ERROR: &str = "server_error";
    pub const KILL: &str = "kill";
    pub const JOIN: &str = "join";
    pub const PART: &str = "part";
    pub const QUIT: &str = "quit";
    pub const NICK_CHANGE: &str = "nick_change";
    pub const MODE: &str = "mode";
    pub const CHANNEL_MESSAGE: &str = "channel_message";
    pub const PRIVATE_MESSAGE: &str = "private_message";
    pub const NOTICE: &str = "notice";
    pub const PLUGINS_LOADED: &str = "plugins_loaded";
}

/// Channel name check per the common grammar. Covers the two prefixes
/// actually seen in the wild.
pub(crate) fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

/// Install the full default set.
pub fn register_defaults(registry: &mut EventRegistry) {
    registry.register(Box::new(ping::PingEvent));
    registry.register(Box::new(numeric::WelcomeEvent::new()));
    registry.register(Box::new(numeric::EndOfMotdEvent::new()));
    registry.register(Box::new(numeric::NickInUseEvent));
    registry.register(Box::new(error::ServerErrorEvent));
    registry.register(Box::new(error::KillEvent));
    registry.register(Box::new(membership::JoinEvent::new()));
    registry.register(Box::new(membership::PartEvent::new()));
    registry.register(Box::new(membership::QuitEvent::new()));
    registry.register(Box::new(membership::NickChangeEvent::new()));
    registry.register(Box::new(mode::ModeEvent::new()));
    registry.register(Box::new(message::ChannelMessageEvent::new()));
    registry.register(Box::new(message::PrivateMessageEvent::new()));
    registry.register(Box::new(message::NoticeEvent::new()));
    registry.register(Box::new(loaded::PluginsLoadedEvent::new()));
}
