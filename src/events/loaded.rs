//! Plugin load completion signal.

use corvid_proto::Message;

use crate::event::{CallbackSet, Context, Event};
use crate::events::names;

/// Fired once after the plugin load phase finishes. Never matches wire
/// traffic; it is driven through `fire_once` with a synthesized
/// message. Plugins that need every dependency initialized hook this
/// instead of doing work in their entrypoint.
pub struct PluginsLoadedEvent {
    callbacks: CallbackSet,
}

impl PluginsLoadedEvent {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackSet::new(),
        }
    }
}

impl Event for PluginsLoadedEvent {
    fn name(&self) -> &str {
        names::PLUGINS_LOADED
    }

    fn matches(&self, _msg: &Message, _own_nick: &str) -> bool {
        false
    }

    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        self.callbacks.fire(msg, ctx);
        Ok(())
    }

    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        Some(&mut self.callbacks)
    }
}
