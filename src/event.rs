//! Event registry and dispatch.
//!
//! Every inbound [`Message`] is mapped against all registered events;
//! the ones whose `matches` returns true are then run. Handler failures
//! are isolated per callback at the dispatch boundary: one failing
//! callback never prevents the rest of its event, or other matched
//! events, from running.

use std::collections::HashMap;
use std::time::Duration;

use corvid_proto::Message;
use tracing::{error, warn};

use crate::config::Config;
use crate::scheduler::JobFn;
use crate::state::{ChannelTable, UserTable};

/// Deferred requests a handler may make against the connection.
///
/// Handlers run while the loop's registries are borrowed, so anything
/// that mutates them is recorded here and applied by the loop after
/// dispatch finishes. This is also what makes `shutdown()` safe to call
/// from inside a handler.
pub enum Control {
    /// Flip the connection to `ShuttingDown` at the top of the next tick.
    Shutdown,
    /// Run the plugin load phase.
    LoadPlugins,
    /// Register a scheduler job.
    AddJob {
        name: String,
        interval: Duration,
        recurring: bool,
        callback: JobFn,
    },
    /// Remove a scheduler job.
    RemoveJob(String),
}

/// Per-dispatch handle passed to every event and callback.
pub struct Context<'a> {
    /// Our current nickname.
    pub nick: &'a str,
    pub config: &'a Config,
    pub users: &'a mut UserTable,
    pub channels: &'a mut ChannelTable,
    outbox: &'a mut std::collections::VecDeque<Message>,
    control: &'a mut Vec<Control>,
}

impl<'a> Context<'a> {
    pub fn new(
        nick: &'a str,
        config: &'a Config,
        users: &'a mut UserTable,
        channels: &'a mut ChannelTable,
        outbox: &'a mut std::collections::VecDeque<Message>,
        control: &'a mut Vec<Control>,
    ) -> Self {
        Self {
            nick,
            config,
            users,
            channels,
            outbox,
            control,
        }
    }

    /// Queue a message for sending. The loop drains one line per tick.
    pub fn send(&mut self, msg: Message) {
        self.outbox.push_back(msg);
    }

    /// Queue a message ahead of everything already waiting.
    ///
    /// Reserved for protocol-critical replies (keepalive) that must not
    /// sit behind a backlog.
    pub fn send_front(&mut self, msg: Message) {
        self.outbox.push_front(msg);
    }

    /// Request connection shutdown. Observed at the top of the next
    /// tick; never deadlocks the running dispatch.
    pub fn shutdown(&mut self) {
        self.control.push(Control::Shutdown);
    }

    /// Request the plugin load phase after this dispatch.
    pub fn load_plugins(&mut self) {
        self.control.push(Control::LoadPlugins);
    }

    /// Request a scheduler job after this dispatch.
    pub fn add_job(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        recurring: bool,
        callback: JobFn,
    ) {
        self.control.push(Control::AddJob {
            name: name.into(),
            interval,
            recurring,
            callback,
        });
    }

    /// Request removal of a scheduler job after this dispatch.
    pub fn remove_job(&mut self, name: impl Into<String>) {
        self.control.push(Control::RemoveJob(name.into()));
    }
}

/// A handler function subscribed to an event.
pub type Callback = Box<dyn FnMut(&Message, &mut Context<'_>) -> anyhow::Result<()> + Send>;

/// An addition-ordered set of callbacks keyed by a stable identity.
///
/// Re-registering an id replaces the callback in place, keeping its
/// original position.
#[derive(Default)]
pub struct CallbackSet {
    callbacks: Vec<(String, Callback)>,
}

impl CallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a callback under a stable id.
    pub fn register(&mut self, id: impl Into<String>, callback: Callback) {
        let id = id.into();
        match self.callbacks.iter_mut().find(|(i, _)| *i == id) {
            Some(slot) => slot.1 = callback,
            None => self.callbacks.push((id, callback)),
        }
    }

    /// Remove a callback by id.
    pub fn deregister(&mut self, id: &str) {
        self.callbacks.retain(|(i, _)| i != id);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invoke every callback in addition order, isolating failures.
    pub fn fire(&mut self, msg: &Message, ctx: &mut Context<'_>) {
        for (id, callback) in &mut self.callbacks {
            if let Err(e) = callback(msg, ctx) {
                error!(callback = %id, error = ?e, "callback failed");
            }
        }
    }
}

/// A named, matchable unit of dispatch.
pub trait Event {
    /// Unique key in the registry. Re-registering a name replaces the
    /// prior instance.
    fn name(&self) -> &str;

    /// Whether this event fires for the given message.
    fn matches(&self, msg: &Message, own_nick: &str) -> bool;

    /// Handle a matched (or synthesized) message.
    fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()>;

    /// Urgent events run before all other matches for a message.
    /// The keepalive responder relies on this.
    fn urgent(&self) -> bool {
        false
    }

    /// The event's subscriber list, if it accepts plugin callbacks.
    fn callbacks(&mut self) -> Option<&mut CallbackSet> {
        None
    }
}

/// Name-keyed event table.
///
/// Iteration order during dispatch is the table's own (unspecified);
/// only the urgent-first split and per-event callback order are
/// guaranteed.
#[derive(Default)]
pub struct EventRegistry {
    events: HashMap<String, Box<dyn Event + Send>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event, replacing any prior instance with the same name.
    pub fn register(&mut self, event: Box<dyn Event + Send>) {
        self.events.insert(event.name().to_string(), event);
    }

    /// Deregister an event by name.
    pub fn deregister(&mut self, name: &str) -> Option<Box<dyn Event + Send>> {
        self.events.remove(name)
    }

    /// Subscribe a callback to a named event.
    pub fn subscribe(
        &mut self,
        event_name: &str,
        id: impl Into<String>,
        callback: Callback,
    ) -> anyhow::Result<()> {
        let event = self
            .events
            .get_mut(event_name)
            .ok_or_else(|| anyhow::anyhow!("no such event: {}", event_name))?;
        let callbacks = event
            .callbacks()
            .ok_or_else(|| anyhow::anyhow!("event accepts no callbacks: {}", event_name))?;
        callbacks.register(id, callback);
        Ok(())
    }

    /// Remove a callback from a named event.
    pub fn unsubscribe(&mut self, event_name: &str, id: &str) {
        if let Some(callbacks) = self
            .events
            .get_mut(event_name)
            .and_then(|event| event.callbacks())
        {
            callbacks.deregister(id);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop every registered event (connection teardown).
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Match a message against all events, then run the matches.
    ///
    /// The match pass completes before any event runs, so a handler
    /// mutating tables cannot affect which events were selected for
    /// this message. Run failures are logged and swallowed here.
    pub fn map_and_fire(&mut self, msg: &Message, ctx: &mut Context<'_>) {
        let mut matched: Vec<String> = Vec::new();
        let mut rest: Vec<String> = Vec::new();

        for event in self.events.values() {
            if event.matches(msg, ctx.nick) {
                if event.urgent() {
                    matched.push(event.name().to_string());
                } else {
                    rest.push(event.name().to_string());
                }
            }
        }
        matched.extend(rest);

        for name in matched {
            if let Some(event) = self.events.get_mut(&name) {
                if let Err(e) = event.run(msg, ctx) {
                    error!(event = %name, error = ?e, "event handler failed");
                }
            }
        }
    }

    /// Run a specific event directly, bypassing `matches`.
    ///
    /// Used for internally synthesized signals with no wire line.
    pub fn fire_once(&mut self, name: &str, msg: &Message, ctx: &mut Context<'_>) {
        match self.events.get_mut(name) {
            Some(event) => {
                if let Err(e) = event.run(msg, ctx) {
                    error!(event = %name, error = ?e, "event handler failed");
                }
            }
            None => warn!(event = %name, "fire_once on unregistered event"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::Fixture;
    use super::*;
    use corvid_proto::Command;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A match-everything event carrying a callback set.
    struct CatchAll {
        name: &'static str,
        callbacks: CallbackSet,
    }

    impl CatchAll {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                callbacks: CallbackSet::new(),
            }
        }
    }

    impl Event for CatchAll {
        fn name(&self) -> &str {
            self.name
        }

        fn matches(&self, _msg: &Message, _own_nick: &str) -> bool {
            true
        }

        fn run(&mut self, msg: &Message, ctx: &mut Context<'_>) -> anyhow::Result<()> {
            self.callbacks.fire(msg, ctx);
            Ok(())
        }

        fn callbacks(&mut self) -> Option<&mut CallbackSet> {
            Some(&mut self.callbacks)
        }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = Arc::clone(counter);
        Box::new(move |_msg, _ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn ping() -> Message {
        Message::from(Command::PING("abc".to_string(), None))
    }

    #[test]
    fn test_dispatch_isolation() {
        // A failing first callback still runs the second callback, and
        // other matched events still run.
        let mut registry = EventRegistry::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let mut first = CatchAll::new("first");
        first
            .callbacks()
            .unwrap()
            .register("a", Box::new(|_m, _c| anyhow::bail!("boom")));
        first.callbacks().unwrap().register("b", counting(&ran));
        registry.register(Box::new(first));

        let mut second = CatchAll::new("second");
        second.callbacks().unwrap().register("c", counting(&ran));
        registry.register(Box::new(second));

        let mut fx = Fixture::new();
        registry.map_and_fire(&ping(), &mut fx.ctx());

        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_replace_on_register() {
        let mut registry = EventRegistry::new();
        let first_ran = Arc::new(AtomicUsize::new(0));
        let second_ran = Arc::new(AtomicUsize::new(0));

        let mut first = CatchAll::new("dup");
        first.callbacks().unwrap().register("x", counting(&first_ran));
        registry.register(Box::new(first));

        let mut second = CatchAll::new("dup");
        second.callbacks().unwrap().register("x", counting(&second_ran));
        registry.register(Box::new(second));

        assert_eq!(registry.len(), 1);

        let mut fx = Fixture::new();
        registry.map_and_fire(&ping(), &mut fx.ctx());

        assert_eq!(first_ran.load(Ordering::SeqCst), 0);
        assert_eq!(second_ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_addition_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let push = |tag: &'static str| -> Callback {
            let order = Arc::clone(&order);
            Box::new(move |_m, _c| {
                order.lock().unwrap().push(tag);
                Ok(())
            })
        };

        let mut registry = EventRegistry::new();
        let mut event = CatchAll::new("ordered");
        event.callbacks().unwrap().register("one", push("one"));
        event.callbacks().unwrap().register("two", push("two"));
        // Replacing keeps the original position.
        event.callbacks().unwrap().register("one", push("one-again"));
        registry.register(Box::new(event));

        let mut fx = Fixture::new();
        registry.map_and_fire(&ping(), &mut fx.ctx());

        assert_eq!(*order.lock().unwrap(), vec!["one-again", "two"]);
    }

    #[test]
    fn test_deregister_callback() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut registry = EventRegistry::new();
        let mut event = CatchAll::new("ev");
        event.callbacks().unwrap().register("x", counting(&ran));
        registry.register(Box::new(event));

        registry.unsubscribe("ev", "x");

        let mut fx = Fixture::new();
        registry.map_and_fire(&ping(), &mut fx.ctx());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fire_once_bypasses_match() {
        struct NeverMatches {
            ran: Arc<AtomicUsize>,
        }
        impl Event for NeverMatches {
            fn name(&self) -> &str {
                "never"
            }
            fn matches(&self, _msg: &Message, _own_nick: &str) -> bool {
                false
            }
            fn run(&mut self, _msg: &Message, _ctx: &mut Context<'_>) -> anyhow::Result<()> {
                self.ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let ran = Arc::new(AtomicUsize::new(0));
        let mut registry = EventRegistry::new();
        registry.register(Box::new(NeverMatches { ran: Arc::clone(&ran) }));

        let mut fx = Fixture::new();
        registry.map_and_fire(&ping(), &mut fx.ctx());
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        registry.fire_once("never", &ping(), &mut fx.ctx());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_unknown_event_errors() {
        let mut registry = EventRegistry::new();
        let result = registry.subscribe("ghost", "x", Box::new(|_m, _c| Ok(())));
        assert!(result.is_err());
    }
}
