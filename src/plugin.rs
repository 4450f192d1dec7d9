//! Plugin registry.
//!
//! Plugins are statically compiled implementations of [`Plugin`],
//! handed to the registry before the connection starts. The load phase
//! runs once the server accepts us: dependency checking first, then
//! event registration, then entrypoints. Event registration for every
//! surviving plugin happens before any entrypoint runs, so an
//! entrypoint can subscribe to an event another plugin declares.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::event::{Event, EventRegistry};
use crate::scheduler::Scheduler;

/// Identity and dependency declaration for a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
    /// Names of plugins that must load alongside this one.
    pub requires: Vec<String>,
}

impl PluginMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            requires: Vec::new(),
        }
    }

    pub fn requires(mut self, dep: impl Into<String>) -> Self {
        self.requires.push(dep.into());
        self
    }
}

/// What a plugin may touch during init and teardown.
pub struct PluginContext<'a> {
    pub events: &'a mut EventRegistry,
    pub scheduler: &'a mut Scheduler,
    pub config: &'a Config,
    /// Load-phase timestamp, for scheduling the first job fire.
    pub now: Instant,
}

pub trait Plugin: Send {
    fn meta(&self) -> PluginMeta;

    /// Events this plugin owns. Registered before any entrypoint runs.
    fn declared_events(&self) -> Vec<Box<dyn Event + Send>> {
        Vec::new()
    }

    /// Entrypoint. A failure unloads this plugin only.
    fn init(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()>;

    /// Called on unload. Must not fail.
    fn teardown(&mut self, ctx: &mut PluginContext<'_>) {
        let _ = ctx;
    }
}

/// Holds candidate plugins before load and live plugins after.
#[derive(Default)]
pub struct PluginRegistry {
    candidates: Vec<Box<dyn Plugin>>,
    loaded: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plugin for the next load phase.
    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.candidates.push(plugin);
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|p| p.meta().name == name)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Run the load phase over all queued candidates.
    ///
    /// Dependency pruning runs to a fixed point: a plugin whose
    /// requirement is missing is dropped, which may invalidate plugins
    /// that required it in turn. Returns the number of plugins that
    /// initialized successfully.
    pub fn load(&mut self, ctx: &mut PluginContext<'_>) -> usize {
        let candidates = std::mem::take(&mut self.candidates);
        let mut survivors = self.prune(candidates);

        // Declared events first, remembering names for rollback.
        let mut declared: Vec<Vec<String>> = Vec::with_capacity(survivors.len());
        for plugin in &survivors {
            let mut names = Vec::new();
            for event in plugin.declared_events() {
                names.push(event.name().to_string());
                ctx.events.register(event);
            }
            declared.push(names);
        }

        let mut count = 0;
        for (mut plugin, event_names) in survivors.drain(..).zip(declared) {
            let meta = plugin.meta();
            match plugin.init(ctx) {
                Ok(()) => {
                    info!(plugin = %meta.name, version = %meta.version, "plugin loaded");
                    self.loaded.push(plugin);
                    count += 1;
                }
                Err(e) => {
                    error!(plugin = %meta.name, error = ?e, "plugin init failed");
                    for name in event_names {
                        ctx.events.deregister(&name);
                    }
                }
            }
        }
        count
    }

    fn prune(&self, mut candidates: Vec<Box<dyn Plugin>>) -> Vec<Box<dyn Plugin>> {
        loop {
            let available: HashSet<String> = candidates
                .iter()
                .map(|p| p.meta().name)
                .chain(self.loaded.iter().map(|p| p.meta().name))
                .collect();

            let before = candidates.len();
            candidates.retain(|plugin| {
                let meta = plugin.meta();
                let missing: Vec<&String> = meta
                    .requires
                    .iter()
                    .filter(|dep| !available.contains(*dep))
                    .collect();
                if missing.is_empty() {
                    true
                } else {
                    warn!(plugin = %meta.name, missing = ?missing, "unmet dependencies, skipping");
                    false
                }
            });
            if candidates.len() == before {
                return candidates;
            }
        }
    }

    /// Tear down every live plugin, in reverse load order.
    pub fn unload_all(&mut self, ctx: &mut PluginContext<'_>) {
        while let Some(mut plugin) = self.loaded.pop() {
            info!(plugin = %plugin.meta().name, "plugin unloaded");
            plugin.teardown(ctx);
        }
    }
}
