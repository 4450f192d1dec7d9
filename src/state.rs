//! Shared identity and channel state.
//!
//! These tables are owned by the connection and only ever mutated on
//! its loop, so no locking is needed. Users are deduplicated on nick
//! and updated in place on every sighting; entries are never evicted
//! (churn is small relative to a server session).

use std::collections::HashMap;

use corvid_proto::Prefix;

/// A user identity derived from the wire form `nick!ident@host`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub nick: String,
    pub ident: Option<String>,
    pub host: Option<String>,
    /// Free-form services account tag.
    pub account: Option<String>,
}

/// Identity table, deduplicated on nick.
#[derive(Debug, Default)]
pub struct UserTable {
    users: HashMap<String, User>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting of a user prefix.
    ///
    /// Looks up the dedupe table by nick before allocating: an existing
    /// entry has its ident/host refreshed in place.
    pub fn observe(&mut self, prefix: &Prefix) -> Option<&User> {
        let nick = prefix.nick()?;
        let user = self
            .users
            .entry(nick.to_string())
            .or_insert_with(|| User {
                nick: nick.to_string(),
                ..User::default()
            });
        if let Some(ident) = prefix.user() {
            user.ident = Some(ident.to_string());
        }
        if let Some(host) = prefix.host() {
            user.host = Some(host.to_string());
        }
        Some(user)
    }

    /// Look up a user by nick.
    pub fn get(&self, nick: &str) -> Option<&User> {
        self.users.get(nick)
    }

    /// Set the services account tag for a nick, if known.
    pub fn set_account(&mut self, nick: &str, account: Option<String>) {
        if let Some(user) = self.users.get_mut(nick) {
            user.account = account;
        }
    }

    /// Re-key a user after a nick change, preserving their fields.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(mut user) = self.users.remove(old) {
            user.nick = new.to_string();
            self.users.insert(new.to_string(), user);
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Per-member channel state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    pub host: Option<String>,
    pub account: Option<String>,
}

/// A channel and its membership map.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub name: String,
    members: HashMap<String, Membership>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
        }
    }

    pub fn add_member(&mut self, nick: &str, membership: Membership) {
        self.members.insert(nick.to_string(), membership);
    }

    pub fn remove_member(&mut self, nick: &str) -> Option<Membership> {
        self.members.remove(nick)
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.members.contains_key(nick)
    }

    pub fn rename_member(&mut self, old: &str, new: &str) {
        if let Some(membership) = self.members.remove(old) {
            self.members.insert(new.to_string(), membership);
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Channel table, unique by name.
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: HashMap<String, Channel>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a channel by name, creating it on first sighting.
    pub fn get_or_create(&mut self, name: &str) -> &mut Channel {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| Channel::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(name)
    }

    /// Iterate all channels (for QUIT/NICK propagation).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_dedupes_on_nick() {
        let mut users = UserTable::new();
        users.observe(&Prefix::new_from_str("crow!c@old.host"));
        users.observe(&Prefix::new_from_str("crow!c@new.host"));

        assert_eq!(users.len(), 1);
        let user = users.get("crow").unwrap();
        assert_eq!(user.host.as_deref(), Some("new.host"));
    }

    #[test]
    fn test_observe_partial_prefix_keeps_fields() {
        let mut users = UserTable::new();
        users.observe(&Prefix::new_from_str("crow!c@host"));
        // A bare-nick sighting must not erase ident/host.
        users.observe(&Prefix::new_from_str("crow"));

        let user = users.get("crow").unwrap();
        assert_eq!(user.ident.as_deref(), Some("c"));
        assert_eq!(user.host.as_deref(), Some("host"));
    }

    #[test]
    fn test_rename_preserves_identity() {
        let mut users = UserTable::new();
        users.observe(&Prefix::new_from_str("crow!c@host"));
        users.set_account("crow", Some("crowacct".into()));

        users.rename("crow", "raven");
        assert!(users.get("crow").is_none());
        let user = users.get("raven").unwrap();
        assert_eq!(user.nick, "raven");
        assert_eq!(user.account.as_deref(), Some("crowacct"));
    }

    #[test]
    fn test_server_prefix_is_not_a_user() {
        let mut users = UserTable::new();
        assert!(users.observe(&Prefix::new_from_str("irc.example.com")).is_none());
        assert!(users.is_empty());
    }

    #[test]
    fn test_channel_uniqueness() {
        let mut channels = ChannelTable::new();
        channels.get_or_create("#corvid").add_member("crow", Membership::default());
        channels.get_or_create("#corvid").add_member("raven", Membership::default());

        assert_eq!(channels.len(), 1);
        assert_eq!(channels.get("#corvid").unwrap().member_count(), 2);
    }

    #[test]
    fn test_channel_membership_rename() {
        let mut channels = ChannelTable::new();
        let chan = channels.get_or_create("#corvid");
        chan.add_member("crow", Membership { host: Some("h".into()), account: None });
        chan.rename_member("crow", "raven");

        assert!(!chan.has_member("crow"));
        assert!(chan.has_member("raven"));
    }
}
