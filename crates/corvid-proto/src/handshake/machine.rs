//! Handshake state machine core implementation.

use std::collections::HashSet;

use crate::command::{CapSubCommand, Command};
use crate::message::Message;

use super::{HandshakeAction, HandshakeConfig, HandshakeError, HandshakeState};

/// Sans-IO state machine for the registration handshake.
///
/// This handles the CAP -> NICK/USER -> 001 flow.
#[derive(Clone, Debug)]
pub struct HandshakeMachine {
    config: HandshakeConfig,
    state: HandshakeState,
    /// Capabilities acknowledged by server.
    enabled_caps: HashSet<String>,
    /// Capabilities available on server.
    available_caps: HashSet<String>,
    /// Whether we've sent NICK/USER.
    registration_sent: bool,
}

impl HandshakeMachine {
    /// Create a new handshake state machine with the given configuration.
    #[must_use]
    pub fn new(config: HandshakeConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Disconnected,
            enabled_caps: HashSet::new(),
            available_caps: HashSet::new(),
            registration_sent: false,
        }
    }

    /// Get the current handshake state.
    #[must_use]
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Whether registration has completed (001 received).
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    /// Get the set of enabled capabilities.
    #[must_use]
    pub fn enabled_caps(&self) -> &HashSet<String> {
        &self.enabled_caps
    }

    /// Get the set of capabilities the server advertised.
    #[must_use]
    pub fn available_caps(&self) -> &HashSet<String> {
        &self.available_caps
    }

    /// Start the handshake. Returns initial messages to send.
    #[must_use]
    pub fn start(&mut self) -> Vec<HandshakeAction> {
        self.state = HandshakeState::CapabilityNegotiation;
        let mut actions = Vec::new();

        // Send PASS if configured
        if let Some(ref pass) = self.config.password {
            actions.push(HandshakeAction::Send(Box::new(
                Command::PASS(pass.clone()).into(),
            )));
        }

        // Request capability list (302 = IRCv3.2)
        actions.push(HandshakeAction::Send(Box::new(
            Command::CAP(None, CapSubCommand::LS, Some("302".to_string())).into(),
        )));

        actions
    }

    /// Feed a parsed inbound message to the state machine.
    ///
    /// Returns actions to perform (messages to send, completion, or errors).
    #[must_use]
    pub fn feed(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        match self.state {
            HandshakeState::Disconnected => vec![],
            HandshakeState::CapabilityNegotiation => self.handle_cap_negotiation(msg),
            HandshakeState::Registering => self.handle_registration(msg),
            HandshakeState::Connected | HandshakeState::Terminated => vec![],
        }
    }

    fn handle_cap_negotiation(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        let mut actions = Vec::new();

        match &msg.command {
            Command::CAP(_, CapSubCommand::LS, args) => {
                let raw = args.as_deref().unwrap_or("");
                // A `*` marker before the caps means more LS lines follow.
                let (is_multiline, caps_str) = match raw.strip_prefix("* ") {
                    Some(rest) => (true, rest),
                    None => (false, raw),
                };

                for cap in caps_str.split_whitespace() {
                    // Handle capability values (cap=value)
                    let cap_name = cap.split('=').next().unwrap_or(cap);
                    self.available_caps.insert(cap_name.to_string());
                }

                if is_multiline {
                    return actions;
                }

                // Request capabilities we want that are available
                let to_request: Vec<_> = self
                    .config
                    .request_caps
                    .iter()
                    .filter(|c| self.available_caps.contains(*c))
                    .cloned()
                    .collect();

                if !to_request.is_empty() {
                    actions.push(HandshakeAction::Send(Box::new(
                        Command::CAP(None, CapSubCommand::REQ, Some(to_request.join(" "))).into(),
                    )));
                } else {
                    // No caps to request, proceed to registration
                    actions.extend(self.finish_cap_negotiation());
                }
            }
            Command::CAP(_, CapSubCommand::ACK, args) => {
                let caps_str = args.as_deref().unwrap_or("");
                for cap in caps_str.split_whitespace() {
                    // Handle capability modifiers (-, ~, =)
                    let cap_name = cap.trim_start_matches(['-', '~', '=']);
                    if !cap.starts_with('-') {
                        self.enabled_caps.insert(cap_name.to_string());
                    }
                }
                actions.extend(self.finish_cap_negotiation());
            }
            Command::CAP(_, CapSubCommand::NAK, _) => {
                // NAK is not fatal, proceed with registration without the caps
                actions.extend(self.finish_cap_negotiation());
            }
            Command::ERROR(reason) => {
                self.state = HandshakeState::Terminated;
                actions.push(HandshakeAction::Error(HandshakeError::ServerError(
                    reason.clone(),
                )));
            }
            _ => {}
        }

        actions
    }

    fn handle_registration(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        let mut actions = Vec::new();

        match &msg.command {
            Command::Response(1, _) => {
                // RPL_WELCOME - fully registered
                self.state = HandshakeState::Connected;
                actions.push(HandshakeAction::Complete);
            }
            Command::Response(432 | 433, args) => {
                // ERR_ERRONEUSNICKNAME or ERR_NICKNAMEINUSE
                let nick = args
                    .get(1)
                    .cloned()
                    .unwrap_or_else(|| self.config.nickname.clone());
                actions.push(HandshakeAction::Error(HandshakeError::NicknameInUse(nick)));
            }
            Command::ERROR(reason) => {
                self.state = HandshakeState::Terminated;
                actions.push(HandshakeAction::Error(HandshakeError::ServerError(
                    reason.clone(),
                )));
            }
            _ => {}
        }

        actions
    }

    /// Send CAP END and the identity commands, then await the welcome.
    ///
    /// Idempotent with respect to NICK/USER: calling this again never
    /// re-sends registration.
    fn finish_cap_negotiation(&mut self) -> Vec<HandshakeAction> {
        self.state = HandshakeState::Registering;
        let mut actions = Vec::new();

        actions.push(HandshakeAction::Send(Box::new(
            Command::CAP(None, CapSubCommand::END, None).into(),
        )));

        if !self.registration_sent {
            self.registration_sent = true;
            actions.push(HandshakeAction::Send(Box::new(
                Command::NICK(self.config.nickname.clone()).into(),
            )));
            actions.push(HandshakeAction::Send(Box::new(
                Command::USER(
                    self.config.username.clone(),
                    "0".to_string(),
                    self.config.realname.clone(),
                )
                .into(),
            )));
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> HandshakeConfig {
        HandshakeConfig {
            nickname: "testbot".to_string(),
            username: "bot".to_string(),
            realname: "Test Bot".to_string(),
            password: None,
            request_caps: vec!["multi-prefix".to_string()],
        }
    }

    fn parse(raw: &str) -> Message {
        raw.parse().unwrap()
    }

    #[test]
    fn test_start_sends_cap_ls() {
        let mut machine = HandshakeMachine::new(make_config());
        let actions = machine.start();

        assert_eq!(machine.state(), &HandshakeState::CapabilityNegotiation);
        assert_eq!(actions.len(), 1);

        if let HandshakeAction::Send(msg) = &actions[0] {
            assert!(matches!(msg.command, Command::CAP(_, CapSubCommand::LS, _)));
        } else {
            panic!("Expected Send action");
        }
    }

    #[test]
    fn test_start_sends_pass_first() {
        let mut config = make_config();
        config.password = Some("hunter2".to_string());
        let mut machine = HandshakeMachine::new(config);
        let actions = machine.start();

        assert_eq!(actions.len(), 2);
        if let HandshakeAction::Send(msg) = &actions[0] {
            assert_eq!(msg.command, Command::PASS("hunter2".to_string()));
        } else {
            panic!("Expected Send action");
        }
    }

    #[test]
    fn test_cap_ls_then_req() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let actions = machine.feed(&parse(":server CAP * LS :multi-prefix sasl"));

        assert!(machine.available_caps().contains("multi-prefix"));
        assert!(machine.available_caps().contains("sasl"));

        // Should request multi-prefix (since it's in request_caps)
        assert!(!actions.is_empty());
        if let HandshakeAction::Send(msg) = &actions[0] {
            assert_eq!(
                msg.command,
                Command::CAP(None, CapSubCommand::REQ, Some("multi-prefix".to_string()))
            );
        }
    }

    #[test]
    fn test_multiline_ls_waits_for_final_chunk() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let actions = machine.feed(&parse(":server CAP * LS * :sasl"));
        assert!(actions.is_empty());
        assert_eq!(machine.state(), &HandshakeState::CapabilityNegotiation);

        let actions = machine.feed(&parse(":server CAP * LS :multi-prefix"));
        assert!(!actions.is_empty());
        assert!(machine.available_caps().contains("sasl"));
        assert!(machine.available_caps().contains("multi-prefix"));
    }

    #[test]
    fn test_cap_ack_then_end_and_registration() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let _ = machine.feed(&parse(":server CAP * LS :multi-prefix"));
        let actions = machine.feed(&parse(":server CAP * ACK :multi-prefix"));

        assert!(machine.enabled_caps().contains("multi-prefix"));
        assert_eq!(machine.state(), &HandshakeState::Registering);

        // Should have CAP END, NICK, USER
        let sent: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                HandshakeAction::Send(m) => Some(m.command.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], Command::CAP(None, CapSubCommand::END, None));
        assert_eq!(sent[1], Command::NICK("testbot".to_string()));
        assert!(matches!(sent[2], Command::USER(..)));
    }

    #[test]
    fn test_registration_is_idempotent() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&parse(":server CAP * LS :multi-prefix"));
        let _ = machine.feed(&parse(":server CAP * ACK :multi-prefix"));

        // A stray NAK after ACK must not re-send NICK/USER.
        let actions = machine.feed(&parse(":server CAP * NAK :other"));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_nak_proceeds_without_caps() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&parse(":server CAP * LS :multi-prefix"));
        let actions = machine.feed(&parse(":server CAP * NAK :multi-prefix"));

        assert!(machine.enabled_caps().is_empty());
        assert_eq!(machine.state(), &HandshakeState::Registering);
        assert!(actions.len() >= 3);
    }

    #[test]
    fn test_welcome_completes() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let _ = machine.feed(&parse(":server CAP * LS :"));
        let actions = machine.feed(&parse(":server 001 testbot :Welcome"));

        assert_eq!(machine.state(), &HandshakeState::Connected);
        assert!(machine.is_registered());
        assert!(actions.iter().any(|a| matches!(a, HandshakeAction::Complete)));
    }

    #[test]
    fn test_nick_in_use_reports_error() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&parse(":server CAP * LS :"));

        let actions = machine.feed(&parse(":server 433 * testbot :Nickname is already in use."));
        assert!(matches!(
            actions.as_slice(),
            [HandshakeAction::Error(HandshakeError::NicknameInUse(nick))] if nick == "testbot"
        ));
    }

    #[test]
    fn test_server_error_terminates() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let actions = machine.feed(&parse("ERROR :Closing Link: banned"));
        assert_eq!(machine.state(), &HandshakeState::Terminated);
        assert!(matches!(
            actions.as_slice(),
            [HandshakeAction::Error(HandshakeError::ServerError(_))]
        ));
    }
}
