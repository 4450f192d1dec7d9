//! IRC command types.
//!
//! This module provides a closed, type-safe representation of the
//! commands a client bot emits and receives. Matching on [`Command`]
//! is exhaustive; anything the bot has no structured knowledge of is
//! captured in the `Raw` variant rather than failing the parse.
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol
//! - IRCv3 capability negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// Subcommands of the IRCv3 `CAP` command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapSubCommand {
    /// Request or receive the server capability list.
    LS,
    /// List currently enabled capabilities.
    LIST,
    /// Request capabilities.
    REQ,
    /// Server acknowledged a capability request.
    ACK,
    /// Server rejected a capability request.
    NAK,
    /// End capability negotiation.
    END,
    /// Server advertises new capabilities.
    NEW,
    /// Server withdraws capabilities.
    DEL,
}

impl CapSubCommand {
    /// The wire token for this subcommand.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapSubCommand::LS => "LS",
            CapSubCommand::LIST => "LIST",
            CapSubCommand::REQ => "REQ",
            CapSubCommand::ACK => "ACK",
            CapSubCommand::NAK => "NAK",
            CapSubCommand::END => "END",
            CapSubCommand::NEW => "NEW",
            CapSubCommand::DEL => "DEL",
        }
    }
}

impl FromStr for CapSubCommand {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LS" => Ok(CapSubCommand::LS),
            "LIST" => Ok(CapSubCommand::LIST),
            "REQ" => Ok(CapSubCommand::REQ),
            "ACK" => Ok(CapSubCommand::ACK),
            "NAK" => Ok(CapSubCommand::NAK),
            "END" => Ok(CapSubCommand::END),
            "NEW" => Ok(CapSubCommand::NEW),
            "DEL" => Ok(CapSubCommand::DEL),
            _ => Err(MessageParseError::InvalidCommand),
        }
    }
}

/// IRC command with its parameters.
///
/// Unknown commands are captured in the `Raw` variant.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Command {
    // === Connection Registration (RFC 2812 Section 3.1) ===
    /// `PASS password`
    PASS(String),
    /// `NICK nickname` - registration or a nick change when prefixed.
    NICK(String),
    /// `USER username mode realname`
    USER(String, String, String),
    /// `CAP [*] subcommand [params...]` - capability negotiation.
    ///
    /// The first field is the target the server addressed (`*` before
    /// registration, the nick after), present on inbound messages only.
    CAP(Option<String>, CapSubCommand, Option<String>),
    /// `QUIT [message]`
    QUIT(Option<String>),

    // === Channel Operations (RFC 2812 Section 3.2) ===
    /// `JOIN channels [keys]`
    JOIN(String, Option<String>),
    /// `PART channels [message]`
    PART(String, Option<String>),
    /// `MODE target [modestring] [args...]`
    MODE(String, Vec<String>),

    // === Messaging (RFC 2812 Section 3.3) ===
    /// `PRIVMSG target text`
    PRIVMSG(String, String),
    /// `NOTICE target text`
    NOTICE(String, String),

    // === Keepalive and fatal signals (RFC 2812 Sections 3.7.2-3.7.4) ===
    /// `PING server1 [server2]`
    PING(String, Option<String>),
    /// `PONG server1 [server2]`
    PONG(String, Option<String>),
    /// `ERROR message` - fatal, server-initiated disconnect.
    ERROR(String),
    /// `KILL nickname comment` - fatal when aimed at us.
    KILL(String, Option<String>),

    // === Numerics and fallback ===
    /// A three-digit numeric reply with its parameters.
    Response(u16, Vec<String>),
    /// Any command this library has no structured variant for.
    Raw(String, Vec<String>),
}

impl Command {
    /// Classify a command token and its arguments into a [`Command`].
    ///
    /// Never fails for a syntactically valid token: commands with the
    /// wrong arity or no structured variant fall through to `Raw`.
    pub fn new(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
        if cmd.is_empty() {
            return Err(MessageParseError::InvalidCommand);
        }

        if cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit()) {
            let code = cmd.parse().map_err(|_| MessageParseError::InvalidCommand)?;
            return Ok(Command::Response(code, owned(&args)));
        }

        Ok(match (cmd.to_ascii_uppercase().as_str(), args.as_slice()) {
            ("PASS", [pass]) => Command::PASS(s(pass)),
            ("NICK", [nick]) => Command::NICK(s(nick)),
            ("USER", [user, mode, realname]) => Command::USER(s(user), s(mode), s(realname)),
            ("USER", [user, mode, _unused, realname]) => {
                Command::USER(s(user), s(mode), s(realname))
            }
            ("CAP", args) => match parse_cap(args) {
                Some(cap) => cap,
                None => Command::Raw(cmd.to_ascii_uppercase(), owned(args)),
            },
            ("QUIT", []) => Command::QUIT(None),
            ("QUIT", [reason]) => Command::QUIT(Some(s(reason))),
            ("JOIN", [chans]) => Command::JOIN(s(chans), None),
            ("JOIN", [chans, keys]) => Command::JOIN(s(chans), Some(s(keys))),
            ("PART", [chans]) => Command::PART(s(chans), None),
            ("PART", [chans, reason]) => Command::PART(s(chans), Some(s(reason))),
            ("MODE", [target, rest @ ..]) => Command::MODE(s(target), owned(rest)),
            ("PRIVMSG", [target, text]) => Command::PRIVMSG(s(target), s(text)),
            ("NOTICE", [target, text]) => Command::NOTICE(s(target), s(text)),
            ("PING", [token]) => Command::PING(s(token), None),
            ("PING", [token, token2]) => Command::PING(s(token), Some(s(token2))),
            ("PONG", [token]) => Command::PONG(s(token), None),
            ("PONG", [token, token2]) => Command::PONG(s(token), Some(s(token2))),
            ("ERROR", [reason]) => Command::ERROR(s(reason)),
            ("KILL", [nick]) => Command::KILL(s(nick), None),
            ("KILL", [nick, comment]) => Command::KILL(s(nick), Some(s(comment))),
            (upper, args) => Command::Raw(upper.to_string(), owned(args)),
        })
    }

    /// The wire name of this command.
    pub fn name(&self) -> &str {
        match self {
            Command::PASS(_) => "PASS",
            Command::NICK(_) => "NICK",
            Command::USER(..) => "USER",
            Command::CAP(..) => "CAP",
            Command::QUIT(_) => "QUIT",
            Command::JOIN(..) => "JOIN",
            Command::PART(..) => "PART",
            Command::MODE(..) => "MODE",
            Command::PRIVMSG(..) => "PRIVMSG",
            Command::NOTICE(..) => "NOTICE",
            Command::PING(..) => "PING",
            Command::PONG(..) => "PONG",
            Command::ERROR(_) => "ERROR",
            Command::KILL(..) => "KILL",
            Command::Response(..) => "",
            Command::Raw(name, _) => name,
        }
    }
}

/// Parse inbound/outbound CAP argument shapes.
///
/// Inbound: `CAP <target> <sub> [*] [:caps]`. Outbound: `CAP <sub> [:caps]`.
/// A `*` between subcommand and caps marks a multiline `LS` reply; it is
/// folded into the args string so the handshake machine can see it.
fn parse_cap(args: &[&str]) -> Option<Command> {
    match args {
        [sub] => Some(Command::CAP(None, sub.parse().ok()?, None)),
        [sub, rest] if sub.parse::<CapSubCommand>().is_ok() => {
            Some(Command::CAP(None, sub.parse().ok()?, Some(s(rest))))
        }
        [target, sub] => Some(Command::CAP(Some(s(target)), sub.parse().ok()?, None)),
        [target, sub, rest] => Some(Command::CAP(Some(s(target)), sub.parse().ok()?, Some(s(rest)))),
        [target, sub, star, rest] if *star == "*" => Some(Command::CAP(
            Some(s(target)),
            sub.parse().ok()?,
            Some(format!("* {}", rest)),
        )),
        _ => None,
    }
}

fn s(st: &&str) -> String {
    (*st).to_string()
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Whether the final parameter must carry a `:` prefix on the wire.
fn needs_colon_prefix(arg: &str) -> bool {
    arg.is_empty() || arg.starts_with(':') || arg.contains(' ')
}

/// Write a command with positional args and an optional trailing arg.
///
/// The trailing arg is always colon-prefixed; positional args get a
/// colon only when required to survive re-tokenization.
fn write_cmd(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    args: &[&str],
    trailing: Option<&str>,
) -> fmt::Result {
    f.write_str(name)?;
    for (i, arg) in args.iter().enumerate() {
        f.write_str(" ")?;
        let is_last = i == args.len() - 1 && trailing.is_none();
        if is_last && needs_colon_prefix(arg) {
            f.write_str(":")?;
        }
        f.write_str(arg)?;
    }
    if let Some(t) = trailing {
        f.write_str(" :")?;
        f.write_str(t)?;
    }
    Ok(())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PASS(p) => write_cmd(f, "PASS", &[], Some(p)),
            Command::NICK(n) => write_cmd(f, "NICK", &[n], None),
            Command::USER(u, m, r) => write_cmd(f, "USER", &[u, m, "*"], Some(r)),
            Command::CAP(target, sub, args) => {
                let mut positional: Vec<&str> = Vec::new();
                if let Some(t) = target {
                    positional.push(t);
                }
                positional.push(sub.as_str());
                if let Some(a) = args {
                    positional.push(a);
                }
                write_cmd(f, "CAP", &positional, None)
            }
            Command::QUIT(Some(m)) => write_cmd(f, "QUIT", &[], Some(m)),
            Command::QUIT(None) => write_cmd(f, "QUIT", &[], None),
            Command::JOIN(c, Some(k)) => write_cmd(f, "JOIN", &[c, k], None),
            Command::JOIN(c, None) => write_cmd(f, "JOIN", &[c], None),
            Command::PART(c, Some(m)) => write_cmd(f, "PART", &[c], Some(m)),
            Command::PART(c, None) => write_cmd(f, "PART", &[c], None),
            Command::MODE(target, rest) => {
                f.write_str("MODE ")?;
                f.write_str(target)?;
                for arg in rest {
                    f.write_str(" ")?;
                    f.write_str(arg)?;
                }
                Ok(())
            }
            Command::PRIVMSG(t, m) => write_cmd(f, "PRIVMSG", &[t], Some(m)),
            Command::NOTICE(t, m) => write_cmd(f, "NOTICE", &[t], Some(m)),
            Command::PING(t, None) => write_cmd(f, "PING", &[], Some(t)),
            Command::PING(t, Some(t2)) => write_cmd(f, "PING", &[t], Some(t2)),
            Command::PONG(t, None) => write_cmd(f, "PONG", &[], Some(t)),
            Command::PONG(t, Some(t2)) => write_cmd(f, "PONG", &[t], Some(t2)),
            Command::ERROR(m) => write_cmd(f, "ERROR", &[], Some(m)),
            Command::KILL(n, Some(c)) => write_cmd(f, "KILL", &[n], Some(c)),
            Command::KILL(n, None) => write_cmd(f, "KILL", &[n], None),
            Command::Response(code, args) => {
                write!(f, "{:03}", code)?;
                let strs: Vec<&str> = args.iter().map(|a| a.as_str()).collect();
                if let Some((last, init)) = strs.split_last() {
                    for arg in init {
                        write!(f, " {}", arg)?;
                    }
                    f.write_str(" ")?;
                    if needs_colon_prefix(last) {
                        f.write_str(":")?;
                    }
                    f.write_str(last)?;
                }
                Ok(())
            }
            Command::Raw(name, args) => {
                let strs: Vec<&str> = args.iter().map(|a| a.as_str()).collect();
                match strs.split_last() {
                    Some((last, init)) if needs_colon_prefix(last) => {
                        write_cmd(f, name, init, Some(last))
                    }
                    _ => write_cmd(f, name, &strs, None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_privmsg() {
        let cmd = Command::new("PRIVMSG", vec!["#chan", "hello world"]).unwrap();
        assert_eq!(cmd, Command::PRIVMSG("#chan".into(), "hello world".into()));
    }

    #[test]
    fn test_classify_numeric() {
        let cmd = Command::new("001", vec!["nick", "Welcome"]).unwrap();
        assert_eq!(cmd, Command::Response(1, vec!["nick".into(), "Welcome".into()]));
    }

    #[test]
    fn test_classify_lowercase() {
        let cmd = Command::new("ping", vec!["abc"]).unwrap();
        assert_eq!(cmd, Command::PING("abc".into(), None));
    }

    #[test]
    fn test_unknown_command_is_raw() {
        let cmd = Command::new("WALLOPS", vec!["text"]).unwrap();
        assert_eq!(cmd, Command::Raw("WALLOPS".into(), vec!["text".into()]));
    }

    #[test]
    fn test_wrong_arity_is_raw() {
        let cmd = Command::new("PASS", vec![]).unwrap();
        assert_eq!(cmd, Command::Raw("PASS".into(), vec![]));
    }

    #[test]
    fn test_inbound_cap_ls() {
        let cmd = Command::new("CAP", vec!["*", "LS", "multi-prefix sasl"]).unwrap();
        assert_eq!(
            cmd,
            Command::CAP(
                Some("*".into()),
                CapSubCommand::LS,
                Some("multi-prefix sasl".into())
            )
        );
    }

    #[test]
    fn test_inbound_cap_multiline_ls() {
        let cmd = Command::new("CAP", vec!["*", "LS", "*", "multi-prefix"]).unwrap();
        assert_eq!(
            cmd,
            Command::CAP(Some("*".into()), CapSubCommand::LS, Some("* multi-prefix".into()))
        );
    }

    #[test]
    fn test_display_trailing_colon() {
        assert_eq!(
            Command::PRIVMSG("#chan".into(), "hello world".into()).to_string(),
            "PRIVMSG #chan :hello world"
        );
        assert_eq!(Command::PING("abc".into(), None).to_string(), "PING :abc");
        assert_eq!(Command::NICK("corvid".into()).to_string(), "NICK corvid");
    }

    #[test]
    fn test_display_user() {
        assert_eq!(
            Command::USER("bot".into(), "+iw".into(), "A Bot".into()).to_string(),
            "USER bot +iw * :A Bot"
        );
    }

    #[test]
    fn test_display_outbound_cap() {
        assert_eq!(
            Command::CAP(None, CapSubCommand::LS, Some("302".into())).to_string(),
            "CAP LS 302"
        );
        assert_eq!(
            Command::CAP(None, CapSubCommand::REQ, Some("multi-prefix sasl".into())).to_string(),
            "CAP REQ :multi-prefix sasl"
        );
        assert_eq!(Command::CAP(None, CapSubCommand::END, None).to_string(), "CAP END");
    }
}
