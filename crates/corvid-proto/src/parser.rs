//! Nom-based IRC line parser.
//!
//! Splits a raw line into its four optional/required groups: origin
//! (after a leading `:`), command token, space-separated parameters,
//! and the `:`-prefixed trailing parameter.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::error::MessageParseError;

/// Parse the message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command name (1*letter or 3digit).
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_alphanumeric())(input)?;

    // RFC 2812: command = 1*letter / 3digit
    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Parse message parameters from the remaining input after the command.
///
/// Handles both regular space-separated parameters and the trailing
/// parameter (prefixed with `:`) which may contain spaces. Multiple
/// consecutive spaces are treated as a single separator.
///
/// Enforces the RFC 2812 limit of 15 parameters.
fn parse_params(input: &str) -> (&str, SmallVec<[&str; 15]>) {
    let mut params: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        if params.len() >= 15 {
            break;
        }

        // Skip all leading spaces (handles multiple consecutive spaces)
        while rest.as_bytes().first() == Some(&b' ') {
            rest = &rest[1..];
        }

        if rest.is_empty() || rest.starts_with('\r') || rest.starts_with('\n') {
            break;
        }

        if let Some(b':') = rest.as_bytes().first().copied() {
            // Trailing parameter - everything after `:` until line end
            let after_colon = &rest[1..];
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        }

        // Regular parameter - until next space or line end
        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        let param = &rest[..end];
        if param.is_empty() {
            break;
        }
        params.push(param);
        rest = &rest[end..];
    }

    (rest, params)
}

/// Parse a complete IRC line into its components.
///
/// ```text
/// [:prefix] <command> [params...] [:trailing]
/// ```
fn parse_line(input: &str) -> IResult<&str, ParsedLine<'_>> {
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = parse_command(input)?;

    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedLine {
            prefix,
            command,
            params,
        },
    ))
}

/// A parsed IRC line with borrowed string slices.
///
/// Intermediate representation holding references into the original
/// input for zero-copy parsing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedLine<'a> {
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: SmallVec<[&'a str; 15]>,
}

impl<'a> ParsedLine<'a> {
    /// Parse an IRC line into a `ParsedLine`.
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        match parse_line(input) {
            Ok((_remaining, line)) => Ok(line),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(MessageParseError::SyntaxError {
                    position: input.len() - e.input.len(),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(MessageParseError::SyntaxError { position: 0 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix_and_trailing() {
        let line = ParsedLine::parse(":nick!u@h PRIVMSG #chan :hello world").unwrap();
        assert_eq!(line.prefix, Some("nick!u@h"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(&line.params[..], &["#chan", "hello world"]);
    }

    #[test]
    fn test_parse_no_prefix() {
        let line = ParsedLine::parse("PING :irc.example.com").unwrap();
        assert_eq!(line.prefix, None);
        assert_eq!(line.command, "PING");
        assert_eq!(&line.params[..], &["irc.example.com"]);
    }

    #[test]
    fn test_parse_numeric_command() {
        let line = ParsedLine::parse(":server 001 nick :Welcome to the network").unwrap();
        assert_eq!(line.command, "001");
        assert_eq!(&line.params[..], &["nick", "Welcome to the network"]);
    }

    #[test]
    fn test_parse_star_target() {
        let line = ParsedLine::parse(":server NOTICE * :*** Looking up your hostname").unwrap();
        assert_eq!(&line.params[..], &["*", "*** Looking up your hostname"]);
    }

    #[test]
    fn test_parse_rejects_bad_command() {
        // 4-digit numerics are not commands
        assert!(ParsedLine::parse(":server 0001 foo").is_err());
        assert!(ParsedLine::parse(": ").is_err());
    }

    #[test]
    fn test_parse_collapses_spaces() {
        let line = ParsedLine::parse("JOIN   #chan    key").unwrap();
        assert_eq!(&line.params[..], &["#chan", "key"]);
    }

    #[test]
    fn test_parse_empty_trailing() {
        let line = ParsedLine::parse("AWAY :").unwrap();
        assert_eq!(&line.params[..], &[""]);
    }
}
