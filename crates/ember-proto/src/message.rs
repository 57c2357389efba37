//! IRC message parsing and formatting.
//!
//! One inbound line becomes a [`Message`]: optional origin prefix, a
//! command, and up to fifteen parameters where the final one may be a
//! `:`-introduced trailing that runs to end of line. Parsing is total --
//! malformed input produces a message with an empty command, which the
//! dispatcher answers with ERR_UNKNOWNCOMMAND rather than dropping the
//! connection.

use crate::MAX_PARAMS;
use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    combinator::opt,
    sequence::preceded,
    IResult,
};
use std::fmt;

/// Message origin, as carried in the leading `:prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// A server origin (`:irc.example.net`).
    ServerName(String),
    /// A user origin (`:nick!user@host`); user and host may be empty.
    Nickname(String, String, String),
}

impl Prefix {
    /// Build a full `nick!user@host` prefix.
    pub fn new(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Prefix::Nickname(nick.into(), user.into(), host.into())
    }

    /// Parse a raw prefix token.
    ///
    /// `!` and `@` split nick, user and host; a bare name containing a dot
    /// is taken as a server origin.
    pub fn parse(raw: &str) -> Self {
        if let Some(bang) = raw.find('!') {
            let (nick, rest) = raw.split_at(bang);
            let rest = &rest[1..];
            match rest.find('@') {
                Some(at) => {
                    let (user, host) = rest.split_at(at);
                    Prefix::Nickname(nick.into(), user.into(), host[1..].into())
                }
                None => Prefix::Nickname(nick.into(), rest.into(), String::new()),
            }
        } else if let Some(at) = raw.find('@') {
            let (nick, host) = raw.split_at(at);
            Prefix::Nickname(nick.into(), String::new(), host[1..].into())
        } else if raw.contains('.') {
            Prefix::ServerName(raw.into())
        } else {
            Prefix::Nickname(raw.into(), String::new(), String::new())
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => write!(f, "{}", name),
            Prefix::Nickname(nick, user, host) => {
                write!(f, "{}", nick)?;
                if !user.is_empty() {
                    write!(f, "!{}", user)?;
                }
                if !host.is_empty() {
                    write!(f, "@{}", host)?;
                }
                Ok(())
            }
        }
    }
}

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    /// Command name as received; dispatch folds it.
    pub command: String,
    /// Parameters including any trailing, already unescaped of its `:`.
    pub params: Vec<String>,
    /// Render the final parameter with a `:` even when it has no spaces.
    /// Set by the parser when the input used one, so lines round-trip
    /// byte-exactly.
    pub force_trailing: bool,
}

fn parse_prefix_token(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

fn parse_command_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

impl Message {
    /// Build an outbound command message.
    pub fn new(
        prefix: Option<Prefix>,
        command: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            prefix,
            command: command.into(),
            params,
            force_trailing: false,
        }
    }

    /// Mark the final parameter as trailing.
    pub fn trailing(mut self) -> Self {
        self.force_trailing = true;
        self
    }

    /// Parse one line. Never fails; see module docs.
    ///
    /// Trailing `\r`/`\n` are stripped here so the framing layer can hand
    /// over lines verbatim. Runs of spaces collapse into one separator.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        let (rest, prefix) = match opt(parse_prefix_token)(line) {
            Ok((rest, p)) => (rest, p.map(Prefix::parse)),
            Err(nom::Err::Error(_)) | Err(nom::Err::Failure(_) | nom::Err::Incomplete(_)) => {
                (line, None)
            }
        };
        let rest = rest.trim_start_matches(' ');

        let (rest, command) = match parse_command_token(rest) {
            Ok((rest, cmd)) => (rest, cmd.to_string()),
            Err(_) => ("", String::new()),
        };

        let (params, had_trailing) = parse_params(rest);

        Self {
            prefix,
            command,
            params,
            force_trailing: had_trailing,
        }
    }

    /// First parameter, if present.
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }
}

/// Split the remainder of a line into parameters.
///
/// A `:` opens the trailing parameter; after `MAX_PARAMS - 1` middles the
/// rest of the line is swallowed into the final slot regardless. Also
/// reports whether a `:` trailing was actually present.
fn parse_params(input: &str) -> (Vec<String>, bool) {
    let mut params = Vec::new();
    let mut rest = input;
    let mut had_trailing = false;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing.to_string());
            had_trailing = true;
            break;
        }

        if params.len() == MAX_PARAMS - 1 {
            params.push(rest.to_string());
            break;
        }

        match rest.find(' ') {
            Some(end) => {
                params.push(rest[..end].to_string());
                rest = &rest[end..];
            }
            None => {
                params.push(rest.to_string());
                break;
            }
        }
    }

    (params, had_trailing)
}

impl fmt::Display for Message {
    /// Render the wire form, without the line terminator.
    ///
    /// The last parameter is `:`-prefixed whenever it is empty, contains a
    /// space, or begins with `:`, so it survives a round trip.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command)?;
        if let Some((last, middles)) = self.params.split_last() {
            for p in middles {
                write!(f, " {}", p)?;
            }
            if self.force_trailing
                || last.is_empty()
                || last.contains(' ')
                || last.starts_with(':')
            {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        Ok(())
    }
}
