//! Client-related types and state.

use crate::state::Uid;
use std::collections::HashSet;

/// A registered client.
#[derive(Debug)]
pub struct Client {
    pub uid: Uid,
    /// Nick as the client spelled it; registry keys use the folded form.
    pub nick: String,
    /// Ident-confirmed username, or the USER argument prefixed with `~`.
    pub user: String,
    pub realname: String,
    /// Reverse-DNS hostname, or the dotted remote address.
    pub host: String,
    /// Remote address as text, for I-line matching.
    pub ip: String,
    /// The server this client sits on; always the local host here.
    pub server: String,
    /// Password given with PASS, verbatim.
    pub password: String,
    /// One-byte crypt key derived from the password.
    pub crypt_key: u8,
    /// Whether the client sent PASS at registration.
    pub has_pass: bool,
    /// Channels this client is in (folded names).
    pub channels: HashSet<String>,
    pub modes: UserModes,
    /// Away message if set.
    pub away: Option<String>,
    /// Connection class this client was admitted under.
    pub class_id: Option<u32>,
    /// Sign-on time, Unix seconds.
    pub signon: i64,
    /// Last time we wrote to this client, Unix seconds (WHOIS idle).
    pub last_send: i64,
}

/// User modes (`iswo`).
#[derive(Debug, Default, Clone)]
pub struct UserModes {
    pub invisible: bool,     // +i
    pub server_notice: bool, // +s
    pub wallops: bool,       // +w
    pub oper: bool,          // +o
}

impl UserModes {
    /// Render as a `+`-prefixed mode string.
    pub fn as_mode_string(&self) -> String {
        let mut s = String::from("+");
        if self.invisible {
            s.push('i');
        }
        if self.server_notice {
            s.push('s');
        }
        if self.wallops {
            s.push('w');
        }
        if self.oper {
            s.push('o');
        }
        s
    }
}

impl Client {
    /// The `nick!user@host` rendering used in fan-out prefixes.
    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.user, self.host)
    }

    /// Whether this client is away.
    pub fn is_away(&self) -> bool {
        self.away.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_string_order() {
        let mut modes = UserModes::default();
        assert_eq!(modes.as_mode_string(), "+");
        modes.invisible = true;
        modes.oper = true;
        assert_eq!(modes.as_mode_string(), "+io");
        modes.server_notice = true;
        modes.wallops = true;
        assert_eq!(modes.as_mode_string(), "+iswo");
    }
}
