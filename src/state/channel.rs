//! Channel-related types and state.

use crate::state::Uid;
use ember_proto::wild_match;

/// Channel topic with metadata.
#[derive(Debug, Clone)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

/// A ban entry: `nick!user@host` glob, with provenance.
///
/// Empty pattern slots match everything.
#[derive(Debug, Clone)]
pub struct BanEntry {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub set_by: String,
    pub set_at: i64,
}

impl BanEntry {
    /// Parse a raw mask into its three slots.
    ///
    /// `nick!user@host` fills all three; `user@host` leaves nick empty;
    /// anything else is a bare host pattern.
    pub fn parse(mask: &str, set_by: String, set_at: i64) -> Self {
        let (nick, rest) = match mask.find('!') {
            Some(bang) => (mask[..bang].to_string(), &mask[bang + 1..]),
            None => (String::new(), mask),
        };
        let (user, host) = match rest.find('@') {
            Some(at) => (rest[..at].to_string(), rest[at + 1..].to_string()),
            None if nick.is_empty() => (String::new(), rest.to_string()),
            None => (rest.to_string(), String::new()),
        };
        Self {
            nick,
            user,
            host,
            set_by,
            set_at,
        }
    }

    /// Whether a client identified by `(nick, user, host)` matches.
    pub fn matches(&self, nick: &str, user: &str, host: &str) -> bool {
        fn pat(p: &str) -> &str {
            if p.is_empty() { "*" } else { p }
        }
        wild_match(pat(&self.nick), nick)
            && wild_match(pat(&self.user), user)
            && wild_match(pat(&self.host), host)
    }

    /// The canonical `nick!user@host` rendering.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.user, self.host)
    }
}

/// Per-member channel status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemberModes {
    pub op: bool,    // +o (@)
    pub voice: bool, // +v (+)
}

impl MemberModes {
    /// The NAMES/WHO prefix for this member.
    pub fn prefix(&self) -> &'static str {
        if self.op {
            "@"
        } else if self.voice {
            "+"
        } else {
            ""
        }
    }

    /// Whether this member may speak on a moderated channel.
    pub fn can_speak(&self) -> bool {
        self.op || self.voice
    }
}

/// One channel member.
#[derive(Debug, Clone)]
pub struct Member {
    pub uid: Uid,
    pub modes: MemberModes,
}

/// Channel flags (`psitnml k`, plus the member and ban letters handled
/// per-entry).
#[derive(Debug, Default, Clone)]
pub struct ChannelModes {
    pub private: bool,       // +p
    pub secret: bool,        // +s
    pub invite_only: bool,   // +i
    pub topic_locked: bool,  // +t
    pub no_outside: bool,    // +n
    pub moderated: bool,     // +m
    pub limit: Option<u32>,  // +l
    pub key: Option<String>, // +k
}

impl ChannelModes {
    /// Render the flag letters as `+flags`; the limit argument travels as
    /// its own parameter in RPL_CHANNELMODEIS.
    pub fn as_mode_string(&self) -> String {
        let mut s = String::from("+");
        if self.private {
            s.push('p');
        }
        if self.secret {
            s.push('s');
        }
        if self.invite_only {
            s.push('i');
        }
        if self.topic_locked {
            s.push('t');
        }
        if self.no_outside {
            s.push('n');
        }
        if self.moderated {
            s.push('m');
        }
        if self.limit.is_some() {
            s.push('l');
        }
        if self.key.is_some() {
            s.push('k');
        }
        s
    }

    /// Hidden from LIST and the `*` NAMES marker.
    pub fn is_hidden(&self) -> bool {
        self.private || self.secret
    }
}

/// A channel. Lives in the registry only while it has members.
#[derive(Debug)]
pub struct Channel {
    /// Name as first spelled; registry keys use the folded form.
    pub name: String,
    pub topic: Option<Topic>,
    pub modes: ChannelModes,
    /// Ordered member list; the creator is first and starts as operator.
    pub members: Vec<Member>,
    pub bans: Vec<BanEntry>,
    /// Folded nicks with a pending single-use invitation.
    pub invites: Vec<String>,
    /// Nick of the creator.
    pub created_by: String,
    /// Creation time, Unix seconds.
    pub created_at: i64,
}

impl Channel {
    /// Create a channel with its first member as operator.
    pub fn new(name: String, creator_uid: Uid, creator_nick: String, now: i64) -> Self {
        Self {
            name,
            topic: None,
            modes: ChannelModes::default(),
            members: vec![Member {
                uid: creator_uid,
                modes: MemberModes {
                    op: true,
                    voice: false,
                },
            }],
            bans: Vec::new(),
            invites: Vec::new(),
            created_by: creator_nick,
            created_at: now,
        }
    }

    /// A channel name must start with `#` or `&` and may not contain
    /// BEL, comma or space.
    pub fn valid_name(name: &str) -> bool {
        (name.starts_with('#') || name.starts_with('&'))
            && !name.contains(['\x07', ',', ' '])
            && name.len() > 1
    }

    pub fn is_member(&self, uid: Uid) -> bool {
        self.members.iter().any(|m| m.uid == uid)
    }

    pub fn member_modes(&self, uid: Uid) -> Option<MemberModes> {
        self.members.iter().find(|m| m.uid == uid).map(|m| m.modes)
    }

    pub fn member_modes_mut(&mut self, uid: Uid) -> Option<&mut MemberModes> {
        self.members
            .iter_mut()
            .find(|m| m.uid == uid)
            .map(|m| &mut m.modes)
    }

    /// Append a member with no status.
    pub fn add_member(&mut self, uid: Uid) {
        if !self.is_member(uid) {
            self.members.push(Member {
                uid,
                modes: MemberModes::default(),
            });
        }
    }

    /// Remove a member; returns true if the channel is now empty.
    pub fn remove_member(&mut self, uid: Uid) -> bool {
        self.members.retain(|m| m.uid != uid);
        self.members.is_empty()
    }

    /// Take a pending invitation for the folded nick, if any.
    pub fn take_invite(&mut self, folded_nick: &str) -> bool {
        match self.invites.iter().position(|n| n == folded_nick) {
            Some(idx) => {
                self.invites.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// First matching ban for the given identity.
    pub fn find_ban(&self, nick: &str, user: &str, host: &str) -> Option<&BanEntry> {
        self.bans.iter().find(|b| b.matches(nick, user, host))
    }
}
