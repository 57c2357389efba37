//! WHOWAS history: a newest-first list of departed identities.

use ember_proto::irc_eq;
use std::collections::VecDeque;

/// Entries kept before the oldest are dropped.
const MAX_HISTORY: usize = 1024;

/// Snapshot taken on nick change and on quit.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub realname: String,
}

/// The WHOWAS list. Pushed at the front so iteration is newest-first.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == MAX_HISTORY {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// All entries whose nick folds equal to `nick`, newest first,
    /// capped at `count` when `count > 0`.
    pub fn find(&self, nick: &str, count: usize) -> Vec<&HistoryEntry> {
        let matches = self.entries.iter().filter(|e| irc_eq(&e.nick, nick));
        if count > 0 {
            matches.take(count).collect()
        } else {
            matches.collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(nick: &str, user: &str) -> HistoryEntry {
        HistoryEntry {
            nick: nick.into(),
            user: user.into(),
            host: "host".into(),
            realname: "real".into(),
        }
    }

    #[test]
    fn newest_first() {
        let mut h = History::default();
        h.push(entry("alice", "a1"));
        h.push(entry("alice", "a2"));
        let found = h.find("alice", 0);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].user, "a2");
    }

    #[test]
    fn count_caps_results() {
        let mut h = History::default();
        for i in 0..5 {
            h.push(entry("bob", &format!("u{}", i)));
        }
        assert_eq!(h.find("bob", 2).len(), 2);
        assert_eq!(h.find("bob", 0).len(), 5);
    }

    #[test]
    fn lookup_is_case_folded() {
        let mut h = History::default();
        h.push(entry("Nick[1]", "u"));
        assert_eq!(h.find("nick{1}", 0).len(), 1);
    }
}
