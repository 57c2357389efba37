//! Target classification for the first parameter of a command.
//!
//! `PRIVMSG`, `JOIN`, `NAMES` and friends accept a comma-separated target
//! list. Each item is classified by its first character and the parsed
//! structure keeps every slot so handlers can pick whichever is
//! meaningful: `#chan` fills both channel and mask, `nick` fills nick and
//! user, `user@host` clears nick and splits at the `@`.

/// One parsed target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub mask: String,
    pub channel: String,
}

impl Target {
    /// Classify one comma-separated item.
    fn classify(item: &str) -> Self {
        let mut t = Target::default();
        match item.chars().next() {
            // Local channel.
            Some('&') => t.channel = item.to_string(),
            // Server mask.
            Some('$') => t.mask = item.to_string(),
            // Channel, also usable as a mask.
            Some('#') => {
                t.channel = item.to_string();
                t.mask = item.to_string();
            }
            // Nick or user@host.
            _ => match item.find('@') {
                Some(at) => {
                    t.user = item[..at].to_string();
                    t.host = item[at + 1..].to_string();
                }
                None => {
                    t.nick = item.to_string();
                    t.user = item.to_string();
                }
            },
        }
        t
    }

    /// True if this item names a channel.
    pub fn is_channel(&self) -> bool {
        !self.channel.is_empty()
    }

    /// The raw text the sender used, for error replies.
    pub fn display_name(&self) -> &str {
        if !self.channel.is_empty() {
            &self.channel
        } else if !self.nick.is_empty() {
            &self.nick
        } else if !self.mask.is_empty() {
            &self.mask
        } else {
            &self.user
        }
    }
}

/// Split a parameter into its comma-separated targets.
pub fn parse_targets(param: &str) -> Vec<Target> {
    param
        .split(',')
        .filter(|item| !item.is_empty())
        .map(Target::classify)
        .collect()
}

/// Fetch the `n`th comma-separated item of a parameter, for paired lists
/// like `JOIN #a,#b key-a,key-b`.
pub fn nth_item(param: &str, n: usize) -> Option<&str> {
    param.split(',').nth(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_targets() {
        let ts = parse_targets("#dev,&local");
        assert_eq!(ts.len(), 2);
        assert_eq!(ts[0].channel, "#dev");
        assert_eq!(ts[0].mask, "#dev");
        assert_eq!(ts[1].channel, "&local");
        assert!(ts[1].mask.is_empty());
    }

    #[test]
    fn nick_and_userhost() {
        let ts = parse_targets("alice,bob@bhost");
        assert_eq!(ts[0].nick, "alice");
        assert_eq!(ts[0].user, "alice");
        assert!(ts[1].nick.is_empty());
        assert_eq!(ts[1].user, "bob");
        assert_eq!(ts[1].host, "bhost");
    }

    #[test]
    fn server_mask() {
        let ts = parse_targets("$*.example.net");
        assert_eq!(ts[0].mask, "$*.example.net");
        assert!(!ts[0].is_channel());
    }

    #[test]
    fn empty_items_skipped() {
        assert_eq!(parse_targets(",,#dev,").len(), 1);
        assert!(parse_targets("").is_empty());
    }

    #[test]
    fn paired_keys() {
        assert_eq!(nth_item("ka,kb", 1), Some("kb"));
        assert_eq!(nth_item("ka", 1), None);
    }
}
