//! IRC case folding.
//!
//! RFC 1459 treats `{}|` as the lowercase forms of `[]\` because of their
//! positions in the Scandinavian character set. Every nick, channel and
//! host comparison in the server goes through this table.

/// Fold a single character.
#[inline]
pub fn fold_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        'A'..='Z' => c.to_ascii_lowercase(),
        _ => c,
    }
}

/// Fold a string into its canonical lowercase form.
///
/// Used to build registry keys: two names that fold equal refer to the
/// same client or channel.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

/// Case-folded equality without allocating.
pub fn irc_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.chars()
        .zip(b.chars())
        .all(|(ca, cb)| fold_char(ca) == fold_char(cb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_ascii_and_bracket_pairs() {
        assert_eq!(irc_to_lower("abc[]|"), irc_to_lower("ABC{}\\"));
        assert_eq!(irc_to_lower("Nick[away]"), "nick{away}");
    }

    #[test]
    fn eq_matches_fold() {
        assert!(irc_eq("foo[1]", "FOO{1}"));
        assert!(irc_eq("back\\slash", "BACK|SLASH"));
        assert!(!irc_eq("foo", "bar"));
        assert!(!irc_eq("foo", "fooo"));
    }

    #[test]
    fn tilde_is_not_folded() {
        // Only the three RFC pairs fold; ~ stays distinct from ^.
        assert!(!irc_eq("a~b", "a^b"));
    }
}
