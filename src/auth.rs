//! Connection authorization: the K-line / I-line walk at registration and
//! the O-line check behind OPER.

use crate::config::OperLine;
use crate::state::Matrix;
use chrono::Timelike;
use ember_proto::{irc_eq, wild_match};
use tracing::debug;

/// Outcome of the registration-time authorization walk.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Admitted, holding a link slot in the given class when present.
    Ok { class_id: Option<u32> },
    /// A K-line matched inside its time window.
    Banned,
    /// The matching I-line wanted a password the client did not give.
    PasswordMismatch,
    /// No I-line admits this client.
    Rejected,
}

/// Minutes-of-day as `hour * 100 + minute`, the K-line window unit.
fn time_of_day() -> u32 {
    let now = chrono::Local::now();
    now.hour() * 100 + now.minute()
}

/// Walk the K-lines, then the I-lines, for a client about to register.
///
/// K-lines ban on `(user, host)` globs within a local-time window.
/// I-lines admit on `user@ip` or `user@host`; the first pattern match
/// decides the password, and a full connection class sends the walk on to
/// the next line.
pub fn authorize(matrix: &Matrix, user: &str, host: &str, ip: &str, password: &str) -> Admission {
    let now = time_of_day();
    for kill in &matrix.auth.kills {
        if wild_match(&kill.user, user)
            && wild_match(&kill.host, host)
            && now >= kill.start
            && now <= kill.end
        {
            debug!(user = %user, host = %host, "client is K-lined");
            return Admission::Banned;
        }
    }

    for allow in &matrix.auth.allows {
        let by_ip = wild_match(&allow.user_ip, user) && wild_match(&allow.ip, ip);
        let by_host = wild_match(&allow.user_host, user) && wild_match(&allow.host, host);
        if !by_ip && !by_host {
            continue;
        }

        if let Some(ref required) = allow.password {
            if required != password {
                return Admission::PasswordMismatch;
            }
        }

        if !matrix.class_take_link(allow.class_id) {
            // Class full; maybe another I-line still admits.
            continue;
        }

        return Admission::Ok {
            class_id: Some(allow.class_id),
        };
    }

    debug!(user = %user, host = %host, "no I line admits client");
    Admission::Rejected
}

/// Find the O-line matching an OPER attempt, if any.
///
/// The name must match the line's nick, the client's identity must match
/// the line's `user@host` globs, and the password must be right.
pub enum OperCheck<'a> {
    Ok(&'a OperLine),
    BadPassword,
    NoOperHost,
}

pub fn check_oper<'a>(
    lines: &'a [OperLine],
    name: &str,
    password: &str,
    user: &str,
    host: &str,
) -> OperCheck<'a> {
    let mut host_matched = false;
    for line in lines {
        if !irc_eq(&line.nick, name) {
            continue;
        }
        if !(wild_match(&line.user, user) && wild_match(&line.host, host)) {
            continue;
        }
        host_matched = true;
        if line.password == password {
            return OperCheck::Ok(line);
        }
    }
    if host_matched {
        OperCheck::BadPassword
    } else {
        OperCheck::NoOperHost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MLine};

    fn matrix_with_lines(i: &[&str], k: &[&str], y: &[&str]) -> Matrix {
        let toml = format!(
            r#"
            [listen]
            address = "127.0.0.1:0"
            [lines]
            m = "M:irc.test:localhost:Test:6667"
            y = [{}]
            i = [{}]
            k = [{}]
            "#,
            y.iter().map(|s| format!("{:?}", s)).collect::<Vec<_>>().join(","),
            i.iter().map(|s| format!("{:?}", s)).collect::<Vec<_>>().join(","),
            k.iter().map(|s| format!("{:?}", s)).collect::<Vec<_>>().join(","),
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let m_line = MLine {
            host: "irc.test".into(),
            realhost: "localhost".into(),
            info: "Test".into(),
            port: 6667,
        };
        Matrix::new(&config, m_line)
    }

    #[test]
    fn open_i_line_admits() {
        let matrix = matrix_with_lines(&["I:*@*::*@*::1"], &[], &["Y:1:90:0:10:1000"]);
        assert_eq!(
            authorize(&matrix, "~alice", "ahost", "127.0.0.1", ""),
            Admission::Ok { class_id: Some(1) }
        );
    }

    #[test]
    fn no_i_line_rejects() {
        let matrix = matrix_with_lines(&[], &[], &[]);
        assert_eq!(
            authorize(&matrix, "~alice", "ahost", "127.0.0.1", ""),
            Admission::Rejected
        );
    }

    #[test]
    fn i_line_password_enforced() {
        let matrix = matrix_with_lines(&["I:*@*:sekrit:*@*::1"], &[], &[]);
        assert_eq!(
            authorize(&matrix, "~a", "h", "1.2.3.4", "wrong"),
            Admission::PasswordMismatch
        );
        assert_eq!(
            authorize(&matrix, "~a", "h", "1.2.3.4", "sekrit"),
            Admission::Ok { class_id: Some(1) }
        );
    }

    #[test]
    fn all_day_k_line_bans() {
        let matrix = matrix_with_lines(&["I:*@*::*@*::1"], &["K:badhost:0000-2359:*"], &[]);
        assert_eq!(
            authorize(&matrix, "~troll", "badhost", "1.2.3.4", ""),
            Admission::Banned
        );
        // Different host passes.
        assert_eq!(
            authorize(&matrix, "~ok", "goodhost", "1.2.3.4", ""),
            Admission::Ok { class_id: Some(1) }
        );
    }

    #[test]
    fn full_class_falls_through_to_next_line() {
        let matrix = matrix_with_lines(
            &["I:*@10.*::*@none::1", "I:*@*::*@*::2"],
            &[],
            &["Y:1:90:0:0:1000", "Y:2:90:0:10:1000"],
        );
        // Class 1 has max_links 0, so the first line never admits; the
        // second line (class 2) takes over.
        assert_eq!(
            authorize(&matrix, "~a", "h", "10.0.0.1", ""),
            Admission::Ok { class_id: Some(2) }
        );
    }

    #[test]
    fn class_links_released() {
        let matrix = matrix_with_lines(&["I:*@*::*@*::1"], &[], &["Y:1:90:0:1:1000"]);
        assert!(matches!(
            authorize(&matrix, "~a", "h", "1.1.1.1", ""),
            Admission::Ok { .. }
        ));
        // Class is now full.
        assert_eq!(
            authorize(&matrix, "~b", "h", "1.1.1.2", ""),
            Admission::Rejected
        );
        matrix.class_release_link(1);
        assert!(matches!(
            authorize(&matrix, "~c", "h", "1.1.1.3", ""),
            Admission::Ok { .. }
        ));
    }

    #[test]
    fn oper_check_matches_nick_host_and_password() {
        let lines = vec![OperLine {
            user: "*".into(),
            host: "*.trusted.net".into(),
            password: "oppass".into(),
            nick: "root".into(),
            local: false,
        }];
        assert!(matches!(
            check_oper(&lines, "root", "oppass", "~admin", "box.trusted.net"),
            OperCheck::Ok(_)
        ));
        assert!(matches!(
            check_oper(&lines, "root", "nope", "~admin", "box.trusted.net"),
            OperCheck::BadPassword
        ));
        assert!(matches!(
            check_oper(&lines, "root", "oppass", "~admin", "elsewhere.org"),
            OperCheck::NoOperHost
        ));
        assert!(matches!(
            check_oper(&lines, "other", "oppass", "~admin", "box.trusted.net"),
            OperCheck::NoOperHost
        ));
    }
}
