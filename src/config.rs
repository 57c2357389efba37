//! Configuration loading and the classic colon-line authorization tables.
//!
//! The outer file is TOML; the `[lines]` table carries the traditional
//! M/A/Y/I/O/o/K configuration lines, which are parsed into typed tables
//! at startup. C and N lines (server links) are accepted and ignored; this
//! server runs standalone.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {kind} line: {line}")]
    Line { kind: char, line: String },
    #[error("missing mandatory M line")]
    MissingMLine,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server-wide settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Network listen configuration; defaults to the M line's port on
    /// every interface.
    pub listen: Option<ListenConfig>,
    /// Idle timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Classic colon-separated configuration lines.
    pub lines: Lines,
}

/// Server-wide settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Connection password; clients must PASS it before registering.
    pub password: Option<String>,
    /// Path to the MOTD file, re-read when its mtime changes.
    pub motd_file: Option<String>,
}

/// Network listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Socket address to bind, e.g. `127.0.0.1:6667`.
    pub address: SocketAddr,
}

/// Idle timeout configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Seconds of silence before a PING is sent; a peer that stays silent
    /// for another interval is evicted.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            ping_interval: default_ping_interval(),
        }
    }
}

fn default_ping_interval() -> u64 {
    180
}

/// Raw colon-separated configuration lines.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Lines {
    /// `M:virtualHost:realHost:info:port` (mandatory).
    pub m: String,
    /// `A:info:location:email`.
    pub a: Option<String>,
    /// `Y:id:pingFreq:connectFreq:maxLinks:sendQueueSize`.
    #[serde(default)]
    pub y: Vec<String>,
    /// `I:userA@ip:password:userB@host:password:classId`.
    #[serde(default)]
    pub i: Vec<String>,
    /// `O:user@host:password:nick::classId` (global operators).
    #[serde(default)]
    pub o: Vec<String>,
    /// `o:user@host:password:nick::classId` (local operators).
    #[serde(default)]
    pub o_local: Vec<String>,
    /// `K:host:HHMM-HHMM:user`.
    #[serde(default)]
    pub k: Vec<String>,
    /// `C:...` server links, accepted and ignored.
    #[serde(default)]
    pub c: Vec<String>,
    /// `N:...` server links, accepted and ignored.
    #[serde(default)]
    pub n: Vec<String>,
}

/// Parsed M line: this server's identity.
#[derive(Debug, Clone)]
pub struct MLine {
    pub host: String,
    pub realhost: String,
    pub info: String,
    pub port: u16,
}

/// Parsed A line: ADMIN command content.
#[derive(Debug, Clone, Default)]
pub struct ALine {
    pub info: String,
    pub location: String,
    pub email: String,
}

/// Parsed Y line: a connection class.
#[derive(Debug, Clone)]
pub struct ClassLine {
    pub id: u32,
    pub ping_freq: u32,
    pub connect_freq: u32,
    pub max_links: u32,
    pub sendq_size: u32,
}

/// Parsed I line: client authorization.
#[derive(Debug, Clone)]
pub struct AllowLine {
    pub user_ip: String,
    pub ip: String,
    pub user_host: String,
    pub host: String,
    pub password: Option<String>,
    pub class_id: u32,
}

/// Parsed O/o line: operator authorization.
#[derive(Debug, Clone)]
pub struct OperLine {
    pub user: String,
    pub host: String,
    pub password: String,
    pub nick: String,
    pub local: bool,
}

/// Parsed K line: a time-windowed server ban.
#[derive(Debug, Clone)]
pub struct KillLine {
    pub host: String,
    pub start: u32,
    pub end: u32,
    pub user: String,
}

/// The parsed authorization tables.
#[derive(Debug, Clone, Default)]
pub struct AuthLines {
    pub admin: ALine,
    pub classes: Vec<ClassLine>,
    pub allows: Vec<AllowLine>,
    pub opers: Vec<OperLine>,
    pub kills: Vec<KillLine>,
}

impl Config {
    /// Load and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        // Fail early on a bad M line rather than at bind time.
        config.m_line()?;
        Ok(config)
    }

    /// The parsed M line.
    pub fn m_line(&self) -> Result<MLine, ConfigError> {
        parse_m_line(&self.lines.m)
    }

    /// The address to bind: `[listen]` when given, else the M line port.
    pub fn listen_addr(&self, m_line: &MLine) -> SocketAddr {
        match self.listen {
            Some(ref listen) => listen.address,
            None => SocketAddr::from(([0, 0, 0, 0], m_line.port)),
        }
    }

    /// Parse every authorization line into typed tables.
    ///
    /// Lines that do not parse are logged and skipped, matching the
    /// tolerant behavior expected of an ircd reading its conf.
    pub fn auth_lines(&self) -> AuthLines {
        let mut out = AuthLines::default();

        if let Some(ref a) = self.lines.a {
            match parse_a_line(a) {
                Ok(line) => out.admin = line,
                Err(e) => tracing::error!(error = %e, "skipping A line"),
            }
        }
        for raw in &self.lines.y {
            match parse_y_line(raw) {
                Ok(line) => out.classes.push(line),
                Err(e) => tracing::error!(error = %e, "skipping Y line"),
            }
        }
        for raw in &self.lines.i {
            match parse_i_line(raw) {
                Ok(line) => out.allows.push(line),
                Err(e) => tracing::error!(error = %e, "skipping I line"),
            }
        }
        for (raw, local) in self
            .lines
            .o
            .iter()
            .map(|l| (l, false))
            .chain(self.lines.o_local.iter().map(|l| (l, true)))
        {
            match parse_o_line(raw, local) {
                Ok(line) => out.opers.push(line),
                Err(e) => tracing::error!(error = %e, "skipping O line"),
            }
        }
        for raw in &self.lines.k {
            match parse_k_line(raw) {
                Ok(line) => out.kills.push(line),
                Err(e) => tracing::error!(error = %e, "skipping K line"),
            }
        }

        out
    }
}

fn line_err(kind: char, line: &str) -> ConfigError {
    ConfigError::Line {
        kind,
        line: line.to_string(),
    }
}

/// Split a colon line into fields, checking the leading tag.
fn fields<'a>(line: &'a str, tag: &str, n: usize) -> Option<Vec<&'a str>> {
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < n + 1 || !parts[0].eq_ignore_ascii_case(tag) {
        return None;
    }
    Some(parts[1..].to_vec())
}

/// Split `user@host` into its halves; a missing `@` leaves host empty.
fn split_at_sign(s: &str) -> (String, String) {
    match s.find('@') {
        Some(at) => (s[..at].to_string(), s[at + 1..].to_string()),
        None => (s.to_string(), String::new()),
    }
}

fn parse_m_line(line: &str) -> Result<MLine, ConfigError> {
    let f = fields(line, "M", 4).ok_or(ConfigError::MissingMLine)?;
    Ok(MLine {
        host: f[0].to_string(),
        realhost: f[1].to_string(),
        info: f[2].to_string(),
        port: f[3].parse().map_err(|_| line_err('M', line))?,
    })
}

fn parse_a_line(line: &str) -> Result<ALine, ConfigError> {
    let f = fields(line, "A", 3).ok_or_else(|| line_err('A', line))?;
    Ok(ALine {
        info: f[0].to_string(),
        location: f[1].to_string(),
        email: f[2].to_string(),
    })
}

fn parse_y_line(line: &str) -> Result<ClassLine, ConfigError> {
    let f = fields(line, "Y", 5).ok_or_else(|| line_err('Y', line))?;
    let num = |s: &str| s.parse::<u32>().map_err(|_| line_err('Y', line));
    Ok(ClassLine {
        id: num(f[0])?,
        ping_freq: num(f[1])?,
        connect_freq: num(f[2])?,
        max_links: num(f[3])?,
        sendq_size: num(f[4])?,
    })
}

fn parse_i_line(line: &str) -> Result<AllowLine, ConfigError> {
    let f = fields(line, "I", 5).ok_or_else(|| line_err('I', line))?;
    let (user_ip, ip) = split_at_sign(f[0]);
    let (user_host, host) = split_at_sign(f[2]);
    // Either password slot may carry the password; the first wins.
    let password = [f[1], f[3]]
        .iter()
        .find(|p| !p.is_empty())
        .map(|p| p.to_string());
    Ok(AllowLine {
        user_ip,
        ip,
        user_host,
        host,
        password,
        class_id: f[4].parse().map_err(|_| line_err('I', line))?,
    })
}

fn parse_o_line(line: &str, local: bool) -> Result<OperLine, ConfigError> {
    let tag = if local { "o" } else { "O" };
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < 4 || parts[0] != tag {
        return Err(line_err(if local { 'o' } else { 'O' }, line));
    }
    let (user, host) = split_at_sign(parts[1]);
    Ok(OperLine {
        user,
        host,
        password: parts[2].to_string(),
        nick: parts[3].to_string(),
        local,
    })
}

fn parse_k_line(line: &str) -> Result<KillLine, ConfigError> {
    let f = fields(line, "K", 3).ok_or_else(|| line_err('K', line))?;
    let (start, end) = f[1].split_once('-').ok_or_else(|| line_err('K', line))?;
    Ok(KillLine {
        host: f[0].to_string(),
        start: start.parse().map_err(|_| line_err('K', line))?,
        end: end.parse().map_err(|_| line_err('K', line))?,
        user: f[2].to_string(),
    })
}
