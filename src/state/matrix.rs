//! The Matrix - central shared state for the IRC server.
//!
//! Two uniquely-keyed registries (`nick -> client`, `channel name ->
//! channel`) plus the per-connection outgoing senders. Entities sit behind
//! their own `RwLock`; registry iteration collects keys first and locks
//! entities one at a time, never both directions at once.

use crate::config::{ALine, AuthLines, ClassLine, Config, MLine, OperLine};
use crate::motd::Motd;
use crate::state::{Channel, Client, History, HistoryEntry, Uid};
use dashmap::DashMap;
use ember_proto::{irc_to_lower, Message, Prefix};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// This server's identity.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Virtual host name, used as the origin of every server reply.
    pub name: String,
    /// Real host to bind.
    pub realhost: String,
    /// One-line server description.
    pub info: String,
    /// `name-version` string for 002/004/351.
    pub version: String,
    /// Human-readable creation time for 003.
    pub created: String,
}

/// A connection class with its live link counter.
#[derive(Debug)]
pub struct ClassCounter {
    pub line: ClassLine,
    pub links: AtomicU32,
}

/// Central shared state container.
pub struct Matrix {
    /// Registered clients by uid.
    pub users: DashMap<Uid, Arc<RwLock<Client>>>,
    /// Folded nick -> uid, registered clients only.
    pub nicks: DashMap<String, Uid>,
    /// Folded channel name -> channel.
    pub channels: DashMap<String, Arc<RwLock<Channel>>>,
    /// Outgoing queues by uid.
    pub senders: DashMap<Uid, mpsc::UnboundedSender<Message>>,
    /// WHOWAS history.
    pub history: parking_lot::Mutex<History>,

    /// Parsed authorization tables (I/O/K lines, admin info).
    pub auth: AuthLines,
    /// Connection classes with live link counts.
    pub classes: Vec<ClassCounter>,

    /// Count of +i users, for LUSERS.
    pub invisibles: AtomicUsize,
    /// Count of +o users, for LUSERS.
    pub operators: AtomicUsize,

    pub server_info: ServerInfo,
    /// Server password, required at PASS time when set.
    pub password: Option<String>,
    /// Idle interval before a PING is sent.
    pub ping_interval: Duration,
    /// MOTD file cache.
    pub motd: Motd,
    /// When the server started, for STATS u.
    pub started: Instant,
}

impl Matrix {
    /// Build the Matrix from a loaded configuration.
    pub fn new(config: &Config, m_line: MLine) -> Self {
        let auth = config.auth_lines();
        let classes = auth
            .classes
            .iter()
            .map(|line| ClassCounter {
                line: line.clone(),
                links: AtomicU32::new(0),
            })
            .collect();

        let version = format!("emberd-{}", env!("CARGO_PKG_VERSION"));
        let created = chrono::Utc::now()
            .format("%a %b %e %Y at %H:%M:%S UTC")
            .to_string();

        Self {
            users: DashMap::new(),
            nicks: DashMap::new(),
            channels: DashMap::new(),
            senders: DashMap::new(),
            history: parking_lot::Mutex::new(History::default()),
            auth,
            classes,
            invisibles: AtomicUsize::new(0),
            operators: AtomicUsize::new(0),
            server_info: ServerInfo {
                name: m_line.host,
                realhost: m_line.realhost,
                info: m_line.info,
                version,
                created,
            },
            password: config.server.password.clone(),
            ping_interval: Duration::from_secs(config.timeouts.ping_interval),
            motd: Motd::new(config.server.motd_file.clone()),
            started: Instant::now(),
        }
    }

    /// Admin info for the ADMIN command.
    pub fn admin(&self) -> &ALine {
        &self.auth.admin
    }

    /// Operator lines for OPER.
    pub fn oper_lines(&self) -> &[OperLine] {
        &self.auth.opers
    }

    /// Queue one message for a client. Silently drops if the client is
    /// already gone.
    pub fn send_to(&self, uid: Uid, msg: Message) {
        if let Some(sender) = self.senders.get(&uid) {
            let _ = sender.send(msg);
        }
    }

    /// Resolve a nick to a uid.
    pub fn lookup_nick(&self, nick: &str) -> Option<Uid> {
        self.nicks.get(&irc_to_lower(nick)).map(|e| *e.value())
    }

    /// The client behind a uid, if registered.
    pub fn client(&self, uid: Uid) -> Option<Arc<RwLock<Client>>> {
        self.users.get(&uid).map(|e| e.value().clone())
    }

    /// The channel behind a name, if it exists.
    pub fn channel(&self, name: &str) -> Option<Arc<RwLock<Channel>>> {
        self.channels.get(&irc_to_lower(name)).map(|e| e.value().clone())
    }

    /// Whether `uid` shares at least one channel with the owner of
    /// `channel_names`.
    pub async fn shares_channel(&self, uid: Uid, channel_names: &std::collections::HashSet<String>) -> bool {
        for name in channel_names {
            if let Some(channel) = self.channels.get(name).map(|e| e.value().clone()) {
                if channel.read().await.is_member(uid) {
                    return true;
                }
            }
        }
        false
    }

    /// Try to take one link slot in a connection class.
    ///
    /// An unknown class id admits freely, as the classic servers do.
    pub fn class_take_link(&self, class_id: u32) -> bool {
        match self.classes.iter().find(|c| c.line.id == class_id) {
            Some(class) => {
                let prev = class.links.fetch_add(1, Ordering::SeqCst);
                if prev < class.line.max_links {
                    true
                } else {
                    class.links.fetch_sub(1, Ordering::SeqCst);
                    debug!(class = class_id, "connection class full");
                    false
                }
            }
            None => true,
        }
    }

    /// Release a link slot taken at registration.
    pub fn class_release_link(&self, class_id: u32) {
        if let Some(class) = self.classes.iter().find(|c| c.line.id == class_id) {
            let mut current = class.links.load(Ordering::SeqCst);
            while current > 0 {
                match class.links.compare_exchange(
                    current,
                    current - 1,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    Ok(_) => break,
                    Err(actual) => current = actual,
                }
            }
        }
    }

    /// Tear a client down: fan QUIT to every channel peer, unlink it
    /// everywhere, snapshot it into history and close its queue.
    ///
    /// Safe to call twice; the second call is a no-op. Returns true if the
    /// client was present.
    pub async fn disconnect_user(&self, uid: Uid, reason: &str) -> bool {
        let client_arc = match self.users.get(&uid) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };

        // Snapshot everything needed, then drop the lock before touching
        // the channel registry.
        let (nick, user, host, realname, channel_names, class_id, invisible, oper) = {
            let client = client_arc.read().await;
            (
                client.nick.clone(),
                client.user.clone(),
                client.host.clone(),
                client.realname.clone(),
                client.channels.iter().cloned().collect::<Vec<_>>(),
                client.class_id,
                client.modes.invisible,
                client.modes.oper,
            )
        };

        let quit_msg = Message::new(
            Some(Prefix::new(nick.clone(), user.clone(), host.clone())),
            "QUIT",
            vec![reason.to_string()],
        )
        .trailing();

        for name in &channel_names {
            let channel_arc = match self.channels.get(name) {
                Some(entry) => entry.value().clone(),
                None => continue,
            };
            let mut channel = channel_arc.write().await;
            for member in &channel.members {
                if member.uid != uid {
                    self.send_to(member.uid, quit_msg.clone());
                }
            }
            if channel.remove_member(uid) {
                let destroyed = channel.name.clone();
                drop(channel);
                self.channels.remove(name);
                debug!(channel = %destroyed, "channel destroyed (empty)");
            }
        }

        self.history.lock().push(HistoryEntry {
            nick: nick.clone(),
            user,
            host: host.clone(),
            realname,
        });

        let folded = irc_to_lower(&nick);
        if let Some(entry) = self.nicks.get(&folded) {
            if *entry.value() == uid {
                drop(entry);
                self.nicks.remove(&folded);
            }
        }
        self.users.remove(&uid);

        if let Some(class_id) = class_id {
            self.class_release_link(class_id);
        }
        if invisible {
            self.invisibles.fetch_sub(1, Ordering::SeqCst);
        }
        if oper {
            self.operators.fetch_sub(1, Ordering::SeqCst);
        }

        // Final line, then close the queue so the connection task drains
        // and exits.
        self.send_to(
            uid,
            Message::new(
                None,
                "ERROR",
                vec![format!("Closing Link: {} ({})", host, reason)],
            )
            .trailing(),
        );
        self.senders.remove(&uid);

        info!(nick = %nick, reason = %reason, "client disconnected");
        true
    }
}
