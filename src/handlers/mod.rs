//! IRC command handlers.
//!
//! The [`Registry`] maps folded command names to [`Handler`]s; the
//! connection task dispatches each parsed line through it. Handlers queue
//! replies on the client's outgoing sender and fan events out through the
//! Matrix.

mod channel;
mod connection;
mod messaging;
mod misc;
mod mode;
mod server_query;
mod user_query;

pub use connection::complete_registration;

use crate::error::HandlerResult;
use crate::state::{Matrix, Uid};
use async_trait::async_trait;
use ember_proto::{Message, Prefix, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// State tracked while a connection registers, plus the connection-local
/// mirror of the nick for reply addressing.
#[derive(Debug, Default)]
pub struct HandshakeState {
    /// Nick provided by NICK (kept in sync after registration too).
    pub nick: Option<String>,
    /// Username provided by USER.
    pub user: Option<String>,
    /// Realname provided by USER.
    pub realname: Option<String>,
    /// Password provided by PASS.
    pub password: Option<String>,
    /// Ident-confirmed username, when the co-server got one.
    pub ident_user: Option<String>,
    /// Reverse-DNS hostname, when the co-server got one.
    pub dns_host: Option<String>,
    /// Whether registration completed.
    pub registered: bool,
}

impl HandshakeState {
    /// Whether NICK and USER have both arrived.
    ///
    /// The PASS requirement is checked at registration time against the
    /// server password; a missing PASS only blocks registration when the
    /// server demands one.
    pub fn has_identity(&self) -> bool {
        self.nick.is_some() && self.user.is_some() && !self.registered
    }
}

/// Handler context passed to each command handler.
pub struct Context<'a> {
    /// The connection's unique id.
    pub uid: Uid,
    /// Shared server state.
    pub matrix: &'a Arc<Matrix>,
    /// Outgoing queue for this client.
    pub sender: &'a mpsc::UnboundedSender<Message>,
    /// Registration state for this connection.
    pub handshake: &'a mut HandshakeState,
}

impl Context<'_> {
    /// The nick to address replies to; `*` before one is known.
    pub fn display_nick(&self) -> String {
        self.handshake.nick.clone().unwrap_or_else(|| "*".into())
    }

    pub fn server_name(&self) -> &str {
        &self.matrix.server_info.name
    }

    /// Queue a message on this connection.
    pub fn send(&self, msg: Message) -> HandlerResult {
        self.sender.send(msg)?;
        Ok(())
    }

    /// Queue a numeric reply, inserting this client's nick as the first
    /// parameter.
    pub fn numeric(&self, response: Response, params: &[&str]) -> HandlerResult {
        let mut full = vec![self.display_nick()];
        full.extend(params.iter().map(|s| s.to_string()));
        self.send(server_reply(self.server_name(), response, full))
    }

    /// Like [`Self::numeric`], but the final parameter always renders as
    /// a `:`-trailing, as the classic reply formats do.
    pub fn numeric_trailing(&self, response: Response, params: &[&str]) -> HandlerResult {
        let mut full = vec![self.display_nick()];
        full.extend(params.iter().map(|s| s.to_string()));
        self.send(server_reply(self.server_name(), response, full).trailing())
    }

    /// ERR_NEEDMOREPARAMS for the named command.
    pub fn need_more_params(&self, command: &str) -> HandlerResult {
        self.numeric(
            Response::ERR_NEEDMOREPARAMS,
            &[command, "Not enough parameters."],
        )
    }

    /// ERR_NOSUCHNICK for a target that resolved to nothing.
    pub fn no_such_nick(&self, target: &str) -> HandlerResult {
        self.numeric(Response::ERR_NOSUCHNICK, &[target, "No such nick/channel."])
    }

    /// ERR_NOSUCHCHANNEL for an unknown channel.
    pub fn no_such_channel(&self, channel: &str) -> HandlerResult {
        self.numeric(Response::ERR_NOSUCHCHANNEL, &[channel, "No such channel."])
    }

    /// ERR_NOTONCHANNEL for a channel the client is not in.
    pub fn not_on_channel(&self, channel: &str) -> HandlerResult {
        self.numeric(
            Response::ERR_NOTONCHANNEL,
            &[channel, "You're not on that channel."],
        )
    }

    /// ERR_CHANOPRIVSNEEDED for an action requiring channel operator.
    pub fn chanop_needed(&self, channel: &str) -> HandlerResult {
        self.numeric(
            Response::ERR_CHANOPRIVSNEEDED,
            &[channel, "You're not channel operator."],
        )
    }
}

/// Trait implemented by all command handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;
}

/// Commands a connection may use before it has registered.
const PRE_REGISTRATION: &[&str] = &["PASS", "NICK", "USER", "QUIT", "PING", "PONG"];

/// Registry of command handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Connection registration
        handlers.insert("PASS", Box::new(connection::PassHandler));
        handlers.insert("NICK", Box::new(connection::NickHandler));
        handlers.insert("USER", Box::new(connection::UserHandler));
        handlers.insert("QUIT", Box::new(connection::QuitHandler));
        handlers.insert("PING", Box::new(connection::PingHandler));
        handlers.insert("PONG", Box::new(connection::PongHandler));

        // Channel operations
        handlers.insert("JOIN", Box::new(channel::JoinHandler));
        handlers.insert("PART", Box::new(channel::PartHandler));
        handlers.insert("KICK", Box::new(channel::KickHandler));
        handlers.insert("INVITE", Box::new(channel::InviteHandler));
        handlers.insert("TOPIC", Box::new(channel::TopicHandler));
        handlers.insert("NAMES", Box::new(channel::NamesHandler));
        handlers.insert("LIST", Box::new(channel::ListHandler));
        handlers.insert("MODE", Box::new(mode::ModeHandler));

        // Messaging
        handlers.insert("PRIVMSG", Box::new(messaging::PrivmsgHandler));
        handlers.insert("NOTICE", Box::new(messaging::NoticeHandler));

        // User queries
        handlers.insert("WHO", Box::new(user_query::WhoHandler));
        handlers.insert("WHOIS", Box::new(user_query::WhoisHandler));
        handlers.insert("WHOWAS", Box::new(user_query::WhowasHandler));
        handlers.insert("ISON", Box::new(user_query::IsonHandler));
        handlers.insert("USERHOST", Box::new(user_query::UserhostHandler));

        // Server queries
        handlers.insert("MOTD", Box::new(server_query::MotdHandler));
        handlers.insert("LUSERS", Box::new(server_query::LusersHandler));
        handlers.insert("VERSION", Box::new(server_query::VersionHandler));
        handlers.insert("TIME", Box::new(server_query::TimeHandler));
        handlers.insert("ADMIN", Box::new(server_query::AdminHandler));
        handlers.insert("STATS", Box::new(server_query::StatsHandler));

        // Miscellaneous
        handlers.insert("AWAY", Box::new(misc::AwayHandler));
        handlers.insert("OPER", Box::new(misc::OperHandler));
        handlers.insert("KILL", Box::new(misc::KillHandler));
        handlers.insert("ERROR", Box::new(misc::ErrorHandler));

        Self { handlers }
    }

    /// Dispatch a message to the appropriate handler.
    ///
    /// The command name is folded, unknown commands draw 421, and
    /// registered-only commands before registration draw 451.
    pub async fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let name = msg.command.to_ascii_uppercase();

        let handler = match self.handlers.get(name.as_str()) {
            Some(handler) => handler,
            None => {
                return ctx.numeric(
                    Response::ERR_UNKNOWNCOMMAND,
                    &[&name, "Unknown command"],
                );
            }
        };

        if !ctx.handshake.registered && !PRE_REGISTRATION.contains(&name.as_str()) {
            return ctx.numeric(
                Response::ERR_NOTREGISTERED,
                &["You have not registered"],
            );
        }

        handler.handle(ctx, msg).await
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to create a server-origin reply message.
pub fn server_reply(server_name: &str, response: Response, params: Vec<String>) -> Message {
    Message::new(
        Some(Prefix::ServerName(server_name.to_string())),
        response.as_str(),
        params,
    )
}

/// Helper to create a user-origin fan-out message.
pub fn user_message(nick: &str, user: &str, host: &str, command: &str, params: Vec<String>) -> Message {
    Message::new(Some(Prefix::new(nick, user, host)), command, params)
}
