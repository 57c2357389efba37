//! Connection registration: PASS, NICK, USER, QUIT, PING, PONG, and the
//! welcome burst once the handshake completes.

use super::{server_query, user_message, Context, Handler};
use crate::auth::{self, Admission};
use crate::error::{HandlerError, HandlerResult};
use crate::state::Client;
use async_trait::async_trait;
use ember_proto::{crypt, irc_to_lower, Message, Response, MAX_NICK_LEN};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Handler for PASS.
pub struct PassHandler;

#[async_trait]
impl Handler for PassHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let pass = match msg.arg(0) {
            Some(p) => p,
            None => {
                // A bare PASS terminates the connection, not just the
                // command.
                ctx.need_more_params("PASS")?;
                return Err(HandlerError::Drop);
            }
        };

        ctx.handshake.password = Some(pass.to_string());

        // A wrong server password drops the connection silently.
        if let Some(ref required) = ctx.matrix.password {
            if pass != required {
                debug!(uid = ctx.uid, "bad server password");
                return Err(HandlerError::Drop);
            }
        }

        Ok(())
    }
}

/// Extract the leading valid-nick prefix of the argument, truncated to
/// the nick length cap. Empty means the nick is unusable.
fn clean_nick(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() || c == '-' => return String::new(),
        None => return String::new(),
        _ => {}
    }
    raw.chars()
        .take_while(|&c| ('A'..='~').contains(&c) || c.is_ascii_digit() || c == '-')
        .take(MAX_NICK_LEN)
        .collect()
}

/// Handler for NICK.
pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let raw = match msg.arg(0) {
            Some(n) => n,
            None => {
                return ctx.numeric(Response::ERR_NONICKNAMEGIVEN, &["No nickname given"]);
            }
        };

        let nick = clean_nick(raw);
        if nick.is_empty() {
            return ctx.numeric(Response::ERR_ERRONEUSNICKNAME, &[raw, "Erroneus nickname"]);
        }

        // Changing to your own nick is a no-op.
        if let Some(ref current) = ctx.handshake.nick {
            if irc_to_lower(current) == irc_to_lower(&nick) {
                return Ok(());
            }
        }

        if let Some(holder) = ctx.matrix.lookup_nick(&nick) {
            if holder != ctx.uid {
                return ctx.send(super::server_reply(
                    ctx.server_name(),
                    Response::ERR_NICKNAMEINUSE,
                    vec![
                        "*".into(),
                        nick.clone(),
                        "Nickname is already in use".into(),
                    ],
                ));
            }
        }

        if ctx.handshake.registered {
            change_nick(ctx, nick).await
        } else {
            ctx.handshake.nick = Some(nick);
            Ok(())
        }
    }
}

/// Rename a registered client: snapshot history, swap the registry key
/// and tell every socket that shares a channel.
async fn change_nick(ctx: &mut Context<'_>, new_nick: String) -> HandlerResult {
    let client_arc = match ctx.matrix.client(ctx.uid) {
        Some(c) => c,
        None => return Ok(()),
    };

    let (old_nick, user, host, channel_names) = {
        let client = client_arc.read().await;
        (
            client.nick.clone(),
            client.user.clone(),
            client.host.clone(),
            client.channels.iter().cloned().collect::<Vec<_>>(),
        )
    };

    {
        let client = client_arc.read().await;
        ctx.matrix.history.lock().push(crate::state::HistoryEntry {
            nick: client.nick.clone(),
            user: client.user.clone(),
            host: client.host.clone(),
            realname: client.realname.clone(),
        });
    }

    // Every distinct socket sharing at least one channel sees the change.
    let mut recipients = BTreeSet::new();
    for name in &channel_names {
        if let Some(channel) = ctx.matrix.channel(name) {
            for member in &channel.read().await.members {
                recipients.insert(member.uid);
            }
        }
    }

    let notice =
        user_message(&old_nick, &user, &host, "NICK", vec![new_nick.clone()]).trailing();
    for uid in recipients {
        ctx.matrix.send_to(uid, notice.clone());
    }

    let old_folded = irc_to_lower(&old_nick);
    if let Some(entry) = ctx.matrix.nicks.get(&old_folded) {
        if *entry.value() == ctx.uid {
            drop(entry);
            ctx.matrix.nicks.remove(&old_folded);
        }
    }
    ctx.matrix.nicks.insert(irc_to_lower(&new_nick), ctx.uid);

    client_arc.write().await.nick = new_nick.clone();
    info!(old = %old_nick, new = %new_nick, "nick changed");
    ctx.handshake.nick = Some(new_nick);
    Ok(())
}

/// Handler for USER.
pub struct UserHandler;

#[async_trait]
impl Handler for UserHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if msg.params.len() < 4 {
            return ctx.need_more_params("USER");
        }
        if ctx.handshake.registered {
            return ctx.numeric(Response::ERR_ALREADYREGISTRED, &["You may not reregister"]);
        }
        ctx.handshake.user = Some(msg.params[0].clone());
        ctx.handshake.realname = Some(msg.params[3].clone());
        Ok(())
    }
}

/// Handler for QUIT.
pub struct QuitHandler;

#[async_trait]
impl Handler for QuitHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        Err(HandlerError::Quit(
            msg.arg(0).unwrap_or_default().to_string(),
        ))
    }
}

/// Handler for PING: answer with a PONG carrying the origin back.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let origin = match msg.arg(0) {
            Some(o) => o,
            None => {
                return ctx.numeric(Response::ERR_NOORIGIN, &["No origin specified"]);
            }
        };
        let server = ctx.server_name().to_string();
        ctx.send(Message::new(
            Some(ember_proto::Prefix::ServerName(server.clone())),
            "PONG",
            vec![server, origin.to_string()],
        ))
    }
}

/// Handler for PONG: the read loop already reset the idle state.
pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        Ok(())
    }
}

/// Try to finish registration after a PASS/NICK/USER step.
///
/// Once NICK and USER are in (and PASS, when the server wants one), the
/// client runs the K/I-line gauntlet, claims its nick in the registry and
/// receives the welcome burst.
pub async fn complete_registration(ctx: &mut Context<'_>, ip: &str) -> HandlerResult {
    if !ctx.handshake.has_identity() {
        return Ok(());
    }
    if ctx.matrix.password.is_some() && ctx.handshake.password.is_none() {
        // Wait for PASS; the RFC puts it first but clients vary.
        return Ok(());
    }

    let nick = ctx.handshake.nick.clone().unwrap_or_default();
    let user_arg = ctx.handshake.user.clone().unwrap_or_default();
    let realname = ctx.handshake.realname.clone().unwrap_or_default();
    let password = ctx.handshake.password.clone();

    // Ident fills the username; otherwise the USER argument is marked
    // unverified. DNS fills the host; otherwise the dotted address stays.
    let user = match ctx.handshake.ident_user.clone() {
        Some(ident) => ident,
        None => format!("~{}", user_arg),
    };
    let host = ctx
        .handshake
        .dns_host
        .clone()
        .unwrap_or_else(|| ip.to_string());

    // Claim the nick; a provisional race may have lost it since NICK.
    let folded = irc_to_lower(&nick);
    match ctx.matrix.nicks.entry(folded) {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            ctx.handshake.nick = None;
            return ctx.send(super::server_reply(
                ctx.server_name(),
                Response::ERR_NICKNAMEINUSE,
                vec!["*".into(), nick, "Nickname is already in use".into()],
            ));
        }
        dashmap::mapref::entry::Entry::Vacant(entry) => {
            entry.insert(ctx.uid);
        }
    }

    let release_nick = |ctx: &Context<'_>| {
        ctx.matrix.nicks.remove(&irc_to_lower(&nick));
    };

    let class_id = match auth::authorize(
        ctx.matrix,
        &user,
        &host,
        ip,
        password.as_deref().unwrap_or(""),
    ) {
        Admission::Ok { class_id } => class_id,
        Admission::Banned => {
            release_nick(ctx);
            ctx.numeric(
                Response::ERR_YOUREBANNEDCREEP,
                &["You are banned from this server"],
            )?;
            return Err(HandlerError::Drop);
        }
        Admission::PasswordMismatch => {
            release_nick(ctx);
            ctx.numeric(Response::ERR_PASSWDMISMATCH, &["Password incorrect"])?;
            return Err(HandlerError::Drop);
        }
        Admission::Rejected => {
            release_nick(ctx);
            return Err(HandlerError::Drop);
        }
    };

    let now = chrono::Utc::now().timestamp();
    let client = Client {
        uid: ctx.uid,
        nick: nick.clone(),
        user: user.clone(),
        realname,
        host: host.clone(),
        ip: ip.to_string(),
        server: ctx.server_name().to_string(),
        password: password.clone().unwrap_or_default(),
        crypt_key: password.as_deref().map(crypt::gen_key).unwrap_or(0),
        has_pass: password.is_some(),
        channels: Default::default(),
        modes: Default::default(),
        away: None,
        class_id,
        signon: now,
        last_send: now,
    };
    ctx.matrix
        .users
        .insert(ctx.uid, std::sync::Arc::new(tokio::sync::RwLock::new(client)));
    ctx.matrix.senders.insert(ctx.uid, ctx.sender.clone());
    ctx.handshake.registered = true;

    info!(nick = %nick, user = %user, host = %host, "client registered");
    send_welcome_burst(ctx, &nick).await
}

/// The 001-004 block, the advisory NOTICE, LUSERS and MOTD.
async fn send_welcome_burst(ctx: &mut Context<'_>, nick: &str) -> HandlerResult {
    let info = ctx.matrix.server_info.clone();

    ctx.numeric(
        Response::RPL_WELCOME,
        &[&format!("Welcome to the Internet Relay Chat, {} !", nick)],
    )?;
    ctx.numeric(
        Response::RPL_YOURHOST,
        &[&format!(
            "Your host is {}, running version {}",
            info.name, info.version
        )],
    )?;
    ctx.send(Message::new(
        None,
        "NOTICE",
        vec![
            nick.to_string(),
            format!(
                "*** Your host is {}, running version {}",
                info.name, info.version
            ),
        ],
    ))?;
    ctx.numeric(
        Response::RPL_CREATED,
        &[&format!("This server was created {}", info.created)],
    )?;
    ctx.numeric(
        Response::RPL_MYINFO,
        &[&info.name, &info.version, "iswo", "opsitnmlbvk"],
    )?;

    server_query::send_lusers(ctx)?;
    server_query::send_motd(ctx)
}
