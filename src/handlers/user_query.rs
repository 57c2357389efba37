//! User-based queries: WHO, WHOIS, WHOWAS, ISON, USERHOST.

use super::{Context, Handler};
use crate::error::HandlerResult;
use crate::state::{Client, Uid};
use async_trait::async_trait;
use ember_proto::target::parse_targets;
use ember_proto::{wild_match, Message, Response};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A point-in-time copy of one client, taken so no client lock is held
/// while channel locks are acquired (lock order is channel before user).
struct Snapshot {
    uid: Uid,
    nick: String,
    user: String,
    host: String,
    server: String,
    realname: String,
    away: Option<String>,
    oper: bool,
    invisible: bool,
    signon: i64,
    last_send: i64,
    channels: HashSet<String>,
}

async fn snapshot(uid: Uid, client_arc: &Arc<RwLock<Client>>) -> Snapshot {
    let client = client_arc.read().await;
    Snapshot {
        uid,
        nick: client.nick.clone(),
        user: client.user.clone(),
        host: client.host.clone(),
        server: client.server.clone(),
        realname: client.realname.clone(),
        away: client.away.clone(),
        oper: client.modes.oper,
        invisible: client.modes.invisible,
        signon: client.signon,
        last_send: client.last_send,
        channels: client.channels.clone(),
    }
}

/// Whether `target` is visible to the requester: everyone sees
/// themselves, and invisible users are hidden unless a channel is shared.
async fn visible_to(ctx: &Context<'_>, target: &Snapshot) -> bool {
    if target.uid == ctx.uid || !target.invisible {
        return true;
    }
    ctx.matrix.shares_channel(ctx.uid, &target.channels).await
}

/// Collect snapshots of every client whose nick matches a glob.
async fn match_nicks(ctx: &Context<'_>, mask: &str) -> Vec<Snapshot> {
    let entries: Vec<_> = ctx
        .matrix
        .users
        .iter()
        .map(|e| (*e.key(), e.value().clone()))
        .collect();
    let mut found = Vec::new();
    for (uid, client_arc) in entries {
        let snap = snapshot(uid, &client_arc).await;
        if wild_match(mask, &snap.nick) {
            found.push(snap);
        }
    }
    found
}

/// One 352 WHO reply for a client, in the context of one channel.
fn send_who_line(
    ctx: &Context<'_>,
    channel_name: &str,
    target: &Snapshot,
    chan_prefix: &str,
) -> HandlerResult {
    let here_gone = if target.away.is_some() { "G" } else { "H" };
    let oper_star = if target.oper { "*" } else { "" };
    let flags = format!("{}{}{}", here_gone, oper_star, chan_prefix);
    ctx.numeric_trailing(
        Response::RPL_WHOREPLY,
        &[
            channel_name,
            &target.user,
            &target.host,
            &target.server,
            &target.nick,
            &flags,
            &format!("0 {}", target.realname),
        ],
    )
}

/// Handler for WHO.
pub struct WhoHandler;

#[async_trait]
impl Handler for WhoHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let mask = msg.arg(0).unwrap_or("*").to_string();

        // Channel pass first: when any channel matches, the reply is
        // organized per channel.
        let channel_arcs: Vec<_> = ctx
            .matrix
            .channels
            .iter()
            .map(|e| e.value().clone())
            .collect();
        let mut matched_channel = false;
        for channel_arc in channel_arcs {
            let (name, members, requester_in_channel) = {
                let channel = channel_arc.read().await;
                if !wild_match(&mask, &channel.name) {
                    continue;
                }
                (
                    channel.name.clone(),
                    channel
                        .members
                        .iter()
                        .map(|m| (m.uid, m.modes.prefix()))
                        .collect::<Vec<_>>(),
                    channel.is_member(ctx.uid),
                )
            };
            matched_channel = true;
            for (uid, prefix) in members {
                let client_arc = match ctx.matrix.client(uid) {
                    Some(c) => c,
                    None => continue,
                };
                let target = snapshot(uid, &client_arc).await;
                if target.invisible && !requester_in_channel && uid != ctx.uid {
                    continue;
                }
                send_who_line(ctx, &name, &target, prefix)?;
            }
            ctx.numeric(Response::RPL_ENDOFWHO, &[&name, "End of /WHO list."])?;
        }
        if matched_channel {
            return Ok(());
        }

        // Nick pass.
        let mut matched_nick = false;
        for target in match_nicks(ctx, &mask).await {
            if !visible_to(ctx, &target).await {
                continue;
            }
            matched_nick = true;
            for name in &target.channels {
                if let Some(channel_arc) = ctx.matrix.channel(name) {
                    let (channel_name, prefix) = {
                        let channel = channel_arc.read().await;
                        (
                            channel.name.clone(),
                            channel
                                .member_modes(target.uid)
                                .map(|m| m.prefix())
                                .unwrap_or(""),
                        )
                    };
                    send_who_line(ctx, &channel_name, &target, prefix)?;
                }
            }
            ctx.numeric(
                Response::RPL_ENDOFWHO,
                &[&target.nick, "End of /WHO list."],
            )?;
        }

        if !matched_nick {
            ctx.numeric(Response::RPL_ENDOFWHO, &[&mask, "End of /WHO list."])?;
        }
        Ok(())
    }
}

/// The WHOIS info block for one client.
async fn send_whois_block(ctx: &Context<'_>, target: &Snapshot) -> HandlerResult {
    ctx.numeric_trailing(
        Response::RPL_WHOISUSER,
        &[
            &target.nick,
            &target.user,
            &target.host,
            "*",
            &target.realname,
        ],
    )?;
    ctx.numeric(
        Response::RPL_WHOISSERVER,
        &[&target.nick, &target.server, &ctx.matrix.server_info.info],
    )?;
    if target.oper {
        ctx.numeric(
            Response::RPL_WHOISOPERATOR,
            &[&target.nick, "is an IRC operator"],
        )?;
    }
    let idle = chrono::Utc::now().timestamp() - target.last_send;
    ctx.numeric(
        Response::RPL_WHOISIDLE,
        &[
            &target.nick,
            &idle.max(0).to_string(),
            &target.signon.to_string(),
            "seconds idle, signon time",
        ],
    )?;

    let mut channels = Vec::new();
    for name in &target.channels {
        if let Some(channel_arc) = ctx.matrix.channel(name) {
            let channel = channel_arc.read().await;
            let prefix = channel
                .member_modes(target.uid)
                .map(|m| m.prefix())
                .unwrap_or("");
            channels.push(format!("{}{}", prefix, channel.name));
        }
    }
    ctx.numeric_trailing(
        Response::RPL_WHOISCHANNELS,
        &[&target.nick, &channels.join(" ")],
    )
}

/// Handler for WHOIS.
pub struct WhoisHandler;

#[async_trait]
impl Handler for WhoisHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let first = match msg.arg(0) {
            Some(a) => a,
            None => return ctx.need_more_params("WHOIS"),
        };

        // A leading argument matching our own host selects the server
        // form; the nick masks then follow in the next parameter.
        let masks = if wild_match(first, &ctx.matrix.server_info.name) {
            msg.arg(1).unwrap_or("").to_string()
        } else {
            first.to_string()
        };

        for target in parse_targets(&masks) {
            let mask = &target.nick;
            if mask.is_empty() {
                continue;
            }

            let candidates: Vec<Snapshot> = if mask.contains(['*', '?']) {
                match_nicks(ctx, mask).await
            } else {
                match ctx.matrix.lookup_nick(mask) {
                    Some(uid) => match ctx.matrix.client(uid) {
                        Some(arc) => vec![snapshot(uid, &arc).await],
                        None => Vec::new(),
                    },
                    None => Vec::new(),
                }
            };

            for candidate in candidates {
                // An away target answers with its away message instead of
                // the info block.
                if let Some(ref away) = candidate.away {
                    ctx.numeric_trailing(Response::RPL_AWAY, &[&candidate.nick, away])?;
                    continue;
                }
                if !visible_to(ctx, &candidate).await {
                    continue;
                }
                send_whois_block(ctx, &candidate).await?;
            }

            ctx.numeric(Response::RPL_ENDOFWHOIS, &[mask, "End of /WHOIS list"])?;
        }

        Ok(())
    }
}

/// Handler for WHOWAS.
pub struct WhowasHandler;

#[async_trait]
impl Handler for WhowasHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let nick = match msg.arg(0) {
            Some(n) => n.to_string(),
            None => {
                return ctx.numeric(Response::ERR_NONICKNAMEGIVEN, &["No nickname given"]);
            }
        };
        let count = msg
            .arg(1)
            .and_then(|c| c.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0) as usize;

        let entries: Vec<_> = {
            let history = ctx.matrix.history.lock();
            history.find(&nick, count).into_iter().cloned().collect()
        };

        if entries.is_empty() {
            return ctx.numeric(
                Response::ERR_WASNOSUCHNICK,
                &[&nick, "There was no such nickname"],
            );
        }
        for entry in &entries {
            ctx.numeric_trailing(
                Response::RPL_WHOWASUSER,
                &[&entry.nick, &entry.user, &entry.host, "*", &entry.realname],
            )?;
        }
        ctx.numeric(Response::RPL_ENDOFWHOWAS, &[&nick, "End of WHOWAS"])
    }
}

/// Handler for ISON.
pub struct IsonHandler;

#[async_trait]
impl Handler for IsonHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if msg.params.is_empty() {
            return ctx.need_more_params("ISON");
        }
        let mut online = Vec::new();
        for nick in msg.params.iter().flat_map(|p| p.split_whitespace()) {
            if let Some(uid) = ctx.matrix.lookup_nick(nick) {
                if let Some(client_arc) = ctx.matrix.client(uid) {
                    online.push(client_arc.read().await.nick.clone());
                }
            }
        }
        ctx.numeric_trailing(Response::RPL_ISON, &[&online.join(" ")])
    }
}

/// Handler for USERHOST.
pub struct UserhostHandler;

#[async_trait]
impl Handler for UserhostHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if msg.params.is_empty() {
            return ctx.need_more_params("USERHOST");
        }
        let mut replies = Vec::new();
        for nick in msg.params.iter().take(5) {
            let uid = match ctx.matrix.lookup_nick(nick) {
                Some(uid) => uid,
                None => continue,
            };
            let client_arc = match ctx.matrix.client(uid) {
                Some(c) => c,
                None => continue,
            };
            let client = client_arc.read().await;
            replies.push(format!(
                "{}{}={}{}@{}",
                client.nick,
                if client.modes.oper { "*" } else { "" },
                if client.is_away() { "-" } else { "+" },
                client.user,
                client.host,
            ));
        }
        ctx.numeric_trailing(Response::RPL_USERHOST, &[&replies.join(" ")])
    }
}
