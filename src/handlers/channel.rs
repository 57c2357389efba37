//! Channel operations: JOIN, PART, KICK, INVITE, TOPIC, NAMES, LIST.

use super::{user_message, Context, Handler};
use crate::error::HandlerResult;
use crate::state::{Channel, Uid, MAX_CHANNELS, MAX_CLIENTS};
use async_trait::async_trait;
use ember_proto::target::{nth_item, parse_targets};
use ember_proto::{irc_to_lower, Message, Response};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Snapshot the requester's fan-out identity.
pub(super) async fn identity(ctx: &Context<'_>) -> Option<(String, String, String)> {
    let client_arc = ctx.matrix.client(ctx.uid)?;
    let client = client_arc.read().await;
    Some((
        client.nick.clone(),
        client.user.clone(),
        client.host.clone(),
    ))
}

/// Queue one message to every member of a channel.
fn broadcast(ctx: &Context<'_>, channel: &Channel, msg: &Message) {
    for member in &channel.members {
        ctx.matrix.send_to(member.uid, msg.clone());
    }
}

/// The topic block sent on JOIN and TOPIC queries: 332 plus the non-RFC
/// 333 carrying setter and timestamp, or 331 when nothing is set.
pub(super) fn send_topic(ctx: &Context<'_>, channel: &Channel) -> HandlerResult {
    match channel.topic {
        Some(ref topic) => {
            ctx.numeric_trailing(Response::RPL_TOPIC, &[&channel.name, &topic.text])?;
            ctx.numeric(
                Response::RPL_TOPICSET,
                &[&channel.name, &topic.set_by, &topic.set_at.to_string()],
            )
        }
        None => ctx.numeric(Response::RPL_NOTOPIC, &[&channel.name, "No topic is set"]),
    }
}

/// One 353 NAMES line for a channel.
///
/// Invisible members stay hidden unless the requester is in the channel
/// itself.
pub(super) async fn send_names(ctx: &Context<'_>, channel: &Channel) -> HandlerResult {
    let requester_in_channel = channel.is_member(ctx.uid);
    let mut names = Vec::new();
    for member in &channel.members {
        let client_arc = match ctx.matrix.client(member.uid) {
            Some(c) => c,
            None => continue,
        };
        let client = client_arc.read().await;
        if client.modes.invisible && !requester_in_channel {
            continue;
        }
        names.push(format!("{}{}", member.modes.prefix(), client.nick));
    }

    let symbol = if channel.modes.is_hidden() { "*" } else { "=" };
    ctx.numeric_trailing(
        Response::RPL_NAMREPLY,
        &[symbol, &channel.name, &names.join(" ")],
    )
}

/// Handler for JOIN.
pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channels_arg = match msg.arg(0) {
            Some(a) => a,
            None => return ctx.need_more_params("JOIN"),
        };
        let keys_arg = msg.arg(1).unwrap_or("");

        let (nick, user, host) = match identity(ctx).await {
            Some(id) => id,
            None => return Ok(()),
        };
        let folded_nick = irc_to_lower(&nick);

        for (index, target) in parse_targets(channels_arg).iter().enumerate() {
            if !target.is_channel() {
                ctx.no_such_channel(target.display_name())?;
                continue;
            }
            let name = &target.channel;
            if !Channel::valid_name(name) {
                ctx.no_such_channel(name)?;
                continue;
            }

            let client_arc = match ctx.matrix.client(ctx.uid) {
                Some(c) => c,
                None => return Ok(()),
            };
            if client_arc.read().await.channels.len() >= MAX_CHANNELS {
                ctx.numeric(
                    Response::ERR_TOOMANYCHANNELS,
                    &[name, "You have joined too many channels"],
                )?;
                continue;
            }

            let folded_name = irc_to_lower(name);
            let now = chrono::Utc::now().timestamp();

            let channel_arc: Arc<RwLock<Channel>> =
                match ctx.matrix.channels.get(&folded_name).map(|e| e.value().clone()) {
                    Some(existing) => {
                        let mut channel = existing.write().await;
                        if channel.is_member(ctx.uid) {
                            continue;
                        }
                        if let Some(ref key) = channel.modes.key {
                            let given = nth_item(keys_arg, index).unwrap_or("");
                            if given != key {
                                ctx.numeric(
                                    Response::ERR_BADCHANNELKEY,
                                    &[&channel.name, "Cannot join channel (+k)"],
                                )?;
                                continue;
                            }
                        }
                        if channel.modes.invite_only && !channel.take_invite(&folded_nick) {
                            ctx.numeric(
                                Response::ERR_INVITEONLYCHAN,
                                &[&channel.name, "Cannot join channel (+i)"],
                            )?;
                            continue;
                        }
                        let limit = channel
                            .modes
                            .limit
                            .map(|l| l as usize)
                            .unwrap_or(MAX_CLIENTS)
                            .min(MAX_CLIENTS);
                        if channel.members.len() >= limit {
                            ctx.numeric(
                                Response::ERR_CHANNELISFULL,
                                &[&channel.name, "Cannot join channel (+l)"],
                            )?;
                            continue;
                        }
                        if channel.find_ban(&nick, &user, &host).is_some() {
                            ctx.numeric(
                                Response::ERR_BANNEDFROMCHAN,
                                &[&channel.name, "Cannot join channel (+b)"],
                            )?;
                            continue;
                        }
                        channel.add_member(ctx.uid);
                        drop(channel);
                        existing
                    }
                    None => {
                        let arc = ctx
                            .matrix
                            .channels
                            .entry(folded_name.clone())
                            .or_insert_with(|| {
                                Arc::new(RwLock::new(Channel::new(
                                    name.clone(),
                                    ctx.uid,
                                    nick.clone(),
                                    now,
                                )))
                            })
                            .value()
                            .clone();
                        // A racing creator wins the slot; either way this
                        // client ends up a member.
                        arc.write().await.add_member(ctx.uid);
                        debug!(channel = %name, creator = %nick, "channel created");
                        arc
                    }
                };

            client_arc.write().await.channels.insert(folded_name);

            let channel = channel_arc.read().await;
            let join = user_message(&nick, &user, &host, "JOIN", vec![channel.name.clone()])
                .trailing();
            broadcast(ctx, &channel, &join);
            info!(nick = %nick, channel = %channel.name, "joined channel");

            send_topic(ctx, &channel)?;
            ctx.numeric(
                Response::RPL_CHANCREATED,
                &[&channel.name, &channel.created_at.to_string()],
            )?;
            send_names(ctx, &channel).await?;
            ctx.numeric(
                Response::RPL_ENDOFNAMES,
                &[&channel.name, "End of /NAMES list"],
            )?;
        }

        Ok(())
    }
}

/// Handler for PART.
pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channels_arg = match msg.arg(0) {
            Some(a) => a,
            None => return ctx.need_more_params("PART"),
        };
        let reason = msg.arg(1).unwrap_or("").to_string();

        let (nick, user, host) = match identity(ctx).await {
            Some(id) => id,
            None => return Ok(()),
        };

        for target in parse_targets(channels_arg) {
            let folded = irc_to_lower(&target.channel);
            let channel_arc = match ctx.matrix.channels.get(&folded).map(|e| e.value().clone()) {
                Some(c) => c,
                None => {
                    ctx.no_such_channel(target.display_name())?;
                    continue;
                }
            };

            let mut channel = channel_arc.write().await;
            if !channel.is_member(ctx.uid) {
                ctx.not_on_channel(&channel.name)?;
                continue;
            }

            let part = user_message(
                &nick,
                &user,
                &host,
                "PART",
                vec![channel.name.clone(), reason.clone()],
            )
            .trailing();
            broadcast(ctx, &channel, &part);

            let empty = channel.remove_member(ctx.uid);
            let name = channel.name.clone();
            drop(channel);

            if let Some(client_arc) = ctx.matrix.client(ctx.uid) {
                client_arc.write().await.channels.remove(&folded);
            }
            if empty {
                ctx.matrix.channels.remove(&folded);
                debug!(channel = %name, "channel destroyed (empty)");
            }
            info!(nick = %nick, channel = %name, "left channel");
        }

        Ok(())
    }
}

/// Handler for KICK.
pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (channels_arg, users_arg) = match (msg.arg(0), msg.arg(1)) {
            (Some(c), Some(u)) => (c, u),
            _ => return ctx.need_more_params("KICK"),
        };
        let comment = msg.arg(2).unwrap_or("").to_string();

        let (nick, user, host) = match identity(ctx).await {
            Some(id) => id,
            None => return Ok(()),
        };

        for (index, target) in parse_targets(channels_arg).iter().enumerate() {
            let folded = irc_to_lower(&target.channel);
            let channel_arc = match ctx.matrix.channels.get(&folded).map(|e| e.value().clone()) {
                Some(c) => c,
                None => {
                    ctx.no_such_channel(target.display_name())?;
                    continue;
                }
            };

            let mut channel = channel_arc.write().await;
            let requester = match channel.member_modes(ctx.uid) {
                Some(modes) => modes,
                None => {
                    ctx.not_on_channel(&channel.name)?;
                    continue;
                }
            };
            if !requester.op {
                ctx.chanop_needed(&channel.name)?;
                continue;
            }

            let victim_nick = match nth_item(users_arg, index) {
                Some(v) if !v.is_empty() => v,
                _ => continue,
            };
            let victim_uid = match ctx.matrix.lookup_nick(victim_nick) {
                Some(uid) => uid,
                None => continue,
            };
            if !channel.is_member(victim_uid) {
                continue;
            }

            // Resolve the victim's current spelling for the fan-out.
            let victim_display = match ctx.matrix.client(victim_uid) {
                Some(c) => c.read().await.nick.clone(),
                None => victim_nick.to_string(),
            };

            let kick = user_message(
                &nick,
                &user,
                &host,
                "KICK",
                vec![channel.name.clone(), victim_display, comment.clone()],
            )
            .trailing();
            broadcast(ctx, &channel, &kick);

            let empty = channel.remove_member(victim_uid);
            let name = channel.name.clone();
            drop(channel);

            if let Some(client_arc) = ctx.matrix.client(victim_uid) {
                client_arc.write().await.channels.remove(&folded);
            }
            if empty {
                ctx.matrix.channels.remove(&folded);
                debug!(channel = %name, "channel destroyed (empty)");
            }
        }

        Ok(())
    }
}

/// Handler for INVITE.
pub struct InviteHandler;

#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (nick_arg, channel_arg) = match (msg.arg(0), msg.arg(1)) {
            (Some(n), Some(c)) => (n.to_string(), c.to_string()),
            _ => return ctx.need_more_params("INVITE"),
        };

        let target_uid = match ctx.matrix.lookup_nick(&nick_arg) {
            Some(uid) => uid,
            None => return ctx.no_such_nick(&nick_arg),
        };
        let channel_arc = match ctx.matrix.channel(&channel_arg) {
            Some(c) => c,
            None => return ctx.no_such_nick(&channel_arg),
        };

        let (nick, user, host) = match identity(ctx).await {
            Some(id) => id,
            None => return Ok(()),
        };

        let mut channel = channel_arc.write().await;
        let inviter = match channel.member_modes(ctx.uid) {
            Some(modes) => modes,
            None => return ctx.not_on_channel(&channel.name),
        };
        if channel.is_member(target_uid) {
            return ctx.numeric(
                Response::ERR_USERONCHANNEL,
                &[&nick_arg, &channel.name, "is already on channel."],
            );
        }
        if !inviter.op {
            return ctx.chanop_needed(&channel.name);
        }

        // An away target gets no invitation; the inviter sees the away
        // reply instead.
        let target_arc = match ctx.matrix.client(target_uid) {
            Some(c) => c,
            None => return Ok(()),
        };
        {
            let target = target_arc.read().await;
            if let Some(ref away) = target.away {
                return ctx.numeric_trailing(Response::RPL_AWAY, &[&target.nick, away]);
            }

            ctx.matrix.send_to(
                target_uid,
                user_message(
                    &nick,
                    &user,
                    &host,
                    "INVITE",
                    vec![target.nick.clone(), channel.name.clone()],
                )
                .trailing(),
            );
        }

        channel.invites.push(irc_to_lower(&nick_arg));
        info!(nick = %nick_arg, channel = %channel.name, "invited");
        Ok(())
    }
}

/// Handler for TOPIC.
pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel_arg = match msg.arg(0) {
            Some(c) => c,
            None => return ctx.need_more_params("TOPIC"),
        };

        let channel_arc = match ctx.matrix.channel(channel_arg) {
            Some(c) => c,
            None => return ctx.no_such_channel(channel_arg),
        };

        let mut channel = channel_arc.write().await;
        let member = match channel.member_modes(ctx.uid) {
            Some(modes) => modes,
            None => return ctx.not_on_channel(&channel.name),
        };

        let text = match msg.arg(1) {
            Some(t) => t.to_string(),
            None => return send_topic(ctx, &channel),
        };

        if channel.modes.topic_locked && !member.op {
            return ctx.chanop_needed(&channel.name);
        }

        let (nick, user, host) = match identity(ctx).await {
            Some(id) => id,
            None => return Ok(()),
        };

        channel.topic = if text.is_empty() {
            None
        } else {
            Some(crate::state::Topic {
                text: text.clone(),
                set_by: nick.clone(),
                set_at: chrono::Utc::now().timestamp(),
            })
        };

        let topic = user_message(
            &nick,
            &user,
            &host,
            "TOPIC",
            vec![channel.name.clone(), text],
        )
        .trailing();
        broadcast(ctx, &channel, &topic);
        Ok(())
    }
}

/// Handler for NAMES.
pub struct NamesHandler;

#[async_trait]
impl Handler for NamesHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        match msg.arg(0) {
            Some(arg) => {
                for target in parse_targets(arg) {
                    if let Some(channel_arc) = ctx.matrix.channel(&target.channel) {
                        let channel = channel_arc.read().await;
                        if !channel.modes.is_hidden() || channel.is_member(ctx.uid) {
                            send_names(ctx, &channel).await?;
                        }
                    }
                    ctx.numeric(
                        Response::RPL_ENDOFNAMES,
                        &[target.display_name(), "End of /NAMES list"],
                    )?;
                }
                Ok(())
            }
            None => {
                // Every visible channel, then clients that sit in none of
                // them.
                let channel_arcs: Vec<_> = ctx
                    .matrix
                    .channels
                    .iter()
                    .map(|e| e.value().clone())
                    .collect();
                let mut listed: Vec<Uid> = Vec::new();
                for channel_arc in channel_arcs {
                    let channel = channel_arc.read().await;
                    if channel.modes.is_hidden() && !channel.is_member(ctx.uid) {
                        continue;
                    }
                    for member in &channel.members {
                        listed.push(member.uid);
                    }
                    send_names(ctx, &channel).await?;
                }

                let mut orphans = Vec::new();
                let user_arcs: Vec<_> = ctx
                    .matrix
                    .users
                    .iter()
                    .map(|e| (*e.key(), e.value().clone()))
                    .collect();
                for (uid, client_arc) in user_arcs {
                    let client = client_arc.read().await;
                    if client.modes.invisible || listed.contains(&uid) {
                        continue;
                    }
                    let prefix = if client.modes.oper { "@" } else { "" };
                    orphans.push(format!("{}{}", prefix, client.nick));
                }
                ctx.numeric_trailing(Response::RPL_NAMREPLY, &["*", "*", &orphans.join(" ")])?;
                ctx.numeric(Response::RPL_ENDOFNAMES, &["*", "End of /NAMES list"])
            }
        }
    }
}

/// Handler for LIST.
pub struct ListHandler;

impl ListHandler {
    /// One 322 line, honoring secret/private visibility.
    async fn send_entry(
        ctx: &Context<'_>,
        channel_arc: &Arc<RwLock<Channel>>,
    ) -> HandlerResult {
        let channel = channel_arc.read().await;
        if channel.modes.secret {
            return Ok(());
        }
        let member = channel.is_member(ctx.uid);
        if channel.modes.private && !member {
            return Ok(());
        }

        let mut visibles = 0usize;
        for m in &channel.members {
            if let Some(client_arc) = ctx.matrix.client(m.uid) {
                if !client_arc.read().await.modes.invisible {
                    visibles += 1;
                }
            }
        }
        let topic = channel
            .topic
            .as_ref()
            .map(|t| t.text.clone())
            .unwrap_or_default();

        if channel.modes.private {
            ctx.numeric_trailing(
                Response::RPL_LIST,
                &["*", &channel.name, &visibles.to_string(), &topic],
            )
        } else {
            ctx.numeric_trailing(
                Response::RPL_LIST,
                &[&channel.name, &visibles.to_string(), &topic],
            )
        }
    }
}

#[async_trait]
impl Handler for ListHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        ctx.numeric(Response::RPL_LISTSTART, &["Channel", "Users  Name"])?;

        match msg.arg(0) {
            Some(arg) => {
                for target in parse_targets(arg) {
                    if let Some(channel_arc) = ctx.matrix.channel(&target.channel) {
                        Self::send_entry(ctx, &channel_arc).await?;
                    }
                }
            }
            None => {
                let channel_arcs: Vec<_> = ctx
                    .matrix
                    .channels
                    .iter()
                    .map(|e| e.value().clone())
                    .collect();
                for channel_arc in channel_arcs {
                    Self::send_entry(ctx, &channel_arc).await?;
                }
            }
        }

        ctx.numeric(Response::RPL_LISTEND, &["End of /LIST"])
    }
}
