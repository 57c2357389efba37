//! The MODE command, in both its channel and user flavors.
//!
//! The mode string is walked character by character with a running
//! `+`/`-` sign. Channel modes cover `opsitnmlbvk`; user modes cover
//! `iswo`, where `+o` is only ever granted through OPER.

use super::{user_message, Context, Handler};
use crate::error::HandlerResult;
use crate::state::{BanEntry, Channel};
use async_trait::async_trait;
use ember_proto::{irc_eq, irc_to_lower, Message, Response};
use std::sync::atomic::Ordering;
use tracing::debug;

/// Handler for MODE.
pub struct ModeHandler;

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = match msg.arg(0) {
            Some(t) => t.to_string(),
            None => return ctx.need_more_params("MODE"),
        };

        if let Some(channel_arc) = ctx.matrix.channel(&target) {
            return channel_mode(ctx, msg, channel_arc).await;
        }

        // Not a channel: the target must be the requester itself.
        if !irc_eq(&target, &ctx.display_nick()) {
            return ctx.numeric(
                Response::ERR_USERSDONTMATCH,
                &["Cant change mode for other users"],
            );
        }
        user_mode(ctx, msg).await
    }
}

/// Walk a channel mode string.
async fn channel_mode(
    ctx: &mut Context<'_>,
    msg: &Message,
    channel_arc: std::sync::Arc<tokio::sync::RwLock<Channel>>,
) -> HandlerResult {
    let mut channel = channel_arc.write().await;

    let flags = match msg.arg(1) {
        Some(f) => f.to_string(),
        None => {
            let mut params = vec![channel.name.clone(), channel.modes.as_mode_string()];
            if let Some(limit) = channel.modes.limit {
                params.push(limit.to_string());
            }
            let refs: Vec<&str> = params.iter().map(String::as_str).collect();
            return ctx.numeric(Response::RPL_CHANNELMODEIS, &refs);
        }
    };

    let member = match channel.member_modes(ctx.uid) {
        Some(modes) => modes,
        None => return ctx.not_on_channel(&channel.name),
    };

    let (nick, user, host) = match super::channel::identity(ctx).await {
        Some(id) => id,
        None => return Ok(()),
    };

    // Fan one MODE line to every member.
    let fan = |ctx: &Context<'_>, channel: &Channel, change: &str, arg: Option<&str>| {
        let mut params = vec![channel.name.clone(), change.to_string()];
        if let Some(arg) = arg {
            params.push(arg.to_string());
        }
        let msg = user_message(&nick, &user, &host, "MODE", params);
        for m in &channel.members {
            ctx.matrix.send_to(m.uid, msg.clone());
        }
    };

    // Operator gate shared by every modifying letter.
    let require_op = |ctx: &Context<'_>, channel: &Channel| -> bool {
        if member.op {
            true
        } else {
            let _ = ctx.chanop_needed(&channel.name);
            false
        }
    };

    let mut set = true;
    let mut param_index = 2usize;
    let mut next_param = |msg: &Message, index: &mut usize| -> Option<String> {
        let value = msg.arg(*index).map(str::to_string);
        *index += 1;
        value
    };

    for letter in flags.chars() {
        match letter {
            '+' => set = true,
            '-' => set = false,
            'o' | 'v' => {
                let target_nick = next_param(msg, &mut param_index).unwrap_or_default();
                if !require_op(ctx, &channel) {
                    continue;
                }
                let target_uid = ctx.matrix.lookup_nick(&target_nick);
                let position = target_uid.and_then(|uid| {
                    channel.members.iter().position(|m| m.uid == uid)
                });
                let Some(position) = position else {
                    ctx.no_such_nick(&target_nick)?;
                    continue;
                };
                {
                    let modes = &mut channel.members[position].modes;
                    if letter == 'o' {
                        modes.op = set;
                    } else {
                        modes.voice = set;
                    }
                }
                let change = format!("{}{}", if set { '+' } else { '-' }, letter);
                fan(ctx, &channel, &change, Some(&target_nick));
            }
            'p' | 's' | 'i' | 't' | 'n' | 'm' => {
                if !require_op(ctx, &channel) {
                    continue;
                }
                match letter {
                    'p' => channel.modes.private = set,
                    's' => channel.modes.secret = set,
                    'i' => channel.modes.invite_only = set,
                    't' => channel.modes.topic_locked = set,
                    'n' => channel.modes.no_outside = set,
                    _ => channel.modes.moderated = set,
                }
                let change = format!("{}{}", if set { '+' } else { '-' }, letter);
                fan(ctx, &channel, &change, None);
            }
            'l' => {
                if !require_op(ctx, &channel) {
                    if set {
                        param_index += 1;
                    }
                    continue;
                }
                if set {
                    let arg = next_param(msg, &mut param_index).unwrap_or_default();
                    if arg.is_empty() {
                        ctx.need_more_params("MODE")?;
                        continue;
                    }
                    channel.modes.limit = arg.parse::<u32>().ok();
                    fan(ctx, &channel, "+l", Some(&arg));
                } else {
                    channel.modes.limit = None;
                    fan(ctx, &channel, "-l", None);
                }
            }
            'k' => {
                if !require_op(ctx, &channel) {
                    if set {
                        param_index += 1;
                    }
                    continue;
                }
                if set {
                    let arg = next_param(msg, &mut param_index).unwrap_or_default();
                    if arg.is_empty() {
                        ctx.need_more_params("MODE")?;
                        continue;
                    }
                    if channel.modes.key.is_some() {
                        ctx.numeric(
                            Response::ERR_KEYSET,
                            &[&channel.name, "Channel key already set."],
                        )?;
                        continue;
                    }
                    channel.modes.key = Some(arg.clone());
                    fan(ctx, &channel, "+k", Some(&arg));
                } else {
                    channel.modes.key = None;
                    fan(ctx, &channel, "-k", None);
                }
            }
            'b' => {
                // Without an argument this is the ban-list query.
                if msg.arg(param_index).is_none() {
                    let entries: Vec<(String, String, i64)> = channel
                        .bans
                        .iter()
                        .map(|b| (b.mask(), b.set_by.clone(), b.set_at))
                        .collect();
                    for (mask, set_by, set_at) in entries {
                        ctx.numeric(
                            Response::RPL_BANLIST,
                            &[&channel.name, &mask, &set_by, &set_at.to_string()],
                        )?;
                    }
                    ctx.numeric(
                        Response::RPL_ENDOFBANLIST,
                        &[&channel.name, "End of channel ban list"],
                    )?;
                    continue;
                }

                let arg = next_param(msg, &mut param_index).unwrap_or_default();
                if !require_op(ctx, &channel) {
                    continue;
                }
                if set {
                    let set_by = format!("{}!{}@{}", nick, user, host);
                    let entry =
                        BanEntry::parse(&arg, set_by, chrono::Utc::now().timestamp());
                    channel.bans.push(entry);
                    fan(ctx, &channel, "+b", Some(&arg));
                } else {
                    let folded = irc_to_lower(&arg);
                    channel.bans.retain(|b| irc_to_lower(&b.mask()) != folded);
                    fan(ctx, &channel, "-b", Some(&arg));
                }
                debug!(channel = %channel.name, mask = %arg, set = set, "ban list changed");
            }
            unknown => {
                ctx.numeric(
                    Response::ERR_UNKNOWNMODE,
                    &[&unknown.to_string(), "is unknown mode char to me."],
                )?;
            }
        }
    }

    Ok(())
}

/// Walk a user mode string, or report it when absent.
async fn user_mode(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let client_arc = match ctx.matrix.client(ctx.uid) {
        Some(c) => c,
        None => return Ok(()),
    };

    let flags = match msg.arg(1) {
        Some(f) => f.to_string(),
        None => {
            let modes = client_arc.read().await.modes.as_mode_string();
            let nick = ctx.display_nick();
            return ctx.numeric(Response::RPL_UMODEIS, &[&nick, &modes]);
        }
    };

    let (nick, user, host) = {
        let client = client_arc.read().await;
        (
            client.nick.clone(),
            client.user.clone(),
            client.host.clone(),
        )
    };

    let mut set = true;
    for letter in flags.chars() {
        match letter {
            '+' => set = true,
            '-' => set = false,
            'i' | 's' | 'w' | 'o' => {
                {
                    let mut client = client_arc.write().await;
                    match letter {
                        'i' => {
                            if set && !client.modes.invisible {
                                ctx.matrix.invisibles.fetch_add(1, Ordering::SeqCst);
                            } else if !set && client.modes.invisible {
                                ctx.matrix.invisibles.fetch_sub(1, Ordering::SeqCst);
                            }
                            client.modes.invisible = set;
                        }
                        's' => client.modes.server_notice = set,
                        'w' => client.modes.wallops = set,
                        'o' => {
                            // Operator is granted only via OPER; taking it
                            // away always works.
                            if set {
                                continue;
                            }
                            if client.modes.oper {
                                ctx.matrix.operators.fetch_sub(1, Ordering::SeqCst);
                            }
                            client.modes.oper = false;
                        }
                        _ => unreachable!(),
                    }
                }
                let change = format!("{}{}", if set { '+' } else { '-' }, letter);
                ctx.send(user_message(
                    &nick,
                    &user,
                    &host,
                    "MODE",
                    vec![nick.clone(), change],
                ))?;
            }
            unknown => {
                ctx.numeric(
                    Response::ERR_UNKNOWNMODE,
                    &[&unknown.to_string(), "is unknown mode char to me."],
                )?;
            }
        }
    }

    Ok(())
}
