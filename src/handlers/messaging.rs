//! PRIVMSG and NOTICE.
//!
//! One shared pipeline: resolve each target, apply moderation checks, and
//! forward one copy per recipient socket. NOTICE differs only in that it
//! never answers failures with a numeric.
//!
//! Password-carrying clients get the classic one-byte crypt: the body is
//! encrypted with the sender's key once, and each keyed recipient sees it
//! decrypted with their own key. The transport is byte-transparent (every
//! char in a body string is one wire byte), so the mapping is byte-exact.

use super::{user_message, Context, Handler};
use crate::error::HandlerResult;
use async_trait::async_trait;
use ember_proto::target::parse_targets;
use ember_proto::{crypt, Message, Response};
use tracing::trace;

/// Body string to wire bytes; the transport guarantees chars < 0x100.
fn body_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| c as u8).collect()
}

/// Wire bytes back to a body string, one char per byte.
fn body_string(b: &[u8]) -> String {
    b.iter().map(|&byte| byte as char).collect()
}

/// Shared delivery core.
async fn deliver(ctx: &mut Context<'_>, msg: &Message, command: &str) -> HandlerResult {
    // NOTICE failures are silent by RFC; PRIVMSG failures draw numerics.
    let noisy = command == "PRIVMSG";

    if msg.params.len() < 2 {
        if noisy {
            return ctx.need_more_params(command);
        }
        return Ok(());
    }

    // The body is the concatenation of everything after the target list.
    let body: String = msg.params[1..].concat();
    if body.is_empty() {
        if noisy {
            return ctx.numeric(Response::ERR_NOTEXTTOSEND, &["No text to send"]);
        }
        return Ok(());
    }

    let client_arc = match ctx.matrix.client(ctx.uid) {
        Some(c) => c,
        None => return Ok(()),
    };
    let (nick, user, host, sender_keyed, sender_key) = {
        let client = client_arc.read().await;
        (
            client.nick.clone(),
            client.user.clone(),
            client.host.clone(),
            client.has_pass,
            client.crypt_key,
        )
    };

    // Encrypt once with the sender key; recipients re-render per key.
    let wire = if sender_keyed {
        crypt::encrypt(&body_bytes(&body), sender_key)
    } else {
        body_bytes(&body)
    };
    let render = |keyed: bool, key: u8| -> String {
        if keyed {
            body_string(&crypt::decrypt(&wire, key))
        } else {
            body_string(&wire)
        }
    };

    for target in parse_targets(msg.params[0].as_str()) {
        // Nick target.
        if !target.nick.is_empty() {
            if let Some(recipient_uid) = ctx.matrix.lookup_nick(&target.nick) {
                let recipient_arc = match ctx.matrix.client(recipient_uid) {
                    Some(c) => c,
                    None => continue,
                };
                let recipient = recipient_arc.read().await;
                if noisy {
                    if let Some(ref away) = recipient.away {
                        ctx.numeric_trailing(Response::RPL_AWAY, &[&recipient.nick, away])?;
                        continue;
                    }
                }
                let text = render(recipient.has_pass, recipient.crypt_key);
                ctx.matrix.send_to(
                    recipient_uid,
                    user_message(
                        &nick,
                        &user,
                        &host,
                        command,
                        vec![recipient.nick.clone(), text],
                    )
                    .trailing(),
                );
                trace!(from = %nick, to = %recipient.nick, "message delivered");
                continue;
            }
        }

        // Channel target.
        if target.is_channel() {
            if let Some(channel_arc) = ctx.matrix.channel(&target.channel) {
                let channel = channel_arc.read().await;
                let member = channel.member_modes(ctx.uid);

                if channel.modes.no_outside && member.is_none() {
                    if noisy {
                        ctx.numeric(
                            Response::ERR_CANNOTSENDTOCHAN,
                            &[&channel.name, "Cannot send to channel."],
                        )?;
                    }
                    continue;
                }
                if channel.modes.moderated && !member.is_some_and(|m| m.can_speak()) {
                    if noisy {
                        ctx.numeric(
                            Response::ERR_CANNOTSENDTOCHAN,
                            &[&channel.name, "Cannot send to channel."],
                        )?;
                    }
                    continue;
                }

                for m in &channel.members {
                    if m.uid == ctx.uid {
                        continue;
                    }
                    let recipient_arc = match ctx.matrix.client(m.uid) {
                        Some(c) => c,
                        None => continue,
                    };
                    let (keyed, key) = {
                        let recipient = recipient_arc.read().await;
                        (recipient.has_pass, recipient.crypt_key)
                    };
                    ctx.matrix.send_to(
                        m.uid,
                        user_message(
                            &nick,
                            &user,
                            &host,
                            command,
                            vec![channel.name.clone(), render(keyed, key)],
                        )
                        .trailing(),
                    );
                }
                continue;
            }
        }

        // Nothing resolved.
        if noisy {
            ctx.no_such_nick(target.display_name())?;
        }
    }

    Ok(())
}

/// Handler for PRIVMSG.
pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        deliver(ctx, msg, "PRIVMSG").await
    }
}

/// Handler for NOTICE.
pub struct NoticeHandler;

#[async_trait]
impl Handler for NoticeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        deliver(ctx, msg, "NOTICE").await
    }
}
