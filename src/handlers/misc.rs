//! AWAY, OPER, KILL and the client-side ERROR.

use super::{Context, Handler};
use crate::auth::{check_oper, OperCheck};
use crate::error::HandlerResult;
use async_trait::async_trait;
use ember_proto::{Message, Response};
use std::sync::atomic::Ordering;
use tracing::{info, warn};

/// Handler for AWAY.
pub struct AwayHandler;

#[async_trait]
impl Handler for AwayHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let client_arc = match ctx.matrix.client(ctx.uid) {
            Some(c) => c,
            None => return Ok(()),
        };

        match msg.arg(0).filter(|text| !text.is_empty()) {
            Some(text) => {
                client_arc.write().await.away = Some(text.to_string());
                ctx.numeric(
                    Response::RPL_NOWAWAY,
                    &["You have been marked as being away"],
                )
            }
            None => {
                client_arc.write().await.away = None;
                ctx.numeric(
                    Response::RPL_UNAWAY,
                    &["You are no longer marked as being away"],
                )
            }
        }
    }
}

/// Handler for OPER.
pub struct OperHandler;

#[async_trait]
impl Handler for OperHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (name, password) = match (msg.arg(0), msg.arg(1)) {
            (Some(n), Some(p)) => (n, p),
            _ => return ctx.need_more_params("OPER"),
        };

        let client_arc = match ctx.matrix.client(ctx.uid) {
            Some(c) => c,
            None => return Ok(()),
        };
        let (user, host) = {
            let client = client_arc.read().await;
            (client.user.clone(), client.host.clone())
        };

        match check_oper(ctx.matrix.oper_lines(), name, password, &user, &host) {
            OperCheck::Ok(line) => {
                {
                    let mut client = client_arc.write().await;
                    if !client.modes.oper {
                        client.modes.oper = true;
                        ctx.matrix.operators.fetch_add(1, Ordering::SeqCst);
                    }
                }
                info!(nick = %ctx.display_nick(), oper = %line.nick, local = line.local, "operator authenticated");
                ctx.numeric(Response::RPL_YOUREOPER, &["You are now an IRC operator"])
            }
            OperCheck::BadPassword => {
                ctx.numeric(Response::ERR_PASSWDMISMATCH, &["Password incorrect"])
            }
            OperCheck::NoOperHost => {
                ctx.numeric(Response::ERR_NOOPERHOST, &["No O-lines for your host"])
            }
        }
    }
}

/// Handler for KILL.
pub struct KillHandler;

#[async_trait]
impl Handler for KillHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (target, comment) = match (msg.arg(0), msg.arg(1)) {
            (Some(t), Some(c)) => (t.to_string(), c.to_string()),
            _ => return ctx.need_more_params("KILL"),
        };

        let is_oper = match ctx.matrix.client(ctx.uid) {
            Some(c) => c.read().await.modes.oper,
            None => false,
        };
        if !is_oper {
            return ctx.numeric(
                Response::ERR_NOPRIVILEGES,
                &["Permission Denied- You're not an IRC operator"],
            );
        }

        if ember_proto::irc_eq(&target, &ctx.matrix.server_info.name) {
            return ctx.numeric(
                Response::ERR_CANTKILLSERVER,
                &["You cant kill a server!"],
            );
        }

        let victim = match ctx.matrix.lookup_nick(&target) {
            Some(uid) => uid,
            None => return ctx.no_such_nick(&target),
        };

        let reason = format!("Killed ({} ({}))", ctx.display_nick(), comment);
        ctx.matrix.disconnect_user(victim, &reason).await;
        info!(target = %target, by = %ctx.display_nick(), "client killed");
        Ok(())
    }
}

/// Handler for ERROR from a client: logged, never answered.
pub struct ErrorHandler;

#[async_trait]
impl Handler for ErrorHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        warn!(uid = ctx.uid, error = %msg.arg(0).unwrap_or(""), "client sent ERROR");
        Ok(())
    }
}
