//! Server queries: MOTD, LUSERS, VERSION, TIME, ADMIN, STATS.

use super::{Context, Handler};
use crate::error::HandlerResult;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use ember_proto::{irc_eq, Message, Response};
use std::sync::atomic::Ordering;

/// Check an optional trailing server argument; only our own host exists.
fn check_server_arg(ctx: &Context<'_>, arg: Option<&str>) -> Result<bool, crate::error::HandlerError> {
    if let Some(server) = arg {
        if !irc_eq(server, &ctx.matrix.server_info.name) {
            ctx.numeric(Response::ERR_NOSUCHSERVER, &[server, "No such server"])?;
            return Ok(false);
        }
    }
    Ok(true)
}

/// The LUSERS block, also part of the welcome burst.
pub(super) fn send_lusers(ctx: &Context<'_>) -> HandlerResult {
    let users = ctx.matrix.users.len();
    let invisibles = ctx.matrix.invisibles.load(Ordering::SeqCst);
    let operators = ctx.matrix.operators.load(Ordering::SeqCst);
    let channels = ctx.matrix.channels.len();

    ctx.numeric(
        Response::RPL_LUSERCLIENT,
        &[&format!(
            "There are {} users and {} invisible on 1 servers",
            users, invisibles
        )],
    )?;
    ctx.numeric(
        Response::RPL_LUSEROP,
        &[&operators.to_string(), "operators online"],
    )?;
    ctx.numeric(
        Response::RPL_LUSERCHANNELS,
        &[&channels.to_string(), "channels formed"],
    )?;
    ctx.numeric(
        Response::RPL_LUSERME,
        &[&format!("I have {} clients and 1 servers", users)],
    )
}

/// The MOTD block, also part of the welcome burst.
pub(super) fn send_motd(ctx: &Context<'_>) -> HandlerResult {
    let server = ctx.matrix.server_info.name.clone();
    let (lines, modified) = match ctx.matrix.motd.read() {
        Some(found) => found,
        None => {
            return ctx.numeric(Response::ERR_NOMOTD, &["MOTD File is missing"]);
        }
    };

    let stamp: DateTime<Local> = modified.into();
    ctx.send(Message::new(
        None,
        "NOTICE",
        vec![
            ctx.display_nick(),
            format!(
                "*** The MOTD file was last modified at {}",
                stamp.format("%a %b %e %H:%M:%S %Y")
            ),
        ],
    ))?;
    ctx.numeric(
        Response::RPL_MOTDSTART,
        &[&format!("- Message of the day - {} -", server)],
    )?;
    for line in &lines {
        ctx.numeric(Response::RPL_MOTD, &[&format!("- {}", line)])?;
    }
    ctx.numeric(Response::RPL_ENDOFMOTD, &["End of /MOTD command"])
}

/// Handler for MOTD.
pub struct MotdHandler;

#[async_trait]
impl Handler for MotdHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        send_motd(ctx)
    }
}

/// Handler for LUSERS.
pub struct LusersHandler;

#[async_trait]
impl Handler for LusersHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        send_lusers(ctx)
    }
}

/// Handler for VERSION.
pub struct VersionHandler;

#[async_trait]
impl Handler for VersionHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if !check_server_arg(ctx, msg.arg(0))? {
            return Ok(());
        }
        let info = &ctx.matrix.server_info;
        ctx.numeric(
            Response::RPL_VERSION,
            &[&info.version, &info.name, "place a version comment here"],
        )
    }
}

/// Handler for TIME.
pub struct TimeHandler;

#[async_trait]
impl Handler for TimeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if !check_server_arg(ctx, msg.arg(0))? {
            return Ok(());
        }
        let now = Local::now().format("%a %b %e %H:%M:%S %Y").to_string();
        let server = ctx.matrix.server_info.name.clone();
        ctx.numeric(Response::RPL_TIME, &[&server, &now])
    }
}

/// Handler for ADMIN.
pub struct AdminHandler;

#[async_trait]
impl Handler for AdminHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if !check_server_arg(ctx, msg.arg(0))? {
            return Ok(());
        }
        let server = ctx.matrix.server_info.name.clone();
        let admin = ctx.matrix.admin().clone();
        ctx.numeric(Response::RPL_ADMINME, &[&server, &admin.info])?;
        ctx.numeric(Response::RPL_ADMINLOC1, &[&admin.location])?;
        ctx.numeric(Response::RPL_ADMINEMAIL, &[&admin.email])
    }
}

/// Handler for STATS. Only the `u` (uptime) query has content; other
/// letters return the bare terminator.
pub struct StatsHandler;

#[async_trait]
impl Handler for StatsHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let query = match msg.arg(0) {
            Some(q) => q.to_string(),
            None => {
                return ctx.numeric(Response::RPL_ENDOFSTATS, &["*", "End of /STATS report"]);
            }
        };
        if !check_server_arg(ctx, msg.arg(1))? {
            return Ok(());
        }

        if query.starts_with('u') {
            let uptime = ctx.matrix.started.elapsed().as_secs();
            let days = uptime / 86_400;
            let hours = (uptime % 86_400) / 3_600;
            let minutes = (uptime % 3_600) / 60;
            let seconds = uptime % 60;
            ctx.numeric(
                Response::RPL_STATSUPTIME,
                &[&format!(
                    "Server Up {} days {}:{:02}:{:02}",
                    days, hours, minutes, seconds
                )],
            )?;
        }

        let letter: String = query.chars().take(1).collect();
        ctx.numeric(Response::RPL_ENDOFSTATS, &[&letter, "End of /STATS report"])
    }
}
