//! MODE in both flavors: channel modes, member status, bans, user modes.

mod common;

use common::TestServer;
use std::time::Duration;

#[tokio::test]
async fn moderated_channel_needs_voice() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    alice.send_raw("MODE #dev +m").await?;
    let mode = bob.expect_command("MODE").await?;
    assert_eq!(mode.params[1], "+m");
    alice.expect_command("MODE").await?;

    // Voiceless bob is refused; alice hears nothing.
    bob.send_raw("PRIVMSG #dev :hi").await?;
    let refusal = bob.expect_numeric(404).await?;
    assert_eq!(refusal.params[1], "#dev");
    assert_eq!(refusal.params[2], "Cannot send to channel.");
    alice.expect_silence(Duration::from_millis(300)).await?;

    // With +v the message goes through.
    alice.send_raw("MODE #dev +v bob").await?;
    let voice = bob.expect_command("MODE").await?;
    assert_eq!(voice.params[1], "+v");
    assert_eq!(voice.params[2], "bob");
    alice.expect_command("MODE").await?;

    bob.send_raw("PRIVMSG #dev :hi").await?;
    let msg = alice.expect_command("PRIVMSG").await?;
    assert_eq!(msg.params[0], "#dev");
    assert_eq!(msg.params[1], "hi");
    Ok(())
}

#[tokio::test]
async fn ban_blocks_rejoin() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    alice.send_raw("MODE #dev +b bob!*@*").await?;
    bob.expect_command("MODE").await?;
    alice.expect_command("MODE").await?;

    bob.send_raw("PART #dev").await?;
    bob.expect_command("PART").await?;
    alice.expect_command("PART").await?;

    bob.send_raw("JOIN #dev").await?;
    let refusal = bob.expect_numeric(474).await?;
    assert_eq!(refusal.params[2], "Cannot join channel (+b)");
    // No fan-out reached the remaining member.
    alice.expect_silence(Duration::from_millis(300)).await?;

    // Lifting the ban lets bob back in.
    alice.send_raw("MODE #dev -b bob!*@*").await?;
    alice.expect_command("MODE").await?;
    bob.join("#dev").await?;
    Ok(())
}

#[tokio::test]
async fn ban_list_query() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    alice.join("#dev").await?;

    alice.send_raw("MODE #dev +b troll!*@*.bad.net").await?;
    alice.expect_command("MODE").await?;

    alice.send_raw("MODE #dev b").await?;
    let entry = alice.expect_numeric(367).await?;
    assert_eq!(entry.params[1], "#dev");
    assert_eq!(entry.params[2], "troll!*@*.bad.net");
    assert!(entry.params[3].starts_with("alice!"));
    alice.expect_numeric(368).await?;
    Ok(())
}

#[tokio::test]
async fn channel_key_gates_join() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;

    alice.send_raw("MODE #dev +k sekrit").await?;
    let mode = alice.expect_command("MODE").await?;
    assert_eq!(mode.params[1], "+k");
    assert_eq!(mode.params[2], "sekrit");

    bob.send_raw("JOIN #dev").await?;
    bob.expect_numeric(475).await?;
    bob.send_raw("JOIN #dev wrong").await?;
    bob.expect_numeric(475).await?;
    bob.send_raw("JOIN #dev sekrit").await?;
    bob.recv_until(|m| m.command == "366").await?;

    // Setting a key over an existing one is refused.
    alice.send_raw("MODE #dev +k other").await?;
    alice.expect_numeric(467).await?;
    Ok(())
}

#[tokio::test]
async fn user_limit_fills_channel() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;

    alice.send_raw("MODE #dev +l 1").await?;
    let mode = alice.expect_command("MODE").await?;
    assert_eq!(mode.params[1], "+l");
    assert_eq!(mode.params[2], "1");

    bob.send_raw("JOIN #dev").await?;
    let refusal = bob.expect_numeric(471).await?;
    assert_eq!(refusal.params[2], "Cannot join channel (+l)");

    alice.send_raw("MODE #dev -l").await?;
    alice.expect_command("MODE").await?;
    bob.join("#dev").await?;
    Ok(())
}

#[tokio::test]
async fn mode_query_renders_flags_and_limit() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    alice.join("#dev").await?;

    alice.send_raw("MODE #dev +mn").await?;
    alice.expect_command("MODE").await?;
    alice.expect_command("MODE").await?;
    alice.send_raw("MODE #dev +l 25").await?;
    alice.expect_command("MODE").await?;

    alice.send_raw("MODE #dev").await?;
    let reply = alice.expect_numeric(324).await?;
    assert_eq!(reply.params[1], "#dev");
    assert_eq!(reply.params[2], "+nml");
    assert_eq!(reply.params[3], "25");
    Ok(())
}

#[tokio::test]
async fn op_grant_and_revoke() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    // Non-ops cannot change modes.
    bob.send_raw("MODE #dev +s").await?;
    bob.expect_numeric(482).await?;

    alice.send_raw("MODE #dev +o bob").await?;
    let grant = bob.expect_command("MODE").await?;
    assert_eq!(grant.params[1], "+o");
    assert_eq!(grant.params[2], "bob");
    alice.expect_command("MODE").await?;

    // Bob can now operate, and can deop alice.
    bob.send_raw("MODE #dev -o alice").await?;
    let revoke = alice.expect_command("MODE").await?;
    assert_eq!(revoke.params[1], "-o");
    alice.send_raw("MODE #dev +t").await?;
    alice.expect_numeric(482).await?;
    Ok(())
}

#[tokio::test]
async fn mode_for_absent_member_draws_401() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let _bob = server.register("bob").await?;
    alice.join("#dev").await?;

    alice.send_raw("MODE #dev +o ghost").await?;
    alice.expect_numeric(401).await?;
    // A registered nick outside the channel is just as absent.
    alice.send_raw("MODE #dev +v bob").await?;
    alice.expect_numeric(401).await?;
    Ok(())
}

#[tokio::test]
async fn unknown_mode_letter_draws_472() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    alice.join("#dev").await?;
    alice.send_raw("MODE #dev +z").await?;
    let reply = alice.expect_numeric(472).await?;
    assert_eq!(reply.params[1], "z");
    Ok(())
}

#[tokio::test]
async fn user_modes_toggle_and_report() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;

    alice.send_raw("MODE alice +iw").await?;
    let first = alice.expect_command("MODE").await?;
    assert_eq!(first.params[1], "+i");
    let second = alice.expect_command("MODE").await?;
    assert_eq!(second.params[1], "+w");

    alice.send_raw("MODE alice").await?;
    let report = alice.expect_numeric(221).await?;
    assert_eq!(report.params[2], "+iw");

    // +o is silently ignored; only OPER grants it.
    alice.send_raw("MODE alice +o").await?;
    alice.send_raw("MODE alice").await?;
    let report = alice.expect_numeric(221).await?;
    assert_eq!(report.params[2], "+iw");

    alice.send_raw("MODE alice -i").await?;
    alice.expect_command("MODE").await?;
    Ok(())
}

#[tokio::test]
async fn user_mode_on_other_draws_502() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let _bob = server.register("bob").await?;

    alice.send_raw("MODE bob +i").await?;
    let reply = alice.expect_numeric(502).await?;
    assert_eq!(reply.params[1], "Cant change mode for other users");
    Ok(())
}

#[tokio::test]
async fn invisible_counter_tracks_mode_changes() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;

    alice.send_raw("MODE alice +i").await?;
    alice.expect_command("MODE").await?;
    alice.send_raw("LUSERS").await?;
    let reply = alice.expect_numeric(251).await?;
    assert!(reply.params[1].contains("1 invisible"));

    alice.send_raw("MODE alice -i").await?;
    alice.expect_command("MODE").await?;
    alice.send_raw("LUSERS").await?;
    let reply = alice.expect_numeric(251).await?;
    assert!(reply.params[1].contains("0 invisible"));
    Ok(())
}
