//! OPER, KILL, and the K/I-line gauntlet at registration.

mod common;

use common::TestServer;
use std::time::Duration;

#[tokio::test]
async fn oper_grants_operator_status() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;

    alice.send_raw("OPER root oppass").await?;
    let reply = alice.expect_numeric(381).await?;
    assert_eq!(reply.params[1], "You are now an IRC operator");

    alice.send_raw("LUSERS").await?;
    alice.expect_numeric(251).await?;
    let opers = alice.expect_numeric(252).await?;
    assert_eq!(opers.params[1], "1");

    // WHOIS now carries the operator line.
    let mut bob = server.register("bob").await?;
    bob.send_raw("WHOIS alice").await?;
    let replies = bob.recv_until(|m| m.command == "318").await?;
    assert!(replies.iter().any(|m| m.command == "313"));
    Ok(())
}

#[tokio::test]
async fn oper_rejects_bad_credentials() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;

    alice.send_raw("OPER root wrong").await?;
    alice.expect_numeric(464).await?;

    alice.send_raw("OPER nobody oppass").await?;
    alice.expect_numeric(491).await?;
    Ok(())
}

#[tokio::test]
async fn kill_disconnects_target_with_fanout() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    let mut carol = server.register("carol").await?;
    bob.join("#dev").await?;
    carol.join("#dev").await?;
    bob.expect_command("JOIN").await?;

    alice.send_raw("OPER root oppass").await?;
    alice.expect_numeric(381).await?;

    alice.send_raw("KILL bob :spamming").await?;
    let error = bob.expect_command("ERROR").await?;
    assert!(error.params[0].contains("Killed (alice (spamming))"));

    let quit = carol.expect_command("QUIT").await?;
    assert_eq!(quit.params[0], "Killed (alice (spamming))");

    // The nick is gone.
    alice.send_raw("PRIVMSG bob :there?").await?;
    alice.expect_numeric(401).await?;
    Ok(())
}

#[tokio::test]
async fn kill_requires_operator_and_target() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let _bob = server.register("bob").await?;

    alice.send_raw("KILL bob :grudge").await?;
    alice.expect_numeric(481).await?;

    alice.send_raw("OPER root oppass").await?;
    alice.expect_numeric(381).await?;
    alice.send_raw("KILL ghost :whoever").await?;
    alice.expect_numeric(401).await?;
    alice.send_raw("KILL irc.test :oops").await?;
    alice.expect_numeric(483).await?;
    Ok(())
}

const KLINE_CONFIG: &str = r#"
[listen]
address = "127.0.0.1:0"

[lines]
m = "M:irc.test:localhost:Ember test server:6667"
y = ["Y:1:90:0:100:100000"]
i = ["I:*@*::*@*::1"]
k = ["K:*:0000-2359:*"]
"#;

#[tokio::test]
async fn kline_bans_at_registration() -> anyhow::Result<()> {
    let server = TestServer::spawn_with_config(KLINE_CONFIG).await?;
    let mut client = server.connect("victim").await?;
    client.send_raw("NICK victim").await?;
    client.send_raw("USER victim 0 * :V").await?;

    let reply = client.expect_numeric(465).await?;
    assert_eq!(reply.params[1], "You are banned from this server");

    // And the connection goes away.
    let mut closed = false;
    for _ in 0..10 {
        if client.recv_timeout(Duration::from_millis(500)).await.is_err() {
            closed = true;
            break;
        }
    }
    assert!(closed);
    Ok(())
}

const ILINE_PASSWORD_CONFIG: &str = r#"
[listen]
address = "127.0.0.1:0"

[lines]
m = "M:irc.test:localhost:Ember test server:6667"
y = ["Y:1:90:0:100:100000"]
i = ["I:*@*:letmein:*@*::1"]
"#;

#[tokio::test]
async fn i_line_password_is_enforced() -> anyhow::Result<()> {
    let server = TestServer::spawn_with_config(ILINE_PASSWORD_CONFIG).await?;

    let mut wrong = server.connect("alice").await?;
    wrong.send_raw("PASS nope").await?;
    wrong.send_raw("NICK alice").await?;
    wrong.send_raw("USER alice 0 * :A").await?;
    wrong.expect_numeric(464).await?;

    let mut right = server.connect("bob").await?;
    right.send_raw("PASS letmein").await?;
    right.send_raw("NICK bob").await?;
    right.send_raw("USER bob 0 * :B").await?;
    right
        .recv_until(|m| m.command == "376" || m.command == "422")
        .await?;
    Ok(())
}

const TINY_CLASS_CONFIG: &str = r#"
[listen]
address = "127.0.0.1:0"

[lines]
m = "M:irc.test:localhost:Ember test server:6667"
y = ["Y:1:90:0:1:100000"]
i = ["I:*@*::*@*::1"]
"#;

#[tokio::test]
async fn connection_class_limits_links() -> anyhow::Result<()> {
    let server = TestServer::spawn_with_config(TINY_CLASS_CONFIG).await?;
    let _alice = server.register("alice").await?;

    // The class is full: the second client is dropped without a burst.
    let mut bob = server.connect("bob").await?;
    bob.send_raw("NICK bob").await?;
    bob.send_raw("USER bob 0 * :B").await?;
    let mut closed = false;
    for _ in 0..10 {
        match bob.recv_timeout(Duration::from_secs(1)).await {
            Ok(msg) => assert_ne!(msg.command, "001"),
            Err(_) => {
                closed = true;
                break;
            }
        }
    }
    assert!(closed);

    // A departure frees the slot.
    drop(_alice);
    Ok(())
}
