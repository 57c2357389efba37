//! JOIN/PART/KICK/INVITE/TOPIC flows and channel lifetime.

mod common;

use common::TestServer;
use std::time::Duration;

#[tokio::test]
async fn join_creates_channel_with_full_reply_block() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;

    alice.send_raw("JOIN #dev").await?;
    let replies = alice.recv_until(|m| m.command == "366").await?;

    // Echo first, then 331, 329, 353, 366 in order.
    let commands: Vec<&str> = replies.iter().map(|m| m.command.as_str()).collect();
    assert_eq!(commands, vec!["JOIN", "331", "329", "353", "366"]);

    let join = &replies[0];
    match &join.prefix {
        Some(ember_proto::Prefix::Nickname(nick, user, _host)) => {
            assert_eq!(nick, "alice");
            assert_eq!(user, "~alice");
        }
        other => panic!("unexpected join prefix: {:?}", other),
    }
    assert_eq!(join.params[0], "#dev");

    assert_eq!(replies[1].params[2], "No topic is set");
    assert_eq!(replies[2].params[1], "#dev");

    let names = &replies[3];
    assert_eq!(names.params[1], "=");
    assert_eq!(names.params[2], "#dev");
    assert_eq!(names.params[3], "@alice");

    assert_eq!(replies[4].params[1], "#dev");
    assert_eq!(replies[4].params[2], "End of /NAMES list");
    Ok(())
}

#[tokio::test]
async fn second_member_join_echoes_to_both() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;

    alice.join("#dev").await?;
    bob.send_raw("JOIN #dev").await?;
    let replies = bob.recv_until(|m| m.command == "366").await?;

    // Bob's NAMES shows the op and himself.
    let names = replies.iter().find(|m| m.command == "353").unwrap();
    let list = &names.params[3];
    assert!(list.contains("@alice"));
    assert!(list.contains("bob"));

    let join = alice.expect_command("JOIN").await?;
    assert_eq!(join.params[0], "#dev");
    Ok(())
}

#[tokio::test]
async fn part_fans_out_and_empty_channel_dies() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    bob.send_raw("PART #dev :offline").await?;
    let part = alice.expect_command("PART").await?;
    assert_eq!(part.params[0], "#dev");
    assert_eq!(part.params[1], "offline");
    // The parting member sees their own echo too.
    bob.expect_command("PART").await?;

    alice.send_raw("PART #dev").await?;
    alice.expect_command("PART").await?;

    // Last member gone: the channel no longer exists.
    assert!(server.matrix().channels.is_empty());

    // Rejoining creates it afresh, with operator status.
    alice.send_raw("JOIN #dev").await?;
    let replies = alice.recv_until(|m| m.command == "366").await?;
    let names = replies.iter().find(|m| m.command == "353").unwrap();
    assert_eq!(names.params[3], "@alice");
    Ok(())
}

#[tokio::test]
async fn part_without_membership_draws_442() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;

    bob.send_raw("PART #dev").await?;
    bob.expect_numeric(442).await?;
    bob.send_raw("PART #nowhere").await?;
    bob.expect_numeric(403).await?;
    Ok(())
}

#[tokio::test]
async fn topic_set_and_query() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    alice.send_raw("TOPIC #dev :release at dawn").await?;
    let topic = bob.expect_command("TOPIC").await?;
    assert_eq!(topic.params[1], "release at dawn");
    alice.expect_command("TOPIC").await?;

    bob.send_raw("TOPIC #dev").await?;
    let reply = bob.expect_numeric(332).await?;
    assert_eq!(reply.params[2], "release at dawn");
    let setter = bob.expect_numeric(333).await?;
    assert_eq!(setter.params[2], "alice");

    // A later joiner sees the topic in the join block.
    let mut carol = server.register("carol").await?;
    carol.send_raw("JOIN #dev").await?;
    let replies = carol.recv_until(|m| m.command == "366").await?;
    assert!(replies.iter().any(|m| m.command == "332"));
    Ok(())
}

#[tokio::test]
async fn topic_locked_requires_op() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    alice.send_raw("MODE #dev +t").await?;
    bob.expect_command("MODE").await?;

    bob.send_raw("TOPIC #dev :my topic").await?;
    bob.expect_numeric(482).await?;
    Ok(())
}

#[tokio::test]
async fn kick_removes_victim() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    alice.send_raw("KICK #dev bob :misbehaving").await?;
    let kick = bob.expect_command("KICK").await?;
    assert_eq!(kick.params[0], "#dev");
    assert_eq!(kick.params[1], "bob");
    assert_eq!(kick.params[2], "misbehaving");

    // Bob is out: speaking draws the outside-messages error once +n is on.
    alice.send_raw("MODE #dev +n").await?;
    alice.expect_command("MODE").await?;
    bob.send_raw("PRIVMSG #dev :still here?").await?;
    bob.expect_numeric(404).await?;
    Ok(())
}

#[tokio::test]
async fn kick_requires_operator() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    bob.send_raw("KICK #dev alice").await?;
    bob.expect_numeric(482).await?;
    Ok(())
}

#[tokio::test]
async fn invite_only_channel_needs_single_use_invite() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#vip").await?;
    alice.send_raw("MODE #vip +i").await?;
    alice.expect_command("MODE").await?;

    bob.send_raw("JOIN #vip").await?;
    bob.expect_numeric(473).await?;

    alice.send_raw("INVITE bob #vip").await?;
    let invite = bob.expect_command("INVITE").await?;
    assert_eq!(invite.params[0], "bob");
    assert_eq!(invite.params[1], "#vip");

    bob.join("#vip").await?;
    alice.expect_command("JOIN").await?;

    // The invitation was consumed: a rejoin is blocked again.
    bob.send_raw("PART #vip").await?;
    bob.expect_command("PART").await?;
    alice.expect_command("PART").await?;
    bob.send_raw("JOIN #vip").await?;
    bob.expect_numeric(473).await?;
    Ok(())
}

#[tokio::test]
async fn invite_rules() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    let mut carol = server.register("carol").await?;
    alice.join("#dev").await?;
    bob.join("#dev").await?;
    alice.expect_command("JOIN").await?;

    // Inviting someone already present.
    alice.send_raw("INVITE bob #dev").await?;
    alice.expect_numeric(443).await?;

    // Only channel operators may invite.
    bob.send_raw("INVITE carol #dev").await?;
    bob.expect_numeric(482).await?;

    // Unknown nick.
    alice.send_raw("INVITE ghost #dev").await?;
    alice.expect_numeric(401).await?;

    // An away target answers with RPL_AWAY instead of being invited.
    carol.send_raw("AWAY :brb").await?;
    carol.expect_numeric(306).await?;
    alice.send_raw("INVITE carol #dev").await?;
    let away = alice.expect_numeric(301).await?;
    assert_eq!(away.params[1], "carol");
    assert_eq!(away.params[2], "brb");
    carol
        .expect_silence(Duration::from_millis(300))
        .await?;
    Ok(())
}

#[tokio::test]
async fn channel_members_stay_consistent() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let mut alice = server.register("alice").await?;
    let mut bob = server.register("bob").await?;
    alice.join("#a").await?;
    alice.join("#b").await?;
    bob.join("#a").await?;
    alice.expect_command("JOIN").await?;

    // White-box: membership is mirrored on both sides.
    let matrix = server.matrix();
    for entry in matrix.channels.iter() {
        let channel = entry.value().read().await;
        for member in &channel.members {
            let client = matrix.client(member.uid).expect("member registered");
            assert!(client.read().await.channels.contains(entry.key()));
        }
    }
    for entry in matrix.users.iter() {
        let client = entry.value().read().await;
        for name in &client.channels {
            let channel = matrix.channel(name).expect("channel exists");
            assert!(channel.read().await.is_member(client.uid));
        }
    }
    Ok(())
}
