//! Test IRC client.
//!
//! Reads raw lines byte-transparently (the server's crypt can put
//! arbitrary bytes on the wire) and parses them with ember-proto.

#![allow(dead_code)]

use ember_proto::Message;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A test IRC client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    nick: String,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(addr: SocketAddr, nick: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            nick: nick.to_string(),
        })
    }

    /// Send a raw IRC line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        let mut bytes: Vec<u8> = line
            .chars()
            .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
            .collect();
        bytes.extend_from_slice(b"\r\n");
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single message.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(Duration::from_secs(10)).await
    }

    /// Receive a message with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut buf = Vec::new();
        let n = timeout(dur, self.reader.read_until(b'\n', &mut buf)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        let line: String = buf.iter().map(|&b| b as char).collect();
        Ok(Message::parse(line.trim_end_matches(['\r', '\n'])))
    }

    /// Receive until the predicate matches; returns everything read.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = predicate(&msg);
            messages.push(msg);
            if done {
                break;
            }
        }
        Ok(messages)
    }

    /// Receive until a numeric reply with the given code arrives.
    pub async fn expect_numeric(&mut self, code: u16) -> anyhow::Result<Message> {
        let messages = self
            .recv_until(|msg| msg.command == format!("{:03}", code))
            .await?;
        Ok(messages.into_iter().last().unwrap())
    }

    /// Receive until a given command (e.g. `JOIN`) arrives.
    pub async fn expect_command(&mut self, command: &str) -> anyhow::Result<Message> {
        let messages = self
            .recv_until(|msg| msg.command.eq_ignore_ascii_case(command))
            .await?;
        Ok(messages.into_iter().last().unwrap())
    }

    /// Assert that nothing arrives within the window.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Ok(msg) => anyhow::bail!("expected silence, got: {}", msg),
            Err(_) => Ok(()),
        }
    }

    /// Register with the server (NICK + USER) and wait for the welcome
    /// burst to finish.
    pub async fn register(&mut self) -> anyhow::Result<()> {
        let nick = self.nick.clone();
        self.send_raw(&format!("NICK {}", nick)).await?;
        self.send_raw(&format!("USER {} 0 * :Test User {}", nick, nick))
            .await?;
        // The burst ends with 376 (MOTD served) or 422 (no MOTD file).
        self.recv_until(|msg| msg.command == "376" || msg.command == "422")
            .await?;
        Ok(())
    }

    /// Join a channel and wait for the end of the NAMES block.
    pub async fn join(&mut self, channel: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("JOIN {}", channel)).await?;
        self.expect_numeric(366).await?;
        Ok(())
    }

    /// Send a PRIVMSG.
    pub async fn privmsg(&mut self, target: &str, text: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("PRIVMSG {} :{}", target, text)).await
    }

    /// Send QUIT.
    pub async fn quit(&mut self, reason: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("QUIT :{}", reason)).await
    }
}
