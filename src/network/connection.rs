//! One client connection: line framing, dispatch, the idle watchdog and
//! teardown.
//!
//! The task owns both socket halves and multiplexes reading, the outgoing
//! queue, lookup results and the watchdog in one `select!` loop. The
//! transport is byte-transparent: each wire byte maps to one char in the
//! parsed strings, so the message crypt survives byte-exactly.

use crate::error::HandlerError;
use crate::handlers::{complete_registration, Context, HandshakeState, Registry};
use crate::lookup::{self, LookupEvent};
use crate::state::{Matrix, Uid};
use ember_proto::{Message, MAX_LINE_LEN};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace};

/// Decode one wire line, one char per byte.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode chars back to wire bytes; chars above 0xFF cannot occur on this
/// path.
fn latin1_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' }).collect()
}

/// Write one line, truncated to the protocol limit.
async fn write_line(write_half: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    let mut bytes = latin1_bytes(line);
    bytes.truncate(MAX_LINE_LEN - 2);
    bytes.extend_from_slice(b"\r\n");
    write_half.write_all(&bytes).await
}

/// A client connection handler.
pub struct Connection {
    uid: Uid,
    stream: TcpStream,
    addr: SocketAddr,
    matrix: Arc<Matrix>,
    registry: Arc<Registry>,
}

/// Why the main loop ended.
enum Exit {
    /// Clean QUIT with a reason.
    Quit(String),
    /// Peer vanished or flooded; reason is implied.
    ConnectionLost,
    /// Watchdog gave up on a silent peer.
    PingTimeout,
    /// Another task already tore the client down (KILL), or PASS failed.
    Silent,
}

impl Connection {
    pub fn new(
        uid: Uid,
        stream: TcpStream,
        addr: SocketAddr,
        matrix: Arc<Matrix>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            uid,
            stream,
            addr,
            matrix,
            registry,
        }
    }

    /// Run the connection to completion.
    #[instrument(skip(self), fields(uid = %self.uid, addr = %self.addr), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let Connection {
            uid,
            stream,
            addr,
            matrix,
            registry,
        } = self;

        let local_addr = stream.local_addr()?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (lookup_tx, mut lookup_rx) = mpsc::unbounded_channel::<LookupEvent>();
        lookup::spawn(addr, local_addr, lookup_tx);

        write_line(&mut write_half, "NOTICE AUTH :*** Looking up your hostname").await?;
        write_line(&mut write_half, "NOTICE AUTH :*** Checking Ident").await?;

        let mut handshake = HandshakeState::default();
        let ip = addr.ip().to_string();
        let ping_interval = matrix.ping_interval;
        let mut last_recv = Instant::now();
        let mut ping_missed = 0u32;
        let mut buf: Vec<u8> = Vec::new();

        let exit = loop {
            // Killed from elsewhere: drain the queue (it ends with the
            // killer's ERROR line) and leave.
            if handshake.registered && !matrix.users.contains_key(&uid) {
                while let Ok(msg) = outgoing_rx.try_recv() {
                    let _ = write_line(&mut write_half, &msg.to_string()).await;
                }
                break Exit::Silent;
            }

            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => {
                    match read {
                        Ok(0) => break Exit::ConnectionLost,
                        Ok(_) => {}
                        Err(e) => {
                            debug!(error = %e, "read failed");
                            break Exit::ConnectionLost;
                        }
                    }
                    if buf.len() > MAX_LINE_LEN {
                        buf.truncate(MAX_LINE_LEN);
                    }
                    let line = latin1(&buf);
                    buf.clear();
                    last_recv = Instant::now();
                    ping_missed = 0;

                    let line = line.trim_end_matches(['\r', '\n']);
                    if line.is_empty() {
                        continue;
                    }
                    trace!(line = %line, "recv");
                    let msg = Message::parse(line);

                    let mut ctx = Context {
                        uid,
                        matrix: &matrix,
                        sender: &outgoing_tx,
                        handshake: &mut handshake,
                    };
                    let result = match registry.dispatch(&mut ctx, &msg).await {
                        Ok(()) if !ctx.handshake.registered => {
                            complete_registration(&mut ctx, &ip).await
                        }
                        other => other,
                    };
                    match result {
                        Ok(()) => {}
                        Err(HandlerError::Quit(reason)) => break Exit::Quit(reason),
                        Err(HandlerError::Drop) => break Exit::Silent,
                        Err(HandlerError::Send) => break Exit::ConnectionLost,
                    }
                }

                maybe = outgoing_rx.recv() => {
                    // The loop holds a sender, so the queue cannot close.
                    if let Some(msg) = maybe {
                        if write_line(&mut write_half, &msg.to_string()).await.is_err() {
                            break Exit::ConnectionLost;
                        }
                        if handshake.registered {
                            if let Some(client_arc) = matrix.client(uid) {
                                client_arc.write().await.last_send =
                                    chrono::Utc::now().timestamp();
                            }
                        }
                    }
                }

                Some(event) = lookup_rx.recv(), if !handshake.registered => {
                    let notice = match event {
                        LookupEvent::Dns(Some(host)) => {
                            handshake.dns_host = Some(host);
                            "NOTICE AUTH :*** Found your hostname"
                        }
                        LookupEvent::Dns(None) => "NOTICE AUTH :*** Couldn't look up your hostname",
                        LookupEvent::Ident(Some(user)) => {
                            handshake.ident_user = Some(user);
                            "NOTICE AUTH :*** Got Ident response"
                        }
                        LookupEvent::Ident(None) => "NOTICE AUTH :*** No Ident response",
                    };
                    if write_line(&mut write_half, notice).await.is_err() {
                        break Exit::ConnectionLost;
                    }
                }

                _ = tokio::time::sleep_until(last_recv + ping_interval) => {
                    if ping_missed > 0 {
                        break Exit::PingTimeout;
                    }
                    if write_line(
                        &mut write_half,
                        &format!("PING :{}", matrix.server_info.name),
                    )
                    .await
                    .is_err()
                    {
                        break Exit::ConnectionLost;
                    }
                    ping_missed += 1;
                    // Restart the interval from the PING, not from the
                    // stale receive time.
                    last_recv = Instant::now();
                }
            }
        };

        // Teardown. The registered paths fan a QUIT through the Matrix,
        // which also queues the final ERROR line; drain it onto the wire.
        let registered = handshake.registered && matrix.users.contains_key(&uid);
        match exit {
            Exit::Quit(reason) => {
                if registered {
                    matrix.disconnect_user(uid, &reason).await;
                } else {
                    let _ = write_line(
                        &mut write_half,
                        &format!("ERROR :Closing Link: {} ({})", ip, reason),
                    )
                    .await;
                }
            }
            Exit::ConnectionLost | Exit::PingTimeout => {
                if registered {
                    matrix
                        .disconnect_user(uid, "Connection reset by peer")
                        .await;
                }
            }
            Exit::Silent => {}
        }
        while let Ok(msg) = outgoing_rx.try_recv() {
            let _ = write_line(&mut write_half, &msg.to_string()).await;
        }
        let _ = write_half.shutdown().await;

        info!(uid = uid, "client disconnected");
        Ok(())
    }
}
