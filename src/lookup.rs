//! Reverse-DNS and ident lookups for connecting clients.
//!
//! Both run as fire-and-forget tasks at accept time and report back over a
//! channel; the connection task applies the results before the client ever
//! reaches the nick registry. Failure is normal and simply leaves the
//! dotted address as the host and the `~`-prefixed USER argument as the
//! username.

use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

/// Cap on the time either lookup may take.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A completed lookup.
#[derive(Debug)]
pub enum LookupEvent {
    /// Reverse DNS result: the resolved hostname, or None.
    Dns(Option<String>),
    /// Ident result: the confirmed username, or None.
    Ident(Option<String>),
}

/// Start both lookups for a fresh connection.
pub fn spawn(peer: SocketAddr, local: SocketAddr, tx: mpsc::UnboundedSender<LookupEvent>) {
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            let host = tokio::time::timeout(LOOKUP_TIMEOUT, reverse_lookup(peer))
                .await
                .ok()
                .flatten();
            let _ = tx.send(LookupEvent::Dns(host));
        });
    }
    tokio::spawn(async move {
        let user = tokio::time::timeout(LOOKUP_TIMEOUT, ident_lookup(peer, local))
            .await
            .ok()
            .flatten();
        let _ = tx.send(LookupEvent::Ident(user));
    });
}

/// PTR lookup on the peer address.
async fn reverse_lookup(peer: SocketAddr) -> Option<String> {
    let resolver = TokioResolver::builder_tokio()
        .map(|b| b.build())
        .unwrap_or_else(|_| {
            TokioResolver::builder_with_config(
                ResolverConfig::default(),
                TokioConnectionProvider::default(),
            )
            .build()
        });

    match resolver.reverse_lookup(peer.ip()).await {
        Ok(response) => response.iter().next().map(|name| {
            // PTR names carry a trailing dot.
            name.to_string().trim_end_matches('.').to_string()
        }),
        Err(e) => {
            debug!(peer = %peer.ip(), error = %e, "reverse lookup failed");
            None
        }
    }
}

/// RFC 1413 ident query against the peer.
async fn ident_lookup(peer: SocketAddr, local: SocketAddr) -> Option<String> {
    let stream = TcpStream::connect((peer.ip(), 113)).await.ok()?;
    let (read_half, mut write_half) = stream.into_split();

    let query = format!("{}, {}\r\n", peer.port(), local.port());
    write_half.write_all(query.as_bytes()).await.ok()?;

    let mut line = String::new();
    let mut reader = BufReader::new(read_half);
    reader.read_line(&mut line).await.ok()?;

    // "<ports> : USERID : <os> : <user>"
    let mut parts = line.split(':').map(str::trim);
    let _ports = parts.next()?;
    if parts.next()? != "USERID" {
        return None;
    }
    let _os = parts.next()?;
    let user = parts.next()?.trim_end_matches(['\r', '\n']).to_string();
    if user.is_empty() {
        None
    } else {
        Some(user)
    }
}
