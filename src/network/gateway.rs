//! The Gateway accepts TCP connections and spawns one task per client.

use crate::handlers::Registry;
use crate::network::Connection;
use crate::state::Matrix;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Listener plus the shared state every connection needs.
pub struct Gateway {
    listener: TcpListener,
    matrix: Arc<Matrix>,
    registry: Arc<Registry>,
    next_uid: AtomicU64,
}

impl Gateway {
    /// Bind the listen address.
    pub async fn bind(
        addr: SocketAddr,
        matrix: Arc<Matrix>,
        registry: Arc<Registry>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            matrix,
            registry,
            next_uid: AtomicU64::new(1),
        })
    }

    /// The bound address, useful when binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop; runs until the listener fails.
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let uid = self.next_uid.fetch_add(1, Ordering::SeqCst);
            info!(uid = uid, addr = %addr, "client connected");

            let connection = Connection::new(
                uid,
                stream,
                addr,
                self.matrix.clone(),
                self.registry.clone(),
            );
            tokio::spawn(async move {
                if let Err(e) = connection.run().await {
                    error!(uid = uid, error = %e, "connection task failed");
                }
            });
        }
    }
}
