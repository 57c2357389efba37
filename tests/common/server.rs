//! Test server management.
//!
//! Spins up an emberd instance inside the test process on an ephemeral
//! port.

#![allow(dead_code)]

use emberd::config::Config;
use emberd::handlers::Registry;
use emberd::network::Gateway;
use emberd::state::Matrix;
use std::net::SocketAddr;
use std::sync::Arc;

/// The baseline test configuration: open I-line, one connection class,
/// one operator, no server password.
pub const DEFAULT_CONFIG: &str = r#"
[listen]
address = "127.0.0.1:0"

[lines]
m = "M:irc.test:localhost:Ember test server:6667"
a = "A:Ember IRC:Test lab:admin@irc.test"
y = ["Y:1:90:0:100:100000"]
i = ["I:*@*::*@*::1"]
o = ["O:*@*:oppass:root::1"]
"#;

/// A test server instance.
pub struct TestServer {
    addr: SocketAddr,
    matrix: Arc<Matrix>,
}

impl TestServer {
    /// Spawn a server with the default configuration.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with_config(DEFAULT_CONFIG).await
    }

    /// Spawn a server from a TOML string.
    pub async fn spawn_with_config(toml: &str) -> anyhow::Result<Self> {
        let config: Config = ::toml::from_str(toml)?;
        let m_line = config.m_line()?;
        let listen_addr = config.listen_addr(&m_line);
        let matrix = Arc::new(Matrix::new(&config, m_line));
        let registry = Arc::new(Registry::new());

        let gateway = Gateway::bind(listen_addr, matrix.clone(), registry).await?;
        let addr = gateway.local_addr()?;
        tokio::spawn(async move {
            let _ = gateway.run().await;
        });

        Ok(Self { addr, matrix })
    }

    /// The bound address.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for white-box assertions.
    pub fn matrix(&self) -> &Arc<Matrix> {
        &self.matrix
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self, nick: &str) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(self.addr, nick).await
    }

    /// Connect and register in one step.
    pub async fn register(&self, nick: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client = self.connect(nick).await?;
        client.register().await?;
        Ok(client)
    }
}
