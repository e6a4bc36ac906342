//! Test server management.
//!
//! Spawns and manages relayd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Reserve `n` distinct free local ports.
pub fn free_ports(n: usize) -> anyhow::Result<Vec<u16>> {
    let listeners = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0"))
        .collect::<Result<Vec<_>, _>>()?;
    let ports = listeners
        .iter()
        .map(|l| l.local_addr().map(|addr| addr.port()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ports)
}

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
}

impl TestServer {
    /// Spawn relayd with `config_path` and wait until it listens on `port`.
    async fn spawn(config_path: &std::path::Path, port: u16) -> anyhow::Result<Self> {
        let child = Command::new(env!("CARGO_BIN_EXE_relayd"))
            .arg(config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self { child, port };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until the server is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Attach a new test client to this datacenter.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.address()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A fully meshed set of datacenters sharing one config file.
pub struct TestMesh {
    pub servers: Vec<TestServer>,
    _dir: TempDir,
}

impl TestMesh {
    /// Spawn `n` datacenters. `max_delay_ms` bounds the per-message link delay.
    pub async fn spawn(n: usize, max_delay_ms: u64) -> anyhow::Result<Self> {
        let ports = free_ports(n)?;
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("relayd.toml");
        let port_list = ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        std::fs::write(
            &config_path,
            format!(
                r#"
[server]
host = "127.0.0.1"
ports = [{port_list}]

[links]
max_delay_ms = {max_delay_ms}
initial_backoff_ms = 50
max_backoff_ms = 200
"#
            ),
        )?;

        // Each process binds the first free port, so start them in order.
        let mut servers = Vec::with_capacity(n);
        for &port in &ports {
            servers.push(TestServer::spawn(&config_path, port).await?);
        }

        // Let every outgoing link finish dialing.
        if n > 1 {
            sleep(Duration::from_millis(1000)).await;
        }

        Ok(Self { servers, _dir: dir })
    }
}
