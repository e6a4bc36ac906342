//! Test chat client.
//!
//! Performs the client handshake and reads deliveries from the callback
//! connection the relay opens back to it.

use futures_util::{SinkExt, StreamExt};
use relay_proto::LineCodec;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};

/// A test client.
pub struct TestClient {
    writer: FramedWrite<TcpStream, LineCodec>,
    reader: FramedRead<TcpStream, LineCodec>,
}

impl TestClient {
    /// Connect to a relay and wait for its callback connection.
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let callback = TcpListener::bind("127.0.0.1:0").await?;
        let callback_addr = callback.local_addr()?;

        let stream = TcpStream::connect(address).await?;
        let mut writer = FramedWrite::new(stream, LineCodec::new());
        writer.send("client".to_string()).await?;
        writer.send(callback_addr.to_string()).await?;

        let (incoming, _) = timeout(Duration::from_secs(5), callback.accept()).await??;
        let reader = FramedRead::new(incoming, LineCodec::new());

        Ok(Self { writer, reader })
    }

    /// Author one chat line.
    pub async fn send(&mut self, text: &str) -> anyhow::Result<()> {
        self.writer.send(text.to_string()).await?;
        Ok(())
    }

    /// Receive one delivered line.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a delivered line with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        match timeout(dur, self.reader.next()).await? {
            Some(line) => Ok(line?),
            None => anyhow::bail!("relay closed the callback connection"),
        }
    }

    /// Receive `n` delivered lines.
    pub async fn recv_n(&mut self, n: usize) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::with_capacity(n);
        for _ in 0..n {
            lines.push(self.recv().await?);
        }
        Ok(lines)
    }

    /// Assert nothing is delivered within `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match timeout(dur, self.reader.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(line))) => anyhow::bail!("unexpected delivery: {line:?}"),
            Ok(other) => anyhow::bail!("callback connection ended: {other:?}"),
        }
    }
}
