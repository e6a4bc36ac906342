//! Integration tests: the relay-chat binary against a live datacenter.

mod common;

use anyhow::Context;
use common::{TestMesh, free_ports};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;

fn spawn_chat(datacenter_port: u16, callback_ports: &[u16]) -> anyhow::Result<Child> {
    let child = Command::new(env!("CARGO_BIN_EXE_relay-chat"))
        .arg(datacenter_port.to_string())
        .args(callback_ports.iter().map(|p| p.to_string()))
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    Ok(child)
}

async fn next_line(lines: &mut Lines<BufReader<ChildStdout>>) -> anyhow::Result<String> {
    timeout(Duration::from_secs(5), lines.next_line())
        .await
        .context("timed out waiting for relay-chat output")??
        .context("relay-chat closed stdout")
}

/// Stdin lines reach other clients; pushed lines are printed.
#[tokio::test]
async fn test_chat_client_round_trip() -> anyhow::Result<()> {
    let mesh = TestMesh::spawn(1, 0).await?;
    let mut bob = mesh.servers[0].connect().await?;

    let mut chat = spawn_chat(mesh.servers[0].port(), &free_ports(1)?)?;
    let mut stdin = chat.stdin.take().context("no stdin")?;
    let mut stdout = BufReader::new(chat.stdout.take().context("no stdout")?).lines();

    stdin.write_all(b"hello from chat\n").await?;
    stdin.flush().await?;
    assert_eq!(bob.recv().await?, "hello from chat");
    assert_eq!(next_line(&mut stdout).await?, "hello from chat");

    bob.send("hi back").await?;
    assert_eq!(next_line(&mut stdout).await?, "hi back");
    Ok(())
}

/// Losing the datacenter ends the client with a failure status.
#[tokio::test]
async fn test_chat_client_exits_when_datacenter_goes() -> anyhow::Result<()> {
    let mut mesh = TestMesh::spawn(1, 0).await?;
    let mut alice = mesh.servers[0].connect().await?;
    let mut chat = spawn_chat(mesh.servers[0].port(), &free_ports(1)?)?;
    let mut stdin = chat.stdin.take().context("no stdin")?;

    // Once alice hears from it, the client is fully attached.
    stdin.write_all(b"ready\n").await?;
    stdin.flush().await?;
    assert_eq!(alice.recv().await?, "ready");

    drop(alice);
    mesh.servers.clear();

    let status = timeout(Duration::from_secs(5), chat.wait())
        .await
        .context("relay-chat kept running")??;
    assert!(!status.success());
    Ok(())
}
