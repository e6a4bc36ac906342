//! Integration tests: causal delivery across datacenters.
//!
//! Links delay every message randomly, so these exercise reordering.

mod common;

use common::TestMesh;
use std::time::Duration;

/// A message reaches clients on every other datacenter.
#[tokio::test]
async fn test_cross_datacenter_delivery() -> anyhow::Result<()> {
    let mesh = TestMesh::spawn(3, 50).await?;
    let mut alice = mesh.servers[0].connect().await?;
    let mut bob = mesh.servers[1].connect().await?;
    let mut carol = mesh.servers[2].connect().await?;

    alice.send("hello").await?;

    assert_eq!(bob.recv().await?, "hello");
    assert_eq!(carol.recv().await?, "hello");
    Ok(())
}

/// "world" depends on "hello", so no client sees it first, however the
/// link delays reorder them.
#[tokio::test]
async fn test_author_order_survives_link_delay() -> anyhow::Result<()> {
    let mesh = TestMesh::spawn(2, 300).await?;
    let mut alice = mesh.servers[0].connect().await?;
    let mut bob = mesh.servers[1].connect().await?;

    for round in 0..5 {
        let first = format!("hello {round}");
        let second = format!("world {round}");
        alice.send(&first).await?;
        alice.send(&second).await?;
        assert_eq!(bob.recv_n(2).await?, vec![first, second]);
    }
    Ok(())
}

/// A reply is never delivered before the message it answers.
#[tokio::test]
async fn test_reply_follows_question() -> anyhow::Result<()> {
    let mesh = TestMesh::spawn(3, 300).await?;
    let mut alice = mesh.servers[0].connect().await?;
    let mut bob = mesh.servers[1].connect().await?;
    let mut carol = mesh.servers[2].connect().await?;

    alice.send("anyone there?").await?;
    assert_eq!(bob.recv().await?, "anyone there?");
    bob.send("yes").await?;

    // Carol may get the reply's link first; she must still see the question
    // before it.
    assert_eq!(carol.recv_n(2).await?, vec!["anyone there?", "yes"]);
    assert_eq!(alice.recv_n(2).await?, vec!["anyone there?", "yes"]);
    Ok(())
}

/// Datacenters do not relay each other's traffic: each message arrives
/// exactly once.
#[tokio::test]
async fn test_no_duplicate_delivery() -> anyhow::Result<()> {
    let mesh = TestMesh::spawn(3, 20).await?;
    let mut alice = mesh.servers[0].connect().await?;
    let mut carol = mesh.servers[2].connect().await?;

    alice.send("once").await?;
    assert_eq!(carol.recv().await?, "once");
    carol.expect_silence(Duration::from_millis(500)).await?;
    Ok(())
}
