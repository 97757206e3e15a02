//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::time::Duration;

use futures::prelude::*;
use termnet::{Connection, Message};
use tokio::time::timeout;

/// Hands out dummy connections with unique ids.
///
/// The counter lives here rather than in a global so tests running in
/// parallel each get their own sequence.
#[derive(Default)]
pub struct TestContext {
    next_dummy: usize,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection to wrap, plus the remote end that plays the peer.
    pub fn dummy(&mut self, id: &str) -> (Connection, Connection) {
        let n = self.next_dummy;
        self.next_dummy += 1;
        Connection::pair(format!("{id}-Dummy-{n}"))
    }
}

pub async fn recv(conn: &mut Connection) -> Option<Message> {
    timeout(Duration::from_secs(5), conn.next())
        .await
        .expect("timed out waiting for a message")
}

pub async fn recv_data(conn: &mut Connection) -> Vec<u8> {
    match recv(conn).await {
        Some(Message::Data(data)) => data.to_vec(),
        other => panic!("expected data, got {other:?}"),
    }
}

/// True when nothing arrives for a short while.
pub async fn quiet(conn: &mut Connection) -> bool {
    timeout(Duration::from_millis(50), conn.next()).await.is_err()
}

/// Drain a telnet filter's opening offers and agree to all of them.
pub async fn accept_negotiation(remote: &mut Connection) {
    for _ in 0..6 {
        recv_data(remote).await;
    }
    // DO BINARY & ECHO
    remote
        .send(Message::data([255, 253, 0, 255, 253, 1]))
        .await
        .unwrap();
    // DO SUPPRESS GO-AHEAD, WILL BINARY & SUPPRESS GO-AHEAD
    remote
        .send(Message::data([255, 253, 3, 255, 251, 0, 255, 251, 3]))
        .await
        .unwrap();
}
