//! Scripted transport standing in for IRC servers.

use async_trait::async_trait;
use demibot::config::NetworkConfig;
use demibot::error::ConnectError;
use demibot::network::Connector;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Hands out in-memory streams. The server side of each goes to the test.
pub struct ScriptedConnector {
    failures: AtomicUsize,
    attempts: AtomicUsize,
    servers: mpsc::UnboundedSender<TestServer>,
}

#[allow(dead_code)]
impl ScriptedConnector {
    /// Connector whose first `failures` attempts are refused.
    pub fn new(failures: usize) -> (Self, mpsc::UnboundedReceiver<TestServer>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Self {
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            servers,
        };
        (connector, accepted)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Stream = DuplexStream;

    async fn connect(&self, _network: &NetworkConfig) -> Result<DuplexStream, ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ConnectError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )));
        }

        let (client, server) = tokio::io::duplex(64 * 1024);
        let (read, write) = tokio::io::split(server);
        let _ = self.servers.send(TestServer {
            lines: BufReader::new(read).lines(),
            writer: write,
        });
        Ok(client)
    }
}

/// Server end of one scripted connection.
pub struct TestServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

#[allow(dead_code)]
impl TestServer {
    /// Send a raw line to the bot.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Receive a single line from the bot.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        let line = timeout(Duration::from_secs(5), self.lines.next_line())
            .await??
            .ok_or_else(|| anyhow::anyhow!("connection closed"))?;
        Ok(line)
    }

    /// Receive lines until one starts with `prefix`.
    pub async fn recv_until(&mut self, prefix: &str) -> anyhow::Result<String> {
        loop {
            let line = self.recv().await?;
            if line.starts_with(prefix) {
                return Ok(line);
            }
        }
    }

    /// Consume NICK/USER and send the welcome numeric.
    pub async fn welcome(&mut self, nick: &str) -> anyhow::Result<()> {
        self.recv_until("USER ").await?;
        self.send_raw(&format!(":irc.test 001 {nick} :Welcome"))
            .await
    }
}
