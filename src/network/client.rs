//! Minimal IRC client session.
//!
//! One task per connection reads lines, answers PING, registers, and forwards
//! chat messages as [`ClientEvent`]s. Outbound commands arrive through a
//! [`ClientHandle`].

use super::line::{self, Line};
use crate::config::NetworkConfig;
use crate::permissions::nick_of;
use crate::text::to_display_text;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{AnyDelimiterCodec, Framed};
use tracing::{debug, info, trace, warn};

/// Longest line accepted from the server, tags included.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Events a session reports to its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Registration finished under `nick`.
    Connected { nick: String },
    /// A PRIVMSG from `sender` (`nick!user@host`).
    Message {
        sender: String,
        target: String,
        text: String,
    },
    /// The session ended. No further events follow.
    ConnectionLost(String),
}

#[derive(Debug)]
enum Outbound {
    Privmsg { target: String, text: String },
    Join(String),
    Part(String),
    Quit(Option<String>),
}

impl Outbound {
    fn to_line(&self) -> String {
        match self {
            Self::Privmsg { target, text } => {
                format!("PRIVMSG {} :{}", single_line(target), single_line(text))
            }
            Self::Join(channel) => format!("JOIN {}", single_line(channel)),
            Self::Part(channel) => format!("PART {}", single_line(channel)),
            Self::Quit(Some(message)) => format!("QUIT :{}", single_line(message)),
            Self::Quit(None) => "QUIT".to_string(),
        }
    }
}

/// Replaces CR and LF so a value cannot smuggle extra protocol lines.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Handle to a live session. Cheap to clone.
///
/// Commands sent after the session ended are dropped and reported as `false`.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    network: Arc<str>,
    session: u64,
    nick: Arc<RwLock<String>>,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ClientHandle {
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Identifier of the session behind this handle, unique per supervisor.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Current nick; the configured one until the server confirms another.
    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn privmsg(&self, target: &str, text: &str) -> bool {
        self.send(Outbound::Privmsg {
            target: target.to_string(),
            text: text.to_string(),
        })
    }

    pub fn join(&self, channel: &str) -> bool {
        self.send(Outbound::Join(channel.to_string()))
    }

    pub fn part(&self, channel: &str) -> bool {
        self.send(Outbound::Part(channel.to_string()))
    }

    /// Send QUIT and end the session.
    pub fn quit(&self, message: Option<&str>) -> bool {
        self.send(Outbound::Quit(message.map(str::to_string)))
    }

    fn send(&self, command: Outbound) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Start a session over `stream`.
///
/// The session registers immediately and reports to `events` until it
/// emits [`ClientEvent::ConnectionLost`].
pub fn spawn_session<S>(
    stream: S,
    network: Arc<NetworkConfig>,
    session: u64,
    events: mpsc::UnboundedSender<ClientEvent>,
) -> ClientHandle
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let nick = Arc::new(RwLock::new(network.nick.clone()));
    let handle = ClientHandle {
        network: Arc::from(network.name.as_str()),
        session,
        nick: Arc::clone(&nick),
        tx,
    };

    let codec =
        AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\r\n".to_vec(), MAX_LINE_LEN);
    let session = Session {
        framed: Framed::new(stream, codec),
        network,
        nick,
        registered: false,
        events,
    };
    tokio::spawn(session.run(rx));

    handle
}

struct Session<S> {
    framed: Framed<S, AnyDelimiterCodec>,
    network: Arc<NetworkConfig>,
    nick: Arc<RwLock<String>>,
    registered: bool,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Outbound>) {
        let reason = match self.register().await {
            Ok(()) => self.pump(&mut commands).await,
            Err(reason) => reason,
        };
        debug!(network = %self.network.name, reason = %reason, "Session ended");
        let _ = self.events.send(ClientEvent::ConnectionLost(reason));
    }

    async fn register(&mut self) -> Result<(), String> {
        if let Some(password) = self.network.password.clone() {
            self.send(format!("PASS {}", single_line(&password))).await?;
        }
        let nick = self.nick.read().clone();
        self.send(format!("NICK {}", single_line(&nick))).await?;
        let user = format!(
            "USER {} 0 * :{}",
            single_line(self.network.username()),
            single_line(self.network.realname())
        );
        self.send(user).await
    }

    /// Runs until the connection ends. Returns the reason.
    async fn pump(&mut self, commands: &mut mpsc::UnboundedReceiver<Outbound>) -> String {
        loop {
            tokio::select! {
                frame = self.framed.next() => {
                    let bytes = match frame {
                        None => return "connection closed by server".to_string(),
                        Some(Err(e)) => return format!("read error: {e}"),
                        Some(Ok(bytes)) => bytes,
                    };
                    let raw = to_display_text(&bytes[..]);
                    trace!(line = %raw.trim_end(), "<<");
                    let Some(line) = line::parse(&raw) else {
                        continue;
                    };
                    if let Err(reason) = self.handle_line(&line).await {
                        return reason;
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        let _ = self.send("QUIT".to_string()).await;
                        return "client handle dropped".to_string();
                    };
                    if let Err(reason) = self.send(command.to_line()).await {
                        return reason;
                    }
                    if let Outbound::Quit(message) = command {
                        return match message {
                            Some(message) => format!("quit: {message}"),
                            None => "quit".to_string(),
                        };
                    }
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &Line<'_>) -> Result<(), String> {
        match line.command {
            "PING" => {
                let token = line.param(0).unwrap_or_default();
                self.send(format!("PONG :{token}")).await?;
            }
            "001" => {
                if let Some(confirmed) = line.param(0) {
                    *self.nick.write() = confirmed.to_string();
                }
                self.registered = true;
                let nick = self.nick.read().clone();
                info!(network = %self.network.name, nick = %nick, "Registered");
                for channel in self.network.channels.clone() {
                    self.send(format!("JOIN {}", single_line(&channel))).await?;
                }
                let _ = self.events.send(ClientEvent::Connected { nick });
            }
            "433" if !self.registered => {
                let retry = {
                    let mut nick = self.nick.write();
                    nick.push('_');
                    nick.clone()
                };
                warn!(network = %self.network.name, nick = %retry, "Nick in use, retrying");
                self.send(format!("NICK {retry}")).await?;
            }
            "NICK" => {
                let sender = line.prefix.map(nick_of).unwrap_or_default();
                let renamed = line.param(0);
                let mut nick = self.nick.write();
                if let Some(renamed) = renamed
                    && sender == nick.as_str()
                {
                    *nick = renamed.to_string();
                }
            }
            "PRIVMSG" => {
                if let (Some(sender), Some(target), Some(text)) =
                    (line.prefix, line.param(0), line.param(1))
                {
                    let _ = self.events.send(ClientEvent::Message {
                        sender: sender.to_string(),
                        target: target.to_string(),
                        text: text.to_string(),
                    });
                }
            }
            "ERROR" => {
                return Err(format!("server error: {}", line.param(0).unwrap_or_default()));
            }
            _ => {}
        }
        Ok(())
    }

    async fn send(&mut self, line: String) -> Result<(), String> {
        trace!(line = %line, ">>");
        self.framed
            .send(line)
            .await
            .map_err(|e| format!("write error: {e}"))
    }
}
