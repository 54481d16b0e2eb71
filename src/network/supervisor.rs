//! Per-network connection supervisor.
//!
//! A supervisor owns one network: it connects, builds the session, routes
//! chat messages into its [`ModuleRuntime`], applies the resulting effects,
//! and reconnects after a fixed delay when the connection drops or cannot be
//! established.

use super::client::{ClientEvent, ClientHandle, spawn_session};
use super::connector::Connector;
use crate::config::NetworkConfig;
use crate::modules::{Effect, Incoming, ModuleRuntime};
use crate::telemetry::spans;
use dashmap::DashMap;
use futures_util::StreamExt;
use futures_util::stream::FuturesOrdered;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Live clients keyed by network name. Inserting replaces.
pub type ClientTable = Arc<DashMap<String, ClientHandle>>;

/// Observable state of a supervisor's run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorStatus {
    Idle,
    Connecting,
    /// Session built, registration pending.
    Linked,
    Connected { nick: String },
    /// Sleeping before the next connection attempt.
    Waiting { delay: Duration },
    Stopped,
}

pub struct Supervisor<C: Connector> {
    network: Arc<NetworkConfig>,
    connector: Arc<C>,
    clients: ClientTable,
    runtime: Arc<ModuleRuntime>,
    shutdown: CancellationToken,
    retry: AtomicBool,
    builds: AtomicU64,
    status: watch::Sender<SupervisorStatus>,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(
        network: Arc<NetworkConfig>,
        connector: Arc<C>,
        clients: ClientTable,
        runtime: Arc<ModuleRuntime>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(SupervisorStatus::Idle);
        Arc::new(Self {
            network,
            connector,
            clients,
            runtime,
            shutdown,
            retry: AtomicBool::new(true),
            builds: AtomicU64::new(0),
            status,
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn runtime(&self) -> &Arc<ModuleRuntime> {
        &self.runtime
    }

    /// Number of sessions built so far.
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Acquire)
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry.load(Ordering::Acquire)
    }

    pub fn status(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.subscribe()
    }

    /// Stop reconnecting and end the run loop, quitting a live session.
    pub fn shutdown(&self) {
        self.retry.store(false, Ordering::Release);
        self.shutdown.cancel();
    }

    /// Connect, supervise, and reconnect until shut down.
    ///
    /// Modules are loaded once before the first connection attempt.
    pub async fn run(self: Arc<Self>) {
        let span = spans::network(&self.network.name);
        async move {
            let summary = self.runtime.reload_all().await;
            info!(
                loaded = summary.loaded.len(),
                failed = summary.failed.len(),
                "Modules loaded"
            );

            loop {
                if self.shutdown.is_cancelled() || !self.retry_enabled() {
                    break;
                }

                self.status.send_replace(SupervisorStatus::Connecting);
                info!(host = %self.network.host, port = self.network.port, tls = self.network.tls, "Connecting");
                let connected = tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    result = self.connector.connect(&self.network) => result,
                };

                let delay = match connected {
                    Ok(stream) => {
                        let reason = self.drive(stream).await;
                        self.on_connection_lost(&reason)
                    }
                    Err(e) => self.on_connection_failed(&e.to_string()),
                };
                let Some(delay) = delay else {
                    break;
                };

                self.status.send_replace(SupervisorStatus::Waiting { delay });
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            self.runtime.finalize_all().await;
            self.status.send_replace(SupervisorStatus::Stopped);
            info!("Supervisor stopped");
        }
        .instrument(span)
        .await
    }

    /// Delay before reconnecting after an established connection dropped.
    ///
    /// `None` once retry is disabled.
    pub fn on_connection_lost(&self, reason: &str) -> Option<Duration> {
        if !self.retry_enabled() {
            info!(reason = %reason, "Connection closed");
            return None;
        }
        let delay = self.network.lost_delay();
        warn!(reason = %reason, delay_secs = delay.as_secs(), "Connection lost, reconnecting");
        Some(delay)
    }

    /// Delay before retrying after a connection attempt failed.
    pub fn on_connection_failed(&self, reason: &str) -> Option<Duration> {
        if !self.retry_enabled() {
            info!(reason = %reason, "Connection failed, not retrying");
            return None;
        }
        let delay = self.network.failed_delay();
        warn!(reason = %reason, delay_secs = delay.as_secs(), "Connection failed, retrying");
        Some(delay)
    }

    /// Spawn a session over `stream` and record it as this network's client.
    pub fn build_client(
        &self,
        stream: C::Stream,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> ClientHandle {
        let session = self.builds.fetch_add(1, Ordering::AcqRel) + 1;
        let handle = spawn_session(stream, Arc::clone(&self.network), session, events);
        if let Some(previous) = self
            .clients
            .insert(self.network.name.clone(), handle.clone())
        {
            debug!(previous = previous.session(), session, "Replaced client");
        }
        self.status.send_replace(SupervisorStatus::Linked);
        handle
    }

    /// Route session events until the connection ends. Returns the reason.
    ///
    /// Each message is dispatched on its own task so a slow handler only
    /// delays itself, but effects are applied in arrival order.
    async fn drive(self: &Arc<Self>, stream: C::Stream) -> String {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let client = self.build_client(stream, events_tx);
        let mut pending: FuturesOrdered<JoinHandle<Vec<Effect>>> = FuturesOrdered::new();
        let mut quitting = false;

        let reason = loop {
            tokio::select! {
                _ = self.shutdown.cancelled(), if !quitting => {
                    quitting = true;
                    client.quit(Some("Shutting down"));
                }
                Some(dispatched) = pending.next(), if !pending.is_empty() => match dispatched {
                    Ok(effects) => {
                        for effect in effects {
                            self.apply(&client, effect).await;
                        }
                    }
                    Err(e) => warn!(error = %e, "Dispatch task failed"),
                },
                event = events.recv() => match event {
                    None => break "session ended".to_string(),
                    Some(ClientEvent::ConnectionLost(reason)) => break reason,
                    Some(ClientEvent::Connected { nick }) => {
                        info!(nick = %nick, "Connected");
                        self.status.send_replace(SupervisorStatus::Connected { nick });
                    }
                    Some(ClientEvent::Message { sender, target, text }) => {
                        let msg = Incoming::new(sender, target, text, &client.nick());
                        if self.network.logs_enabled() {
                            info!(target: "chat", network = %self.network.name, channel = %msg.target, "<{}> {}", msg.nick(), msg.text);
                        }
                        let runtime = Arc::clone(&self.runtime);
                        pending.push_back(tokio::spawn(
                            async move { runtime.dispatch(&msg).await }.in_current_span(),
                        ));
                    }
                },
            }
        };

        if !pending.is_empty() {
            debug!(dropped = pending.len(), "Discarding replies for a closed session");
        }
        self.clients
            .remove_if(&self.network.name, |_, live| live.session() == client.session());
        reason
    }

    async fn apply(&self, client: &ClientHandle, effect: Effect) {
        match effect {
            Effect::Say { target, text } => {
                client.privmsg(&target, &text);
            }
            Effect::Join(channel) => {
                client.join(&channel);
            }
            Effect::Part(channel) => {
                client.part(&channel);
            }
            Effect::ReloadModules => {
                let summary = self.runtime.reload_all().await;
                info!(
                    loaded = summary.loaded.len(),
                    failed = summary.failed.len(),
                    "Modules reloaded on request"
                );
            }
            Effect::ListModules { target } => {
                let loaded = self.runtime.loaded().await;
                if loaded.is_empty() {
                    client.privmsg(&target, "No modules loaded.");
                }
                for module in loaded {
                    let line = format!(
                        "{} ({}) loaded {}",
                        module.id,
                        module.kind,
                        module.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    client.privmsg(&target, &line);
                }
            }
            Effect::Quit(message) => {
                info!("Quitting on request");
                self.retry.store(false, Ordering::Release);
                client.quit(message.as_deref());
            }
        }
    }
}
