//! Network layer: transports, the line session, and per-network supervision.

pub mod client;
pub mod connector;
pub mod line;
pub mod supervisor;

pub use client::{ClientEvent, ClientHandle, spawn_session};
pub use connector::{BotStream, CONNECT_TIMEOUT, Connector, TcpConnector};
pub use supervisor::{ClientTable, Supervisor, SupervisorStatus};
