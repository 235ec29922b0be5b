//! Worker side: listen for peer messages and complete registration

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::TransportError;
use super::client::RefereeClient;
use super::frame::{Frame, read_frame};
use crate::config::TransportConfig;
use crate::message::{Action, Message, MessageState};
use crate::node::{NodeInfo, NodePath};

/// A worker's inbound listener, bound at the address in its path
pub struct WorkerEndpoint {
    path: NodePath,
    listener: TcpListener,
    io_timeout: Duration,
    max_frame_size: usize,
}

impl WorkerEndpoint {
    /// Bind at the host and port named by `path`
    pub async fn bind(path: NodePath, config: &TransportConfig) -> Result<Self, TransportError> {
        let info = path
            .node_info()
            .ok_or_else(|| TransportError::Rejected(format!("invalid worker path {path:?}")))?;
        let listener = TcpListener::bind(info.address()).await?;
        Ok(Self::with_listener(path, listener, config))
    }

    /// Use an already bound listener; the path is derived from its local address
    pub fn from_listener(group: &str, listener: TcpListener, config: &TransportConfig) -> Result<Self, TransportError> {
        let local = listener.local_addr()?;
        let info = NodeInfo::new(local.ip().to_string(), local.port());
        Ok(Self::with_listener(NodePath::from_parts(group, &info), listener, config))
    }

    fn with_listener(path: NodePath, listener: TcpListener, config: &TransportConfig) -> Self {
        Self {
            path,
            listener,
            io_timeout: config.io_timeout(),
            max_frame_size: config.max_frame_size,
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Accept one connection and read the peer message it carries
    ///
    /// Non-peer frames and empty connections yield `None`.
    pub async fn accept_message(&self) -> Result<Option<Message>, TransportError> {
        let (mut stream, peer) = self.listener.accept().await?;
        debug!(%peer, "WorkerEndpoint::accept_message: accepted");
        self.read_message(&mut stream, peer).await
    }

    async fn read_message(&self, stream: &mut TcpStream, peer: SocketAddr) -> Result<Option<Message>, TransportError> {
        let frame = tokio::time::timeout(self.io_timeout, read_frame(stream, self.max_frame_size))
            .await
            .map_err(|_| TransportError::Timeout(self.io_timeout))??;

        match frame {
            Some(Frame::Peer { message }) => Ok(Some(message)),
            Some(other) => {
                warn!(%peer, kind = other.kind(), "Worker ignoring non-peer frame");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Register with the referee and wait for the canonical path to come back
    pub async fn register_and_wait(&self, referee: &RefereeClient, timeout: Duration) -> Result<NodePath, TransportError> {
        debug!(path = %self.path, referee = %referee.referee(), "WorkerEndpoint::register_and_wait: called");
        referee.register(&self.path).await?;

        tokio::time::timeout(timeout, self.await_refer_reply())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    /// Only a failing listener ends the wait; a bad connection is skipped
    async fn await_refer_reply(&self) -> Result<NodePath, TransportError> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            let msg = match self.read_message(&mut stream, peer).await {
                Ok(Some(msg)) => msg,
                Ok(None) => continue,
                Err(e) => {
                    warn!(%peer, error = %e, "Skipping bad connection while registering");
                    continue;
                }
            };
            if msg.action() != Action::Refer {
                debug!(%msg, "Skipping non-refer message while registering");
                continue;
            }

            let body = msg
                .content(0)
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            match msg.state() {
                MessageState::Succeed => {
                    info!(canonical = %body, "Registered with referee");
                    return Ok(NodePath::from(body));
                }
                MessageState::Error => return Err(TransportError::Rejected(body)),
                MessageState::Ask => debug!(%msg, "Skipping refer ask while registering"),
            }
        }
    }
}
