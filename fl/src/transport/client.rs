//! Client side of the referee connection

use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpStream;
use tracing::debug;

use super::TransportError;
use super::frame::{Frame, read_frame, write_frame};
use super::tcp::connect;
use crate::config::TransportConfig;
use crate::message::{Action, Message};
use crate::node::{NodeInfo, NodePath};
use crate::service::{REFER_ADDRESS_EVENT, SET_BUSY_EVENT};

/// Talks to a referee: client events and worker registration
#[derive(Debug, Clone)]
pub struct RefereeClient {
    referee: NodeInfo,
    connect_timeout: Duration,
    io_timeout: Duration,
    max_frame_size: usize,
}

impl RefereeClient {
    pub fn new(referee: NodeInfo, config: &TransportConfig) -> Self {
        Self {
            referee,
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
            max_frame_size: config.max_frame_size,
        }
    }

    pub fn referee(&self) -> &NodeInfo {
        &self.referee
    }

    /// Send one client event and wait for its reply
    pub async fn request(&self, event: &str, args: Value) -> Result<String, TransportError> {
        debug!(%event, referee = %self.referee, "RefereeClient::request: called");
        let mut stream = connect(&self.referee, self.connect_timeout).await?;
        let frame = Frame::Client {
            event: event.to_string(),
            args,
        };

        tokio::time::timeout(self.io_timeout, self.exchange(&mut stream, &frame))
            .await
            .map_err(|_| TransportError::Timeout(self.io_timeout))?
    }

    async fn exchange(&self, stream: &mut TcpStream, frame: &Frame) -> Result<String, TransportError> {
        write_frame(stream, frame, self.max_frame_size).await?;
        match read_frame(stream, self.max_frame_size).await? {
            Some(Frame::Reply { value }) => Ok(value),
            Some(other) => Err(TransportError::UnexpectedFrame(other.kind().to_string())),
            None => Err(TransportError::Closed),
        }
    }

    /// Ask the referee for the `index`-th member of `group`
    ///
    /// An empty string means no such member. While the referee is busy the
    /// reply is its busy sentinel instead.
    pub async fn refer_address(&self, group: &str, index: usize) -> Result<String, TransportError> {
        self.request(REFER_ADDRESS_EVENT, json!([group, index])).await
    }

    /// Open or close the referee's busy gate; returns the state it reports
    pub async fn set_busy(&self, busy: bool) -> Result<bool, TransportError> {
        let reply = self.request(SET_BUSY_EVENT, json!([busy])).await?;
        reply
            .parse::<bool>()
            .map_err(|_| TransportError::UnexpectedFrame(format!("set busy reply {reply:?}")))
    }

    /// Send a registration request for `path`
    ///
    /// The answer arrives later as a peer message on the worker's own listener.
    pub async fn register(&self, path: &NodePath) -> Result<(), TransportError> {
        debug!(%path, "RefereeClient::register: called");
        let mut msg = Message::ask(Action::Refer, path.as_str());
        if let Some(info) = path.node_info() {
            msg.info_mut().set_origin(info);
        }

        let mut stream = connect(&self.referee, self.connect_timeout).await?;
        let frame = Frame::Peer { message: msg };
        tokio::time::timeout(self.io_timeout, write_frame(&mut stream, &frame, self.max_frame_size))
            .await
            .map_err(|_| TransportError::Timeout(self.io_timeout))??;
        Ok(())
    }
}
