//! Transport trait and its TCP implementation

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use super::TransportError;
use super::frame::{Frame, write_frame};
use crate::config::TransportConfig;
use crate::message::Message;
use crate::node::NodeInfo;

/// Outbound half of the transport used by services
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a message to the worker listening at `target`
    ///
    /// Fire-and-forget: the worker does not acknowledge.
    async fn send_to_worker(&self, message: Message, target: &NodeInfo) -> Result<(), TransportError>;
}

/// Open a TCP connection with a timeout
pub(crate) async fn connect(target: &NodeInfo, timeout: Duration) -> Result<TcpStream, TransportError> {
    let addr = target.address();
    debug!(%addr, ?timeout, "connect: called");
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(TransportError::Connect { addr, source }),
        Err(_) => Err(TransportError::ConnectTimeout { addr, timeout }),
    }
}

/// One connection per message, closed after the frame is written
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    io_timeout: Duration,
    max_frame_size: usize,
}

impl TcpTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
            max_frame_size: config.max_frame_size,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_to_worker(&self, message: Message, target: &NodeInfo) -> Result<(), TransportError> {
        debug!(%target, id = %message.info().id, "TcpTransport::send_to_worker: called");
        let mut stream = connect(target, self.connect_timeout).await?;
        let frame = Frame::Peer { message };
        tokio::time::timeout(self.io_timeout, write_frame(&mut stream, &frame, self.max_frame_size))
            .await
            .map_err(|_| TransportError::Timeout(self.io_timeout))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Action;
    use crate::transport::frame::read_frame;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_send_to_worker_delivers_peer_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let receiver = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream, 1024).await.unwrap()
        });

        let transport = TcpTransport::new(&TransportConfig::default());
        let msg = Message::ask(Action::Refer, "g/127.0.0.1:1");
        transport
            .send_to_worker(msg.clone(), &NodeInfo::new("127.0.0.1", port))
            .await
            .unwrap();

        assert_eq!(receiver.await.unwrap(), Some(Frame::Peer { message: msg }));
    }

    #[tokio::test]
    async fn test_send_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TcpTransport::new(&TransportConfig::default());
        let err = transport
            .send_to_worker(Message::ask(Action::Refer, "x"), &NodeInfo::new("127.0.0.1", port))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
