//! Referee - hosts services and routes inbound traffic to them
//!
//! Each accepted connection gets its own task. Client frames are answered
//! on the same connection through the [`ClientRouter`]; peer frames are
//! pushed into the inbox of the service that owns their action.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::message::Message;
use crate::node::{NodeInfo, NodePath};
use crate::report::Reporter;
use crate::service::{RefereeLink, Service, ServiceError, ServiceTable};
use crate::transport::{ClientRouter, Frame, TcpTransport, Transport, TransportError, read_frame, write_frame};

const REPORT_CONTEXT: &str = "[referee]";

/// Referee startup and runtime errors
#[derive(Debug, Error)]
pub enum RefereeError {
    #[error("Invalid referee path {0:?}")]
    InvalidPath(String),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The directory node that workers register with and clients query
pub struct Referee {
    path: NodePath,
    node: NodeInfo,
    reporter: Reporter,
    services: ServiceTable,
    clients: ClientRouter,
    transport: Arc<dyn Transport>,
    max_frame_size: usize,
}

impl Referee {
    /// Create a referee for `path`, which must carry a group and node info
    pub fn new(path: NodePath, config: &Config, reporter: Reporter) -> Result<Self, RefereeError> {
        debug!(%path, "Referee::new: called");
        let canonical = path.canonical().ok_or_else(|| RefereeError::InvalidPath(path.to_string()))?;
        let node = canonical
            .node_info()
            .ok_or_else(|| RefereeError::InvalidPath(path.to_string()))?;

        Ok(Self {
            path: canonical,
            node,
            reporter,
            services: ServiceTable::new(),
            clients: ClientRouter::new(),
            transport: Arc::new(TcpTransport::new(&config.transport)),
            max_frame_size: config.transport.max_frame_size,
        })
    }

    /// Replace the outbound transport
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Host `service`, replacing any service of the same kind
    pub fn config_service(&mut self, service: Arc<dyn Service>) {
        let kind = service.kind();
        debug!(%kind, "Referee::config_service: called");
        if self.services.insert(service).is_some() {
            warn!(%kind, "Service configured twice, keeping the latest");
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn node(&self) -> &NodeInfo {
        &self.node
    }

    pub fn clients(&self) -> &ClientRouter {
        &self.clients
    }

    /// Bind a listener at the referee's own address
    pub async fn bind(&self) -> Result<TcpListener, RefereeError> {
        let addr = self.node.address();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| RefereeError::Bind { addr, source })
    }

    /// Serve until `shutdown` resolves
    pub async fn run<S>(self, listener: TcpListener, shutdown: S) -> Result<(), RefereeError>
    where
        S: Future<Output = ()>,
    {
        let link = RefereeLink {
            node: self.node.clone(),
            transport: self.transport.clone(),
            clients: self.clients.clone(),
        };
        for service in self.services.iter() {
            service.init(&link)?;
        }

        let mut service_tasks = Vec::with_capacity(self.services.len());
        for service in self.services.iter() {
            let service = service.clone();
            let reporter = self.reporter.clone();
            service_tasks.push(tokio::spawn(async move {
                let kind = service.kind();
                if let Err(e) = service.start().await {
                    error!(%kind, error = %e, "Service stopped with error");
                    reporter.report(REPORT_CONTEXT, format!("service {kind}: {e}")).await;
                }
            }));
        }

        let inbound = Inbound {
            services: Arc::new(self.services.clone()),
            clients: self.clients.clone(),
            reporter: self.reporter.clone(),
            max_frame_size: self.max_frame_size,
        };

        info!(path = %self.path, "Referee running");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Referee shutting down");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let inbound = inbound.clone();
                        tokio::spawn(async move { inbound.serve(stream, peer).await });
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
            }
        }

        for service in self.services.iter() {
            service.term();
        }
        for task in service_tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Service task panicked");
            }
        }
        info!("Referee stopped");
        Ok(())
    }
}

/// Per-connection routing state
#[derive(Clone)]
struct Inbound {
    services: Arc<ServiceTable>,
    clients: ClientRouter,
    reporter: Reporter,
    max_frame_size: usize,
}

impl Inbound {
    async fn serve(self, mut stream: TcpStream, peer: SocketAddr) {
        debug!(%peer, "Inbound::serve: connection opened");
        if let Err(e) = self.read_loop(&mut stream).await {
            warn!(%peer, error = %e, "Connection dropped");
            self.reporter.report(REPORT_CONTEXT, format!("{peer}: {e}")).await;
        }
        debug!(%peer, "Inbound::serve: connection closed");
    }

    async fn read_loop(&self, stream: &mut TcpStream) -> Result<(), TransportError> {
        while let Some(frame) = read_frame(stream, self.max_frame_size).await? {
            match frame {
                Frame::Client { event, args } => {
                    let value = self.clients.dispatch(&event, &args).unwrap_or_else(|| {
                        warn!(%event, "No handler for client event");
                        String::new()
                    });
                    write_frame(stream, &Frame::Reply { value }, self.max_frame_size).await?;
                }
                Frame::Peer { message } => self.route(message).await,
                Frame::Reply { .. } => {
                    return Err(TransportError::UnexpectedFrame("reply".to_string()));
                }
            }
        }
        Ok(())
    }

    async fn route(&self, msg: Message) {
        let action = msg.action();
        let Some(service) = self.services.route(action) else {
            warn!(?action, "No service for peer message");
            self.reporter
                .report(REPORT_CONTEXT, format!("no service for {action:?} message {}", msg.info().id))
                .await;
            return;
        };
        if let Err(e) = service.inbox().push(msg).await {
            self.reporter
                .report(REPORT_CONTEXT, format!("{} inbox: {e}", service.kind()))
                .await;
        }
    }
}
