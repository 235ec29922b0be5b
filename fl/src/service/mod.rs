//! Services hosted by a referee
//!
//! Every service owns a [`MessageLooper`](crate::message::MessageLooper) and
//! is addressed by its [`ServiceKind`]. The referee routes each peer message
//! to the service that owns the message's action.

mod name;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{Action, LooperError, LooperSender};
use crate::node::NodeInfo;
use crate::transport::{ClientRouter, Transport};

pub use name::{NameError, NameRegistry, NameService, NameStats, REFER_ADDRESS_EVENT, SET_BUSY_EVENT};

/// Closed set of services a referee can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceKind {
    Name,
}

impl ServiceKind {
    /// Service responsible for messages carrying `action`
    pub fn for_action(action: Action) -> Option<Self> {
        match action {
            Action::Refer => Some(ServiceKind::Name),
            Action::Watch | Action::Heartbeat => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Name => write!(f, "name"),
        }
    }
}

/// Service lifecycle errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service {0} is already initialized")]
    AlreadyInitialized(ServiceKind),

    #[error("Service {0} was started before init")]
    NotInitialized(ServiceKind),

    #[error("Looper error: {0}")]
    Looper(#[from] LooperError),
}

/// What a service receives from its hosting referee at init
#[derive(Clone)]
pub struct RefereeLink {
    /// The referee's own connection info, used as origin on replies
    pub node: NodeInfo,
    pub transport: Arc<dyn Transport>,
    pub clients: ClientRouter,
}

/// A long-running component hosted by the referee
#[async_trait]
pub trait Service: Send + Sync {
    fn kind(&self) -> ServiceKind;

    /// Wire handlers against the referee; called once before `start`
    fn init(&self, link: &RefereeLink) -> Result<(), ServiceError>;

    /// Run until `term`
    async fn start(&self) -> Result<(), ServiceError>;

    fn term(&self);

    /// Producer handle for the service's message queue
    fn inbox(&self) -> LooperSender;
}

/// Services keyed by kind
#[derive(Default, Clone)]
pub struct ServiceTable {
    services: BTreeMap<ServiceKind, Arc<dyn Service>>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service, returning the one it replaced
    pub fn insert(&mut self, service: Arc<dyn Service>) -> Option<Arc<dyn Service>> {
        self.services.insert(service.kind(), service)
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&Arc<dyn Service>> {
        self.services.get(&kind)
    }

    /// Service that should receive a message carrying `action`
    pub fn route(&self, action: Action) -> Option<&Arc<dyn Service>> {
        ServiceKind::for_action(action).and_then(|kind| self.get(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Service>> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
