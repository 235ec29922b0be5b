//! Name service - the referee's directory of workers
//!
//! Workers register `<group>/<host>:<port>` paths through peer `Refer` asks;
//! clients resolve the n-th member of a group through the
//! `"flitter refer address"` event. Each group's members live in a
//! [`NodeTree`] created on the group's first registration.
//!
//! The busy flag is an admission gate only. It is checked before the tree
//! lock is taken, so a request that slips past while the flag flips still
//! runs under the same lock discipline as every other request.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{RefereeLink, Service, ServiceError, ServiceKind};
use crate::config::Config;
use crate::message::{Action, HandlerError, LooperSender, LooperStats, Message, MessageLooper, MessageState};
use crate::node::{NodeInfo, NodePath, NodeTree, TreeError};
use crate::report::Reporter;
use crate::transport::Transport;

/// Client event used to resolve a group member's address
pub const REFER_ADDRESS_EVENT: &str = "flitter refer address";

/// Admin client event toggling the busy gate; args `[bool]`, reply is the new state
pub const SET_BUSY_EVENT: &str = "flitter set busy";

const REPORT_CONTEXT: &str = "[name service]";

/// Registration failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Group name missing in node path {0:?}")]
    GroupNameMissing(String),

    #[error("Invalid node info in node path {0:?}")]
    InvalidNodeInfo(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Name registry lock poisoned")]
    Poisoned,
}

/// Snapshot of registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NameStats {
    pub groups: usize,
    pub members: usize,
    pub registrations: u64,
    pub busy_rejections: u64,
}

/// Group name to tree mapping plus the busy gate
pub struct NameRegistry {
    trees: RwLock<HashMap<String, NodeTree>>,
    fan_out: usize,
    busy: AtomicBool,
    registrations: AtomicU64,
    busy_rejections: AtomicU64,
}

impl NameRegistry {
    pub fn new(fan_out: usize) -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
            fan_out,
            busy: AtomicBool::new(false),
            registrations: AtomicU64::new(0),
            busy_rejections: AtomicU64::new(0),
        }
    }

    /// Return the stored path for the node, registering it if absent
    pub fn find_or_register(&self, path: &NodePath) -> Result<NodePath, NameError> {
        debug!(%path, "NameRegistry::find_or_register: called");
        let group = path
            .group_name()
            .ok_or_else(|| NameError::GroupNameMissing(path.to_string()))?;
        let info = path
            .node_info()
            .ok_or_else(|| NameError::InvalidNodeInfo(path.to_string()))?;

        let mut trees = self.trees.write().map_err(|_| NameError::Poisoned)?;
        let canonical = match trees.get_mut(group) {
            Some(tree) => {
                if let Some(existing) = tree.search(&info) {
                    debug!(%existing, "NameRegistry::find_or_register: already registered");
                    return Ok(existing);
                }
                tree.add(path)?
            }
            None => {
                let mut tree = NodeTree::with_fan_out(group, self.fan_out);
                let canonical = tree.add(path)?;
                trees.insert(group.to_string(), tree);
                canonical
            }
        };

        self.registrations.fetch_add(1, Ordering::Relaxed);
        info!(%canonical, "Registered node");
        Ok(canonical)
    }

    /// The `index`-th member of `group` in traversal order, or the empty path
    pub fn indexed_lookup(&self, group: &str, index: usize) -> NodePath {
        debug!(%group, index, "NameRegistry::indexed_lookup: called");
        let Ok(trees) = self.trees.read() else {
            warn!("Name registry lock poisoned during lookup");
            return NodePath::empty();
        };
        let Some(tree) = trees.get(group) else {
            return NodePath::empty();
        };

        let mut visited = 0usize;
        tree.indexed_lookup(group, |_, _| {
            let hit = visited == index;
            visited += 1;
            hit
        })
    }

    /// Number of members registered under `group`
    pub fn group_len(&self, group: &str) -> usize {
        self.trees
            .read()
            .map(|t| t.get(group).map_or(0, NodeTree::len))
            .unwrap_or(0)
    }

    pub fn set_busy(&self, busy: bool) {
        info!(busy, "Name registry busy flag changed");
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn note_busy_rejection(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> NameStats {
        let (groups, members) = self
            .trees
            .read()
            .map(|t| (t.len(), t.values().map(NodeTree::len).sum()))
            .unwrap_or_default();
        NameStats {
            groups,
            members,
            registrations: self.registrations.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for NameRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(trees) = self.trees.read() else {
            return writeln!(f, "NameRegistry (poisoned)");
        };
        let mut groups: Vec<&String> = trees.keys().collect();
        groups.sort();
        writeln!(f, "NameRegistry ({} groups)", groups.len())?;
        for group in groups {
            write!(f, "{}", trees[group])?;
        }
        Ok(())
    }
}

/// Hosts the [`NameRegistry`] as a referee service
pub struct NameService {
    registry: Arc<NameRegistry>,
    looper: MessageLooper,
    reporter: Reporter,
    busy_reply: String,
    link: OnceLock<RefereeLink>,
}

impl NameService {
    pub fn new(config: &Config, reporter: Reporter) -> Self {
        debug!(fan_out = config.name.fan_out, busy = config.name.busy, "NameService::new: called");
        let registry = Arc::new(NameRegistry::new(config.name.fan_out));
        if config.name.busy {
            registry.set_busy(true);
        }
        Self {
            registry,
            looper: MessageLooper::from_config(&config.looper, reporter.clone()),
            reporter,
            busy_reply: config.name.busy_reply.clone(),
            link: OnceLock::new(),
        }
    }

    pub fn registry(&self) -> &Arc<NameRegistry> {
        &self.registry
    }

    pub fn find_or_register(&self, path: &NodePath) -> Result<NodePath, NameError> {
        self.registry.find_or_register(path)
    }

    pub fn indexed_lookup(&self, group: &str, index: usize) -> NodePath {
        self.registry.indexed_lookup(group, index)
    }

    pub fn set_busy(&self, busy: bool) {
        self.registry.set_busy(busy);
    }

    pub fn is_busy(&self) -> bool {
        self.registry.is_busy()
    }

    pub fn stats(&self) -> NameStats {
        self.registry.stats()
    }

    pub fn looper_stats(&self) -> LooperStats {
        self.looper.stats()
    }

    fn handle_messages(&self, link: &RefereeLink) {
        let registry = self.registry.clone();
        let transport = link.transport.clone();
        let reporter = self.reporter.clone();
        let referee = link.node.clone();

        self.looper.add_handler(0, Action::Refer, move |msg| {
            let registry = registry.clone();
            let transport = transport.clone();
            let reporter = reporter.clone();
            let referee = referee.clone();
            async move { handle_refer(msg, &registry, transport.as_ref(), &reporter, &referee).await }
        });
    }

    fn handle_clients(&self, link: &RefereeLink) {
        let registry = self.registry.clone();
        let busy_reply = self.busy_reply.clone();
        link.clients
            .on_client(REFER_ADDRESS_EVENT, move |args| refer_address(&registry, &busy_reply, args));

        let registry = self.registry.clone();
        link.clients.on_client(SET_BUSY_EVENT, move |args| set_busy(&registry, args));
    }
}

#[async_trait]
impl Service for NameService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Name
    }

    fn init(&self, link: &RefereeLink) -> Result<(), ServiceError> {
        debug!(referee = %link.node, "NameService::init: called");
        if self.link.set(link.clone()).is_err() {
            return Err(ServiceError::AlreadyInitialized(ServiceKind::Name));
        }
        self.handle_messages(link);
        self.handle_clients(link);
        info!(referee = %link.node, "Name service initialized");
        Ok(())
    }

    async fn start(&self) -> Result<(), ServiceError> {
        if self.link.get().is_none() {
            return Err(ServiceError::NotInitialized(ServiceKind::Name));
        }
        self.looper.run().await?;
        Ok(())
    }

    fn term(&self) {
        debug!("NameService::term: called");
        self.looper.terminate();
    }

    fn inbox(&self) -> LooperSender {
        self.looper.sender()
    }
}

impl fmt::Display for NameService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.registry)
    }
}

async fn handle_refer(
    mut msg: Message,
    registry: &NameRegistry,
    transport: &dyn Transport,
    reporter: &Reporter,
    referee: &NodeInfo,
) -> Result<(), HandlerError> {
    match msg.state() {
        MessageState::Ask => {
            if registry.is_busy() {
                registry.note_busy_rejection();
                warn!(%msg, "Name service busy, dropping refer ask");
                return Ok(());
            }

            let raw = msg
                .content(0)
                .ok_or_else(|| HandlerError::MalformedContent(format!("{msg} has no content")))?;
            let raw = std::str::from_utf8(raw).map_err(|e| HandlerError::MalformedContent(e.to_string()))?;
            let canonical = registry.find_or_register(&NodePath::from(raw))?;
            let target = canonical
                .node_info()
                .ok_or_else(|| NameError::InvalidNodeInfo(canonical.to_string()))?;

            msg.clear_content();
            msg.append_content(canonical.as_str());
            msg.info_mut().set_state(MessageState::Succeed);
            msg.info_mut().set_origin(referee.clone());
            transport.send_to_worker(msg, &target).await?;
            debug!(%canonical, "handle_refer: reply sent");
        }
        MessageState::Error => {
            reporter.report(REPORT_CONTEXT, &msg).await;
        }
        MessageState::Succeed => {
            debug!(%msg, "handle_refer: ignoring succeed");
        }
    }
    Ok(())
}

fn refer_address(registry: &NameRegistry, busy_reply: &str, args: &Value) -> String {
    if registry.is_busy() {
        registry.note_busy_rejection();
        return busy_reply.to_string();
    }
    let Ok((group, index)) = serde_json::from_value::<(String, usize)>(args.clone()) else {
        debug!(%args, "refer_address: malformed args");
        return String::new();
    };
    registry
        .indexed_lookup(&group, index)
        .node_info()
        .map(|info| info.to_string())
        .unwrap_or_default()
}

fn set_busy(registry: &NameRegistry, args: &Value) -> String {
    match serde_json::from_value::<(bool,)>(args.clone()) {
        Ok((busy,)) => {
            registry.set_busy(busy);
            busy.to_string()
        }
        Err(_) => {
            debug!(%args, "set_busy: malformed args");
            String::new()
        }
    }
}
