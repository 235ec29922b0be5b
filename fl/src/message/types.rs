//! Message envelope exchanged between nodes

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::node::NodeInfo;

/// What a message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Directory registration and discovery
    Refer,
    /// Worker watch traffic
    Watch,
    /// Liveness traffic
    Heartbeat,
}

/// Where a message is in its request/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageState {
    Ask,
    Succeed,
    Error,
}

/// Header of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: Uuid,
    pub action: Action,
    pub state: MessageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<NodeInfo>,
}

impl MessageInfo {
    pub fn new(action: Action, state: MessageState) -> Self {
        Self {
            id: Uuid::now_v7(),
            action,
            state,
            origin: None,
        }
    }

    /// Action, state and origin in one go
    pub fn parts(&self) -> (Action, MessageState, Option<&NodeInfo>) {
        (self.action, self.state, self.origin.as_ref())
    }

    pub fn set_state(&mut self, state: MessageState) {
        self.state = state;
    }

    pub fn set_origin(&mut self, origin: NodeInfo) {
        self.origin = Some(origin);
    }
}

impl fmt::Display for MessageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.action, self.state)?;
        if let Some(origin) = &self.origin {
            write!(f, " from {}", origin)?;
        }
        write!(f, " ({})", self.id)
    }
}

/// Info block plus an ordered list of opaque content blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    info: MessageInfo,
    #[serde(default)]
    content: Vec<Vec<u8>>,
}

impl Message {
    pub fn new(action: Action, state: MessageState) -> Self {
        Self {
            info: MessageInfo::new(action, state),
            content: Vec::new(),
        }
    }

    /// An `Ask` carrying a single content block
    pub fn ask(action: Action, block: impl Into<Vec<u8>>) -> Self {
        let mut msg = Self::new(action, MessageState::Ask);
        msg.append_content(block);
        msg
    }

    pub fn info(&self) -> &MessageInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut MessageInfo {
        &mut self.info
    }

    pub fn action(&self) -> Action {
        self.info.action
    }

    pub fn state(&self) -> MessageState {
        self.info.state
    }

    pub fn append_content(&mut self, block: impl Into<Vec<u8>>) {
        self.content.push(block.into());
    }

    pub fn clear_content(&mut self) {
        self.content.clear();
    }

    pub fn content(&self, index: usize) -> Option<&[u8]> {
        self.content.get(index).map(Vec::as_slice)
    }

    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)?;
        if let Some(first) = self.content.first() {
            write!(f, ": {}", String::from_utf8_lossy(first))?;
        }
        if self.content.len() > 1 {
            write!(f, " (+{} blocks)", self.content.len() - 1)?;
        }
        Ok(())
    }
}
