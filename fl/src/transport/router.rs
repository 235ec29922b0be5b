//! Client event routing

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

/// Synchronous client event handler; the returned string is the reply
pub type ClientHandler = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Table of client event handlers, shared between the referee and services
#[derive(Clone, Default)]
pub struct ClientRouter {
    handlers: Arc<RwLock<HashMap<String, ClientHandler>>>,
}

impl ClientRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `event`, replacing any earlier one
    pub fn on_client<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        debug!(%event, "ClientRouter::on_client: called");
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if handlers.insert(event.to_string(), Arc::new(handler)).is_some() {
            warn!(%event, "Client handler replaced");
        }
    }

    /// Run the handler for `event`; `None` if nothing is registered
    pub fn dispatch(&self, event: &str, args: &Value) -> Option<String> {
        let handler = self.handlers.read().ok()?.get(event).cloned()?;
        Some(handler(args))
    }

    /// Registered event names, sorted
    pub fn events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .handlers
            .read()
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default();
        events.sort();
        events
    }
}
