//! MessageLooper - single-consumer message dispatch
//!
//! A looper owns a bounded inbound queue. Owners register handlers keyed by
//! (priority, action) before starting the loop; `run` then pulls one message
//! at a time and awaits every handler registered for its action, lowest
//! priority first. Handler errors are reported and never stop the loop.
//!
//! `terminate` stops the loop before the next message is pulled. A handler
//! that is already running is allowed to finish.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::types::{Action, Message};
use crate::config::LooperConfig;
use crate::report::Reporter;
use crate::service::NameError;
use crate::transport::TransportError;

/// Errors returned by message handlers
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Malformed message content: {0}")]
    MalformedContent(String),

    #[error("Registration failed: {0}")]
    Registration(#[from] NameError),

    #[error("Reply failed: {0}")]
    Send(#[from] TransportError),
}

/// Errors from the looper itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LooperError {
    #[error("Looper is already running or has run")]
    AlreadyRunning,

    #[error("Looper queue is full")]
    Full,

    #[error("Looper queue is closed")]
    Closed,
}

pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// Type-erased async message handler
pub type Handler = Arc<dyn Fn(Message) -> HandlerFuture + Send + Sync>;

struct Registration {
    priority: u8,
    handler: Handler,
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LooperStats {
    pub processed: u64,
    pub unhandled: u64,
    pub handler_errors: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    unhandled: AtomicU64,
    handler_errors: AtomicU64,
}

/// Cloneable producer side of a looper's queue
#[derive(Clone)]
pub struct LooperSender {
    tx: mpsc::Sender<Message>,
}

impl LooperSender {
    /// Enqueue, waiting for capacity
    pub async fn push(&self, msg: Message) -> Result<(), LooperError> {
        self.tx.send(msg).await.map_err(|_| LooperError::Closed)
    }

    /// Enqueue without waiting
    pub fn try_push(&self, msg: Message) -> Result<(), LooperError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => LooperError::Full,
            mpsc::error::TrySendError::Closed(_) => LooperError::Closed,
        })
    }
}

/// Bounded queue plus handler table, consumed by a single loop
pub struct MessageLooper {
    tx: mpsc::Sender<Message>,
    rx: Mutex<Option<mpsc::Receiver<Message>>>,
    handlers: RwLock<BTreeMap<Action, Vec<Registration>>>,
    shutdown_tx: watch::Sender<bool>,
    reporter: Reporter,
    counters: Counters,
}

impl MessageLooper {
    /// Create a looper with an inbound queue of `capacity` messages
    pub fn new(capacity: usize, reporter: Reporter) -> Self {
        debug!(capacity, "MessageLooper::new: called");
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            handlers: RwLock::new(BTreeMap::new()),
            shutdown_tx,
            reporter,
            counters: Counters::default(),
        }
    }

    pub fn from_config(config: &LooperConfig, reporter: Reporter) -> Self {
        Self::new(config.queue_size, reporter)
    }

    /// Register a handler for `action`
    ///
    /// Handlers for the same action run in ascending `priority`; equal
    /// priorities run in registration order.
    pub fn add_handler<F, Fut>(&self, priority: u8, action: Action, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        debug!(priority, ?action, "MessageLooper::add_handler: called");
        let boxed: Handler = Arc::new(move |msg| -> HandlerFuture { Box::pin(handler(msg)) });
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let slot = handlers.entry(action).or_default();
        let at = slot.partition_point(|r| r.priority <= priority);
        slot.insert(
            at,
            Registration {
                priority,
                handler: boxed,
            },
        );
    }

    /// Number of handlers registered for `action`
    pub fn handler_count(&self, action: Action) -> usize {
        self.handlers
            .read()
            .map(|h| h.get(&action).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Producer handle for this looper's queue
    pub fn sender(&self) -> LooperSender {
        LooperSender { tx: self.tx.clone() }
    }

    pub fn stats(&self) -> LooperStats {
        LooperStats {
            processed: self.counters.processed.load(Ordering::Relaxed),
            unhandled: self.counters.unhandled.load(Ordering::Relaxed),
            handler_errors: self.counters.handler_errors.load(Ordering::Relaxed),
        }
    }

    /// Consume messages until `terminate` is called
    ///
    /// A looper runs at most once; a second call fails with `AlreadyRunning`.
    pub async fn run(&self) -> Result<(), LooperError> {
        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(LooperError::AlreadyRunning)?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("Message looper started");
        loop {
            tokio::select! {
                biased;

                // The watch::Ref guard must be dropped inside this branch
                _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                    debug!("MessageLooper::run: terminate received");
                    break;
                }

                msg = rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg).await,
                    None => break,
                },
            }
        }

        rx.close();
        info!("Message looper stopped");
        Ok(())
    }

    /// Stop consuming; does not interrupt an in-flight handler
    pub fn terminate(&self) {
        debug!("MessageLooper::terminate: called");
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_terminated(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    async fn dispatch(&self, msg: Message) {
        let action = msg.action();
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .map(|h| {
                h.get(&action)
                    .map(|regs| regs.iter().map(|r| r.handler.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(?action, id = %msg.info().id, "MessageLooper::dispatch: no handler");
            self.counters.unhandled.fetch_add(1, Ordering::Relaxed);
            return;
        }

        for handler in handlers {
            if let Err(e) = handler(msg.clone()).await {
                warn!(?action, id = %msg.info().id, error = %e, "Message handler failed");
                self.counters.handler_errors.fetch_add(1, Ordering::Relaxed);
                self.reporter.report("[looper]", &e).await;
            }
        }
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
    }
}
