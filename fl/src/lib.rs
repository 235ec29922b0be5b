//! Flitter - referee-coordinated directory for named worker groups
//!
//! A referee process keeps, per group, a tree of the workers that registered
//! under that group. Workers register by sending a peer `Refer` ask carrying
//! their `<group>/<host>:<port>` path; the referee stores it once and answers
//! with the canonical path on the worker's own listener. Clients resolve the
//! n-th member of a group with a request/reply event.
//!
//! # Modules
//!
//! - [`node`] - node paths and per-group trees
//! - [`message`] - peer message envelope and the dispatch looper
//! - [`service`] - the service table and the name service
//! - [`referee`] - accept loop and routing
//! - [`transport`] - framing, TCP transport, referee client, worker endpoint
//! - [`report`] - bounded error reporting queue
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod message;
pub mod node;
pub mod referee;
pub mod report;
pub mod service;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use message::{Action, Message, MessageInfo, MessageLooper, MessageState};
pub use node::{NodeInfo, NodePath, NodeTree};
pub use referee::{Referee, RefereeError};
pub use report::{OverflowPolicy, ReportDrain, Reporter};
pub use service::{NameError, NameRegistry, NameService, Service, ServiceKind, ServiceTable};
pub use transport::{RefereeClient, TcpTransport, Transport, TransportError, WorkerEndpoint};
