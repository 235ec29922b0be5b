//! Network plumbing between referee, workers and clients
//!
//! Two kinds of traffic share one framing: client events are request/reply
//! on a single connection, peer messages are one-way and each opens its own
//! connection.

mod client;
mod error;
pub mod frame;
mod router;
mod tcp;
mod worker;

pub use client::RefereeClient;
pub use error::TransportError;
pub use frame::{Frame, read_frame, write_frame};
pub use router::{ClientHandler, ClientRouter};
pub use tcp::{TcpTransport, Transport};
pub use worker::WorkerEndpoint;
