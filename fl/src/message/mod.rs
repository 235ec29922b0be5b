//! Messages and the per-service dispatch loop
//!
//! Peer traffic travels as [`Message`] envelopes. A message's state follows
//! `Ask -> Succeed | Error`; only `Ask` drives new work in a handler.

mod looper;
mod types;

pub use looper::{Handler, HandlerError, HandlerFuture, LooperError, LooperSender, LooperStats, MessageLooper};
pub use types::{Action, Message, MessageInfo, MessageState};
