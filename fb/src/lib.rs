//! FlitterBytes - binary codecs for flitter nodes
//!
//! Small, allocation-light helpers for the numeric payloads exchanged between
//! the referee and its workers. Everything is big-endian.
//!
//! # Layouts
//!
//! ```text
//! u16 / u32 / u64   fixed width, most significant byte first
//! f32               [len: u8 = 4][ieee754 be: 4 bytes]
//! [f32]             [count: u32 be][ieee754 be: 4 bytes] * count
//! ```
//!
//! Decoders read from the front of the slice and ignore trailing bytes, so a
//! caller can decode a prefix and slice off the rest itself.
//!
//! # Public API
//!
//! Every codec re-exported below is stable public API for programs that talk
//! to flitter nodes in binary. Flitter's own wire framing only needs the
//! `u32` pair; the `u64` and `f32` codecs exist for those external peers.

mod error;
mod float;
mod int;

pub use error::CodecError;
pub use float::{F32_WIDTH, read_f32, read_f32_array, write_f32, write_f32_array};
pub use int::{read_u16, read_u32, read_u64, write_u16, write_u32, write_u64};
