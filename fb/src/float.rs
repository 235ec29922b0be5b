//! Length-prefixed IEEE-754 floats and float arrays

use log::debug;

use crate::CodecError;
use crate::int::{read_u32, write_u32};

/// Encoded width of a single `f32` body
pub const F32_WIDTH: usize = 4;

/// Decode a length-prefixed `f32`
///
/// The prefix byte must be `4`; the body is big-endian IEEE-754.
pub fn read_f32(buf: &[u8]) -> Result<f32, CodecError> {
    let Some(&prefix) = buf.first() else {
        return Err(CodecError::ShortBuffer { needed: 1, got: 0 });
    };
    if prefix as usize != F32_WIDTH {
        debug!("read_f32: bad prefix {}", prefix);
        return Err(CodecError::BadFloatPrefix(prefix));
    }
    let body = &buf[1..];
    read_u32(body)
        .map(f32::from_bits)
        .map_err(|_| CodecError::ShortBuffer {
            needed: 1 + F32_WIDTH,
            got: buf.len(),
        })
}

/// Decode a count-prefixed array of `f32`
pub fn read_f32_array(buf: &[u8]) -> Result<Vec<f32>, CodecError> {
    let count = read_u32(buf)? as usize;
    let needed = 4 + count * F32_WIDTH;
    if buf.len() < needed {
        debug!("read_f32_array: count={} needs {} bytes, got {}", count, needed, buf.len());
        return Err(CodecError::ShortBuffer { needed, got: buf.len() });
    }

    let body = &buf[4..needed];
    let mut out = Vec::with_capacity(count);
    for chunk in body.chunks_exact(F32_WIDTH) {
        out.push(f32::from_bits(read_u32(chunk)?));
    }
    Ok(out)
}

/// Append a length-prefixed `f32`
pub fn write_f32(out: &mut Vec<u8>, value: f32) {
    out.push(F32_WIDTH as u8);
    write_u32(out, value.to_bits());
}

/// Append a count-prefixed array of `f32`
pub fn write_f32_array(out: &mut Vec<u8>, values: &[f32]) {
    write_u32(out, values.len() as u32);
    for value in values {
        write_u32(out, value.to_bits());
    }
}
