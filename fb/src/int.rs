//! Fixed-width big-endian unsigned integers

use log::debug;

use crate::CodecError;

fn take<const N: usize>(buf: &[u8]) -> Result<[u8; N], CodecError> {
    match buf.get(..N) {
        Some(bytes) => {
            let mut out = [0u8; N];
            out.copy_from_slice(bytes);
            Ok(out)
        }
        None => {
            debug!("take: short buffer needed={} got={}", N, buf.len());
            Err(CodecError::ShortBuffer {
                needed: N,
                got: buf.len(),
            })
        }
    }
}

/// Decode a `u16` from the first two bytes
pub fn read_u16(buf: &[u8]) -> Result<u16, CodecError> {
    take::<2>(buf).map(u16::from_be_bytes)
}

/// Decode a `u32` from the first four bytes
pub fn read_u32(buf: &[u8]) -> Result<u32, CodecError> {
    take::<4>(buf).map(u32::from_be_bytes)
}

/// Decode a `u64` from the first eight bytes
pub fn read_u64(buf: &[u8]) -> Result<u64, CodecError> {
    take::<8>(buf).map(u64::from_be_bytes)
}

/// Append a big-endian `u16`
pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a big-endian `u32`
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a big-endian `u64`
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16() {
        assert_eq!(read_u16(&[0x01, 0x02]), Ok(0x0102));
        assert_eq!(read_u16(&[0xff, 0xff, 0x00]), Ok(u16::MAX));
    }

    #[test]
    fn test_read_u32() {
        assert_eq!(read_u32(&[0x00, 0x00, 0x13, 0x88]), Ok(5000));
        assert_eq!(read_u32(&[0xde, 0xad, 0xbe, 0xef]), Ok(0xdead_beef));
    }

    #[test]
    fn test_read_u64() {
        let buf = [0, 0, 0, 0, 0, 0, 0x01, 0x00];
        assert_eq!(read_u64(&buf), Ok(256));
    }

    #[test]
    fn test_short_buffers_fail() {
        assert_eq!(read_u16(&[0x01]), Err(CodecError::ShortBuffer { needed: 2, got: 1 }));
        assert_eq!(read_u32(&[0x01, 0x02, 0x03]), Err(CodecError::ShortBuffer { needed: 4, got: 3 }));
        assert_eq!(read_u64(&[]), Err(CodecError::ShortBuffer { needed: 8, got: 0 }));
    }

    #[test]
    fn test_write_is_big_endian() {
        let mut out = Vec::new();
        write_u16(&mut out, 0x0102);
        write_u32(&mut out, 0x0304_0506);
        assert_eq!(out, vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    proptest::proptest! {
        #[test]
        fn prop_u64_survives_write_read(value in proptest::num::u64::ANY, tail in proptest::collection::vec(proptest::num::u8::ANY, 0..4)) {
            let mut out = Vec::new();
            write_u64(&mut out, value);
            out.extend_from_slice(&tail);
            proptest::prop_assert_eq!(read_u64(&out), Ok(value));
        }
    }
}
