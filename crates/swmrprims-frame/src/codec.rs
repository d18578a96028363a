use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Append `samples` to `dst` as little-endian `u32`s.
pub fn encode_samples(samples: &[u32], dst: &mut BytesMut) {
    dst.reserve(samples.len() * 4);
    for &sample in samples {
        dst.put_u32_le(sample);
    }
}

/// Decode little-endian `u32`s from `src` into `out`.
///
/// `src` must hold exactly `out.len()` samples.
pub fn decode_samples(mut src: &[u8], out: &mut [u32]) -> Result<()> {
    if src.len() != out.len() * 4 {
        return Err(FrameError::LengthMismatch {
            expected: out.len() * 4,
            actual: src.len(),
        });
    }
    for sample in out.iter_mut() {
        *sample = src.get_u32_le();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_little_endian() {
        let mut buf = BytesMut::new();
        encode_samples(&[1, 0x0403_0201], &mut buf);
        assert_eq!(buf.as_ref(), &[1, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn encode_appends() {
        let mut buf = BytesMut::from(&b"xy"[..]);
        encode_samples(&[7], &mut buf);
        assert_eq!(buf.len(), 6);
        assert_eq!(&buf[..2], b"xy");
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let mut out = [0u32; 2];
        let err = decode_samples(&[0u8; 7], &mut out).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn decode_reads_samples_in_order() {
        let mut out = [0u32; 2];
        decode_samples(&[5, 0, 0, 0, 0, 1, 0, 0], &mut out).unwrap();
        assert_eq!(out, [5, 256]);
    }
}
