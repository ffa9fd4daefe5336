// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Serial frame protocol: length detection, checksum, resynchronization

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::constants::{FRAME_LEN, MAX_VARIABLE_LEN};
use crate::error::ParadoxError;

/// 8-bit additive checksum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// True when the last byte of `frame` is the checksum of everything before it.
pub fn verify_checksum(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((last, body)) if !body.is_empty() => checksum(body) == *last,
        _ => false,
    }
}

/// Append the checksum byte to a frame body.
pub fn with_checksum(mut body: Vec<u8>) -> Vec<u8> {
    let cs = checksum(&body);
    body.push(cs);
    body
}

/// Expected length of the frame starting at `buf[0]`.
///
/// Returns `None` when more bytes are needed to decide.
pub fn frame_length(buf: &[u8]) -> Option<usize> {
    let first = *buf.first()?;
    let len = match first >> 4 {
        0x0 => FRAME_LEN,
        0x1 | 0x3..=0x9 => {
            let b1 = *buf.get(1)? as usize;
            if b1 > 0 && b1 <= MAX_VARIABLE_LEN {
                b1
            } else {
                FRAME_LEN
            }
        }
        0xA | 0xB | 0xD => *buf.get(1)? as usize,
        0xC => {
            let hi = *buf.get(1)? as usize;
            let lo = *buf.get(2)? as usize;
            (hi << 8) | lo
        }
        0xE => {
            let b1 = *buf.get(1)? as usize;
            if (FRAME_LEN..0xFF).contains(&b1) {
                b1
            } else {
                FRAME_LEN
            }
        }
        _ => FRAME_LEN,
    };
    Some(len)
}

/// Deframes the panel's serial byte stream.
///
/// A candidate frame is accepted only when its checksum verifies; otherwise
/// the buffer is advanced by one byte and the search restarts.
#[derive(Debug, Clone, Default)]
pub struct SerialFrameCodec {
    dump_packets: bool,
}

impl SerialFrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every accepted and emitted frame as hex at debug level.
    pub fn with_packet_dump(mut self, enabled: bool) -> Self {
        self.dump_packets = enabled;
        self
    }
}

impl Decoder for SerialFrameCodec {
    type Item = Bytes;
    type Error = ParadoxError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(len) = frame_length(src) else {
                return Ok(None);
            };
            if len < 3 {
                trace!("Impossible frame length {} at 0x{:02x}, skipping byte", len, src[0]);
                src.advance(1);
                continue;
            }
            if src.len() < len {
                return Ok(None);
            }
            if verify_checksum(&src[..len]) {
                let frame = src.split_to(len).freeze();
                if self.dump_packets {
                    debug!("PC <- A {}", hex(&frame));
                }
                return Ok(Some(frame));
            }
            trace!("Checksum mismatch at 0x{:02x}, resynchronizing", src[0]);
            src.advance(1);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A truncated candidate at end of stream cannot complete; keep scanning past it.
        loop {
            if let Some(frame) = self.decode(src)? {
                return Ok(Some(frame));
            }
            if src.is_empty() {
                return Ok(None);
            }
            src.advance(1);
        }
    }
}

impl Encoder<Bytes> for SerialFrameCodec {
    type Error = ParadoxError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.dump_packets {
            debug!("PC -> A {}", hex(&item));
        }
        dst.extend_from_slice(&item);
        Ok(())
    }
}

/// Space-free lowercase hex rendering for packet dumps.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp_frame(first: u8, fill: u8) -> Vec<u8> {
        let mut body = vec![fill; 36];
        body[0] = first;
        body[1] = 0x00;
        with_checksum(body)
    }

    fn decode_all(input: &[u8]) -> Vec<Bytes> {
        let mut codec = SerialFrameCodec::new();
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(frame) = codec.decode_eof(&mut buf).unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[0x50, 0x08, 0x00, 0x00, 0x9F, 0x00, 0x40]), 0x37);
        assert!(verify_checksum(&[0x50, 0x08, 0x00, 0x00, 0x9F, 0x00, 0x40, 0x37]));
        assert!(!verify_checksum(&[0x50, 0x08, 0x00, 0x00, 0x9F, 0x00, 0x40, 0x38]));
        assert!(!verify_checksum(&[0x12]));
    }

    #[test]
    fn test_frame_length_rules() {
        assert_eq!(frame_length(&[]), None);
        assert_eq!(frame_length(&[0x00]), Some(37));
        assert_eq!(frame_length(&[0x52]), None);
        assert_eq!(frame_length(&[0x52, 0x47]), Some(71));
        assert_eq!(frame_length(&[0x52, 0x48]), Some(37));
        assert_eq!(frame_length(&[0x42, 0x00]), Some(37));
        assert_eq!(frame_length(&[0x12, 0x14]), Some(20));
        assert_eq!(frame_length(&[0xD0, 0x1F]), Some(31));
        assert_eq!(frame_length(&[0xA0, 0x05]), Some(5));
        assert_eq!(frame_length(&[0xC0, 0x01]), None);
        assert_eq!(frame_length(&[0xC0, 0x01, 0x02]), Some(258));
        assert_eq!(frame_length(&[0xE2, 0xFF]), Some(37));
        assert_eq!(frame_length(&[0xE2, 0x14]), Some(37));
        assert_eq!(frame_length(&[0xE2, 0x40]), Some(64));
        assert_eq!(frame_length(&[0x20]), Some(37));
        assert_eq!(frame_length(&[0xF0]), Some(37));
    }

    #[test]
    fn test_decode_single_frame() {
        let frame = sp_frame(0x42, 0x00);
        let frames = decode_all(&frame);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
    }

    #[test]
    fn test_decode_waits_for_more() {
        let frame = sp_frame(0x42, 0x01);
        let mut codec = SerialFrameCodec::new();
        let mut buf = BytesMut::from(&frame[..20]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&frame[20..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &frame[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_with_garbage() {
        let f1 = sp_frame(0x42, 0x00);
        let f2 = with_checksum(vec![0x52, 0x08, 0x80, 0x00, 0x00, 0x01, 0x10]);
        let f3 = sp_frame(0xE2, 0x20);

        let mut stream = vec![0x13, 0x37];
        stream.extend_from_slice(&f1);
        stream.extend_from_slice(&[0xFF]);
        stream.extend_from_slice(&f2);
        stream.extend_from_slice(&[0x99, 0x01]);
        stream.extend_from_slice(&f3);

        let frames = decode_all(&stream);
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], &f1[..]);
        assert_eq!(&frames[1][..], &f2[..]);
        assert_eq!(&frames[2][..], &f3[..]);
    }

    #[test]
    fn test_encoder_passes_bytes_verbatim() {
        let mut codec = SerialFrameCodec::new().with_packet_dump(true);
        let mut dst = BytesMut::new();
        codec
            .encode(Bytes::from_static(&[0x50, 0x08, 0x00, 0x00, 0x9F, 0x00, 0x40, 0x37]), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], &[0x50, 0x08, 0x00, 0x00, 0x9F, 0x00, 0x40, 0x37]);
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x0a, 0xff]), "0aff");
    }
}
