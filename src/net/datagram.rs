// Wire codec for the inbound/outbound fixed-layout datagrams.
//
// The original implementation reads/writes a `#[repr(C, packed)]` struct
// directly over the socket buffer, relying on platform-native layout. This
// codec does the portable equivalent: explicit little-endian field encoding,
// per spec.md's own note that mixed-endianness targets should fix byte order.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Samples per block; every datagram carries exactly one block.
pub const BLOCK_LEN: usize = 128;
/// Inbound wire size: u64 seq + u16 out_port + 128 * f32 samples.
pub const INBOUND_LEN: usize = 8 + 2 + BLOCK_LEN * 4;
/// Outbound wire size: 128 * f32 samples, no header.
pub const OUTBOUND_LEN: usize = BLOCK_LEN * 4;

/// One inbound datagram: a sequence number, a destination port, and a block.
#[derive(Debug, Clone, Copy)]
pub struct Datagram {
    pub seq: u64,
    pub out_port: u16,
    pub samples: [f32; BLOCK_LEN],
}

impl Datagram {
    /// Decodes a datagram from exactly `INBOUND_LEN` bytes; `None` on any
    /// short read or malformed buffer, per the silent-drop error policy.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != INBOUND_LEN {
            return None;
        }

        let mut cursor = Cursor::new(buf);
        let seq = cursor.read_u64::<LittleEndian>().ok()?;
        let out_port = cursor.read_u16::<LittleEndian>().ok()?;

        let mut samples = [0f32; BLOCK_LEN];
        for sample in samples.iter_mut() {
            *sample = cursor.read_f32::<LittleEndian>().ok()?;
        }

        Some(Self {
            seq,
            out_port,
            samples,
        })
    }

    /// Encodes this datagram back to wire bytes (used by tests and the dump tool).
    #[cfg(test)]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INBOUND_LEN);
        buf.write_u64::<LittleEndian>(self.seq).unwrap();
        buf.write_u16::<LittleEndian>(self.out_port).unwrap();
        for &sample in &self.samples {
            buf.write_f32::<LittleEndian>(sample).unwrap();
        }
        buf
    }
}

/// Encodes a 128-sample output block as the 512-byte outbound wire format.
pub fn encode_block(samples: &[f32; BLOCK_LEN]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(OUTBOUND_LEN);
    for &sample in samples {
        buf.write_f32::<LittleEndian>(sample).unwrap();
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_wire_format() {
        let mut samples = [0.0; BLOCK_LEN];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = i as f32 * 0.01;
        }
        let dg = Datagram {
            seq: 42,
            out_port: 7777,
            samples,
        };

        let bytes = dg.encode();
        assert_eq!(bytes.len(), INBOUND_LEN);

        let decoded = Datagram::decode(&bytes).expect("decode");
        assert_eq!(decoded.seq, 42);
        assert_eq!(decoded.out_port, 7777);
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn short_read_is_rejected() {
        let buf = vec![0u8; INBOUND_LEN - 1];
        assert!(Datagram::decode(&buf).is_none());
    }

    #[test]
    fn oversized_read_is_rejected() {
        let buf = vec![0u8; INBOUND_LEN + 1];
        assert!(Datagram::decode(&buf).is_none());
    }

    #[test]
    fn outbound_block_is_512_bytes() {
        let samples = [1.0f32; BLOCK_LEN];
        assert_eq!(encode_block(&samples).len(), OUTBOUND_LEN);
    }
}
