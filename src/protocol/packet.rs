//! Packet framing: 3-byte little-endian payload length and a sequence id.
//!
//! Payloads of `MAX_PAYLOAD_LEN` bytes or more are split; a payload whose
//! length is an exact multiple of the maximum is followed by an empty packet.

use crate::error::{Error, Result};

/// Largest payload carried by one packet.
pub const MAX_PAYLOAD_LEN: usize = 0xff_ffff;

/// Length of the packet header.
pub const HEADER_LEN: usize = 4;

/// Encode a packet header.
pub fn encode_header(len: usize, sequence_id: u8) -> [u8; HEADER_LEN] {
    let len = len.min(MAX_PAYLOAD_LEN) as u32;
    let [a, b, c, _] = len.to_le_bytes();
    [a, b, c, sequence_id]
}

/// Decode a packet header into payload length and sequence id.
pub fn decode_header(header: [u8; HEADER_LEN]) -> (usize, u8) {
    let [a, b, c, sequence_id] = header;
    (u32::from_le_bytes([a, b, c, 0]) as usize, sequence_id)
}

/// Check the sequence id of a received packet.
pub fn check_sequence(expected: u8, actual: u8) -> Result<()> {
    if expected != actual {
        return Err(Error::Protocol(format!(
            "packet out of order: expected sequence {expected}, got {actual}"
        )));
    }
    Ok(())
}

/// Split a payload into packet-sized chunks.
pub fn chunks(payload: &[u8]) -> impl Iterator<Item = &[u8]> {
    let trailing = payload.len() % MAX_PAYLOAD_LEN == 0;
    payload
        .chunks(MAX_PAYLOAD_LEN)
        .chain(trailing.then_some(&[][..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header() {
        assert_eq!(encode_header(0x01_02_03, 7), [0x03, 0x02, 0x01, 7]);
        assert_eq!(decode_header([0xff, 0xff, 0xff, 1]), (MAX_PAYLOAD_LEN, 1));
    }

    #[test]
    fn split_payloads() {
        assert_eq!(chunks(b"\x03select 1").count(), 1);
        assert_eq!(chunks(&[]).collect::<Vec<_>>(), [&[] as &[u8]]);

        let exact = vec![0u8; MAX_PAYLOAD_LEN];
        let parts: Vec<usize> = chunks(&exact).map(<[u8]>::len).collect();
        assert_eq!(parts, [MAX_PAYLOAD_LEN, 0]);

        let over = vec![0u8; MAX_PAYLOAD_LEN + 5];
        let parts: Vec<usize> = chunks(&over).map(<[u8]>::len).collect();
        assert_eq!(parts, [MAX_PAYLOAD_LEN, 5]);
    }

    #[test]
    fn sequence_mismatch() {
        assert!(check_sequence(1, 1).is_ok());
        assert!(matches!(check_sequence(1, 3), Err(Error::Protocol(_))));
    }
}
