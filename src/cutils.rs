//! Small byte-level helpers shared by the emitter and the serializer.

use zerocopy::byteorder::big_endian;

/// Split a 16-bit instruction distance into two byte-sized argument slots.
///
/// The high byte goes into the first slot, so the pair reads big-endian when
/// the decoder reassembles it with [`join_counter`].
pub fn split_counter(oc: u16) -> (u8, u8) {
    let bytes = big_endian::U16::new(oc).to_bytes();
    (bytes[0], bytes[1])
}

/// Reassemble a 16-bit instruction distance from two argument slots.
pub fn join_counter(id1: u8, id2: u8) -> u16 {
    big_endian::U16::from_bytes([id1, id2]).get()
}

pub fn get_u16(tab: &[u8]) -> u16 {
    debug_assert!(tab.len() >= 2);
    big_endian::U16::from_bytes([tab[0], tab[1]]).get()
}

pub fn put_u16(tab: &mut [u8], val: u16) {
    debug_assert!(tab.len() >= 2);
    tab[..2].copy_from_slice(&big_endian::U16::new(val).to_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_join_roundtrip() {
        for oc in [0u16, 1, 0xff, 0x100, 0x1234, u16::MAX] {
            let (id1, id2) = split_counter(oc);
            assert_eq!(join_counter(id1, id2), oc);
        }
    }

    #[test]
    fn split_is_big_endian() {
        let (id1, id2) = split_counter(0x0102);
        assert_eq!(id1, 0x01);
        assert_eq!(id2, 0x02);
    }

    #[test]
    fn u16_slice_accessors() {
        let mut buf = [0u8; 4];
        put_u16(&mut buf[1..], 0xbeef);
        assert_eq!(get_u16(&buf[1..]), 0xbeef);
        assert_eq!(buf[0], 0);
    }
}
