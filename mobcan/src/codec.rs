//! Packing of 29-bit identifiers and masks into the identifier registers
//!
//! The four identifier (and mask) registers hold the value shifted left by
//! three bits; the freed low bits of the least significant register carry
//! protocol flags (RTRTAG/RB1TAG/RB0TAG for identifiers, RTRMSK/IDEMSK for
//! masks). Arrays are ordered like [`MobRegister::IDENTIFIER`]: element 0 is
//! IDT1, the most significant register.
//!
//! [`MobRegister::IDENTIFIER`]: mobcan_core::MobRegister::IDENTIFIER

use crate::reg::{IDEMSK, RTRMSK};
use embedded_can::ExtendedId;

const FLAG_BITS: u32 = 3;

/// Register representation of `id`
pub fn encode_id(id: ExtendedId) -> [u8; 4] {
    (id.as_raw() << FLAG_BITS).to_be_bytes()
}

/// Identifier held by the register values `regs`. Flag bits are ignored.
pub fn decode_id(regs: [u8; 4]) -> ExtendedId {
    let raw = u32::from_be_bytes(regs) >> FLAG_BITS;
    // Safety: Shifting out the flag bits leaves at most 29 significant bits.
    unsafe { ExtendedId::new_unchecked(raw) }
}

/// Register representation of `mask`
///
/// Remote frames and standard frames always match: RTRMSK and IDEMSK are
/// forced on regardless of the input.
pub fn encode_mask(mask: ExtendedId) -> [u8; 4] {
    let mut regs = encode_id(mask);
    regs[3] |= RTRMSK | IDEMSK;
    regs
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(raw: u32) -> ExtendedId {
        ExtendedId::new(raw).unwrap()
    }

    fn samples() -> impl Iterator<Item = u32> {
        let edges = [0, 1, 0x7, 0x100, 0x7FF, 0x800, 0x1FFF_FFFE, 0x1FFF_FFFF];
        edges
            .into_iter()
            .chain((0..=ExtendedId::MAX.as_raw()).step_by(7919))
            .chain((0..29).map(|bit| 1 << bit))
    }

    #[test]
    fn round_trip_over_identifier_range() {
        for raw in samples() {
            assert_eq!(decode_id(encode_id(id(raw))).as_raw(), raw);
        }
    }

    #[test]
    fn identifier_layout_is_big_endian_shifted() {
        assert_eq!(encode_id(id(0x1FFF_FFFF)), [0xFF, 0xFF, 0xFF, 0xF8]);
        assert_eq!(encode_id(id(0x100)), [0x00, 0x00, 0x08, 0x00]);
        assert_eq!(encode_id(id(0x1234_5678)), [0x91, 0xA2, 0xB3, 0xC0]);
    }

    #[test]
    fn decoding_ignores_flag_bits() {
        assert_eq!(decode_id([0, 0, 0, 0x07]).as_raw(), 0);
        assert_eq!(decode_id([0, 0, 0, 0xFF]).as_raw(), 0x1F);
    }

    #[test]
    fn mask_always_relaxes_remote_and_extension_bits() {
        for raw in samples() {
            let regs = encode_mask(id(raw));
            assert_eq!(regs[3] & (RTRMSK | IDEMSK), RTRMSK | IDEMSK);
            assert_eq!(decode_id(regs).as_raw(), raw);
        }
        assert_eq!(encode_mask(ExtendedId::ZERO), [0, 0, 0, 0x05]);
    }
}
