//! Packed (ring, phi bin) keys.
//!
//! Mirrors the register layout of the stage-1 firmware: the r/z ring sits
//! in a 6-bit field above a `phi_bits` wide phi field.
//!
//! ```text
//!  31 .. phi_bits+6 | phi_bits+5 .. phi_bits | phi_bits-1 .. 0
//!       unused      |      ring (6 bits)     |    phi bin
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Width of the ring field.
pub const RING_BITS: u32 = 6;
/// Mask of the ring field.
pub const RING_MASK: u32 = 0x3f;
/// Number of rings addressable by the ring field.
pub const MAX_RINGS: usize = 1 << RING_BITS;
/// Widest phi field that still leaves room for the ring in 32 bits.
pub const MAX_PHI_BITS: u32 = 32 - RING_BITS;

/// A (ring, phi bin) pair packed into one integer.
///
/// Keys order ring-major, then by phi bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PackedBin(u32);

impl PackedBin {
    /// Returns the raw key.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Field layout used to pack and unpack keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinLayout {
    phi_bits: u32,
}

impl Default for BinLayout {
    /// One phi bit: two phi bins per ring.
    fn default() -> Self {
        Self { phi_bits: 1 }
    }
}

impl BinLayout {
    /// Creates a layout with the given phi field width.
    ///
    /// Widths above [`MAX_PHI_BITS`] are clamped; configuration validation
    /// rejects them before they reach here.
    #[must_use]
    pub const fn new(phi_bits: u32) -> Self {
        let phi_bits = if phi_bits > MAX_PHI_BITS {
            MAX_PHI_BITS
        } else {
            phi_bits
        };
        Self { phi_bits }
    }

    /// Width of the phi field.
    #[inline]
    #[must_use]
    pub fn phi_bits(self) -> u32 {
        self.phi_bits
    }

    /// Mask of the phi field.
    #[inline]
    #[must_use]
    pub fn phi_mask(self) -> u32 {
        (1u32 << self.phi_bits) - 1
    }

    /// Number of phi bins the field can address.
    #[inline]
    #[must_use]
    pub fn phi_capacity(self) -> usize {
        1usize << self.phi_bits
    }

    /// Packs a ring and phi bin. Bits outside each field are discarded,
    /// as the hardware register would.
    #[inline]
    #[must_use]
    pub fn pack(self, ring: u32, phi_bin: u32) -> PackedBin {
        PackedBin(((ring & RING_MASK) << self.phi_bits) | (phi_bin & self.phi_mask()))
    }

    /// Recovers `(ring, phi_bin)` from a key.
    #[inline]
    #[must_use]
    pub fn unpack(self, key: PackedBin) -> (u32, u32) {
        ((key.0 >> self.phi_bits) & RING_MASK, key.0 & self.phi_mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_rings_default_layout() {
        let layout = BinLayout::default();
        for ring in 0..MAX_RINGS as u32 {
            for phi in 0..2 {
                assert_eq!(layout.unpack(layout.pack(ring, phi)), (ring, phi));
            }
        }
    }

    #[test]
    fn test_roundtrip_wide_phi_field() {
        let layout = BinLayout::new(5);
        for ring in [0, 1, 31, 63] {
            for phi in 0..32 {
                assert_eq!(layout.unpack(layout.pack(ring, phi)), (ring, phi));
            }
        }
    }

    #[test]
    fn test_firmware_register_layout() {
        let layout = BinLayout::default();
        assert_eq!(layout.pack(0, 1).raw(), 0b1);
        assert_eq!(layout.pack(1, 0).raw(), 0b10);
        assert_eq!(layout.pack(63, 1).raw(), 0x7f);
    }

    #[test]
    fn test_out_of_field_bits_are_masked() {
        let layout = BinLayout::default();
        assert_eq!(layout.pack(64, 2), layout.pack(0, 0));
    }

    #[test]
    fn test_keys_order_ring_major() {
        let layout = BinLayout::new(3);
        assert!(layout.pack(0, 7) < layout.pack(1, 0));
        assert!(layout.pack(4, 2) < layout.pack(4, 3));
    }

    #[test]
    fn test_phi_bits_clamped() {
        let layout = BinLayout::new(40);
        assert_eq!(layout.phi_bits(), MAX_PHI_BITS);
        assert_eq!(layout.unpack(layout.pack(63, 12345)), (63, 12345));
    }
}
