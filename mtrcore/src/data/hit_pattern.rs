use serde::{Deserialize, Serialize};

use crate::chamber::constants::N_TRIGGER_CHAMBERS;

/// cathode index of the bending plane inside the hit pattern
pub const BENDING_CATHODE: usize = 0;
/// cathode index of the non-bending plane inside the hit pattern
pub const NON_BENDING_CATHODE: usize = 1;

/// marker set on tracks that passed the efficiency sampling
pub const KEPT_BIT: u16 = 0x8000;

const EFF_FLAG_SHIFT: u16 = 8;
const EFF_FLAG_MASK: u16 = 0x3;
const SLAT_SHIFT: u16 = 10;
const SLAT_MASK: u16 = 0x1F;

/// Bit-packed trigger chamber information of a muon track.
///
/// Layout of the 16 bit word:
///
/// * bits 0-7: fired cells, cell (cathode c, chamber i) is bit `7 - (4c + i)`
/// * bits 8-9: efficiency flag (which elements the track crossed)
/// * bits 10-14: RPC (slat) index or auxiliary information
/// * bit 15: kept marker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitPattern(pub u16);

impl HitPattern {
    pub fn raw(self) -> u16 {
        self.0
    }

    fn cell_bit(cathode: usize, chamber: usize) -> u16 {
        1 << (7 - (4 * cathode + chamber))
    }

    /// true if the given cathode of the given chamber (0 to 3) fired
    pub fn is_chamber_hit(self, cathode: usize, chamber: usize) -> bool {
        if cathode > NON_BENDING_CATHODE || chamber >= N_TRIGGER_CHAMBERS {
            return false;
        }
        self.0 & Self::cell_bit(cathode, chamber) != 0
    }

    pub fn with_chamber_hit(self, cathode: usize, chamber: usize) -> Self {
        if cathode > NON_BENDING_CATHODE || chamber >= N_TRIGGER_CHAMBERS {
            return self;
        }
        HitPattern(self.0 | Self::cell_bit(cathode, chamber))
    }

    /// fired flags of one cathode, chamber 0 first
    pub fn hits(self, cathode: usize) -> [bool; N_TRIGGER_CHAMBERS] {
        let mut out = [false; N_TRIGGER_CHAMBERS];
        for (chamber, hit) in out.iter_mut().enumerate() {
            *hit = self.is_chamber_hit(cathode, chamber);
        }
        out
    }

    /// number of chambers with a hit on the given cathode
    pub fn n_hits(self, cathode: usize) -> usize {
        self.hits(cathode).iter().filter(|&&h| h).count()
    }

    /// raw efficiency flag (0 to 3)
    pub fn eff_flag(self) -> u16 {
        (self.0 >> EFF_FLAG_SHIFT) & EFF_FLAG_MASK
    }

    /// RPC index or auxiliary information (0 to 31)
    pub fn slat_or_info(self) -> u16 {
        (self.0 >> SLAT_SHIFT) & SLAT_MASK
    }

    /// replace the efficiency flag and the slat field, values are truncated to their bit width
    pub fn with_eff_info(self, eff_flag: u16, slat_or_info: u16) -> Self {
        let cleared = self.0 & !(EFF_FLAG_MASK << EFF_FLAG_SHIFT) & !(SLAT_MASK << SLAT_SHIFT);
        HitPattern(
            cleared
                | ((eff_flag & EFF_FLAG_MASK) << EFF_FLAG_SHIFT)
                | ((slat_or_info & SLAT_MASK) << SLAT_SHIFT),
        )
    }

    pub fn is_kept(self) -> bool {
        self.0 & KEPT_BIT != 0
    }

    pub fn mark_kept(self) -> Self {
        HitPattern(self.0 | KEPT_BIT)
    }
}

impl From<u16> for HitPattern {
    fn from(raw: u16) -> Self {
        HitPattern(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_bits() {
        // bending chamber 0 is the most significant of the low byte
        assert!(HitPattern(0x80).is_chamber_hit(BENDING_CATHODE, 0));
        assert!(HitPattern(0x10).is_chamber_hit(BENDING_CATHODE, 3));
        assert!(HitPattern(0x08).is_chamber_hit(NON_BENDING_CATHODE, 0));
        assert!(HitPattern(0x01).is_chamber_hit(NON_BENDING_CATHODE, 3));
        assert!(!HitPattern(0x01).is_chamber_hit(BENDING_CATHODE, 3));
        assert!(!HitPattern(0xFF).is_chamber_hit(2, 0));
    }

    #[test]
    fn test_hits_and_counts() {
        let pattern = HitPattern::default()
            .with_chamber_hit(BENDING_CATHODE, 0)
            .with_chamber_hit(BENDING_CATHODE, 2)
            .with_chamber_hit(BENDING_CATHODE, 3)
            .with_chamber_hit(NON_BENDING_CATHODE, 1);
        assert_eq!(pattern.hits(BENDING_CATHODE), [true, false, true, true]);
        assert_eq!(pattern.n_hits(BENDING_CATHODE), 3);
        assert_eq!(pattern.n_hits(NON_BENDING_CATHODE), 1);
        assert_eq!(pattern.raw(), 0xB4);
    }

    #[test]
    fn test_eff_info_layout() {
        let pattern = HitPattern(0x00FF).with_eff_info(2, 17);
        assert_eq!(pattern.eff_flag(), 2);
        assert_eq!(pattern.slat_or_info(), 17);
        assert_eq!(pattern.raw() & 0xFF, 0xFF);
        assert_eq!(pattern.raw(), 0x00FF | (2 << 8) | (17 << 10));

        let replaced = pattern.with_eff_info(3, 0);
        assert_eq!(replaced.eff_flag(), 3);
        assert_eq!(replaced.slat_or_info(), 0);
        assert!(!replaced.is_kept());
    }

    #[test]
    fn test_kept_marker() {
        let pattern = HitPattern(0x00FF).with_eff_info(3, 5);
        let kept = pattern.mark_kept();
        assert!(kept.is_kept());
        assert_eq!(kept.raw() & !KEPT_BIT, pattern.raw());
        assert_eq!(kept.eff_flag(), 3);
        assert_eq!(kept.slat_or_info(), 5);
    }
}
