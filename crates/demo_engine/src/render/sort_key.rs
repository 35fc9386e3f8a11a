//! Render item sort keys
//!
//! The render queue orders items by an opaque `u64`. [`SortKey`] is the
//! conventional way to build one:
//!
//! ```text
//! bits 56..64  pass       (lowest pass draws first)
//! bits 24..56  depth      (quantized distance, or its inverse)
//! bits  0..24  material   (groups items sharing state)
//! ```
//!
//! Callers that need a different layout can submit raw keys instead.

use core::cmp::Ordering;

/// Packed ordering key for render items
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SortKey(u64);

impl SortKey {
    const PASS_SHIFT: u32 = 56;
    const DEPTH_SHIFT: u32 = 24;
    const MATERIAL_MASK: u64 = (1 << Self::DEPTH_SHIFT) - 1;
    const DEPTH_MASK: u64 = u32::MAX as u64;

    /// Largest material id that fits in the key
    pub const MAX_MATERIAL: u32 = Self::MATERIAL_MASK as u32;

    /// Key drawing nearer depths first (opaque geometry)
    ///
    /// Material ids above [`MAX_MATERIAL`](Self::MAX_MATERIAL) are
    /// truncated to their low 24 bits.
    #[inline]
    pub const fn new(pass: u8, depth: u32, material: u32) -> Self {
        Self(
            ((pass as u64) << Self::PASS_SHIFT)
                | ((depth as u64) << Self::DEPTH_SHIFT)
                | (material as u64 & Self::MATERIAL_MASK),
        )
    }

    /// Key drawing farther depths first (blended geometry)
    #[inline]
    pub const fn back_to_front(pass: u8, depth: u32, material: u32) -> Self {
        Self::new(pass, u32::MAX - depth, material)
    }

    /// Wrap a raw key
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw key value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Pass component
    #[inline]
    pub const fn pass(self) -> u8 {
        (self.0 >> Self::PASS_SHIFT) as u8
    }

    /// Depth component, as stored
    #[inline]
    pub const fn depth(self) -> u32 {
        ((self.0 >> Self::DEPTH_SHIFT) & Self::DEPTH_MASK) as u32
    }

    /// Material component
    #[inline]
    pub const fn material(self) -> u32 {
        (self.0 & Self::MATERIAL_MASK) as u32
    }

    /// Quantize a view distance into the depth component
    ///
    /// Distances are clamped to `[0, far]`; non-finite input maps to `far`.
    pub fn quantize_depth(distance: f32, far: f32) -> u32 {
        if !distance.is_finite() || far <= 0.0 {
            return u32::MAX;
        }
        let normalized = (distance / far).clamp(0.0, 1.0);
        (f64::from(normalized) * f64::from(u32::MAX)) as u32
    }
}

impl Ord for SortKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for SortKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<SortKey> for u64 {
    fn from(key: SortKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_round_trip() {
        let key = SortKey::new(3, 0xDEAD_BEEF, 0x12_3456);
        assert_eq!(key.pass(), 3);
        assert_eq!(key.depth(), 0xDEAD_BEEF);
        assert_eq!(key.material(), 0x12_3456);
    }

    #[test]
    fn test_pass_dominates_depth_and_material() {
        let early = SortKey::new(0, u32::MAX, SortKey::MAX_MATERIAL);
        let late = SortKey::new(1, 0, 0);
        assert!(early < late);
    }

    #[test]
    fn test_back_to_front_inverts_depth_order() {
        let near = SortKey::back_to_front(2, 10, 0);
        let far = SortKey::back_to_front(2, 1000, 0);
        assert!(far < near);
    }

    #[test]
    fn test_material_is_masked() {
        let key = SortKey::new(0, 0, u32::MAX);
        assert_eq!(key.material(), SortKey::MAX_MATERIAL);
        assert_eq!(key.depth(), 0);
    }

    #[test]
    fn test_quantize_depth() {
        assert_eq!(SortKey::quantize_depth(0.0, 100.0), 0);
        assert_eq!(SortKey::quantize_depth(100.0, 100.0), u32::MAX);
        assert_eq!(SortKey::quantize_depth(250.0, 100.0), u32::MAX);
        assert_eq!(SortKey::quantize_depth(f32::NAN, 100.0), u32::MAX);
        assert!(SortKey::quantize_depth(10.0, 100.0) < SortKey::quantize_depth(20.0, 100.0));
    }
}
