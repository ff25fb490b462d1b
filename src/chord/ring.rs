use sha2::{Digest, Sha256};

use crate::error::ChordError;

/// A position in the identifier space `[0, 2^M)`.
pub type Ident = u64;

/// The circular identifier space all nodes of one ring share. `bits` is the
/// constant M: fixed at startup and identical across the whole ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingSpace {
    bits: u8,
}

impl RingSpace {
    pub fn new(bits: u8) -> Result<Self, ChordError> {
        // 1 << 64 would overflow the identifier type
        if bits == 0 || bits > 63 {
            return Err(ChordError::InvalidBitWidth { bits });
        }
        Ok(RingSpace { bits })
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Number of identifiers on the ring, `2^M`.
    pub fn modulus(&self) -> u64 {
        1u64 << self.bits
    }

    fn mask(&self) -> u64 {
        self.modulus() - 1
    }

    pub fn contains(&self, id: u64) -> bool {
        id < self.modulus()
    }

    /// Validates an externally supplied identifier.
    pub fn check(&self, id: u64) -> Result<Ident, ChordError> {
        if self.contains(id) {
            Ok(id)
        } else {
            Err(ChordError::IdentifierOutOfRange {
                id,
                modulus: self.modulus(),
            })
        }
    }

    /// Validates a finger-table index against `[1, M]`.
    pub fn check_index(&self, index: u32) -> Result<usize, ChordError> {
        if (1..=self.bits as u32).contains(&index) {
            Ok(index as usize)
        } else {
            Err(ChordError::IndexOutOfRange {
                index,
                bits: self.bits,
            })
        }
    }

    /// Tests whether `x` lies strictly inside the open interval
    /// `(start, end)` on the ring. Both endpoints are always excluded; when
    /// `start > end` the interval wraps through zero and splits into
    /// `(start, 2^M - 1] ∪ [0, end)`.
    pub fn in_range(&self, x: Ident, start: Ident, end: Ident) -> bool {
        if start <= end {
            x > start && x < end
        } else {
            x > start || x < end
        }
    }

    /// Start of finger interval `i` (1-based) for a node: `id + 2^(i-1)`.
    pub fn finger_start(&self, id: Ident, i: usize) -> Ident {
        debug_assert!((1..=self.bits as usize).contains(&i));
        id.wrapping_add(1u64 << (i - 1)) & self.mask()
    }

    /// `id - 2^(i-1)`, the point whose i-th finger could reference `id`.
    pub fn finger_origin(&self, id: Ident, i: usize) -> Ident {
        debug_assert!((1..=self.bits as usize).contains(&i));
        id.wrapping_sub(1u64 << (i - 1)) & self.mask()
    }

    pub fn successor_of(&self, id: Ident) -> Ident {
        id.wrapping_add(1) & self.mask()
    }

    pub fn predecessor_of(&self, id: Ident) -> Ident {
        id.wrapping_sub(1) & self.mask()
    }

    /// Maps an application key onto the ring: SHA-256 reduced mod `2^M`.
    /// The modulus divides 2^64, so the residue of the full digest equals
    /// the residue of its low-order eight bytes.
    pub fn hash_key(&self, key: &str) -> Ident {
        let digest = Sha256::digest(key.as_bytes());
        let mut low = [0u8; 8];
        low.copy_from_slice(&digest[24..32]);
        u64::from_be_bytes(low) & self.mask()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(bits: u8) -> RingSpace {
        RingSpace::new(bits).unwrap()
    }

    #[test]
    fn rejects_degenerate_bit_widths() {
        assert!(RingSpace::new(0).is_err());
        assert!(RingSpace::new(64).is_err());
        assert!(RingSpace::new(1).is_ok());
        assert!(RingSpace::new(63).is_ok());
    }

    #[test]
    fn linear_interval_is_open_on_both_ends() {
        let ring = space(6);
        assert!(ring.in_range(5, 2, 9));
        assert!(!ring.in_range(2, 2, 9));
        assert!(!ring.in_range(9, 2, 9));
        assert!(!ring.in_range(1, 2, 9));
        assert!(!ring.in_range(10, 2, 9));
    }

    #[test]
    fn wrapped_interval_splits_around_zero() {
        let ring = space(6);
        // (60, 4) on a 64-wide ring covers 61..=63 and 0..=3
        assert!(ring.in_range(61, 60, 4));
        assert!(ring.in_range(63, 60, 4));
        assert!(ring.in_range(0, 60, 4));
        assert!(ring.in_range(3, 60, 4));
        assert!(!ring.in_range(60, 60, 4));
        assert!(!ring.in_range(4, 60, 4));
        assert!(!ring.in_range(30, 60, 4));
    }

    #[test]
    fn endpoints_never_qualify() {
        let ring = space(6);
        for (start, end) in [(0, 0), (5, 5), (2, 9), (9, 2), (0, 63), (63, 0)] {
            assert!(!ring.in_range(start, start, end), "x == start in ({start},{end})");
            assert!(!ring.in_range(end, start, end), "x == end in ({start},{end})");
        }
    }

    #[test]
    fn equal_endpoints_make_an_empty_interval() {
        let ring = space(6);
        for x in 0..ring.modulus() {
            assert!(!ring.in_range(x, 7, 7));
        }
    }

    #[test]
    fn finger_starts_wrap() {
        let ring = space(6);
        assert_eq!(ring.finger_start(0, 1), 1);
        assert_eq!(ring.finger_start(0, 6), 32);
        assert_eq!(ring.finger_start(40, 6), 8); // 40 + 32 wraps to 8
        assert_eq!(ring.finger_origin(20, 6), 52); // 20 - 32 wraps to 52
        assert_eq!(ring.finger_origin(40, 1), 39);
        assert_eq!(ring.successor_of(63), 0);
        assert_eq!(ring.predecessor_of(0), 63);
    }

    #[test]
    fn identifier_validation_is_exact_at_the_modulus() {
        let ring = space(6);
        assert!(ring.check(0).is_ok());
        assert!(ring.check(63).is_ok());
        assert!(ring.check(64).is_err());
        assert!(ring.check(u64::MAX).is_err());
    }

    #[test]
    fn index_validation_covers_one_through_m() {
        let ring = space(6);
        assert!(ring.check_index(0).is_err());
        assert_eq!(ring.check_index(1).unwrap(), 1);
        assert_eq!(ring.check_index(6).unwrap(), 6);
        assert!(ring.check_index(7).is_err());
    }

    #[test]
    fn key_hashing_is_deterministic_and_bounded() {
        let ring = space(6);
        let a = ring.hash_key("alpha");
        assert_eq!(a, ring.hash_key("alpha"));
        assert!(ring.contains(a));
        for key in ["", "beta", "こんにちは", "a longer key with spaces"] {
            assert!(ring.contains(ring.hash_key(key)));
        }
    }

    #[test]
    fn key_hash_matches_full_digest_residue() {
        use sha2::{Digest, Sha256};
        let ring = space(16);
        let digest = Sha256::digest("gamma".as_bytes());
        // residue of the 256-bit digest mod 2^16, computed the long way
        let wide = digest.iter().fold(0u64, |acc, b| {
            (acc.wrapping_shl(8) | *b as u64) % ring.modulus()
        });
        assert_eq!(ring.hash_key("gamma"), wide);
    }
}
