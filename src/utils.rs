use crate::bitboard::BitboardExt;

/// Maps a (rank, file) pair to the 0..63 square index (a1 = 0, h8 = 63).
#[inline(always)]
pub fn square_index(rank: usize, file: usize) -> usize {
    rank * 8 + file
}

/// Removes and returns the index of the least-significant set bit.
#[inline(always)]
pub fn pop_lsb(bb: &mut u64) -> u8 {
    debug_assert_ne!(*bb, 0, "pop_lsb() called on an empty bitboard");
    let bit = bb.lsb();
    *bb ^= bit;
    bit.trailing_zeros() as u8
}

/// High 64 bits of the 128-bit product of `a` and a multiplier, used to turn a
/// 64-bit Zobrist key into a table index without the modulo-bias of `key % len`.
#[inline(always)]
pub fn mul_hi64(a: u64, b: u64) -> u64 {
    (((a as u128) * (b as u128)) >> 64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_lsb_drains_bits_low_to_high() {
        let mut bb = 0b1010u64;
        assert_eq!(pop_lsb(&mut bb), 1);
        assert_eq!(pop_lsb(&mut bb), 3);
        assert_eq!(bb, 0);
    }

    #[test]
    fn square_index_matches_rank_major_layout() {
        assert_eq!(square_index(0, 0), 0);
        assert_eq!(square_index(7, 7), 63);
        assert_eq!(square_index(3, 4), 28);
    }

    #[test]
    fn mul_hi64_scales_into_requested_range() {
        let buckets = 1024u64;
        let idx = mul_hi64(u64::MAX, buckets);
        assert!(idx < buckets);
        assert_eq!(mul_hi64(0, buckets), 0);
    }
}
