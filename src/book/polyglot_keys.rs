//! Random constants consumed by `polyglot_hash::compute_polyglot_hash`.
//!
//! Slot layout follows the published Polyglot format: `[piece*64 + square]`
//! for the 12 `(color, piece)` planes (768 entries), four castling-right
//! entries, eight en-passant-file entries, and one side-to-move entry (781
//! total).
//!
//! This crate fills the table with a fixed-seed PRNG rather than the
//! published reference constants (see DESIGN.md) — internal hashing is
//! self-consistent either way, but reading third-party `.bin` opening books
//! produced by other engines requires swapping this array for the official
//! published Polyglot random table.

use once_cell::sync::Lazy;
use rand::{RngCore, SeedableRng, rngs::StdRng};

const POLYGLOT_KEY_SEED: u64 = 0x706F_6C79_676C_6F74; // "polyglot" in ASCII, folded to 8 bytes

pub static POLYGLOT_RANDOMS: Lazy<[u64; 781]> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(POLYGLOT_KEY_SEED);
    let mut table = [0u64; 781];
    for slot in table.iter_mut() {
        *slot = rng.next_u64();
    }
    table
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_fully_populated_and_stable() {
        let a = *POLYGLOT_RANDOMS;
        let b = *POLYGLOT_RANDOMS;
        assert_eq!(a, b);
        assert!(a.iter().all(|&v| v != 0));
    }
}
