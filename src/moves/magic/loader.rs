//! Produces the process-wide magic bitboard tables at startup.
//!
//! This crate always generates the tables at runtime rather than loading a
//! prebaked binary blob (search takes well under a second and there is no
//! embedded asset to load) — see DESIGN.md for the `load_magic` feature's
//! status.

use super::precompute::{MagicTableSeed, generate_magic_tables};
use super::structs::MagicTables;

/// Fixed seed used under `deterministic_magic` so magic numbers (and
/// therefore table layout) are reproducible across runs and test machines.
const DETERMINISTIC_SEED: u64 = 0x5DEE_C9A1_BEEF_F00D;

pub fn load_magic_tables() -> MagicTables {
    let seed = pick_seed();
    generate_magic_tables(seed).expect("failed to generate magic bitboard tables")
}

fn pick_seed() -> MagicTableSeed {
    #[cfg(feature = "deterministic_magic")]
    {
        MagicTableSeed::Fixed(DETERMINISTIC_SEED)
    }
    #[cfg(not(feature = "deterministic_magic"))]
    {
        MagicTableSeed::Random
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_magic_tables_produces_queen_moves_at_d4() {
        let tables = load_magic_tables();
        let d4 = 27usize;
        let attacks = tables.queen_attacks(d4, 0);
        assert!(attacks != 0);
    }
}
