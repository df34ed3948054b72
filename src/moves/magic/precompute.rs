//! Generates the magic-bitboard lookup tables for rook and bishop attacks.
//!
//! For each square we compute the "relevant occupancy" mask (every square a
//! slider's ray passes over, excluding the far edge of the board, since a
//! blocker there never changes the attack set), enumerate every subset of
//! that mask via the carry-rippler trick, and search for a magic multiplier
//! that maps each subset to a collision-free table slot.

use super::attacks::{bishop_attacks_per_square, rook_attacks_per_square};
use super::search::find_magic_number_for_square;
use super::structs::{BishopMagicTables, MagicEntry, MagicTables, RookMagicTables};
use rand::{RngCore, SeedableRng, rngs::StdRng};

/// How to seed the RNG used while searching for magic numbers.
pub enum MagicTableSeed {
    /// Deterministic: same seed always produces the same tables. Used by
    /// tests and by the `deterministic_magic` feature so magic numbers don't
    /// change from run to run.
    Fixed(u64),
    /// Seed from the OS entropy source.
    Random,
}

fn make_rng(seed: &MagicTableSeed) -> StdRng {
    match seed {
        MagicTableSeed::Fixed(s) => StdRng::seed_from_u64(*s),
        MagicTableSeed::Random => {
            let mut bytes = [0u8; 32];
            rand::rng().fill_bytes(&mut bytes);
            StdRng::from_seed(bytes)
        }
    }
}

fn rook_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;
    for r in (rank + 1)..7 {
        mask |= 1u64 << (r * 8 + file);
    }
    for r in (1..rank).rev() {
        mask |= 1u64 << (r * 8 + file);
    }
    for f in (file + 1)..7 {
        mask |= 1u64 << (rank * 8 + f);
    }
    for f in (1..file).rev() {
        mask |= 1u64 << (rank * 8 + f);
    }
    mask
}

fn bishop_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;

    let (mut r, mut f) = (rank + 1, file + 1);
    while r < 7 && f < 7 {
        mask |= 1u64 << (r * 8 + f);
        r += 1;
        f += 1;
    }
    let (mut r, mut f) = (rank + 1, file - 1);
    while r < 7 && f > 0 {
        mask |= 1u64 << (r * 8 + f);
        r += 1;
        f -= 1;
    }
    let (mut r, mut f) = (rank - 1, file + 1);
    while r > 0 && f < 7 {
        mask |= 1u64 << (r * 8 + f);
        r -= 1;
        f += 1;
    }
    let (mut r, mut f) = (rank - 1, file - 1);
    while r > 0 && f > 0 {
        mask |= 1u64 << (r * 8 + f);
        r -= 1;
        f -= 1;
    }
    mask
}

/// Enumerates every subset of `mask`, including the empty and full sets,
/// via the standard carry-rippler trick.
fn subsets_of(mask: u64) -> Vec<u64> {
    let mut subsets = Vec::with_capacity(1usize << mask.count_ones());
    let mut subset = 0u64;
    loop {
        subsets.push(subset);
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            break;
        }
    }
    subsets
}

fn build_entry<R: RngCore>(
    square: usize,
    mask: u64,
    attacks_of: impl Fn(usize, u64) -> u64,
    rng: &mut R,
) -> Result<MagicEntry, String> {
    let shift = 64 - mask.count_ones();
    let blockers = subsets_of(mask);
    let attacks: Vec<u64> = blockers.iter().map(|&b| attacks_of(square, b)).collect();

    let magic = find_magic_number_for_square(&blockers, &attacks, shift, rng)?;

    let table_size = 1usize << mask.count_ones();
    let mut table = vec![0u64; table_size];
    for (b, a) in blockers.iter().zip(attacks.iter()) {
        let index = ((b.wrapping_mul(magic)) >> shift) as usize;
        table[index] = *a;
    }

    Ok(MagicEntry {
        magic,
        shift,
        mask,
        table: table.into_boxed_slice(),
    })
}

/// Builds the full rook + bishop magic tables for all 64 squares.
pub fn generate_magic_tables(seed: MagicTableSeed) -> Result<MagicTables, String> {
    let mut rng = make_rng(&seed);

    let mut rook_entries = Vec::with_capacity(64);
    for square in 0..64 {
        let mask = rook_mask(square);
        rook_entries.push(build_entry(square, mask, rook_attacks_per_square, &mut rng)?);
    }

    let mut bishop_entries = Vec::with_capacity(64);
    for square in 0..64 {
        let mask = bishop_mask(square);
        bishop_entries.push(build_entry(
            square,
            mask,
            bishop_attacks_per_square,
            &mut rng,
        )?);
    }

    Ok(MagicTables {
        rook: RookMagicTables {
            entries: rook_entries,
        },
        bishop: BishopMagicTables {
            entries: bishop_entries,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rook_mask_excludes_board_edges() {
        let mask = rook_mask(0); // a1
        assert_eq!(mask & 0x8080_8080_8080_8080, 0); // no h-file bit
        assert_eq!(mask & 0xFF00_0000_0000_0000, 0); // no rank-8 bit
    }

    #[test]
    fn subsets_of_enumerates_power_of_two_count() {
        let mask = 0b1011u64;
        let subsets = subsets_of(mask);
        assert_eq!(subsets.len(), 1 << mask.count_ones());
    }

    #[test]
    fn generated_tables_match_scan_generation() {
        let tables = generate_magic_tables(MagicTableSeed::Fixed(1)).unwrap();
        let square = 27usize; // d4
        let blockers = (1u64 << 19) | (1u64 << 35);
        assert_eq!(
            tables.rook.get_attacks(square, blockers),
            rook_attacks_per_square(square, blockers)
        );
    }
}
