//! `between[64][64]` / `line[64][64]` bitboards.
//!
//! Supplemented from `original_source/src/bitboard.cpp`, dropped by the
//! distillation: used by `square_control::pinned_pieces` to test whether an
//! own piece sits strictly between the king and an enemy slider, and
//! available to SEE/singular-extension code for the same kind of
//! alignment test.

use once_cell::sync::Lazy;

const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

fn compute_between_and_line() -> (Box<[[u64; 64]; 64]>, Box<[[u64; 64]; 64]>) {
    let mut between = Box::new([[0u64; 64]; 64]);
    let mut line = Box::new([[0u64; 64]; 64]);

    for from in 0..64i32 {
        let ff = from % 8;
        let fr = from / 8;
        for &(df, dr) in DIRECTIONS.iter() {
            let mut acc = 0u64;
            let mut f = ff + df;
            let mut r = fr + dr;
            while (0..8).contains(&f) && (0..8).contains(&r) {
                let sq = (r * 8 + f) as usize;
                between[from as usize][sq] = acc;
                acc |= 1u64 << sq;

                let mut full = (1u64 << from) | acc;
                let mut bf = ff - df;
                let mut br = fr - dr;
                while (0..8).contains(&bf) && (0..8).contains(&br) {
                    full |= 1u64 << (br * 8 + bf);
                    bf -= df;
                    br -= dr;
                }
                line[from as usize][sq] = full;

                f += df;
                r += dr;
            }
        }
    }

    (between, line)
}

static TABLES: Lazy<(Box<[[u64; 64]; 64]>, Box<[[u64; 64]; 64]>)> =
    Lazy::new(compute_between_and_line);

/// Squares strictly between `a` and `b`, exclusive of both. Zero if the two
/// squares do not share a rank, file, or diagonal.
#[inline]
pub fn between(a: usize, b: usize) -> u64 {
    TABLES.0[a][b]
}

/// The full rank/file/diagonal line through `a` and `b`, inclusive of both.
/// Zero if the two squares are not aligned.
#[inline]
pub fn line(a: usize, b: usize) -> u64 {
    TABLES.1[a][b]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_same_file_excludes_endpoints() {
        // a1 (0) .. a4 (24): a2 (8) and a3 (16) lie strictly between.
        assert_eq!(between(0, 24), (1u64 << 8) | (1u64 << 16));
    }

    #[test]
    fn between_unaligned_squares_is_empty() {
        assert_eq!(between(0, 17), 0); // a1 vs b3, not aligned
    }

    #[test]
    fn between_adjacent_squares_is_empty() {
        assert_eq!(between(0, 1), 0);
    }

    #[test]
    fn line_includes_both_endpoints_and_is_symmetric() {
        let e1 = 4;
        let e8 = 60;
        let l = line(e1, e8);
        assert_ne!(l & (1u64 << e1), 0);
        assert_ne!(l & (1u64 << e8), 0);
        assert_eq!(l, line(e8, e1));
    }

    #[test]
    fn line_diagonal_matches_expected_squares() {
        // a1 (0) to h8 (63): the full long diagonal.
        let expected: u64 = (0..8).map(|i| 1u64 << (i * 9)).sum();
        assert_eq!(line(0, 63), expected);
    }
}
