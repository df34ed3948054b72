//! Triangular principal-variation table.
//!
//! The teacher's search only ever returns a single best move from the root
//! call; it never assembles a full line. This table adds that: each ply owns
//! a row of the triangular array, `update` copies the (already-updated)
//! child row up into the parent row and prepends the move that produced it,
//! exactly as `alpha_beta`'s improvement branch is expected to call it.

use crate::moves::types::Move;

pub const MAX_PLY: usize = 128;

pub struct PvTable {
    table: Vec<[Option<Move>; MAX_PLY]>,
    length: [usize; MAX_PLY],
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PvTable {
    pub fn new() -> Self {
        Self {
            table: vec![[None; MAX_PLY]; MAX_PLY],
            length: [0; MAX_PLY],
        }
    }

    /// Called when `mv` at `ply` improved alpha: prepends `mv` to the child
    /// row (`ply + 1`) and stores the result as this ply's PV.
    pub fn update(&mut self, ply: usize, mv: Move) {
        self.table[ply][0] = Some(mv);
        let child_len = self.length[ply + 1];
        for i in 0..child_len {
            self.table[ply][i + 1] = self.table[ply + 1][i];
        }
        self.length[ply] = child_len + 1;
    }

    /// Marks `ply` as a leaf with no continuation (e.g. after a TT cutoff or
    /// at the search horizon), so a stale child row from a prior iteration
    /// isn't copied up by a later `update`.
    pub fn clear_from(&mut self, ply: usize) {
        self.length[ply] = 0;
    }

    pub fn line(&self) -> Vec<Move> {
        self.table[0][..self.length[0]].iter().filter_map(|m| *m).collect()
    }

    pub fn best_move(&self) -> Option<Move> {
        self.table[0][0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;
    use crate::moves::types::QUIET_MOVE;
    use crate::square::Square;

    fn mv(from: u8, to: u8) -> Move {
        Move {
            from: Square::from_index(from),
            to: Square::from_index(to),
            piece: Piece::Pawn,
            promotion: None,
            flags: QUIET_MOVE,
        }
    }

    #[test]
    fn update_prepends_move_and_copies_child_row() {
        let mut pv = PvTable::new();
        pv.clear_from(2);
        pv.update(1, mv(2, 3));
        pv.update(0, mv(0, 1));
        assert_eq!(pv.line(), vec![mv(0, 1), mv(2, 3)]);
        assert_eq!(pv.best_move(), Some(mv(0, 1)));
    }

    #[test]
    fn clear_from_truncates_stale_continuation() {
        let mut pv = PvTable::new();
        pv.update(1, mv(2, 3));
        pv.update(0, mv(0, 1));
        pv.clear_from(1);
        pv.update(0, mv(4, 5));
        assert_eq!(pv.line(), vec![mv(4, 5)]);
    }
}
