use super::*;
use std::str::FromStr;

#[test]
fn new_matches_startpos_fen() {
    let from_new = Board::new();
    let from_fen =
        Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
    assert_eq!(from_new.piece_bb, from_fen.piece_bb);
    assert_eq!(from_new.zobrist, from_fen.zobrist);
    assert_eq!(from_new.pawn_key, from_fen.pawn_key);
}

#[test]
fn set_bb_keeps_occupancy_in_sync() {
    let mut board = Board::new_empty();
    board.set_bb(Color::White, Piece::Rook, Square::from_index(0).bitboard());
    assert_eq!(board.occ_white, 1);
    assert_eq!(board.occ_all, 1);
    assert_eq!(board.piece_at(Square::from_index(0)), Some((Color::White, Piece::Rook)));
}

#[test]
fn set_bb_keeps_zobrist_incremental_in_sync_with_full_recompute() {
    let mut board = Board::new();
    board.set_bb(Color::White, Piece::Pawn, board.bb(Color::White, Piece::Pawn) & !1u64 << 8);
    assert_eq!(board.zobrist, board.compute_zobrist_full());
    assert_eq!(board.pawn_key, board.compute_pawn_zobrist_full());
}

#[test]
fn validate_rejects_overlapping_bitboards() {
    let mut board = Board::new_empty();
    board.piece_bb[0][Piece::Pawn as usize] = 1;
    board.piece_bb[0][Piece::Knight as usize] = 1;
    assert!(board.validate().is_err());
}

#[test]
fn repetition_count_counts_history_plus_current() {
    let mut board = Board::new();
    let start_hash = board.zobrist;
    assert_eq!(board.repetition_count(), 1);
    board.history.push(start_hash);
    board.history.push(0xdead_beef);
    board.history.push(start_hash);
    assert_eq!(board.repetition_count(), 3);
    assert!(board.is_threefold());
}

#[test]
fn recognized_draw_flag_round_trips() {
    let mut board = Board::new_empty();
    assert!(!board.is_recognized_draw());
    board.set_recognized_draw(true);
    assert!(board.is_recognized_draw());
    board.set_recognized_draw(false);
    assert!(!board.is_recognized_draw());
}

#[test]
fn has_major_pieces_is_false_for_bare_kings() {
    let board = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    assert!(!board.has_major_pieces(Color::White));
    assert!(!board.has_major_pieces(Color::Black));
}

#[test]
fn king_square_finds_the_king() {
    let board = Board::new();
    assert_eq!(board.king_square(Color::White), Square::from_index(4));
    assert_eq!(board.king_square(Color::Black), Square::from_index(60));
}
