use crate::board::{Board, Color, Piece};
use crate::moves::execute::{make_move_basic, make_null_move, undo_move_basic, undo_null_move};
use crate::moves::magic::MagicTables;
use crate::moves::square_control::{FILE_A, in_check};
use crate::moves::types::Move;
use crate::search::context::SearchContext;
use crate::search::eval::static_eval;
use crate::search::picker::MovePicker;
use crate::search::pv::PvTable;
use crate::search::see::SeeExt;
use crate::search::tt::{NodeType, TranspositionTable};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const INF: i32 = 32000;
const MATE_SCORE: i32 = 31000;
const MATE_THRESHOLD: i32 = MATE_SCORE - 1000; // 30000 - buffer for mate distance
const MAX_Q_SEARCH_DEPTH: usize = 100;
const DRAW_SCORE: i32 = -50;

// --- Tuning Constants ---

// Reverse Futility Pruning (RFP)
const RFP_DEPTH_LIMIT: i32 = 9;
const RFP_MARGIN_BASE: i32 = 80;
const RFP_MARGIN_MULT: i32 = 90;

// Futility Pruning (FP)
const FP_DEPTH_LIMIT: i32 = 7;
const FP_MARGIN_BASE: i32 = 100;
const FP_MARGIN_MULT: i32 = 100;
const FP_HISTORY_THRESHOLD: i32 = 512;

// Late Move Pruning (LMP)
const LMP_DEPTH_LIMIT: i32 = 14;
const LMP_BASE_MOVES: i32 = 3;
const LMP_MOVE_MULTIPLIER: i32 = 6;

// Razoring (non-PV only, shallow depths)
const RAZOR_DEPTH_LIMIT: i32 = 3;
const RAZOR_MARGIN_BASE: i32 = 150;
const RAZOR_MARGIN_MULT: i32 = 60;

// Singular extension
const SINGULAR_MIN_DEPTH: i32 = 4;
const SINGULAR_MARGIN: i32 = 75;

// Late move reduction thresholds for `next_depth_not_pv`
const LMR_MOVE_COUNT_PV: usize = 5;
const LMR_MOVE_COUNT_NOT_PV: usize = 3;

fn razor_margin(depth: i32) -> i32 {
    RAZOR_MARGIN_BASE + RAZOR_MARGIN_MULT * depth
}

fn futility_margin(depth: i32) -> i32 {
    FP_MARGIN_BASE + FP_MARGIN_MULT * depth.max(0)
}

// --- TT Score Adjustment Helpers ---
fn score_to_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply
    } else if score <= -MATE_THRESHOLD {
        score - ply
    } else {
        score
    }
}

fn score_from_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_THRESHOLD {
        score - ply
    } else if score <= -MATE_THRESHOLD {
        score + ply
    } else {
        score
    }
}
// -----------------------------------

/// A pawn move that no enemy pawn on the same or an adjacent file can still
/// stop or capture, from the position *before* the move is made.
fn is_passed_pawn_move(board: &Board, mv: Move) -> bool {
    if mv.piece != Piece::Pawn {
        return false;
    }
    let us = board.side_to_move;
    let them = us.opposite();
    let sq = mv.to.index() as usize;
    let rank = sq / 8;
    let file = sq % 8;

    let mut file_mask = FILE_A << file;
    if file > 0 {
        file_mask |= FILE_A << (file - 1);
    }
    if file < 7 {
        file_mask |= FILE_A << (file + 1);
    }

    let front_mask = match us {
        Color::White => {
            if rank < 7 {
                !((1u64 << ((rank + 1) * 8)) - 1)
            } else {
                0
            }
        }
        Color::Black => {
            if rank > 0 {
                (1u64 << (rank * 8)) - 1
            } else {
                0
            }
        }
    };

    board.pieces(Piece::Pawn, them) & file_mask & front_mask == 0
}

/// Depth to search the first legal move of a node (PV move or the only move
/// of a non-PV node) at. A move that gives check or pushes a passed pawn,
/// and doesn't lose material by SEE, is searched at full depth; everything
/// else loses a ply. The TT move being verified by a singular probe is
/// always searched at full depth regardless of the other conditions.
fn next_depth_pv(
    depth: i32,
    is_singular_tt_move: bool,
    gives_check: bool,
    is_passed_pawn_move: bool,
    see_nonneg: bool,
) -> i32 {
    if is_singular_tt_move {
        depth
    } else if (gives_check || is_passed_pawn_move) && see_nonneg {
        depth
    } else {
        depth - 1
    }
}

/// Depth (or `None` to skip the move outright) for the zero-window scout
/// search of the non-first moves of a node. `expected_cut` marks a scout
/// that is itself searching under a null window expecting to fail low
/// (true for every scout move here, since move 0 already took the "this
/// might be the best move" slot).
#[allow(clippy::too_many_arguments)]
fn next_depth_not_pv(
    depth: i32,
    move_count: usize,
    is_pv_node: bool,
    gives_check: bool,
    see_nonneg: bool,
    is_queen_promo: bool,
    is_capture: bool,
    is_killer_of_parent: bool,
    expected_cut: bool,
    static_eval_val: i32,
    alpha: i32,
) -> Option<i32> {
    if gives_check && see_nonneg {
        return Some(depth);
    }

    let threshold = if is_pv_node {
        LMR_MOVE_COUNT_PV
    } else {
        LMR_MOVE_COUNT_NOT_PV
    };

    if move_count >= threshold && !is_queen_promo && !is_capture && !is_killer_of_parent {
        let mut reduced = depth - 2 - depth / 8 - (move_count as i32 - 6).max(0) / 10;
        if expected_cut {
            reduced -= 2;
        }
        let clamped = reduced.max(0);

        if clamped <= RAZOR_DEPTH_LIMIT && static_eval_val + futility_margin(clamped) < alpha {
            return None;
        }
        return Some(clamped);
    }

    Some(depth - 1)
}

pub struct TimeManager {
    pub start_time: Instant,
    budget: Option<Duration>,
    /// Expansion factor used by `plenty_time`: how many multiples of the
    /// already-elapsed time we're willing to spend finishing the next
    /// iteration before bailing out early.
    n: f64,
    infinite: bool,
    ponder: bool,
    pub stop_signal: bool,
    external_stop: Option<Arc<AtomicBool>>,
    ponder_signal: Option<Arc<AtomicBool>>,
    last_currmove_post: Option<Instant>,
    last_info_post: Option<Instant>,
}

const TIME_RESERVE_MS: u64 = 72;
const CURR_MOVE_POST_LIMIT: Duration = Duration::from_millis(5000);
const INFO_POST_INTERVAL: Duration = Duration::from_millis(1000);

/// UCI `go` time-control parameters. Everything defaults to "no limit";
/// `external_stop`/`ponder_signal` let a UCI front end wire real `stop`/
/// `ponderhit` commands in from a different thread than the one running
/// the search.
#[derive(Clone, Default)]
pub struct SearchLimits {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: Option<u64>,
    pub movetime: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
    pub external_stop: Option<Arc<AtomicBool>>,
    pub ponder_signal: Option<Arc<AtomicBool>>,
}

impl SearchLimits {
    /// A single fixed-time search with no UCI time-control inputs, for
    /// callers (the EPD bench runner, the wasm front end) that just want a
    /// wall-clock cap.
    pub fn fixed_movetime(ms: u64) -> Self {
        Self {
            movetime: Some(ms),
            ..Self::default()
        }
    }
}

impl TimeManager {
    pub fn new(side_to_move: Color, limits: &SearchLimits) -> Self {
        let (budget, n) = Self::compute_budget(side_to_move, limits);
        Self {
            start_time: Instant::now(),
            budget,
            n,
            infinite: limits.infinite,
            ponder: limits.ponder,
            stop_signal: false,
            external_stop: limits.external_stop.clone(),
            ponder_signal: limits.ponder_signal.clone(),
            last_currmove_post: None,
            last_info_post: None,
        }
    }

    /// Grounded on `timemanager.cpp`'s `init`: fixed `movetime` takes a flat
    /// 95% haircut; otherwise `movestogo` is clamped to `[1, 30]` (defaulting
    /// to 30), and the per-move budget is `2 * (time/(moves+1) + inc)`,
    /// except when increment is zero and under a second remains, where it's
    /// `time / (moves * 2)` and the expansion factor `n` drops to 1 so
    /// `plenty_time` stops handing out extra iterations. The result is
    /// always capped at `time_left - 72ms` to leave a safety margin for GUI
    /// and OS overhead.
    fn compute_budget(side_to_move: Color, limits: &SearchLimits) -> (Option<Duration>, f64) {
        if limits.infinite {
            return (None, 2.5);
        }
        if let Some(movetime) = limits.movetime {
            return (Some(Duration::from_millis(movetime * 95 / 100)), 2.5);
        }

        let (time_left, inc) = match side_to_move {
            Color::White => (limits.wtime, limits.winc),
            Color::Black => (limits.btime, limits.binc),
        };

        let Some(time_left) = time_left else {
            return (None, 2.5);
        };

        let moves_left = limits.movestogo.map(|m| m.clamp(1, 30)).unwrap_or(30);

        let (mut search_time, n) = if inc == 0 && time_left < 1000 {
            (time_left / (moves_left * 2), 1.0)
        } else {
            (2 * (time_left / (moves_left + 1) + inc), 2.5)
        };

        let cap = time_left.saturating_sub(TIME_RESERVE_MS);
        search_time = search_time.min(cap);
        (Some(Duration::from_millis(search_time)), n)
    }

    #[inline(always)]
    pub fn check_time(&mut self) {
        if self.stop_signal {
            return;
        }

        if self
            .external_stop
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
        {
            self.stop_signal = true;
            return;
        }

        if self.ponder {
            if self
                .ponder_signal
                .as_ref()
                .is_some_and(|f| f.load(Ordering::Relaxed))
            {
                self.ponder_hit();
            }
            if self.ponder {
                // Still pondering: an unconfirmed ponder search never
                // times out on its own budget.
                return;
            }
        }

        if self.infinite {
            return;
        }

        if let Some(limit) = self.budget {
            // Hard Stop: Abort immediately if we hit the limit
            if self.start_time.elapsed() >= limit {
                self.stop_signal = true;
            }
        }
    }

    /// Returns the allocated time limit
    #[inline(always)]
    pub fn allocated_time(&self) -> Option<Duration> {
        self.budget
    }

    /// Returns elapsed time since search started
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn time_up(&self) -> bool {
        self.budget.is_some_and(|b| self.elapsed() >= b)
    }

    /// `false` once spending roughly `n` times the time already spent would
    /// blow through the budget — i.e. it's not worth starting another
    /// iterative-deepening iteration.
    pub fn plenty_time(&self) -> bool {
        match self.budget {
            None => true,
            Some(budget) => self.elapsed().mul_f64(self.n) <= budget,
        }
    }

    pub fn is_analysing(&self) -> bool {
        self.infinite || self.ponder
    }

    /// Extends the budget by the time already spent pondering; called once
    /// `ponderhit` arrives (directly, or via `ponder_signal` in `check_time`).
    pub fn ponder_hit(&mut self) {
        self.ponder = false;
        if let Some(budget) = self.budget {
            self.budget = Some(budget + self.elapsed());
        }
    }

    /// Rate-limits `info currmove`/`currmovenumber` output to once every
    /// `curr_move_post_limit` (5s), matching the teacher's `should_post_curr_move`.
    pub fn should_post_currmove(&mut self) -> bool {
        let now = Instant::now();
        let due = self
            .last_currmove_post
            .is_none_or(|t| now.duration_since(t) >= CURR_MOVE_POST_LIMIT);
        if due {
            self.last_currmove_post = Some(now);
        }
        due
    }

    /// Rate-limits full `info depth ...` output to once a second.
    pub fn should_post_info(&mut self) -> bool {
        let now = Instant::now();
        let due = self
            .last_info_post
            .is_none_or(|t| now.duration_since(t) >= INFO_POST_INTERVAL);
        if due {
            self.last_info_post = Some(now);
        }
        due
    }
}

#[allow(clippy::too_many_arguments, clippy::only_used_in_recursion)]
pub fn quiescence(
    board: &mut Board,
    tables: &MagicTables,
    ctx: &mut SearchContext,
    tt: &TranspositionTable,
    ply: usize,
    mut alpha: i32,
    beta: i32,
    nodes: &mut u64,
    time: &mut TimeManager,
) -> i32 {
    // SAFETY BRAKE: Prevent Q-search explosions
    if ply > MAX_Q_SEARCH_DEPTH {
        return static_eval(board, tables, alpha, beta);
    }

    let stand_pat = static_eval(board, tables, alpha, beta);

    if stand_pat >= beta {
        return beta;
    }
    if stand_pat >= alpha {
        alpha = stand_pat;
    }

    // Use MovePicker in captures-only mode for quiescence
    let empty_killers = [None, None, None, None];
    let empty_history = [[0i32; 64]; 64];
    let mut picker = MovePicker::new(None, empty_killers, true);

    while let Some(mv) = picker.next(board, tables, &empty_history) {
        *nodes += 1;
        if *nodes & 63 == 0 {
            time.check_time();
        }
        if time.stop_signal {
            return stand_pat;
        }

        let mut captured_value = 0;
        if let Some(piece) = board.piece_type_at(mv.to) {
            captured_value = piece.value();
        }

        // DELTA PRUNING SAFETY
        // Don't prune if it's a promotion (potentially huge value)
        // Don't prune if it's En Passant (captured_value is 0, but it captures a pawn)
        let is_prom = mv.is_promotion();
        let is_ep = mv.is_en_passant();

        // "Blindness" Fix: Only prune standard captures.
        if !is_prom && !is_ep && stand_pat + captured_value + 200 < alpha {
            continue;
        }

        // SEE Pruning: Skip captures that lose material
        // Note: MovePicker already filters bad captures for us, but we keep this
        // for promotions and en passant which bypass SEE classification
        if !is_prom && !is_ep && !board.static_exchange_eval(mv, 0, tables) {
            continue;
        }

        let undo = make_move_basic(board, mv);
        let score = -quiescence(board, tables, ctx, tt, ply + 1, -beta, -alpha, nodes, time);
        undo_move_basic(board, undo);

        if score >= beta {
            return beta;
        }
        if score > alpha {
            alpha = score;
        }
    }
    alpha
}

#[allow(clippy::too_many_arguments, clippy::only_used_in_recursion)]
pub fn alpha_beta(
    board: &mut Board,
    tables: &MagicTables,
    ctx: &mut SearchContext,
    tt: &TranspositionTable,
    pv: &mut PvTable,
    depth: i32,
    ply: usize,
    mut alpha: i32,
    beta: i32,
    is_pv: bool,
    excluded: Option<Move>,
    nodes: &mut u64,
    time: &mut TimeManager,
) -> (i32, Option<Move>) {
    // Check every 1024 nodes instead of 2047 for tighter control
    if *nodes & 63 == 0 {
        time.check_time();
    }

    if time.stop_signal {
        return (0, None);
    }
    *nodes += 1;

    // 2. Repetition & TT Probing (Standard)
    if ply > 0 && board.is_repetition() {
        pv.clear_from(ply);
        return (DRAW_SCORE, None);
    }

    if time.stop_signal {
        return (0, None);
    }

    let hash = board.zobrist;
    let mut hash_move = None;
    let mut tt_entry: Option<(Option<Move>, i32, u8, u8)> = None;

    // TT PROBE WITH MATE SCORE ADJUSTMENT
    if let Some((tt_move, raw_score, tt_depth, tt_bound)) =
        tt.probe(hash, depth as u8, alpha, beta, ply as i32)
    {
        if let Some(tm) = tt_move {
            hash_move = Some(tm);
        }
        tt_entry = Some((tt_move, raw_score, tt_depth, tt_bound));

        // [STEP 1] TT cutoff: non-PV only, per §4.I item 1. A verification
        // search (`excluded.is_some()`) must never short-circuit off the
        // very entry it's trying to validate.
        if tt_depth >= depth as u8 && ply > 0 && !is_pv && excluded.is_none() {
            let tt_score = score_from_tt(raw_score, ply as i32);
            let cutoff = match tt_bound {
                0 => true,
                1 => tt_score >= beta,
                2 => tt_score <= alpha,
                _ => false,
            };
            if cutoff {
                pv.clear_from(ply);
                return (tt_score, tt_move);
            }
        }
    }

    let in_check_now = in_check(board, board.side_to_move, tables);

    // FIX 6: CHECK EXTENSION
    // If we are in check, extend the search by 1 ply.
    // This resolves forced mates and prevents the horizon effect.
    let extension = if in_check_now { 1 } else { 0 };

    if depth <= 0 && !in_check_now {
        let score = quiescence(board, tables, ctx, tt, ply, alpha, beta, nodes, time);
        pv.clear_from(ply);
        return (score, None);
    }

    // [STEP 1] Calculate Eval Early
    // We lift this out so both RFP and SFP can share it.
    let static_eval_val = if !in_check_now {
        static_eval(board, tables, alpha, beta)
    } else {
        0 // Dummy value, we won't use it if in check
    };

    // [STEP 2] Update Reverse Futility Pruning (RFP) to use the variable
    if depth < RFP_DEPTH_LIMIT && !in_check_now && ply > 0 {
        let margin = RFP_MARGIN_BASE + RFP_MARGIN_MULT * depth;
        if static_eval_val - margin >= beta {
            pv.clear_from(ply);
            return (beta, None);
        }
    }
    // =============================================================

    // =============================================================
    // 1. NULL MOVE PRUNING (non-PV only, per §4.I item 3)
    // =============================================================
    if depth >= 4
        && !is_pv
        && !in_check_now
        && board.has_major_pieces(board.side_to_move)
        && static_eval_val >= beta
    // Only null move if we are already winning statically
    {
        // Dynamic Reduction: If deep, reduce more.
        let r = if depth > 6 { 3 } else { 2 };

        let undo = make_null_move(board);

        // Scout search with Null Window
        let (val, _) = alpha_beta(
            board,
            tables,
            ctx,
            tt,
            pv,
            depth - r - 1,
            ply + 1,
            -beta,
            -beta + 1,
            false,
            None,
            nodes,
            time,
        );
        let score = -val;
        undo_null_move(board, undo);

        if score >= beta && !time.stop_signal {
            // Verification search for high depths (Optional safety)
            if score >= MATE_THRESHOLD {
                // Don't trust null move mates, search normally
            } else {
                pv.clear_from(ply);
                return (beta, None);
            }
        }
    }

    // =============================================================
    // 2. RAZORING (non-PV only, per §4.I item 4)
    // =============================================================
    if !is_pv
        && !in_check_now
        && excluded.is_none()
        && depth <= RAZOR_DEPTH_LIMIT
        && depth > 0
    {
        let margin = razor_margin(depth);
        if static_eval_val + margin < beta {
            let razor_beta = beta - 1;
            let qs = quiescence(board, tables, ctx, tt, ply, razor_beta, beta, nodes, time);
            if qs < beta {
                pv.clear_from(ply);
                return (qs.max(static_eval_val + margin), None);
            }
        }
    }

    // =============================================================
    // 3. SINGULAR EXTENSION PROBE (PV only, per §4.I item 5)
    // =============================================================
    // If the TT move is the only move that doesn't collapse the score, its
    // own full-depth search below isn't reduced by `next_depth_pv`.
    let mut singular_move: Option<Move> = None;
    if is_pv && excluded.is_none() && !in_check_now && depth >= SINGULAR_MIN_DEPTH {
        if let Some((Some(tm), _raw_score, tt_depth, bound)) = tt_entry
            && bound == NodeType::Exact as u8
            && tt_depth as i32 >= depth
        {
            let singular_beta = (static_eval_val - SINGULAR_MARGIN).max(-INF);
            let (verify_score, _) = alpha_beta(
                board,
                tables,
                ctx,
                tt,
                pv,
                (depth - SINGULAR_MIN_DEPTH).max(1),
                ply,
                singular_beta - 1,
                singular_beta,
                false,
                Some(tm),
                nodes,
                time,
            );
            if verify_score < singular_beta {
                singular_move = Some(tm);
            }
        }
    }

    // Use MovePicker for staged move generation
    let mut picker = MovePicker::new(hash_move, ctx.killer_moves[ply], false);

    let mut best_move = None;
    let mut best_score = -INF;
    let original_alpha = alpha;
    let mut move_count = 0;

    while let Some(mv) = picker.next(board, tables, &ctx.history) {
        if Some(mv) == excluded {
            continue;
        }

        // [STEP 3] OPTIMIZED FUTILITY PRUNING
        // Logic: If the move is quiet and our position is hopelessly below Alpha, skip it.
        if depth < FP_DEPTH_LIMIT
            && !in_check_now
            && !mv.is_capture()
            && !mv.is_promotion()
            && move_count > 0
        {
            let margin = FP_MARGIN_BASE + FP_MARGIN_MULT * depth;

            // HISTORY PROTECTION (The Optimization):
            // We retrieve the history score for this move.
            let history = ctx.history[mv.from.index() as usize][mv.to.index() as usize];

            // If the move has a high history score (> 2000), it has been good in other nodes.
            // We should NOT prune it, even if static eval says it's bad.
            if history < FP_HISTORY_THRESHOLD && static_eval_val + margin <= alpha {
                continue; // PRUNE: Skip to next move
            }
        }

        // =========================================================
        // LATE MOVE PRUNING (LMP)
        // =========================================================
        // Logic: If we have searched many quiet moves and haven't found a
        // good one yet, it's highly unlikely the remaining (unsorted) moves
        // will be any better. Just cut them off.
        if depth < LMP_DEPTH_LIMIT
            && !in_check_now
            && !mv.is_capture()
            && !mv.is_promotion()
            && alpha == original_alpha
        {
            let lmp_threshold = LMP_BASE_MOVES + LMP_MOVE_MULTIPLIER * depth;
            if move_count > lmp_threshold as usize {
                break;
            }
        }
        // =========================================================

        let is_killer = ctx.killer_moves[ply].iter().any(|k| *k == Some(mv));
        let see_nonneg = board.see_score(mv, tables) >= 0;
        let pawn_push_passed = is_passed_pawn_move(board, mv);

        let undo = make_move_basic(board, mv);
        let gives_check = in_check(board, board.side_to_move, tables);

        let mut score;
        let mut pruned = false;

        if move_count == 0 {
            let is_singular_tt_move = singular_move == Some(mv);
            let child_depth =
                next_depth_pv(depth, is_singular_tt_move, gives_check, pawn_push_passed, see_nonneg)
                    + extension;
            let (val, _) = alpha_beta(
                board,
                tables,
                ctx,
                tt,
                pv,
                child_depth,
                ply + 1,
                -beta,
                -alpha,
                is_pv,
                None,
                nodes,
                time,
            );
            score = -val;
        } else {
            let queen_promo = mv.promotion == Some(Piece::Queen);
            let next = if in_check_now {
                Some(depth - 1)
            } else {
                next_depth_not_pv(
                    depth,
                    move_count,
                    is_pv,
                    gives_check,
                    see_nonneg,
                    queen_promo,
                    mv.is_capture(),
                    is_killer,
                    true,
                    static_eval_val,
                    alpha,
                )
            };

            match next {
                None => {
                    score = alpha;
                    pruned = true;
                }
                Some(reduced_depth) => {
                    // Perform the Reduced/Scout Search (Zero Window)
                    let (val, _) = alpha_beta(
                        board,
                        tables,
                        ctx,
                        tt,
                        pv,
                        reduced_depth,
                        ply + 1,
                        -alpha - 1,
                        -alpha,
                        false,
                        None,
                        nodes,
                        time,
                    );
                    score = -val;

                    // Re-search at full depth (still zero window) if the
                    // reduced search found a surprisingly good move.
                    if score > alpha && reduced_depth < depth - 1 + extension {
                        let (val, _) = alpha_beta(
                            board,
                            tables,
                            ctx,
                            tt,
                            pv,
                            depth - 1 + extension,
                            ply + 1,
                            -alpha - 1,
                            -alpha,
                            false,
                            None,
                            nodes,
                            time,
                        );
                        score = -val;
                    }

                    if score > alpha && score < beta {
                        let (val, _) = alpha_beta(
                            board,
                            tables,
                            ctx,
                            tt,
                            pv,
                            depth - 1 + extension,
                            ply + 1,
                            -beta,
                            -alpha,
                            is_pv,
                            None,
                            nodes,
                            time,
                        );
                        score = -val;
                    }
                }
            }
        }

        undo_move_basic(board, undo);
        move_count += 1;

        if time.stop_signal {
            return (0, None);
        }

        if pruned {
            continue;
        }

        if score > best_score {
            best_score = score;
            if score > alpha {
                alpha = score;
                best_move = Some(mv);
                pv.update(ply, mv);
            }
            if score >= beta {
                if excluded.is_none() {
                    // TT SAVE WITH MATE SCORE ADJUSTMENT (LowerBound/Beta Cutoff)
                    let tt_score = score_to_tt(beta, ply as i32);
                    tt.save(
                        hash,
                        Some(mv),
                        tt_score,
                        depth as u8,
                        NodeType::LowerBound as u8,
                        ply as i32,
                    );
                }

                if !mv.is_capture() {
                    ctx.update_killer(ply, mv);
                    ctx.update_history(mv, depth);
                }

                return (beta, Some(mv));
            }
        }
    }

    // No legal moves found - checkmate or stalemate
    if move_count == 0 {
        pv.clear_from(ply);
        if excluded.is_some() {
            // Every sibling of the excluded TT move was itself excluded or
            // pruned; that can't happen since excluded is only ever one
            // move, but guard against the degenerate single-legal-move case
            // by falling back to the static eval rather than a false mate.
            return (static_eval_val, None);
        }
        if in_check_now {
            return (-MATE_SCORE + ply as i32, None);
        }
        return (0, None);
    }

    if time.stop_signal {
        return (0, None);
    }

    let node_type = if best_score >= beta {
        NodeType::LowerBound
    } else if best_score > original_alpha {
        NodeType::Exact
    } else {
        NodeType::UpperBound
    };

    if excluded.is_none() {
        // TT SAVE WITH MATE SCORE ADJUSTMENT (Best Score)
        // We save 'best_score' (which is alpha if exact, or the best failed low score if UpperBound)
        let tt_score = score_to_tt(best_score, ply as i32);
        tt.save(
            hash,
            best_move,
            tt_score,
            depth as u8,
            node_type as u8,
            ply as i32,
        );
    }

    (best_score, best_move)
}

pub fn search(
    board: &mut Board,
    tables: &MagicTables,
    max_depth: i32,
    limits: SearchLimits,
) -> (i32, Option<Move>) {
    let mut last_completed_best_move = None;
    let mut last_completed_best_score = 0;
    let mut nodes = 0;
    let tt = TranspositionTable::new(512);
    let mut ctx = SearchContext::new();
    let mut pv = PvTable::new();
    let mut time = TimeManager::new(board.side_to_move, &limits);
    let mut last_iter_duration = Duration::from_millis(0);

    for depth in 1..=max_depth {
        let iter_start = Instant::now();

        // --- ITERATIVE DEEPENING SAFETY CHECK ---
        // Predict if we can afford the next depth before starting it.
        // Conservative estimate: Next depth takes ~3x longer than previous.
        // (Using 3x instead of 2x because branching factor can spike in tactical positions)
        if depth > 1
            && let Some(limit) = time.allocated_time()
        {
            let total_elapsed = time.elapsed();
            let predicted_next = last_iter_duration * 3;

            // If predicting the next depth would push us over the limit: STOP.
            if total_elapsed + predicted_next > limit {
                break;
            }
        }
        // -----------------------------------------

        // --- Aspiration Window Logic ---
        let mut alpha = -INF;
        let mut beta = INF;
        let window = 50; // Window size (50cp)

        // Only apply aspiration windows at depth > 4 for stability
        if depth > 4 {
            alpha = last_completed_best_score - window;
            beta = last_completed_best_score + window;
        }

        let mut score;
        let mut mv;

        loop {
            // Perform the search with the current window
            let result = alpha_beta(
                board, tables, &mut ctx, &tt, &mut pv, depth, 0, alpha, beta, true, None,
                &mut nodes, &mut time,
            );

            score = result.0;
            mv = result.1;

            // If we ran out of time during the search, stop immediately
            if time.stop_signal {
                break;
            }

            // 1. Fail Low (Score <= Alpha): Position is worse than expected.
            // Only widen alpha downwards. Keep beta unchanged for stability.
            if score <= alpha {
                alpha = -INF;
                continue;
            }

            // 2. Fail High (Score >= Beta): Position is better than expected.
            // Only widen beta upwards. Keep alpha unchanged for stability.
            if score >= beta {
                beta = INF;
                continue;
            }

            // 3. Success: Score is within the window.
            break;
        }
        // -------------------------------

        // Record duration for the NEXT prediction check
        last_iter_duration = iter_start.elapsed();

        // CRITICAL FIX: If the stop signal was triggered, DO NOT update the best move.
        // The search at this depth is incomplete and likely contains blunders.
        if time.stop_signal {
            break;
        }

        // Only update if the depth actually finished
        last_completed_best_score = score;
        last_completed_best_move = mv;

        // Output info for GUI (standard UCI)
        if let Some(valid_mv) = last_completed_best_move {
            let score_str = if last_completed_best_score.abs() >= MATE_THRESHOLD {
                let moves = (MATE_SCORE - last_completed_best_score.abs() + 1) / 2;
                if last_completed_best_score > 0 {
                    format!("mate {}", moves)
                } else {
                    format!("mate -{}", moves)
                }
            } else {
                format!("cp {}", last_completed_best_score)
            };

            let line = pv.line();
            let pv_str = if line.is_empty() {
                valid_mv.to_uci()
            } else {
                line.iter()
                    .map(|m| m.to_uci())
                    .collect::<Vec<_>>()
                    .join(" ")
            };

            println!(
                "info depth {} score {} nodes {} hashfull {} time {} pv {}",
                depth,
                score_str,
                nodes,
                tt.hashfull(),
                time.start_time.elapsed().as_millis(),
                pv_str
            );
        }

        // Optimization: If we found a mate, stop searching deeper
        if score.abs() >= MATE_THRESHOLD {
            break;
        }
    }

    (last_completed_best_score, last_completed_best_move)
}
