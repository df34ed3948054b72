//! Lazy-SMP thread pool: every worker searches the same root independently
//! with its own board copy, `SearchContext`, and `PvTable`, sharing only the
//! transposition table. Depth-1 workers get a one-ply head start so early
//! iterations don't duplicate the main thread's work, then everyone races
//! to the same time/depth limit; the deepest *completed* result wins.

use crate::board::Board;
use crate::moves::magic::MagicTables;
use crate::moves::types::Move;
use crate::search::context::SearchContext;
use crate::search::pv::PvTable;
use crate::search::search::{SearchLimits, TimeManager, alpha_beta};
use crate::search::tt::TranspositionTable;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

struct WorkerResult {
    depth: i32,
    score: i32,
    best_move: Option<Move>,
}

pub struct ThreadPool {
    num_threads: usize,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Runs iterative deepening on `self.num_threads` workers sharing `tt`,
    /// returning the root score/move from whichever worker reached the
    /// greatest completed depth. The table is read/written through plain
    /// atomics (see `tt.rs`), so workers need no lock to share it.
    pub fn search(
        &self,
        root: &Board,
        tables: &MagicTables,
        tt: Arc<TranspositionTable>,
        max_depth: i32,
        time_limit: Option<Duration>,
    ) -> (i32, Option<Move>) {
        let stop = Arc::new(AtomicBool::new(false));
        let total_nodes = Arc::new(AtomicU64::new(0));

        let results: Vec<WorkerResult> = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.num_threads);
            for worker_id in 0..self.num_threads {
                let mut board = root.clone();
                let tt = Arc::clone(&tt);
                let stop = Arc::clone(&stop);
                let total_nodes = Arc::clone(&total_nodes);
                // Odd workers search one ply deeper first to diversify the
                // move-ordering state they build up (classic Lazy-SMP skip).
                let start_depth = 1 + (worker_id % 2) as i32;

                handles.push(scope.spawn(move || {
                    run_worker(
                        &mut board,
                        tables,
                        &tt,
                        max_depth,
                        start_depth,
                        time_limit,
                        &stop,
                        &total_nodes,
                    )
                }));
            }
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        results
            .into_iter()
            .max_by_key(|r| (r.depth, r.score))
            .map(|r| (r.score, r.best_move))
            .unwrap_or((0, None))
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    board: &mut Board,
    tables: &MagicTables,
    tt: &TranspositionTable,
    max_depth: i32,
    start_depth: i32,
    time_limit: Option<Duration>,
    stop: &AtomicBool,
    total_nodes: &AtomicU64,
) -> WorkerResult {
    let mut ctx = SearchContext::new();
    let mut pv = PvTable::new();
    let limits = match time_limit {
        Some(d) => SearchLimits::fixed_movetime(d.as_millis() as u64),
        None => SearchLimits::default(),
    };
    let mut time = TimeManager::new(board.side_to_move, &limits);
    let mut nodes = 0u64;

    let mut best = WorkerResult {
        depth: 0,
        score: 0,
        best_move: None,
    };

    for depth in start_depth..=max_depth {
        if stop.load(Ordering::Relaxed) || time.elapsed_exceeds(time_limit) {
            break;
        }

        let (score, mv) = alpha_beta(
            board,
            tables,
            &mut ctx,
            tt,
            &mut pv,
            depth,
            0,
            -32000,
            32000,
            true,
            None,
            &mut nodes,
            &mut time,
        );

        total_nodes.fetch_add(nodes, Ordering::Relaxed);

        if time.stop_signal {
            break;
        }

        best = WorkerResult {
            depth,
            score,
            best_move: mv,
        };

        if score.abs() >= crate::search::tt::MATE_THRESHOLD {
            stop.store(true, Ordering::Relaxed);
            break;
        }
    }

    best
}

impl TimeManager {
    fn elapsed_exceeds(&self, limit: Option<Duration>) -> bool {
        match limit {
            Some(limit) => self.elapsed() >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::magic::loader::load_magic_tables;

    #[test]
    fn single_threaded_pool_finds_a_move_from_the_start_position() {
        let tables = load_magic_tables();
        let board = Board::new();
        let tt = Arc::new(TranspositionTable::new(1));
        let pool = ThreadPool::new(1);
        let (_, mv) = pool.search(&board, &tables, tt, 3, None);
        assert!(mv.is_some());
    }

    #[test]
    fn multiple_workers_agree_on_a_legal_root_move() {
        let tables = load_magic_tables();
        let board = Board::new();
        let tt = Arc::new(TranspositionTable::new(1));
        let pool = ThreadPool::new(4);
        let (_, mv) = pool.search(&board, &tables, tt, 3, None);
        assert!(mv.is_some());
    }
}
