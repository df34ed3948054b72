use crate::board::Piece;
use crate::moves::types::Move;
use crate::square::Square;
use crate::utils::mul_hi64;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

// Make sure MATE_THRESHOLD matches what we define in search.rs (30000)
pub const MATE_THRESHOLD: i32 = 30000;

const BUCKET_SIZE: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeType {
    Exact = 0,
    LowerBound = 1, // Beta cutoff (failed high)
    UpperBound = 2, // Alpha cutoff (failed low)
}

// --- Move <-> 22-bit packing -------------------------------------------
// from(6) | to(6) | piece(3) | promotion(3) | flags(4)
const NO_MOVE_BITS: u32 = (1 << 22) - 1;

fn encode_move(mv: Move) -> u32 {
    let promo = match mv.promotion {
        None => 0u32,
        Some(Piece::Knight) => 1,
        Some(Piece::Bishop) => 2,
        Some(Piece::Rook) => 3,
        Some(Piece::Queen) => 4,
        Some(_) => 0,
    };
    (mv.from.index() as u32)
        | (mv.to.index() as u32) << 6
        | (mv.piece as u32) << 12
        | promo << 15
        | (mv.flags as u32) << 18
}

fn decode_move(bits: u32) -> Option<Move> {
    if bits == NO_MOVE_BITS {
        return None;
    }
    let from = (bits & 0x3F) as u8;
    let to = ((bits >> 6) & 0x3F) as u8;
    let piece = Piece::from_u8(((bits >> 12) & 0x7) as u8);
    let promotion = match (bits >> 15) & 0x7 {
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => None,
    };
    let flags = ((bits >> 18) & 0xF) as u8;
    Some(Move {
        from: Square::from_index(from),
        to: Square::from_index(to),
        piece,
        promotion,
        flags,
    })
}

// --- Entry packing: move(22) | score(16) | depth(7) | bound(2) | age(8) --
fn pack(mv_bits: u32, score: i16, depth: u8, bound: u8, age: u8) -> u64 {
    (mv_bits as u64)
        | (score as u16 as u64) << 22
        | ((depth & 0x7F) as u64) << 38
        | ((bound & 0x3) as u64) << 45
        | (age as u64) << 47
}

fn unpack(data: u64) -> (u32, i16, u8, u8, u8) {
    let mv_bits = (data & 0x3F_FFFF) as u32;
    let score = ((data >> 22) & 0xFFFF) as u16 as i16;
    let depth = ((data >> 38) & 0x7F) as u8;
    let bound = ((data >> 45) & 0x3) as u8;
    let age = ((data >> 47) & 0xFF) as u8;
    (mv_bits, score, depth, bound, age)
}

/// One 16-byte TT slot: a 64-bit data word plus `key ^ data`, so a reader
/// that races a concurrent writer sees a key/data pair that fails the XOR
/// check (and is treated as a miss) rather than a torn, corrupted entry.
/// Classic lock-free TT trick (Stockfish's `TTEntry::save`/`key16` dance);
/// here both words are genuinely atomic individually, so the only failure
/// mode left is a benign false miss on the rare read-during-write race.
struct TTSlot {
    key_xor_data: AtomicU64,
    data: AtomicU64,
}

impl Default for TTSlot {
    fn default() -> Self {
        Self {
            key_xor_data: AtomicU64::new(0),
            data: AtomicU64::new(0),
        }
    }
}

impl TTSlot {
    #[inline]
    fn load(&self) -> (u64, u64) {
        // Data first, then the XOR word: a write ordered the same way means
        // a reader that loses the race sees a (data, key_xor_data) pair
        // that was never actually stored together, so the XOR check fails.
        let data = self.data.load(Ordering::Relaxed);
        let key_xor_data = self.key_xor_data.load(Ordering::Relaxed);
        (key_xor_data, data)
    }

    #[inline]
    fn store(&self, key: u64, data: u64) {
        self.data.store(data, Ordering::Relaxed);
        self.key_xor_data.store(key ^ data, Ordering::Relaxed);
    }
}

/// Lock-free-friendly (single-writer-per-search, many-reader) bucketed
/// transposition table. Each key hashes to a bucket of four entries via
/// `mul_hi64` (high 64 bits of `key * bucket_count`, cheaper and less biased
/// than a direct `key & (len - 1)` mask); replacement within a bucket favors
/// the entry from the oldest generation with the shallowest depth. All
/// methods take `&self`: reads and writes are plain relaxed atomic loads and
/// stores rather than going through a lock, matching how `pool.rs`'s worker
/// threads share one table concurrently during a search.
pub struct TranspositionTable {
    buckets: Vec<[TTSlot; BUCKET_SIZE]>,
    generation: AtomicU8,
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let bucket_bytes = std::mem::size_of::<[TTSlot; BUCKET_SIZE]>();
        let num_buckets = (size_mb * 1024 * 1024) / bucket_bytes;

        // Round down to power of 2 so `mul_hi64` indexing stays uniform.
        let mut capacity = 1usize;
        while capacity * 2 <= num_buckets.max(1) {
            capacity *= 2;
        }

        Self {
            buckets: (0..capacity)
                .map(|_| std::array::from_fn(|_| TTSlot::default()))
                .collect(),
            generation: AtomicU8::new(0),
        }
    }

    fn bucket_index(&self, key: u64) -> usize {
        mul_hi64(key, self.buckets.len() as u64) as usize
    }

    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            for slot in bucket.iter() {
                slot.store(0, 0);
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    pub fn save(&self, key: u64, mv: Option<Move>, score: i32, depth: u8, bound: u8, _ply: i32) {
        let score_i16 = score.clamp(-32000, 32000) as i16;
        let generation = self.generation.load(Ordering::Relaxed);
        let bucket = &self.buckets[self.bucket_index(key)];

        let mut replace_idx = 0usize;
        let mut best_replace_score = i32::MIN;
        let mut slots: [(u64, u64); BUCKET_SIZE] = [(0, 0); BUCKET_SIZE];

        for (i, slot) in bucket.iter().enumerate() {
            let (key_xor_data, data) = slot.load();
            slots[i] = (key_xor_data, data);
            let stored_key = key_xor_data ^ data;

            if stored_key == key || data == 0 {
                replace_idx = i;
                break;
            }
            let (_, _, entry_depth, _, entry_age) = unpack(data);
            let age_gap = generation.wrapping_sub(entry_age) as i32;
            let replace_score = (age_gap << 9) - entry_depth as i32;
            if replace_score > best_replace_score {
                best_replace_score = replace_score;
                replace_idx = i;
            }
        }

        let (existing_key_xor_data, existing_data) = slots[replace_idx];
        let existing_key = existing_key_xor_data ^ existing_data;
        let (existing_mv_bits, _, existing_depth, _, _) = unpack(existing_data);

        if existing_key != key || depth >= existing_depth {
            let mv_bits = match mv {
                Some(mv) => encode_move(mv),
                None if existing_key == key => existing_mv_bits,
                None => NO_MOVE_BITS,
            };
            let data = pack(mv_bits, score_i16, depth, bound, generation);
            bucket[replace_idx].store(key, data);
        }
    }

    pub fn probe(
        &self,
        key: u64,
        _depth: u8,
        _alpha: i32,
        _beta: i32,
        _ply: i32,
    ) -> Option<(Option<Move>, i32, u8, u8)> {
        let bucket = &self.buckets[self.bucket_index(key)];
        for slot in bucket.iter() {
            let (key_xor_data, data) = slot.load();
            if data == 0 {
                continue;
            }
            if key_xor_data ^ data == key {
                let (mv_bits, score, depth, bound, _age) = unpack(data);
                return Some((decode_move(mv_bits), score as i32, depth, bound));
            }
        }
        None
    }

    /// Permille of buckets containing at least one live entry from the
    /// current generation, for the UCI `hashfull` info field.
    pub fn hashfull(&self) -> usize {
        let sample = self.buckets.len().min(1000);
        if sample == 0 {
            return 0;
        }
        let generation = self.generation.load(Ordering::Relaxed);
        let used = self.buckets[..sample]
            .iter()
            .filter(|bucket| {
                bucket.iter().any(|slot| {
                    let (_, data) = slot.load();
                    if data == 0 {
                        return false;
                    }
                    let (_, _, _, _, age) = unpack(data);
                    age == generation
                })
            })
            .count();
        used * 1000 / sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_after_save_returns_same_entry() {
        let tt = TranspositionTable::new(1);
        tt.save(12345, None, 100, 4, NodeType::Exact as u8, 0);
        let (_, score, depth, bound) = tt.probe(12345, 4, -1000, 1000, 0).unwrap();
        assert_eq!(score, 100);
        assert_eq!(depth, 4);
        assert_eq!(bound, NodeType::Exact as u8);
    }

    #[test]
    fn probe_miss_returns_none() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(999, 0, -1000, 1000, 0).is_none());
    }

    #[test]
    fn new_search_bumps_generation_and_deprioritizes_old_entries() {
        let tt = TranspositionTable::new(1);
        tt.save(1, None, 10, 2, NodeType::Exact as u8, 0);
        tt.new_search();
        assert_eq!(tt.generation(), 1);
    }

    #[test]
    fn clear_removes_all_entries() {
        let tt = TranspositionTable::new(1);
        tt.save(1, None, 10, 2, NodeType::Exact as u8, 0);
        tt.clear();
        assert!(tt.probe(1, 0, -1000, 1000, 0).is_none());
    }

    #[test]
    fn save_preserves_move_when_later_save_omits_one() {
        use crate::moves::types::QUIET_MOVE;
        let tt = TranspositionTable::new(1);
        let mv = Move {
            from: Square::from_index(12),
            to: Square::from_index(28),
            piece: Piece::Pawn,
            promotion: None,
            flags: QUIET_MOVE,
        };
        tt.save(42, Some(mv), 10, 3, NodeType::Exact as u8, 0);
        tt.save(42, None, 20, 5, NodeType::LowerBound as u8, 0);
        let (stored_mv, score, depth, _) = tt.probe(42, 0, -1000, 1000, 0).unwrap();
        assert_eq!(stored_mv, Some(mv));
        assert_eq!(score, 20);
        assert_eq!(depth, 5);
    }
}
