pub mod context;
pub mod eval;
pub mod pawn_hash;
pub mod pesto;
pub mod picker;
pub mod pool;
pub mod pv;
pub mod search;
pub mod see;
pub mod tt;
