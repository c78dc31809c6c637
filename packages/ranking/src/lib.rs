pub mod error;
pub mod freeze;
pub mod leaderboard;

pub use error::RankingError;
pub use freeze::AutoFreezeScheduler;
pub use leaderboard::{
    CellUpdate, Leaderboard, LeaderboardCell, LeaderboardRow, Projection,
    WRONG_SUBMISSION_PENALTY_SECS, compare_rows, compute_cell, compute_contest, merge_cell_update,
};
