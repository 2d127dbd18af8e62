//! The score policy: a pure function mapping difficulty to points.

use crate::domain::Difficulty;

/// Points awarded for a correct answer of the given difficulty.
///
/// Configurable via `POINTS_FOR` (see [`crate::config::EngineConfig`]); this
/// is the compiled-in default the config layer falls back to.
pub fn points_for(difficulty: Difficulty) -> i64 {
    match difficulty {
        Difficulty::Easy => 1,
        Difficulty::Medium => 2,
        Difficulty::Hard => 3,
    }
}
