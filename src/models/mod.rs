//! Core data models for the stat tracker.

mod game_mode;
mod games_status;
mod most_play_with;
mod stat_tree;
mod target;
mod task;

pub use game_mode::*;
pub use games_status::*;
pub use most_play_with::*;
pub use stat_tree::*;
pub use target::*;
pub use task::*;
