//! 探索モジュール
//!
//! - `alpha_beta`: SearchWorkerと再帰探索本体
//! - `qsearch`: 静止探索
//! - `movepicker`: 指し手オーダリング
//! - `history`: History統計
//! - `pruning`: 枝刈りヘルパー
//! - `time_management`: 思考時間の配分
//! - `parallel`: Lazy SMPスレッドプール
//! - `params`: チューニングパラメータ

pub mod alpha_beta;
mod eval_helpers;
pub mod history;
pub mod movepicker;
pub mod parallel;
pub mod params;
mod pruning;
mod qsearch;
mod search_helpers;
pub mod time_management;
pub mod tt_history;
pub mod types;

pub use alpha_beta::{SearchEnv, SearchWorker};
pub use history::{HistoryCell, HistoryTables, PieceToHistory, PAWN_HISTORY_SIZE};
pub use movepicker::MovePicker;
pub use parallel::{
    InfoSink, NullSink, SearchInfo, SearchPool, SearchResult, SharedSearch, Skill, ThinkOptions,
};
pub use params::SearchTuneParams;
pub use time_management::TimeManagement;
pub use types::{LimitsType, NodeType, RootMove, RootMoves};

#[cfg(test)]
mod tests;
