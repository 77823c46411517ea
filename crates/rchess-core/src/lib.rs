//! RChess コアライブラリ
//!
//! UCIチェスエンジンの意思決定コア。
//! - 反復深化Alpha-Beta探索（Lazy SMP、置換表共有）
//! - 置換表 / 各種History統計
//! - 評価ラッパー（2成分ネットワーク + マテリアル/スタイル/フェーズ合成）
//! - 時間管理
//!
//! 盤面ルール（合法手生成・FEN・Zobrist）は shakmaty に委譲し、
//! `position::Position` がエンジン側で必要な操作を付け足す。

pub mod book;
pub mod eval;
pub mod position;
pub mod search;
pub mod tb;
pub mod tt;
pub mod types;

pub use position::Position;
pub use types::{Depth, Move, TimePoint, Value, MAX_PLY};
