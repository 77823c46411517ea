//! Syzygyテーブルベース
//!
//! shakmaty-syzygy のラッパー。WDLプローブとルート手のランク付けを
//! 提供する。プローブ失敗は黙って `None` / `false` に落ち、探索は
//! TBなしで続行する。

use std::path::Path;

use shakmaty::Chess;
use shakmaty_syzygy::{Tablebase, Wdl};

use crate::position::Position;
use crate::search::RootMoves;
use crate::types::Value;

/// WDLの結果（手番側視点）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbWdl {
    Loss,
    BlessedLoss,
    Draw,
    CursedWin,
    Win,
}

impl TbWdl {
    /// ランク（大きいほど手番側に良い）
    #[inline]
    pub fn rank(self) -> i32 {
        match self {
            TbWdl::Win => 1000,
            TbWdl::CursedWin => 900,
            TbWdl::Draw => 0,
            TbWdl::BlessedLoss => -900,
            TbWdl::Loss => -1000,
        }
    }

    /// 視点の反転
    #[inline]
    pub fn negate(self) -> TbWdl {
        match self {
            TbWdl::Win => TbWdl::Loss,
            TbWdl::CursedWin => TbWdl::BlessedLoss,
            TbWdl::Draw => TbWdl::Draw,
            TbWdl::BlessedLoss => TbWdl::CursedWin,
            TbWdl::Loss => TbWdl::Win,
        }
    }

    fn from_engine(wdl: Wdl) -> TbWdl {
        match wdl {
            Wdl::Win => TbWdl::Win,
            Wdl::CursedWin => TbWdl::CursedWin,
            Wdl::Draw => TbWdl::Draw,
            Wdl::BlessedLoss => TbWdl::BlessedLoss,
            Wdl::Loss => TbWdl::Loss,
        }
    }

    /// 探索スコアへ変換
    ///
    /// 50手ルールを尊重する場合、cursed win / blessed loss は引き分け
    /// 寄りの微小値になる。
    pub fn to_value(self, ply: i32, rule50_aware: bool) -> Value {
        match self {
            TbWdl::Win => Value::tb_win_in(ply),
            TbWdl::Loss => Value::tb_loss_in(ply),
            TbWdl::Draw => Value::DRAW,
            TbWdl::CursedWin => {
                if rule50_aware {
                    Value::new(1)
                } else {
                    Value::tb_win_in(ply)
                }
            }
            TbWdl::BlessedLoss => {
                if rule50_aware {
                    Value::new(-1)
                } else {
                    Value::tb_loss_in(ply)
                }
            }
        }
    }
}

/// Syzygyテーブルベース一式
pub struct SyzygyTablebases {
    tb: Tablebase<Chess>,
    max_pieces: usize,
}

impl SyzygyTablebases {
    /// ディレクトリからテーブルを読み込む
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let mut tb = Tablebase::new();
        let count = tb.add_directory(path.as_ref())?;
        let max_pieces = tb.max_pieces();
        log::info!("syzygy: loaded {count} tables, up to {max_pieces} pieces");
        Ok(Self { tb, max_pieces })
    }

    /// 読み込んだテーブルが対応する最大駒数
    #[inline]
    pub fn max_pieces(&self) -> usize {
        self.max_pieces
    }

    /// プローブ可能な局面か
    ///
    /// 駒数が範囲内で、キャスリング権がなく、50手カウンタが0のとき。
    pub fn can_probe(&self, pos: &Position) -> bool {
        (pos.piece_count() as usize) <= self.max_pieces
            && !pos.has_castling_rights(shakmaty::Color::White)
            && !pos.has_castling_rights(shakmaty::Color::Black)
            && pos.rule50_count() == 0
    }

    /// WDLプローブ（ゼロ手後）
    ///
    /// 失敗時は `None`（探索はTBなしで続行する）。
    pub fn probe_wdl(&self, pos: &Position) -> Option<TbWdl> {
        if !self.can_probe(pos) {
            return None;
        }
        match self.tb.probe_wdl_after_zeroing(pos.rules()) {
            Ok(wdl) => Some(TbWdl::from_engine(wdl)),
            Err(_) => None,
        }
    }

    /// ルート手をTBランクで順位付けする
    ///
    /// 全ルート手がプローブできた場合のみtrue（root in TB）。
    pub fn rank_root_moves(&self, pos: &mut Position, root_moves: &mut RootMoves) -> bool {
        if root_moves.is_empty() || (pos.piece_count() as usize) > self.max_pieces {
            return false;
        }

        for i in 0..root_moves.len() {
            let m = root_moves[i].mv();
            pos.do_move(m);
            let wdl = self.probe_wdl(pos).map(TbWdl::negate);
            pos.undo_move(m);

            match wdl {
                Some(wdl) => {
                    root_moves[i].tb_rank = wdl.rank();
                    root_moves[i].tb_score = wdl.to_value(1, true);
                }
                None => {
                    // 1手でも引けなければTB情報は使わない
                    for j in 0..root_moves.len() {
                        root_moves[j].tb_rank = 0;
                        root_moves[j].tb_score = Value::ZERO;
                    }
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wdl_negate_roundtrip() {
        for wdl in [
            TbWdl::Win,
            TbWdl::CursedWin,
            TbWdl::Draw,
            TbWdl::BlessedLoss,
            TbWdl::Loss,
        ] {
            assert_eq!(wdl.negate().negate(), wdl);
        }
    }

    #[test]
    fn test_wdl_values_in_tb_range() {
        let v = TbWdl::Win.to_value(3, false);
        assert!(v.is_win());
        assert!(!v.is_mate_score());

        let v = TbWdl::CursedWin.to_value(3, true);
        assert!(!v.is_decisive());
    }

    #[test]
    fn test_wdl_rank_ordering() {
        assert!(TbWdl::Win.rank() > TbWdl::CursedWin.rank());
        assert!(TbWdl::CursedWin.rank() > TbWdl::Draw.rank());
        assert!(TbWdl::Draw.rank() > TbWdl::BlessedLoss.rank());
        assert!(TbWdl::BlessedLoss.rank() > TbWdl::Loss.rank());
    }
}
