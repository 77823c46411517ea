//! 指し手の16bitコンパクト表現
//!
//! 置換表・History統計に格納するため、指し手を16bitに詰める。
//!
//! ```text
//! bit  0- 5: 移動先マス
//! bit  6-11: 移動元マス
//! bit 12-13: 成り駒（0=Knight, 1=Bishop, 2=Rook, 3=Queen）
//! bit 14-15: 種別（0=通常, 1=成り, 2=アンパッサン, 3=キャスリング）
//! ```
//!
//! キャスリングは「キングの元位置 → ルークのマス」で符号化する
//! （Chess960と通常ルールを同一表現で扱える）。
//!
//! 復元には局面の文脈が必要で、`Position::to_engine_move` が盤面から
//! 駒種を引き直して合法性ごと検証する。置換表のレースで壊れた指し手は
//! そこで弾かれる。

use shakmaty::{Move as EngineMove, Role, Square};

/// 指し手の種別
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u16)]
pub enum MoveKind {
    Normal = 0,
    Promotion = 1,
    EnPassant = 2,
    Castling = 3,
}

/// 16bitコンパクト指し手
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// 無効（指し手なし）
    pub const NONE: Move = Move(0);
    /// Null move（手番だけ渡す）
    pub const NULL: Move = Move(65); // from == to == B1 相当

    /// 生の16bit値から生成
    #[inline]
    pub const fn from_raw(raw: u16) -> Move {
        Move(raw)
    }

    /// 生の16bit値を取得
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// 通常の指し手を符号化
    #[inline]
    pub fn normal(from: Square, to: Square) -> Move {
        Move(((from as u16) << 6) | (to as u16))
    }

    /// 成りの指し手を符号化
    #[inline]
    pub fn promotion(from: Square, to: Square, promo: Role) -> Move {
        let promo_bits = match promo {
            Role::Knight => 0u16,
            Role::Bishop => 1,
            Role::Rook => 2,
            _ => 3, // Queen（King/Pawnへの成りは存在しない）
        };
        Move((MoveKind::Promotion as u16) << 14
            | promo_bits << 12
            | ((from as u16) << 6)
            | (to as u16))
    }

    /// アンパッサンを符号化
    #[inline]
    pub fn en_passant(from: Square, to: Square) -> Move {
        Move((MoveKind::EnPassant as u16) << 14 | ((from as u16) << 6) | (to as u16))
    }

    /// キャスリングを符号化（king → rook）
    #[inline]
    pub fn castling(king: Square, rook: Square) -> Move {
        Move((MoveKind::Castling as u16) << 14 | ((king as u16) << 6) | (rook as u16))
    }

    /// エンジン（shakmaty）形式から変換
    pub fn from_engine(m: &EngineMove) -> Move {
        match *m {
            EngineMove::Normal {
                from,
                to,
                promotion: Some(p),
                ..
            } => Move::promotion(from, to, p),
            EngineMove::Normal { from, to, .. } => Move::normal(from, to),
            EngineMove::EnPassant { from, to } => Move::en_passant(from, to),
            EngineMove::Castle { king, rook } => Move::castling(king, rook),
            // Put はチェスの通常対局では発生しない
            EngineMove::Put { to, .. } => Move::normal(to, to),
        }
    }

    /// 移動先
    #[inline]
    pub fn to(self) -> Square {
        Square::new(u32::from(self.0 & 0x3F))
    }

    /// 移動元
    #[inline]
    pub fn from(self) -> Square {
        Square::new(u32::from((self.0 >> 6) & 0x3F))
    }

    /// 種別
    #[inline]
    pub fn kind(self) -> MoveKind {
        match self.0 >> 14 {
            0 => MoveKind::Normal,
            1 => MoveKind::Promotion,
            2 => MoveKind::EnPassant,
            _ => MoveKind::Castling,
        }
    }

    /// 成り駒（Promotionのときのみ意味を持つ）
    #[inline]
    pub fn promotion_role(self) -> Role {
        match (self.0 >> 12) & 0x3 {
            0 => Role::Knight,
            1 => Role::Bishop,
            2 => Role::Rook,
            _ => Role::Queen,
        }
    }

    /// 成りかどうか
    #[inline]
    pub fn is_promotion(self) -> bool {
        self.kind() == MoveKind::Promotion
    }

    /// キャスリングかどうか
    #[inline]
    pub fn is_castling(self) -> bool {
        self.kind() == MoveKind::Castling
    }

    /// 有効な指し手か（NONE/NULLでない）
    #[inline]
    pub fn is_some(self) -> bool {
        self != Move::NONE && self != Move::NULL
    }

    /// NONEかどうか
    #[inline]
    pub fn is_none(self) -> bool {
        self == Move::NONE
    }

    /// NULLかどうか
    #[inline]
    pub fn is_null(self) -> bool {
        self == Move::NULL
    }

    /// History用の from×to インデックス（0..4096）
    #[inline]
    pub fn history_index(self) -> usize {
        usize::from(self.0 & 0x0FFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(Move::NONE.is_none());
        assert!(Move::NULL.is_null());
        assert!(!Move::NONE.is_some());
        assert!(!Move::NULL.is_some());
        assert_ne!(Move::NONE, Move::NULL);
    }

    #[test]
    fn test_normal_roundtrip() {
        let m = Move::normal(Square::E2, Square::E4);
        assert_eq!(m.from(), Square::E2);
        assert_eq!(m.to(), Square::E4);
        assert_eq!(m.kind(), MoveKind::Normal);
        assert!(m.is_some());
    }

    #[test]
    fn test_promotion_roundtrip() {
        for role in [Role::Knight, Role::Bishop, Role::Rook, Role::Queen] {
            let m = Move::promotion(Square::E7, Square::E8, role);
            assert_eq!(m.from(), Square::E7);
            assert_eq!(m.to(), Square::E8);
            assert_eq!(m.kind(), MoveKind::Promotion);
            assert_eq!(m.promotion_role(), role);
        }
    }

    #[test]
    fn test_castling_encoding() {
        let m = Move::castling(Square::E1, Square::H1);
        assert_eq!(m.from(), Square::E1);
        assert_eq!(m.to(), Square::H1);
        assert!(m.is_castling());
    }

    #[test]
    fn test_en_passant_encoding() {
        let m = Move::en_passant(Square::E5, Square::D6);
        assert_eq!(m.kind(), MoveKind::EnPassant);
        assert_eq!(m.from(), Square::E5);
        assert_eq!(m.to(), Square::D6);
    }

    #[test]
    fn test_history_index_range() {
        let m = Move::promotion(Square::H7, Square::H8, Role::Queen);
        assert!(m.history_index() < 4096);
    }

    #[test]
    fn test_from_engine_normal() {
        let em = EngineMove::Normal {
            role: Role::Pawn,
            from: Square::E2,
            capture: None,
            to: Square::E4,
            promotion: None,
        };
        let m = Move::from_engine(&em);
        assert_eq!(m, Move::normal(Square::E2, Square::E4));
    }
}
