//! プレイスタイルの評価ボーナス
//!
//! Styleオプションに応じた固定ボーナスを手番側の視点で計算する。
//! ボーナスの適用はここ1箇所のみ（評価器本体で重ねて足さない）。

use shakmaty::{attacks, Color, Position as RulesPosition, Role, Square};

use crate::position::Position;

/// プレイスタイル
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Style {
    #[default]
    Default,
    Aggressive,
    Defensive,
    Positional,
}

impl std::str::FromStr for Style {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Default" => Ok(Style::Default),
            "Aggressive" => Ok(Style::Aggressive),
            "Defensive" => Ok(Style::Defensive),
            "Positional" => Ok(Style::Positional),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Style::Default => "Default",
            Style::Aggressive => "Aggressive",
            Style::Defensive => "Defensive",
            Style::Positional => "Positional",
        };
        f.write_str(s)
    }
}

/// スタイルボーナス（手番側視点）
pub fn style_bonus(pos: &Position, style: Style) -> i32 {
    match style {
        Style::Default => default_bonus(pos),
        Style::Aggressive => aggressiveness_bonus(pos),
        Style::Defensive => defensiveness_bonus(pos),
        Style::Positional => positional_bonus(pos),
    }
}

/// 敵キング近傍のナイト +20、5段目以上の歩 +10
fn aggressiveness_bonus(pos: &Position) -> i32 {
    let board = pos.rules().board();
    let us = pos.side_to_move();
    let mut bonus = 0;

    if let Some(enemy_king) = board.king_of(!us) {
        let near_king = attacks::king_attacks(enemy_king) | shakmaty::Bitboard::from(enemy_king);
        let knights = board.by_color(us) & board.by_role(Role::Knight);
        for sq in knights {
            if !(attacks::knight_attacks(sq) & near_king).is_empty() {
                bonus += 20;
            }
        }
    }

    let pawns = board.by_color(us) & board.by_role(Role::Pawn);
    for sq in pawns {
        if relative_rank(us, sq) >= 4 {
            bonus += 10;
        }
    }
    bonus
}

/// キャスリング可能 +40、孤立歩 −15、攻撃性のぶんを差し引く
fn defensiveness_bonus(pos: &Position) -> i32 {
    let board = pos.rules().board();
    let us = pos.side_to_move();
    let mut bonus = 0;

    if pos.has_castling_rights(us) {
        bonus += 40;
    }

    let pawns = board.by_color(us) & board.by_role(Role::Pawn);
    for sq in pawns {
        let file = sq.file() as i32;
        let mut isolated = true;
        for other in pawns {
            if other != sq && ((other.file() as i32) - file).abs() == 1 {
                isolated = false;
                break;
            }
        }
        if isolated {
            bonus -= 15;
        }
    }

    bonus - aggressiveness_bonus(pos)
}

/// ビショップ +10、7段目のルーク +15
fn positional_bonus(pos: &Position) -> i32 {
    let board = pos.rules().board();
    let us = pos.side_to_move();
    let mut bonus = 0;

    bonus += 10 * (board.by_color(us) & board.by_role(Role::Bishop)).count() as i32;

    let rooks = board.by_color(us) & board.by_role(Role::Rook);
    for sq in rooks {
        if relative_rank(us, sq) == 6 {
            bonus += 15;
        }
    }
    bonus
}

/// 展開済みマイナー +10、中央のD/E歩 +5
fn default_bonus(pos: &Position) -> i32 {
    let board = pos.rules().board();
    let us = pos.side_to_move();
    let mut bonus = 0;

    let minors =
        board.by_color(us) & (board.by_role(Role::Knight) | board.by_role(Role::Bishop));
    for sq in minors {
        if relative_rank(us, sq) > 0 {
            bonus += 10;
        }
    }

    let pawns = board.by_color(us) & board.by_role(Role::Pawn);
    for sq in [Square::D4, Square::D5, Square::E4, Square::E5] {
        if pawns.contains(sq) {
            bonus += 5;
        }
    }
    bonus
}

#[inline]
fn relative_rank(color: Color, sq: Square) -> i32 {
    match color {
        Color::White => sq.rank() as i32,
        Color::Black => 7 - sq.rank() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parse() {
        assert_eq!("Aggressive".parse::<Style>().unwrap(), Style::Aggressive);
        assert!("Berserk".parse::<Style>().is_err());
    }

    #[test]
    fn test_default_bonus_rewards_development() {
        let undeveloped = Position::startpos();
        let developed = Position::from_fen(
            "rnbqkbnr/pppppppp/8/8/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 1",
            false,
        )
        .unwrap();
        assert!(style_bonus(&developed, Style::Default) > style_bonus(&undeveloped, Style::Default));
    }

    #[test]
    fn test_defensive_bonus_counts_castling() {
        let with_rights = Position::startpos();
        let without = Position::from_fen(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w kq - 0 1",
            false,
        )
        .unwrap();
        assert!(
            style_bonus(&with_rights, Style::Defensive) > style_bonus(&without, Style::Defensive)
        );
    }

    #[test]
    fn test_positional_bonus_rook_seventh() {
        let on_seventh = Position::from_fen("4k3/R7/8/8/8/8/8/4K3 w - - 0 1", false).unwrap();
        let on_first = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", false).unwrap();
        assert!(
            style_bonus(&on_seventh, Style::Positional) > style_bonus(&on_first, Style::Positional)
        );
    }
}
