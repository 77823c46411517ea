//! 評価モジュール
//!
//! 学習済みネットワークの2成分出力をマテリアル・スタイル・フェーズと
//! 合成する評価ラッパー。
//!
//! 合成の手順:
//! 1. small-netゲート（単純マテリアル評価が大差ならsmall、際どければbigで再評価）
//! 2. 混合重み（materialWeight/positionalWeight + 手動オフセット）
//! 3. フェーズブレンド（Dynamic Strategy有効時）
//! 4. スタイルボーナス（`style.rs` で一度だけ）
//! 5. 複雑度による減衰とoptimismの増幅
//! 6. マテリアルブレンド
//! 7. 50手ルールの進行に応じた減衰
//! 8. 非決定領域へのクランプ

pub mod eval_hash;
mod network;
mod style;

pub use eval_hash::EvalHash;
pub use network::{NetworkOutput, Networks};
pub use style::{style_bonus, Style};

use shakmaty::{Color, Role};

use crate::position::{piece_value, Position};
use crate::types::Value;

/// 評価の挙動を決めるオプション
#[derive(Clone, Copy, Debug)]
pub struct EvalOptions {
    pub style: Style,
    pub dynamic_strategy: bool,
    /// 混合重みへの手動オフセット（-12..=12）
    pub materialistic: i32,
    pub positional: i32,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            style: Style::Default,
            dynamic_strategy: false,
            materialistic: 0,
            positional: 0,
        }
    }
}

/// 混合重みの既定値
const MATERIAL_WEIGHT: i32 = 125;
const POSITIONAL_WEIGHT: i32 = 131;

/// small-netゲートの閾値
const SMALL_NET_THRESHOLD: i32 = 962;
const SMALL_NET_INDECISIVE: i32 = 236;

/// 単純マテリアル評価（手番側視点）
///
/// small-netゲートの判定に使う。PawnValueで割ればおおよその歩数差になる。
pub fn simple_eval(pos: &Position) -> i32 {
    let us = pos.side_to_move();
    piece_value(Role::Pawn) * (pos.count(us, Role::Pawn) - pos.count(!us, Role::Pawn))
        + pos.non_pawn_material(us)
        - pos.non_pawn_material(!us)
}

/// 局面の静的評価（手番側視点）
///
/// Positionに対して純粋（変更しない）。optimismはワーカーが保持する
/// ルートスコア由来の楽観値。返り値は必ず非決定領域に収まる。
pub fn evaluate(pos: &Position, networks: &Networks, opts: &EvalOptions, optimism: i32) -> Value {
    debug_assert!(!pos.in_check());

    let simple = simple_eval(pos);
    let small_net = simple.abs() > SMALL_NET_THRESHOLD;

    let mut out = networks.evaluate(pos, small_net);
    let mut nnue = mix(&out, pos, opts);

    // smallの判定が際どければbigで取り直す
    if small_net && nnue.abs() < SMALL_NET_INDECISIVE {
        out = networks.evaluate(pos, false);
        nnue = mix(&out, pos, opts);
    }

    // スタイルボーナスはここで一度だけ加える
    nnue += style_bonus(pos, opts.style);

    // 複雑度: 2成分の乖離が大きいほど読みが必要な局面
    let complexity = (out.psqt - out.positional).abs();
    let mut optimism = optimism;
    optimism += optimism * complexity / 468;
    nnue -= nnue * complexity / 18000;

    let material = 535 * (pos.count(Color::White, Role::Pawn) + pos.count(Color::Black, Role::Pawn))
        + pos.non_pawn_material_total();
    let mut v = (nnue * (77777 + material) + optimism * (7777 + material)) / 77777;

    // 50手ルールが進むほど引き分けに寄せる
    v -= v * pos.rule50_count() / 212;

    Value::new(v).clamp_eval()
}

/// 2成分の混合（重みオフセット・フェーズブレンド込み）
fn mix(out: &NetworkOutput, pos: &Position, opts: &EvalOptions) -> i32 {
    let mut mw = MATERIAL_WEIGHT + opts.materialistic;
    let mut pw = POSITIONAL_WEIGHT + opts.positional;

    if opts.dynamic_strategy {
        // phase: 0 = 序盤、24 = 駒が捌けた終盤
        let minors = pos.count(Color::White, Role::Knight)
            + pos.count(Color::Black, Role::Knight)
            + pos.count(Color::White, Role::Bishop)
            + pos.count(Color::Black, Role::Bishop);
        let rooks = pos.count(Color::White, Role::Rook) + pos.count(Color::Black, Role::Rook);
        let queens = pos.count(Color::White, Role::Queen) + pos.count(Color::Black, Role::Queen);
        let phase = (24 - minors - 2 * rooks - 4 * queens).clamp(0, 24);

        // フェーズが低いほどマテリアルから位置評価へ重みを移す
        let shift = (24 - phase) / 2;
        mw -= shift;
        pw += shift;
    }

    (mw * out.psqt + pw * out.positional) / 128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_stays_in_bounds() {
        let networks = Networks::new();
        let opts = EvalOptions::default();
        for fen in [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "3qk3/8/8/8/8/8/8/Q2QK3 w - - 0 1",
            "4k3/8/8/8/8/8/8/QQQQK3 w - - 0 1",
        ] {
            let pos = Position::from_fen(fen, false).unwrap();
            let v = evaluate(&pos, &networks, &opts, 0);
            assert!(!v.is_decisive(), "eval out of bounds for {fen}: {:?}", v);
        }
    }

    #[test]
    fn test_material_up_is_positive() {
        let networks = Networks::new();
        let opts = EvalOptions::default();
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", false).unwrap();
        assert!(evaluate(&pos, &networks, &opts, 0) > Value::new(300));
    }

    #[test]
    fn test_small_net_gate_on_large_material_diff() {
        // クイーン2枚差ならsmall-netゲートが開く
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/QQ2K3 w - - 0 1", false).unwrap();
        assert!(simple_eval(&pos).abs() > SMALL_NET_THRESHOLD);
    }

    #[test]
    fn test_rule50_damps_towards_draw() {
        let networks = Networks::new();
        let opts = EvalOptions::default();
        let fresh = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", false).unwrap();
        let stale = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 80 1", false).unwrap();
        let v_fresh = evaluate(&fresh, &networks, &opts, 0);
        let v_stale = evaluate(&stale, &networks, &opts, 0);
        assert!(v_stale < v_fresh);
    }

    #[test]
    fn test_startpos_near_zero() {
        let networks = Networks::new();
        let opts = EvalOptions::default();
        let pos = Position::startpos();
        let v = evaluate(&pos, &networks, &opts, 0);
        assert!(v.raw().abs() < 150, "startpos eval too large: {:?}", v);
    }
}
