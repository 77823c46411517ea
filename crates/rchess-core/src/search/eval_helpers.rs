//! 評価・補正ヘルパー関数群
//!
//! 補正履歴、静的評価コンテキスト、置換表プローブ。

use shakmaty::{Color, Position as _};

use crate::position::Position;
use crate::types::{Bound, Depth, Move, Value};

use super::alpha_beta::{
    to_corrected_static_eval, EvalContext, ProbeOutcome, SearchContext, SearchState, TTContext,
};
use super::history::CORRECTION_HISTORY_SIZE;
use super::search_helpers::static_evaluate;
use super::types::{value_from_tt, NodeType};

// =============================================================================
// 補正履歴
// =============================================================================

/// 補正履歴から静的評価の補正値を算出
#[inline]
pub(super) fn correction_value(
    st: &SearchState,
    ctx: &SearchContext<'_>,
    pos: &Position,
    ply: i32,
) -> i32 {
    let us = pos.side_to_move();
    let pawn_idx = (pos.pawn_key() as usize) & (CORRECTION_HISTORY_SIZE - 1);
    let minor_idx = (pos.minor_piece_key() as usize) & (CORRECTION_HISTORY_SIZE - 1);
    let non_pawn_w = (pos.non_pawn_key(Color::White) as usize) & (CORRECTION_HISTORY_SIZE - 1);
    let non_pawn_b = (pos.non_pawn_key(Color::Black) as usize) & (CORRECTION_HISTORY_SIZE - 1);

    let cont_params = continuation_correction_params(st, pos, ply);

    ctx.history.with_read(|h| {
        let pcv = h.correction_history.pawn_value(pawn_idx, us) as i32;
        let micv = h.correction_history.minor_value(minor_idx, us) as i32;
        let wnpcv = h.correction_history.non_pawn_value(non_pawn_w, Color::White, us) as i32;
        let bnpcv = h.correction_history.non_pawn_value(non_pawn_b, Color::Black, us) as i32;
        let cntcv = cont_params
            .map(|(piece, to, pc, prev_to)| {
                h.correction_history.continuation_value(piece, to, pc, prev_to) as i32
            })
            .unwrap_or(0);

        8867 * pcv + 8136 * micv + 10_757 * (wnpcv + bnpcv) + 7232 * cntcv
    })
}

/// 補正履歴の更新
#[inline]
pub(super) fn update_correction_history(
    st: &SearchState,
    ctx: &SearchContext<'_>,
    pos: &Position,
    ply: i32,
    bonus: i32,
) {
    let us = pos.side_to_move();
    let pawn_idx = (pos.pawn_key() as usize) & (CORRECTION_HISTORY_SIZE - 1);
    let minor_idx = (pos.minor_piece_key() as usize) & (CORRECTION_HISTORY_SIZE - 1);
    let non_pawn_w = (pos.non_pawn_key(Color::White) as usize) & (CORRECTION_HISTORY_SIZE - 1);
    let non_pawn_b = (pos.non_pawn_key(Color::Black) as usize) & (CORRECTION_HISTORY_SIZE - 1);

    let cont_params = continuation_correction_params(st, pos, ply);

    const NON_PAWN_WEIGHT: i32 = 165;

    ctx.history.with_write(|h| {
        h.correction_history.update_pawn(pawn_idx, us, bonus);
        h.correction_history.update_minor(minor_idx, us, bonus * 153 / 128);
        h.correction_history
            .update_non_pawn(non_pawn_w, Color::White, us, bonus * NON_PAWN_WEIGHT / 128);
        h.correction_history
            .update_non_pawn(non_pawn_b, Color::Black, us, bonus * NON_PAWN_WEIGHT / 128);
        if let Some((piece, to, pc, prev_to)) = cont_params {
            h.correction_history.update_continuation(piece, to, pc, prev_to, bonus * 153 / 128);
        }
    });
}

/// continuation補正のインデックス（2手前のキー × 直前の指し手）
fn continuation_correction_params(
    st: &SearchState,
    pos: &Position,
    ply: i32,
) -> Option<(usize, shakmaty::Square, usize, shakmaty::Square)> {
    if ply < 2 {
        return None;
    }
    let prev_move = st.stack[(ply - 1) as usize].current_move;
    if !prev_move.is_some() {
        return None;
    }
    st.stack[(ply - 2) as usize].cont_hist_key.map(|prev2| {
        let pc = pos
            .rules()
            .board()
            .piece_at(prev_move.to())
            .map(|p| crate::position::piece_index(p.color, p.role))
            .unwrap_or(0);
        (prev2.piece, prev2.to, pc, prev_move.to())
    })
}

// =============================================================================
// 置換表プローブ
// =============================================================================

/// 置換表プローブ（即時カットオフ判定込み）
#[allow(clippy::too_many_arguments)]
pub(super) fn probe_transposition<const NT: u8>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    beta: Value,
    ply: i32,
    pv_node: bool,
    excluded_move: Move,
) -> ProbeOutcome {
    let key = pos.key();
    let tt_result = ctx.tt.probe(key, pos);
    let tt_hit = tt_result.found;
    let tt_data = tt_result.data;

    st.stack[ply as usize].tt_hit = tt_hit;
    // excludedMoveがある場合は前回のttPvを維持する
    st.stack[ply as usize].tt_pv = if excluded_move.is_some() {
        st.stack[ply as usize].tt_pv
    } else {
        pv_node || (tt_hit && tt_data.is_pv)
    };

    let tt_move = if tt_hit { tt_data.mv } else { Move::NONE };
    let tt_value = if tt_hit {
        value_from_tt(tt_data.value, ply, pos.rule50_count())
    } else {
        Value::NONE
    };
    let tt_capture = tt_move.is_some() && pos.is_capture(tt_move);

    // 非PVのTTカットオフ。50手カウンタが進みすぎた局面では信じない。
    if !pv_node
        && NT != NodeType::Root as u8
        && excluded_move.is_none()
        && tt_hit
        && tt_data.depth > depth - ((tt_value <= beta) as Depth)
        && tt_value != Value::NONE
        && tt_data.bound.can_cutoff(tt_value, beta)
        && pos.rule50_count() < 90
    {
        return ProbeOutcome::Cutoff(tt_value);
    }

    ProbeOutcome::Continue(TTContext {
        key,
        result: tt_result,
        data: tt_data,
        hit: tt_hit,
        mv: tt_move,
        value: tt_value,
        capture: tt_capture,
    })
}

// =============================================================================
// 静的評価コンテキスト
// =============================================================================

/// 静的評価と補正値の計算
pub(super) fn compute_eval_context(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    ply: i32,
    in_check: bool,
    tt_ctx: &TTContext,
    excluded_move: Move,
) -> EvalContext {
    let corr_value = correction_value(st, ctx, pos, ply);

    // excludedMoveがある場合は前回のstatic_evalをそのまま使う
    if excluded_move.is_some() {
        let static_eval = st.stack[ply as usize].static_eval;
        return EvalContext {
            static_eval,
            unadjusted_static_eval: static_eval,
            correction_value: corr_value,
            improving: improving(st, ply, in_check, static_eval),
            opponent_worsening: opponent_worsening(st, ply, static_eval),
        };
    }

    let mut unadjusted = Value::NONE;
    let mut static_eval = if in_check {
        Value::NONE
    } else if tt_ctx.hit && tt_ctx.data.eval != Value::NONE {
        unadjusted = tt_ctx.data.eval;
        unadjusted
    } else {
        unadjusted = static_evaluate(st, ctx, pos);
        unadjusted
    };

    if !in_check && unadjusted != Value::NONE {
        static_eval = to_corrected_static_eval(unadjusted, corr_value);
    }

    // TTの値が片側境界で静的評価より確からしいなら置き換える
    if !in_check
        && tt_ctx.hit
        && tt_ctx.value != Value::NONE
        && !tt_ctx.value.is_decisive()
        && ((tt_ctx.value > static_eval && tt_ctx.data.bound == Bound::Lower)
            || (tt_ctx.value < static_eval && tt_ctx.data.bound == Bound::Upper))
    {
        static_eval = tt_ctx.value;
    }

    st.stack[ply as usize].static_eval = static_eval;

    EvalContext {
        static_eval,
        unadjusted_static_eval: unadjusted,
        correction_value: corr_value,
        improving: improving(st, ply, in_check, static_eval),
        opponent_worsening: opponent_worsening(st, ply, static_eval),
    }
}

fn improving(st: &SearchState, ply: i32, in_check: bool, static_eval: Value) -> bool {
    ply >= 2
        && !in_check
        && static_eval != Value::NONE
        && st.stack[(ply - 2) as usize].static_eval != Value::NONE
        && static_eval > st.stack[(ply - 2) as usize].static_eval
}

fn opponent_worsening(st: &SearchState, ply: i32, static_eval: Value) -> bool {
    if ply < 1 || static_eval == Value::NONE {
        return false;
    }
    let prev = st.stack[(ply - 1) as usize].static_eval;
    prev != Value::NONE && static_eval > -prev
}
