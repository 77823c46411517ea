//! 枝刈りヘルパー群
//!
//! - Razoring
//! - Futility Pruning
//! - Null Move Pruning
//! - ProbCut / 王手ProbCut
//! - 指し手ループ内の浅い枝刈り（LMP, SEE, ContinuationHistory, Futility）

use crate::position::Position;
use crate::types::{Bound, Depth, Move, Value, DEPTH_QS};

use super::alpha_beta::{
    FutilityParams, SearchContext, SearchState, Step14Context, Step14Outcome, TTContext,
};
use super::movepicker::MovePicker;
use super::qsearch::qsearch;
use super::search_helpers::{
    clear_cont_history_for_null, set_cont_history_for_move,
};
use super::types::{value_to_tt, LimitsType, NodeType};

/// search_node を受け取るコールバック型
pub(super) type SearchFn = fn(
    &mut SearchState,
    &SearchContext<'_>,
    &mut Position,
    Depth,
    Value,
    Value,
    i32,
    bool,
    &LimitsType,
) -> Value;

// =============================================================================
// Razoring
// =============================================================================

/// Razoring
///
/// 静的評価がalphaを大きく割っているなら、静止探索で確認して
/// そのまま返す。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_razoring(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    alpha: Value,
    beta: Value,
    ply: i32,
    pv_node: bool,
    in_check: bool,
    static_eval: Value,
    limits: &LimitsType,
) -> Option<Value> {
    if pv_node || in_check || static_eval == Value::NONE {
        return None;
    }
    let threshold = alpha
        - Value::new(ctx.params.razoring_base)
        - Value::new(ctx.params.razoring_depth_mult * depth * depth);
    if static_eval < threshold {
        let value = qsearch::<{ NodeType::NonPV as u8 }>(
            st, ctx, pos, DEPTH_QS, alpha - Value::new(1), alpha, ply, limits,
        );
        if value < alpha && !value.is_decisive() {
            return Some(value);
        }
    }
    None
}

// =============================================================================
// Futility Pruning
// =============================================================================

/// 子ノードのfutility pruning
///
/// 静的評価がbetaをマージン以上超えているなら、探索せず混合値を返す。
#[inline]
pub(super) fn try_futility_pruning(ctx: &SearchContext<'_>, p: FutilityParams) -> Option<Value> {
    if p.tt_pv
        || p.in_check
        || p.depth >= ctx.params.futility_max_depth
        || p.static_eval == Value::NONE
        || p.static_eval.is_decisive()
        || p.beta.is_decisive()
    {
        return None;
    }

    let mult = ctx.params.futility_mult - 21 * (!p.tt_hit) as i32;
    let margin = Value::new(
        mult * p.depth - (p.improving as i32) * mult * 2094 / 1024
            - (p.opponent_worsening as i32) * mult * 1324 / 4096
            + p.correction_value.abs() / 158_105,
    );

    if p.static_eval - margin >= p.beta {
        return Some(Value::new((2 * p.beta.raw() + p.static_eval.raw()) / 3));
    }
    None
}

// =============================================================================
// Null Move Pruning
// =============================================================================

/// Null move pruning
///
/// 手番を渡しても評価がbetaを超えるなら枝刈り。深い局面では
/// verification searchで裏取りをする。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_null_move_pruning(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    beta: Value,
    ply: i32,
    pv_node: bool,
    in_check: bool,
    static_eval: Value,
    excluded_move: Move,
    limits: &LimitsType,
    search_node: SearchFn,
) -> Option<Value> {
    if ply < 1 {
        return None;
    }
    let prev_move = st.stack[(ply - 1) as usize].current_move;
    let us = pos.side_to_move();

    if pv_node
        || in_check
        || excluded_move.is_some()
        || static_eval == Value::NONE
        || static_eval < beta
        || ply < st.nmp_min_ply
        || beta.is_decisive()
        || prev_move.is_null()
        || pos.non_pawn_material(us) == 0
    {
        return None;
    }

    let p = ctx.params;
    let r = depth / p.nmp_depth_div
        + ((static_eval - beta).raw() / p.nmp_eval_div).min(p.nmp_eval_max)
        + p.nmp_base_reduction;

    st.stack[ply as usize].current_move = Move::NULL;
    clear_cont_history_for_null(st, ctx, ply);

    pos.do_null_move_with_prefetch(ctx.tt);
    st.nodes += 1;
    let null_value = -search_node(
        st,
        ctx,
        pos,
        depth - r,
        -beta,
        -beta + Value::new(1),
        ply + 1,
        false,
        limits,
    );
    pos.undo_null_move();

    if st.abort {
        return Some(Value::ZERO);
    }

    if null_value >= beta && !null_value.is_win() {
        if st.nmp_min_ply != 0 || depth < p.nmp_verification_depth {
            return Some(null_value);
        }

        // Verification search: このplyから暫く再帰的nullを禁止して検証
        st.nmp_min_ply = ply + 3 * (depth - r) / 4;
        let v = search_node(
            st,
            ctx,
            pos,
            depth - r,
            beta - Value::new(1),
            beta,
            ply,
            false,
            limits,
        );
        st.nmp_min_ply = 0;

        if v >= beta {
            return Some(null_value);
        }
    }

    None
}

// =============================================================================
// ProbCut
// =============================================================================

/// ProbCut
///
/// betaを大きく超えそうな捕獲を浅い探索で検証して早期カット。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_probcut(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    beta: Value,
    improving: bool,
    tt_ctx: &TTContext,
    ply: i32,
    static_eval: Value,
    unadjusted_static_eval: Value,
    in_check: bool,
    pv_node: bool,
    limits: &LimitsType,
    search_node: SearchFn,
) -> Option<Value> {
    let p = ctx.params;
    if pv_node || in_check || depth <= 3 || static_eval == Value::NONE || beta.is_decisive() {
        return None;
    }

    let prob_cut_beta = beta + Value::new(p.probcut_beta_base - p.probcut_improving_sub * improving as i32);

    // TTが「この閾値には届かない」と言っているなら試さない
    if tt_ctx.hit
        && tt_ctx.value != Value::NONE
        && tt_ctx.data.depth >= depth - 3
        && tt_ctx.value < prob_cut_beta
        && !tt_ctx.value.is_decisive()
    {
        return None;
    }

    let threshold = prob_cut_beta - static_eval;
    let probcut_depth = (depth - p.probcut_depth_sub).max(0);

    let mut mp = MovePicker::new_probcut(pos, tt_ctx.mv, threshold, ply);
    loop {
        let mv = ctx.history.with_read(|h| mp.next_move(pos, h));
        if mv == Move::NONE {
            break;
        }
        if mv == st.stack[ply as usize].excluded_move {
            continue;
        }

        let is_capture = pos.capture_stage(mv);
        let cont_pc = pos.moved_piece_index(mv);
        let cont_to = mv.to();

        st.stack[ply as usize].current_move = mv;
        pos.do_move_with_prefetch(mv, ctx.tt);
        st.nodes += 1;
        set_cont_history_for_move(st, ctx, ply, in_check, is_capture, cont_pc, cont_to);

        let mut value = -qsearch::<{ NodeType::NonPV as u8 }>(
            st,
            ctx,
            pos,
            DEPTH_QS,
            -prob_cut_beta,
            -prob_cut_beta + Value::new(1),
            ply + 1,
            limits,
        );

        if value >= prob_cut_beta && probcut_depth > 0 {
            value = -search_node(
                st,
                ctx,
                pos,
                probcut_depth,
                -prob_cut_beta,
                -prob_cut_beta + Value::new(1),
                ply + 1,
                true,
                limits,
            );
        }
        pos.undo_move(mv);

        if st.abort {
            return Some(Value::ZERO);
        }

        if value >= prob_cut_beta {
            let stored_depth = (probcut_depth + 1).max(1);
            tt_ctx.result.write(
                tt_ctx.key,
                value_to_tt(value, ply),
                st.stack[ply as usize].tt_pv,
                Bound::Lower,
                stored_depth,
                mv,
                unadjusted_static_eval,
                ctx.tt.generation(),
            );

            if !value.is_decisive() {
                return Some(value - (prob_cut_beta - beta));
            }
            return Some(value);
        }
    }

    None
}

// =============================================================================
// 王手ProbCut（TTベース）
// =============================================================================

/// 王手局面のTTベースProbCut
///
/// TTの捕獲手がLOWERバウンドで十分深く、値が `beta + margin` を
/// 超えているなら、探索せずその閾値を返す。
#[inline]
pub(super) fn try_small_probcut(
    ctx: &SearchContext<'_>,
    depth: Depth,
    beta: Value,
    in_check: bool,
    tt_ctx: &TTContext,
) -> Option<Value> {
    if !in_check {
        return None;
    }
    let prob_cut_beta = beta + Value::new(ctx.params.small_probcut_margin);
    if tt_ctx.hit
        && tt_ctx.capture
        && tt_ctx.data.bound.is_lower_or_exact()
        && tt_ctx.data.depth >= depth - 4
        && tt_ctx.value != Value::NONE
        && tt_ctx.value >= prob_cut_beta
        && !tt_ctx.value.is_decisive()
        && !beta.is_decisive()
    {
        return Some(prob_cut_beta);
    }
    None
}

// =============================================================================
// 指し手ループ内の浅い枝刈り
// =============================================================================

/// 指し手ループ内の枝刈り判定
#[inline]
pub(super) fn step14_pruning(ctx: &SearchContext<'_>, s: Step14Context<'_>) -> Step14Outcome {
    let p = ctx.params;
    let lmr_depth = s.lmr_depth;

    if s.ply == 0 || s.best_value.is_loss() {
        return Step14Outcome::Continue;
    }

    // Move count pruning（LMP）: 残りのquiet手をスキップ
    let lmp_limit = (3 + s.depth * s.depth) / (2 - s.improving as i32);
    if s.move_count >= lmp_limit && !s.is_capture && !s.gives_check {
        return Step14Outcome::SkipQuiets;
    }

    if s.is_capture || s.gives_check {
        let captured = s.pos.captured_role(s.mv);
        let capt_hist = ctx.history.with_read(|h| {
            h.capture_history.get(s.pos.moved_piece_index(s.mv), s.mv.to(), captured) as i32
        });

        // 捕獲のfutility
        if !s.gives_check && lmr_depth < 7 && !s.in_check && s.static_eval != Value::NONE {
            let futility_value = s.static_eval
                + Value::new(
                    285 + 277 * lmr_depth
                        + crate::position::piece_value(captured.unwrap_or(shakmaty::Role::King))
                        + capt_hist / 7,
                );
            if futility_value <= s.alpha {
                return Step14Outcome::Skip { best_value: None };
            }
        }

        // SEEによる捕獲の枝刈り
        let margin = (158 * s.depth + capt_hist / 31).clamp(0, 283 * s.depth);
        if !s.pos.see_ge(s.mv, Value::new(-margin)) {
            return Step14Outcome::Skip { best_value: None };
        }
    } else {
        let pc = s.pos.moved_piece_index(s.mv);
        let to = s.mv.to();
        let cont0 = s.cont_history_1.get(pc, to) as i32;
        let cont1 = s.cont_history_2.get(pc, to) as i32;
        let main = ctx.history.with_read(|h| h.main_history.get(s.mover, s.mv) as i32);
        let pawn = ctx
            .history
            .with_read(|h| h.pawn_history.get(s.pawn_history_index, pc, to) as i32);
        let hist_score = 2 * main + cont0 + cont1 + pawn;

        // ContinuationHistoryによる枝刈り
        if lmr_depth < 12 && hist_score < p.cont_hist_prune_mult * s.depth {
            return Step14Outcome::Skip { best_value: None };
        }

        // quietのfutility
        if !s.in_check
            && lmr_depth < 12
            && s.static_eval != Value::NONE
            && s.static_eval + Value::new(77 + 116 * lmr_depth.max(0)) <= s.alpha
        {
            let fut = s.static_eval + Value::new(77 + 116 * lmr_depth.max(0));
            return Step14Outcome::Skip {
                best_value: Some(s.best_value.max(fut)),
            };
        }

        // SEEによるquietの枝刈り
        if !s.in_check
            && lmr_depth <= 4
            && !s.pos.see_ge(s.mv, Value::new(p.see_quiet_mult * lmr_depth.max(0)))
        {
            return Step14Outcome::Skip { best_value: None };
        }
    }

    Step14Outcome::Continue
}
