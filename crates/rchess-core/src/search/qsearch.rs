//! 静止探索 (Quiescence Search)
//!
//! 捕獲・女王成り・（深さ0では）王手だけを読み、局面が静かになるまで
//! 探索を続ける。王手がかかっている間は全回避手を読むが、quietな
//! 回避は2手までに制限する。

use crate::position::Position;
use crate::types::{
    Bound, Depth, Move, Value, DEPTH_QS, DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS, DEPTH_UNSEARCHED,
    MAX_PLY,
};

use super::alpha_beta::{to_corrected_static_eval, SearchContext, SearchState};
use super::eval_helpers::correction_value;
use super::movepicker::MovePicker;
use super::search_helpers::{
    check_abort, cont_history_ref, cont_history_tables, set_cont_history_for_move, static_evaluate,
};
use super::types::{value_draw, value_from_tt, value_to_tt, LimitsType, NodeType};
use crate::position::piece_value;

/// 静止探索
#[allow(clippy::too_many_arguments)]
pub(super) fn qsearch<const NT: u8>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    depth: Depth,
    alpha: Value,
    beta: Value,
    ply: i32,
    limits: &LimitsType,
) -> Value {
    let pv_node = NT == NodeType::PV as u8;
    let in_check = pos.in_check();
    let mut alpha = alpha;

    debug_assert!(alpha < beta);

    if pv_node {
        st.stack[ply as usize].pv.clear();
        if (ply + 1) < st.stack.len() as i32 {
            st.stack[(ply + 1) as usize].pv.clear();
        }
    }

    if ply >= MAX_PLY {
        return if in_check {
            Value::ZERO
        } else {
            static_evaluate(st, ctx, pos)
        };
    }

    if pv_node && st.sel_depth < ply + 1 {
        st.sel_depth = ply + 1;
    }

    if check_abort(st, ctx, limits) {
        return Value::ZERO;
    }

    if pos.is_draw(ply) {
        return value_draw(st.nodes);
    }

    // 置換表プローブ
    let key = pos.key();
    let tt_result = ctx.tt.probe(key, pos);
    let tt_hit = tt_result.found;
    let tt_data = tt_result.data;
    let pv_hit = tt_hit && tt_data.is_pv;
    st.stack[ply as usize].tt_hit = tt_hit;

    let mut tt_move = if tt_hit { tt_data.mv } else { Move::NONE };
    let tt_value = if tt_hit {
        value_from_tt(tt_data.value, ply, pos.rule50_count())
    } else {
        Value::NONE
    };

    if !pv_node
        && tt_hit
        && tt_data.depth >= DEPTH_QS_NO_CHECKS
        && tt_value != Value::NONE
        && tt_data.bound.can_cutoff(tt_value, beta)
    {
        return tt_value;
    }

    // 静的評価（stand pat）
    let corr_value = correction_value(st, ctx, pos, ply);
    let mut unadjusted = Value::NONE;
    let static_eval = if in_check {
        Value::NONE
    } else {
        unadjusted = if tt_hit && tt_data.eval != Value::NONE {
            tt_data.eval
        } else {
            static_evaluate(st, ctx, pos)
        };
        to_corrected_static_eval(unadjusted, corr_value)
    };
    st.stack[ply as usize].static_eval = static_eval;

    let mut best_value = if in_check {
        Value::mated_in(ply)
    } else {
        static_eval
    };
    let mut best_move = Move::NONE;

    // TT値が境界的に確からしければstand patを置き換える
    if !in_check && tt_hit && tt_value != Value::NONE && !tt_value.is_decisive() {
        let bound_matches = if tt_value > best_value {
            tt_data.bound.is_lower_or_exact()
        } else {
            tt_data.bound.is_upper_or_exact()
        };
        if bound_matches {
            best_value = tt_value;
        }
    }

    // stand patによるカットオフ
    if !in_check && best_value >= beta {
        let mut v = best_value;
        if !v.is_decisive() {
            v = Value::new((v.raw() + beta.raw()) / 2);
        }
        if !tt_hit {
            tt_result.write(
                key,
                value_to_tt(v, ply),
                false,
                Bound::Lower,
                DEPTH_UNSEARCHED,
                Move::NONE,
                unadjusted,
                ctx.tt.generation(),
            );
        }
        return v;
    }

    if !in_check && best_value > alpha {
        alpha = best_value;
    }

    let futility_base = if in_check {
        Value::NONE
    } else {
        static_eval + Value::new(ctx.params.qsearch_futility_base)
    };

    // 静止探索の捕獲ステージに合わないTT手は外す
    if tt_move.is_some()
        && !in_check
        && !pos.capture_stage(tt_move)
        && !pos.gives_check(tt_move)
    {
        tt_move = Move::NONE;
    }

    let prev_move = if ply >= 1 {
        st.stack[(ply - 1) as usize].current_move
    } else {
        Move::NONE
    };

    let mut mp = if in_check {
        let tables = cont_history_tables(st, ctx, ply);
        MovePicker::new_evasions(pos, tt_move, ply, tables)
    } else {
        let tables = cont_history_tables(st, ctx, ply);
        MovePicker::new(pos, tt_move, DEPTH_QS, ply, [Move::NONE; 2], Move::NONE, tables)
    };

    // 深さ0ではquietの王手も読む
    let mut extra_checks: Vec<Move> = Vec::new();
    if !in_check && depth >= DEPTH_QS_CHECKS {
        for em in pos.legal_moves() {
            let m = Move::from_engine(&em);
            if !pos.capture_stage(m) && m != tt_move && pos.gives_check(m) {
                extra_checks.push(m);
            }
        }
    }

    let mut move_count = 0;
    let mut quiet_evasions = 0;
    let mut checks_idx = 0;

    loop {
        let mv = {
            let m = ctx.history.with_read(|h| mp.next_move(pos, h));
            if m != Move::NONE {
                m
            } else if checks_idx < extra_checks.len() {
                checks_idx += 1;
                extra_checks[checks_idx - 1]
            } else {
                break;
            }
        };

        let gives_check = pos.gives_check(mv);
        let capture = pos.capture_stage(mv);

        move_count += 1;

        if !best_value.is_loss() {
            // futilityと枝刈り（王手はかけ逃さない）
            if !gives_check
                && (!prev_move.is_some() || mv.to() != prev_move.to())
                && futility_base != Value::NONE
                && !mv.is_promotion()
            {
                if move_count > 2 {
                    continue;
                }

                let futility_value =
                    futility_base + Value::new(pos.captured_role(mv).map_or(0, piece_value));

                if futility_value <= alpha {
                    best_value = best_value.max(futility_value);
                    continue;
                }

                if !pos.see_ge(mv, alpha - futility_base) {
                    best_value = best_value.min(alpha.min(futility_base));
                    continue;
                }
            }

            // 直近2plyのContinuationHistoryが両方負のquietは読まない
            if !capture {
                let pc = pos.moved_piece_index(mv);
                let cont0 = cont_history_ref(st, ctx, ply, 1).get(pc, mv.to()) as i32;
                let cont1 = cont_history_ref(st, ctx, ply, 2).get(pc, mv.to()) as i32;
                if cont0 < 0 && cont1 < 0 {
                    continue;
                }
            }

            // SEEの下限
            if !pos.see_ge(mv, Value::new(ctx.params.qsearch_see_margin)) {
                continue;
            }
        }

        // 王手回避のquietは2手まで
        if in_check && !capture {
            quiet_evasions += 1;
            if quiet_evasions > 2 {
                break;
            }
        }

        let cont_pc = pos.moved_piece_index(mv);
        let cont_to = mv.to();

        st.stack[ply as usize].current_move = mv;
        pos.do_move_with_prefetch(mv, ctx.tt);
        st.nodes += 1;
        set_cont_history_for_move(st, ctx, ply, in_check, capture, cont_pc, cont_to);

        let value = -qsearch::<NT>(st, ctx, pos, depth - 1, -beta, -alpha, ply + 1, limits);

        pos.undo_move(mv);

        if st.abort {
            return Value::ZERO;
        }

        if value > best_value {
            best_value = value;
            best_move = mv;

            if value > alpha {
                if pv_node {
                    let child_pv = st.stack[(ply + 1) as usize].pv.clone();
                    st.stack[ply as usize].update_pv(mv, &child_pv);
                }
                if value >= beta {
                    break;
                }
                alpha = value;
            }
        }
    }

    // 王手で合法手がなければ詰み
    if in_check && move_count == 0 {
        debug_assert!(pos.no_legal_moves());
        return Value::mated_in(ply);
    }

    if !best_value.is_decisive() && best_value > beta {
        best_value = Value::new((best_value.raw() + beta.raw()) / 2);
    }

    // 静止探索の結果はExactとしては保存しない
    let bound = if best_value >= beta {
        Bound::Lower
    } else {
        Bound::Upper
    };
    let stored_depth = if in_check || depth >= DEPTH_QS_CHECKS {
        DEPTH_QS_CHECKS
    } else {
        DEPTH_QS_NO_CHECKS
    };

    tt_result.write(
        key,
        value_to_tt(best_value, ply),
        pv_hit,
        bound,
        stored_depth,
        best_move,
        unadjusted,
        ctx.tt.generation(),
    );

    best_value
}
