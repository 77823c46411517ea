//! 探索ヘルパー関数群
//!
//! 静的評価の呼び出し、ContinuationHistoryの配線、中断チェック。

use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use shakmaty::Square;

use crate::eval;
use crate::position::Position;
use crate::types::Value;

use super::alpha_beta::{SearchContext, SearchState};
use super::history::PieceToHistory;
use super::types::{ContHistKey, LimitsType, STACK_SIZE};

// =============================================================================
// 中断チェック
// =============================================================================

/// 中断チェック
///
/// 512回に1回だけ実際のチェックを行う。メインスレッドのみ時間を見る。
#[inline]
pub(super) fn check_abort(st: &mut SearchState, ctx: &SearchContext<'_>, limits: &LimitsType) -> bool {
    if st.abort {
        return true;
    }

    st.calls_cnt -= 1;
    if st.calls_cnt > 0 {
        return false;
    }
    st.calls_cnt = if limits.nodes > 0 {
        std::cmp::min(512, (limits.nodes / 1024) as i32).max(1)
    } else {
        512
    };

    // ローカルのノード数を共有カウンタへ反映（relaxedで十分）
    let delta = st.nodes - st.nodes_flushed;
    if delta > 0 {
        ctx.shared.nodes.fetch_add(delta, Ordering::Relaxed);
        st.nodes_flushed = st.nodes;
    }

    // 外部からの停止要求
    if ctx.shared.stop.load(Ordering::Acquire) {
        st.abort = true;
        return true;
    }

    // ノード数制限（全スレッド合計）
    if limits.nodes > 0 && ctx.shared.nodes.load(Ordering::Relaxed) >= limits.nodes {
        ctx.shared.stop.store(true, Ordering::Release);
        st.abort = true;
        return true;
    }

    // 時間制限チェック（main threadのみ）
    if ctx.thread_id == 0 {
        if let Some(tm) = ctx.time {
            if tm.active() && tm.elapsed() > tm.maximum() {
                if ctx.shared.ponder.load(Ordering::Relaxed) {
                    // ponder中は止めず、ponderhit時に停止へ変換する
                    ctx.shared.stop_on_ponderhit.store(true, Ordering::Relaxed);
                } else {
                    ctx.shared.stop.store(true, Ordering::Release);
                    st.abort = true;
                    return true;
                }
            }
        }
    }

    false
}

// =============================================================================
// 静的評価
// =============================================================================

/// 静的評価を呼び出す
///
/// optimismが0のときだけ評価ハッシュを使う（楽観値込みの値を共有キャッシュに
/// 混ぜない）。
#[inline]
pub(super) fn static_evaluate(st: &SearchState, ctx: &SearchContext<'_>, pos: &Position) -> Value {
    let optimism = st.optimism[pos.side_to_move() as usize];
    if optimism == 0 {
        if let Some(v) = ctx.eval_hash.probe(pos.key()) {
            return v;
        }
        let v = eval::evaluate(pos, ctx.networks, &ctx.eval_opts, 0);
        ctx.eval_hash.store(pos.key(), v);
        return v;
    }
    eval::evaluate(pos, ctx.networks, &ctx.eval_opts, optimism)
}

// =============================================================================
// ContinuationHistory 操作
// =============================================================================

/// ContinuationHistory ポインタを取得
#[inline]
pub(super) fn cont_history_ptr(
    st: &SearchState,
    ctx: &SearchContext<'_>,
    ply: i32,
    back: i32,
) -> NonNull<PieceToHistory> {
    debug_assert!(ply >= 0 && (ply as usize) < STACK_SIZE, "ply out of bounds: {ply}");
    debug_assert!(back >= 0);
    if ply >= back {
        st.stack[(ply - back) as usize].cont_history_ptr
    } else {
        ctx.cont_history_sentinel
    }
}

/// ContinuationHistory 参照を取得
#[inline]
pub(super) fn cont_history_ref<'a>(
    st: &'a SearchState,
    ctx: &SearchContext<'_>,
    ply: i32,
    back: i32,
) -> &'a PieceToHistory {
    let ptr = cont_history_ptr(st, ctx, ply, back);
    // SAFETY: ポインタはHistoryCell内のテーブルか番兵を指しており、
    // SearchWorkerのライフタイム中は常に有効
    unsafe { ptr.as_ref() }
}

/// ContinuationHistory テーブル配列を取得（1,2,3,4,5,6手前）
#[inline]
pub(super) fn cont_history_tables<'a>(
    st: &'a SearchState,
    ctx: &SearchContext<'_>,
    ply: i32,
) -> [&'a PieceToHistory; 6] {
    [
        cont_history_ref(st, ctx, ply, 1),
        cont_history_ref(st, ctx, ply, 2),
        cont_history_ref(st, ctx, ply, 3),
        cont_history_ref(st, ctx, ply, 4),
        cont_history_ref(st, ctx, ply, 5),
        cont_history_ref(st, ctx, ply, 6),
    ]
}

/// 指し手実行後のContinuationHistoryを設定
///
/// `in_check` は親ノードの王手状態を渡す（gives_checkではない）。
#[inline]
pub(super) fn set_cont_history_for_move(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    ply: i32,
    in_check: bool,
    capture: bool,
    piece: usize,
    to: Square,
) {
    debug_assert!(ply >= 0 && (ply as usize) < STACK_SIZE, "ply out of bounds: {ply}");
    let table = ctx.history.with_read(|h| {
        NonNull::from(
            h.continuation_history[in_check as usize][capture as usize].get_table(piece, to),
        )
    });
    st.stack[ply as usize].cont_history_ptr = table;
    st.stack[ply as usize].cont_hist_key = Some(ContHistKey::new(in_check, capture, piece, to));
}

/// Null move用にContinuationHistoryを番兵へ戻す
#[inline]
pub(super) fn clear_cont_history_for_null(st: &mut SearchState, ctx: &SearchContext<'_>, ply: i32) {
    st.stack[ply as usize].cont_history_ptr = ctx.cont_history_sentinel;
    st.stack[ply as usize].cont_hist_key = None;
}

/// 親ノードのreductionを取得してクリア
#[inline]
pub(super) fn take_prior_reduction(st: &mut SearchState, ply: i32) -> i32 {
    if ply >= 1 {
        let parent = (ply - 1) as usize;
        let pr = st.stack[parent].reduction;
        st.stack[parent].reduction = 0;
        pr
    } else {
        0
    }
}
