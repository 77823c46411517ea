//! Alpha-Beta探索の実装
//!
//! 反復深化のPrincipal Variation Search。
//! - Aspiration Window / MultiPV
//! - 静止探索 (qsearch.rs)
//! - 各種枝刈り: Razoring, Futility, NMP, ProbCut, LMP, SEE (pruning.rs)
//! - Singular Extension / Multi-cut / Negative Extension
//! - LMR（windowサイズ・History連動）
//! - History更新（butterfly/continuation/capture/pawn/counter/correction）

use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::sync::LazyLock;

use shakmaty::Square;

use crate::eval::{EvalHash, EvalOptions, Networks};
use crate::position::Position;
use crate::tb::SyzygyTablebases;
use crate::tt::{ProbeResult, TTData, TranspositionTable};
use crate::types::{Bound, Depth, Move, Value, DEPTH_QS, MAX_PLY};

use super::eval_helpers::{compute_eval_context, probe_transposition, update_correction_history};
use super::history::{
    capture_malus, continuation_history_bonus_with_offset, low_ply_history_bonus,
    pawn_history_bonus, quiet_malus, stat_bonus, HistoryCell, PieceToHistory,
    CONTINUATION_HISTORY_WEIGHTS, CORRECTION_HISTORY_LIMIT, LOW_PLY_HISTORY_SIZE,
};
use super::movepicker::MovePicker;
use super::parallel::{InfoSink, SearchInfo, SharedSearch};
use super::params::SearchTuneParams;
use super::pruning::{
    step14_pruning, try_futility_pruning, try_null_move_pruning, try_probcut, try_razoring,
    try_small_probcut,
};
use super::qsearch::qsearch;
use super::search_helpers::{
    check_abort, cont_history_ref, cont_history_tables, set_cont_history_for_move,
    take_prior_reduction,
};
use super::time_management::TimeManagement;
use super::tt_history::{TTMoveHistory, TT_MOVE_HISTORY_BONUS, TT_MOVE_HISTORY_MALUS};
use super::types::{
    init_stack_array, value_draw, value_to_tt, LimitsType, NodeType, RootMoves, StackArray,
};

// =============================================================================
// 定数・Reduction
// =============================================================================

/// LMR用のreduction基礎テーブル
type Reductions = [i32; 64];

static REDUCTIONS: LazyLock<Reductions> = LazyLock::new(|| {
    let mut table: Reductions = [0; 64];
    for (i, value) in table.iter_mut().enumerate().skip(1) {
        *value = (2782.0 / 128.0 * (i as f64).ln()) as i32;
    }
    table
});

/// Reductionを取得（1024倍スケール）
///
/// 基礎項に、探索窓の広さに応じた補正
/// `(1346 − 896·δ/rootδ)` と non-improving の加算を足す。
#[inline]
pub(crate) fn reduction(
    imp: bool,
    depth: i32,
    move_count: i32,
    delta: i32,
    root_delta: i32,
) -> i32 {
    if depth <= 0 || move_count <= 0 {
        return 0;
    }

    let d = depth.clamp(1, 63) as usize;
    let mc = move_count.clamp(1, 63) as usize;
    let reduction_scale = REDUCTIONS[d] * REDUCTIONS[mc];
    let root_delta = root_delta.max(1);
    let delta = delta.max(0);

    reduction_scale + 1346 - 896 * delta / root_delta
        + (!imp as i32) * reduction_scale * 218 / 512
}

/// 残り時間の配分に使う評価レベル係数
///
/// 劣勢（インデックス小）ほど粘るために時間を厚く使う。
const EVAL_LEVEL_FACTORS: [f64; 10] =
    [1.13, 1.10, 1.07, 1.04, 1.01, 0.98, 0.95, 0.93, 0.91, 0.89];

/// 補正履歴を適用した静的評価に変換（決定的スコア領域に入らないようクリップ）
#[inline]
pub(super) fn to_corrected_static_eval(unadjusted: Value, correction_value: i32) -> Value {
    let corrected = unadjusted.raw() + correction_value / 131_072;
    Value::new(corrected.clamp(
        Value::TB_LOSS_IN_MAX_PLY.raw() + 1,
        Value::TB_WIN_IN_MAX_PLY.raw() - 1,
    ))
}

// =============================================================================
// コンテキスト構造体
// =============================================================================

/// 置換表プローブの結果をまとめたコンテキスト
pub(super) struct TTContext {
    pub(super) key: u64,
    pub(super) result: ProbeResult,
    pub(super) data: TTData,
    pub(super) hit: bool,
    pub(super) mv: Move,
    pub(super) value: Value,
    pub(super) capture: bool,
}

/// 置換表プローブの結果（続行 or カットオフ）
pub(super) enum ProbeOutcome {
    Continue(TTContext),
    Cutoff(Value),
}

/// 静的評価まわりの情報
pub(super) struct EvalContext {
    pub(super) static_eval: Value,
    pub(super) unadjusted_static_eval: Value,
    pub(super) correction_value: i32,
    /// 2手前と比較して局面が改善しているか
    pub(super) improving: bool,
    /// 相手側の局面が悪化しているか
    pub(super) opponent_worsening: bool,
}

/// Futility判定に必要な情報
#[derive(Clone, Copy)]
pub(super) struct FutilityParams {
    pub(super) depth: Depth,
    pub(super) beta: Value,
    pub(super) static_eval: Value,
    pub(super) correction_value: i32,
    pub(super) improving: bool,
    pub(super) opponent_worsening: bool,
    pub(super) tt_hit: bool,
    pub(super) tt_pv: bool,
    pub(super) in_check: bool,
}

/// 指し手ループ内の枝刈りに必要な文脈
pub(super) struct Step14Context<'a> {
    pub(super) pos: &'a Position,
    pub(super) mv: Move,
    pub(super) depth: Depth,
    pub(super) ply: i32,
    pub(super) move_count: i32,
    pub(super) best_value: Value,
    pub(super) in_check: bool,
    pub(super) gives_check: bool,
    pub(super) is_capture: bool,
    pub(super) improving: bool,
    pub(super) lmr_depth: i32,
    pub(super) mover: shakmaty::Color,
    pub(super) cont_history_1: &'a PieceToHistory,
    pub(super) cont_history_2: &'a PieceToHistory,
    pub(super) static_eval: Value,
    pub(super) alpha: Value,
    pub(super) pawn_history_index: usize,
}

/// 指し手ループ内の枝刈り判定結果
pub(super) enum Step14Outcome {
    /// この手をスキップ（best_valueを更新する場合は付随）
    Skip { best_value: Option<Value> },
    /// 以降のquiet手をまとめてスキップ
    SkipQuiets,
    /// 続行
    Continue,
}

// =============================================================================
// SearchEnv / SearchContext / SearchState
// =============================================================================

/// プール側から渡される探索環境（全ワーカー共通）
pub struct SearchEnv<'a> {
    pub tt: &'a TranspositionTable,
    pub eval_hash: &'a EvalHash,
    pub networks: &'a Networks,
    pub params: &'a SearchTuneParams,
    pub eval_opts: EvalOptions,
    pub tb: Option<&'a SyzygyTablebases>,
    pub tb_probe_depth: Depth,
    pub tb_rule50: bool,
    pub shared: &'a SharedSearch,
    pub time: Option<&'a TimeManagement>,
    pub threads: usize,
    pub multi_pv: usize,
}

/// 探索中に変化しない共有データ（1ワーカー分）
pub struct SearchContext<'a> {
    pub tt: &'a TranspositionTable,
    pub eval_hash: &'a EvalHash,
    pub networks: &'a Networks,
    pub params: &'a SearchTuneParams,
    pub eval_opts: EvalOptions,
    pub tb: Option<&'a SyzygyTablebases>,
    pub tb_probe_depth: Depth,
    pub tb_rule50: bool,
    pub shared: &'a SharedSearch,
    pub time: Option<&'a TimeManagement>,
    pub history: &'a HistoryCell,
    pub cont_history_sentinel: NonNull<PieceToHistory>,
    pub thread_id: usize,
}

/// 探索中に変化する状態
pub struct SearchState {
    /// 探索ノード数（ローカル。共有カウンタへは check_abort で反映）
    pub nodes: u64,
    pub nodes_flushed: u64,
    /// 探索スタック
    pub stack: StackArray,
    /// ルートでのウィンドウ幅（beta - alpha）。LMRスケール用。
    pub root_delta: i32,
    /// 中断フラグ
    pub abort: bool,
    /// 選択的深さ
    pub sel_depth: i32,
    /// ルート深さ
    pub root_depth: Depth,
    /// 完了済み深さ
    pub completed_depth: Depth,
    /// 最善手
    pub best_move: Move,
    /// Null Move の Verification Search 用
    pub nmp_min_ply: i32,
    /// ルート手
    pub root_moves: RootMoves,
    /// check_abort呼び出しカウンター
    pub calls_cnt: i32,
    /// 楽観値 [White, Black]
    pub optimism: [i32; 2],
    /// TBヒット数（ローカル）
    pub tb_hits: u64,
    /// ルート手がTBでランク付けされているか
    pub root_in_tb: bool,
}

impl SearchState {
    fn new(sentinel: NonNull<PieceToHistory>) -> Self {
        Self {
            nodes: 0,
            nodes_flushed: 0,
            stack: init_stack_array(sentinel),
            root_delta: 1,
            abort: false,
            sel_depth: 0,
            root_depth: 0,
            completed_depth: 0,
            best_move: Move::NONE,
            nmp_min_ply: 0,
            root_moves: RootMoves::new(),
            calls_cnt: 0,
            optimism: [0; 2],
            tb_hits: 0,
            root_in_tb: false,
        }
    }
}

// =============================================================================
// SearchWorker
// =============================================================================

/// 探索ワーカー
///
/// ゲーム全体で再利用される。履歴統計はワーカーが所有し、
/// `ucinewgame` でクリア、`go` では保持する。
pub struct SearchWorker {
    pub thread_id: usize,
    /// 履歴/統計テーブル群（HistoryCell 経由でアクセス）
    pub history: Box<HistoryCell>,
    /// ContinuationHistoryの番兵
    pub cont_history_sentinel: NonNull<PieceToHistory>,
    /// 探索状態
    pub state: SearchState,

    // 時間管理用（main threadのみ意味を持つ、探索をまたいで保持）
    pub previous_time_reduction: f64,
    pub best_previous_score: Value,
    pub best_previous_average_score: Value,
    pub iter_values: [Value; 4],
}

impl SearchWorker {
    /// 新しいSearchWorkerを作成
    ///
    /// Box化してヒープに配置し、スタックオーバーフローを防ぐ。
    pub fn new(thread_id: usize) -> Box<Self> {
        let history = HistoryCell::new_boxed();
        let sentinel = history
            .with_read(|h| NonNull::from(h.continuation_history[0][0].get_table(0, Square::A1)));

        Box::new(Self {
            thread_id,
            history,
            cont_history_sentinel: sentinel,
            state: SearchState::new(sentinel),
            previous_time_reduction: 1.0,
            best_previous_score: Value::INFINITE,
            best_previous_average_score: Value::INFINITE,
            iter_values: [Value::ZERO; 4],
        })
    }

    /// usinewgame相当: 全履歴をクリア
    pub fn clear(&mut self) {
        self.history.clear();
        self.previous_time_reduction = 1.0;
        self.best_previous_score = Value::INFINITE;
        self.best_previous_average_score = Value::INFINITE;
        self.iter_values = [Value::ZERO; 4];
    }

    /// goごとの探索状態リセット（履歴は保持）
    pub fn prepare_search(&mut self) {
        let st = &mut self.state;
        st.nodes = 0;
        st.nodes_flushed = 0;
        st.root_delta = 1;
        st.abort = false;
        st.sel_depth = 0;
        st.root_depth = 0;
        st.completed_depth = 0;
        st.best_move = Move::NONE;
        st.nmp_min_ply = 0;
        st.root_moves.clear();
        st.calls_cnt = 0;
        st.optimism = [0; 2];
        st.tb_hits = 0;
        st.root_in_tb = false;
        for frame in st.stack.iter_mut() {
            frame.current_move = Move::NONE;
            frame.excluded_move = Move::NONE;
            frame.killers = [Move::NONE; 2];
            frame.static_eval = Value::NONE;
            frame.stat_score = 0;
            frame.move_count = 0;
            frame.cutoff_cnt = 0;
            frame.tt_pv = false;
            frame.tt_hit = false;
            frame.in_check = false;
            frame.multiple_extensions = 0;
            frame.quiet_move_streak = 0;
            frame.reduction = 0;
            frame.cont_history_ptr = self.cont_history_sentinel;
            frame.cont_hist_key = None;
            frame.pv.clear();
        }
        self.history.with_write(|h| h.low_ply_history.clear());
    }

    /// 反復深化のメインループ
    ///
    /// MultiPVごとにAspiration Windowで探索し、main thread（thread_id 0）は
    /// 各イテレーション後に時間管理とinfo出力を行う。
    #[allow(clippy::too_many_arguments)]
    pub fn iterative_deepening(
        &mut self,
        env: &SearchEnv<'_>,
        pos: &mut Position,
        limits: &LimitsType,
        sink: Option<&dyn InfoSink>,
    ) {
        self.state.root_moves = RootMoves::from_legal_moves(pos, &limits.search_moves);
        if self.state.root_moves.is_empty() {
            self.state.best_move = Move::NONE;
            return;
        }

        // TBによるルート手のランク付け
        if let Some(tb) = env.tb {
            let mut rms = std::mem::take(&mut self.state.root_moves);
            self.state.root_in_tb = tb.rank_root_moves(pos, &mut rms);
            self.state.root_moves = rms;
            if self.state.root_in_tb {
                self.state.tb_hits += self.state.root_moves.len() as u64;
                self.state.root_moves.stable_sort_from(0);
            }
        }

        let multi_pv = env.multi_pv.min(self.state.root_moves.len()).max(1);
        let us = pos.side_to_move();
        let main_thread = self.thread_id == 0;

        let mut last_best_move = Move::NONE;
        let mut last_best_move_depth: Depth = 0;
        let mut search_again_counter = 0;
        let mut tot_best_move_changes = 0.0f64;
        let mut time_reduction = 1.0f64;
        let mut iter_idx = 0usize;

        if main_thread {
            if self.best_previous_score == Value::INFINITE {
                self.iter_values = [Value::ZERO; 4];
            } else {
                self.iter_values = [self.best_previous_score; 4];
            }
        }

        let max_depth = if limits.depth > 0 {
            limits.depth.min(MAX_PLY - 1)
        } else {
            MAX_PLY - 1
        };

        // ヘルパーは開始深さをずらして多様性を出す
        let start_depth = 1 + (self.thread_id as Depth) % 2;

        let mut root_depth = start_depth;
        while root_depth <= max_depth {
            if self.state.abort || env.shared.stop.load(Ordering::Acquire) {
                break;
            }

            // PV変動メトリクスの世代減衰
            tot_best_move_changes /= 2.0;

            for rm in self.state.root_moves.iter_mut() {
                rm.previous_score = rm.score;
                rm.effort = 0;
            }

            if !env.shared.increase_depth.load(Ordering::Relaxed) {
                search_again_counter += 1;
            }

            self.state.root_depth = root_depth;

            for pv_idx in 0..multi_pv {
                if env.shared.stop.load(Ordering::Acquire) {
                    break;
                }
                self.state.sel_depth = 0;

                // Aspiration Window
                let avg = if self.state.root_moves[pv_idx].average_score == -Value::INFINITE {
                    Value::ZERO
                } else {
                    self.state.root_moves[pv_idx].average_score
                };
                let p = env.params;
                let mut delta = Value::new(
                    p.aspiration_delta_base + avg.raw() * avg.raw() / p.aspiration_delta_div,
                );
                let mut alpha = (avg - delta).max(-Value::INFINITE);
                let mut beta = (avg + delta).min(Value::INFINITE);

                // ルート手の平均スコアからoptimismを調整
                let opt = 132 * avg.raw() / (avg.raw().abs() + 89);
                self.state.optimism[us as usize] = opt;
                self.state.optimism[(!us) as usize] = -opt;

                let mut failed_high_cnt = 0;
                loop {
                    let adjusted_depth = (root_depth
                        - failed_high_cnt
                        - 3 * (search_again_counter + 1) / 4)
                        .max(1);

                    let best_value =
                        self.search_root_for_pv(env, pos, adjusted_depth, alpha, beta, pv_idx, limits);

                    self.state.root_moves.stable_sort_from(pv_idx);

                    if self.state.abort || env.shared.stop.load(Ordering::Acquire) {
                        break;
                    }

                    if best_value <= alpha {
                        // fail low
                        beta = Value::new((alpha.raw() + beta.raw()) / 2);
                        alpha = (best_value - delta).max(-Value::INFINITE);
                        failed_high_cnt = 0;
                        if main_thread {
                            env.shared.stop_on_ponderhit.store(false, Ordering::Relaxed);
                        }
                    } else if best_value >= beta {
                        // fail high
                        beta = (best_value + delta).min(Value::INFINITE);
                        failed_high_cnt += 1;
                    } else {
                        break;
                    }

                    delta = delta + delta / 3;
                }

                self.state.root_moves.stable_sort_from(0);

                for i in 0..self.state.root_moves.len() {
                    let rm = &mut self.state.root_moves[i];
                    rm.uci_score = rm.score;
                }

                if main_thread {
                    if let Some(sink) = sink {
                        let stopped = env.shared.stop.load(Ordering::Acquire);
                        let elapsed = env.time.map(|t| t.elapsed()).unwrap_or(0);
                        if stopped || pv_idx + 1 == multi_pv || elapsed > 3000 {
                            self.emit_info(env, root_depth, multi_pv, sink);
                        }
                    }
                }
            }

            if !self.state.abort && !env.shared.stop.load(Ordering::Acquire) {
                self.state.completed_depth = root_depth;
            }

            if self.state.root_moves[0].mv() != last_best_move {
                last_best_move = self.state.root_moves[0].mv();
                last_best_move_depth = root_depth;
            }
            self.state.best_move = self.state.root_moves[0].mv();

            if !main_thread {
                root_depth += 1;
                continue;
            }

            let best_value = self.state.root_moves[0].score;

            // mate制限: 指定手数以内の詰みを見つけたら停止
            if limits.mate > 0
                && best_value.is_mate_score()
                && best_value > Value::ZERO
                && Value::MATE.raw() - best_value.raw() <= 2 * limits.mate
            {
                env.shared.stop.store(true, Ordering::Release);
            }

            // 時間管理
            if let Some(tm) = env.time {
                if tm.active()
                    && !env.shared.stop.load(Ordering::Acquire)
                    && !env.shared.stop_on_ponderhit.load(Ordering::Relaxed)
                {
                    tot_best_move_changes +=
                        env.shared.best_move_changes.swap(0, Ordering::Relaxed) as f64;

                    let p = env.params;
                    let prev_avg = if self.best_previous_average_score == Value::INFINITE {
                        best_value
                    } else {
                        self.best_previous_average_score
                    };

                    let falling_eval = ((p.falling_eval_base
                        + p.falling_eval_prev_mult * (prev_avg.raw() - best_value.raw())
                        + p.falling_eval_iter_mult
                            * (self.iter_values[iter_idx].raw() - best_value.raw()))
                        as f64
                        / 10000.0)
                        .clamp(0.580, 1.667);

                    // 最善手が安定しているほど時間を削る
                    time_reduction = if last_best_move_depth + 8 < self.state.completed_depth {
                        p.time_reduction_stable
                    } else {
                        p.time_reduction_unstable
                    };
                    let reduction_factor =
                        (1.48 + self.previous_time_reduction) / (2.17 * time_reduction);
                    let instability =
                        1.0 + p.instability_mult * tot_best_move_changes / env.threads as f64;
                    let el = ((best_value.raw() + 750) / 150).clamp(0, 9) as usize;

                    let mut total_time = tm.optimum() as f64
                        * falling_eval
                        * reduction_factor
                        * instability
                        * EVAL_LEVEL_FACTORS[el];

                    // 合法手が1つなら時間をかけない
                    if self.state.root_moves.len() == 1 {
                        total_time = total_time.min(500.0);
                    }

                    let elapsed = tm.elapsed();
                    if elapsed as f64 > total_time {
                        if env.shared.ponder.load(Ordering::Relaxed) {
                            env.shared.stop_on_ponderhit.store(true, Ordering::Relaxed);
                        } else {
                            env.shared.stop.store(true, Ordering::Release);
                        }
                    } else {
                        let deepen = env.shared.ponder.load(Ordering::Relaxed)
                            || (elapsed as f64) <= total_time * 0.506;
                        env.shared.increase_depth.store(deepen, Ordering::Relaxed);
                    }
                }
            }

            self.iter_values[iter_idx] = best_value;
            iter_idx = (iter_idx + 1) & 3;
            root_depth += 1;
        }

        if main_thread {
            self.previous_time_reduction = time_reduction;
        }
    }

    /// 探索情報の出力
    fn emit_info(&self, env: &SearchEnv<'_>, depth: Depth, multi_pv: usize, sink: &dyn InfoSink) {
        let elapsed = env.time.map(|t| t.elapsed()).unwrap_or(0).max(1);
        let nodes = env.shared.nodes.load(Ordering::Relaxed)
            + (self.state.nodes - self.state.nodes_flushed);
        let tb_hits = env.shared.tb_hits.load(Ordering::Relaxed) + self.state.tb_hits;

        for i in 0..multi_pv.min(self.state.root_moves.len()) {
            let rm = &self.state.root_moves[i];
            if rm.score == -Value::INFINITE && rm.previous_score == -Value::INFINITE {
                continue;
            }
            sink.info(&SearchInfo {
                depth,
                sel_depth: rm.sel_depth,
                multipv: i + 1,
                score: rm.uci_score,
                lowerbound: rm.score_lowerbound,
                upperbound: rm.score_upperbound,
                nodes,
                nps: nodes * 1000 / elapsed as u64,
                hashfull: env.tt.hashfull(),
                tb_hits,
                time_ms: elapsed,
                pv: rm.pv.clone(),
            });
        }
    }

    /// 指定のPVライン（pv_idx）を探索する
    ///
    /// pv_idx より前の手は確定済みとみなし、pv_idx 以降だけを読む。
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search_root_for_pv(
        &mut self,
        env: &SearchEnv<'_>,
        pos: &mut Position,
        depth: Depth,
        alpha: Value,
        beta: Value,
        pv_idx: usize,
        limits: &LimitsType,
    ) -> Value {
        let ctx = SearchContext {
            tt: env.tt,
            eval_hash: env.eval_hash,
            networks: env.networks,
            params: env.params,
            eval_opts: env.eval_opts,
            tb: env.tb,
            tb_probe_depth: env.tb_probe_depth,
            tb_rule50: env.tb_rule50,
            shared: env.shared,
            time: env.time,
            history: &self.history,
            cont_history_sentinel: self.cont_history_sentinel,
            thread_id: self.thread_id,
        };
        let st = &mut self.state;

        st.root_delta = (beta.raw() - alpha.raw()).max(1);

        let mut alpha = alpha;
        let mut best_value = -Value::INFINITE;
        let mut best_rm_idx = pv_idx;
        let root_in_check = pos.in_check();

        st.stack[0].in_check = root_in_check;
        st.stack[0].cont_history_ptr = ctx.cont_history_sentinel;
        st.stack[0].cont_hist_key = None;
        st.stack[0].pv.clear();
        st.stack[1].pv.clear();

        for rm_idx in pv_idx..st.root_moves.len() {
            if check_abort(st, &ctx, limits) {
                return Value::ZERO;
            }

            st.sel_depth = 0;

            let mv = st.root_moves[rm_idx].mv();
            let is_capture = pos.capture_stage(mv);
            let cont_pc = pos.moved_piece_index(mv);
            let nodes_before = st.nodes;

            st.stack[0].current_move = mv;
            pos.do_move_with_prefetch(mv, ctx.tt);
            st.nodes += 1;
            set_cont_history_for_move(st, &ctx, 0, root_in_check, is_capture, cont_pc, mv.to());

            // PVS: ラインの先頭はフルウィンドウ、以降はゼロウィンドウ
            let value = if rm_idx == pv_idx {
                -Self::search_node::<{ NodeType::PV as u8 }>(
                    st,
                    &ctx,
                    pos,
                    depth - 1,
                    -beta,
                    -alpha,
                    1,
                    false,
                    limits,
                )
            } else {
                let mut value = -Self::search_node::<{ NodeType::NonPV as u8 }>(
                    st,
                    &ctx,
                    pos,
                    depth - 1,
                    -alpha - Value::new(1),
                    -alpha,
                    1,
                    true,
                    limits,
                );
                if value > alpha && value < beta {
                    value = -Self::search_node::<{ NodeType::PV as u8 }>(
                        st,
                        &ctx,
                        pos,
                        depth - 1,
                        -beta,
                        -alpha,
                        1,
                        false,
                        limits,
                    );
                }
                value
            };

            pos.undo_move(mv);

            st.root_moves[rm_idx].effort += st.nodes - nodes_before;

            if st.abort {
                return Value::ZERO;
            }

            let mut updated = rm_idx == pv_idx;
            {
                let rm = &mut st.root_moves[rm_idx];
                rm.score = value;
                rm.sel_depth = st.sel_depth;
                rm.accumulate_score_stats(value);
            }

            if value > best_value {
                best_value = value;

                if value > alpha {
                    if pv_idx == 0 && rm_idx > 0 {
                        ctx.shared.best_move_changes.fetch_add(1, Ordering::Relaxed);
                    }

                    alpha = value;
                    best_rm_idx = rm_idx;
                    updated = true;

                    // PVを更新
                    st.root_moves[rm_idx].pv.truncate(1);
                    let child_pv = st.stack[1].pv.clone();
                    st.root_moves[rm_idx].pv.extend_from_slice(&child_pv);

                    if value >= beta {
                        break;
                    }
                }
            }

            // α未更新の手はスコアを落として前回の順序を保つ
            if !updated {
                st.root_moves[rm_idx].score = -Value::INFINITE;
            }
        }

        st.root_moves.swap(best_rm_idx, pv_idx);

        best_value
    }

    /// 通常探索ノード
    ///
    /// NTは NodeType を const genericで受け取る。`cut_node` は
    /// βカットが期待されるゼロウィンドウの非PVで true。
    #[allow(clippy::too_many_arguments)]
    pub(super) fn search_node<const NT: u8>(
        st: &mut SearchState,
        ctx: &SearchContext<'_>,
        pos: &mut Position,
        depth: Depth,
        alpha: Value,
        beta: Value,
        ply: i32,
        cut_node: bool,
        limits: &LimitsType,
    ) -> Value {
        let pv_node = NT == NodeType::PV as u8;
        let all_node = !(pv_node || cut_node);
        let mut depth = depth;
        let mut alpha = alpha;
        let mut beta = beta;

        debug_assert!(alpha < beta);
        debug_assert!(!(pv_node && cut_node));

        // 深さが尽きたら静止探索へ
        if depth <= DEPTH_QS {
            return qsearch::<NT>(st, ctx, pos, DEPTH_QS, alpha, beta, ply, limits);
        }

        let in_check = pos.in_check();

        if ply >= MAX_PLY {
            return if in_check {
                Value::ZERO
            } else {
                super::search_helpers::static_evaluate(st, ctx, pos)
            };
        }

        // 循環検出: 相手に千日手へ戻る迂回があるならαを引き分け付近へ
        if alpha < Value::DRAW && pos.has_game_cycle(ply) {
            alpha = value_draw(st.nodes);
            if alpha >= beta {
                return alpha;
            }
        }

        // 引き分け
        if pos.is_draw(ply) {
            return value_draw(st.nodes);
        }

        if pv_node && st.sel_depth < ply + 1 {
            st.sel_depth = ply + 1;
        }

        if check_abort(st, ctx, limits) {
            return Value::ZERO;
        }

        // Mate Distance Pruning
        alpha = alpha.max(Value::mated_in(ply));
        beta = beta.min(Value::mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }

        // スタック設定
        st.stack[ply as usize].in_check = in_check;
        st.stack[ply as usize].move_count = 0;
        st.stack[(ply + 2) as usize].cutoff_cnt = 0;
        st.stack[(ply + 2) as usize].killers = [Move::NONE; 2];
        if pv_node {
            st.stack[ply as usize].pv.clear();
            st.stack[(ply + 1) as usize].pv.clear();
        }

        let prior_reduction = take_prior_reduction(st, ply);
        st.stack[ply as usize].reduction = 0;

        let excluded_move = st.stack[ply as usize].excluded_move;

        // 置換表プローブ（即時カットオフ込み）
        let tt_ctx = match probe_transposition::<NT>(
            st,
            ctx,
            pos,
            depth,
            beta,
            ply,
            pv_node,
            excluded_move,
        ) {
            ProbeOutcome::Continue(c) => c,
            ProbeOutcome::Cutoff(value) => return value,
        };
        let tt_move = tt_ctx.mv;
        let tt_value = tt_ctx.value;
        let tt_hit = tt_ctx.hit;
        let tt_capture = tt_ctx.capture;

        // テーブルベースプローブ
        let mut max_value = Value::INFINITE;
        if let Some(tb) = ctx.tb {
            if excluded_move.is_none()
                && tb.can_probe(pos)
                && (depth >= ctx.tb_probe_depth || (pos.piece_count() as usize) < tb.max_pieces())
            {
                if let Some(wdl) = tb.probe_wdl(pos) {
                    st.tb_hits += 1;
                    let value = wdl.to_value(ply, ctx.tb_rule50);
                    let bound = match wdl {
                        crate::tb::TbWdl::Win => Bound::Lower,
                        crate::tb::TbWdl::Loss => Bound::Upper,
                        _ => Bound::Exact,
                    };

                    if bound == Bound::Exact
                        || (bound == Bound::Lower && value >= beta)
                        || (bound == Bound::Upper && value <= alpha)
                    {
                        tt_ctx.result.write(
                            tt_ctx.key,
                            value_to_tt(value, ply),
                            st.stack[ply as usize].tt_pv,
                            bound,
                            (depth + 6).min(MAX_PLY - 1),
                            Move::NONE,
                            Value::NONE,
                            ctx.tt.generation(),
                        );
                        return value;
                    }

                    if pv_node {
                        if bound == Bound::Lower {
                            alpha = alpha.max(value);
                        } else {
                            max_value = value;
                        }
                    }
                }
            }
        }

        // 静的評価
        let eval_ctx = compute_eval_context(st, ctx, pos, ply, in_check, &tt_ctx, excluded_move);
        let improving = eval_ctx.improving;
        let opponent_worsening = eval_ctx.opponent_worsening;

        // Razoring
        if !in_check {
            if let Some(v) = try_razoring(
                st,
                ctx,
                pos,
                depth,
                alpha,
                beta,
                ply,
                pv_node,
                in_check,
                eval_ctx.static_eval,
                limits,
            ) {
                return v;
            }
            if st.abort {
                return Value::ZERO;
            }

            // Futility pruning（子ノード）
            if let Some(v) = try_futility_pruning(
                ctx,
                FutilityParams {
                    depth,
                    beta,
                    static_eval: eval_ctx.static_eval,
                    correction_value: eval_ctx.correction_value,
                    improving,
                    opponent_worsening,
                    tt_hit,
                    tt_pv: st.stack[ply as usize].tt_pv,
                    in_check,
                },
            ) {
                return v;
            }

            // Null move pruning
            if !pv_node {
                if let Some(v) = try_null_move_pruning(
                    st,
                    ctx,
                    pos,
                    depth,
                    beta,
                    ply,
                    pv_node,
                    in_check,
                    eval_ctx.static_eval,
                    excluded_move,
                    limits,
                    Self::search_node::<{ NodeType::NonPV as u8 }>,
                ) {
                    return v;
                }
            }
        }

        // Internal Iterative Reductions
        if pv_node && tt_move.is_none() {
            depth -= 2
                + 2 * (tt_hit && tt_ctx.data.depth >= depth) as Depth
                + 2 * (depth < 9 && st.stack[(ply + 1) as usize].cutoff_cnt > 3) as Depth;
            if depth <= DEPTH_QS {
                return qsearch::<NT>(st, ctx, pos, DEPTH_QS, alpha, beta, ply, limits);
            }
        }
        if cut_node && depth >= 6 && tt_move.is_none() && prior_reduction <= 3 {
            depth -= 2;
        }

        // ProbCut
        if let Some(v) = try_probcut(
            st,
            ctx,
            pos,
            depth,
            beta,
            improving,
            &tt_ctx,
            ply,
            eval_ctx.static_eval,
            eval_ctx.unadjusted_static_eval,
            in_check,
            pv_node,
            limits,
            Self::search_node::<{ NodeType::NonPV as u8 }>,
        ) {
            return v;
        }
        if st.abort {
            return Value::ZERO;
        }

        // 王手局面のTTベースProbCut
        if !pv_node {
            if let Some(v) = try_small_probcut(ctx, depth, beta, in_check, &tt_ctx) {
                return v;
            }
        }

        // =====================================================================
        // 指し手ループ
        // =====================================================================
        let mut best_value = -Value::INFINITE;
        let mut best_move = Move::NONE;
        let mut move_count = 0;
        let mut quiets_tried: Vec<Move> = Vec::with_capacity(32);
        let mut captures_tried: Vec<Move> = Vec::with_capacity(16);
        let mover = pos.side_to_move();
        let tt_pv = st.stack[ply as usize].tt_pv;

        // 反駁手: killer2つ + 直前の相手の手へのcounter
        let killers = st.stack[ply as usize].killers;
        let counter = if ply >= 1 {
            match st.stack[(ply - 1) as usize].cont_hist_key {
                Some(key) => ctx.history.with_read(|h| h.counter_moves.get(key.piece, key.to)),
                None => Move::NONE,
            }
        } else {
            Move::NONE
        };

        let cont_tables = cont_history_tables(st, ctx, ply);
        let mut mp = MovePicker::new(pos, tt_move, depth, ply, killers, counter, cont_tables);

        loop {
            let mv = ctx.history.with_read(|h| mp.next_move(pos, h));
            if mv == Move::NONE {
                break;
            }
            if mv == excluded_move {
                continue;
            }
            if check_abort(st, ctx, limits) {
                return Value::ZERO;
            }

            move_count += 1;
            st.stack[ply as usize].move_count = move_count;

            let is_capture = pos.capture_stage(mv);
            let gives_check = pos.gives_check(mv);

            st.stack[(ply + 1) as usize].quiet_move_streak = if !is_capture && !gives_check {
                st.stack[ply as usize].quiet_move_streak + 1
            } else {
                0
            };

            let mut new_depth = depth - 1;
            let mut extension = 0i32;

            // =============================================================
            // Singular Extension
            // =============================================================
            if mv == tt_move
                && excluded_move.is_none()
                && ply > 0
                && depth >= 4 - (st.completed_depth > 30) as Depth + tt_pv as Depth
                && tt_value != Value::NONE
                && !tt_value.is_decisive()
                && tt_ctx.data.bound.is_lower_or_exact()
                && tt_ctx.data.depth >= depth - 3
            {
                let p = ctx.params;
                let margin = (p.singular_margin_base
                    + p.singular_margin_tt_pv * (tt_pv && !pv_node) as i32)
                    * depth
                    / p.singular_margin_div;
                let singular_beta = tt_value - Value::new(margin);
                let singular_depth = new_depth / 2;

                st.stack[ply as usize].excluded_move = mv;
                let singular_value = Self::search_node::<{ NodeType::NonPV as u8 }>(
                    st,
                    ctx,
                    pos,
                    singular_depth,
                    singular_beta - Value::new(1),
                    singular_beta,
                    ply,
                    cut_node,
                    limits,
                );
                st.stack[ply as usize].excluded_move = Move::NONE;

                if singular_value < singular_beta {
                    // TT手だけが良い: 延長
                    let corr_adj = eval_ctx.correction_value.abs() / 249_096;
                    let tt_move_hist = ctx.history.with_read(|h| h.tt_move_history.get() as i32);
                    let double_margin = 4 + 205 * pv_node as i32 - 223 * !tt_capture as i32
                        - corr_adj
                        - 921 * tt_move_hist / 127_649
                        - ((ply > st.root_depth) as i32) * 45;
                    let triple_margin = 80 + 276 * pv_node as i32 - 249 * !tt_capture as i32
                        + 86 * tt_pv as i32
                        - corr_adj
                        - ((ply * 2 > st.root_depth * 3) as i32) * 52;

                    extension = 1
                        + (singular_value < singular_beta - Value::new(double_margin)) as i32
                        + (singular_value < singular_beta - Value::new(triple_margin)) as i32;

                    // 多重延長は上限を超えない
                    if extension >= 2
                        && st.stack[ply as usize].multiple_extensions
                            > p.singular_multi_ext_limit
                    {
                        extension = 1;
                    }
                    depth += 1;
                } else if singular_value >= beta && !singular_value.is_decisive() {
                    // Multi-Cut: TT手以外もfail highするなら枝刈り
                    ctx.history.with_write(|h| {
                        h.tt_move_history.update(TTMoveHistory::multi_cut_bonus(depth))
                    });
                    return singular_value;
                } else if tt_value >= beta {
                    extension = -3;
                } else if cut_node {
                    extension = -2;
                } else if tt_value <= alpha {
                    extension = -1;
                }
            }

            // =============================================================
            // Reductionの計算と浅い枝刈り
            // =============================================================
            let delta = (beta.raw() - alpha.raw()).max(0);
            let mut r = reduction(improving, depth, move_count, delta, st.root_delta);

            if tt_pv {
                r -= 1024
                    + ((tt_hit && tt_value != Value::NONE && tt_value > alpha) as i32) * 1024
                    + ((tt_hit && tt_ctx.data.depth >= depth) as i32) * 1024;
            }
            if cut_node {
                r += 2048 + 1024 * tt_move.is_none() as i32;
            }
            if tt_capture {
                r += 1024;
            }
            if st.stack[(ply + 1) as usize].cutoff_cnt > 2 {
                r += 1024 + 1024 * all_node as i32;
            }
            r += st.stack[(ply + 1) as usize].quiet_move_streak * 51;
            if mv == tt_move {
                r -= 2048;
            }
            r -= eval_ctx.correction_value.abs() / 27_160;

            let lmr_depth = new_depth - r / 1024;

            if ply > 0 && pos.non_pawn_material(mover) > 0 && !best_value.is_loss() {
                let outcome = step14_pruning(
                    ctx,
                    Step14Context {
                        pos,
                        mv,
                        depth,
                        ply,
                        move_count,
                        best_value,
                        in_check,
                        gives_check,
                        is_capture,
                        improving,
                        lmr_depth,
                        mover,
                        cont_history_1: cont_history_ref(st, ctx, ply, 1),
                        cont_history_2: cont_history_ref(st, ctx, ply, 2),
                        static_eval: eval_ctx.static_eval,
                        alpha,
                        pawn_history_index: pos.pawn_history_index(),
                    },
                );
                match outcome {
                    Step14Outcome::Skip { best_value: updated } => {
                        if let Some(v) = updated {
                            best_value = v;
                        }
                        continue;
                    }
                    Step14Outcome::SkipQuiets => {
                        if mp.is_quiet_stage() {
                            mp.skip_quiets();
                        }
                        continue;
                    }
                    Step14Outcome::Continue => {}
                }
            }

            // statScoreによるreduction補正
            let stat_score = if is_capture {
                let captured = pos.captured_role(mv);
                let pc = pos.moved_piece_index(mv);
                let hist = ctx
                    .history
                    .with_read(|h| h.capture_history.get(pc, mv.to(), captured) as i32);
                782 * captured.map_or(0, crate::position::piece_value) / 128 + hist
            } else {
                let pc = pos.moved_piece_index(mv);
                let main = ctx.history.with_read(|h| h.main_history.get(mover, mv) as i32);
                let cont0 = cont_history_ref(st, ctx, ply, 1).get(pc, mv.to()) as i32;
                let cont1 = cont_history_ref(st, ctx, ply, 2).get(pc, mv.to()) as i32;
                2 * main + cont0 + cont1 - 4006
            };
            st.stack[ply as usize].stat_score = stat_score;
            r -= stat_score * 1024 / 14_200;

            // =============================================================
            // 指し手を実行
            // =============================================================
            let cont_pc = pos.moved_piece_index(mv);
            st.stack[ply as usize].current_move = mv;
            st.stack[(ply + 1) as usize].multiple_extensions =
                st.stack[ply as usize].multiple_extensions + (extension >= 2) as i32;

            pos.do_move_with_prefetch(mv, ctx.tt);
            st.nodes += 1;
            set_cont_history_for_move(st, ctx, ply, in_check, is_capture, cont_pc, mv.to());

            if is_capture {
                if captures_tried.len() < 32 {
                    captures_tried.push(mv);
                }
            } else if quiets_tried.len() < 32 {
                quiets_tried.push(mv);
            }

            new_depth += extension;

            // =============================================================
            // LMR / PVS
            // =============================================================
            let mut value;
            if depth >= 2 && move_count > 1 {
                // 削減付きゼロウィンドウ探索
                let d = (new_depth - r / 1024).clamp(1, new_depth + 1).max(1);

                st.stack[ply as usize].reduction = (depth - 1) - d;
                value = -Self::search_node::<{ NodeType::NonPV as u8 }>(
                    st,
                    ctx,
                    pos,
                    d,
                    -alpha - Value::new(1),
                    -alpha,
                    ply + 1,
                    true,
                    limits,
                );
                st.stack[ply as usize].reduction = 0;

                if value > alpha && d < new_depth {
                    // fail high: 深くやり直すか浅く済ませるか
                    let do_deeper = value > best_value + Value::new(43 + 2 * new_depth);
                    let do_shallower = value < best_value + Value::new(9);
                    new_depth += do_deeper as Depth - do_shallower as Depth;

                    if new_depth > d {
                        value = -Self::search_node::<{ NodeType::NonPV as u8 }>(
                            st,
                            ctx,
                            pos,
                            new_depth,
                            -alpha - Value::new(1),
                            -alpha,
                            ply + 1,
                            !cut_node,
                            limits,
                        );
                    }

                    // fail high後にContinuationHistoryを前向きに更新
                    if value > alpha {
                        let bonus = stat_bonus(new_depth, false);
                        update_continuation_histories(
                            st,
                            ctx,
                            ply,
                            in_check,
                            cont_pc,
                            mv.to(),
                            bonus,
                        );
                    }
                }

                if pv_node && (move_count == 1 || value > alpha) {
                    value = -Self::search_node::<{ NodeType::PV as u8 }>(
                        st,
                        ctx,
                        pos,
                        new_depth,
                        -beta,
                        -alpha,
                        ply + 1,
                        false,
                        limits,
                    );
                }
            } else if !pv_node || move_count > 1 {
                // ゼロウィンドウ探索
                let d = new_depth - (r > 3 * 1024) as Depth;
                value = -Self::search_node::<{ NodeType::NonPV as u8 }>(
                    st,
                    ctx,
                    pos,
                    d,
                    -alpha - Value::new(1),
                    -alpha,
                    ply + 1,
                    !cut_node,
                    limits,
                );

                if pv_node && value > alpha && value < beta {
                    value = -Self::search_node::<{ NodeType::PV as u8 }>(
                        st,
                        ctx,
                        pos,
                        new_depth,
                        -beta,
                        -alpha,
                        ply + 1,
                        false,
                        limits,
                    );
                }
            } else {
                // フルウィンドウPV探索
                value = -Self::search_node::<{ NodeType::PV as u8 }>(
                    st,
                    ctx,
                    pos,
                    new_depth,
                    -beta,
                    -alpha,
                    ply + 1,
                    false,
                    limits,
                );
            }

            pos.undo_move(mv);

            if st.abort {
                return Value::ZERO;
            }

            // =============================================================
            // スコア更新
            // =============================================================
            if value > best_value {
                best_value = value;

                if value > alpha {
                    best_move = mv;
                    alpha = value;

                    if pv_node {
                        let child_pv = st.stack[(ply + 1) as usize].pv.clone();
                        st.stack[ply as usize].update_pv(mv, &child_pv);
                    }

                    if value >= beta {
                        st.stack[ply as usize].cutoff_cnt +=
                            1 + tt_move.is_none() as i32 - (extension >= 2) as i32;
                        break;
                    }
                }
            }
        }

        // =====================================================================
        // 詰み/ステイルメイト判定
        // =====================================================================
        if move_count == 0 {
            // excludedMoveがある場合はTT手が除外されているのでαを返す
            if excluded_move.is_some() {
                return alpha;
            }
            return if in_check {
                Value::mated_in(ply)
            } else {
                Value::DRAW
            };
        }

        // =====================================================================
        // History更新
        // =====================================================================
        if best_move.is_some() {
            Self::update_all_stats(
                st,
                ctx,
                pos,
                ply,
                depth,
                in_check,
                best_move,
                tt_move,
                &quiets_tried,
                &captures_tried,
            );
        } else if ply >= 1 {
            // fail low: 直前の手（反駁されなかった手）へボーナス
            Self::prior_countermove_bonus(st, ctx, pos, ply, depth, in_check, best_value, beta);
        }

        // TT手の成功度
        if !pv_node && tt_move.is_some() && best_move.is_some() {
            let bonus = if best_move == tt_move {
                TT_MOVE_HISTORY_BONUS
            } else {
                TT_MOVE_HISTORY_MALUS
            };
            ctx.history.with_write(|h| h.tt_move_history.update(bonus));
        }

        // CorrectionHistoryの更新
        if !in_check
            && best_move.is_some()
            && !pos.capture_stage(best_move)
        {
            let static_eval = st.stack[ply as usize].static_eval;
            if static_eval != Value::NONE
                && ((best_value < static_eval && best_value < beta) || best_value > static_eval)
            {
                let bonus = ((best_value.raw() - static_eval.raw()) * depth / 8)
                    .clamp(-CORRECTION_HISTORY_LIMIT / 4, CORRECTION_HISTORY_LIMIT / 4);
                update_correction_history(st, ctx, pos, ply, bonus);
            }
        }

        // PVノードではTB由来の上限を超えない
        if pv_node {
            best_value = best_value.min(max_value);
        }

        // =====================================================================
        // 置換表更新
        // =====================================================================
        // excludedMoveがある場合は書かない（同一キーで異なる部分木のため）
        if excluded_move.is_none() {
            let bound = if best_value >= beta {
                Bound::Lower
            } else if pv_node && best_move.is_some() {
                Bound::Exact
            } else {
                Bound::Upper
            };

            tt_ctx.result.write(
                tt_ctx.key,
                value_to_tt(best_value, ply),
                st.stack[ply as usize].tt_pv,
                bound,
                depth,
                best_move,
                eval_ctx.unadjusted_static_eval,
                ctx.tt.generation(),
            );
        }

        best_value
    }

    /// bestMove確定時のHistory一括更新
    #[allow(clippy::too_many_arguments)]
    fn update_all_stats(
        st: &mut SearchState,
        ctx: &SearchContext<'_>,
        pos: &Position,
        ply: i32,
        depth: Depth,
        in_check: bool,
        best_move: Move,
        tt_move: Move,
        quiets_tried: &[Move],
        captures_tried: &[Move],
    ) {
        let is_best_capture = pos.capture_stage(best_move);
        let bonus = stat_bonus(depth, best_move == tt_move);
        let malus = quiet_malus(depth, quiets_tried.len());
        let us = pos.side_to_move();
        let pawn_idx = pos.pawn_history_index();
        let best_pc = pos.moved_piece_index(best_move);
        let best_to = best_move.to();

        if !is_best_capture {
            // killer更新
            let ks = &mut st.stack[ply as usize].killers;
            if ks[0] != best_move {
                ks[1] = ks[0];
                ks[0] = best_move;
            }

            // counter move更新
            if ply >= 1 {
                if let Some(prev) = st.stack[(ply - 1) as usize].cont_hist_key {
                    ctx.history
                        .with_write(|h| h.counter_moves.set(prev.piece, prev.to, best_move));
                }
            }

            let scaled_bonus = bonus * 978 / 1024;
            let scaled_malus = malus * 1115 / 1024;

            ctx.history.with_write(|h| {
                h.main_history.update(us, best_move, scaled_bonus);
                if ply < LOW_PLY_HISTORY_SIZE as i32 {
                    h.low_ply_history
                        .update(ply as usize, best_move, low_ply_history_bonus(scaled_bonus));
                }
                h.pawn_history.update(pawn_idx, best_pc, best_to, pawn_history_bonus(scaled_bonus));

                // 他のquiet手にはペナルティ
                for &m in quiets_tried {
                    if m != best_move {
                        h.main_history.update(us, m, -scaled_malus);
                        if ply < LOW_PLY_HISTORY_SIZE as i32 {
                            h.low_ply_history.update(
                                ply as usize,
                                m,
                                low_ply_history_bonus(-scaled_malus),
                            );
                        }
                        let pc = pos.moved_piece_index(m);
                        h.pawn_history.update(pawn_idx, pc, m.to(), pawn_history_bonus(-scaled_malus));
                    }
                }
            });

            update_continuation_histories(st, ctx, ply, in_check, best_pc, best_to, scaled_bonus);
            for &m in quiets_tried {
                if m != best_move {
                    let pc = pos.moved_piece_index(m);
                    update_continuation_histories(st, ctx, ply, in_check, pc, m.to(), -scaled_malus);
                }
            }
        } else {
            let captured = pos.captured_role(best_move);
            ctx.history
                .with_write(|h| h.capture_history.update(best_pc, best_to, captured, bonus));
        }

        // 他の捕獲手へのペナルティ
        let cap_malus = capture_malus(depth, captures_tried.len());
        ctx.history.with_write(|h| {
            for &m in captures_tried {
                if m != best_move {
                    let pc = pos.moved_piece_index(m);
                    let captured = pos.captured_role(m);
                    h.capture_history.update(pc, m.to(), captured, -cap_malus * 1431 / 1024);
                }
            }
        });

        // 直前の手が早々に反駁された場合のペナルティ
        if ply >= 1 {
            let prev_ply = (ply - 1) as usize;
            let prev_move_count = st.stack[prev_ply].move_count;
            let prev_tt_hit = st.stack[prev_ply].tt_hit;
            if prev_move_count == 1 + (prev_tt_hit as i32) && pos.captured_piece().is_none() {
                if let Some(prev) = st.stack[prev_ply].cont_hist_key {
                    let prev_in_check = st.stack[prev_ply].in_check;
                    update_continuation_histories(
                        st,
                        ctx,
                        ply - 1,
                        prev_in_check,
                        prev.piece,
                        prev.to,
                        -cap_malus * 622 / 1024,
                    );
                }
            }
        }
    }

    /// fail low時、直前の手のHistoryへボーナスを与える
    #[allow(clippy::too_many_arguments)]
    fn prior_countermove_bonus(
        st: &mut SearchState,
        ctx: &SearchContext<'_>,
        pos: &Position,
        ply: i32,
        depth: Depth,
        in_check: bool,
        best_value: Value,
        _beta: Value,
    ) {
        let prev_ply = (ply - 1) as usize;
        let prev_key = match st.stack[prev_ply].cont_hist_key {
            Some(k) => k,
            None => return,
        };

        if prev_key.capture {
            // 直前が捕獲: captureHistoryへ小さなボーナス
            if let Some(captured) = pos.captured_piece() {
                ctx.history.with_write(|h| {
                    h.capture_history.update(prev_key.piece, prev_key.to, Some(captured), 964)
                });
            }
            return;
        }

        let parent_stat_score = st.stack[prev_ply].stat_score;
        let parent_move_count = st.stack[prev_ply].move_count;
        let parent_in_check = st.stack[prev_ply].in_check;
        let parent_static_eval = st.stack[prev_ply].static_eval;
        let static_eval = st.stack[ply as usize].static_eval;

        let mut bonus_scale: i32 = -228;
        bonus_scale -= parent_stat_score / 104;
        bonus_scale += (63 * depth).min(508);
        bonus_scale += 184 * (parent_move_count > 8) as i32;
        bonus_scale += 143
            * (!in_check && static_eval != Value::NONE && best_value <= static_eval - Value::new(92))
                as i32;
        bonus_scale += 149
            * (!parent_in_check
                && parent_static_eval != Value::NONE
                && best_value <= -parent_static_eval - Value::new(70)) as i32;
        bonus_scale = bonus_scale.max(0);

        let scaled_bonus = ((144 * depth - 92).min(1365) as i64) * bonus_scale as i64;

        let cont_bonus = (scaled_bonus * 400 / 32_768) as i32;
        update_continuation_histories(
            st,
            ctx,
            ply - 1,
            parent_in_check,
            prev_key.piece,
            prev_key.to,
            cont_bonus,
        );

        let prev_move = st.stack[prev_ply].current_move;
        let main_bonus = (scaled_bonus * 220 / 32_768) as i32;
        let opponent = !pos.side_to_move();
        let pawn_bonus = (scaled_bonus * 1164 / 32_768) as i32;
        let pawn_idx = pos.pawn_history_index();

        ctx.history.with_write(|h| {
            h.main_history.update(opponent, prev_move, main_bonus);
            h.pawn_history.update(pawn_idx, prev_key.piece, prev_key.to, pawn_bonus);
        });
    }
}

/// 過去1,2,3,4,6手前のContinuationHistoryをまとめて更新
///
/// `at_ply` のフレームを起点に、そこから遡った各フレームのキーへ
/// (pc, to) のペアを重み付きで加算する。王手中は1,2手前のみ。
pub(super) fn update_continuation_histories(
    st: &SearchState,
    ctx: &SearchContext<'_>,
    at_ply: i32,
    in_check_at_ply: bool,
    pc: usize,
    to: Square,
    bonus: i32,
) {
    let max_back = if in_check_at_ply { 2 } else { 6 };
    ctx.history.with_write(|h| {
        for &(back, weight) in CONTINUATION_HISTORY_WEIGHTS.iter() {
            if back > max_back {
                continue;
            }
            let idx = at_ply - back as i32;
            if idx < 0 {
                break;
            }
            if let Some(key) = st.stack[idx as usize].cont_hist_key {
                let b = continuation_history_bonus_with_offset(bonus * weight / 1024, back);
                h.continuation_history[key.in_check as usize][key.capture as usize]
                    .update(key.piece, key.to, pc, to, b);
            }
        }
    });
}

// SAFETY: SearchWorkerは一度に1スレッドからしか使われない。
// スタック内の `cont_history_ptr: NonNull<PieceToHistory>` は自分の
// `history` フィールド内のテーブルを指しており、SearchWorkerがスレッド間で
// moveされてもhistoryごと移動するため常に有効。データ競合も起きない。
unsafe impl Send for SearchWorker {}
