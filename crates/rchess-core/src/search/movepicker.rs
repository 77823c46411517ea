//! MovePicker（指し手オーダリング）
//!
//! 探索中に指し手を効率的に順序付けして返すコンポーネント。
//! カットオフを起こしやすい手を先に返すことでAlpha-Beta探索の効率を
//! 最大化する。
//!
//! ## Lazy Generation
//!
//! 指し手は段階的に生成する。move count pruning が成立したら
//! `skip_quiets()` で残りのquiet手の生成をスキップできる。
//!
//! ## History参照を保持しない設計
//!
//! 再帰呼び出し時の参照エイリアス問題を避けるため、MovePickerは
//! HistoryTablesへの参照をフィールドとして保持しない。代わりに
//! `next_move()` で受け取る。
//!
//! ## Stage
//!
//! ### 通常探索（王手なし）
//! 1. MainTT - 置換表の指し手
//! 2. CaptureInit - 捕獲手（+女王成り）の生成
//! 3. GoodCapture - 良い捕獲手（SEE ≥ -value/18）
//! 4. Refutation - killer×2、counter move
//! 5. QuietInit - 静かな手の生成・スコアリング
//! 6. GoodQuiet - 閾値以上の静かな手
//! 7. BadCapture - SEEで後回しにした捕獲手
//! 8. BadQuiet - 残りの静かな手
//!
//! ### 王手回避
//! EvasionTT → EvasionInit → Evasion
//!
//! ### 静止探索
//! QSearchTT → QCaptureInit → QCapture
//!
//! ### ProbCut
//! ProbCutTT → ProbCutInit → ProbCut（SEE ≥ threshold の捕獲のみ）

use shakmaty::{Color, Role};

use super::history::{HistoryTables, PieceToHistory, LOW_PLY_HISTORY_SIZE};
use crate::position::{piece_value, Position};
use crate::types::{Depth, Move, Value, DEPTH_QS};

/// 1局面の最大指し手数
pub const MAX_MOVES: usize = 256;

/// スコア付き指し手
#[derive(Clone, Copy)]
pub struct ExtMove {
    pub mv: Move,
    pub value: i32,
}

impl ExtMove {
    pub const fn new(mv: Move, value: i32) -> Self {
        Self { mv, value }
    }
}

/// 指し手バッファ（固定長）
pub struct ExtMoveBuffer {
    moves: [ExtMove; MAX_MOVES],
    len: usize,
}

impl ExtMoveBuffer {
    pub fn new() -> Self {
        Self {
            moves: [ExtMove::new(Move::NONE, 0); MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> ExtMove {
        self.moves[i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, ext: ExtMove) {
        self.moves[i] = ext;
    }

    #[inline]
    pub fn set_value(&mut self, i: usize, value: i32) {
        self.moves[i].value = value;
    }

    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
    }

    #[inline]
    pub fn push(&mut self, ext: ExtMove) {
        self.moves[self.len] = ext;
        self.len += 1;
    }

    #[inline]
    pub fn swap(&mut self, a: usize, b: usize) {
        self.moves.swap(a, b);
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [ExtMove] {
        &mut self.moves[..self.len]
    }
}

impl Default for ExtMoveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Stage
// =============================================================================

/// 指し手生成の段階
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Stage {
    MainTT,
    CaptureInit,
    GoodCapture,
    Refutation,
    QuietInit,
    GoodQuiet,
    BadCapture,
    BadQuiet,

    EvasionTT,
    EvasionInit,
    Evasion,

    QSearchTT,
    QCaptureInit,
    QCapture,

    ProbCutTT,
    ProbCutInit,
    ProbCut,
}

// =============================================================================
// MovePicker
// =============================================================================

/// 指し手オーダリング器
///
/// `Position`や`HistoryTables`への参照はフィールドとして保持しない。
/// ContinuationHistoryのポインタだけはply毎に異なるため保持する。
pub struct MovePicker {
    continuation_history: [*const PieceToHistory; 6],

    stage: Stage,
    tt_move: Move,
    refutations: [Move; 3],
    probcut_threshold: Value,
    depth: Depth,
    ply: i32,
    skip_quiets: bool,

    side_to_move: Color,
    pawn_history_index: usize,

    moves: ExtMoveBuffer,
    cur: usize,
    end_cur: usize,
    end_bad_captures: usize,
    end_captures: usize,
    end_generated: usize,
    end_good_quiets: usize,
    refutation_idx: usize,
}

impl MovePicker {
    /// 通常探索用コンストラクタ
    pub fn new(
        pos: &Position,
        tt_move: Move,
        depth: Depth,
        ply: i32,
        killers: [Move; 2],
        counter: Move,
        continuation_history: [&PieceToHistory; 6],
    ) -> Self {
        let stage = if pos.in_check() {
            if tt_move.is_some() && pos.is_legal(tt_move) {
                Stage::EvasionTT
            } else {
                Stage::EvasionInit
            }
        } else if depth > DEPTH_QS {
            if tt_move.is_some() && pos.is_legal(tt_move) {
                Stage::MainTT
            } else {
                Stage::CaptureInit
            }
        } else if tt_move.is_some() && pos.is_legal(tt_move) {
            Stage::QSearchTT
        } else {
            Stage::QCaptureInit
        };

        Self {
            continuation_history: Self::cont_ptrs(continuation_history),
            stage,
            tt_move,
            refutations: [killers[0], killers[1], counter],
            probcut_threshold: Value::ZERO,
            depth,
            ply,
            skip_quiets: false,
            side_to_move: pos.side_to_move(),
            pawn_history_index: pos.pawn_history_index(),
            moves: ExtMoveBuffer::new(),
            cur: 0,
            end_cur: 0,
            end_bad_captures: 0,
            end_captures: 0,
            end_generated: 0,
            end_good_quiets: 0,
            refutation_idx: 0,
        }
    }

    /// 王手回避専用コンストラクタ
    pub fn new_evasions(
        pos: &Position,
        tt_move: Move,
        ply: i32,
        continuation_history: [&PieceToHistory; 6],
    ) -> Self {
        debug_assert!(pos.in_check());
        let stage = if tt_move.is_some() && pos.is_legal(tt_move) {
            Stage::EvasionTT
        } else {
            Stage::EvasionInit
        };

        Self {
            continuation_history: Self::cont_ptrs(continuation_history),
            stage,
            tt_move,
            refutations: [Move::NONE; 3],
            probcut_threshold: Value::ZERO,
            depth: DEPTH_QS,
            ply,
            skip_quiets: false,
            side_to_move: pos.side_to_move(),
            pawn_history_index: pos.pawn_history_index(),
            moves: ExtMoveBuffer::new(),
            cur: 0,
            end_cur: 0,
            end_bad_captures: 0,
            end_captures: 0,
            end_generated: 0,
            end_good_quiets: 0,
            refutation_idx: 0,
        }
    }

    /// ProbCut専用コンストラクタ
    pub fn new_probcut(pos: &Position, tt_move: Move, threshold: Value, ply: i32) -> Self {
        debug_assert!(!pos.in_check());
        let stage = if tt_move.is_some()
            && pos.is_capture(tt_move)
            && pos.is_legal(tt_move)
            && pos.see_ge(tt_move, threshold)
        {
            Stage::ProbCutTT
        } else {
            Stage::ProbCutInit
        };

        Self {
            continuation_history: [std::ptr::null(); 6],
            stage,
            tt_move,
            refutations: [Move::NONE; 3],
            probcut_threshold: threshold,
            depth: DEPTH_QS,
            ply,
            skip_quiets: false,
            side_to_move: pos.side_to_move(),
            pawn_history_index: pos.pawn_history_index(),
            moves: ExtMoveBuffer::new(),
            cur: 0,
            end_cur: 0,
            end_bad_captures: 0,
            end_captures: 0,
            end_generated: 0,
            end_good_quiets: 0,
            refutation_idx: 0,
        }
    }

    fn cont_ptrs(tables: [&PieceToHistory; 6]) -> [*const PieceToHistory; 6] {
        [
            tables[0] as *const _,
            tables[1] as *const _,
            tables[2] as *const _,
            tables[3] as *const _,
            tables[4] as *const _,
            tables[5] as *const _,
        ]
    }

    /// quiet手の生成をスキップ（move count pruning成立時）
    ///
    /// bad captures は残す（quietのみスキップ）。
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
        match self.stage {
            Stage::Refutation | Stage::QuietInit | Stage::GoodQuiet => {
                self.cur = 0;
                self.end_cur = self.end_bad_captures;
                self.stage = Stage::BadCapture;
            }
            _ => {}
        }
    }

    /// 現在のステージがquiet段階か
    #[inline]
    pub fn is_quiet_stage(&self) -> bool {
        matches!(
            self.stage,
            Stage::Refutation | Stage::QuietInit | Stage::GoodQuiet | Stage::BadQuiet
        )
    }

    /// 現在のステージを取得（デバッグ用）
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 次の指し手を返す（尽きたら `Move::NONE`）
    pub fn next_move(&mut self, pos: &Position, history: &HistoryTables) -> Move {
        loop {
            match self.stage {
                // ==============================
                // TT手を返す
                // ==============================
                Stage::MainTT => {
                    self.stage = Stage::CaptureInit;
                    return self.tt_move;
                }
                Stage::EvasionTT => {
                    self.stage = Stage::EvasionInit;
                    return self.tt_move;
                }
                Stage::QSearchTT => {
                    self.stage = Stage::QCaptureInit;
                    return self.tt_move;
                }
                Stage::ProbCutTT => {
                    self.stage = Stage::ProbCutInit;
                    return self.tt_move;
                }

                // ==============================
                // 捕獲手（+女王成り）の生成
                // ==============================
                Stage::CaptureInit | Stage::QCaptureInit | Stage::ProbCutInit => {
                    self.cur = 0;
                    self.end_bad_captures = 0;

                    let probcut = self.stage == Stage::ProbCutInit;
                    let mut count = 0;
                    for em in pos.legal_moves() {
                        let m = Move::from_engine(&em);
                        let target = if probcut {
                            pos.is_capture(m)
                        } else {
                            pos.capture_stage(m)
                        };
                        if target {
                            self.moves.set(count, ExtMove::new(m, 0));
                            count += 1;
                        }
                    }
                    self.moves.set_len(count);
                    self.end_cur = count;
                    self.end_captures = count;

                    self.score_captures(pos, history);
                    partial_insertion_sort(self.moves.as_mut_slice(), self.end_cur, i32::MIN);

                    self.stage = match self.stage {
                        Stage::CaptureInit => Stage::GoodCapture,
                        Stage::QCaptureInit => Stage::QCapture,
                        _ => Stage::ProbCut,
                    };
                }

                // ==============================
                // 良い捕獲手を返す
                // ==============================
                Stage::GoodCapture => {
                    if let Some(m) = self.select_good_capture(pos) {
                        return m;
                    }
                    if self.skip_quiets {
                        self.cur = 0;
                        self.end_cur = self.end_bad_captures;
                        self.stage = Stage::BadCapture;
                    } else {
                        self.refutation_idx = 0;
                        self.stage = Stage::Refutation;
                    }
                }

                // ==============================
                // 反駁手（killer×2 + counter）を返す
                // ==============================
                Stage::Refutation => {
                    while self.refutation_idx < 3 {
                        let m = self.refutations[self.refutation_idx];
                        self.refutation_idx += 1;

                        // killer同士/counterの重複とTT手をスキップ
                        if !m.is_some()
                            || m == self.tt_move
                            || self.refutations[..self.refutation_idx - 1].contains(&m)
                        {
                            continue;
                        }
                        if pos.is_capture(m) || !pos.is_legal(m) {
                            continue;
                        }
                        return m;
                    }
                    self.stage = Stage::QuietInit;
                }

                // ==============================
                // 静かな手の生成
                // ==============================
                Stage::QuietInit => {
                    if !self.skip_quiets {
                        let mut count = 0;
                        for em in pos.legal_moves() {
                            let m = Move::from_engine(&em);
                            if !pos.capture_stage(m) {
                                self.moves.set(self.end_captures + count, ExtMove::new(m, 0));
                                count += 1;
                            }
                        }
                        self.end_cur = self.end_captures + count;
                        self.end_generated = self.end_cur;
                        self.moves.set_len(self.end_cur);

                        self.cur = self.end_captures;
                        self.score_quiets(pos, history);

                        // 深さベースの閾値で部分ソート。浅いほど多くの手を
                        // ソートし、深いほど有望な手だけを先頭に集める。
                        let limit = -3560 * self.depth;
                        let quiet_count = self.end_cur - self.end_captures;
                        let good_count = partial_insertion_sort(
                            &mut self.moves.as_mut_slice()[self.end_captures..],
                            quiet_count,
                            limit,
                        );
                        self.end_good_quiets = self.end_captures + good_count;
                    } else {
                        self.end_good_quiets = self.end_captures;
                    }
                    self.stage = Stage::GoodQuiet;
                }

                // ==============================
                // 良い静かな手を返す
                // ==============================
                Stage::GoodQuiet => {
                    if !self.skip_quiets {
                        self.end_cur = self.end_good_quiets;
                        if let Some(m) = self.select_quiet(|v| v > GOOD_QUIET_THRESHOLD) {
                            return m;
                        }
                    }

                    // 悪い捕獲手の準備
                    self.cur = 0;
                    self.end_cur = self.end_bad_captures;
                    self.stage = Stage::BadCapture;
                }

                // ==============================
                // 悪い捕獲手を返す
                // ==============================
                Stage::BadCapture => {
                    if let Some(m) = self.select_simple() {
                        return m;
                    }
                    self.cur = self.end_captures;
                    self.end_cur = self.end_generated;
                    self.stage = Stage::BadQuiet;
                }

                // ==============================
                // 悪い静かな手を返す
                // ==============================
                Stage::BadQuiet => {
                    if !self.skip_quiets {
                        if let Some(m) = self.select_quiet(|v| v <= GOOD_QUIET_THRESHOLD) {
                            return m;
                        }
                    }
                    return Move::NONE;
                }

                // ==============================
                // 回避手
                // ==============================
                Stage::EvasionInit => {
                    let mut count = 0;
                    for em in pos.legal_moves() {
                        self.moves.set(count, ExtMove::new(Move::from_engine(&em), 0));
                        count += 1;
                    }
                    self.moves.set_len(count);
                    self.cur = 0;
                    self.end_cur = count;
                    self.end_generated = count;

                    self.score_evasions(pos, history);
                    partial_insertion_sort(self.moves.as_mut_slice(), self.end_cur, i32::MIN);

                    self.stage = Stage::Evasion;
                }

                Stage::Evasion => {
                    return self.select_simple().unwrap_or(Move::NONE);
                }

                // ==============================
                // 静止探索用捕獲手
                // ==============================
                Stage::QCapture => {
                    return self.select_simple().unwrap_or(Move::NONE);
                }

                // ==============================
                // ProbCut: SEEが閾値以上の捕獲のみ
                // ==============================
                Stage::ProbCut => {
                    let threshold = self.probcut_threshold;
                    return self.select_probcut(pos, threshold).unwrap_or(Move::NONE);
                }
            }
        }
    }

    // =========================================================================
    // スコアリング
    // =========================================================================

    #[inline]
    fn cont_history(&self, idx: usize) -> Option<&PieceToHistory> {
        let ptr = self.continuation_history[idx];
        if ptr.is_null() {
            None
        } else {
            // SAFETY: MovePickerのライフタイム中、ポインタは有効
            Some(unsafe { &*ptr })
        }
    }

    /// 捕獲手のスコア: MVV + CaptureHistory
    fn score_captures(&mut self, pos: &Position, history: &HistoryTables) {
        for i in self.cur..self.end_cur {
            let m = self.moves.get(i).mv;
            let captured = pos.captured_role(m);
            let pc = pos.moved_piece_index(m);

            let mut value = history.capture_history.get(pc, m.to(), captured) as i32;
            value += 7 * captured.map_or(0, piece_value);
            if m.is_promotion() && m.promotion_role() == Role::Queen {
                value += piece_value(Role::Queen);
            }
            self.moves.set_value(i, value);
        }
    }

    /// 静かな手のスコア: Butterfly×2 + Continuation(1,2,3,4,6手前) + Pawn×2 + LowPly
    fn score_quiets(&mut self, pos: &Position, history: &HistoryTables) {
        let us = self.side_to_move;
        let pawn_idx = self.pawn_history_index;

        for i in self.cur..self.end_cur {
            let m = self.moves.get(i).mv;
            let to = m.to();
            let pc = pos.moved_piece_index(m);

            let mut value = 2 * history.main_history.get(us, m) as i32;
            value += 2 * history.pawn_history.get(pawn_idx, pc, to) as i32;

            // 5手前（インデックス4）は統計的な寄与が低いので除外
            for idx in [0usize, 1, 2, 3, 5] {
                if let Some(ch) = self.cont_history(idx) {
                    value += ch.get(pc, to) as i32;
                }
            }

            if self.ply < LOW_PLY_HISTORY_SIZE as i32 {
                let ply_idx = self.ply as usize;
                value += 8 * history.low_ply_history.get(ply_idx, m) as i32 / (1 + self.ply);
            }

            self.moves.set_value(i, value);
        }
    }

    /// 回避手のスコア: 捕獲は駒価値優先、quietはHistory
    fn score_evasions(&mut self, pos: &Position, history: &HistoryTables) {
        let us = self.side_to_move;

        for i in self.cur..self.end_cur {
            let m = self.moves.get(i).mv;
            if pos.is_capture(m) {
                let captured = pos.captured_role(m);
                self.moves.set_value(i, captured.map_or(0, piece_value) + (1 << 28));
            } else {
                let pc = pos.moved_piece_index(m);
                let mut value = history.main_history.get(us, m) as i32;
                if let Some(ch) = self.cont_history(0) {
                    value += ch.get(pc, m.to()) as i32;
                }
                if self.ply < LOW_PLY_HISTORY_SIZE as i32 {
                    let ply_idx = self.ply as usize;
                    value += 2 * history.low_ply_history.get(ply_idx, m) as i32 / (1 + self.ply);
                }
                self.moves.set_value(i, value);
            }
        }
    }

    // =========================================================================
    // 選択ヘルパー
    // =========================================================================

    /// 良い捕獲手を選択（SEE ≥ -value/18、失敗は後回し）
    fn select_good_capture(&mut self, pos: &Position) -> Option<Move> {
        while self.cur < self.end_cur {
            let ext = self.moves.get(self.cur);
            self.cur += 1;

            if ext.mv == self.tt_move {
                continue;
            }

            let threshold = Value::new(-ext.value / 18);
            if pos.see_ge(ext.mv, threshold) {
                return Some(ext.mv);
            }
            // 悪い捕獲手は後回し
            self.moves.swap(self.end_bad_captures, self.cur - 1);
            self.end_bad_captures += 1;
        }
        None
    }

    /// quiet手を述語付きで選択（TT手・反駁手はスキップ）
    fn select_quiet(&mut self, pred: impl Fn(i32) -> bool) -> Option<Move> {
        while self.cur < self.end_cur {
            let ext = self.moves.get(self.cur);
            self.cur += 1;

            if ext.mv == self.tt_move || self.refutations.contains(&ext.mv) {
                continue;
            }
            if pred(ext.value) {
                return Some(ext.mv);
            }
        }
        None
    }

    /// TT手スキップのみの選択
    fn select_simple(&mut self) -> Option<Move> {
        while self.cur < self.end_cur {
            let ext = self.moves.get(self.cur);
            self.cur += 1;
            if ext.mv == self.tt_move {
                continue;
            }
            return Some(ext.mv);
        }
        None
    }

    /// ProbCut用の選択（SEE閾値チェック）
    fn select_probcut(&mut self, pos: &Position, threshold: Value) -> Option<Move> {
        while self.cur < self.end_cur {
            let ext = self.moves.get(self.cur);
            self.cur += 1;
            if ext.mv == self.tt_move {
                continue;
            }
            if pos.see_ge(ext.mv, threshold) {
                return Some(ext.mv);
            }
        }
        None
    }
}

/// GoodQuiet/BadQuietの境界スコア
const GOOD_QUIET_THRESHOLD: i32 = -14000;

// =============================================================================
// ユーティリティ
// =============================================================================

/// 挿入ソートからunstable sortへ切り替えるしきい値
const SORT_SWITCH_THRESHOLD: usize = 16;

/// 部分ソート
///
/// `limit` 以上のスコアの手を先頭に集めて降順にソートし、その数を返す。
/// `limit == i32::MIN` なら全要素をソートして `end` を返す。
pub(super) fn partial_insertion_sort(moves: &mut [ExtMove], end: usize, limit: i32) -> usize {
    if end == 0 {
        return 0;
    }
    if end == 1 {
        return if moves[0].value >= limit { 1 } else { 0 };
    }

    let slice = &mut moves[..end];

    if limit == i32::MIN {
        sort_desc(slice);
        return end;
    }

    // 閾値以上の手を先頭に集める（O(n)）
    let mut good_count = 0;
    for i in 0..end {
        if slice[i].value >= limit {
            slice.swap(i, good_count);
            good_count += 1;
        }
    }
    if good_count == 0 {
        return 0;
    }

    sort_desc(&mut slice[..good_count]);
    good_count
}

fn sort_desc(slice: &mut [ExtMove]) {
    if slice.len() > SORT_SWITCH_THRESHOLD {
        slice.sort_unstable_by(|a, b| b.value.cmp(&a.value));
    } else {
        for i in 1..slice.len() {
            let tmp = slice[i];
            let mut j = i;
            while j > 0 && slice[j - 1].value < tmp.value {
                slice[j] = slice[j - 1];
                j -= 1;
            }
            slice[j] = tmp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::history::HistoryCell;
    use shakmaty::Square;

    fn sentinel_tables(cell: &HistoryCell) -> [&PieceToHistory; 6] {
        cell.with_read(|h| {
            let t = h.continuation_history[0][0].get_table(0, Square::A1);
            // SAFETY: テスト内でcellより長生きしない参照として使う
            let t: &'static PieceToHistory = unsafe { std::mem::transmute(t) };
            [t; 6]
        })
    }

    #[test]
    fn test_picker_yields_all_legal_moves_once() {
        let pos = Position::startpos();
        let cell = HistoryCell::new_boxed();
        let tables = sentinel_tables(&cell);

        let mut mp = MovePicker::new(&pos, Move::NONE, 4, 0, [Move::NONE; 2], Move::NONE, tables);
        let mut seen = Vec::new();
        loop {
            let m = cell.with_read(|h| mp.next_move(&pos, h));
            if m == Move::NONE {
                break;
            }
            assert!(!seen.contains(&m), "duplicate move {m:?}");
            seen.push(m);
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_picker_tt_move_first() {
        let pos = Position::startpos();
        let cell = HistoryCell::new_boxed();
        let tables = sentinel_tables(&cell);
        let tt_move = pos.parse_uci_move("e2e4").unwrap();

        let mut mp = MovePicker::new(&pos, tt_move, 4, 0, [Move::NONE; 2], Move::NONE, tables);
        let first = cell.with_read(|h| mp.next_move(&pos, h));
        assert_eq!(first, tt_move);

        // TT手は再度返らない
        let mut rest = Vec::new();
        loop {
            let m = cell.with_read(|h| mp.next_move(&pos, h));
            if m == Move::NONE {
                break;
            }
            rest.push(m);
        }
        assert!(!rest.contains(&tt_move));
        assert_eq!(rest.len(), 19);
    }

    #[test]
    fn test_picker_killer_before_quiets() {
        let pos = Position::startpos();
        let cell = HistoryCell::new_boxed();
        let tables = sentinel_tables(&cell);
        let killer = pos.parse_uci_move("g1f3").unwrap();

        let mut mp =
            MovePicker::new(&pos, Move::NONE, 4, 0, [killer, Move::NONE], Move::NONE, tables);
        // 初期局面に捕獲はないので、killerが最初に返る
        let first = cell.with_read(|h| mp.next_move(&pos, h));
        assert_eq!(first, killer);
    }

    #[test]
    fn test_picker_good_captures_before_quiets() {
        // d5の歩をe4の歩とf3のナイトで取れる局面
        let pos = Position::from_fen(
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 2",
            false,
        )
        .unwrap();
        let cell = HistoryCell::new_boxed();
        let tables = sentinel_tables(&cell);

        let mut mp = MovePicker::new(&pos, Move::NONE, 4, 0, [Move::NONE; 2], Move::NONE, tables);
        let first = cell.with_read(|h| mp.next_move(&pos, h));
        assert!(pos.is_capture(first), "first move should be a capture, got {first:?}");
    }

    #[test]
    fn test_picker_skip_quiets() {
        let pos = Position::startpos();
        let cell = HistoryCell::new_boxed();
        let tables = sentinel_tables(&cell);

        let mut mp = MovePicker::new(&pos, Move::NONE, 4, 0, [Move::NONE; 2], Move::NONE, tables);
        mp.skip_quiets();
        let m = cell.with_read(|h| mp.next_move(&pos, h));
        // 初期局面は捕獲なし → 即座に尽きる
        assert_eq!(m, Move::NONE);
    }

    #[test]
    fn test_evasion_picker_in_check() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/r3K3 w - - 0 1", false).unwrap();
        assert!(pos.in_check());
        let cell = HistoryCell::new_boxed();
        let tables = sentinel_tables(&cell);

        let mut mp = MovePicker::new_evasions(&pos, Move::NONE, 0, tables);
        let mut count = 0;
        loop {
            let m = cell.with_read(|h| mp.next_move(&pos, h));
            if m == Move::NONE {
                break;
            }
            count += 1;
        }
        assert_eq!(count as usize, pos.legal_moves().len());
    }

    #[test]
    fn test_partial_insertion_sort_threshold() {
        let mut moves = vec![
            ExtMove::new(Move::NONE, 100),
            ExtMove::new(Move::NONE, -200),
            ExtMove::new(Move::NONE, 50),
            ExtMove::new(Move::NONE, 200),
            ExtMove::new(Move::NONE, -100),
        ];
        let len = moves.len();
        let good = partial_insertion_sort(&mut moves, len, 0);
        assert_eq!(good, 3);
        assert_eq!(moves[0].value, 200);
        assert_eq!(moves[1].value, 100);
        assert_eq!(moves[2].value, 50);
    }

    #[test]
    fn test_partial_insertion_sort_full() {
        let mut moves = vec![
            ExtMove::new(Move::NONE, 50),
            ExtMove::new(Move::NONE, -100),
            ExtMove::new(Move::NONE, 200),
        ];
        let len = moves.len();
        let good = partial_insertion_sort(&mut moves, len, i32::MIN);
        assert_eq!(good, 3);
        assert_eq!(moves[0].value, 200);
        assert_eq!(moves[2].value, -100);
    }
}
