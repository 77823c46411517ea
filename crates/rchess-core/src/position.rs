//! 局面（Position）
//!
//! ルールエンジン（shakmaty）のラッパー。合法手生成・FEN・Zobristは
//! shakmaty に委譲し、探索側が必要とする操作をここで付け足す：
//!
//! - do/undo スタック（copy-make方式）と null move
//! - 16bitコンパクト指し手との相互変換・合法性検証
//! - SEE（静的交換評価）
//! - 補助キー（pawn/minor/non-pawn）と千日手検出
//! - `key_after` による置換表プリフェッチ用の投機的ハッシュ
//! - perft

use anyhow::{anyhow, Result};
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{
    attacks, Bitboard, CastlingMode, CastlingSide, Chess, Color, EnPassantMode, FromSetup,
    Move as EngineMove, MoveList, Position as RulesPosition, Role, Square,
};

use crate::types::{Move, MoveKind, Value};

/// SEE・MVVで使う駒価値
#[inline]
pub const fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 126,
        Role::Knight => 781,
        Role::Bishop => 825,
        Role::Rook => 1276,
        Role::Queen => 2538,
        Role::King => 0,
    }
}

/// 駒種のインデックス（0..6）
#[inline]
pub const fn role_index(role: Role) -> usize {
    match role {
        Role::Pawn => 0,
        Role::Knight => 1,
        Role::Bishop => 2,
        Role::Rook => 3,
        Role::Queen => 4,
        Role::King => 5,
    }
}

/// 色付き駒のインデックス（0..16、歯抜けあり）
#[inline]
pub fn piece_index(color: Color, role: Role) -> usize {
    (color as usize) * 8 + role_index(role)
}

/// 色付き駒インデックスの総数
pub const PIECE_INDEX_NB: usize = 16;

/// undo用の状態レコード
struct StateRecord {
    inner: Chess,
    key: u64,
    captured: Option<Role>,
}

/// 探索用の局面
///
/// 1ワーカーにつき1インスタンス（Cloneで複製）。do/undoの状態は
/// 内部スタックに積むため、探索再帰から `&mut` 1本で扱える。
pub struct Position {
    inner: Chess,
    mode: CastlingMode,
    key: u64,
    states: Vec<StateRecord>,
    /// ゲーム開始（position コマンド適用後の初期局面）からのキー列。
    /// 末尾が現局面のキー。千日手判定に使う。
    key_history: Vec<u64>,
    /// ゲーム開始からの手数（position コマンドのFENに由来するオフセット込み）
    base_ply: i32,
}

impl Clone for Position {
    fn clone(&self) -> Self {
        // undoスタックは探索ローカルなので複製しない
        Self {
            inner: self.inner.clone(),
            mode: self.mode,
            key: self.key,
            states: Vec::with_capacity(crate::types::MAX_PLY as usize + 8),
            key_history: self.key_history.clone(),
            base_ply: self.base_ply,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Position {
    /// 平手初期局面
    pub fn startpos() -> Self {
        let inner = Chess::default();
        let mut pos = Self {
            key: 0,
            inner,
            mode: CastlingMode::Standard,
            states: Vec::with_capacity(crate::types::MAX_PLY as usize + 8),
            key_history: Vec::with_capacity(256),
            base_ply: 0,
        };
        pos.key = pos.compute_key();
        pos.key_history.push(pos.key);
        pos
    }

    /// FENから局面を構築
    pub fn from_fen(fen: &str, chess960: bool) -> Result<Self> {
        let mode = if chess960 {
            CastlingMode::Chess960
        } else {
            CastlingMode::Standard
        };
        let parsed: shakmaty::fen::Fen =
            fen.parse().map_err(|e| anyhow!("invalid FEN '{fen}': {e}"))?;
        let inner: Chess = parsed
            .into_position(mode)
            .map_err(|e| anyhow!("illegal position '{fen}': {e}"))?;
        let base_ply = {
            let fullmoves = inner.fullmoves().get() as i32;
            let stm_offset = if inner.turn() == Color::Black { 1 } else { 0 };
            (fullmoves - 1) * 2 + stm_offset
        };
        let mut pos = Self {
            key: 0,
            inner,
            mode,
            states: Vec::with_capacity(crate::types::MAX_PLY as usize + 8),
            key_history: Vec::with_capacity(256),
            base_ply,
        };
        pos.key = pos.compute_key();
        pos.key_history.push(pos.key);
        Ok(pos)
    }

    #[inline]
    fn compute_key(&self) -> u64 {
        let Zobrist64(k) = self.inner.zobrist_hash(EnPassantMode::Legal);
        k
    }

    /// Zobristキー
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// 指し手実行後のZobristキー（置換表プリフェッチ用）
    pub fn key_after(&self, m: Move) -> u64 {
        match self.to_engine_move(m) {
            Some(em) => {
                let mut next = self.inner.clone();
                next.play_unchecked(&em);
                let Zobrist64(k) = next.zobrist_hash(EnPassantMode::Legal);
                k
            }
            None => self.key,
        }
    }

    /// 手番
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.inner.turn()
    }

    /// 王手がかかっているか
    #[inline]
    pub fn in_check(&self) -> bool {
        self.inner.is_check()
    }

    /// 50手ルールカウンタ
    #[inline]
    pub fn rule50_count(&self) -> i32 {
        self.inner.halfmoves() as i32
    }

    /// ゲーム開始からの手数
    #[inline]
    pub fn game_ply(&self) -> i32 {
        self.base_ply + self.states.len() as i32
    }

    /// Chess960モードか
    #[inline]
    pub fn is_chess960(&self) -> bool {
        self.mode == CastlingMode::Chess960
    }

    /// 内部のルールエンジン局面
    #[inline]
    pub fn rules(&self) -> &Chess {
        &self.inner
    }

    // =========================================================================
    // 指し手の変換と述語
    // =========================================================================

    /// コンパクト指し手をエンジン形式へ復元（盤面から駒種を引き直す）
    ///
    /// 置換表のレースで壊れた指し手はここで `None` になる。
    pub fn to_engine_move(&self, m: Move) -> Option<EngineMove> {
        if !m.is_some() {
            return None;
        }
        let board = self.inner.board();
        let from = m.from();
        let to = m.to();
        let em = match m.kind() {
            MoveKind::Castling => EngineMove::Castle {
                king: from,
                rook: to,
            },
            MoveKind::EnPassant => EngineMove::EnPassant { from, to },
            MoveKind::Promotion => EngineMove::Normal {
                role: Role::Pawn,
                from,
                capture: board.role_at(to),
                to,
                promotion: Some(m.promotion_role()),
            },
            MoveKind::Normal => EngineMove::Normal {
                role: board.role_at(from)?,
                from,
                capture: board.role_at(to),
                to,
                promotion: None,
            },
        };
        Some(em)
    }

    /// コンパクト指し手の合法性検証
    ///
    /// TT手・Book手など外部由来の指し手に対してのみ呼ぶ。MovePickerが
    /// 生成した手は構成上合法。
    pub fn is_legal(&self, m: Move) -> bool {
        match self.to_engine_move(m) {
            Some(em) => self.inner.legal_moves().contains(&em),
            None => false,
        }
    }

    /// 置換表から読んだ指し手の検証付き変換
    pub fn validate_tt_move(&self, m: Move) -> Move {
        if m.is_some() && self.is_legal(m) {
            m
        } else {
            Move::NONE
        }
    }

    /// 駒を取る手か
    #[inline]
    pub fn is_capture(&self, m: Move) -> bool {
        match m.kind() {
            MoveKind::EnPassant => true,
            MoveKind::Castling => false,
            _ => m.is_some() && self.inner.board().occupied().contains(m.to()),
        }
    }

    /// 捕獲または女王成り（静止探索の対象）か
    #[inline]
    pub fn capture_stage(&self, m: Move) -> bool {
        self.is_capture(m) || (m.is_promotion() && m.promotion_role() == Role::Queen)
    }

    /// 取られる駒（アンパッサンは歩）
    #[inline]
    pub fn captured_role(&self, m: Move) -> Option<Role> {
        match m.kind() {
            MoveKind::EnPassant => Some(Role::Pawn),
            MoveKind::Castling => None,
            _ => self.inner.board().role_at(m.to()),
        }
    }

    /// 動かす駒（盤面から引く、do_move前に呼ぶ）
    #[inline]
    pub fn moved_role(&self, m: Move) -> Option<Role> {
        self.inner.board().role_at(m.from())
    }

    /// 動かす駒のインデックス（成りは成り後の駒で数える、do_move前に呼ぶ）
    pub fn moved_piece_index(&self, m: Move) -> usize {
        let color = self.side_to_move();
        let role = if m.is_promotion() {
            m.promotion_role()
        } else {
            self.moved_role(m).unwrap_or(Role::Pawn)
        };
        piece_index(color, role)
    }

    /// 指し手が王手になるか
    pub fn gives_check(&self, m: Move) -> bool {
        match self.to_engine_move(m) {
            Some(em) => {
                let mut next = self.inner.clone();
                next.play_unchecked(&em);
                next.is_check()
            }
            None => false,
        }
    }

    /// 直前に取られた駒（undoスタック先頭の記録）
    #[inline]
    pub fn captured_piece(&self) -> Option<Role> {
        self.states.last().and_then(|st| st.captured)
    }

    // =========================================================================
    // do/undo
    // =========================================================================

    /// 指し手を実行
    ///
    /// 呼び出し側は合法な指し手のみ渡すこと（MovePicker経由、または
    /// `is_legal` 検証済み）。
    pub fn do_move(&mut self, m: Move) {
        debug_assert!(m.is_some());
        let captured = self.captured_role(m);
        let em = match self.to_engine_move(m) {
            Some(em) => em,
            None => {
                debug_assert!(false, "do_move called with unconvertible move");
                return;
            }
        };
        self.states.push(StateRecord {
            inner: self.inner.clone(),
            key: self.key,
            captured,
        });
        self.inner.play_unchecked(&em);
        self.key = self.compute_key();
        self.key_history.push(self.key);
    }

    /// 指し手を実行しつつ、次局面の置換表クラスタをプリフェッチ
    pub fn do_move_with_prefetch(&mut self, m: Move, tt: &crate::tt::TranspositionTable) {
        self.do_move(m);
        tt.prefetch(self.key);
    }

    /// 指し手を戻す
    pub fn undo_move(&mut self, _m: Move) {
        if let Some(st) = self.states.pop() {
            self.inner = st.inner;
            self.key = st.key;
            self.key_history.pop();
        } else {
            debug_assert!(false, "undo_move without matching do_move");
        }
    }

    /// Null move（手番だけ渡す）
    ///
    /// 王手がかかっていないときのみ呼べる。
    pub fn do_null_move(&mut self) {
        debug_assert!(!self.in_check());
        self.states.push(StateRecord {
            inner: self.inner.clone(),
            key: self.key,
            captured: None,
        });
        let mut setup = self.inner.clone().into_setup(EnPassantMode::Legal);
        setup.turn = !setup.turn;
        setup.ep_square = None;
        setup.halfmoves = setup.halfmoves.saturating_add(1);
        if let Ok(next) = Chess::from_setup(setup, self.mode) {
            self.inner = next;
        }
        self.key = self.compute_key();
        self.key_history.push(self.key);
    }

    /// Null move を戻す
    pub fn undo_null_move(&mut self) {
        if let Some(st) = self.states.pop() {
            self.inner = st.inner;
            self.key = st.key;
            self.key_history.pop();
        }
    }

    /// Null move 込みでプリフェッチ
    pub fn do_null_move_with_prefetch(&mut self, tt: &crate::tt::TranspositionTable) {
        self.do_null_move();
        tt.prefetch(self.key);
    }

    // =========================================================================
    // 生成
    // =========================================================================

    /// 全合法手
    #[inline]
    pub fn legal_moves(&self) -> MoveList {
        self.inner.legal_moves()
    }

    /// 合法な捕獲手
    #[inline]
    pub fn capture_moves(&self) -> MoveList {
        self.inner.capture_moves()
    }

    /// 合法手が存在しないか
    pub fn no_legal_moves(&self) -> bool {
        self.inner.legal_moves().is_empty()
    }

    // =========================================================================
    // 引き分け・循環
    // =========================================================================

    /// 千日手（同一局面の繰り返し）か
    ///
    /// 探索木内（直近 `ply` 手以内）での再現は2回目で引き分け扱い、
    /// それ以前のゲーム履歴に対しては3回目で引き分け扱い。
    pub fn is_repetition(&self, ply: i32) -> bool {
        let end = self.key_history.len();
        if end < 5 {
            return false;
        }
        let span = (self.rule50_count() as usize).min(end - 1);
        let mut count = 0;
        let mut back = 4usize;
        while back <= span {
            let idx = end - 1 - back;
            if self.key_history[idx] == self.key {
                if back <= ply as usize {
                    return true;
                }
                count += 1;
                if count >= 2 {
                    return true;
                }
            }
            back += 2;
        }
        false
    }

    /// 引き分けか（50手ルール・駒不足・千日手）
    pub fn is_draw(&self, ply: i32) -> bool {
        if self.rule50_count() >= 100 && (!self.in_check() || !self.no_legal_moves()) {
            return true;
        }
        if self.inner.is_insufficient_material() {
            return true;
        }
        self.is_repetition(ply)
    }

    /// 直近の可逆手の範囲に同一局面が現れているか
    ///
    /// 相手側に循環へ戻る代替手があった可能性の安価な近似。
    /// αを引き分け付近へクランプする判定に使う。
    pub fn has_game_cycle(&self, _ply: i32) -> bool {
        let end = self.key_history.len();
        if end < 5 {
            return false;
        }
        let span = (self.rule50_count() as usize).min(end - 1);
        let mut back = 4usize;
        while back <= span {
            if self.key_history[end - 1 - back] == self.key {
                return true;
            }
            back += 2;
        }
        false
    }

    // =========================================================================
    // マテリアル
    // =========================================================================

    /// 駒数（両軍合計）
    #[inline]
    pub fn piece_count(&self) -> i32 {
        self.inner.board().occupied().count() as i32
    }

    /// 指定色・駒種の数
    #[inline]
    pub fn count(&self, color: Color, role: Role) -> i32 {
        (self.inner.board().by_color(color) & self.inner.board().by_role(role)).count() as i32
    }

    /// 歩以外のマテリアル合計（指定色）
    pub fn non_pawn_material(&self, color: Color) -> i32 {
        let board = self.inner.board();
        let mine = board.by_color(color);
        [Role::Knight, Role::Bishop, Role::Rook, Role::Queen]
            .iter()
            .map(|&r| (mine & board.by_role(r)).count() as i32 * piece_value(r))
            .sum()
    }

    /// 歩以外のマテリアル合計（両軍）
    #[inline]
    pub fn non_pawn_material_total(&self) -> i32 {
        self.non_pawn_material(Color::White) + self.non_pawn_material(Color::Black)
    }

    /// キャスリング権が残っているか
    pub fn has_castling_rights(&self, color: Color) -> bool {
        let castles = self.inner.castles();
        castles.has(color, CastlingSide::KingSide) || castles.has(color, CastlingSide::QueenSide)
    }

    // =========================================================================
    // 補助キー
    // =========================================================================

    /// 歩の陣形キー
    pub fn pawn_key(&self) -> u64 {
        let board = self.inner.board();
        let pawns = board.by_role(Role::Pawn);
        mix_keys(
            (pawns & board.by_color(Color::White)).0,
            (pawns & board.by_color(Color::Black)).0,
        )
    }

    /// マイナーピース（N/B + K）の配置キー
    pub fn minor_piece_key(&self) -> u64 {
        let board = self.inner.board();
        let minors =
            board.by_role(Role::Knight) | board.by_role(Role::Bishop) | board.by_role(Role::King);
        mix_keys(
            (minors & board.by_color(Color::White)).0,
            (minors & board.by_color(Color::Black)).0,
        )
    }

    /// 指定色の歩以外の配置キー
    pub fn non_pawn_key(&self, color: Color) -> u64 {
        let board = self.inner.board();
        let pieces = board.by_color(color) & !board.by_role(Role::Pawn);
        mix_keys(pieces.0, color as u64 + 1)
    }

    /// PawnHistory用のインデックス
    #[inline]
    pub fn pawn_history_index(&self) -> usize {
        (self.pawn_key() as usize) & (crate::search::PAWN_HISTORY_SIZE - 1)
    }

    // =========================================================================
    // SEE
    // =========================================================================

    /// 静的交換評価が閾値以上か（swapアルゴリズム）
    ///
    /// 通常手以外（成り・アンパッサン・キャスリング）は0と見なす。
    pub fn see_ge(&self, m: Move, threshold: Value) -> bool {
        if m.kind() != MoveKind::Normal {
            return Value::ZERO >= threshold;
        }

        let board = self.inner.board();
        let from = m.from();
        let to = m.to();

        let mut swap = board.role_at(to).map_or(0, piece_value) - threshold.raw();
        if swap < 0 {
            return false;
        }

        let attacker = match board.role_at(from) {
            Some(r) => r,
            None => return false,
        };
        swap = piece_value(attacker) - swap;
        if swap <= 0 {
            return true;
        }

        let mut occupied = board.occupied() ^ Bitboard::from(from) | Bitboard::from(to);
        let mut stm = self.side_to_move();
        let mut attackers = board.attacks_to(to, Color::White, occupied)
            | board.attacks_to(to, Color::Black, occupied);
        let mut res = true;

        let diag_sliders = board.by_role(Role::Bishop) | board.by_role(Role::Queen);
        let line_sliders = board.by_role(Role::Rook) | board.by_role(Role::Queen);

        loop {
            stm = !stm;
            attackers &= occupied;

            let stm_attackers = attackers & board.by_color(stm);
            if stm_attackers.is_empty() {
                break;
            }
            // ピン考慮はルールエンジン側の合法性に任せ、ここでは無視する

            res = !res;

            // 最も安い攻撃駒で取り返す
            let mut picked = None;
            for role in [
                Role::Pawn,
                Role::Knight,
                Role::Bishop,
                Role::Rook,
                Role::Queen,
                Role::King,
            ] {
                let candidates = stm_attackers & board.by_role(role);
                if let Some(sq) = candidates.first() {
                    picked = Some((role, sq));
                    break;
                }
            }
            let (role, sq) = match picked {
                Some(p) => p,
                None => break,
            };

            swap = piece_value(role) - swap;
            if swap < if res { 1 } else { 0 } {
                // キングで取り返した直後に相手の攻撃駒が残っているなら違法
                if role == Role::King && !(attackers & board.by_color(!stm) & occupied).is_empty()
                {
                    res = !res;
                }
                break;
            }

            occupied ^= Bitboard::from(sq);

            // X線の攻撃駒を追加
            match role {
                Role::Pawn | Role::Bishop => {
                    attackers |= attacks::bishop_attacks(to, occupied) & diag_sliders;
                }
                Role::Rook => {
                    attackers |= attacks::rook_attacks(to, occupied) & line_sliders;
                }
                Role::Queen => {
                    attackers |= (attacks::bishop_attacks(to, occupied) & diag_sliders)
                        | (attacks::rook_attacks(to, occupied) & line_sliders);
                }
                _ => {}
            }
        }

        res
    }

    // =========================================================================
    // UCI座標
    // =========================================================================

    /// コンパクト指し手をUCI座標文字列へ
    pub fn move_to_uci(m: Move, chess960: bool) -> String {
        if !m.is_some() {
            return "0000".to_string();
        }
        let from = m.from();
        let mut to = m.to();
        if m.is_castling() && !chess960 {
            // 通常ルールではキングの移動先で表記する
            let side = if (to.file() as u32) > (from.file() as u32) {
                CastlingSide::KingSide
            } else {
                CastlingSide::QueenSide
            };
            let color = if (from.rank() as u32) == 0 {
                Color::White
            } else {
                Color::Black
            };
            to = side.king_to(color);
        }
        let mut s = format!("{from}{to}");
        if m.is_promotion() {
            s.push(match m.promotion_role() {
                Role::Knight => 'n',
                Role::Bishop => 'b',
                Role::Rook => 'r',
                _ => 'q',
            });
        }
        s
    }

    /// UCI座標文字列から合法な指し手を引く
    pub fn parse_uci_move(&self, s: &str) -> Option<Move> {
        for em in self.inner.legal_moves() {
            let m = Move::from_engine(&em);
            if Self::move_to_uci(m, self.is_chess960()) == s {
                return Some(m);
            }
            // キャスリングは king→rook 形式の入力も受け付ける
            if m.is_castling() && Self::move_to_uci(m, true) == s {
                return Some(m);
            }
        }
        None
    }

    /// UCI座標の指し手を適用（positionコマンド用）
    pub fn do_uci_move(&mut self, s: &str) -> Result<()> {
        match self.parse_uci_move(s) {
            Some(m) => {
                self.do_move(m);
                // ゲーム履歴の一部になるのでundoスタックからは外す
                self.states.pop();
                self.base_ply += 1;
                Ok(())
            }
            None => Err(anyhow!("illegal move '{s}'")),
        }
    }

    // =========================================================================
    // perft
    // =========================================================================

    /// perft（合法手数の再帰数え上げ）
    ///
    /// 探索・評価・置換表とは独立で、スレッド数にもよらず決定的。
    pub fn perft(&self, depth: u32) -> u64 {
        perft_inner(&self.inner, depth)
    }
}

fn perft_inner(pos: &Chess, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = pos.legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for m in &moves {
        let mut next = pos.clone();
        next.play_unchecked(m);
        nodes += perft_inner(&next, depth - 1);
    }
    nodes
}

/// ビットボード2枚から64bitキーを合成（splitmix64系のミキサ）
#[inline]
fn mix_keys(a: u64, b: u64) -> u64 {
    let mut x = a ^ b.rotate_left(32) ^ 0x9E37_79B9_7F4A_7C15;
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_basics() {
        let pos = Position::startpos();
        assert_eq!(pos.side_to_move(), Color::White);
        assert!(!pos.in_check());
        assert_eq!(pos.rule50_count(), 0);
        assert_eq!(pos.legal_moves().len(), 20);
        assert_eq!(pos.piece_count(), 32);
    }

    #[test]
    fn test_do_undo_restores_key() {
        let mut pos = Position::startpos();
        let key = pos.key();
        let m = pos.parse_uci_move("e2e4").unwrap();
        pos.do_move(m);
        assert_ne!(pos.key(), key);
        pos.undo_move(m);
        assert_eq!(pos.key(), key);
    }

    #[test]
    fn test_null_move_flips_turn() {
        let mut pos = Position::startpos();
        let key = pos.key();
        pos.do_null_move();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_ne!(pos.key(), key);
        pos.undo_null_move();
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.key(), key);
    }

    #[test]
    fn test_move_uci_roundtrip() {
        let pos = Position::startpos();
        for uci in ["e2e4", "g1f3", "b1c3"] {
            let m = pos.parse_uci_move(uci).unwrap();
            assert_eq!(Position::move_to_uci(m, false), uci);
        }
        assert!(pos.parse_uci_move("e2e5").is_none());
    }

    #[test]
    fn test_castling_uci_rendering() {
        let mut pos = Position::startpos();
        for uci in ["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"] {
            pos.do_uci_move(uci).unwrap();
        }
        let castle = pos.parse_uci_move("e1g1").unwrap();
        assert!(castle.is_castling());
        assert_eq!(Position::move_to_uci(castle, false), "e1g1");
        assert_eq!(Position::move_to_uci(castle, true), "e1h1");
    }

    #[test]
    fn test_is_capture_and_capture_stage() {
        let pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2", false)
                .unwrap();
        let capture = pos.parse_uci_move("e4d5").unwrap();
        assert!(pos.is_capture(capture));
        assert!(pos.capture_stage(capture));
        let quiet = pos.parse_uci_move("e4e5").unwrap();
        assert!(!pos.is_capture(quiet));
    }

    #[test]
    fn test_see_simple_exchange() {
        // 歩で守られたマスへクイーンで取りに行くのは損
        let pos = Position::from_fen("4k3/8/2p5/3p4/8/8/3Q4/4K3 w - - 0 1", false).unwrap();
        let qxd5 = pos.parse_uci_move("d2d5").unwrap();
        assert!(pos.see_ge(qxd5, Value::new(piece_value(Role::Pawn) - piece_value(Role::Queen))));
        assert!(!pos.see_ge(qxd5, Value::ZERO));
    }

    #[test]
    fn test_see_free_pawn() {
        let pos = Position::from_fen("4k3/8/8/3p4/8/8/3R4/4K3 w - - 0 1", false).unwrap();
        let rxd5 = pos.parse_uci_move("d2d5").unwrap();
        assert!(pos.see_ge(rxd5, Value::new(piece_value(Role::Pawn))));
    }

    #[test]
    fn test_repetition_detection() {
        let mut pos = Position::startpos();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            pos.do_uci_move(uci).unwrap();
        }
        // 初期局面が3回目
        assert!(pos.is_repetition(0));
        assert!(pos.is_draw(0));
    }

    #[test]
    fn test_gives_check() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1", false).unwrap();
        let check = pos.parse_uci_move("a1a8").unwrap();
        assert!(pos.gives_check(check));
        let quiet = pos.parse_uci_move("a1a2").unwrap();
        assert!(!pos.gives_check(quiet));
    }

    #[test]
    fn test_stalemate_position_has_no_moves() {
        let pos = Position::from_fen("8/8/8/8/8/3k4/3p4/3K4 w - - 0 1", false).unwrap();
        assert!(pos.no_legal_moves());
        assert!(!pos.in_check());
    }

    #[test]
    fn test_perft_shallow() {
        let pos = Position::startpos();
        assert_eq!(pos.perft(1), 20);
        assert_eq!(pos.perft(2), 400);
        assert_eq!(pos.perft(3), 8902);
        assert_eq!(pos.perft(4), 197_281);
    }

    #[test]
    fn test_perft_kiwipete() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            false,
        )
        .unwrap();
        assert_eq!(pos.perft(1), 48);
        assert_eq!(pos.perft(2), 2039);
        assert_eq!(pos.perft(3), 97_862);
    }

    #[test]
    fn test_aux_keys_change_with_pawn_structure() {
        let mut pos = Position::startpos();
        let pk = pos.pawn_key();
        let m = pos.parse_uci_move("e2e4").unwrap();
        pos.do_move(m);
        assert_ne!(pos.pawn_key(), pk);

        let mut pos2 = Position::startpos();
        let mk = pos2.minor_piece_key();
        let n = pos2.parse_uci_move("g1f3").unwrap();
        pos2.do_move(n);
        assert_ne!(pos2.minor_piece_key(), mk);
        // ナイトの移動で歩キーは変わらない
        assert_eq!(pos2.pawn_key(), pk);
    }
}
