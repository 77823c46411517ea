//! Engine state behind the UCI frontend
//!
//! Owns the transposition table, the search pool, the networks, optional
//! tablebases/book, and the current position. Option setting validates
//! values and keeps the previous value on error.

use anyhow::{anyhow, bail, Result};
use rchess_core::book::OpeningBook;
use rchess_core::eval::{EvalOptions, Networks, Style};
use rchess_core::position::Position;
use rchess_core::search::{
    InfoSink, LimitsType, SearchInfo, SearchPool, SearchResult, ThinkOptions,
};
use rchess_core::tb::SyzygyTablebases;
use rchess_core::tt::TranspositionTable;
use rchess_core::types::Move;

use crate::uci::output::{format_info, send_response, UciResponse};

/// Typed option storage
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub multi_pv: usize,
    pub ponder: bool,
    pub chess960: bool,
    pub move_overhead: i64,
    pub skill_level: i32,
    pub limit_strength: bool,
    pub uci_elo: i32,
    pub style: Style,
    pub dynamic_strategy: bool,
    pub materialistic: i32,
    pub positional: i32,
    pub syzygy_path: String,
    pub syzygy_probe_depth: i32,
    pub syzygy_50_move_rule: bool,
    pub book_file: String,
    pub eval_file: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            hash_mb: 16,
            threads: 1,
            multi_pv: 1,
            ponder: false,
            chess960: false,
            move_overhead: 10,
            skill_level: 20,
            limit_strength: false,
            uci_elo: 1320,
            style: Style::Default,
            dynamic_strategy: false,
            materialistic: 0,
            positional: 0,
            syzygy_path: String::new(),
            syzygy_probe_depth: 1,
            syzygy_50_move_rule: true,
            book_file: String::new(),
            eval_file: String::new(),
        }
    }
}

/// Info sink printing UCI `info` lines as the search produces them
struct UciInfoSink {
    chess960: bool,
}

impl InfoSink for UciInfoSink {
    fn info(&self, info: &SearchInfo) {
        let _ = send_response(UciResponse::Info(format_info(info, self.chess960)));
    }
}

/// The engine proper
pub struct Engine {
    pub options: EngineOptions,
    tt: TranspositionTable,
    pool: SearchPool,
    networks: Networks,
    tb: Option<SyzygyTablebases>,
    book: Option<OpeningBook>,
    position: Position,
    initialized: bool,
}

impl Engine {
    pub fn new() -> Self {
        let options = EngineOptions::default();
        Self {
            tt: TranspositionTable::new(options.hash_mb),
            pool: SearchPool::new(options.threads),
            networks: Networks::new(),
            tb: None,
            book: None,
            position: Position::startpos(),
            initialized: false,
            options,
        }
    }

    /// Lazy initialization on `isready`
    ///
    /// Verifies the evaluation network. A missing user-configured network
    /// is fatal (the frontend terminates the process).
    pub fn initialize(&mut self) -> Result<String> {
        let msg = self.networks.verify()?;
        self.initialized = true;
        Ok(msg)
    }

    /// Shared search flags for stop/ponderhit
    pub fn search_handle(&self) -> std::sync::Arc<rchess_core::search::SharedSearch> {
        self.pool.shared()
    }

    /// Apply `ucinewgame`: clear TT and per-thread statistics
    pub fn new_game(&mut self) {
        let threads = self.options.threads;
        self.tt.clear(threads);
        self.pool.new_game();
        self.position = Position::startpos();
    }

    /// Load a position (with optional move list)
    pub fn set_position(
        &mut self,
        startpos: bool,
        fen: Option<&str>,
        moves: &[String],
    ) -> Result<()> {
        let mut pos = if startpos {
            Position::startpos()
        } else {
            let fen = fen.ok_or_else(|| anyhow!("missing FEN"))?;
            Position::from_fen(fen, self.options.chess960)?
        };
        for m in moves {
            pos.do_uci_move(m)?;
        }
        self.position = pos;
        Ok(())
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Set an option by protocol name
    ///
    /// On an invalid value this returns an error and the previous value is
    /// retained; the caller reports it as an `info string`.
    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let value = value.unwrap_or("");
        match name {
            "Hash" => {
                let mb: usize = parse(value)?;
                if !(1..=33_554_432).contains(&mb) {
                    bail!("Hash out of range: {mb}");
                }
                self.options.hash_mb = mb;
                self.tt.resize(mb);
            }
            "Threads" => {
                let n: usize = parse(value)?;
                if !(1..=1024).contains(&n) {
                    bail!("Threads out of range: {n}");
                }
                self.options.threads = n;
                self.pool.set_threads(n);
            }
            "MultiPV" => {
                let n: usize = parse(value)?;
                if !(1..=256).contains(&n) {
                    bail!("MultiPV out of range: {n}");
                }
                self.options.multi_pv = n;
            }
            "Ponder" => self.options.ponder = parse_bool(value)?,
            "UCI_Chess960" => self.options.chess960 = parse_bool(value)?,
            "Move Overhead" => {
                let ms: i64 = parse(value)?;
                if !(0..=5000).contains(&ms) {
                    bail!("Move Overhead out of range: {ms}");
                }
                self.options.move_overhead = ms;
            }
            "Skill Level" => {
                let lvl: i32 = parse(value)?;
                if !(0..=20).contains(&lvl) {
                    bail!("Skill Level out of range: {lvl}");
                }
                self.options.skill_level = lvl;
            }
            "UCI_LimitStrength" => self.options.limit_strength = parse_bool(value)?,
            "UCI_Elo" => {
                let elo: i32 = parse(value)?;
                if !(1320..=3190).contains(&elo) {
                    bail!("UCI_Elo out of range: {elo}");
                }
                self.options.uci_elo = elo;
            }
            "Style" => {
                self.options.style =
                    value.parse().map_err(|_| anyhow!("unknown style '{value}'"))?;
            }
            "Dynamic Strategy" => self.options.dynamic_strategy = parse_bool(value)?,
            "MaterialisticEvaluationStrategy" => {
                let v: i32 = parse(value)?;
                if !(-12..=12).contains(&v) {
                    bail!("MaterialisticEvaluationStrategy out of range: {v}");
                }
                self.options.materialistic = v;
            }
            "PositionalEvaluationStrategy" => {
                let v: i32 = parse(value)?;
                if !(-12..=12).contains(&v) {
                    bail!("PositionalEvaluationStrategy out of range: {v}");
                }
                self.options.positional = v;
            }
            "SyzygyPath" => {
                if value.is_empty() || value == "<empty>" {
                    self.options.syzygy_path.clear();
                    self.tb = None;
                } else {
                    let tb = SyzygyTablebases::new(value)?;
                    self.options.syzygy_path = value.to_string();
                    self.tb = Some(tb);
                }
            }
            "SyzygyProbeDepth" => {
                let d: i32 = parse(value)?;
                if !(1..=100).contains(&d) {
                    bail!("SyzygyProbeDepth out of range: {d}");
                }
                self.options.syzygy_probe_depth = d;
            }
            "Syzygy50MoveRule" => self.options.syzygy_50_move_rule = parse_bool(value)?,
            "BookFile" => {
                if value.is_empty() || value == "<empty>" {
                    self.options.book_file.clear();
                    self.book = None;
                } else {
                    self.options.book_file = value.to_string();
                    self.book = Some(OpeningBook::open(value));
                }
            }
            "EvalFile" => {
                self.options.eval_file = value.to_string();
                self.networks.set_eval_file(value);
                self.initialized = false;
            }
            _ => bail!("No such option: {name}"),
        }
        Ok(())
    }

    /// Run a search on the current position and emit the bestmove
    pub fn think(&mut self, limits: &LimitsType) -> SearchResult {
        let opts = ThinkOptions {
            eval_opts: EvalOptions {
                style: self.options.style,
                dynamic_strategy: self.options.dynamic_strategy,
                materialistic: self.options.materialistic,
                positional: self.options.positional,
            },
            multi_pv: self.options.multi_pv,
            move_overhead: self.options.move_overhead,
            skill_level: self.options.skill_level,
            limit_strength: self.options.limit_strength,
            uci_elo: self.options.uci_elo,
            tb_probe_depth: self.options.syzygy_probe_depth,
            tb_rule50: self.options.syzygy_50_move_rule,
            use_book: self.book.is_some(),
        };
        let sink = UciInfoSink {
            chess960: self.options.chess960,
        };

        self.pool.think(
            &self.tt,
            &self.networks,
            self.tb.as_ref(),
            self.book.as_mut(),
            &self.position,
            limits,
            &opts,
            &sink,
        )
    }

    /// Translate go parameters into search limits
    pub fn limits_from_go(&self, p: &crate::uci::GoParams) -> LimitsType {
        let search_moves: Vec<Move> = p
            .search_moves
            .iter()
            .filter_map(|s| self.position.parse_uci_move(s))
            .collect();

        LimitsType {
            time: [p.wtime.unwrap_or(0).max(0), p.btime.unwrap_or(0).max(0)],
            inc: [p.winc.unwrap_or(0).max(0), p.binc.unwrap_or(0).max(0)],
            movestogo: p.movestogo.unwrap_or(0),
            depth: p.depth.unwrap_or(0),
            nodes: p.nodes.unwrap_or(0),
            mate: p.mate.unwrap_or(0),
            movetime: p.movetime.unwrap_or(0),
            infinite: p.infinite,
            ponder: p.ponder,
            perft: p.perft.unwrap_or(0),
            search_moves,
        }
    }

    pub fn is_chess960(&self) -> bool {
        self.options.chess960
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse<T: std::str::FromStr>(value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value '{value}'"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        _ => Err(anyhow!("invalid boolean '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_option_rejects_bad_values_keeps_previous() {
        let mut engine = Engine::new();
        assert!(engine.set_option("Hash", Some("64")).is_ok());
        assert_eq!(engine.options.hash_mb, 64);

        // invalid: previous value retained
        assert!(engine.set_option("Hash", Some("0")).is_err());
        assert_eq!(engine.options.hash_mb, 64);
        assert!(engine.set_option("Hash", Some("banana")).is_err());
        assert_eq!(engine.options.hash_mb, 64);
    }

    #[test]
    fn test_set_option_unknown_name() {
        let mut engine = Engine::new();
        assert!(engine.set_option("NoSuchOption", Some("1")).is_err());
    }

    #[test]
    fn test_set_position_with_moves() {
        let mut engine = Engine::new();
        engine
            .set_position(true, None, &["e2e4".to_string(), "e7e5".to_string()])
            .unwrap();
        assert_eq!(engine.position().game_ply(), 2);

        // illegal move is an error
        assert!(engine
            .set_position(true, None, &["e2e5".to_string()])
            .is_err());
    }

    #[test]
    fn test_style_option() {
        let mut engine = Engine::new();
        assert!(engine.set_option("Style", Some("Aggressive")).is_ok());
        assert_eq!(engine.options.style, Style::Aggressive);
        assert!(engine.set_option("Style", Some("Berserk")).is_err());
        assert_eq!(engine.options.style, Style::Aggressive);
    }

    #[test]
    fn test_limits_from_go() {
        let engine = Engine::new();
        let mut p = crate::uci::GoParams::default();
        p.wtime = Some(60_000);
        p.btime = Some(30_000);
        p.search_moves = vec!["e2e4".to_string(), "e2e5".to_string()];
        let limits = engine.limits_from_go(&p);
        assert_eq!(limits.time, [60_000, 30_000]);
        // illegal searchmoves entries are dropped
        assert_eq!(limits.search_moves.len(), 1);
    }

    #[test]
    fn test_quick_search_smoke() {
        let mut engine = Engine::new();
        engine.set_position(true, None, &[]).unwrap();
        let limits = LimitsType {
            depth: 4,
            ..Default::default()
        };
        let result = engine.think(&limits);
        assert!(result.best_move.is_some());
    }
}
