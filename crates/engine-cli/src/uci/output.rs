//! UCI response formatting
//!
//! All engine-to-GUI traffic goes through this module so that output is
//! line-buffered and flushed consistently.

use std::io::Write;

use anyhow::Result;
use rchess_core::search::SearchInfo;
use rchess_core::types::Value;
use rchess_core::Position;

/// Engine-to-GUI responses
#[derive(Debug, Clone)]
pub enum UciResponse {
    IdName(String),
    IdAuthor(String),
    UciOk,
    ReadyOk,
    Option(String),
    Info(String),
    BestMove {
        best: String,
        ponder: Option<String>,
    },
}

/// Write a response line to stdout and flush
pub fn send_response(response: UciResponse) -> Result<()> {
    let line = match response {
        UciResponse::IdName(name) => format!("id name {name}"),
        UciResponse::IdAuthor(author) => format!("id author {author}"),
        UciResponse::UciOk => "uciok".to_string(),
        UciResponse::ReadyOk => "readyok".to_string(),
        UciResponse::Option(opt) => opt,
        UciResponse::Info(info) => format!("info {info}"),
        UciResponse::BestMove { best, ponder } => match ponder {
            Some(p) => format!("bestmove {best} ponder {p}"),
            None => format!("bestmove {best}"),
        },
    };

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    writeln!(lock, "{line}")?;
    lock.flush()?;
    Ok(())
}

/// Emit an `info string` diagnostic
pub fn send_info_string(msg: &str) {
    let _ = send_response(UciResponse::Info(format!("string {msg}")));
}

/// Format a score for the protocol
///
/// Mate scores are reported in full moves: `(MATE - v + 1) / 2` for the
/// mating side, `(-MATE - v) / 2` for the mated side. Everything else is
/// normalized centipawns.
pub fn format_score(v: Value) -> String {
    if v.is_mate_score() {
        let moves = if v > Value::ZERO {
            (Value::MATE.raw() - v.raw() + 1) / 2
        } else {
            (-Value::MATE.raw() - v.raw()) / 2
        };
        format!("mate {moves}")
    } else {
        format!("cp {}", v.to_cp())
    }
}

/// Format a full `info` line for one PV
pub fn format_info(info: &SearchInfo, chess960: bool) -> String {
    let mut line = format!(
        "depth {} seldepth {} multipv {} score {}",
        info.depth,
        info.sel_depth,
        info.multipv,
        format_score(info.score),
    );
    if info.lowerbound {
        line.push_str(" lowerbound");
    } else if info.upperbound {
        line.push_str(" upperbound");
    }
    line.push_str(&format!(
        " nodes {} nps {} hashfull {} tbhits {} time {}",
        info.nodes, info.nps, info.hashfull, info.tb_hits, info.time_ms,
    ));
    if !info.pv.is_empty() {
        line.push_str(" pv");
        for &m in &info.pv {
            line.push(' ');
            line.push_str(&Position::move_to_uci(m, chess960));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_score_cp() {
        let s = format_score(Value::new(Value::NORMALIZE_TO_PAWN_VALUE));
        assert_eq!(s, "cp 100");
        assert_eq!(format_score(Value::ZERO), "cp 0");
    }

    #[test]
    fn test_format_score_mate() {
        assert_eq!(format_score(Value::mate_in(1)), "mate 1");
        assert_eq!(format_score(Value::mate_in(3)), "mate 2");
        assert_eq!(format_score(Value::mated_in(2)), "mate -1");
    }

    #[test]
    fn test_format_info_line() {
        let info = SearchInfo {
            depth: 10,
            sel_depth: 14,
            multipv: 1,
            score: Value::new(33),
            lowerbound: false,
            upperbound: false,
            nodes: 12345,
            nps: 100_000,
            hashfull: 42,
            tb_hits: 0,
            time_ms: 123,
            pv: vec![],
        };
        let line = format_info(&info, false);
        assert!(line.starts_with("depth 10 seldepth 14 multipv 1 score cp "));
        assert!(line.contains("nodes 12345"));
        assert!(line.contains("hashfull 42"));
    }
}
