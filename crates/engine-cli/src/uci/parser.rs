//! UCI protocol command parser

use super::commands::{GoParams, UciCommand};
use anyhow::{anyhow, Result};

/// Parse a UCI command from an input line
pub fn parse_uci_command(line: &str) -> Result<UciCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Err(anyhow!("Empty command"));
    }

    match parts[0] {
        "uci" => Ok(UciCommand::Uci),
        "isready" => Ok(UciCommand::IsReady),
        "ucinewgame" => Ok(UciCommand::NewGame),
        "quit" => Ok(UciCommand::Quit),
        "stop" => Ok(UciCommand::Stop),
        "ponderhit" => Ok(UciCommand::PonderHit),

        "setoption" => parse_setoption(&parts[1..]),
        "position" => parse_position(&parts[1..]),
        "go" => parse_go(&parts[1..]),

        _ => Err(anyhow!("Unknown command: {}", parts[0])),
    }
}

/// Parse a setoption command: name <name...> [value <value...>]
fn parse_setoption(parts: &[&str]) -> Result<UciCommand> {
    if parts.len() < 2 || parts[0] != "name" {
        return Err(anyhow!("Invalid setoption format"));
    }

    let value_pos = parts.iter().position(|&p| p == "value");

    let name = if let Some(pos) = value_pos {
        parts[1..pos].join(" ")
    } else {
        parts[1..].join(" ")
    };

    let value = value_pos.and_then(|pos| {
        if pos + 1 < parts.len() {
            let val = parts[pos + 1..].join(" ");
            if val.is_empty() {
                None
            } else {
                Some(val)
            }
        } else {
            None
        }
    });

    Ok(UciCommand::SetOption { name, value })
}

/// Parse a position command: (startpos | fen <FEN>) [moves <m1> ...]
fn parse_position(parts: &[&str]) -> Result<UciCommand> {
    if parts.is_empty() {
        return Err(anyhow!("Invalid position format"));
    }

    let (startpos, fen, moves_start) = if parts[0] == "startpos" {
        (true, None, 1)
    } else if parts[0] == "fen" {
        let moves_pos = parts.iter().position(|&p| p == "moves");
        let fen_end = moves_pos.unwrap_or(parts.len());
        if fen_end <= 1 {
            return Err(anyhow!("Invalid FEN"));
        }
        let fen = parts[1..fen_end].join(" ");
        (false, Some(fen), fen_end)
    } else {
        return Err(anyhow!("Expected 'startpos' or 'fen'"));
    };

    let moves = if parts.get(moves_start) == Some(&"moves") {
        parts[moves_start + 1..].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };

    Ok(UciCommand::Position {
        startpos,
        fen,
        moves,
    })
}

/// Parse a go command
fn parse_go(parts: &[&str]) -> Result<UciCommand> {
    let mut params = GoParams::default();
    let mut i = 0;

    while i < parts.len() {
        match parts[i] {
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            "searchmoves" => {
                // all remaining tokens until the next keyword are moves
                i += 1;
                while i < parts.len() && !is_go_keyword(parts[i]) {
                    params.search_moves.push(parts[i].to_string());
                    i += 1;
                }
            }
            keyword => {
                let value = parts.get(i + 1).copied();
                match keyword {
                    "wtime" => params.wtime = parse_num(value),
                    "btime" => params.btime = parse_num(value),
                    "winc" => params.winc = parse_num(value),
                    "binc" => params.binc = parse_num(value),
                    "movestogo" => params.movestogo = parse_num(value),
                    "depth" => params.depth = parse_num(value),
                    "nodes" => params.nodes = parse_num(value),
                    "mate" => params.mate = parse_num(value),
                    "movetime" => params.movetime = parse_num(value),
                    "perft" => params.perft = parse_num(value),
                    other => {
                        log::warn!("Ignoring unknown go parameter: {other}");
                        i += 1;
                        continue;
                    }
                }
                i += 2;
            }
        }
    }

    Ok(UciCommand::Go(params))
}

fn is_go_keyword(token: &str) -> bool {
    matches!(
        token,
        "wtime"
            | "btime"
            | "winc"
            | "binc"
            | "movestogo"
            | "depth"
            | "nodes"
            | "mate"
            | "movetime"
            | "perft"
            | "infinite"
            | "ponder"
            | "searchmoves"
    )
}

fn parse_num<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_uci_command("uci").unwrap(), UciCommand::Uci);
        assert_eq!(parse_uci_command("isready").unwrap(), UciCommand::IsReady);
        assert_eq!(parse_uci_command("ucinewgame").unwrap(), UciCommand::NewGame);
        assert_eq!(parse_uci_command("stop").unwrap(), UciCommand::Stop);
        assert_eq!(parse_uci_command("ponderhit").unwrap(), UciCommand::PonderHit);
        assert_eq!(parse_uci_command("quit").unwrap(), UciCommand::Quit);
        assert!(parse_uci_command("").is_err());
        assert!(parse_uci_command("xyzzy").is_err());
    }

    #[test]
    fn test_parse_setoption() {
        let cmd = parse_uci_command("setoption name Hash value 128").unwrap();
        assert_eq!(
            cmd,
            UciCommand::SetOption {
                name: "Hash".to_string(),
                value: Some("128".to_string())
            }
        );

        // multi-word option names
        let cmd = parse_uci_command("setoption name Skill Level value 10").unwrap();
        assert_eq!(
            cmd,
            UciCommand::SetOption {
                name: "Skill Level".to_string(),
                value: Some("10".to_string())
            }
        );

        // button-style option without a value
        let cmd = parse_uci_command("setoption name Clear Hash").unwrap();
        assert_eq!(
            cmd,
            UciCommand::SetOption {
                name: "Clear Hash".to_string(),
                value: None
            }
        );
    }

    #[test]
    fn test_parse_position() {
        let cmd = parse_uci_command("position startpos moves e2e4 e7e5").unwrap();
        assert_eq!(
            cmd,
            UciCommand::Position {
                startpos: true,
                fen: None,
                moves: vec!["e2e4".to_string(), "e7e5".to_string()]
            }
        );

        let cmd =
            parse_uci_command("position fen 8/8/8/8/8/3k4/3p4/3K4 w - - 0 1 moves d1c1").unwrap();
        match cmd {
            UciCommand::Position {
                startpos,
                fen,
                moves,
            } => {
                assert!(!startpos);
                assert_eq!(fen.unwrap(), "8/8/8/8/8/3k4/3p4/3K4 w - - 0 1");
                assert_eq!(moves, vec!["d1c1".to_string()]);
            }
            _ => panic!("not a position command"),
        }
    }

    #[test]
    fn test_parse_go() {
        let cmd = parse_uci_command("go wtime 60000 btime 61000 winc 1000 binc 1000").unwrap();
        match cmd {
            UciCommand::Go(p) => {
                assert_eq!(p.wtime, Some(60_000));
                assert_eq!(p.btime, Some(61_000));
                assert_eq!(p.winc, Some(1000));
                assert_eq!(p.binc, Some(1000));
                assert!(!p.infinite);
            }
            _ => panic!("not a go command"),
        }

        let cmd = parse_uci_command("go depth 12").unwrap();
        match cmd {
            UciCommand::Go(p) => assert_eq!(p.depth, Some(12)),
            _ => panic!("not a go command"),
        }

        let cmd = parse_uci_command("go infinite searchmoves e2e4 d2d4").unwrap();
        match cmd {
            UciCommand::Go(p) => {
                assert!(p.infinite);
                assert_eq!(p.search_moves, vec!["e2e4".to_string(), "d2d4".to_string()]);
            }
            _ => panic!("not a go command"),
        }
    }
}
