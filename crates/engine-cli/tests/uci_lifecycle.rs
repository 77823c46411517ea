//! Integration tests for the UCI engine process
//!
//! Spawns the built binary, drives it over pipes and checks the protocol
//! responses and timing behaviour.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

/// Spawn the engine binary with piped stdio
fn spawn_engine() -> Child {
    Command::new(env!("CARGO_BIN_EXE_engine-cli"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn engine")
}

fn send_command(stdin: &mut ChildStdin, command: &str) {
    writeln!(stdin, "{command}").expect("Failed to write command");
    stdin.flush().expect("Failed to flush stdin");
}

/// Read lines until one starts with `pattern` or the timeout expires
fn read_until_pattern(
    reader: &mut impl BufRead,
    pattern: &str,
    timeout: Duration,
) -> Result<Vec<String>, String> {
    let mut lines = Vec::new();
    let start = Instant::now();

    while start.elapsed() < timeout {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    let matched = trimmed.starts_with(pattern);
                    lines.push(trimmed);
                    if matched {
                        return Ok(lines);
                    }
                }
            }
            Err(_) => break,
        }
    }

    Err(format!("Timeout waiting for pattern: {pattern} (got {lines:?})"))
}

fn init_engine(stdin: &mut ChildStdin, reader: &mut impl BufRead) {
    send_command(stdin, "uci");
    read_until_pattern(reader, "uciok", Duration::from_secs(5)).expect("no uciok");
    send_command(stdin, "isready");
    read_until_pattern(reader, "readyok", Duration::from_secs(5)).expect("no readyok");
}

#[test]
fn test_uci_handshake_lists_options() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);

    send_command(stdin, "uci");
    let lines = read_until_pattern(&mut reader, "uciok", Duration::from_secs(5)).unwrap();

    assert!(lines.iter().any(|l| l.starts_with("id name")));
    assert!(lines.iter().any(|l| l.starts_with("id author")));
    for option in ["Hash", "Threads", "MultiPV", "SyzygyPath", "Skill Level", "Style"] {
        assert!(
            lines.iter().any(|l| l.contains(&format!("option name {option} "))),
            "missing option {option} in {lines:?}"
        );
    }

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_fixed_depth_search_produces_bestmove() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "position startpos");
    send_command(stdin, "go depth 6");
    let lines = read_until_pattern(&mut reader, "bestmove", Duration::from_secs(60)).unwrap();

    // info lines come before the bestmove
    assert!(lines.iter().any(|l| l.starts_with("info depth")));
    let best = lines.last().unwrap();
    let mv = best.split_whitespace().nth(1).unwrap();
    assert!(
        ["e2e4", "d2d4", "g1f3", "c2c4", "e2e3", "d2d3", "b1c3"].contains(&mv),
        "unexpected bestmove {mv}"
    );

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_stalemate_reports_none() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "position fen 8/8/8/8/8/3k4/3p4/3K4 w - - 0 1");
    send_command(stdin, "go depth 4");
    let lines = read_until_pattern(&mut reader, "bestmove", Duration::from_secs(20)).unwrap();
    assert!(
        lines.last().unwrap().starts_with("bestmove (none)"),
        "expected bestmove (none), got {lines:?}"
    );

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_back_rank_mate_is_reported() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "position fen 6k1/5ppp/8/8/8/8/8/R6K w - - 0 1");
    send_command(stdin, "go depth 6");
    let lines = read_until_pattern(&mut reader, "bestmove", Duration::from_secs(30)).unwrap();

    assert!(
        lines.iter().any(|l| l.contains("score mate 1")),
        "expected a mate score in {lines:?}"
    );
    assert!(lines.last().unwrap().starts_with("bestmove a1a8"));

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_stop_response_time() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "position startpos");
    send_command(stdin, "go infinite");
    std::thread::sleep(Duration::from_millis(300));

    let start = Instant::now();
    send_command(stdin, "stop");
    let result = read_until_pattern(&mut reader, "bestmove", Duration::from_secs(2));
    let elapsed = start.elapsed();

    assert!(result.is_ok(), "no bestmove after stop");
    assert!(elapsed < Duration::from_millis(1000), "stop took too long: {elapsed:?}");

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_position_moves_then_search() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "position startpos moves e2e4 e7e5 g1f3");
    send_command(stdin, "go depth 5");
    let lines = read_until_pattern(&mut reader, "bestmove", Duration::from_secs(30)).unwrap();
    let best = lines.last().unwrap();
    assert!(best.starts_with("bestmove "));
    assert_ne!(best, "bestmove (none)");

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_ucinewgame_between_searches() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "position startpos");
    send_command(stdin, "go depth 4");
    read_until_pattern(&mut reader, "bestmove", Duration::from_secs(30)).unwrap();

    send_command(stdin, "ucinewgame");
    send_command(stdin, "isready");
    read_until_pattern(&mut reader, "readyok", Duration::from_secs(5)).unwrap();

    send_command(stdin, "position startpos");
    send_command(stdin, "go depth 4");
    read_until_pattern(&mut reader, "bestmove", Duration::from_secs(30)).unwrap();

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_setoption_while_idle() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "setoption name Hash value 32");
    send_command(stdin, "setoption name MultiPV value 3");
    send_command(stdin, "isready");
    read_until_pattern(&mut reader, "readyok", Duration::from_secs(5)).unwrap();

    send_command(stdin, "position startpos");
    send_command(stdin, "go depth 4");
    let lines = read_until_pattern(&mut reader, "bestmove", Duration::from_secs(30)).unwrap();
    // MultiPV=3 emits three lines per depth
    assert!(
        lines.iter().any(|l| l.contains("multipv 3")),
        "expected multipv 3 lines in {lines:?}"
    );

    send_command(stdin, "quit");
    let _ = engine.wait();
}

#[test]
fn test_go_perft() {
    let mut engine = spawn_engine();
    let stdin = engine.stdin.as_mut().expect("no stdin");
    let stdout = engine.stdout.take().expect("no stdout");
    let mut reader = BufReader::new(stdout);
    init_engine(stdin, &mut reader);

    send_command(stdin, "position startpos");
    send_command(stdin, "go perft 4");
    let lines = read_until_pattern(&mut reader, "info nodes", Duration::from_secs(30)).unwrap();
    assert!(
        lines.iter().any(|l| l.contains("nodes 197281")),
        "expected perft 4 node count in {lines:?}"
    );

    send_command(stdin, "quit");
    let _ = engine.wait();
}
