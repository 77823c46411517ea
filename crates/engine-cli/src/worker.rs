//! Search worker thread
//!
//! `go` spawns one worker thread that locks the engine, runs the blocking
//! search, prints the bestmove and reports completion over a channel. The
//! stop/ponderhit flags live outside the engine lock so the main loop can
//! signal a running search without blocking.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use rchess_core::search::LimitsType;
use rchess_core::types::Move;
use rchess_core::Position;

use crate::engine::Engine;
use crate::uci::output::{send_response, UciResponse};

/// Messages from the worker to the command loop
#[derive(Debug)]
pub enum WorkerMessage {
    /// Search finished; bestmove has been emitted
    Finished { best_move: Move },
    /// Search failed
    Error(String),
}

/// Spawn the search worker for one `go` command
pub fn spawn_search(
    engine: Arc<Mutex<Engine>>,
    limits: LimitsType,
    tx: Sender<WorkerMessage>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("search".to_string())
        .stack_size(64 * 1024 * 1024)
        .spawn(move || {
            let mut engine = match engine.lock() {
                Ok(e) => e,
                Err(poisoned) => {
                    log::warn!("engine mutex poisoned; recovering");
                    poisoned.into_inner()
                }
            };

            let chess960 = engine.is_chess960();
            let result = engine.think(&limits);

            if limits.perft > 0 {
                // perft prints the node count instead of a bestmove
                let _ = send_response(UciResponse::Info(format!("nodes {}", result.nodes)));
                let _ = tx.send(WorkerMessage::Finished {
                    best_move: Move::NONE,
                });
                return;
            }

            let best = if result.best_move.is_some() {
                Position::move_to_uci(result.best_move, chess960)
            } else {
                "(none)".to_string()
            };
            let ponder = if result.ponder_move.is_some() {
                Some(Position::move_to_uci(result.ponder_move, chess960))
            } else {
                None
            };

            log::debug!(
                "search finished: bestmove {best} depth {} nodes {}",
                result.completed_depth,
                result.nodes
            );
            let _ = send_response(UciResponse::BestMove { best, ponder });
            let _ = tx.send(WorkerMessage::Finished {
                best_move: result.best_move,
            });
        })
        .unwrap_or_else(|e| {
            // Thread spawn failure is unrecoverable for a search engine
            panic!("failed to spawn search thread: {e}");
        })
}
