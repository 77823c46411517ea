//! UCI command dispatch

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use rchess_core::search::SharedSearch;

use crate::engine::Engine;
use crate::state::SearchState;
use crate::uci::output::{send_info_string, send_response, UciResponse};
use crate::uci::{all_options, UciCommand};
use crate::worker::{spawn_search, WorkerMessage};

/// Context threaded through command handling
pub struct CommandContext {
    pub engine: Arc<Mutex<Engine>>,
    pub search_state: SearchState,
    pub worker_handle: Option<JoinHandle<()>>,
    pub worker_tx: Sender<WorkerMessage>,
    pub worker_rx: Receiver<WorkerMessage>,
    /// Per-search stop/ponder flags, cloned out before the worker starts
    pub current_search: Option<Arc<SharedSearch>>,
}

impl CommandContext {
    pub fn new(engine: Arc<Mutex<Engine>>) -> Self {
        let (worker_tx, worker_rx) = crossbeam_channel::unbounded();
        Self {
            engine,
            search_state: SearchState::Idle,
            worker_handle: None,
            worker_tx,
            worker_rx,
            current_search: None,
        }
    }

    /// Drain pending worker messages and update state
    fn drain_messages(&mut self) {
        while let Ok(msg) = self.worker_rx.try_recv() {
            match msg {
                WorkerMessage::Finished { .. } => {
                    self.search_state = SearchState::Idle;
                }
                WorkerMessage::Error(e) => {
                    log::error!("search worker error: {e}");
                    self.search_state = SearchState::Idle;
                }
            }
        }
    }

    /// Block until any in-flight search has finished
    ///
    /// Used by commands that need the engine idle (position, setoption,
    /// ucinewgame, go). A pending infinite search is stopped first.
    fn wait_for_search_completion(&mut self) {
        if let Some(shared) = &self.current_search {
            shared.request_stop();
        }
        if let Some(handle) = self.worker_handle.take() {
            if let Err(e) = handle.join() {
                log::error!("search thread panicked: {e:?}");
            }
        }
        self.drain_messages();
        self.search_state = SearchState::Idle;
        self.current_search = None;
    }

    fn lock_engine(&self) -> std::sync::MutexGuard<'_, Engine> {
        match self.engine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("engine mutex poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Handle one parsed command. Returns false when the process should exit.
pub fn handle_command(command: UciCommand, ctx: &mut CommandContext) -> Result<bool> {
    ctx.drain_messages();

    match command {
        UciCommand::Uci => {
            send_response(UciResponse::IdName(format!(
                "RChess {}",
                env!("CARGO_PKG_VERSION")
            )))?;
            send_response(UciResponse::IdAuthor("the RChess developers".to_string()))?;
            for option in all_options() {
                send_response(UciResponse::Option(option.to_string()))?;
            }
            send_response(UciResponse::UciOk)?;
        }

        UciCommand::IsReady => {
            // Network verification happens here; a broken EvalFile is fatal
            let init_result = {
                let mut engine = ctx.lock_engine();
                engine.initialize()
            };
            match init_result {
                Ok(msg) => {
                    send_info_string(&msg);
                    send_response(UciResponse::ReadyOk)?;
                }
                Err(e) => {
                    send_info_string(&format!("ERROR: {e}"));
                    send_info_string("ERROR: The engine will be terminated now.");
                    std::process::exit(1);
                }
            }
        }

        UciCommand::NewGame => {
            ctx.wait_for_search_completion();
            let mut engine = ctx.lock_engine();
            engine.new_game();
        }

        UciCommand::SetOption { name, value } => {
            ctx.wait_for_search_completion();
            let mut engine = ctx.lock_engine();
            if let Err(e) = engine.set_option(&name, value.as_deref()) {
                // keep the previous value and tell the GUI
                send_info_string(&format!("{e}"));
            }
        }

        UciCommand::Position {
            startpos,
            fen,
            moves,
        } => {
            ctx.wait_for_search_completion();
            let mut engine = ctx.lock_engine();
            if let Err(e) = engine.set_position(startpos, fen.as_deref(), &moves) {
                send_info_string(&format!("{e}"));
            }
        }

        UciCommand::Go(params) => {
            ctx.wait_for_search_completion();

            let (limits, shared) = {
                let engine = ctx.lock_engine();
                (engine.limits_from_go(&params), engine.search_handle())
            };

            // Reset the shared flags here, synchronously: a stop arriving
            // right after go must not be erased by the worker thread.
            shared.new_search(limits.ponder);
            ctx.current_search = Some(shared);
            ctx.search_state = SearchState::Searching;
            let handle = spawn_search(Arc::clone(&ctx.engine), limits, ctx.worker_tx.clone());
            ctx.worker_handle = Some(handle);
        }

        UciCommand::Stop => {
            if let Some(shared) = &ctx.current_search {
                shared.request_stop();
            }
        }

        UciCommand::PonderHit => {
            if let Some(shared) = &ctx.current_search {
                shared.ponderhit();
            }
        }

        UciCommand::Quit => {
            ctx.wait_for_search_completion();
            return Ok(false);
        }
    }

    Ok(true)
}
