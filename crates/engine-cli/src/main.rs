//! UCI (Universal Chess Interface) frontend

use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;

use engine_cli::command_handler::{handle_command, CommandContext};
use engine_cli::engine::Engine;
use engine_cli::uci::parse_uci_command;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(
            env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "debug"),
        );
    } else {
        env_logger::init_from_env(
            env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
        );
    }

    log::info!("UCI engine starting");

    let engine = Arc::new(Mutex::new(Engine::new()));
    let mut ctx = CommandContext::new(engine);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::error!("stdin read error: {e}");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_uci_command(trimmed) {
            Ok(command) => {
                log::debug!("command: {command:?}");
                match handle_command(command, &mut ctx) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => log::error!("command failed: {e}"),
                }
            }
            Err(e) => {
                // unknown input is ignored per protocol; log for debugging
                log::debug!("ignoring input '{trimmed}': {e}");
            }
        }
    }

    log::info!("UCI engine exiting");
    Ok(())
}
