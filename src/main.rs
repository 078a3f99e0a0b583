mod config;
mod db;
mod exchange;
mod ipc;
mod logging;
mod model;
mod points;
mod reminders;
mod reports;
mod repo;
mod rubric;
mod rubric_import;
mod storage;
mod workbook;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

fn main() {
    let cli = config::Cli::parse();
    logging::init_logger(&cli.log_filter);

    let mut state = ipc::AppState::new(cli.tray);
    if let Some(path) = cli.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            warn!(workspace = %path.display(), "startup workspace not opened: {e:#}");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "asuippd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                error!("stdin closed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // No id to echo back.
            Err(e) => ipc::err("", "bad_json", e.to_string(), None),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
