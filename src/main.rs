mod backup;
mod calc;
mod config;
mod db;
mod error;
mod integrity;
mod ipc;
mod marks;
mod ranking;
mod reports;
mod store;

use std::io::{self, BufRead, Write};

fn main() {
    config::init_logging();
    let cfg = config::Config::from_env();

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        // A bad startup workspace leaves the sidecar usable; the UI can select another.
        if let Err(e) = state.open_workspace(path) {
            log::error!(
                "failed to open {} from {}: {:#}",
                path.to_string_lossy(),
                config::WORKSPACE_ENV,
                e
            );
        }
    }
    log::info!("acadreportd {} ready", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                log::error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                log::warn!("bad request line: {}", e);
                // No id to echo; answer with an empty one.
                ipc::err("", "bad_json", e.to_string(), None)
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    log::info!("stdin closed, exiting");
}
