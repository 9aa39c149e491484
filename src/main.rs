mod enroll;
mod ipc;
mod ledger;
mod locks;
mod remote;
mod report;
mod store;

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::Parser;

use crate::remote::RemoteStore;

/// Gradebook sidecar: speaks JSON-lines over stdin/stdout, keeps the whole
/// school dataset in memory, and mirrors every mutation to the remote store.
#[derive(Parser, Debug)]
#[command(name = "boletad", version, about = "Gradebook computation daemon")]
struct Cli {
    /// Remote data store endpoint. Falls back to BOLETAD_STORE_URL.
    #[arg(long)]
    store_url: Option<String>,

    /// Timeout for store requests, in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

fn main() {
    // Logs go to stderr; stdout carries only protocol lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boletad=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store_url = cli
        .store_url
        .or_else(|| std::env::var("BOLETAD_STORE_URL").ok())
        .filter(|s| !s.trim().is_empty());
    let store_timeout = Duration::from_secs(cli.timeout_secs);

    let mut state = ipc::AppState {
        remote: None,
        data: None,
        store_timeout,
    };
    if let Some(url) = store_url {
        let mut remote = RemoteStore::new(&url, store_timeout);
        match remote.fetch() {
            Ok(data) => {
                tracing::info!(
                    "loaded {} students, {} courses from {}",
                    data.students.len(),
                    data.courses.len(),
                    url
                );
                state.remote = Some(remote);
                state.data = Some(data);
            }
            Err(e) => {
                // Still serve requests; store.connect can retry later.
                tracing::error!("initial load from {} failed: {} ({})", url, e.message, e.code);
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply with an id we never parsed; emit a bare error.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
