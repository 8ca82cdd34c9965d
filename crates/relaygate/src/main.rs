//! # Relaygate CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this
//! file only starts the runtime, invokes `cli::run()` and handles process
//! termination.
//!
//! ## Workspace Structure
//!
//! - `crates/relaygateapp/`: library with all store, backup and command logic
//! - `crates/relaygate/`: this CLI, a thin client of `relaygateapp::api`
//!
//! Everything from `api.rs` inward is UI agnostic: functions take normal Rust
//! values, return `CmdResult`, and never assume terminal I/O. The CLI layer is
//! responsible for argument parsing, context initialization, dispatch, error
//! reporting and rendering.

mod cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
