//! # CLI Behavior
//!
//! This is **one possible UI client** for relaygate, not the application
//! itself. The CLI is the only place that knows about terminal I/O, exit codes
//! and output formatting.
//!
//! ## Talking to Relays
//!
//! Commands that change a relay (`open`, `user authorize`, `device relay`,
//! `settings admin`, ...) print the SMS body to send and the number to send it
//! to. Delivery is up to the user's phone or modem; relaygate only records what
//! was issued, with the password masked in the activity log.
//!
//! ### Naked Execution (`relaygate`)
//!
//! Running `relaygate` with no arguments lists devices, marking the active one.
//!
//! ### Device Selection
//!
//! Device arguments accept an id, a unique id prefix, or a name
//! (case-insensitive). Omitting the device uses the active one.
//!
//! ## Module Structure
//!
//! - `commands`: Context setup, dispatch to the API, config subcommand
//! - `render`: Output formatting for each view
//! - `setup`: Argument parsing via clap
//! - `styles`: Terminal styling

mod commands;
mod render;
pub mod setup;
mod styles;

pub use commands::run;
