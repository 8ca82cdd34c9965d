//! Terminal styles.
//!
//! Output code refers to styles by meaning (`TIME`, `ACTIVE`) rather than by
//! color, so the palette can change in one place. `console` drops the escape
//! codes on its own when stdout is not a terminal.

use console::Style;
use once_cell::sync::Lazy;

pub static TITLE: Lazy<Style> = Lazy::new(|| Style::new().bold());
pub static MUTED: Lazy<Style> = Lazy::new(|| Style::new().color256(246));
pub static TIME: Lazy<Style> = Lazy::new(|| Style::new().color256(246).italic());
pub static ACTIVE: Lazy<Style> = Lazy::new(|| Style::new().color256(178).bold());
pub static SUCCESS: Lazy<Style> = Lazy::new(|| Style::new().green());
pub static WARNING: Lazy<Style> = Lazy::new(|| Style::new().yellow().bold());
pub static ERROR: Lazy<Style> = Lazy::new(|| Style::new().red().bold());
pub static INFO: Lazy<Style> = Lazy::new(|| Style::new().color256(246));
pub static SMS: Lazy<Style> = Lazy::new(|| Style::new().cyan());
