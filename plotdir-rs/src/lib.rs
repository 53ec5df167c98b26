//! plotdir: a line-oriented plot-script interpreter for EiBotBoard pen
//! plotters.
//!
//! | Module | Role |
//! |--------|------|
//! | [`script`] | statement parsing, parameter casting, dispatch |
//! | [`macros`] | the per-interpreter macro table |
//! | [`device`] | the [`Plotter`](device::Plotter) trait, EBB and virtual plotters |
//! | [`stream`] | script streaming with operator pause/resume |
//! | [`terminal`] | raw-mode key polling |
//! | [`notify`] | webhook status notifications |
//! | [`config`] | rc-file loader |
//! | [`cli`], [`logging`] | binary front end |

pub mod cli;
pub mod config;
pub mod device;
pub mod logging;
pub mod macros;
pub mod notify;
pub mod script;
pub mod stream;
pub mod terminal;
