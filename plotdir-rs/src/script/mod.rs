//! Plot-script language.
//!
//! A plot script is plain text, one statement per line:
//!
//! ```text
//! # square with a pen change
//! options speed_pendown 20
//! def sq moveto 0 0 | lineto 1 0 | lineto 1 1 | lineto 0 1 | lineto 0 0
//! sq
//! pause swap to the red pen
//! draw_path [(0,0),(1,1)]
//! ```
//!
//! - [`stmt`] classifies a line.
//! - [`cast`] turns raw tokens into typed [`Value`]s.
//! - [`interp`] dispatches statements against a plotter.
//!
//! # Quick start
//!
//! ```rust
//! use plotdir::device::{sim::VirtualPlotter, Plotter};
//! use plotdir::script::Interpreter;
//!
//! let mut interp = Interpreter::silent(VirtualPlotter::connected());
//! interp.exec("lineto 2 3");
//! assert_eq!(interp.device().position(), (2.0, 3.0));
//! ```

pub mod cast;
pub mod interp;
pub mod stmt;
pub mod value;

pub use interp::{ExecError, Interpreter, RunReport};
pub use value::Value;
