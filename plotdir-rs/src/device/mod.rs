//! Plotter device layer.
//!
//! The interpreter never talks to hardware directly.  It drives a
//! [`Plotter`]: a small set of primitive operations (pen up/down, absolute
//! move, raw controller commands) plus a settable [`PlotOptions`] object.
//! The higher-level capabilities a script can name (`moveto`, `line`,
//! `draw_path`, …) are provided methods built on those primitives, and are
//! bound to script names by [`capability::CapabilityTable`].
//!
//! Two implementations ship with the crate:
//!
//! * [`sim::VirtualPlotter`]: in-memory dry-run plotter.
//! * [`ebb::EbbPlotter`]: EiBotBoard text protocol over a serial port.

pub mod capability;
pub mod ebb;
pub mod options;
pub mod sim;

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::config::Config;

pub use capability::CapabilityTable;
pub use options::{AssignError, OptionError, PlotOptions, Units};

// ── DeviceError ───────────────────────────────────────────────────────────────

/// A failure raised by a device operation.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("plotter not connected")]
    NotConnected,
    #[error("missing argument {index} for {command}")]
    MissingArgument { command: &'static str, index: usize },
    #[error("argument {index} of {command} must be {expected}, got {found}")]
    ArgumentType {
        command: &'static str,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("argument {index} of {command} must be finite, got {value}")]
    NonFinite { command: &'static str, index: usize, value: f64 },
    #[error("controller rejected '{command}': {response}")]
    Rejected { command: String, response: String },
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reject an infinite or NaN coordinate pair before it reaches step math.
pub(crate) fn check_finite(command: &'static str, x: f64, y: f64) -> Result<(), DeviceError> {
    for (index, value) in [(0, x), (1, y)] {
        if !value.is_finite() {
            return Err(DeviceError::NonFinite { command, index, value });
        }
    }
    Ok(())
}

// ── Plotter ───────────────────────────────────────────────────────────────────

/// A pen plotter: primitives plus derived drawing operations.
///
/// Coordinates are in the unit system selected by `options.units`; the
/// origin is the home corner.
pub trait Plotter {
    fn options(&self) -> &PlotOptions;
    fn options_mut(&mut self) -> &mut PlotOptions;

    /// Open the connection to the controller.
    fn connect(&mut self) -> Result<(), DeviceError>;
    fn disconnect(&mut self);

    /// Push the current options (pen heights, rates) to the controller.
    fn update(&mut self) -> Result<(), DeviceError>;

    fn pen_up(&mut self) -> Result<(), DeviceError>;
    fn pen_down(&mut self) -> Result<(), DeviceError>;

    /// Straight move to absolute `(x, y)` without changing the pen.
    fn goto(&mut self, x: f64, y: f64) -> Result<(), DeviceError>;

    /// Hold position for `ms` milliseconds.
    fn delay(&mut self, ms: u64) -> Result<(), DeviceError>;

    /// Send a raw controller command; returns the controller's reply.
    fn usb_command(&mut self, command: &str) -> Result<String, DeviceError>;
    /// Send a raw controller query; returns the first reply line.
    fn usb_query(&mut self, query: &str) -> Result<String, DeviceError>;

    fn position(&self) -> (f64, f64);
    fn is_pen_down(&self) -> bool;

    // ── Derived operations ────────────────────────────────────────────────────

    /// Raise the pen, then move to absolute `(x, y)`.
    fn moveto(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        self.pen_up()?;
        self.goto(x, y)
    }

    /// Lower the pen, then move to absolute `(x, y)`.
    fn lineto(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        self.pen_down()?;
        self.goto(x, y)
    }

    /// Relative move without changing the pen.
    fn go(&mut self, dx: f64, dy: f64) -> Result<(), DeviceError> {
        let (x, y) = self.position();
        self.goto(x + dx, y + dy)
    }

    /// Raise the pen, then move relative.
    fn move_rel(&mut self, dx: f64, dy: f64) -> Result<(), DeviceError> {
        self.pen_up()?;
        self.go(dx, dy)
    }

    /// Lower the pen, then move relative.
    fn line(&mut self, dx: f64, dy: f64) -> Result<(), DeviceError> {
        self.pen_down()?;
        self.go(dx, dy)
    }

    /// Travel to the first vertex pen-up, draw through the rest, and raise
    /// the pen at the end.  An empty path does nothing.
    fn draw_path(&mut self, path: &[(f64, f64)]) -> Result<(), DeviceError> {
        let Some((&(x0, y0), rest)) = path.split_first() else {
            return Ok(());
        };
        self.moveto(x0, y0)?;
        for &(x, y) in rest {
            self.lineto(x, y)?;
        }
        self.pen_up()
    }

    /// Wait until queued motion has finished.
    fn block(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Apply the `options` lines of an rc file, then [`update`](Self::update).
    ///
    /// Valid lines are applied even when others fail; the failures are
    /// returned together.
    fn load_config(&mut self, path: &Path) -> Result<(), DeviceError> {
        let (config, errors) = Config::load_file(path)
            .map_err(|e| DeviceError::Config(format!("{}: {e}", path.display())))?;
        let mut problems: Vec<String> = errors.iter().map(ToString::to_string).collect();
        for setting in &config.options {
            if let Err(e) = self.options_mut().assign(&setting.name, &[setting.value.as_str()]) {
                problems.push(format!("line {}: {e}", setting.line));
            }
        }
        self.update()?;
        if problems.is_empty() {
            Ok(())
        } else {
            Err(DeviceError::Config(problems.join("; ")))
        }
    }
}

impl<P: Plotter + ?Sized> Plotter for Box<P> {
    fn options(&self) -> &PlotOptions {
        (**self).options()
    }

    fn options_mut(&mut self) -> &mut PlotOptions {
        (**self).options_mut()
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn update(&mut self) -> Result<(), DeviceError> {
        (**self).update()
    }

    fn pen_up(&mut self) -> Result<(), DeviceError> {
        (**self).pen_up()
    }

    fn pen_down(&mut self) -> Result<(), DeviceError> {
        (**self).pen_down()
    }

    fn goto(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        (**self).goto(x, y)
    }

    fn delay(&mut self, ms: u64) -> Result<(), DeviceError> {
        (**self).delay(ms)
    }

    fn usb_command(&mut self, command: &str) -> Result<String, DeviceError> {
        (**self).usb_command(command)
    }

    fn usb_query(&mut self, query: &str) -> Result<String, DeviceError> {
        (**self).usb_query(query)
    }

    fn position(&self) -> (f64, f64) {
        (**self).position()
    }

    fn is_pen_down(&self) -> bool {
        (**self).is_pen_down()
    }

    fn block(&mut self) -> Result<(), DeviceError> {
        (**self).block()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
