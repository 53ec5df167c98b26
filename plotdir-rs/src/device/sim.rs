//! In-memory plotter for dry runs.
//!
//! Tracks pen position and state, accumulates pen-up and pen-down travel,
//! and records every primitive it executes in a journal.  Controller
//! queries are answered with fixed replies shaped like real EBB responses.

use super::{check_finite, DeviceError, PlotOptions, Plotter};

/// Reply to `QC` (current sense, supply voltage).  Above the power threshold.
const QC_REPLY: &str = "0040,0300";

/// A simulated plotter.
#[derive(Debug, Default)]
pub struct VirtualPlotter {
    options: PlotOptions,
    connected: bool,
    pos: (f64, f64),
    pen_down: bool,
    pen_down_distance: f64,
    pen_up_distance: f64,
    elapsed_ms: u64,
    journal: Vec<String>,
}

impl VirtualPlotter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A plotter that is already connected.
    pub fn connected() -> Self {
        Self { connected: true, ..Self::default() }
    }

    /// Every primitive executed, in order (`"pen down"`, `"goto 1.0 2.0"`, …).
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Total distance drawn with the pen lowered, in current units.
    pub fn pen_down_distance(&self) -> f64 {
        self.pen_down_distance
    }

    pub fn pen_up_distance(&self) -> f64 {
        self.pen_up_distance
    }

    /// Accumulated `delay` time.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    fn record(&mut self, entry: String) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        tracing::debug!(target: "plotdir::sim", "{entry}");
        self.journal.push(entry);
        Ok(())
    }
}

impl Plotter for VirtualPlotter {
    fn options(&self) -> &PlotOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut PlotOptions {
        &mut self.options
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.connected = true;
        tracing::info!("virtual plotter connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn update(&mut self) -> Result<(), DeviceError> {
        let entry = format!(
            "update pen_pos_up={} pen_pos_down={}",
            self.options.pen_pos_up, self.options.pen_pos_down
        );
        self.record(entry)
    }

    fn pen_up(&mut self) -> Result<(), DeviceError> {
        if self.pen_down {
            self.record("pen up".into())?;
        }
        self.pen_down = false;
        Ok(())
    }

    fn pen_down(&mut self) -> Result<(), DeviceError> {
        if !self.pen_down {
            self.record("pen down".into())?;
        }
        self.pen_down = true;
        Ok(())
    }

    fn goto(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        check_finite("goto", x, y)?;
        self.record(format!("goto {x} {y}"))?;
        let dist = (x - self.pos.0).hypot(y - self.pos.1);
        if self.pen_down {
            self.pen_down_distance += dist;
        } else {
            self.pen_up_distance += dist;
        }
        self.pos = (x, y);
        Ok(())
    }

    fn delay(&mut self, ms: u64) -> Result<(), DeviceError> {
        self.record(format!("delay {ms}"))?;
        self.elapsed_ms = self.elapsed_ms.saturating_add(ms);
        Ok(())
    }

    fn usb_command(&mut self, command: &str) -> Result<String, DeviceError> {
        self.record(format!("usb_command {}", command.trim_end()))?;
        Ok("OK".into())
    }

    fn usb_query(&mut self, query: &str) -> Result<String, DeviceError> {
        let query = query.trim_end();
        self.record(format!("usb_query {query}"))?;
        let reply = match query {
            "QC" => QC_REPLY.to_owned(),
            "QP" => (if self.pen_down { "0" } else { "1" }).to_owned(),
            "V" => "EBBv13_and_above EB Firmware Version 3.0 (virtual)".to_owned(),
            _ => "OK".to_owned(),
        };
        Ok(reply)
    }

    fn position(&self) -> (f64, f64) {
        self.pos
    }

    fn is_pen_down(&self) -> bool {
        self.pen_down
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
