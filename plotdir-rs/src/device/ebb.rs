//! EiBotBoard serial backend.
//!
//! Speaks the EBB ASCII protocol used by AxiDraw/NextDraw-class plotters:
//! one `\r`-terminated command per line, answered by `OK` (or a data line
//! followed by `OK`, or an `!`-prefixed error).
//!
//! [`EbbProtocol`] holds the pure command formatting and step arithmetic and
//! is testable without a port; [`EbbPlotter`] owns a [`Link`] and the
//! plotter state, and implements [`Plotter`] on top of the protocol.
//!
//! Motion is simple: every straight segment becomes one
//! constant-speed `SM` command.  There is no acceleration planning.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{check_finite, DeviceError, PlotOptions, Plotter};

/// Motor steps per inch of carriage travel (16× microstepping).
pub const STEPS_PER_INCH: f64 = 2032.0;
/// Carriage speed at 100 % (`speed_pendown` / `speed_penup`), inches/s.
pub const MAX_SPEED_IPS: f64 = 8.6869;
/// Servo pulse width at 0 % pen height (units of 83.3 ns).
pub const SERVO_MIN: i64 = 9855;
/// Servo pulse width at 100 % pen height.
pub const SERVO_MAX: i64 = 27831;
/// Full-sweep servo time at 100 % rate, ms.
const SERVO_SWEEP_MS: i64 = 500;
const QM_POLL: Duration = Duration::from_millis(10);
/// Queries whose data line is not followed by `OK`.
const UNTERMINATED_QUERIES: &[&str] = &["V", "QM", "QG"];

// ── Link ──────────────────────────────────────────────────────────────────────

/// A line-oriented connection to the controller.
pub trait Link {
    /// Send one command (without terminator).
    fn send(&mut self, line: &str) -> io::Result<()>;
    /// Read one reply line, terminator stripped.
    fn read_line(&mut self) -> io::Result<String>;
}

/// A [`Link`] over a serial device node such as `/dev/ttyACM0`.
pub struct SerialLink {
    reader: BufReader<File>,
    writer: File,
}

impl SerialLink {
    pub fn open(path: &Path) -> io::Result<Self> {
        let writer = OpenOptions::new().read(true).write(true).open(path)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }
}

impl Link for SerialLink {
    fn send(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\r")?;
        self.writer.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        loop {
            let mut buf = String::new();
            if self.reader.read_line(&mut buf)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "controller closed the port"));
            }
            // Replies end in "\r\n"; a stray "\r" can leave an empty line behind.
            let line = buf.trim();
            if !line.is_empty() {
                return Ok(line.to_owned());
            }
        }
    }
}

// ── Protocol (pure, testable) ─────────────────────────────────────────────────

/// Command formatting and unit/step conversion.
pub struct EbbProtocol;

impl EbbProtocol {
    /// Servo pulse width for a pen height percentage.
    pub fn servo_position(percent: i64) -> i64 {
        let pct = percent.clamp(0, 100);
        SERVO_MIN + (SERVO_MAX - SERVO_MIN) * pct / 100
    }

    /// Servo slew rate (pulse-width change per 24 ms) for a rate percentage.
    pub fn servo_rate(percent: i64) -> i64 {
        let pct = percent.clamp(1, 100);
        ((SERVO_MAX - SERVO_MIN) * 24 * pct / (SERVO_SWEEP_MS * 100)).max(1)
    }

    /// Commands that push pen heights and rates to the controller.
    pub fn config_commands(opts: &PlotOptions) -> Vec<String> {
        vec![
            format!("SC,4,{}", Self::servo_position(opts.pen_pos_up)),
            format!("SC,5,{}", Self::servo_position(opts.pen_pos_down)),
            format!("SC,11,{}", Self::servo_rate(opts.pen_rate_raise)),
            format!("SC,12,{}", Self::servo_rate(opts.pen_rate_lower)),
        ]
    }

    /// `SP` command for raising (`up`) or lowering the pen.
    pub fn pen_command(up: bool, opts: &PlotOptions) -> String {
        let delay = if up { opts.pen_delay_up } else { opts.pen_delay_down };
        format!("SP,{},{}", if up { 1 } else { 0 }, delay.max(0))
    }

    /// Absolute motor-step position for `(x, y)` in current units.
    ///
    /// The carriage is belt-coupled: motor 1 turns with `x + y`, motor 2 with
    /// `x - y`.
    pub fn motor_steps(x: f64, y: f64, opts: &PlotOptions) -> (i64, i64) {
        let k = opts.units().inches_per_unit() * STEPS_PER_INCH;
        (((x + y) * k).round() as i64, ((x - y) * k).round() as i64)
    }

    /// Carriage speed in inches/s for the current pen state.
    pub fn speed_ips(pen_down: bool, opts: &PlotOptions) -> f64 {
        let pct = if pen_down { opts.speed_pendown } else { opts.speed_penup };
        MAX_SPEED_IPS * (pct.clamp(1, 110) as f64) / 100.0
    }

    /// `SM` command moving by `steps` over the time it takes to cover
    /// `distance_in` at `speed_ips`.  `None` when there is nothing to move.
    pub fn move_command(steps: (i64, i64), distance_in: f64, speed_ips: f64) -> Option<String> {
        if steps == (0, 0) {
            return None;
        }
        let ms = ((distance_in / speed_ips) * 1000.0).ceil().max(1.0) as u64;
        Some(format!("SM,{ms},{},{}", steps.0, steps.1))
    }

    /// `SM` command that only waits.
    pub fn delay_command(ms: u64) -> String {
        format!("SM,{ms},0,0")
    }

    /// `true` once `QM` reports no command executing and an empty FIFO.
    pub fn motion_idle(qm_reply: &str) -> bool {
        let mut fields = qm_reply.trim().split(',');
        fields.next() == Some("QM") && fields.all(|f| f == "0")
    }
}

// ── EbbPlotter ────────────────────────────────────────────────────────────────

/// A plotter driven over an EBB [`Link`].
pub struct EbbPlotter {
    path: PathBuf,
    link: Option<Box<dyn Link>>,
    options: PlotOptions,
    pos: (f64, f64),
    steps: (i64, i64),
    pen_down: bool,
}

impl EbbPlotter {
    /// A plotter that will open `path` on [`connect`](Plotter::connect).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            link: None,
            options: PlotOptions::default(),
            pos: (0.0, 0.0),
            steps: (0, 0),
            pen_down: false,
        }
    }

    /// A plotter using an already-open link.
    pub fn with_link(link: Box<dyn Link>) -> Self {
        Self { link: Some(link), ..Self::new("") }
    }

    fn link(&mut self) -> Result<&mut Box<dyn Link>, DeviceError> {
        self.link.as_mut().ok_or(DeviceError::NotConnected)
    }

    /// Send a command and wait for `OK`.  Returns the reply.
    fn command(&mut self, cmd: &str) -> Result<String, DeviceError> {
        tracing::debug!(target: "plotdir::ebb", cmd, "send");
        let link = self.link()?;
        link.send(cmd)?;
        let reply = link.read_line()?;
        if reply.starts_with('!') {
            return Err(DeviceError::Rejected { command: cmd.to_owned(), response: reply });
        }
        Ok(reply)
    }

    /// Send a query; returns its data line, consuming the trailing `OK`
    /// where the controller sends one.
    fn query(&mut self, q: &str) -> Result<String, DeviceError> {
        let first = self.command(q)?;
        let name = q.split(',').next().unwrap_or(q);
        if first != "OK" && !UNTERMINATED_QUERIES.contains(&name) {
            let link = self.link()?;
            let ok = link.read_line()?;
            if ok != "OK" {
                tracing::warn!(target: "plotdir::ebb", query = q, reply = %ok, "expected OK after query data");
            }
        }
        Ok(first)
    }
}

/// Strip the terminator a script may have included (`usb_query QC\r`).
fn bare(cmd: &str) -> &str {
    cmd.trim_end_matches(['\r', '\n'])
}

impl Plotter for EbbPlotter {
    fn options(&self) -> &PlotOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut PlotOptions {
        &mut self.options
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        if self.link.is_none() {
            let link = SerialLink::open(&self.path)?;
            self.link = Some(Box::new(link));
        }
        self.command("EM,1,1")?;
        self.update()?;
        tracing::info!(target: "plotdir::ebb", port = %self.path.display(), "connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.link = None;
    }

    fn update(&mut self) -> Result<(), DeviceError> {
        for cmd in EbbProtocol::config_commands(&self.options) {
            self.command(&cmd)?;
        }
        Ok(())
    }

    fn pen_up(&mut self) -> Result<(), DeviceError> {
        if self.pen_down {
            let cmd = EbbProtocol::pen_command(true, &self.options);
            self.command(&cmd)?;
            self.pen_down = false;
        }
        Ok(())
    }

    fn pen_down(&mut self) -> Result<(), DeviceError> {
        if !self.pen_down {
            let cmd = EbbProtocol::pen_command(false, &self.options);
            self.command(&cmd)?;
            self.pen_down = true;
        }
        Ok(())
    }

    fn goto(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        check_finite("goto", x, y)?;
        let target = EbbProtocol::motor_steps(x, y, &self.options);
        let delta = (target.0.saturating_sub(self.steps.0), target.1.saturating_sub(self.steps.1));
        let inches = (x - self.pos.0).hypot(y - self.pos.1) * self.options.units().inches_per_unit();
        let speed = EbbProtocol::speed_ips(self.pen_down, &self.options);
        if let Some(cmd) = EbbProtocol::move_command(delta, inches, speed) {
            self.command(&cmd)?;
        }
        self.steps = target;
        self.pos = (x, y);
        Ok(())
    }

    fn delay(&mut self, ms: u64) -> Result<(), DeviceError> {
        if ms > 0 {
            self.command(&EbbProtocol::delay_command(ms))?;
        }
        Ok(())
    }

    fn usb_command(&mut self, command: &str) -> Result<String, DeviceError> {
        self.command(bare(command))
    }

    fn usb_query(&mut self, query: &str) -> Result<String, DeviceError> {
        self.query(bare(query))
    }

    fn position(&self) -> (f64, f64) {
        self.pos
    }

    fn is_pen_down(&self) -> bool {
        self.pen_down
    }

    fn block(&mut self) -> Result<(), DeviceError> {
        loop {
            let reply = self.query("QM")?;
            if EbbProtocol::motion_idle(&reply) {
                return Ok(());
            }
            std::thread::sleep(QM_POLL);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
