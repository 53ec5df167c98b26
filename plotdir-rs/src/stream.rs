//! Script streaming with operator pause control.
//!
//! [`StreamController`] feeds a script to an [`Interpreter`] one statement
//! at a time and checks the pause gate before every step, so a `pause`
//! statement (or the operator's pause key) stops the plotter before the
//! next statement, even in the middle of a macro.
//!
//! ```text
//!   Idle ──begin──▶ Running ──pause──▶ Paused
//!                     ▲  │               │
//!                     │  └──end────▶ Completed
//!                     └────resume key────┘
//! ```
//!
//! The keyboard is polled once per script line.  Keys other than the bound
//! pause key are discarded, so a key typed while the plot runs cannot
//! answer a later resume prompt.
//!
//! A pause on the last statement does not wait: there is nothing left to
//! protect.  When the script is exhausted the pen returns home with
//! `moveto 0 0` and `Pen plot completed` is announced.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::device::Plotter;
use crate::script::{Interpreter, RunReport};
use crate::terminal::{write_line, KeySource};

/// How often the keyboard is polled while paused.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Announced when the script has been fully executed.
pub const COMPLETED_MESSAGE: &str = "Pen plot completed";

/// Message used when the operator presses the pause key.
pub const OPERATOR_PAUSE: &str = "operator request";

// ── Types ─────────────────────────────────────────────────────────────────────

/// Operator keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    /// Resumes a paused plot.
    pub resume: char,
    /// Pauses a running plot.  `None` disables the key.
    pub pause: Option<char>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self { resume: 'c', pause: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("File '{}' does not exist.", .0.display())]
    ScriptNotFound(PathBuf),
    #[error("plot paused but no operator terminal is attached")]
    NoOperator,
    #[error(transparent)]
    Io(#[from] io::Error),
}

// ── StreamController ──────────────────────────────────────────────────────────

/// Drives a script through an interpreter under operator control.
pub struct StreamController<K: KeySource> {
    keys: K,
    bindings: KeyBindings,
    poll_interval: Duration,
    state: RunState,
}

impl<K: KeySource> StreamController<K> {
    pub fn new(keys: K) -> Self {
        Self {
            keys,
            bindings: KeyBindings::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: RunState::Idle,
        }
    }

    pub fn with_bindings(mut self, bindings: KeyBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    pub fn bindings(&self) -> KeyBindings {
        self.bindings
    }

    /// Run the script at `path`.  A missing file is reported before any
    /// terminal or device interaction.
    pub fn run_file<D: Plotter>(
        &mut self,
        interp: &mut Interpreter<D>,
        path: &Path,
        out: &mut dyn Write,
    ) -> Result<RunReport, StreamError> {
        if !path.is_file() {
            return Err(StreamError::ScriptNotFound(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        tracing::info!(script = %path.display(), "starting plot");
        self.run_reader(interp, reader, out)
    }

    /// Run every line of `reader`, then return the pen home.
    pub fn run_reader<D: Plotter, R: BufRead>(
        &mut self,
        interp: &mut Interpreter<D>,
        reader: R,
        out: &mut dyn Write,
    ) -> Result<RunReport, StreamError> {
        self.keys.begin()?;
        self.state = RunState::Running;
        let result = self.run_lines(interp, reader, out);
        self.keys.end();
        result?;

        self.finish(interp, out)?;
        self.state = RunState::Completed;
        let report = interp.report();
        tracing::info!(
            statements = report.statements,
            errors = report.errors,
            pauses = report.pauses,
            "plot completed"
        );
        Ok(report)
    }

    fn run_lines<D: Plotter, R: BufRead>(
        &mut self,
        interp: &mut Interpreter<D>,
        reader: R,
        out: &mut dyn Write,
    ) -> Result<(), StreamError> {
        for line in reader.lines() {
            let line = line?;
            // Exactly one poll per line; only the pause key acts.
            let key = self.keys.poll_key()?;
            if key.is_some() && key == self.bindings.pause && !interp.is_paused() {
                interp.request_pause(OPERATOR_PAUSE);
                flush_output(interp, out)?;
            } else if let Some(key) = key {
                tracing::debug!(%key, "ignored key while running");
            }

            interp.submit(&line);
            while interp.has_pending() {
                if interp.is_paused() {
                    self.wait_for_resume(interp, out)?;
                }
                interp.step();
                flush_output(interp, out)?;
            }
        }
        Ok(())
    }

    /// Block until the resume key is pressed.
    fn wait_for_resume<D: Plotter>(
        &mut self,
        interp: &mut Interpreter<D>,
        out: &mut dyn Write,
    ) -> Result<(), StreamError> {
        if !self.keys.is_interactive() {
            return Err(StreamError::NoOperator);
        }
        self.state = RunState::Paused;
        write_line(out, &format!("Plot paused. Press '{}' to continue", self.bindings.resume))?;

        loop {
            thread::sleep(self.poll_interval);
            while let Some(key) = self.keys.poll_key()? {
                if key == self.bindings.resume {
                    write_line(out, "Continuing plot.......")?;
                    interp.resume();
                    self.state = RunState::Running;
                    return Ok(());
                }
                tracing::debug!(%key, "ignored key while paused");
            }
        }
    }

    fn finish<D: Plotter>(&mut self, interp: &mut Interpreter<D>, out: &mut dyn Write) -> Result<(), StreamError> {
        if let Err(e) = interp.device_mut().moveto(0.0, 0.0) {
            interp.report_error(format!("Error executing command moveto: {e}"));
        }
        interp.notify(COMPLETED_MESSAGE);
        interp.output.push(COMPLETED_MESSAGE.to_owned());
        flush_output(interp, out)
    }
}

fn flush_output<D: Plotter>(interp: &mut Interpreter<D>, out: &mut dyn Write) -> Result<(), StreamError> {
    for line in interp.take_output() {
        write_line(out, &line)?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::VirtualPlotter;
    use crate::terminal::{DetachedKeys, ScriptedKeys};

    fn controller(keys: ScriptedKeys) -> StreamController<ScriptedKeys> {
        StreamController::new(keys).with_poll_interval(Duration::ZERO)
    }

    fn run(
        ctl: &mut StreamController<impl KeySource>,
        script: &str,
    ) -> (Interpreter<VirtualPlotter>, Result<RunReport, StreamError>, String) {
        let mut interp = Interpreter::silent(VirtualPlotter::connected());
        let mut out = Vec::new();
        let result = ctl.run_reader(&mut interp, script.as_bytes(), &mut out);
        (interp, result, String::from_utf8(out).unwrap())
    }

    fn gotos(interp: &Interpreter<VirtualPlotter>) -> Vec<String> {
        interp.device().journal().iter().filter(|e| e.starts_with("goto")).cloned().collect()
    }

    #[test]
    fn plain_script_runs_and_returns_home() {
        let mut ctl = controller(ScriptedKeys::new([]).then_idle());
        let (interp, result, out) = run(&mut ctl, "# start\nlineto 1 0\nlineto 1 1\n");
        let report = result.unwrap();
        assert_eq!(report.statements, 3);
        assert_eq!(gotos(&interp), vec!["goto 1 0", "goto 1 1", "goto 0 0"]);
        assert!(!interp.device().is_pen_down());
        assert_eq!(out, "# start\r\nPen plot completed\r\n");
        assert_eq!(ctl.state(), RunState::Completed);
    }

    #[test]
    fn pause_waits_for_resume_key() {
        // Three line polls, then the paused ticks.
        let keys = ScriptedKeys::new([None, None, None, None, Some('x'), None, Some('c')]);
        let mut ctl = controller(keys);
        let (interp, result, out) = run(&mut ctl, "lineto 1 0\npause red pen\nlineto 2 0\n");
        assert_eq!(result.unwrap().pauses, 1);
        assert_eq!(ctl.keys().remaining(), 0);
        assert_eq!(
            out,
            "Plot Paused: red pen\r\n\
             Plot paused. Press 'c' to continue\r\n\
             Continuing plot.......\r\n\
             Pen plot completed\r\n"
        );
        assert_eq!(gotos(&interp), vec!["goto 1 0", "goto 2 0", "goto 0 0"]);
    }

    #[test]
    fn pause_inside_macro_gates_remaining_pieces() {
        let mut ctl = StreamController::new(DetachedKeys);
        let (interp, result, _) = run(&mut ctl, "def m lineto 1 0 | pause swap | lineto 2 0\nm\n");
        assert!(matches!(result, Err(StreamError::NoOperator)));
        assert_eq!(gotos(&interp), vec!["goto 1 0"]);
    }

    #[test]
    fn trailing_pause_does_not_block() {
        let mut ctl = controller(ScriptedKeys::new([]).then_idle());
        let (interp, result, _) = run(&mut ctl, "lineto 1 1\npause all done\n");
        assert_eq!(result.unwrap().pauses, 1);
        assert_eq!(interp.device().position(), (0.0, 0.0));
    }

    #[test]
    fn detached_keys_abort_on_pause() {
        let mut ctl = StreamController::new(DetachedKeys);
        let (interp, result, _) = run(&mut ctl, "lineto 1 0\npause red\nlineto 2 0\n");
        assert!(matches!(result, Err(StreamError::NoOperator)));
        assert_eq!(gotos(&interp), vec!["goto 1 0"]);
        assert_ne!(ctl.state(), RunState::Completed);
    }

    #[test]
    fn pause_key_pauses_before_next_line() {
        let bindings = KeyBindings { resume: 'c', pause: Some('p') };
        let keys = ScriptedKeys::new([None, Some('p'), None, Some('c')]).then_idle();
        let mut ctl = controller(keys).with_bindings(bindings);
        let (interp, result, out) = run(&mut ctl, "lineto 1 0\nlineto 2 0\nlineto 3 0\n");
        assert_eq!(result.unwrap().pauses, 1);
        assert!(out.starts_with("Plot Paused: operator request\r\n"), "{out}");
        assert_eq!(gotos(&interp), vec!["goto 1 0", "goto 2 0", "goto 3 0", "goto 0 0"]);
    }

    #[test]
    fn keys_typed_while_running_are_discarded() {
        let mut ctl = controller(ScriptedKeys::new([Some('c')]).then_idle());
        let (_, result, _) = run(&mut ctl, "delay 1\ndelay 2\n");
        result.unwrap();
        assert_eq!(ctl.keys().remaining(), 0);
    }

    #[test]
    fn stray_resume_key_does_not_skip_pause() {
        // 'c' pressed during line 1; the pause must still wait for a fresh one.
        let keys = ScriptedKeys::new([Some('c'), None, None, None, Some('c')]);
        let mut ctl = controller(keys);
        let (interp, result, out) = run(&mut ctl, "lineto 1 0\npause red\nlineto 2 0\n");
        result.unwrap();
        assert_eq!(ctl.keys().remaining(), 0);
        assert!(out.contains("Plot paused. Press 'c' to continue\r\nContinuing plot"), "{out}");
        assert_eq!(gotos(&interp), vec!["goto 1 0", "goto 2 0", "goto 0 0"]);
    }

    #[test]
    fn errors_are_reported_and_run_continues() {
        let mut ctl = controller(ScriptedKeys::new([]).then_idle());
        let (interp, result, out) = run(&mut ctl, "lineto x 1\nlineto 1 1\n");
        assert_eq!(result.unwrap().errors, 1);
        assert!(out.starts_with("Error executing command lineto: "), "{out}");
        assert_eq!(gotos(&interp), vec!["goto 1 1", "goto 0 0"]);
    }

    #[test]
    fn missing_script_checked_first() {
        let mut ctl = controller(ScriptedKeys::new([Some('c')]));
        let mut interp = Interpreter::silent(VirtualPlotter::connected());
        let mut out = Vec::new();
        let err = ctl
            .run_file(&mut interp, Path::new("/nonexistent/plot.txt"), &mut out)
            .unwrap_err();
        assert_eq!(err.to_string(), "File '/nonexistent/plot.txt' does not exist.");
        assert_eq!(ctl.keys().remaining(), 1);
        assert!(interp.device().journal().is_empty());
        assert!(out.is_empty());
        assert_eq!(ctl.state(), RunState::Idle);
    }

    #[test]
    fn run_file_reads_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.txt");
        std::fs::write(&path, "moveto 1 1\nlineto 2 2\n").unwrap();
        let mut ctl = controller(ScriptedKeys::new([]).then_idle());
        let mut interp = Interpreter::silent(VirtualPlotter::connected());
        let mut out = Vec::new();
        let report = ctl.run_file(&mut interp, &path, &mut out).unwrap();
        assert_eq!(report.statements, 2);
        assert_eq!(interp.device().position(), (0.0, 0.0));
    }
}
