//! Plot-script interpreter: the statement dispatcher.
//!
//! The [`Interpreter`] owns the plotter, the macro table, and the pause
//! flag.  Statements enter a work queue through [`Interpreter::submit`] and
//! leave it one at a time through [`Interpreter::step`], so a caller (the
//! [stream controller](crate::stream)) can check the pause gate between any
//! two statements, including statements produced by macro expansion.
//!
//! Dispatch order for one statement:
//!
//! 1. comment → echoed
//! 2. `def` → macro table
//! 3. `options` → cast and assign on the device options
//! 4. `pause` → notify, echo, set the pause flag
//! 5. macro name → body pieces queued in front, in order
//! 6. anything else → cast arguments, invoke the device capability
//!
//! Errors are reported to [`Interpreter::output`] and counted; they never
//! stop the run.

use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;

use crate::device::{AssignError, CapabilityTable, DeviceError, Plotter};
use crate::macros::MacroTable;
use crate::notify::{Notify, NullNotifier};
use super::{
    cast::{cast_params, CastError},
    stmt::{parse_statement, split_body, Statement},
    value::Value,
};

/// Prefix of every pause message.
pub const PAUSE_PREFIX: &str = "Plot Paused: ";

// ── ExecError ─────────────────────────────────────────────────────────────────

/// Why a macro invocation or device operation failed.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("macro cycle: {}", .chain.join(" -> "))]
    MacroCycle { chain: Vec<String> },
}

// ── RunReport ─────────────────────────────────────────────────────────────────

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Statements dispatched, including macro-expanded ones.
    pub statements: usize,
    /// Errors reported.
    pub errors: usize,
    /// Pauses requested.
    pub pauses: usize,
}

// ── Pending ───────────────────────────────────────────────────────────────────

/// A queued statement and the macros it was expanded from, outermost first.
#[derive(Debug)]
struct Pending {
    text: String,
    chain: Rc<Vec<String>>,
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// The plot-script interpreter.
pub struct Interpreter<D: Plotter> {
    device: D,
    notifier: Box<dyn Notify>,
    capabilities: CapabilityTable,
    macros: MacroTable,
    queue: VecDeque<Pending>,
    paused: bool,
    report: RunReport,
    /// Lines for the operator: echoed comments, pause messages, query
    /// results, and error reports.  Drained by the caller.
    pub output: Vec<String>,
}

impl<D: Plotter> Interpreter<D> {
    /// An interpreter with the standard capability set.
    pub fn new(device: D, notifier: Box<dyn Notify>) -> Self {
        Self::with_capabilities(device, notifier, CapabilityTable::standard())
    }

    /// An interpreter that discards notifications.
    pub fn silent(device: D) -> Self {
        Self::new(device, Box::new(NullNotifier))
    }

    pub fn with_capabilities(device: D, notifier: Box<dyn Notify>, capabilities: CapabilityTable) -> Self {
        Interpreter {
            device,
            notifier,
            capabilities,
            macros: MacroTable::new(),
            queue: VecDeque::new(),
            paused: false,
            report: RunReport::default(),
            output: Vec::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Define (or overwrite) a macro without going through a `def` line.
    pub fn define_macro(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.macros.define(name, body);
    }

    /// Cast `raw` and assign it to option `name` on the device.
    pub fn set_option(&mut self, name: &str, raw: &str) -> Result<Value, AssignError> {
        self.device.options_mut().assign(name, &[raw])
    }

    pub fn report(&self) -> RunReport {
        self.report
    }

    /// Drain and return [`output`](Self::output).
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    // ── Pause flag ────────────────────────────────────────────────────────────

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause with message `Plot Paused: <message>`: notify, echo, and set
    /// the flag.
    pub fn request_pause(&mut self, message: &str) {
        let msg = format!("{PAUSE_PREFIX}{message}");
        self.notifier.notify(&msg);
        tracing::info!(message = %msg, "plot paused");
        self.output.push(msg);
        self.paused = true;
        self.report.pauses += 1;
    }

    /// Clear the pause flag.
    pub fn resume(&mut self) {
        if self.paused {
            tracing::info!("plot resumed");
        }
        self.paused = false;
    }

    /// Send a status message through the notifier.
    pub fn notify(&self, message: &str) {
        self.notifier.notify(message);
    }

    /// Report a recoverable error to the operator.
    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(%message, "statement error");
        self.output.push(message);
        self.report.errors += 1;
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Queue one line.  Surrounding whitespace is trimmed; blank lines are
    /// ignored.
    pub fn submit(&mut self, line: &str) {
        let text = line.trim();
        if text.is_empty() {
            return;
        }
        self.queue.push_back(Pending { text: text.to_owned(), chain: Rc::default() });
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Dispatch the next queued statement.  Returns `false` if the queue
    /// was empty.
    pub fn step(&mut self) -> bool {
        let Some(Pending { text, chain }) = self.queue.pop_front() else {
            return false;
        };
        self.report.statements += 1;
        self.dispatch(&text, &chain);
        true
    }

    /// Submit `line` and run it (and any macro expansion) to completion,
    /// without honouring the pause flag.
    pub fn exec(&mut self, line: &str) {
        self.submit(line);
        while self.step() {}
    }

    fn dispatch(&mut self, text: &str, chain: &Rc<Vec<String>>) {
        tracing::debug!(statement = text, depth = chain.len(), "dispatch");
        match parse_statement(text) {
            Statement::Comment(comment) => self.output.push(comment.to_owned()),
            Statement::Def { name: "", .. } => self.report_error("No macro name specified"),
            Statement::Def { name, body } => {
                if self.macros.define(name, body).is_some() {
                    tracing::debug!(name, "macro redefined");
                }
            }
            Statement::Option { args } => self.exec_option(&args),
            Statement::Pause { message } => self.request_pause(message),
            Statement::Invoke { name, args } => {
                if let Err(e) = self.invoke(name, &args, chain) {
                    self.report_error(format!("Error executing command {name}: {e}"));
                }
            }
        }
    }

    fn exec_option(&mut self, args: &[&str]) {
        let [name, value, ..] = args else {
            self.report_error("No option name/value pair specified");
            return;
        };
        match self.device.options_mut().assign(name, &[*value]) {
            Ok(v) => tracing::debug!(option = *name, value = %v, "option set"),
            Err(e) => self.report_error(format!("Error setting option '{name}' to '{value}': {e}")),
        }
    }

    fn invoke(&mut self, name: &str, args: &[&str], chain: &Rc<Vec<String>>) -> Result<(), ExecError> {
        if let Some(body) = self.macros.get(name) {
            let mut expanded = Vec::with_capacity(chain.len() + 1);
            expanded.extend(chain.iter().cloned());
            expanded.push(name.to_owned());
            if chain.iter().any(|n| n == name) {
                return Err(ExecError::MacroCycle { chain: expanded });
            }

            let expanded = Rc::new(expanded);
            let pieces: Vec<Pending> = split_body(body)
                .map(|text| Pending { text: text.to_owned(), chain: Rc::clone(&expanded) })
                .collect();
            for piece in pieces.into_iter().rev() {
                self.queue.push_front(piece);
            }
            return Ok(());
        }

        let params = cast_params(name, args)?;
        let handler = self
            .capabilities
            .get(name)
            .ok_or_else(|| ExecError::UnknownCommand(name.to_owned()))?;
        if let Some(result) = handler(&mut self.device, &params)? {
            self.output.push(format!("{name}: {result}"));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::VirtualPlotter;
    use std::cell::RefCell;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Notify for Recorder {
        fn notify(&self, message: &str) {
            self.0.borrow_mut().push(message.to_owned());
        }
    }

    fn interp() -> Interpreter<VirtualPlotter> {
        Interpreter::silent(VirtualPlotter::connected())
    }

    fn run(src: &str) -> Interpreter<VirtualPlotter> {
        let mut i = interp();
        for line in src.lines() {
            i.exec(line);
        }
        i
    }

    #[test]
    fn comment_echoed_without_side_effects() {
        let i = run("# note");
        assert_eq!(i.output, vec!["# note"]);
        assert!(i.device().journal().is_empty());
        assert!(i.macros().is_empty());
        assert_eq!(i.report().errors, 0);
    }

    #[test]
    fn def_does_not_execute() {
        let i = run("def sq lineto 1 0 | lineto 1 1");
        assert!(i.device().journal().is_empty());
        assert_eq!(i.macros().get("sq"), Some("lineto 1 0 | lineto 1 1"));
    }

    #[test]
    fn def_without_name_reported() {
        let i = run("def");
        assert_eq!(i.output, vec!["No macro name specified"]);
        assert_eq!(i.report().errors, 1);
    }

    #[test]
    fn option_cast_and_set() {
        let i = run("options speed_pendown 25\noptions const_speed true");
        assert_eq!(i.device().options().speed_pendown, 25);
        assert!(i.device().options().const_speed);
        assert!(i.output.is_empty());
    }

    #[test]
    fn option_without_value() {
        let i = run("options speed_pendown");
        assert_eq!(i.output, vec!["No option name/value pair specified"]);
        let i = run("options");
        assert_eq!(i.output, vec!["No option name/value pair specified"]);
    }

    #[test]
    fn option_without_converter_reported() {
        let i = run("options colour red");
        assert_eq!(i.report().errors, 1);
        assert!(i.output[0].starts_with("Error setting option 'colour' to 'red': "), "{}", i.output[0]);
        assert!(i.output[0].contains("out of range"));
    }

    #[test]
    fn option_bad_value_reported() {
        let i = run("options accel fast\noptions accel 40");
        assert_eq!(i.report().errors, 1);
        assert_eq!(i.device().options().accel, 40);
    }

    #[test]
    fn pause_sets_flag_and_notifies() {
        let rec = Recorder::default();
        let mut i = Interpreter::new(VirtualPlotter::connected(), Box::new(rec.clone()));
        i.exec("pause swap to red pen");
        assert!(i.is_paused());
        assert_eq!(i.output, vec!["Plot Paused: swap to red pen"]);
        assert_eq!(*rec.0.borrow(), vec!["Plot Paused: swap to red pen"]);
        i.resume();
        assert!(!i.is_paused());
    }

    #[test]
    fn device_command_invoked() {
        let i = run("lineto 1.5 2");
        assert_eq!(i.device().position(), (1.5, 2.0));
        assert!(i.device().is_pen_down());
    }

    #[test]
    fn cast_error_names_command_and_continues() {
        let i = run("lineto 1.5 abc\nmoveto 1 1");
        assert_eq!(i.report().errors, 1);
        assert!(i.output[0].starts_with("Error executing command lineto: "), "{}", i.output[0]);
        assert_eq!(i.device().position(), (1.0, 1.0));
    }

    #[test]
    fn unknown_command_is_typed_error() {
        let mut i = interp();
        let err = i.invoke("fly", &["1"], &Rc::default()).unwrap_err();
        assert!(matches!(err, ExecError::UnknownCommand(ref n) if n == "fly"));
    }

    #[test]
    fn zero_arity_command_ignores_extra_tokens() {
        let i = run("pendown now please");
        assert!(i.device().is_pen_down());
        assert_eq!(i.report().errors, 0);
    }

    #[test]
    fn macro_expands_in_order() {
        let i = run("def sq moveto 0 0 | lineto 1 0 | lineto 1 1\nsq");
        let goto: Vec<&String> = i.device().journal().iter().filter(|e| e.starts_with("goto")).collect();
        assert_eq!(goto, vec!["goto 0 0", "goto 1 0", "goto 1 1"]);
    }

    #[test]
    fn nested_macros() {
        let i = run("def a lineto 1 0\ndef b a | lineto 2 0\nb");
        assert_eq!(i.device().position(), (2.0, 0.0));
        assert_eq!(i.report().errors, 0);
    }

    #[test]
    fn redefinition_uses_new_body() {
        let i = run("def m lineto 1 1\ndef m lineto 2 2\nm");
        assert_eq!(i.device().position(), (2.0, 2.0));
        assert!(!i.device().journal().contains(&"goto 1 1".to_owned()));
    }

    #[test]
    fn self_recursive_macro_reports_cycle() {
        let i = run("def spin lineto 1 1 | spin");
        assert!(i.output.is_empty());
        let i = run("def spin lineto 1 1 | spin\nspin");
        assert_eq!(i.report().errors, 1);
        assert!(i.output[0].contains("macro cycle: spin -> spin"), "{}", i.output[0]);
    }

    #[test]
    fn mutual_recursion_reports_cycle() {
        let i = run("def a b\ndef b a\na");
        assert_eq!(i.report().errors, 1);
        assert!(i.output[0].contains("macro cycle: a -> b -> a"), "{}", i.output[0]);
    }

    #[test]
    fn repeated_non_recursive_macro_is_not_a_cycle() {
        let i = run("def dot pendown | penup\ndef two dot | dot\ntwo");
        assert_eq!(i.report().errors, 0);
        assert_eq!(i.report().statements, 1 + 1 + 1 + 2 + 4);
    }

    #[test]
    fn pause_inside_macro_stops_stepping_point() {
        let mut i = interp();
        i.exec("def swap lineto 1 0 | pause change pen | lineto 2 0");
        i.submit("swap");
        assert!(i.step()); // swap → expands
        assert!(i.step()); // lineto 1 0
        assert!(i.step()); // pause
        assert!(i.is_paused());
        assert_eq!(i.device().position(), (1.0, 0.0));
        assert!(i.has_pending());
    }

    #[test]
    fn query_result_echoed() {
        let i = run("usb_query QC");
        assert_eq!(i.output, vec!["usb_query: 0040,0300"]);
    }

    #[test]
    fn draw_path_literal() {
        let i = run("draw_path [(0,0),(2,0),(2,2)]");
        assert_eq!(i.device().position(), (2.0, 2.0));
        assert!(!i.device().is_pen_down());
    }

    #[test]
    fn malformed_path_reported() {
        let i = run("draw_path [(0,0),(2,0]");
        assert_eq!(i.report().errors, 1);
        assert!(i.output[0].starts_with("Error executing command draw_path: malformed path literal"));
    }

    #[test]
    fn set_option_direct() {
        let mut i = interp();
        assert_eq!(i.set_option("units", "2").unwrap(), Value::Int(2));
        assert!(i.set_option("units", "mm").is_err());
    }

    #[test]
    fn custom_capability_table() {
        let mut table = CapabilityTable::empty();
        table.register("home", |p, _| {
            p.moveto(0.0, 0.0)?;
            Ok(None)
        });
        let mut i = Interpreter::with_capabilities(VirtualPlotter::connected(), Box::new(NullNotifier), table);
        i.exec("lineto 1 1");
        assert_eq!(i.report().errors, 1);
        assert!(i.output[0].contains("unknown command 'lineto'"));
    }
}
