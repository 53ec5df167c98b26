//! Script name → device operation registry.
//!
//! Built once per interpreter.  Each handler receives the already-cast
//! argument list and unpacks it into a typed [`Plotter`] call; a handler
//! that produces a result (queries) returns it so the interpreter can echo
//! it.

use std::collections::HashMap;
use std::path::Path;

use super::{DeviceError, Plotter};
use crate::script::value::Value;

/// A bound capability.
pub type Handler = fn(&mut dyn Plotter, &[Value]) -> Result<Option<Value>, DeviceError>;

/// Registered capabilities, keyed by script name.
#[derive(Clone)]
pub struct CapabilityTable {
    handlers: HashMap<&'static str, Handler>,
}

impl std::fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("names", &self.names())
            .finish()
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl CapabilityTable {
    /// A table with nothing registered.
    pub fn empty() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// The full plotter capability set.
    pub fn standard() -> Self {
        let mut t = Self::empty();
        t.register("goto", |p, a| {
            p.goto(float(a, "goto", 0)?, float(a, "goto", 1)?)?;
            Ok(None)
        });
        t.register("moveto", |p, a| {
            p.moveto(float(a, "moveto", 0)?, float(a, "moveto", 1)?)?;
            Ok(None)
        });
        t.register("lineto", |p, a| {
            p.lineto(float(a, "lineto", 0)?, float(a, "lineto", 1)?)?;
            Ok(None)
        });
        t.register("go", |p, a| {
            p.go(float(a, "go", 0)?, float(a, "go", 1)?)?;
            Ok(None)
        });
        t.register("move", |p, a| {
            p.move_rel(float(a, "move", 0)?, float(a, "move", 1)?)?;
            Ok(None)
        });
        t.register("line", |p, a| {
            p.line(float(a, "line", 0)?, float(a, "line", 1)?)?;
            Ok(None)
        });
        t.register("penup", |p, _| {
            p.pen_up()?;
            Ok(None)
        });
        t.register("pendown", |p, _| {
            p.pen_down()?;
            Ok(None)
        });
        t.register("draw_path", |p, a| {
            let path = match a.first() {
                Some(Value::Path(path)) => path,
                Some(other) => return Err(mismatch("draw_path", 0, "path", other)),
                None => return Err(DeviceError::MissingArgument { command: "draw_path", index: 0 }),
            };
            p.draw_path(path)?;
            Ok(None)
        });
        t.register("delay", |p, a| {
            let ms = int(a, "delay", 0)?;
            let ms = u64::try_from(ms).map_err(|_| DeviceError::Rejected {
                command: "delay".into(),
                response: format!("negative duration {ms}"),
            })?;
            p.delay(ms)?;
            Ok(None)
        });
        t.register("block", |p, _| {
            p.block()?;
            Ok(None)
        });
        t.register("update", |p, _| {
            p.update()?;
            Ok(None)
        });
        t.register("usb_command", |p, a| {
            let reply = p.usb_command(string(a, "usb_command", 0)?)?;
            tracing::debug!(reply = %reply.trim_end(), "usb_command");
            Ok(None)
        });
        t.register("usb_query", |p, a| {
            let reply = p.usb_query(string(a, "usb_query", 0)?)?;
            Ok(Some(Value::Str(reply.trim_end().to_owned())))
        });
        t.register("load_config", |p, a| {
            p.load_config(Path::new(string(a, "load_config", 0)?))?;
            Ok(None)
        });
        t.register("current_pos", |p, _| {
            let (x, y) = p.position();
            Ok(Some(Value::Str(format!("({}, {})", Value::Float(x), Value::Float(y)))))
        });
        t.register("current_pen", |p, _| Ok(Some(Value::Bool(p.is_pen_down()))));
        t
    }

    /// Register (or replace) `name`.
    pub fn register(&mut self, name: &'static str, handler: Handler) {
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// ── Argument unpacking ────────────────────────────────────────────────────────

fn mismatch(command: &'static str, index: usize, expected: &'static str, found: &Value) -> DeviceError {
    DeviceError::ArgumentType { command, index, expected, found: found.type_name() }
}

fn arg<'a>(args: &'a [Value], command: &'static str, index: usize) -> Result<&'a Value, DeviceError> {
    args.get(index)
        .ok_or(DeviceError::MissingArgument { command, index })
}

fn float(args: &[Value], command: &'static str, index: usize) -> Result<f64, DeviceError> {
    let v = arg(args, command, index)?;
    let x = v.as_f64().ok_or_else(|| mismatch(command, index, "float", v))?;
    if !x.is_finite() {
        return Err(DeviceError::NonFinite { command, index, value: x });
    }
    Ok(x)
}

fn int(args: &[Value], command: &'static str, index: usize) -> Result<i64, DeviceError> {
    let v = arg(args, command, index)?;
    v.as_i64().ok_or_else(|| mismatch(command, index, "integer", v))
}

fn string<'a>(args: &'a [Value], command: &'static str, index: usize) -> Result<&'a str, DeviceError> {
    let v = arg(args, command, index)?;
    v.as_str().ok_or_else(|| mismatch(command, index, "string", v))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::VirtualPlotter;

    fn invoke(p: &mut VirtualPlotter, name: &str, args: &[Value]) -> Result<Option<Value>, DeviceError> {
        let handler = CapabilityTable::standard().get(name).expect("registered");
        handler(p, args)
    }

    #[test]
    fn standard_names() {
        let t = CapabilityTable::standard();
        for name in ["goto", "moveto", "lineto", "go", "move", "line", "penup", "pendown",
                     "draw_path", "delay", "usb_command", "usb_query", "load_config"] {
            assert!(t.contains(name), "{name}");
        }
        assert!(t.get("fly").is_none());
    }

    #[test]
    fn moveto_dispatches() {
        let mut p = VirtualPlotter::connected();
        invoke(&mut p, "moveto", &[Value::Float(2.0), Value::Float(3.0)]).unwrap();
        assert_eq!(p.position(), (2.0, 3.0));
    }

    #[test]
    fn missing_argument() {
        let mut p = VirtualPlotter::connected();
        let err = invoke(&mut p, "lineto", &[Value::Float(2.0)]).unwrap_err();
        assert!(matches!(err, DeviceError::MissingArgument { command: "lineto", index: 1 }));
    }

    #[test]
    fn wrong_argument_type() {
        let mut p = VirtualPlotter::connected();
        let err = invoke(&mut p, "usb_query", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, DeviceError::ArgumentType { expected: "string", .. }));
    }

    #[test]
    fn query_returns_value() {
        let mut p = VirtualPlotter::connected();
        let v = invoke(&mut p, "usb_query", &[Value::Str("QC\r".into())]).unwrap();
        assert!(matches!(v, Some(Value::Str(s)) if s.contains(',')));
    }

    #[test]
    fn non_finite_coordinates_rejected() {
        let mut p = VirtualPlotter::connected();
        let err = invoke(&mut p, "goto", &[Value::Float(f64::INFINITY), Value::Float(0.0)]).unwrap_err();
        assert!(matches!(err, DeviceError::NonFinite { command: "goto", index: 0, .. }));
        let err = invoke(&mut p, "lineto", &[Value::Float(1.0), Value::Float(f64::NAN)]).unwrap_err();
        assert!(matches!(err, DeviceError::NonFinite { command: "lineto", index: 1, .. }));
        assert!(p.journal().is_empty());
        assert_eq!(p.position(), (0.0, 0.0));
    }

    #[test]
    fn negative_delay_rejected() {
        let mut p = VirtualPlotter::connected();
        assert!(invoke(&mut p, "delay", &[Value::Int(-5)]).is_err());
    }

    #[test]
    fn current_pos_formats_point() {
        let mut p = VirtualPlotter::connected();
        p.moveto(1.5, 2.0).unwrap();
        let v = invoke(&mut p, "current_pos", &[]).unwrap();
        assert_eq!(v, Some(Value::Str("(1.5, 2.0)".into())));
    }
}
