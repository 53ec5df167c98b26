//! Device-wide plot options.
//!
//! The options object is owned by the plotter and assigned attribute by
//! attribute from `options <name> <value>` statements and rc files.  Values
//! arrive already cast (see [`crate::script::cast`]); assignment only checks
//! that the variant matches the field's type.

use thiserror::Error;

use crate::script::cast::{cast_params, CastError};
use crate::script::value::Value;

/// Failure assigning an option.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionError {
    #[error("unknown option '{0}'")]
    Unknown(String),
    #[error("option '{name}' expects {expected}, got {found}")]
    TypeMismatch { name: String, expected: &'static str, found: &'static str },
}

/// Failure casting and assigning an option from raw tokens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssignError {
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    Option(#[from] OptionError),
}

/// Unit system for coordinates (`options units N`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Inches,
    Centimeters,
    Millimeters,
}

impl Units {
    /// Interpret the `units` option value; anything unrecognised is inches.
    pub fn from_option(units: i64) -> Self {
        match units {
            1 => Units::Centimeters,
            2 => Units::Millimeters,
            _ => Units::Inches,
        }
    }

    /// Length of one unit in inches.
    pub fn inches_per_unit(self) -> f64 {
        match self {
            Units::Inches => 1.0,
            Units::Centimeters => 1.0 / 2.54,
            Units::Millimeters => 1.0 / 25.4,
        }
    }
}

/// Settable plotter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    /// Pen-down drawing speed, percent of maximum.
    pub speed_pendown: i64,
    /// Pen-up travel speed, percent of maximum.
    pub speed_penup: i64,
    /// Acceleration, percent of maximum.
    pub accel: i64,
    /// Servo height when lowered, percent.
    pub pen_pos_down: i64,
    /// Servo height when raised, percent.
    pub pen_pos_up: i64,
    pub pen_rate_lower: i64,
    pub pen_rate_raise: i64,
    /// Extra settle time after lowering, ms.
    pub pen_delay_down: i64,
    /// Extra settle time after raising, ms.
    pub pen_delay_up: i64,
    pub const_speed: bool,
    /// Hardware model number.
    pub model: i64,
    /// Pen-lift mechanism selector.
    pub penlift: i64,
    pub port: Option<i64>,
    pub port_config: i64,
    /// 0 inches, 1 centimeters, 2 millimeters.
    pub units: i64,
    /// Return home automatically at the end of a plot.
    pub homing: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            speed_pendown: 25,
            speed_penup: 75,
            accel: 75,
            pen_pos_down: 40,
            pen_pos_up: 60,
            pen_rate_lower: 50,
            pen_rate_raise: 75,
            pen_delay_down: 0,
            pen_delay_up: 0,
            const_speed: false,
            model: 1,
            penlift: 1,
            port: None,
            port_config: 0,
            units: 0,
            homing: true,
        }
    }
}

impl PlotOptions {
    /// Every settable option name.
    pub const NAMES: &'static [&'static str] = &[
        "speed_pendown",
        "speed_penup",
        "accel",
        "pen_pos_down",
        "pen_pos_up",
        "pen_rate_lower",
        "pen_rate_raise",
        "pen_delay_down",
        "pen_delay_up",
        "const_speed",
        "model",
        "penlift",
        "port",
        "port_config",
        "units",
        "homing",
    ];

    pub fn units(&self) -> Units {
        Units::from_option(self.units)
    }

    fn int_field(&mut self, name: &str) -> Option<&mut i64> {
        let field = match name {
            "speed_pendown" => &mut self.speed_pendown,
            "speed_penup" => &mut self.speed_penup,
            "accel" => &mut self.accel,
            "pen_pos_down" => &mut self.pen_pos_down,
            "pen_pos_up" => &mut self.pen_pos_up,
            "pen_rate_lower" => &mut self.pen_rate_lower,
            "pen_rate_raise" => &mut self.pen_rate_raise,
            "pen_delay_down" => &mut self.pen_delay_down,
            "pen_delay_up" => &mut self.pen_delay_up,
            "model" => &mut self.model,
            "penlift" => &mut self.penlift,
            "port_config" => &mut self.port_config,
            "units" => &mut self.units,
            _ => return None,
        };
        Some(field)
    }

    fn bool_field(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "const_speed" => Some(&mut self.const_speed),
            "homing" => Some(&mut self.homing),
            _ => None,
        }
    }

    /// Assign option `name`.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), OptionError> {
        let mismatch = |expected: &'static str, value: &Value| OptionError::TypeMismatch {
            name: name.to_owned(),
            expected,
            found: value.type_name(),
        };

        if name == "port" {
            return match value {
                Value::Int(n) => {
                    self.port = Some(n);
                    Ok(())
                }
                other => Err(mismatch("integer", &other)),
            };
        }
        if let Some(field) = self.int_field(name) {
            return match value {
                Value::Int(n) => {
                    *field = n;
                    Ok(())
                }
                other => Err(mismatch("integer", &other)),
            };
        }
        if let Some(field) = self.bool_field(name) {
            return match value {
                Value::Bool(b) => {
                    *field = b;
                    Ok(())
                }
                other => Err(mismatch("boolean", &other)),
            };
        }
        Err(OptionError::Unknown(name.to_owned()))
    }

    /// Cast the first of `raw` with the converters registered for `name`
    /// and assign it.  Returns the assigned value.
    ///
    /// A name with no registered converter casts to an empty list, so it
    /// fails with [`CastError::MissingArgument`] at index 0.
    pub fn assign<S: AsRef<str>>(&mut self, name: &str, raw: &[S]) -> Result<Value, AssignError> {
        let value = cast_params(name, raw)?
            .into_iter()
            .next()
            .ok_or_else(|| CastError::MissingArgument {
                command: name.to_owned(),
                index: 0,
                arity: 0,
            })?;
        self.set(name, value.clone())?;
        Ok(value)
    }

    /// Read option `name`.  An unset `port` reads as `None`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let v = match name {
            "speed_pendown" => Value::Int(self.speed_pendown),
            "speed_penup" => Value::Int(self.speed_penup),
            "accel" => Value::Int(self.accel),
            "pen_pos_down" => Value::Int(self.pen_pos_down),
            "pen_pos_up" => Value::Int(self.pen_pos_up),
            "pen_rate_lower" => Value::Int(self.pen_rate_lower),
            "pen_rate_raise" => Value::Int(self.pen_rate_raise),
            "pen_delay_down" => Value::Int(self.pen_delay_down),
            "pen_delay_up" => Value::Int(self.pen_delay_up),
            "const_speed" => Value::Bool(self.const_speed),
            "model" => Value::Int(self.model),
            "penlift" => Value::Int(self.penlift),
            "port" => Value::Int(self.port?),
            "port_config" => Value::Int(self.port_config),
            "units" => Value::Int(self.units),
            "homing" => Value::Bool(self.homing),
            _ => return None,
        };
        Some(v)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
