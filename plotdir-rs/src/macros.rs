//! Macro table.
//!
//! A macro is a named body of one or more statements joined by `|`, created
//! by `def <name> <body>` and expanded by bare invocation of `<name>`.
//! Expansion is purely textual and takes no parameters.  Bodies are stored
//! exactly as written and split only when invoked.  A later `def` of the
//! same name replaces the earlier body.
//!
//! The table belongs to one [`Interpreter`](crate::script::Interpreter), so
//! definitions never leak between runs.

use std::collections::HashMap;

// ── MacroTable ────────────────────────────────────────────────────────────────

/// Name → raw body store.
#[derive(Debug, Default, Clone)]
pub struct MacroTable {
    defs: HashMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or overwrite) a macro.  Returns the previous body, if any.
    pub fn define(&mut self, name: impl Into<String>, body: impl Into<String>) -> Option<String> {
        self.defs.insert(name.into(), body.into())
    }

    /// The raw body of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.defs.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Iterate over all definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .defs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
