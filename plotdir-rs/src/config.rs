//! rc-file configuration loader.
//!
//! An rc file is a plot script restricted to the statements that configure
//! a run without touching the plotter:
//!
//! | Statement | Action |
//! |-----------|--------|
//! | `options <name> <value>` | option applied before the script runs |
//! | `def <name> <body>` | macro available to the script |
//! | `# …` and blank lines | ignored |
//! | anything else | line-numbered [`ConfigError`], line skipped |
//!
//! Option values are kept raw here; they are cast when applied, so a bad
//! value is reported by the same path that reports it in a script.

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use thiserror::Error;

use crate::script::stmt::{parse_statement, Statement};

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading an rc file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// One `options <name> <value>` line.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSetting {
    pub line: usize,
    pub name: String,
    pub value: String,
}

/// Parsed rc file: option settings and macro definitions, in file order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub options: Vec<OptionSetting>,
    pub macros: Vec<(String, String)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rc-file text.  Returns the config and any errors on lines that
    /// were skipped.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let line = i + 1;
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }

            match parse_statement(text) {
                Statement::Comment(_) => {}
                Statement::Option { args } => match args.as_slice() {
                    [name, value, ..] => config.options.push(OptionSetting {
                        line,
                        name: (*name).to_owned(),
                        value: (*value).to_owned(),
                    }),
                    _ => errors.push(ConfigError {
                        line,
                        message: "No option name/value pair specified".into(),
                    }),
                },
                Statement::Def { name: "", .. } => errors.push(ConfigError {
                    line,
                    message: "No macro name specified".into(),
                }),
                Statement::Def { name, body } => {
                    config.macros.push((name.to_owned(), body.to_owned()));
                }
                Statement::Pause { .. } | Statement::Invoke { .. } => errors.push(ConfigError {
                    line,
                    message: format!("not allowed in a config file: {text}"),
                }),
            }
        }

        (config, errors)
    }

    /// Read and parse an rc file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }
}

// ── Search path ───────────────────────────────────────────────────────────────

/// Candidate rc-file locations, in priority order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        paths.push(base.home_dir().join(".plotdirrc"));
    }
    if let Some(proj) = ProjectDirs::from("", "", "plotdir") {
        paths.push(proj.config_dir().join("plotdirrc"));
    }
    paths.push(PathBuf::from("./.plotdirrc"));
    paths.push(PathBuf::from("./plotdirrc"));
    paths
}

/// The first rc file that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    search_paths().into_iter().find(|p| p.is_file())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_and_macros() {
        let (cfg, errors) = Config::load_str(
            "# pens\noptions pen_pos_up 70\n\ndef sq lineto 1 0 | lineto 1 1\n",
        );
        assert!(errors.is_empty());
        assert_eq!(
            cfg.options,
            vec![OptionSetting { line: 2, name: "pen_pos_up".into(), value: "70".into() }]
        );
        assert_eq!(cfg.macros, vec![("sq".into(), "lineto 1 0 | lineto 1 1".into())]);
    }

    #[test]
    fn device_statements_rejected_with_line_numbers() {
        let (cfg, errors) = Config::load_str("options units 2\nmoveto 1 1\npause now\n");
        assert_eq!(cfg.options.len(), 1);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 2);
        assert_eq!(errors[1].line, 3);
        assert!(errors[0].to_string().starts_with("line 2: "));
    }

    #[test]
    fn option_without_value() {
        let (cfg, errors) = Config::load_str("options speed_penup\n");
        assert!(cfg.options.is_empty());
        assert_eq!(errors[0].message, "No option name/value pair specified");
    }

    #[test]
    fn def_without_name() {
        let (_, errors) = Config::load_str("def\n");
        assert_eq!(errors[0].message, "No macro name specified");
    }

    #[test]
    fn load_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plotdirrc");
        std::fs::write(&path, "options model 2\n").unwrap();
        let (cfg, errors) = Config::load_file(&path).unwrap();
        assert!(errors.is_empty());
        assert_eq!(cfg.options[0].value, "2");
    }

    #[test]
    fn search_paths_end_with_cwd() {
        let paths = search_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("./plotdirrc")));
    }
}
