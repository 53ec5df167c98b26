//! Plot-script statement classification.
//!
//! A script is a sequence of lines; each trimmed, non-empty line is one
//! statement.  The first whitespace-delimited token decides the kind:
//!
//! | Form | Statement |
//! |------|-----------|
//! | `# …` | [`Statement::Comment`] |
//! | `def <name> <body>` | [`Statement::Def`] |
//! | `options <name> <value>` | [`Statement::Option`] |
//! | `pause <message>` | [`Statement::Pause`] |
//! | `<name> <args…>` | [`Statement::Invoke`] (macro or device capability) |
//!
//! `def` and `pause` keep the rest of the line verbatim after the keyword
//! and its single separating space; every other form is split on runs of
//! whitespace.

/// Separator between statements in a macro body.
pub const BODY_SEPARATOR: char = '|';

/// A classified statement borrowing from its source line.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement<'a> {
    Comment(&'a str),
    /// `def <name> <body>`.  `name` is empty when the line is a bare `def`.
    Def { name: &'a str, body: &'a str },
    /// `options [<name> [<value> …]]`.  The tokens after `options`.
    Option { args: Vec<&'a str> },
    Pause { message: &'a str },
    Invoke { name: &'a str, args: Vec<&'a str> },
}

/// Classify one trimmed, non-empty statement.
pub fn parse_statement(line: &str) -> Statement<'_> {
    if line.starts_with('#') {
        return Statement::Comment(line);
    }

    let mut tokens = line.split_whitespace();
    let name = tokens.next().unwrap_or("");

    match name {
        "def" => {
            let rest = keyword_rest(line, "def").trim_start();
            let (name, body) = rest
                .split_once(|c: char| c.is_whitespace())
                .unwrap_or((rest, ""));
            Statement::Def { name, body: body.trim() }
        }
        "options" => Statement::Option { args: tokens.collect() },
        "pause" => Statement::Pause { message: keyword_rest(line, "pause") },
        _ => Statement::Invoke { name, args: tokens.collect() },
    }
}

/// Everything after `keyword` and one separating whitespace character.
fn keyword_rest<'a>(line: &'a str, keyword: &str) -> &'a str {
    let rest = &line[keyword.len()..];
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => chars.as_str(),
        _ => rest,
    }
}

/// Split a macro body into its trimmed, non-empty statements.
pub fn split_body(body: &str) -> impl Iterator<Item = &str> {
    body.split(BODY_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
