//! Operator terminal: raw-mode handling, key polling, and line output.
//!
//! While a script runs, the controlling terminal is put in raw mode so a
//! single key press can be observed without waiting for Enter and without
//! blocking statement processing.  Key presses are read through the
//! [`KeySource`] trait:
//!
//! * [`CrosstermKeys`]: the real terminal, via crossterm's event queue.
//! * [`DetachedKeys`]: no terminal attached (stdin is a pipe or file).
//! * [`ScriptedKeys`]: a fixed key sequence, for tests and replays.
//!
//! Raw mode disables the terminal's own newline translation, so every line
//! written during a run must end in `\r\n`; use [`write_line`], or wrap a
//! writer whose lines come from elsewhere (log records) in [`CrlfWriter`].

use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, terminal};

// ── KeySource ─────────────────────────────────────────────────────────────────

/// Non-blocking source of operator key presses.
pub trait KeySource {
    /// Called once before the first line of a run.
    fn begin(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called once after the last line, including after errors.
    fn end(&mut self) {}

    /// Return the next pending key, or `None` if nothing is buffered.
    fn poll_key(&mut self) -> io::Result<Option<char>>;

    /// `false` if no operator can ever press a key.
    fn is_interactive(&self) -> bool {
        true
    }
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn begin(&mut self) -> io::Result<()> {
        (**self).begin()
    }

    fn end(&mut self) {
        (**self).end()
    }

    fn poll_key(&mut self) -> io::Result<Option<char>> {
        (**self).poll_key()
    }

    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }
}

// ── CrosstermKeys ─────────────────────────────────────────────────────────────

/// Keys from the controlling terminal.  Raw mode is held between
/// [`begin`](KeySource::begin) and [`end`](KeySource::end).
#[derive(Default)]
pub struct CrosstermKeys {
    guard: Option<RawModeGuard>,
}

impl CrosstermKeys {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySource for CrosstermKeys {
    fn begin(&mut self) -> io::Result<()> {
        if self.guard.is_none() {
            self.guard = Some(enter_raw_mode()?);
        }
        Ok(())
    }

    fn end(&mut self) {
        self.guard = None;
    }

    fn poll_key(&mut self) -> io::Result<Option<char>> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? else {
                continue;
            };
            if kind != KeyEventKind::Press {
                continue;
            }
            if let KeyCode::Char(c) = code {
                // Raw mode swallows SIGINT; honour Ctrl-C ourselves.
                if modifiers.contains(KeyModifiers::CONTROL) && c == 'c' {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted by operator"));
                }
                return Ok(Some(c));
            }
        }
        Ok(None)
    }
}

// ── DetachedKeys ──────────────────────────────────────────────────────────────

/// Used when stdin is not a terminal: never yields a key.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedKeys;

impl KeySource for DetachedKeys {
    fn poll_key(&mut self) -> io::Result<Option<char>> {
        Ok(None)
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

// ── ScriptedKeys ──────────────────────────────────────────────────────────────

/// Replays a fixed sequence of polls: `Some(c)` is a key press, `None` an
/// empty poll.  Polling past the end is an error, so a run that waits for a
/// key that was never scripted fails instead of hanging.
#[derive(Debug, Default, Clone)]
pub struct ScriptedKeys {
    polls: VecDeque<Option<char>>,
    exhausted_ok: bool,
}

impl ScriptedKeys {
    pub fn new(polls: impl IntoIterator<Item = Option<char>>) -> Self {
        Self { polls: polls.into_iter().collect(), exhausted_ok: false }
    }

    /// After the scripted polls run out, keep answering `None`.
    pub fn then_idle(mut self) -> Self {
        self.exhausted_ok = true;
        self
    }

    /// Polls not yet consumed.
    pub fn remaining(&self) -> usize {
        self.polls.len()
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self) -> io::Result<Option<char>> {
        match self.polls.pop_front() {
            Some(key) => Ok(key),
            None if self.exhausted_ok => Ok(None),
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "key script exhausted")),
        }
    }
}

// ── Raw mode ──────────────────────────────────────────────────────────────────

/// Enable raw mode.  Returns a guard that disables it on drop.
pub fn enter_raw_mode() -> io::Result<RawModeGuard> {
    terminal::enable_raw_mode()?;
    Ok(RawModeGuard(()))
}

/// RAII guard: disables raw mode when dropped.
pub struct RawModeGuard(());

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(io::stdout(), cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

/// `true` if both stdin and stdout are terminals.
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 && libc::isatty(libc::STDOUT_FILENO) != 0 }
}

/// `true` if stderr is a terminal.
pub fn stderr_is_tty() -> bool {
    unsafe { libc::isatty(libc::STDERR_FILENO) != 0 }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Write `text` followed by `\r\n` and flush.
pub fn write_line(out: &mut dyn Write, text: &str) -> io::Result<()> {
    write!(out, "{text}\r\n")?;
    out.flush()
}

/// Writer that expands every `\n` to `\r\n`.
///
/// Output stays readable whether or not raw mode is on at the time.
pub struct CrlfWriter<W: Write>(pub W);

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for chunk in buf.split_inclusive(|&b| b == b'\n') {
            match chunk.strip_suffix(b"\n") {
                Some(body) => {
                    self.0.write_all(body)?;
                    self.0.write_all(b"\r\n")?;
                }
                None => self.0.write_all(chunk)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
