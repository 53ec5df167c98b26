/// Binary tests: run `plotdir` as a subprocess with `--dry-run` so no
/// plotter is needed, and check what the operator would see.
///
/// `Command::output` gives the child a closed stdin, so the binary takes the
/// non-interactive path: no raw mode, and a pause aborts the run.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_plotdir"))
}

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(binary())
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn plotdir")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).replace("\r\n", "\n")
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn missing_script_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(&["--dry-run", "--no-config", "-y", "absent.txt"], dir.path());
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "File 'absent.txt' does not exist.");
}

#[test]
fn dry_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "square.txt",
        "# square\ndef sq lineto 1 0 | lineto 1 1 | lineto 0 1 | lineto 0 0\nsq\nlineto 1.5 abc\n",
    );
    let out = run(&["--dry-run", "--no-config", "-y", script.to_str().unwrap()], dir.path());
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let text = stdout(&out);
    assert!(text.starts_with("# square\n"), "{text}");
    assert!(text.contains("Error executing command lineto: "), "{text}");
    assert!(text.contains("Pen plot completed\n"), "{text}");
    assert!(text.contains("8 statements, 1 errors, 0 pauses"), "{text}");
}

#[test]
fn pause_without_terminal_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "pens.txt", "lineto 1 1\npause red pen\nlineto 2 2\n");
    let out = run(&["--dry-run", "--no-config", "-y", script.to_str().unwrap()], dir.path());
    assert!(!out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Plot Paused: red pen"), "{text}");
    assert!(!text.contains("Pen plot completed"), "{text}");
}

#[test]
fn rc_file_macros_available() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), ".plotdirrc", "options speed_pendown 30\ndef home moveto 0 0\n");
    let script = write_script(dir.path(), "plot.txt", "lineto 1 1\nhome\n");
    let rc = dir.path().join(".plotdirrc");
    let out = run(
        &["--dry-run", "-f", rc.to_str().unwrap(), "-y", script.to_str().unwrap()],
        dir.path(),
    );
    assert!(out.status.success());
    assert!(stdout(&out).contains("2 statements, 0 errors, 0 pauses"));
}

#[test]
fn declined_home_prompt_skips_plot() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "plot.txt", "lineto 1 1\n");
    let out = run(&["--dry-run", "--no-config", script.to_str().unwrap()], dir.path());
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("home position? (y/n)"), "{text}");
    assert!(text.contains("Move the carriage to the home position"), "{text}");
    assert!(!text.contains("Pen plot completed"), "{text}");
}

#[test]
fn unreachable_plotter_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "plot.txt", "lineto 1 1\n");
    let out = run(
        &["--port", "/nonexistent/ttyACM9", "--no-config", "-y", script.to_str().unwrap()],
        dir.path(),
    );
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "Plotter not connected.");
}
