use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use plotdir::cli::{Cli, ConfigFile};
use plotdir::config::{self, Config};
use plotdir::device::{ebb::EbbPlotter, sim::VirtualPlotter, Plotter};
use plotdir::notify::HttpNotifier;
use plotdir::script::{Interpreter, Value};
use plotdir::stream::{StreamController, StreamError};
use plotdir::terminal::{self, CrosstermKeys, DetachedKeys, KeySource};

/// Minimum second field of a `QC` reply when the motor supply is on.
const POWER_THRESHOLD: i64 = 276;

fn bootstrap_options() -> [(&'static str, Value); 4] {
    [
        ("homing", Value::Bool(false)),
        ("model", Value::Int(2)),
        ("penlift", Value::Int(3)),
        ("units", Value::Int(2)),
    ]
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("plotdir: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let _log = plotdir::logging::init(cli.log_file.as_deref()).context("cannot open log file")?;

    // Checked again by the stream controller; failing here spares the
    // operator the home-position prompt.
    if !cli.script.is_file() {
        println!("{}", StreamError::ScriptNotFound(cli.script.clone()));
        return Ok(ExitCode::SUCCESS);
    }

    // ── Device ────────────────────────────────────────────────────────────────
    let device: Box<dyn Plotter> = if cli.dry_run {
        Box::new(VirtualPlotter::new())
    } else {
        Box::new(EbbPlotter::new(&cli.port))
    };
    let notifier = HttpNotifier::new(cli.webhook.clone());
    let mut interp = Interpreter::new(device, Box::new(notifier));

    for (name, value) in bootstrap_options() {
        interp
            .device_mut()
            .options_mut()
            .set(name, value)
            .with_context(|| format!("bootstrap option {name}"))?;
    }
    apply_config(&mut interp, cli);

    if let Err(e) = interp.device_mut().connect() {
        tracing::info!(error = %e, port = %cli.port.display(), "connect failed");
        println!("Plotter not connected.");
        return Ok(ExitCode::SUCCESS);
    }

    // ── Plot ──────────────────────────────────────────────────────────────────
    let code = if cli.yes || safety_check(&mut interp)? {
        stream(&mut interp, cli)?
    } else {
        ExitCode::SUCCESS
    };

    interp.device_mut().disconnect();
    Ok(code)
}

/// Load the rc file selected on the command line.  Problems are warnings.
fn apply_config<D: Plotter>(interp: &mut Interpreter<D>, cli: &Cli) {
    let path = match cli.config_file() {
        ConfigFile::Skip => return,
        ConfigFile::Explicit(path) => path,
        ConfigFile::Search => match config::find_user_config() {
            Some(path) => path,
            None => return,
        },
    };

    let (cfg, errors) = match Config::load_file(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("plotdir: warning: {}: {e}", path.display());
            return;
        }
    };
    for e in &errors {
        eprintln!("plotdir: warning: {}: {e}", path.display());
    }
    for setting in &cfg.options {
        if let Err(e) = interp.set_option(&setting.name, &setting.value) {
            eprintln!("plotdir: warning: {}: line {}: {e}", path.display(), setting.line);
        }
    }
    let defined = cfg.macros.len();
    for (name, body) in cfg.macros {
        interp.define_macro(name, body);
    }
    tracing::info!(config = %path.display(), options = cfg.options.len(), macros = defined, "config loaded");
}

/// Ask whether the carriage is home, then check the motor supply.
fn safety_check<D: Plotter>(interp: &mut Interpreter<D>) -> anyhow::Result<bool> {
    print!("Is the plotter in the home position? (y/n): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if !answer.trim().eq_ignore_ascii_case("y") {
        println!();
        println!("*** 1. Turn off the plotter power supply.       ***");
        println!("*** 2. Move the carriage to the home position.  ***");
        println!("*** 3. Turn the power supply back on.           ***");
        return Ok(false);
    }

    let reply = interp.device_mut().usb_query("QC").context("power query")?;
    let voltage = reply.split(',').nth(1).and_then(|f| f.trim().parse::<i64>().ok());
    tracing::debug!(reply = %reply.trim(), ?voltage, "power check");
    if voltage.map_or(true, |v| v <= POWER_THRESHOLD) {
        println!();
        println!("*** Plotter power supply appears to be off. ***");
        return Ok(false);
    }
    Ok(true)
}

fn stream<D: Plotter>(interp: &mut Interpreter<D>, cli: &Cli) -> anyhow::Result<ExitCode> {
    let keys: Box<dyn KeySource> = if terminal::is_tty() {
        Box::new(CrosstermKeys::new())
    } else {
        Box::new(DetachedKeys)
    };
    let mut controller = StreamController::new(keys)
        .with_bindings(cli.key_bindings())
        .with_poll_interval(cli.poll_interval());

    let mut out = io::stdout();
    match controller.run_file(interp, &cli.script, &mut out) {
        Ok(report) => {
            println!(
                "{} statements, {} errors, {} pauses",
                report.statements, report.errors, report.pauses
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ StreamError::ScriptNotFound(_)) => {
            println!("{e}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ StreamError::NoOperator) => {
            println!("{e}");
            Ok(ExitCode::FAILURE)
        }
        Err(StreamError::Io(e)) => Err(e).context("plot aborted"),
    }
}
