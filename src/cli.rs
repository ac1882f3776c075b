use crate::model::{RunConfig, RunSummary, SessionEvent, Snapshot, TapePolicy};
use crate::session::{self, UiCommand};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    /// Raw program output, written without a trailing newline.
    Program(Vec<u8>),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = stdout.lock();
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Program(bytes) => {
                    let _ = out.write_all(&bytes);
                    let _ = out.flush();
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "bf-stepper",
    version,
    about = "Step through Brainfuck programs, one instruction at a time or all at once"
)]
pub struct Cli {
    /// Program file to run
    #[arg(required_unless_present = "expr", conflicts_with = "expr")]
    pub program: Option<PathBuf>,

    /// Program text given inline instead of a file
    #[arg(short = 'e', long)]
    pub expr: Option<String>,

    /// Text fed to `,` instructions
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// File whose bytes are fed to `,` instructions
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Start advancing as soon as the program is loaded
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub direct_start: bool,

    /// With --direct-start, run without pausing between steps
    #[arg(long)]
    pub super_speed: bool,

    /// Wrap the data pointer around the tape ends instead of faulting
    #[arg(long)]
    pub wrap_tape: bool,

    /// Number of tape cells
    #[arg(long, default_value_t = 32_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub tape_len: u64,

    /// Run headless and print the program output plus a text summary
    #[arg(long)]
    pub text: bool,

    /// Run headless and print a JSON summary
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Include the most executed instructions in the summary
    #[arg(long)]
    pub profile: bool,

    /// Write logs to this file (the TUI never logs to the terminal)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.text || self.json
    }

    /// Human-readable name of the program source.
    pub fn program_name(&self) -> String {
        match &self.program {
            Some(p) => p.display().to_string(),
            None => "<inline>".to_string(),
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let program = load_program(&args)?;
    let cfg = build_config(&args)?;

    if args.is_headless() {
        return run_headless(args, program, cfg).await;
    }

    #[cfg(feature = "tui")]
    {
        crate::tui::run(args, program, cfg).await
    }
    #[cfg(not(feature = "tui"))]
    {
        // Fallback when built without TUI support.
        run_headless(Cli { text: true, ..args }, program, cfg).await
    }
}

fn load_program(args: &Cli) -> Result<String> {
    if let Some(expr) = &args.expr {
        return Ok(expr.clone());
    }
    let path = args
        .program
        .as_deref()
        .context("no program given")?;
    std::fs::read_to_string(path).with_context(|| format!("read program {}", path.display()))
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    let input = match (&args.input, &args.input_file) {
        (Some(text), _) => text.as_bytes().to_vec(),
        (None, Some(path)) => {
            std::fs::read(path).with_context(|| format!("read input {}", path.display()))?
        }
        (None, None) => Vec::new(),
    };
    Ok(RunConfig {
        direct_start: args.direct_start,
        start_super_speed: args.super_speed,
        tape_len: usize::try_from(args.tape_len).context("tape length does not fit in memory")?,
        tape_policy: if args.wrap_tape {
            TapePolicy::Wrap
        } else {
            TapePolicy::Strict
        },
        input,
        start_on_launch: true,
    })
}

/// Run the program to completion without a UI, reporting through stdout/stderr.
///
/// Headless runs always start directly at super speed. Exits with an error when the
/// program faulted.
async fn run_headless(args: Cli, program: String, cfg: RunConfig) -> Result<()> {
    let cfg = RunConfig {
        direct_start: true,
        start_super_speed: true,
        ..cfg
    };
    let instructions = crate::engine::instruction_count(&program);

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let handle = tokio::spawn(session::run_controller(program, cfg, evt_tx, cmd_rx));

    let mut output = Vec::new();
    let mut last: Option<Snapshot> = None;
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            SessionEvent::Output(byte) => {
                output.push(byte);
                if args.text {
                    let _ = out_tx.send(OutputLine::Program(vec![byte]));
                }
            }
            SessionEvent::Info(msg) => {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
            SessionEvent::Snapshot(snap) => {
                let done = snap.status.is_some();
                last = Some(*snap);
                if done {
                    let _ = cmd_tx.send(UiCommand::Quit);
                }
            }
        }
    }

    handle.await.context("session task failed")??;

    let last = last.context("session produced no state")?;
    let summary = crate::text_summary::build_run_summary(
        &args.program_name(),
        instructions,
        &last,
        &output,
        if args.profile { 10 } else { 0 },
    );

    if args.json {
        let out = serde_json::to_string_pretty(&summary)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        if !output.ends_with(b"\n") && !output.is_empty() {
            let _ = out_tx.send(OutputLine::Stdout(String::new()));
        }
        for line in crate::text_summary::build_text_summary(&summary).lines {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;

    finish_status(&summary)
}

fn finish_status(summary: &RunSummary) -> Result<()> {
    if summary.faulted {
        return Err(anyhow::anyhow!(
            "program faulted: {}",
            summary.status.as_deref().unwrap_or("unknown fault")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_flags() {
        let args = Cli::parse_from([
            "bf-stepper",
            "-e",
            "+.",
            "--input",
            "xy",
            "--super-speed",
            "--wrap-tape",
            "--tape-len",
            "16",
        ]);
        let cfg = build_config(&args).unwrap();
        assert!(cfg.direct_start);
        assert!(cfg.start_super_speed);
        assert_eq!(cfg.tape_policy, TapePolicy::Wrap);
        assert_eq!(cfg.tape_len, 16);
        assert_eq!(cfg.input, b"xy".to_vec());
        assert_eq!(load_program(&args).unwrap(), "+.");
        assert_eq!(args.program_name(), "<inline>");
    }

    #[test]
    fn direct_start_can_be_disabled() {
        let args = Cli::parse_from(["bf-stepper", "prog.bf", "--direct-start", "false"]);
        let cfg = build_config(&args).unwrap();
        assert!(!cfg.direct_start);
        assert_eq!(cfg.tape_policy, TapePolicy::Strict);
        assert_eq!(args.program_name(), "prog.bf");
        assert!(!args.is_headless());
    }

    #[test]
    fn program_is_required() {
        assert!(Cli::try_parse_from(["bf-stepper"]).is_err());
        assert!(Cli::try_parse_from(["bf-stepper", "a.bf", "-e", "+"]).is_err());
        assert!(Cli::try_parse_from(["bf-stepper", "a.bf", "--text", "--json"]).is_err());
    }

    #[test]
    fn zero_length_tape_is_rejected() {
        assert!(Cli::try_parse_from(["bf-stepper", "a.bf", "--tape-len", "0"]).is_err());
    }

    #[test]
    fn faulted_runs_fail() {
        let mut summary = RunSummary {
            timestamp_utc: String::new(),
            program: "<inline>".into(),
            instructions: 1,
            steps: 0,
            reached_end: false,
            faulted: true,
            status: Some("tape underflow".into()),
            elapsed_ms: 0,
            output: String::new(),
            hot_spots: Vec::new(),
        };
        let err = finish_status(&summary).unwrap_err();
        assert_eq!(err.to_string(), "program faulted: tape underflow");

        summary.faulted = false;
        assert!(finish_status(&summary).is_ok());
    }
}
