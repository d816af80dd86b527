use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use phasegate_core::{check_binding, FailMode, GateError, GateVerdict, Phase, Severity};
use phasegate_engine::{diagnose, Config, DecisionRequest, Engine};
use tracing_subscriber::EnvFilter;

mod hook;

#[derive(Parser)]
#[command(name = "phasegate", version)]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create .phasegate/ with default config and the initial phase
    Init,

    /// Validate config, state files, VCS and rule table
    Doctor,

    /// Start a task bound to a branch
    Start {
        description: String,
        branch: String,
        /// Create and check out the branch if it does not exist
        #[arg(long)]
        create_branch: bool,
    },

    /// Complete the active task
    Complete,

    /// Cancel the active task (emergency bypass)
    Cancel,

    /// Active task, branch binding, phase and mode
    Status,

    /// Archived tasks, most recent first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Inspect or move the workflow phase
    Phase {
        #[command(subcommand)]
        cmd: PhaseCommand,
    },

    /// Enforce the workflow without an active task
    Activate,

    /// Return to discussion mode
    Deactivate,

    /// List the loaded bypass rules, or try a text against them
    Rules {
        /// Scan this text; exits 1 naming the first blocking rule
        #[arg(long)]
        test: Option<String>,
        /// Branch to evaluate against (defaults to the working copy's)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Gate a prompt or tool call. Exit 0 = allow, 1 = block; output on stderr only
    Check {
        /// Text to scan; read from stdin when omitted (JSON hook payloads accepted)
        #[arg(long)]
        text: Option<String>,
        /// Override the branch detected from the working copy
        #[arg(long)]
        branch: Option<String>,
        /// Also validate a transition to this phase
        #[arg(long)]
        advance_to: Option<Phase>,
        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PhaseCommand {
    /// Current phase
    Show,
    /// Move one phase forward, checking artifacts
    Advance,
    /// Move to a phase; sequencing rules apply unless --force
    Set {
        phase: Phase,
        #[arg(long)]
        force: bool,
    },
    /// Transition history, most recent first
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("PHASEGATE_LOG").unwrap_or_else(|_| EnvFilter::from_default_env());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(ge) = e.downcast_ref::<GateError>() {
                eprintln!("  -> {}", ge.remediation());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let repo_root = match cli.repo {
        Some(p) => p,
        None => std::env::current_dir()?,
    };

    match cli.cmd {
        Command::Check { text, branch, advance_to, json } => {
            return check(repo_root, text, branch, advance_to, json);
        }
        Command::Init => {
            let e = Engine::init_repo(&repo_root)?;
            println!("Initialized phasegate in {} (phase {})", repo_root.display(), e.current_phase());
        }
        Command::Doctor => {
            let checks = diagnose(&repo_root);
            for c in &checks {
                println!("{c}");
            }
            if checks.iter().any(|c| !c.ok) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Start { description, branch, create_branch } => {
            let e = Engine::open(repo_root)?;
            let task = e.start(&description, &branch, create_branch)?;
            println!("Started {} on branch {}", task.id, task.bound_branch);
        }
        Command::Complete => {
            let e = Engine::open(repo_root)?;
            match e.complete() {
                Ok(task) => println!("Completed {}", task.id),
                Err(GateError::NoActiveTask) => eprintln!("warning: no active task"),
                Err(err) => return Err(err.into()),
            }
        }
        Command::Cancel => {
            let e = Engine::open(repo_root)?;
            match e.cancel() {
                Ok(task) => {
                    eprintln!("EMERGENCY BYPASS: task {} cancelled; branch binding released", task.id);
                    println!("Cancelled {}", task.id);
                }
                Err(GateError::NoActiveTask) => eprintln!("warning: no active task"),
                Err(err) => return Err(err.into()),
            }
        }
        Command::Status => {
            let e = Engine::open(repo_root)?;
            let (snap, _) = e.snapshot();
            let branch = e.current_branch();
            match &snap.active_task {
                Some(t) => {
                    println!("Task:   {} {:?}", t.id, t.description);
                    println!("Bound:  {}", t.bound_branch);
                }
                None => println!("Task:   none"),
            }
            println!("Branch: {branch}");
            let binding = match check_binding(snap.active_task.as_ref(), &branch) {
                Ok(()) if snap.active_task.is_some() => "match".to_string(),
                Ok(()) => "n/a".to_string(),
                Err(err) => format!("MISMATCH ({err})"),
            };
            println!("Match:  {binding}");
            println!("Phase:  {}", snap.phase);
            println!("Mode:   {}", if snap.workflow_active() { "execution" } else { "discussion" });
            for d in &snap.degraded {
                println!("Degraded: {d}");
            }
        }
        Command::History { limit } => {
            let e = Engine::open(repo_root)?;
            let tasks = e.history(limit)?;
            if tasks.is_empty() {
                println!("No archived tasks");
            }
            for t in tasks {
                println!("- {} [{:?}] {} ({})", t.id, t.status, t.description, t.bound_branch);
            }
        }
        Command::Phase { cmd } => {
            let e = Engine::open(repo_root)?;
            match cmd {
                PhaseCommand::Show => println!("{}", e.current_phase()),
                PhaseCommand::Advance => {
                    let change = e.advance()?;
                    print_warnings(&change.warnings);
                    println!("Phase -> {}", change.record.to_phase);
                }
                PhaseCommand::Set { phase, force } => {
                    if force {
                        e.set_phase(phase)?;
                    } else {
                        e.current_phase();
                        let change = e.transition_to(phase)?;
                        print_warnings(&change.warnings);
                    }
                    println!("Phase -> {phase}");
                }
                PhaseCommand::History { limit } => {
                    for t in e.transitions(limit)? {
                        let from = t.from_phase.map(|p| p.token()).unwrap_or("-");
                        println!("{} {} -> {}", t.timestamp, from, t.to_phase.token());
                    }
                }
            }
        }
        Command::Activate => {
            Engine::open(repo_root)?.activate()?;
            println!("Workflow activated");
        }
        Command::Deactivate => {
            Engine::open(repo_root)?.deactivate()?;
            println!("Workflow deactivated");
        }
        Command::Rules { test, branch } => {
            let e = Engine::open(repo_root)?;
            match test {
                None => {
                    for r in e.detector.rules() {
                        println!("{:<8} {:<36} {:?}", r.id(), r.category().as_str(), r.severity());
                    }
                }
                Some(text) => {
                    let branch = branch.unwrap_or_else(|| e.current_branch());
                    let warnings = e.screen(&text, &branch)?;
                    print_warnings(&warnings);
                    println!("no blocking rule matched ({} warning(s))", warnings.len());
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_warnings(warnings: &[phasegate_core::Violation]) {
    for w in warnings {
        eprintln!("warning: {}\n  -> {}", w.message, w.remediation);
    }
}

/// Nothing goes to stdout: hosts treat stdout from a gate as content.
fn check(
    repo_root: PathBuf,
    text: Option<String>,
    branch: Option<String>,
    advance_to: Option<Phase>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let text = match text {
        Some(t) => t,
        None => {
            let mut raw = Vec::new();
            std::io::stdin().read_to_end(&mut raw).context("read stdin")?;
            hook::payload_text(&String::from_utf8_lossy(&raw))
        }
    };

    let engine = match Engine::open(repo_root.clone()) {
        Ok(e) => e,
        Err(e) => return Ok(unavailable(&repo_root, &e)),
    };
    let current_branch = branch.unwrap_or_else(|| engine.current_branch());
    let verdict = engine.decide(&DecisionRequest {
        text,
        current_branch,
        requested_phase: advance_to,
    });

    if json {
        eprintln!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        report(&verdict);
    }
    Ok(if verdict.allowed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// The engine could not be opened. Blocks only when a readable config asks
/// for fail-closed; without one there is no fail mode to honour.
fn unavailable(repo_root: &Path, err: &anyhow::Error) -> ExitCode {
    let path = Config::config_path(repo_root);
    let closed = path.exists()
        && Config::load_from(&path).is_ok_and(|cfg| cfg.workflow.fail_mode == FailMode::Closed);
    let remediation = match err.downcast_ref::<GateError>() {
        Some(ge) => ge.remediation(),
        None => "run `phasegate doctor` to find the broken component".to_string(),
    };
    if closed {
        eprintln!("[BLOCK] gate unavailable (fail_mode = closed): {err:#}");
        eprintln!("  -> {remediation}");
        ExitCode::FAILURE
    } else {
        eprintln!("phasegate: gate unavailable, allowing: {err:#}");
        eprintln!("  -> {remediation}");
        ExitCode::SUCCESS
    }
}

fn report(verdict: &GateVerdict) {
    for v in &verdict.violations {
        let label = match v.severity {
            Severity::Block => "BLOCK",
            Severity::Warn => "WARN",
        };
        eprintln!("[{label}] {} ({}): {}", v.kind, v.check_id, v.message);
        eprintln!("  -> {}", v.remediation);
    }
    if verdict.blocking {
        eprintln!("phasegate: blocked");
    }
}
