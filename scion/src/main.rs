//! Resumable, policy-gated autonomous agent loop.
//!
//! State lives under `<workspace>/.scion/`. `scion run` pops actions from the
//! persisted queue until the todo list is exhausted, a budget runs out, or
//! `--max-iterations` is reached.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::warn;

use scion::core::action::Action;
use scion::core::quota::REASON_RESOURCE;
use scion::exit_codes;
use scion::io::clock::{Clock, SystemClock};
use scion::io::config::load_config;
use scion::io::init::{AgentPaths, InitOptions, init_agent};
use scion::io::reasoner::CommandReasoner;
use scion::io::store::{load_memory, load_queue, load_state, write_memory, write_queue};
use scion::logging;
use scion::looping::{LoopStop, run_loop};
use scion::step::Agent;

#[derive(Parser)]
#[command(
    name = "scion",
    version,
    about = "Resumable, policy-gated autonomous agent loop"
)]
struct Cli {
    /// Workspace root the agent operates in.
    #[arg(long, env = "SCION_WORKSPACE", default_value = ".", global = true)]
    workspace: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.scion/` with default config and initial state.
    Init {
        /// Overwrite existing agent files.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the agent loop.
    Run {
        /// Stop after this many iterations.
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Print the queue, todo list, quota and counters.
    Status,
    /// Edit the todo list.
    Todo {
        #[command(subcommand)]
        command: TodoCommand,
    },
    /// Append a reasoning step to the queue.
    EnqueueReason {
        task: String,
        #[arg(long, default_value = "enqueued from the command line")]
        explanation: String,
    },
}

#[derive(Subcommand)]
enum TodoCommand {
    /// Add an item (appended unless `--front`).
    Add {
        #[arg(long)]
        front: bool,
        item: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let directives = match cli.command {
        Command::Run { .. } => "warn,scion=info",
        _ => "warn",
    };
    logging::init(directives);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = cli.workspace;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Run { max_iterations } => cmd_run(&root, max_iterations),
        Command::Status => cmd_status(&root),
        Command::Todo {
            command: TodoCommand::Add { front, item },
        } => cmd_todo_add(&root, front, item),
        Command::EnqueueReason { task, explanation } => cmd_enqueue_reason(&root, task, explanation),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_agent(root, &InitOptions { force })?;
    println!("initialized {}", paths.agent_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, max_iterations: Option<u32>) -> Result<i32> {
    let paths = initialized_paths(root)?;
    let config = load_config(&paths.config_path)?;
    let reasoner = match CommandReasoner::from_env(&config.reasoner) {
        Ok(reasoner) => Some(reasoner),
        Err(err) => {
            warn!(error = %err, "continuing without a reasoner");
            None
        }
    };

    let mut agent = Agent::open(root, reasoner, SystemClock)?;
    let outcome = run_loop(&mut agent, max_iterations, |step| {
        let observation = step.observation.lines().next().unwrap_or_default();
        println!("{} => {observation}", step.action.summary());
    })?;

    let code = match outcome.stop {
        LoopStop::Terminated => {
            println!("terminated after {} iterations", outcome.iterations);
            exit_codes::OK
        }
        LoopStop::StepLimit { steps, max } => {
            eprintln!("stopped: reasoning step {steps} exceeds the per-run limit of {max}");
            exit_codes::STEP_LIMIT
        }
        LoopStop::QuotaExhausted { max_per_day } => {
            eprintln!("stopped: daily quota of {max_per_day} reasoning calls is used up");
            exit_codes::QUOTA_EXHAUSTED
        }
        LoopStop::ReasonerUnavailable => {
            eprintln!(
                "stopped: no reasoner available (set {})",
                config.reasoner.credential_env
            );
            exit_codes::REASONER_UNAVAILABLE
        }
        LoopStop::MaxIterations { iterations } => {
            eprintln!("stopped: reached --max-iterations {iterations}");
            exit_codes::MAX_ITERATIONS
        }
    };
    Ok(code)
}

fn cmd_status(root: &Path) -> Result<i32> {
    let paths = initialized_paths(root)?;
    let config = load_config(&paths.config_path)?;
    let mut state = load_state(&paths)?;

    println!("queue ({}):", state.queue.len());
    for (index, action) in state.queue.snapshot().iter().enumerate() {
        println!("  {}. {}", index + 1, action.summary());
    }
    println!("todo ({}):", state.memory.todo().len());
    for item in state.memory.todo() {
        println!("  - {item}");
    }

    // Display only; the rollover is persisted by the next `run`.
    let max = config.max_reason_calls_per_day;
    state
        .quota
        .refresh(REASON_RESOURCE, SystemClock.today(), max);
    let remaining = state.quota.remaining(REASON_RESOURCE).unwrap_or(max);
    println!("quota: {remaining}/{max} reasoning calls remaining today");

    if !state.memory.counters.is_empty() {
        println!("counters:");
        for (name, value) in &state.memory.counters {
            println!("  {name} = {value}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_todo_add(root: &Path, front: bool, item: String) -> Result<i32> {
    if item.trim().is_empty() {
        bail!("todo item must not be empty");
    }
    let paths = initialized_paths(root)?;
    let mut memory = load_memory(&paths.memory_path)?;
    if front {
        memory.todo_insert_front(item);
    } else {
        memory.todo_append_back(item);
    }
    write_memory(&paths.memory_path, &memory)?;
    Ok(exit_codes::OK)
}

fn cmd_enqueue_reason(root: &Path, task: String, explanation: String) -> Result<i32> {
    if task.trim().is_empty() {
        bail!("task must not be empty");
    }
    let paths = initialized_paths(root)?;
    let mut queue = load_queue(&paths.queue_path)?;
    queue.push_back(Action::reason(task, explanation));
    write_queue(&paths.queue_path, &queue)?;
    Ok(exit_codes::OK)
}

fn initialized_paths(root: &Path) -> Result<AgentPaths> {
    let paths = AgentPaths::new(root);
    if !paths.agent_dir.is_dir() {
        bail!(
            "{} is not initialized (run `scion init` first)",
            root.display()
        );
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["scion", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_run_with_cap_and_workspace() {
        let cli = Cli::parse_from(["scion", "--workspace", "/tmp/ws", "run", "--max-iterations", "4"]);
        assert_eq!(cli.workspace, PathBuf::from("/tmp/ws"));
        assert!(matches!(
            cli.command,
            Command::Run {
                max_iterations: Some(4)
            }
        ));
    }

    #[test]
    fn parse_todo_add_front() {
        let cli = Cli::parse_from(["scion", "todo", "add", "--front", "write docs"]);
        assert!(matches!(
            cli.command,
            Command::Todo {
                command: TodoCommand::Add { front: true, ref item }
            } if item == "write docs"
        ));
    }
}
