//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use raft_fault_harness::cluster::controller::ClusterController;
use raft_fault_harness::cluster::launcher::ComposeLauncher;
use raft_fault_harness::cluster::transport::ReqwestTransport;
use raft_fault_harness::core::config::HarnessConfig;
use raft_fault_harness::core::errors::RfhError;
use raft_fault_harness::harness::{HarnessDriver, RunOptions, RunOutcome, SignalHandler};
use raft_fault_harness::logger::EventLog;
use raft_fault_harness::report::Tally;
use raft_fault_harness::scenario::ScenarioKind;

/// Raft Fault Harness: black-box fault-injection checks for a Raft KV cluster.
#[derive(Debug, Parser)]
#[command(
    name = "rfh",
    author,
    version,
    about = "Raft Fault Harness - cluster fault-tolerance verification",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the scenario suite against the cluster.
    Run(RunArgs),
    /// Show every node's self-reported role and term.
    Status,
    /// List the scenario catalog in execution order.
    List,
    /// View and check configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Run only the named scenario (repeatable; catalog order is kept).
    #[arg(long = "scenario", value_name = "NAME", value_parser = parse_scenario)]
    scenarios: Vec<ScenarioKind>,
    /// Run against an in-memory simulated cluster with zero delays.
    #[arg(long)]
    simulate: bool,
    /// Markdown report path (overrides config).
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Also write a JSON report to this path.
    #[arg(long, value_name = "PATH")]
    json_report: Option<PathBuf>,
    /// JSONL event log path (overrides config).
    #[arg(long, value_name = "PATH")]
    events: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path in use.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// At least one scenario finished `FAILED`.
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed { failed: usize, total: usize },
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ScenariosFailed { .. } => 1,
            Self::User(_) => 2,
            Self::Runtime(_) | Self::Io(_) => 3,
            Self::Internal(_) | Self::Json(_) => 4,
        }
    }
}

impl From<RfhError> for CliError {
    fn from(value: RfhError) -> Self {
        match value {
            RfhError::InvalidConfig { .. }
            | RfhError::MissingConfig { .. }
            | RfhError::ConfigParse { .. }
            | RfhError::UnknownNode { .. } => Self::User(value.to_string()),
            RfhError::Serialization { .. } | RfhError::AlreadyFinished { .. } => {
                Self::Internal(value.to_string())
            }
            _ => Self::Runtime(value.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_suite(cli, args),
        Command::Status => run_status(cli),
        Command::List => run_list(cli),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn parse_scenario(raw: &str) -> Result<ScenarioKind, String> {
    raw.parse::<ScenarioKind>().map_err(|_| {
        let names: Vec<&str> = ScenarioKind::ALL.iter().map(|k| k.name()).collect();
        format!("unknown scenario '{raw}' (expected one of: {})", names.join(", "))
    })
}

// ──────────────────── run ────────────────────

fn run_suite(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mut config = HarnessConfig::load(cli.config.as_deref())?;
    if let Some(path) = &args.report {
        config.report.markdown_path.clone_from(path);
    }
    if let Some(path) = &args.json_report {
        config.report.json_path = Some(path.clone());
    }
    if let Some(path) = &args.events {
        config.report.events_path.clone_from(path);
    }

    let mode = output_mode(cli);
    let human = mode == OutputMode::Human && !cli.quiet;
    let events = EventLog::open(&config.report.events_path);
    let shutdown = SignalHandler::new();
    let driver = if args.simulate {
        HarnessDriver::simulated(config, events, shutdown)
    } else {
        HarnessDriver::live(config, events, shutdown)?
    };

    if human {
        let target = if args.simulate {
            "simulated cluster"
        } else {
            "Raft cluster"
        };
        println!(">>> Starting integration tests against the {target}...");
    }

    let options = RunOptions {
        scenarios: args.scenarios.clone(),
        echo: human,
    };
    let outcome = driver.run(&options)?;

    match mode {
        OutputMode::Human => {
            if !cli.quiet {
                print_run_summary(&outcome);
            }
        }
        OutputMode::Json => write_json_line(&run_payload(&outcome, args.simulate))?,
    }

    if outcome.passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: outcome.tally.failed,
            total: outcome.tally.total,
        })
    }
}

fn print_run_summary(outcome: &RunOutcome) {
    if let Some(path) = &outcome.reports.markdown {
        println!(">>> Report saved to: {}", path.display());
    }
    if let Some(path) = &outcome.reports.json {
        println!(">>> JSON report saved to: {}", path.display());
    }
    if outcome.interrupted {
        println!("{}", ">>> Run interrupted; remaining scenarios were skipped".yellow());
    }
    if !outcome.teardown_ok {
        println!("{}", ">>> Cluster teardown reported a failure".yellow());
    }
    print_tally(&outcome.tally);
}

fn print_tally(tally: &Tally) {
    println!("\n=== Summary ===");
    println!("   {} Passed:  {}", "[PASS]".green().bold(), tally.passed);
    let failed = format!("{}", tally.failed);
    let failed = if tally.failed > 0 {
        failed.red().bold().to_string()
    } else {
        failed
    };
    println!("   {} Failed:  {failed}", "[FAIL]".red().bold());
    println!("   {} Skipped: {}", "[SKIP]".yellow().bold(), tally.skipped);
    println!("   {} Total:  {}", "[TOTAL]".bold(), tally.total);
}

fn run_payload(outcome: &RunOutcome, simulated: bool) -> Value {
    let scenarios: Vec<Value> = outcome
        .cases
        .iter()
        .map(|case| {
            json!({
                "name": case.name(),
                "verdict": case.verdict(),
                "duration_secs": case.duration().map(|d| d.as_secs_f64()),
            })
        })
        .collect();
    json!({
        "command": "run",
        "simulated": simulated,
        "passed": outcome.passed(),
        "interrupted": outcome.interrupted,
        "teardown_ok": outcome.teardown_ok,
        "summary": outcome.tally,
        "scenarios": scenarios,
        "report": outcome.reports.markdown.as_ref().map(|p| p.to_string_lossy()),
        "json_report": outcome.reports.json.as_ref().map(|p| p.to_string_lossy()),
    })
}

// ──────────────────── status / list ────────────────────

fn run_status(cli: &Cli) -> Result<(), CliError> {
    let config = HarnessConfig::load(cli.config.as_deref())?;
    let launcher = ComposeLauncher::from_config(&config.cluster)?;
    let transport = ReqwestTransport::new()?;
    let controller = ClusterController::from_config(
        &config,
        Arc::new(launcher),
        Arc::new(transport),
        EventLog::disabled(),
    );
    let snapshot = controller.snapshot();
    let leader = controller.poll_leaders();

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "  {:<10}  {:<22}  {:<10}  {:>6}",
                "Node", "Endpoint", "Role", "Term"
            );
            println!("  {}", "-".repeat(54));
            for (node, status) in &snapshot {
                let endpoint = format!("{}:{}", node.host, node.port);
                match status {
                    Some(s) => {
                        let role = if s.role.is_leader() {
                            s.role.to_string().green().bold().to_string()
                        } else {
                            s.role.to_string()
                        };
                        println!("  {:<10}  {endpoint:<22}  {role:<10}  {:>6}", node.id, s.term);
                    }
                    None => println!(
                        "  {:<10}  {endpoint:<22}  {:<10}  {:>6}",
                        node.id,
                        "DOWN".red(),
                        "-"
                    ),
                }
            }
            match leader.leader() {
                Some(id) => println!("\nLeader: {id}"),
                None => println!("\nLeader: {}", "none (no single leader this round)".yellow()),
            }
        }
        OutputMode::Json => {
            let nodes: Vec<Value> = snapshot
                .iter()
                .map(|(node, status)| {
                    json!({
                        "id": node.id,
                        "host": node.host,
                        "port": node.port,
                        "reachable": status.is_some(),
                        "status": status,
                    })
                })
                .collect();
            write_json_line(&json!({
                "command": "status",
                "leader": leader.leader(),
                "nodes": nodes,
            }))?;
        }
    }
    Ok(())
}

fn run_list(cli: &Cli) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            for (i, kind) in ScenarioKind::ALL.iter().enumerate() {
                println!("{:>2}. {:<28} {}", i + 1, kind.name(), kind.description());
            }
        }
        OutputMode::Json => {
            let scenarios: Vec<Value> = ScenarioKind::ALL
                .iter()
                .map(|k| json!({ "name": k.name(), "description": k.description() }))
                .collect();
            write_json_line(&json!({ "command": "list", "scenarios": scenarios }))?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(HarnessConfig::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = HarnessConfig::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match HarnessConfig::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                let source = config
                    .source
                    .as_ref()
                    .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string());

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {source}");
                        println!("  Nodes: {}", config.cluster.nodes.len());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": true,
                            "source": source,
                            "hash": hash,
                        }))?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                            "code": e.code(),
                        }))?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output helpers ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("RFH_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

/// `--json` wins; otherwise `RFH_OUTPUT_FORMAT` (`json`, `human`, `auto`).
/// `auto` picks JSON when stdout is not a terminal; unset means human.
fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("auto") if !stdout_is_tty => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
