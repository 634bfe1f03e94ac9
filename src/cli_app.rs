//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::json;
use thiserror::Error;

use dircap::core::bytesize::{format_size, parse_size};
use dircap::core::config::Config;
use dircap::daemon::{Monitor, SignalHandler, write_pidfile};
use dircap::logger::{JsonlConfig, LogSink, spawn_logger};
use dircap::registry::{EvictionOrder, EvictionPolicy, Registry, WatchedDirectory};

/// dircap — keeps watched directories under their size budgets.
#[derive(Debug, Parser)]
#[command(
    name = "dircap",
    author,
    version,
    about = "dircap - Directory Size Capper",
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
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Register a directory with a size budget.
    Add(AddArgs),
    /// Remove a directory from the registry.
    Remove(PathArg),
    /// Resume monitoring a disabled directory.
    Enable(PathArg),
    /// Pause monitoring without forgetting the directory.
    Disable(PathArg),
    /// List registered directories and their budgets.
    List(ListArgs),
    /// Run the monitoring daemon.
    Monitor(MonitorArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct AddArgs {
    /// Directory to watch (absolute path).
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Size budget, with optional suffix (`500m`, `2g`, `1024`).
    #[arg(long, value_name = "SIZE")]
    max_size: String,
    /// Eviction order: `oldest-first` or `largest-first`.
    #[arg(long, default_value = "oldest-first", value_name = "ORDER")]
    policy: EvictionOrder,
    /// Extra headroom to free below the budget on each eviction.
    #[arg(long, value_name = "SIZE")]
    margin: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct PathArg {
    /// Registered directory path.
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

#[derive(Debug, Clone, Args, Default)]
struct ListArgs {
    /// Only show enabled entries.
    #[arg(long)]
    enabled: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct MonitorArgs {
    /// Override the cycle interval in seconds.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
    /// Log to stdout instead of the JSONL activity log.
    #[arg(long)]
    foreground: bool,
    /// Optional pidfile path for non-service usage.
    #[arg(long, value_name = "PATH")]
    pidfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the resolved config file path.
    Path,
    /// Show the effective configuration.
    Show,
    /// Validate the configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum, value_name = "SHELL")]
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
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
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
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Add(args) => run_add(cli, args),
        Command::Remove(args) => run_remove(cli, args),
        Command::Enable(args) => run_set_enabled(cli, args, true),
        Command::Disable(args) => run_set_enabled(cli, args, false),
        Command::List(args) => run_list(cli, args),
        Command::Monitor(args) => run_monitor(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_add(cli: &Cli, args: &AddArgs) -> Result<(), CliError> {
    let max_size_bytes = parse_size(&args.max_size).map_err(|e| CliError::User(e.to_string()))?;
    let margin_bytes = match &args.margin {
        Some(raw) => parse_size(raw).map_err(|e| CliError::User(e.to_string()))?,
        None => 0,
    };
    let policy = EvictionPolicy {
        order: args.policy,
        margin_bytes,
    };

    let entry = open_registry(cli)?
        .add(&args.path, max_size_bytes, policy)
        .map_err(|e| CliError::User(e.to_string()))?;

    match output_mode(cli) {
        OutputMode::Json => emit_entry_json("add", &entry),
        OutputMode::Human => {
            println!(
                "{} {} (budget {})",
                "watching".green(),
                entry.path.display(),
                format_size(entry.max_size_bytes)
            );
            Ok(())
        }
    }
}

fn run_remove(cli: &Cli, args: &PathArg) -> Result<(), CliError> {
    let entry = open_registry(cli)?
        .remove(&args.path)
        .map_err(|e| CliError::User(e.to_string()))?;

    match output_mode(cli) {
        OutputMode::Json => emit_entry_json("remove", &entry),
        OutputMode::Human => {
            println!("{} {}", "removed".yellow(), entry.path.display());
            Ok(())
        }
    }
}

fn run_set_enabled(cli: &Cli, args: &PathArg, enabled: bool) -> Result<(), CliError> {
    let registry = open_registry(cli)?;
    let result = if enabled {
        registry.enable(&args.path)
    } else {
        registry.disable(&args.path)
    };
    let entry = result.map_err(|e| CliError::User(e.to_string()))?;

    let verb = if enabled { "enabled" } else { "disabled" };
    match output_mode(cli) {
        OutputMode::Json => emit_entry_json(verb, &entry),
        OutputMode::Human => {
            let colored_verb = if enabled {
                verb.green()
            } else {
                verb.yellow()
            };
            println!("{colored_verb} {}", entry.path.display());
            Ok(())
        }
    }
}

fn run_list(cli: &Cli, args: &ListArgs) -> Result<(), CliError> {
    let mut entries = open_registry(cli)?
        .list()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    if args.enabled {
        entries.retain(|e| e.enabled);
    }

    match output_mode(cli) {
        OutputMode::Json => {
            let payload = json!({
                "command": "list",
                "entries": entries,
            });
            writeln!(io::stdout(), "{}", serde_json::to_string_pretty(&payload)?)?;
            Ok(())
        }
        OutputMode::Human => {
            if entries.is_empty() {
                println!("no directories registered");
                return Ok(());
            }
            println!(
                "  {:<8}  {:>10}  {:<13}  {:>10}  {}",
                "State", "Budget", "Policy", "Last freed", "Path"
            );
            println!("  {}", "-".repeat(72));
            for entry in &entries {
                let state = if entry.enabled {
                    "enabled".green()
                } else {
                    "disabled".yellow()
                };
                println!(
                    "  {:<8}  {:>10}  {:<13}  {:>10}  {}",
                    state,
                    format_size(entry.max_size_bytes),
                    entry.policy.order.label(),
                    format_size(entry.last_freed_bytes),
                    entry.path.display()
                );
                if cli.verbose {
                    println!("  {:<8}  {}", "", describe_entry(entry));
                }
            }
            Ok(())
        }
    }
}

fn run_monitor(cli: &Cli, args: &MonitorArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    if let Some(interval) = args.interval {
        config.daemon.interval_secs = interval;
    }
    config
        .validate()
        .map_err(|e| CliError::User(e.to_string()))?;

    if let Some(pidfile) = &args.pidfile {
        write_pidfile(pidfile).map_err(|e| CliError::Runtime(e.to_string()))?;
    }

    let sink = if args.foreground {
        LogSink::Stdout
    } else {
        LogSink::Jsonl(JsonlConfig {
            path: config.paths.jsonl_log.clone(),
            max_size_bytes: config.logging.max_size_bytes,
            max_rotated_files: config.logging.max_rotated_files,
            fsync_interval_secs: config.logging.fsync_interval_secs,
        })
    };
    let (logger, logger_join) = spawn_logger(sink, config.logging.channel_capacity)
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let registry = Registry::open(config.paths.registry_file.clone());
    let mut monitor = Monitor::new(config, registry, SignalHandler::new(), logger.clone());
    let result = monitor.run();

    logger.shutdown();
    let _ = logger_join.join();
    result.map_err(|e| CliError::Runtime(e.to_string()))
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let command = args.command.clone().unwrap_or(ConfigCommand::Show);
    match command {
        ConfigCommand::Path => {
            let config = load_config(cli)?;
            println!("{}", config.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Show => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Json => {
                    writeln!(io::stdout(), "{}", serde_json::to_string_pretty(&config)?)?;
                    Ok(())
                }
                OutputMode::Human => {
                    let rendered = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(e.to_string()))?;
                    print!("{rendered}");
                    Ok(())
                }
            }
        }
        ConfigCommand::Validate => {
            let config = load_config(cli)?;
            config
                .validate()
                .map_err(|e| CliError::User(e.to_string()))?;
            if !cli.quiet {
                println!("{}", "configuration ok".green());
            }
            Ok(())
        }
    }
}

// ──────────────────── helpers ────────────────────

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))
}

fn open_registry(cli: &Cli) -> Result<Registry, CliError> {
    let config = load_config(cli)?;
    Ok(Registry::open(config.paths.registry_file))
}

/// Per-entry detail line shown by `list --verbose`.
fn describe_entry(entry: &WatchedDirectory) -> String {
    let stamp = |t: Option<DateTime<Utc>>| {
        t.map_or_else(
            || "never".to_string(),
            |t| t.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    };
    format!(
        "margin {}, last checked {}, last evicted {}",
        format_size(entry.policy.margin_bytes),
        stamp(entry.last_checked_at),
        stamp(entry.last_evicted_at)
    )
}

fn emit_entry_json(command: &str, entry: &WatchedDirectory) -> Result<(), CliError> {
    let payload = json!({
        "command": command,
        "entry": entry,
    });
    writeln!(io::stdout(), "{}", serde_json::to_string_pretty(&payload)?)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("DIRCAP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };
    match env_mode {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
