use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use shoal_core::cleanup::CleanupManager;
use shoal_core::config::{NodeConfig, RegistryMode};
use shoal_core::dispatch::ShardDispatcher;
use shoal_core::execution::TokioProcessExecutor;
use shoal_core::models::{CoreError, CoreErrorKind, CoreResult, ShardIndex};
use shoal_core::registry::build_executors;
use shoal_core::reporting::{DescribeRequest, describe_job, load_job};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage:
  shoal describe --id <job-id> --job-file <path>
  shoal engines [--noop]
  shoal run --job-file <path> [--shard <n>] [--noop]";

#[derive(Debug, Eq, PartialEq)]
enum Command {
    Describe(DescribeRequest),
    Engines { noop: bool },
    Run { job_file: PathBuf, shard: ShardIndex, noop: bool },
    Help,
}

fn main() -> ExitCode {
    init_logging();

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(error) => {
            eprintln!("{}\n\n{USAGE}", error.message);
            return ExitCode::from(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to create tokio runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(kind = ?error.kind, message = %error.message, "command failed");
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn execute(command: Command) -> CoreResult<()> {
    match command {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Describe(request) => {
            let description = describe_job(request)?;
            println!("{}", to_pretty_json(&description)?);
            Ok(())
        }
        Command::Engines { noop } => {
            let cleanup = CleanupManager::new();
            let result = list_engines(&cleanup, noop).await;
            finish(&cleanup, result).await
        }
        Command::Run {
            job_file,
            shard,
            noop,
        } => {
            let cleanup = CleanupManager::new();
            let result = run_job(&cleanup, job_file, shard, noop).await;
            finish(&cleanup, result).await
        }
    }
}

async fn list_engines(cleanup: &CleanupManager, noop: bool) -> CoreResult<()> {
    let config = node_config(noop)?;
    let registry = build_executors(cleanup, &config, Arc::new(TokioProcessExecutor)).await?;
    for engine in registry.engines() {
        println!("{engine}");
    }
    Ok(())
}

async fn run_job(
    cleanup: &CleanupManager,
    job_file: PathBuf,
    shard: ShardIndex,
    noop: bool,
) -> CoreResult<()> {
    let job = load_job(&job_file)?;
    let config = node_config(noop)?;
    let registry = build_executors(cleanup, &config, Arc::new(TokioProcessExecutor)).await?;

    let dispatcher = ShardDispatcher::new(Arc::new(registry));
    let output = dispatcher.run_shard(&job, shard).await?;
    println!("{}", to_pretty_json(&output)?);
    Ok(())
}

async fn finish(cleanup: &CleanupManager, result: CoreResult<()>) -> CoreResult<()> {
    let report = cleanup.cleanup().await;
    if !report.is_clean() {
        tracing::warn!(
            ran = report.ran,
            failed = report.failures.len(),
            "cleanup sweep reported failures"
        );
    }
    result
}

fn node_config(noop: bool) -> CoreResult<NodeConfig> {
    node_config_from(|key| std::env::var(key).ok(), noop)
}

/// `--noop` replaces the configured mode before the config is validated.
fn node_config_from(lookup: impl Fn(&str) -> Option<String>, noop: bool) -> CoreResult<NodeConfig> {
    NodeConfig::from_lookup_with_mode(lookup, noop.then_some(RegistryMode::Noop))
}

fn to_pretty_json(value: &impl serde::Serialize) -> CoreResult<String> {
    serde_json::to_string_pretty(value).map_err(|error| {
        CoreError::new(
            CoreErrorKind::Internal,
            format!("failed to serialize output: {error}"),
        )
    })
}

fn parse_args(args: impl IntoIterator<Item = String>) -> CoreResult<Command> {
    let mut args = args.into_iter();
    let Some(subcommand) = args.next() else {
        return Ok(Command::Help);
    };

    let mut id = None;
    let mut job_file = None;
    let mut shard = None;
    let mut noop = false;

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--id" | "-i" => id = Some(flag_value(&flag, args.next())?),
            "--job-file" => job_file = Some(PathBuf::from(flag_value(&flag, args.next())?)),
            "--shard" => {
                let value = flag_value(&flag, args.next())?;
                let index = value.parse::<u32>().map_err(|_| {
                    usage_error(format!("--shard expects a non-negative integer, got '{value}'"))
                })?;
                shard = Some(ShardIndex(index));
            }
            "--noop" => noop = true,
            other => return Err(usage_error(format!("unknown argument '{other}'"))),
        }
    }

    match subcommand.as_str() {
        "describe" => {
            let Some(job_id) = id else {
                return Err(usage_error("please submit an id with the --id flag".to_string()));
            };
            let job_file = job_file.ok_or_else(|| usage_error("describe needs --job-file".to_string()))?;
            Ok(Command::Describe(DescribeRequest::new(job_id, job_file)))
        }
        "engines" => Ok(Command::Engines { noop }),
        "run" => {
            let job_file = job_file.ok_or_else(|| usage_error("run needs --job-file".to_string()))?;
            Ok(Command::Run {
                job_file,
                shard: shard.unwrap_or(ShardIndex(0)),
                noop,
            })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(usage_error(format!("unknown command '{other}'"))),
    }
}

fn flag_value(flag: &str, value: Option<String>) -> CoreResult<String> {
    value.ok_or_else(|| usage_error(format!("{flag} expects a value")))
}

fn usage_error(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::InvalidInput, message)
}
