use crate::config::ResolvedConfig;
use crate::errors::{AppError, AppResult};
use crate::pipeline::{run_pipeline, RunSummary};
use crate::pool::CancelToken;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{info, warn};

// CLI metadata constants
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
const APP_ABOUT: &str = env!("CARGO_PKG_DESCRIPTION");

/// Arguments of the `run` subcommand after config file and flags are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: ResolvedConfig,
}

pub fn build_command() -> Command<'static> {
    Command::new("archive-etl")
        .version(APP_VERSION)
        .author(APP_AUTHOR)
        .about(APP_ABOUT)
        .subcommand(
            Command::new("run")
                .about("Extract every XML record from a directory of ZIP archives into two CSV tables")
                .after_help("Writes <output-dir>/levels.csv (id,level) and <output-dir>/obj_names.csv (id,object_name).\nExample:\n  archive-etl run zip/ csv/ --workers 8")
                .arg(
                    Arg::new("input_dir")
                        .help("Directory containing the .zip archives")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("output_dir")
                        .help("Directory receiving the CSV files (created if missing)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .help("Number of parallel extraction workers (default: available cores)")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("queue_depth")
                        .short('q')
                        .long("queue-depth")
                        .help("Row batches buffered between workers and the CSV writer")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Path to a TOML config file; flags override its values")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
}

/// Merges the optional config file with command-line overrides.
pub fn resolve_run_args(sub: &ArgMatches) -> AppResult<RunArgs> {
    let input_dir = sub
        .get_one::<PathBuf>("input_dir")
        .cloned()
        .ok_or_else(|| AppError::InvalidInput("missing <input-dir>".into()))?;
    let output_dir = sub
        .get_one::<PathBuf>("output_dir")
        .cloned()
        .ok_or_else(|| AppError::InvalidInput("missing <output-dir>".into()))?;

    let mut config = match sub.get_one::<PathBuf>("config") {
        Some(path) => ResolvedConfig::from_toml_file(path)?,
        None => ResolvedConfig::default(),
    };
    if let Some(&workers) = sub.get_one::<usize>("workers") {
        config.workers = workers;
    }
    if let Some(&depth) = sub.get_one::<usize>("queue_depth") {
        config.queue_depth = depth;
    }
    config.validate()?;

    Ok(RunArgs {
        input_dir,
        output_dir,
        config,
    })
}

/// Parses command-line arguments and executes the requested subcommand.
///
/// `run` drives the pipeline and prints the summary line to stdout. Per-record
/// failures do not make it fail; only fatal errors (unreadable input directory,
/// sink write failure, invalid configuration) are returned.
pub async fn cli() -> AppResult<()> {
    let cmd = build_command();
    let mut cmd_for_help = cmd.clone();
    let matches = cmd.get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => {
            let args = resolve_run_args(sub)?;
            let summary = run_workflow(args).await?;
            println!("{summary}");
        }
        _ => {
            cmd_for_help
                .print_help()
                .map_err(|e| AppError::InvalidInput(format!("Failed to print help: {e}")))?;
        }
    }

    Ok(())
}

/// Runs the pipeline on a blocking task, cancelling it cooperatively on Ctrl-C.
pub async fn run_workflow(args: RunArgs) -> AppResult<RunSummary> {
    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight records before exit");
            signal_token.cancel();
        }
    });

    info!(
        input_dir = %args.input_dir.display(),
        output_dir = %args.output_dir.display(),
        "Starting run"
    );

    let RunArgs {
        input_dir,
        output_dir,
        config,
    } = args;
    let outcome = tokio::task::spawn_blocking(move || {
        run_pipeline(&input_dir, &output_dir, &config, &cancel)
    })
    .await;
    signal_task.abort();

    outcome.map_err(|e| AppError::WorkerPool(format!("Pipeline task failed: {e}")))?
}
