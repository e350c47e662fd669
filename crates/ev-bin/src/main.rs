//! evflow entrypoint: load configuration, build the graph, run the
//! dispatch loop until the process is terminated.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use core_engine::{Engine, ProcessingState, build_graph, process_iteration};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "evflow", version, about = "Event-routing engine for Linux input devices")]
struct Args {
    /// Read configuration from this file.
    #[arg(long, short = 'c', default_value = "evflow.toml")]
    config: PathBuf,
    /// List currently available node types and exit.
    #[arg(long, short = 'l')]
    list_modules: bool,
    /// Print help information provided for one node type and exit.
    #[arg(long, value_name = "TYPE")]
    module_help: Option<String>,
    /// Append logs to this file instead of standard error (keeps stdout
    /// free for the print sink either way).
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn configure_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_env("EVFLOW_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let registry = core_nodes::builtin_registry();

    if args.list_modules {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }
    if let Some(name) = &args.module_help {
        let Some(spec) = registry.lookup(name) else {
            bail!("unknown node type \"{name}\"");
        };
        println!("Help for node type \"{}\":", spec.name);
        println!("{}", spec.documentation);
        return Ok(());
    }

    let _log_guard = configure_logging(args.log_file.as_deref())?;
    info!(target: "runtime", config = %args.config.display(), "startup");

    let file = core_config::load_file(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;

    let mut engine = Engine::new();
    let mut state = ProcessingState::new();
    let resolved =
        core_config::build(&file, &mut engine.predicates).context("resolving configuration")?;
    let nodes =
        build_graph(&mut engine, &mut state, &registry, &resolved).context("building the graph")?;
    info!(
        target: "runtime",
        nodes = nodes.len(),
        channels = resolved.channels.len(),
        "graph constructed"
    );

    loop {
        process_iteration(&mut state, &mut engine);
    }
}
