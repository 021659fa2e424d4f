//! The command-line surface: `hexkin solve <program-files...>` with the
//! flags of the solver, mapping every error family onto its exit code.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use log::LevelFilter;

use crate::engine::termination::Indefinite;
use crate::mlp::EngineChoice;
use crate::mlp::MlpSolver;
use crate::options::SolverOptions;
use crate::parsing::ProgramReader;
use crate::plugins::register_builtin_plugins;
use crate::plugins::PluginRegistry;
use crate::registry::Registry;
use crate::results::SolveError;

#[derive(Debug, Parser)]
#[command(name = "hexkin", version, about = "Solver for HEX programs with modular extensions")]
struct Cli {
    #[command(subcommand)]
    command: Action,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Solve the given program files.
    Solve {
        /// The program files, concatenated in order.
        #[arg(required = true)]
        program_files: Vec<PathBuf>,

        /// Suppress everything except the answer sets themselves.
        #[arg(long)]
        silent: bool,

        /// Verbosity level (0 = errors only ... 4 = full solver trace).
        #[arg(long, value_name = "N", default_value_t = 1)]
        verbose: u8,

        /// Only show atoms of these predicates (comma separated).
        #[arg(long, value_name = "pred[,pred...]")]
        filter: Option<String>,

        /// Enumerate every model. This is also the default; the flag exists
        /// for compatibility with optimising front-ends.
        #[arg(long)]
        allmodels: bool,

        /// Disable the external-atom query cache.
        #[arg(long)]
        nocache: bool,

        /// Additional plugin directory. Recorded for compatibility; only the
        /// built-in plugins are available in this build.
        #[arg(long, value_name = "PATH")]
        plugindir: Option<PathBuf>,

        /// Model enumeration engine: `cdnl` (default) or `naive`.
        #[arg(long, value_name = "name")]
        solver: Option<String>,

        /// Parse and instantiate only; skip evaluation.
        #[arg(long)]
        noeval: bool,

        /// Stop after this many answer sets.
        #[arg(long, value_name = "N")]
        number: Option<u64>,

        /// Union value-call cycles over non-empty instantiations instead of
        /// rejecting them.
        #[arg(long)]
        permissive_cycles: bool,

        /// Write the call graph in DOT format to this file after solving.
        #[arg(long, value_name = "PATH")]
        dump_callgraph: Option<PathBuf>,
    },
}

/// Parses the command line and runs it, translating every outcome into the
/// documented exit codes: 0 on success, 1 on usage/parse/safety/
/// stratification errors, 2 on plugin errors, 99 on a violated invariant.
pub fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // clap renders --help/--version itself with exit code 0.
            if error.use_stderr() {
                error.print().expect("writing to stderr");
                return 1;
            }
            error.print().expect("writing to stdout");
            return 0;
        }
    };

    match execute(cli) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            error
                .downcast_ref::<SolveError>()
                .map(SolveError::exit_code)
                .unwrap_or(1)
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let Action::Solve {
        program_files,
        silent,
        verbose,
        filter,
        allmodels: _,
        nocache,
        plugindir,
        solver,
        noeval,
        number,
        permissive_cycles,
        dump_callgraph,
    } = cli.command;

    configure_logging(silent, verbose);

    let engine = match solver.as_deref() {
        None | Some("cdnl") => EngineChoice::Cdnl,
        Some("naive") => EngineChoice::Naive,
        Some(other) => {
            return Err(SolveError::Usage(format!("unknown solver `{other}`")).into());
        }
    };

    let mut plugins = PluginRegistry::new();
    register_builtin_plugins(&mut plugins);
    if let Some(directory) = plugindir {
        info!(
            "plugin directory {} recorded; dynamic loading is not built in",
            directory.display()
        );
    }

    let mut source = String::new();
    for path in &program_files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))
            .map_err(|error| SolveError::Usage(format!("{error:#}")))?;
        source.push_str(&text);
        source.push('\n');
    }

    let mut registry = Registry::new();
    ProgramReader::new(&plugins).load(&mut registry, &source)?;

    if noeval {
        info!("--noeval: stopping after parsing");
        return Ok(());
    }

    let filter: Option<Vec<String>> =
        filter.map(|list| list.split(',').map(str::to_owned).collect());

    let options = SolverOptions {
        max_models: number,
        external_cache: !nocache,
        reject_nonempty_cycles: !permissive_cycles,
        ..SolverOptions::default()
    };

    let mut solver = MlpSolver::new(&mut registry, &plugins, options).with_engine(engine);
    let count = solver.solve(&mut Indefinite, |registry, answer| {
        println!("{}", answer.render(registry, filter.as_deref()));
    })?;

    if let Some(path) = dump_callgraph {
        std::fs::write(&path, solver.call_graph_dot())
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if !silent {
        solver.statistics().log_statistics();
        if count == 0 {
            println!("no answer set");
        }
    }
    Ok(())
}

fn configure_logging(silent: bool, verbose: u8) {
    let level = if silent {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .try_init();
}
