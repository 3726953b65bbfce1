//! varq Command-Line Interface
//!
//! Solve small combinatorial problems with QAOA or a hardware-efficient
//! ansatz on the built-in statevector simulator.
//!
//! ```text
//! varq partition --set 1,4,3 --ansatz hardware-efficient
//! varq maxcut --edges 0-1,1-2,2-3,3-0 --layers 2 --method spsa
//! varq run --config problem.yaml --export report.json
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;
use varq_vqa::Method;

mod commands;

use commands::common::RunArgs;
use commands::problem::AnsatzKind;
use commands::{maxcut, partition, run, version};

/// varq - variational quantum optimization
#[derive(Parser)]
#[command(name = "varq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv); VARQ_LOG is used when absent
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the problem described in a YAML file
    Run {
        /// Problem file (YAML)
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        opts: RunArgs,
    },

    /// Split a set of numbers into two parts of equal sum
    Partition {
        /// Comma-separated values, e.g. 1,4,3
        #[arg(short, long)]
        set: String,

        /// Circuit family
        #[arg(short, long, value_enum, default_value_t = AnsatzKind::Qaoa)]
        ansatz: AnsatzKind,

        /// Layer repetitions
        #[arg(short, long, default_value = "1")]
        layers: usize,

        /// Optimizer (nelder-mead, spsa, gradient-descent, adam)
        #[arg(short, long)]
        method: Option<Method>,

        #[command(flatten)]
        opts: RunArgs,
    },

    /// Find a maximum cut of a graph
    Maxcut {
        /// Edges as a-b or a-b:weight, comma-separated (default: 4-node ring)
        #[arg(short, long)]
        edges: Option<String>,

        /// Node count (default: one past the largest endpoint)
        #[arg(short, long)]
        n_nodes: Option<usize>,

        /// Circuit family
        #[arg(short, long, value_enum, default_value_t = AnsatzKind::Qaoa)]
        ansatz: AnsatzKind,

        /// Layer repetitions
        #[arg(short, long, default_value = "1")]
        layers: usize,

        /// Optimizer (nelder-mead, spsa, gradient-descent, adam)
        #[arg(short, long)]
        method: Option<Method>,

        #[command(flatten)]
        opts: RunArgs,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_env("VARQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Run { config, opts } => run::execute(&config, &opts).await,

        Commands::Partition {
            set,
            ansatz,
            layers,
            method,
            opts,
        } => partition::execute(&set, ansatz, layers, method, &opts).await,

        Commands::Maxcut {
            edges,
            n_nodes,
            ansatz,
            layers,
            method,
            opts,
        } => maxcut::execute(edges.as_deref(), n_nodes, ansatz, layers, method, &opts).await,

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
