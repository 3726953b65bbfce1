//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use uuid::Uuid;
use varq_vqa::{Method, OptimizationResult, Optimizer, OptimizerConfig, Termination};

use super::problem::{AnsatzKind, SharedProblem, build_circuit, build_cost};

/// Largest problem for which the exact optimum is enumerated.
const OPTIMUM_MAX_QUBITS: usize = 16;

/// Optimizer and output flags shared by every solving command.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Maximum optimizer iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Convergence tolerance
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Random seed for initialization and sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Wall-clock limit in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Sampled shots per cost evaluation (exact expectation when omitted)
    #[arg(long)]
    pub shots: Option<u32>,

    /// Number of outcomes to print
    #[arg(long, default_value = "8")]
    pub top: usize,

    /// Write a JSON report to this file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Optimizer config file (YAML)
    #[arg(long, env = "VARQ_CONFIG")]
    pub optimizer_config: Option<PathBuf>,
}

/// Return the default optimizer config path (~/.varq/config.yaml).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".varq").join("config.yaml"))
}

/// Resolve the optimizer configuration.
///
/// `base` wins over any config file. Environment variables are applied on
/// top, then command-line flags, then the result is validated.
pub fn resolve_config(
    base: Option<OptimizerConfig>,
    args: &RunArgs,
    method: Option<Method>,
) -> Result<OptimizerConfig> {
    let config = match base {
        Some(config) => config,
        None => load_config_file(args.optimizer_config.as_deref())?,
    };
    let config = config.merge_env(|key| std::env::var(key).ok())?;
    let config = apply_overrides(config, args, method);
    config.validate()?;
    Ok(config)
}

fn load_config_file(explicit: Option<&Path>) -> Result<OptimizerConfig> {
    if let Some(path) = explicit {
        return OptimizerConfig::from_file(path)
            .with_context(|| format!("Failed to load optimizer config: {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "using default optimizer config");
            OptimizerConfig::from_file(&path)
                .with_context(|| format!("Failed to load optimizer config: {}", path.display()))
        }
        _ => Ok(OptimizerConfig::default()),
    }
}

/// Apply command-line flags over a loaded configuration.
pub fn apply_overrides(
    mut config: OptimizerConfig,
    args: &RunArgs,
    method: Option<Method>,
) -> OptimizerConfig {
    if let Some(method) = method {
        config = config.with_method(method);
    }
    if let Some(n) = args.max_iterations {
        config = config.with_max_iterations(n);
    }
    if let Some(tol) = args.tolerance {
        config = config.with_tolerance(tol);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(seconds) = args.timeout {
        config = config.with_timeout(seconds);
    }
    config
}

/// Print a command header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", style("═".repeat(60)).cyan());
    println!("{}", style(format!("  {title}")).cyan().bold());
    println!("{}", style("═".repeat(60)).cyan());
    println!();
}

/// Print a section title.
pub fn print_section(title: &str) {
    println!();
    println!("{}", style(format!("▶ {title}")).green().bold());
    println!("{}", style("─".repeat(40)).dim());
}

/// Print a result line.
pub fn print_result(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", style(format!("{label}:")).dim(), value);
}

/// A fully resolved optimization job.
pub struct Job {
    pub problem: SharedProblem,
    pub ansatz: AnsatzKind,
    pub layers: usize,
    pub shots: Option<u32>,
    pub config: OptimizerConfig,
}

#[derive(Debug, Serialize)]
struct Outcome {
    bitstring: String,
    label: String,
    probability: f64,
    cost: f64,
}

#[derive(Debug, Serialize)]
struct Optimum {
    cost: f64,
    bitstrings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    run_id: Uuid,
    timestamp: DateTime<Utc>,
    problem: &'a str,
    ansatz: AnsatzKind,
    layers: usize,
    n_qubits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    shots: Option<u32>,
    method: &'a Method,
    parameter_labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optimum: Option<Optimum>,
    result: &'a OptimizationResult,
    outcomes: Vec<Outcome>,
}

/// Optimize `job`, print a summary and optionally export a JSON report.
///
/// Ctrl-C cancels the run; the best point found so far is still reported.
pub async fn solve(job: Job, args: &RunArgs) -> Result<()> {
    let Job {
        problem,
        ansatz,
        layers,
        shots,
        config,
    } = job;

    print_header(&format!("{problem_name} · {ansatz} · p={layers}", problem_name = problem.name()));

    let circuit = build_circuit(&*problem, ansatz, layers)?;
    let cost = build_cost(&problem, shots)?;

    print_result("Qubits", circuit.n_qubits());
    print_result("Parameters", circuit.num_parameters());
    print_result("Method", &config.method);
    print_result(
        "Cost",
        match shots {
            None => "exact expectation".to_string(),
            Some(shots) => format!("{shots} shots"),
        },
    );

    let optimizer = Optimizer::new(circuit, cost, config)?;

    let cancel = optimizer.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current iteration");
            cancel.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Optimizing parameters...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let (optimizer, result) = tokio::task::spawn_blocking(move || {
        let result = optimizer.optimize_parameters();
        (optimizer, result)
    })
    .await
    .context("Optimizer task failed")?;

    spinner.finish_and_clear();
    interrupt.abort();
    let result = result?;

    print_summary(&optimizer, &result);

    let optimum = (problem.n_qubits() <= OPTIMUM_MAX_QUBITS).then(|| {
        let (bitstrings, cost) = problem.optimum();
        Optimum {
            cost,
            bitstrings: bitstrings.iter().map(ToString::to_string).collect(),
        }
    });
    if let Some(optimum) = &optimum {
        print_result(
            "Optimum",
            format!("{:.6} ({})", optimum.cost, optimum.bitstrings.join(", ")),
        );
    }

    let distribution = optimizer
        .cost()
        .distribution(optimizer.circuit(), result.best_params())?;
    let outcomes: Vec<Outcome> = distribution
        .iter()
        .take(args.top)
        .map(|(b, p)| Outcome {
            bitstring: b.to_string(),
            label: problem.describe(b),
            probability: *p,
            cost: problem.cost(b),
        })
        .collect();
    print_outcomes(&outcomes, distribution.len());

    if let Some(path) = &args.export {
        let report = Report {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            problem: problem.name(),
            ansatz,
            layers,
            n_qubits: problem.n_qubits(),
            shots,
            method: &optimizer.config().method,
            parameter_labels: optimizer.circuit().parameter_labels(),
            optimum,
            result: &result,
            outcomes,
        };
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        println!(
            "\n{} Report written to {}",
            style("✓").green().bold(),
            style(path.display()).green()
        );
    }

    Ok(())
}

fn print_summary(optimizer: &Optimizer, result: &OptimizationResult) {
    let marker = match result.termination() {
        Termination::Converged => style("✓").green().bold(),
        _ => style("!").yellow().bold(),
    };
    println!(
        "\n{} {} after {} iterations",
        marker,
        result.termination(),
        result.iterations()
    );

    print_result("Best cost", style(format!("{:.6}", result.best_cost())).yellow());
    print_result(
        "Evaluations",
        format!(
            "{} cost, {} gradient",
            result.cost_evaluations(),
            result.gradient_evaluations()
        ),
    );
    print_result("Elapsed", format!("{:.3} s", result.elapsed_seconds()));

    print_section("Parameters");
    for (label, value) in optimizer
        .circuit()
        .parameter_labels()
        .iter()
        .zip(result.best_params())
    {
        println!("  {:<16} {:>10.6}", style(label).cyan(), value);
    }
}

fn print_outcomes(outcomes: &[Outcome], total: usize) {
    print_section("Outcomes");
    for outcome in outcomes {
        let percent = outcome.probability * 100.0;
        let bar = "█".repeat((percent / 2.0).round() as usize);
        println!(
            "  {}: {:>6.2}%  cost {:>9.4}  {} {}",
            style(&outcome.bitstring).cyan(),
            percent,
            outcome.cost,
            style(&outcome.label).dim(),
            style(bar).green()
        );
    }
    if total > outcomes.len() {
        println!("  ... and {} more outcomes", total - outcomes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_flags_override_config() {
        let harness = Harness::parse_from([
            "varq",
            "--max-iterations",
            "17",
            "--seed",
            "3",
            "--timeout",
            "2.5",
        ]);
        let config = apply_overrides(
            OptimizerConfig::default().with_tolerance(1e-4),
            &harness.run,
            Some(Method::spsa()),
        );
        assert_eq!(config.max_iterations, 17);
        assert_eq!(config.seed, 3);
        assert_eq!(config.timeout_seconds, Some(2.5));
        assert_eq!(config.tolerance, 1e-4);
        assert_eq!(config.method, Method::spsa());
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let harness = Harness::parse_from(["varq"]);
        assert_eq!(harness.run.top, 8);
        let base = OptimizerConfig::default().with_max_iterations(9);
        let config = apply_overrides(base.clone(), &harness.run, None);
        assert_eq!(config, base);
    }
}
