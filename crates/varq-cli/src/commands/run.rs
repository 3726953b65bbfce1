//! Run command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;

use super::common::{Job, RunArgs, resolve_config, solve};
use super::problem::RunFile;

/// Execute the run command on a YAML problem file.
///
/// The file's `optimizer` section takes the place of any optimizer config
/// file; `--shots` overrides the file's `shots`.
pub async fn execute(path: &Path, args: &RunArgs) -> Result<()> {
    println!(
        "{} Loading {}",
        style("→").cyan().bold(),
        style(path.display()).green()
    );

    let file = RunFile::from_file(path)?;
    let problem = file.problem.build()?;
    let config = resolve_config(Some(file.optimizer), args, None)?;

    let job = Job {
        problem,
        ansatz: file.ansatz,
        layers: file.layers,
        shots: args.shots.or(file.shots),
        config,
    };
    solve(job, args).await
}
