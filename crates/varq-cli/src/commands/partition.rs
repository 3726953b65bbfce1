//! Partition command implementation.

use anyhow::Result;
use varq_vqa::Method;

use super::common::{Job, RunArgs, resolve_config, solve};
use super::problem::{AnsatzKind, ProblemSpec, parse_set};

/// Execute the partition command.
pub async fn execute(
    set: &str,
    ansatz: AnsatzKind,
    layers: usize,
    method: Option<Method>,
    args: &RunArgs,
) -> Result<()> {
    let problem = ProblemSpec::Partition {
        set: parse_set(set)?,
    }
    .build()?;
    let config = resolve_config(None, args, method)?;

    let job = Job {
        problem,
        ansatz,
        layers,
        shots: args.shots,
        config,
    };
    solve(job, args).await
}
