//! Max-Cut command implementation.

use anyhow::Result;
use varq_vqa::Method;

use super::common::{Job, RunArgs, resolve_config, solve};
use super::problem::{AnsatzKind, ProblemSpec, parse_edges};

/// Execute the maxcut command. Without `--edges` the 4-node ring is used.
pub async fn execute(
    edges: Option<&str>,
    n_nodes: Option<usize>,
    ansatz: AnsatzKind,
    layers: usize,
    method: Option<Method>,
    args: &RunArgs,
) -> Result<()> {
    let edges = parse_edges(edges.unwrap_or(SQUARE))?;
    if edges.is_empty() {
        anyhow::bail!("Graph has no edges");
    }
    let problem = ProblemSpec::Maxcut { edges, n_nodes }.build()?;
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

const SQUARE: &str = "0-1,1-2,2-3,3-0";
