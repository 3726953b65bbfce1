//! CLI argument parsing and problem-building tests.
//!
//! The CLI is a binary crate, so argument parsing is checked against a clap
//! mirror of its command surface, and problem construction through the
//! `varq-vqa` API the commands call into.

// ============================================================================
// Problem construction as done by `varq partition` / `varq maxcut`
// ============================================================================

mod problem_tests {
    use varq_vqa::{
        CostEvaluator, CostMode, CostSpec, MaxCut, NumberPartition, OptimizerConfig, Problem,
        ansatz,
    };

    #[test]
    fn test_partition_qaoa_width_matches_set() {
        let problem = NumberPartition::new(vec![1.0, 4.0, 3.0]).unwrap();
        let circuit =
            ansatz::qaoa_with_width(&problem.hamiltonian(), problem.n_qubits(), 2).unwrap();
        assert_eq!(circuit.n_qubits(), 3);
        assert_eq!(circuit.num_parameters(), 4);
    }

    #[test]
    fn test_maxcut_isolated_node_keeps_its_qubit() {
        let graph = MaxCut::weighted(4, vec![(0, 1, 1.0), (1, 2, 2.5)]).unwrap();
        let circuit = ansatz::qaoa_with_width(&graph.hamiltonian(), graph.n_qubits(), 1).unwrap();
        assert_eq!(circuit.n_qubits(), 4);
    }

    #[test]
    fn test_hardware_efficient_parameter_labels() {
        let circuit = ansatz::hardware_efficient(3, 2).unwrap();
        let labels = circuit.parameter_labels();
        assert_eq!(labels.len(), 6);
        assert!(labels[0].starts_with("L0."));
        assert!(labels[5].starts_with("L1."));
    }

    #[test]
    fn test_observable_cost_is_default_mode() {
        let problem = NumberPartition::new(vec![2.0, 2.0]).unwrap();
        let cost = CostEvaluator::from_spec(CostSpec::observable(problem.hamiltonian())).unwrap();
        assert_eq!(cost.mode(), CostMode::Observable);
        assert!(cost.is_exact());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(OptimizerConfig::default().validate().is_ok());
    }
}

// ============================================================================
// Argument parsing
// ============================================================================

mod parsing_tests {
    use std::path::PathBuf;

    use clap::{Parser, Subcommand};
    use varq_vqa::Method;

    /// Mirror of the `varq` command surface.
    #[derive(Parser)]
    #[command(name = "varq")]
    struct TestCli {
        #[arg(short, long, action = clap::ArgAction::Count, global = true)]
        verbose: u8,

        #[command(subcommand)]
        command: TestCommands,
    }

    #[derive(Subcommand)]
    enum TestCommands {
        Run {
            #[arg(short, long)]
            config: PathBuf,
            #[arg(long)]
            export: Option<PathBuf>,
        },
        Partition {
            #[arg(short, long)]
            set: String,
            #[arg(short, long, default_value = "1")]
            layers: usize,
            #[arg(short, long)]
            method: Option<Method>,
            #[arg(long)]
            max_iterations: Option<usize>,
            #[arg(long)]
            timeout: Option<f64>,
        },
        Maxcut {
            #[arg(short, long)]
            edges: Option<String>,
            #[arg(short, long)]
            n_nodes: Option<usize>,
        },
        Version,
    }

    #[test]
    fn test_parse_run() {
        let cli =
            TestCli::try_parse_from(["varq", "run", "-c", "p.yaml", "--export", "r.json"]).unwrap();
        match cli.command {
            TestCommands::Run { config, export } => {
                assert_eq!(config, PathBuf::from("p.yaml"));
                assert_eq!(export, Some(PathBuf::from("r.json")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_config() {
        assert!(TestCli::try_parse_from(["varq", "run"]).is_err());
    }

    #[test]
    fn test_parse_partition_with_method() {
        let cli = TestCli::try_parse_from([
            "varq",
            "-vv",
            "partition",
            "--set",
            "1,4,3",
            "--method",
            "nelder_mead",
            "--max-iterations",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            TestCommands::Partition {
                set,
                layers,
                method,
                max_iterations,
                timeout,
            } => {
                assert_eq!(set, "1,4,3");
                assert_eq!(layers, 1);
                assert_eq!(method, Some(Method::nelder_mead()));
                assert_eq!(max_iterations, Some(50));
                assert_eq!(timeout, None);
            }
            _ => panic!("expected partition"),
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result =
            TestCli::try_parse_from(["varq", "partition", "--set", "1,2", "--method", "bfgs"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_maxcut_defaults() {
        let cli = TestCli::try_parse_from(["varq", "maxcut"]).unwrap();
        match cli.command {
            TestCommands::Maxcut { edges, n_nodes } => {
                assert_eq!(edges, None);
                assert_eq!(n_nodes, None);
            }
            _ => panic!("expected maxcut"),
        }
    }

    #[test]
    fn test_parse_version() {
        let cli = TestCli::try_parse_from(["varq", "version"]).unwrap();
        assert!(matches!(cli.command, TestCommands::Version));
    }
}
