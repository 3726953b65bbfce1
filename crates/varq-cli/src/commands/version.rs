//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - variational quantum optimization on a statevector simulator",
        style("varq").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  varq-sim   Statevector, Pauli Hamiltonians, Trotter evolution");
    println!("  varq-vqa   Parameterized circuits, costs, gradients, optimizers");
    println!("  varq-cli   Command-line interface");
    println!();
    println!(
        "Optimizers: {}",
        style("nelder-mead, spsa, gradient-descent, adam").dim()
    );
    println!("License:    {}", style("Apache-2.0").dim());
}
