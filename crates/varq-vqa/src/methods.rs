//! Classical update rules for the variational loop.
//!
//! Each [`Method`] becomes a [`Stepper`]: a stateful rule that performs one
//! iteration against an [`Objective`] and reports the point it scored, that
//! point's cost, and whether its convergence test passed.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::VqaResult;

/// Something a [`Stepper`] can minimize.
pub trait Objective {
    /// `f(params)`.
    fn cost(&mut self, params: &[f64]) -> VqaResult<f64>;

    /// `∇f(params)`.
    fn gradient(&mut self, params: &[f64]) -> VqaResult<Vec<f64>>;
}

/// Outcome of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The point whose cost is reported.
    pub point: Vec<f64>,
    /// Cost at `point`.
    pub cost: f64,
    /// True if the method's convergence test passed.
    pub converged: bool,
}

/// One iteration of an optimization method.
pub trait Stepper: Send {
    /// Run one iteration.
    fn step(&mut self, objective: &mut dyn Objective) -> VqaResult<Step>;
}

/// Optimization method and its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Method {
    /// Derivative-free simplex search. Converges when the spread of simplex
    /// values falls below the tolerance.
    NelderMead {
        /// Edge length of the initial simplex.
        #[serde(default = "default_initial_step")]
        initial_step: f64,
    },
    /// Simultaneous perturbation stochastic approximation with gains
    /// `a_k = a / (k+1)^α` and `c_k = c / (k+1)^γ`.
    Spsa {
        /// Step gain.
        #[serde(default = "default_spsa_a")]
        a: f64,
        /// Perturbation gain.
        #[serde(default = "default_spsa_c")]
        c: f64,
        /// Step decay exponent.
        #[serde(default = "default_spsa_alpha")]
        alpha: f64,
        /// Perturbation decay exponent.
        #[serde(default = "default_spsa_gamma")]
        gamma: f64,
    },
    /// Fixed-rate gradient descent.
    GradientDescent {
        /// Learning rate.
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
    },
    /// Adaptive moment estimation.
    Adam {
        /// Learning rate.
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        /// First-moment decay.
        #[serde(default = "default_beta1")]
        beta1: f64,
        /// Second-moment decay.
        #[serde(default = "default_beta2")]
        beta2: f64,
        /// Denominator offset.
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
}

fn default_initial_step() -> f64 {
    0.5
}

fn default_spsa_a() -> f64 {
    0.2
}

fn default_spsa_c() -> f64 {
    0.1
}

fn default_spsa_alpha() -> f64 {
    0.602
}

fn default_spsa_gamma() -> f64 {
    0.101
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

impl Default for Method {
    fn default() -> Self {
        Method::adam(default_learning_rate())
    }
}

impl Method {
    /// Nelder-Mead with the default initial simplex.
    pub fn nelder_mead() -> Self {
        Method::NelderMead {
            initial_step: default_initial_step(),
        }
    }

    /// SPSA with standard gains.
    pub fn spsa() -> Self {
        Method::Spsa {
            a: default_spsa_a(),
            c: default_spsa_c(),
            alpha: default_spsa_alpha(),
            gamma: default_spsa_gamma(),
        }
    }

    /// Gradient descent with `learning_rate`.
    pub fn gradient_descent(learning_rate: f64) -> Self {
        Method::GradientDescent { learning_rate }
    }

    /// Adam with `learning_rate` and standard moment decays.
    pub fn adam(learning_rate: f64) -> Self {
        Method::Adam {
            learning_rate,
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }

    /// Short name.
    pub fn name(&self) -> &'static str {
        match self {
            Method::NelderMead { .. } => "nelder-mead",
            Method::Spsa { .. } => "spsa",
            Method::GradientDescent { .. } => "gradient-descent",
            Method::Adam { .. } => "adam",
        }
    }

    /// True if the method consumes gradients.
    pub fn uses_gradient(&self) -> bool {
        matches!(self, Method::GradientDescent { .. } | Method::Adam { .. })
    }

    /// Check hyperparameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(format!("{} {name} must be positive, got {v}", self.name()))
            }
        };
        match *self {
            Method::NelderMead { initial_step } => positive("initial_step", initial_step),
            Method::Spsa { a, c, alpha, gamma } => {
                positive("a", a)?;
                positive("c", c)?;
                positive("alpha", alpha)?;
                positive("gamma", gamma)
            }
            Method::GradientDescent { learning_rate } => positive("learning_rate", learning_rate),
            Method::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                positive("learning_rate", learning_rate)?;
                positive("epsilon", epsilon)?;
                for (name, beta) in [("beta1", beta1), ("beta2", beta2)] {
                    if !(0.0..1.0).contains(&beta) {
                        return Err(format!("adam {name} must be in [0, 1), got {beta}"));
                    }
                }
                Ok(())
            }
        }
    }

    /// Stateful stepper starting at `initial`.
    pub fn stepper(&self, initial: Vec<f64>, tolerance: f64, seed: u64) -> Box<dyn Stepper> {
        match *self {
            Method::NelderMead { initial_step } => Box::new(NelderMead {
                initial,
                initial_step,
                tolerance,
                simplex: Vec::new(),
                values: Vec::new(),
            }),
            Method::Spsa { a, c, alpha, gamma } => Box::new(Spsa {
                x: initial,
                a,
                c,
                alpha,
                gamma,
                k: 0,
                rng: StdRng::seed_from_u64(seed),
                tolerance,
                previous: None,
            }),
            Method::GradientDescent { learning_rate } => Box::new(GradientDescent {
                x: initial,
                learning_rate,
                tolerance,
                previous: None,
            }),
            Method::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                let n = initial.len();
                Box::new(Adam {
                    x: initial,
                    learning_rate,
                    beta1,
                    beta2,
                    epsilon,
                    m: vec![0.0; n],
                    v: vec![0.0; n],
                    t: 0,
                    tolerance,
                    previous: None,
                })
            }
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::NelderMead { initial_step } => write!(f, "nelder-mead(step={initial_step})"),
            Method::Spsa { a, c, .. } => write!(f, "spsa(a={a}, c={c})"),
            Method::GradientDescent { learning_rate } => {
                write!(f, "gradient-descent(lr={learning_rate})")
            }
            Method::Adam { learning_rate, .. } => write!(f, "adam(lr={learning_rate})"),
        }
    }
}

impl FromStr for Method {
    type Err = String;

    /// Parse a method name; hyperparameters take their defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "nelder-mead" | "nm" => Ok(Method::nelder_mead()),
            "spsa" => Ok(Method::spsa()),
            "gradient-descent" | "gd" => Ok(Method::gradient_descent(default_learning_rate())),
            "adam" => Ok(Method::default()),
            other => Err(format!(
                "unknown method '{other}' (expected nelder-mead, spsa, gradient-descent or adam)"
            )),
        }
    }
}

/// `|f_k − f_{k−1}| < tol` or `‖∇f‖ < tol`.
fn gradient_converged(previous: Option<f64>, cost: f64, gradient: &[f64], tolerance: f64) -> bool {
    let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
    norm < tolerance || previous.is_some_and(|p| (p - cost).abs() < tolerance)
}

// ---------------------------------------------------------------------------
// Gradient descent
// ---------------------------------------------------------------------------

struct GradientDescent {
    x: Vec<f64>,
    learning_rate: f64,
    tolerance: f64,
    previous: Option<f64>,
}

impl Stepper for GradientDescent {
    fn step(&mut self, objective: &mut dyn Objective) -> VqaResult<Step> {
        let cost = objective.cost(&self.x)?;
        let gradient = objective.gradient(&self.x)?;
        let point = self.x.clone();
        let converged = gradient_converged(self.previous, cost, &gradient, self.tolerance);
        self.previous = Some(cost);

        if !converged {
            for (x, g) in self.x.iter_mut().zip(&gradient) {
                *x -= self.learning_rate * g;
            }
        }
        Ok(Step {
            point,
            cost,
            converged,
        })
    }
}

// ---------------------------------------------------------------------------
// Adam
// ---------------------------------------------------------------------------

struct Adam {
    x: Vec<f64>,
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
    tolerance: f64,
    previous: Option<f64>,
}

impl Stepper for Adam {
    fn step(&mut self, objective: &mut dyn Objective) -> VqaResult<Step> {
        let cost = objective.cost(&self.x)?;
        let gradient = objective.gradient(&self.x)?;
        let point = self.x.clone();
        let converged = gradient_converged(self.previous, cost, &gradient, self.tolerance);
        self.previous = Some(cost);

        if !converged {
            self.t += 1;
            let bias1 = 1.0 - self.beta1.powi(self.t);
            let bias2 = 1.0 - self.beta2.powi(self.t);
            for i in 0..self.x.len() {
                let g = gradient[i];
                self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
                self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = self.m[i] / bias1;
                let v_hat = self.v[i] / bias2;
                self.x[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
        Ok(Step {
            point,
            cost,
            converged,
        })
    }
}

// ---------------------------------------------------------------------------
// SPSA
// ---------------------------------------------------------------------------

struct Spsa {
    x: Vec<f64>,
    a: f64,
    c: f64,
    alpha: f64,
    gamma: f64,
    k: usize,
    rng: StdRng,
    tolerance: f64,
    previous: Option<f64>,
}

impl Stepper for Spsa {
    fn step(&mut self, objective: &mut dyn Objective) -> VqaResult<Step> {
        if self.previous.is_none() {
            self.previous = Some(objective.cost(&self.x)?);
        }

        let k = (self.k + 1) as f64;
        let a_k = self.a / k.powf(self.alpha);
        let c_k = self.c / k.powf(self.gamma);
        self.k += 1;

        let delta: Vec<f64> = (0..self.x.len())
            .map(|_| if self.rng.r#gen::<bool>() { 1.0 } else { -1.0 })
            .collect();
        let plus: Vec<f64> = self.x.iter().zip(&delta).map(|(x, d)| x + c_k * d).collect();
        let minus: Vec<f64> = self.x.iter().zip(&delta).map(|(x, d)| x - c_k * d).collect();
        let diff = objective.cost(&plus)? - objective.cost(&minus)?;

        for (x, d) in self.x.iter_mut().zip(&delta) {
            *x -= a_k * diff / (2.0 * c_k * d);
        }

        let cost = objective.cost(&self.x)?;
        let converged = self
            .previous
            .is_some_and(|p| (p - cost).abs() < self.tolerance);
        self.previous = Some(cost);
        Ok(Step {
            point: self.x.clone(),
            cost,
            converged,
        })
    }
}

// ---------------------------------------------------------------------------
// Nelder-Mead
// ---------------------------------------------------------------------------

struct NelderMead {
    initial: Vec<f64>,
    initial_step: f64,
    tolerance: f64,
    simplex: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl NelderMead {
    fn initialize(&mut self, objective: &mut dyn Objective) -> VqaResult<()> {
        let n = self.initial.len();
        self.simplex = Vec::with_capacity(n + 1);
        self.simplex.push(self.initial.clone());
        for i in 0..n {
            let mut vertex = self.initial.clone();
            vertex[i] += self.initial_step;
            self.simplex.push(vertex);
        }
        self.values = self
            .simplex
            .iter()
            .map(|v| objective.cost(v))
            .collect::<VqaResult<Vec<_>>>()?;
        Ok(())
    }

    fn order(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.simplex.len()).collect();
        indices.sort_by(|&a, &b| self.values[a].total_cmp(&self.values[b]));
        indices
    }

    fn iterate(&mut self, objective: &mut dyn Objective) -> VqaResult<()> {
        let n = self.initial.len();
        let indices = self.order();
        let best = indices[0];
        let worst = indices[n];
        let second_worst = indices[n - 1];

        // Centroid of every vertex except the worst.
        let mut centroid = vec![0.0; n];
        for &idx in &indices[..n] {
            for (c, v) in centroid.iter_mut().zip(&self.simplex[idx]) {
                *c += v;
            }
        }
        for c in &mut centroid {
            *c /= n as f64;
        }

        let along = |t: f64, from: &[f64]| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, w)| c + t * (c - w))
                .collect()
        };

        let reflected = along(1.0, &self.simplex[worst]);
        let f_reflected = objective.cost(&reflected)?;

        if f_reflected < self.values[best] {
            let expanded = along(2.0, &self.simplex[worst]);
            let f_expanded = objective.cost(&expanded)?;
            if f_expanded < f_reflected {
                self.replace(worst, expanded, f_expanded);
            } else {
                self.replace(worst, reflected, f_reflected);
            }
        } else if f_reflected < self.values[second_worst] {
            self.replace(worst, reflected, f_reflected);
        } else {
            let contracted = along(-0.5, &self.simplex[worst]);
            let f_contracted = objective.cost(&contracted)?;
            if f_contracted < self.values[worst] {
                self.replace(worst, contracted, f_contracted);
            } else {
                // Shrink toward the best vertex.
                let anchor = self.simplex[best].clone();
                for i in 0..=n {
                    if i == best {
                        continue;
                    }
                    for (x, b) in self.simplex[i].iter_mut().zip(&anchor) {
                        *x = 0.5 * (*b + *x);
                    }
                    self.values[i] = objective.cost(&self.simplex[i])?;
                }
            }
        }
        Ok(())
    }

    fn replace(&mut self, index: usize, vertex: Vec<f64>, value: f64) {
        self.simplex[index] = vertex;
        self.values[index] = value;
    }
}

impl Stepper for NelderMead {
    fn step(&mut self, objective: &mut dyn Objective) -> VqaResult<Step> {
        if self.simplex.is_empty() {
            self.initialize(objective)?;
        } else if !self.initial.is_empty() {
            self.iterate(objective)?;
        }

        let indices = self.order();
        let best = indices[0];
        let worst = indices[indices.len() - 1];
        let spread = self.values[worst] - self.values[best];
        Ok(Step {
            point: self.simplex[best].clone(),
            cost: self.values[best],
            converged: spread < self.tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (x − 1)² + (y − 2)²
    struct Quadratic {
        evaluations: usize,
    }

    impl Objective for Quadratic {
        fn cost(&mut self, p: &[f64]) -> VqaResult<f64> {
            self.evaluations += 1;
            Ok((p[0] - 1.0).powi(2) + (p[1] - 2.0).powi(2))
        }

        fn gradient(&mut self, p: &[f64]) -> VqaResult<Vec<f64>> {
            Ok(vec![2.0 * (p[0] - 1.0), 2.0 * (p[1] - 2.0)])
        }
    }

    fn run(method: Method, iterations: usize, tolerance: f64) -> (Step, usize) {
        let mut stepper = method.stepper(vec![0.0, 0.0], tolerance, 7);
        let mut objective = Quadratic { evaluations: 0 };
        let mut last = None;
        for i in 0..iterations {
            let step = stepper.step(&mut objective).unwrap();
            if step.converged {
                return (step, i + 1);
            }
            last = Some(step);
        }
        (last.unwrap(), iterations)
    }

    #[test]
    fn test_nelder_mead_quadratic() {
        let (step, _) = run(Method::nelder_mead(), 300, 1e-10);
        assert!(step.cost < 1e-6);
        assert!((step.point[0] - 1.0).abs() < 1e-2);
        assert!((step.point[1] - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_gradient_descent_converges() {
        let (step, iterations) = run(Method::gradient_descent(0.2), 500, 1e-9);
        assert!(step.converged);
        assert!(iterations < 500);
        assert!(step.cost < 1e-6);
    }

    #[test]
    fn test_adam_approaches_minimum() {
        let (step, _) = run(Method::adam(0.1), 600, 1e-12);
        assert!(step.cost < 5e-2);
    }

    #[test]
    fn test_spsa_improves_and_is_seeded() {
        let (a, _) = run(Method::spsa(), 150, 0.0);
        let (b, _) = run(Method::spsa(), 150, 0.0);
        assert!(a.cost < 0.5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_step_reports_scored_point() {
        let mut stepper = Method::gradient_descent(0.1).stepper(vec![0.0, 0.0], 0.0, 0);
        let mut objective = Quadratic { evaluations: 0 };
        let first = stepper.step(&mut objective).unwrap();
        assert_eq!(first.point, vec![0.0, 0.0]);
        assert_eq!(first.cost, 5.0);
    }

    #[test]
    fn test_parse_and_validate() {
        assert_eq!("adam".parse::<Method>().unwrap(), Method::default());
        assert_eq!("Nelder_Mead".parse::<Method>().unwrap(), Method::nelder_mead());
        assert!("bfgs".parse::<Method>().is_err());

        assert!(Method::adam(0.1).validate().is_ok());
        assert!(Method::adam(-1.0).validate().is_err());
        let bad_beta = Method::Adam {
            learning_rate: 0.1,
            beta1: 1.0,
            beta2: 0.999,
            epsilon: 1e-8,
        };
        assert!(bad_beta.validate().is_err());
        assert!(Method::gradient_descent(0.1).uses_gradient());
        assert!(!Method::spsa().uses_gradient());
    }
}
