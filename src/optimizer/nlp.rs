//! Generic constrained nonlinear program solver.
//!
//! Sequential quadratic-penalty method: equality and inequality violations
//! are folded into the objective with a growing penalty coefficient, and each
//! penalized subproblem is minimized by projected gradient descent with a
//! backtracking line search. Gradients are central finite differences.
//!
//! The solver is deterministic: identical problems and initial guesses yield
//! identical solutions. Problems in this crate are small (a handful of
//! variables per demand node), so simple dense numerics are adequate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `h(x) == 0`
    Eq,
    /// `g(x) >= 0`
    Ineq,
}

pub struct NlpConstraint {
    pub kind: ConstraintKind,
    pub f: Box<dyn Fn(&[f64]) -> f64>,
}

impl NlpConstraint {
    pub fn eq(f: impl Fn(&[f64]) -> f64 + 'static) -> Self {
        Self {
            kind: ConstraintKind::Eq,
            f: Box::new(f),
        }
    }

    pub fn ineq(f: impl Fn(&[f64]) -> f64 + 'static) -> Self {
        Self {
            kind: ConstraintKind::Ineq,
            f: Box::new(f),
        }
    }

    fn violation(&self, x: &[f64]) -> f64 {
        let v = (self.f)(x);
        match self.kind {
            ConstraintKind::Eq => v.abs(),
            ConstraintKind::Ineq => (-v).max(0.0),
        }
    }
}

pub struct NlpProblem {
    pub objective: Box<dyn Fn(&[f64]) -> f64>,
    pub constraints: Vec<NlpConstraint>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl NlpProblem {
    pub fn max_violation(&self, x: &[f64]) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.violation(x))
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NlpStatus {
    Converged,
    Failed,
}

#[derive(Debug, Clone)]
pub struct NlpSolution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub max_violation: f64,
    pub status: NlpStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct NlpSolver {
    pub max_outer_iterations: usize,
    pub max_inner_iterations: usize,
    /// Relative step-size convergence tolerance for the inner loop.
    pub step_tolerance: f64,
    /// Absolute constraint-violation tolerance for a converged solution.
    pub feasibility_tolerance: f64,
    pub initial_penalty: f64,
    pub penalty_growth: f64,
}

impl Default for NlpSolver {
    fn default() -> Self {
        Self {
            max_outer_iterations: 8,
            max_inner_iterations: 500,
            step_tolerance: 1e-8,
            feasibility_tolerance: 1e-2,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
        }
    }
}

impl NlpSolver {
    pub fn solve(&self, problem: &NlpProblem, initial_guess: &[f64]) -> NlpSolution {
        let n = initial_guess.len();
        debug_assert_eq!(problem.lower.len(), n);
        debug_assert_eq!(problem.upper.len(), n);

        let project = |x: &mut [f64]| {
            for i in 0..n {
                x[i] = x[i].clamp(problem.lower[i], problem.upper[i]);
            }
        };

        let mut x = initial_guess.to_vec();
        project(&mut x);

        let mut mu = self.initial_penalty;
        let mut iterations = 0usize;

        for _outer in 0..self.max_outer_iterations {
            let penalized = |x: &[f64]| -> f64 {
                let mut p = (problem.objective)(x);
                for c in &problem.constraints {
                    let v = c.violation(x);
                    p += mu * v * v;
                }
                p
            };

            let mut current = penalized(&x);
            if !current.is_finite() {
                return NlpSolution {
                    x,
                    objective: f64::NAN,
                    iterations,
                    max_violation: f64::INFINITY,
                    status: NlpStatus::Failed,
                };
            }

            for _inner in 0..self.max_inner_iterations {
                iterations += 1;

                // Central-difference gradient of the penalized objective.
                let mut grad = vec![0.0; n];
                for i in 0..n {
                    let h = 1e-6 * x[i].abs().max(1.0);
                    let mut xp = x.clone();
                    let mut xm = x.clone();
                    xp[i] = (x[i] + h).min(problem.upper[i]);
                    xm[i] = (x[i] - h).max(problem.lower[i]);
                    let span = xp[i] - xm[i];
                    grad[i] = if span > 0.0 {
                        (penalized(&xp) - penalized(&xm)) / span
                    } else {
                        0.0
                    };
                }

                let grad_norm = grad.iter().fold(0.0f64, |m, g| m.max(g.abs()));
                if !grad_norm.is_finite() {
                    return NlpSolution {
                        x,
                        objective: f64::NAN,
                        iterations,
                        max_violation: f64::INFINITY,
                        status: NlpStatus::Failed,
                    };
                }
                if grad_norm < 1e-12 {
                    break;
                }

                // Backtracking line search along the normalized descent
                // direction, projected onto the box bounds.
                let x_scale = x
                    .iter()
                    .zip(&problem.upper)
                    .fold(1.0f64, |m, (xi, ub)| m.max(xi.abs()).max(ub.abs().min(1e9)));
                let mut step = x_scale;
                let mut improved = false;
                for _ in 0..60 {
                    let mut candidate: Vec<f64> = x
                        .iter()
                        .zip(&grad)
                        .map(|(xi, gi)| xi - step * gi / grad_norm)
                        .collect();
                    project(&mut candidate);
                    let value = penalized(&candidate);
                    if value.is_finite() && value < current - 1e-12 {
                        let max_move = candidate
                            .iter()
                            .zip(&x)
                            .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()));
                        x = candidate;
                        current = value;
                        improved = true;
                        if max_move < self.step_tolerance * x_scale {
                            improved = false; // converged for this subproblem
                        }
                        break;
                    }
                    step *= 0.5;
                }
                if !improved {
                    break;
                }
            }

            if problem.max_violation(&x) <= self.feasibility_tolerance {
                break;
            }
            mu *= self.penalty_growth;
        }

        let max_violation = problem.max_violation(&x);
        let objective = (problem.objective)(&x);
        let status = if objective.is_finite() && max_violation <= self.feasibility_tolerance {
            NlpStatus::Converged
        } else {
            NlpStatus::Failed
        };

        NlpSolution {
            x,
            objective,
            iterations,
            max_violation,
            status,
        }
    }
}
