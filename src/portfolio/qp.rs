//! # Quadratic Program
//!
//! $$
//! \min_{x \in \mathcal D}\ x^\top Q x \quad\text{s.t.}\quad a^\top x = b,
//! \qquad \mathcal D \in \{\Delta,\ \mathbb R^n_{\ge 0}\}
//! $$
//!
//! Augmented Lagrangian on the linear equality, accelerated projected
//! gradient (FISTA) for the inner problem.

use ndarray::Array1;
use ndarray::Array2;
use tracing::trace;

/// Feasible set the iterates are projected on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Domain {
  /// `x >= 0`, `sum(x) = 1`.
  Simplex,
  /// `x >= 0`.
  Orthant,
}

#[derive(Clone, Debug)]
pub(crate) struct QpProblem<'a> {
  pub q: &'a Array2<f64>,
  pub domain: Domain,
  pub equality: Option<(Array1<f64>, f64)>,
  /// Upper bound on the largest eigenvalue of `q`.
  pub max_eigenvalue: f64,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct QpSettings {
  pub max_iters: usize,
  pub tolerance: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct QpSolution {
  pub x: Array1<f64>,
  /// `|a'x - b|`, zero without an equality.
  pub residual: f64,
  pub iterations: usize,
  pub converged: bool,
}

/// Euclidean projection onto the probability simplex.
pub(crate) fn project_simplex(v: &Array1<f64>) -> Array1<f64> {
  let mut u = v.to_vec();
  u.sort_by(|a, b| b.total_cmp(a));

  let mut cumsum = 0.0;
  let mut theta = 0.0;
  for (j, &uj) in u.iter().enumerate() {
    cumsum += uj;
    let t = (cumsum - 1.0) / (j + 1) as f64;
    if uj - t > 0.0 {
      theta = t;
    }
  }
  v.mapv(|x| (x - theta).max(0.0))
}

fn project(domain: Domain, v: &Array1<f64>) -> Array1<f64> {
  match domain {
    Domain::Simplex => project_simplex(v),
    Domain::Orthant => v.mapv(|x| x.max(0.0)),
  }
}

/// Largest absolute coordinate difference.
fn max_step(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
  a.iter()
    .zip(b.iter())
    .fold(0.0_f64, |m, (x, y)| m.max((x - y).abs()))
}

impl QpProblem<'_> {
  fn residual(&self, x: &Array1<f64>) -> f64 {
    self
      .equality
      .as_ref()
      .map_or(0.0, |(a, b)| a.dot(x) - b)
  }

  /// FISTA on `x'Qx + lambda r(x) + rho/2 r(x)^2`, warm started at `x0`.
  fn minimize_inner(
    &self,
    x0: Array1<f64>,
    lambda: f64,
    rho: f64,
    settings: &QpSettings,
  ) -> (Array1<f64>, usize, bool) {
    let a_norm_sq = self.equality.as_ref().map_or(0.0, |(a, _)| a.dot(a));
    let lipschitz = (2.0 * self.max_eigenvalue + rho * a_norm_sq).max(1e-12);
    let step = 1.0 / lipschitz;

    let mut x = project(self.domain, &x0);
    let mut y = x.clone();
    let mut t = 1.0_f64;

    for k in 0..settings.max_iters {
      let mut grad = self.q.dot(&y) * 2.0;
      if let Some((a, _)) = &self.equality {
        let r = self.residual(&y);
        grad.scaled_add(lambda + rho * r, a);
      }

      let x_next = project(self.domain, &(&y - &(grad * step)));
      let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
      let momentum = (t - 1.0) / t_next;
      y = &x_next + &((&x_next - &x) * momentum);

      let moved = max_step(&x_next, &x);
      x = x_next;
      t = t_next;
      if moved < settings.tolerance {
        return (x, k + 1, true);
      }
    }
    (x, settings.max_iters, false)
  }
}

/// Solve the problem from a feasible-ish starting point.
pub(crate) fn solve(problem: &QpProblem<'_>, x0: Array1<f64>, settings: &QpSettings) -> QpSolution {
  const MAX_OUTER: usize = 60;

  if problem.equality.is_none() {
    let (x, iterations, converged) = problem.minimize_inner(x0, 0.0, 0.0, settings);
    return QpSolution {
      x,
      residual: 0.0,
      iterations,
      converged,
    };
  }

  let mut x = x0;
  let mut lambda = 0.0;
  let mut rho = 10.0 * problem.max_eigenvalue.max(1.0);
  let mut last_residual = f64::INFINITY;
  let mut iterations = 0;

  for outer in 0..MAX_OUTER {
    let (next, used, inner_converged) = problem.minimize_inner(x, lambda, rho, settings);
    x = next;
    iterations += used;

    let r = problem.residual(&x);
    trace!(outer, residual = r, rho, "augmented lagrangian step");
    if r.abs() < settings.tolerance && inner_converged {
      return QpSolution {
        x,
        residual: r.abs(),
        iterations,
        converged: true,
      };
    }

    lambda += rho * r;
    if r.abs() > 0.25 * last_residual {
      rho = (rho * 10.0).min(1e12);
    }
    last_residual = r.abs();
  }

  let residual = problem.residual(&x).abs();
  QpSolution {
    x,
    residual,
    iterations,
    converged: false,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn settings() -> QpSettings {
    QpSettings {
      max_iters: 20_000,
      tolerance: 1e-12,
    }
  }

  #[test]
  fn simplex_projection_is_feasible_and_idempotent() {
    let p = project_simplex(&array![0.9, 0.6, -0.2]);
    assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-12);
    assert!(p.iter().all(|x| *x >= 0.0));
    assert_abs_diff_eq!(p[0], 0.65, epsilon = 1e-12);
    assert_abs_diff_eq!(p[1], 0.35, epsilon = 1e-12);
    let again = project_simplex(&p);
    for (a, b) in again.iter().zip(p.iter()) {
      assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
  }

  #[test]
  fn min_variance_on_simplex() {
    let q = array![[0.04, 0.0], [0.0, 0.09]];
    let problem = QpProblem {
      q: &q,
      domain: Domain::Simplex,
      equality: None,
      max_eigenvalue: 0.09,
    };
    let sol = solve(&problem, array![0.5, 0.5], &settings());
    assert!(sol.converged);
    assert_abs_diff_eq!(sol.x[0], 0.09 / 0.13, epsilon = 1e-6);
  }

  #[test]
  fn equality_constraint_is_met() {
    let q = array![[0.04, 0.0, 0.0], [0.0, 0.09, 0.0], [0.0, 0.0, 0.16]];
    let mu = array![0.05, 0.10, 0.15];
    let problem = QpProblem {
      q: &q,
      domain: Domain::Simplex,
      equality: Some((mu.clone(), 0.12)),
      max_eigenvalue: 0.16,
    };
    let sol = solve(
      &problem,
      array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
      &QpSettings {
        max_iters: 20_000,
        tolerance: 1e-10,
      },
    );
    assert!(sol.residual < 1e-8);
    assert_abs_diff_eq!(mu.dot(&sol.x), 0.12, epsilon = 1e-8);
    assert_abs_diff_eq!(sol.x.sum(), 1.0, epsilon = 1e-12);
  }
}
