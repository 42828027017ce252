//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf w}\ -\frac{\mu^\top\mathbf w}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! \quad\text{s.t.}\quad \mathbf 1^\top\mathbf w=1,\ 0\le w_i\le 1
//! $$
//!
//! Maximum-Sharpe allocation by spectral projected gradient (Birgin, Martínez,
//! Raydan) driven by argmin's `Executor`: every iterate is projected onto the
//! probability simplex, which enforces the budget and both bounds at once;
//! steps use Barzilai-Borwein lengths under a non-monotone Armijo line search.
use std::collections::VecDeque;

use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::IterState;
use argmin::core::Problem;
use argmin::core::Solver;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::core::KV;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::warn;

use super::statistics::evaluate;
use super::statistics::portfolio_return;
use super::statistics::MIN_VOLATILITY;
use super::types::PortfolioPoint;
use super::types::ReturnMoments;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Solver settings for [`optimize_sharpe`].
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
  /// Iteration budget.
  pub max_iters: u64,
  /// Stationarity tolerance on `‖P(w - ∇f) - w‖∞`.
  pub tolerance: f64,
  /// Allowed violation of the budget and bound constraints in the result.
  pub constraint_tolerance: f64,
  /// Window of past objective values for the non-monotone line search.
  pub memory: usize,
  /// Armijo sufficient-decrease constant.
  pub sufficient_decrease: f64,
  /// Lower clamp of the spectral step length.
  pub min_step: f64,
  /// Upper clamp of the spectral step length.
  pub max_step: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iters: 1000,
      tolerance: 1e-6,
      constraint_tolerance: 1e-9,
      memory: 10,
      sufficient_decrease: 1e-4,
      min_step: 1e-10,
      max_step: 1e10,
    }
  }
}

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
  /// Projected gradient below `tolerance`.
  Converged,
  /// No representable decrease left, projected gradient below `sqrt(tolerance)`.
  PrecisionLimited,
  /// Iteration budget exhausted.
  MaxItersReached,
  /// Line search stalled far from a stationary point.
  LineSearchFailed,
}

/// Result of a successful [`optimize_sharpe`] run.
#[derive(Clone, Debug)]
pub struct OptimizationReport {
  /// Optimal allocation with its return, volatility and Sharpe ratio.
  pub point: PortfolioPoint,
  /// Iterations performed.
  pub iterations: u64,
  /// Final objective value, `-sharpe_ratio`.
  pub objective: f64,
  pub termination: Termination,
}

impl OptimizationReport {
  pub fn success(&self) -> bool {
    matches!(
      self.termination,
      Termination::Converged | Termination::PrecisionLimited
    )
  }

  pub fn weights(&self) -> &WeightVector {
    self.point.weights()
  }
}

/// Negative Sharpe ratio `-μᵀw / sqrt(wᵀΣw)` as an argmin problem.
#[derive(Clone, Debug)]
pub struct SharpeObjective {
  mean: Array1<f64>,
  covariance: Array2<f64>,
}

impl SharpeObjective {
  pub fn new(moments: &ReturnMoments) -> Self {
    Self {
      mean: moments.mean().clone(),
      covariance: moments.covariance().clone(),
    }
  }

  /// `(μᵀw, σ, Σw)`, failing when σ vanishes.
  fn components(&self, w: &Array1<f64>) -> Result<(f64, f64, Array1<f64>)> {
    if w.len() != self.mean.len() {
      return Err(PortfolioError::invalid(format!(
        "{} weights for {} assets",
        w.len(),
        self.mean.len()
      )));
    }

    let sigma_w = self.covariance.dot(w);
    let vol = w.dot(&sigma_w).max(0.0).sqrt();
    if vol <= MIN_VOLATILITY {
      return Err(PortfolioError::DegenerateInput(
        "portfolio volatility vanished during optimization".into(),
      ));
    }

    Ok((portfolio_return(w, &self.mean), vol, sigma_w))
  }
}

impl CostFunction for SharpeObjective {
  type Param = Array1<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> std::result::Result<Self::Output, Error> {
    let (ret, vol, _) = self.components(w)?;
    Ok(-ret / vol)
  }
}

impl Gradient for SharpeObjective {
  type Param = Array1<f64>;
  type Gradient = Array1<f64>;

  fn gradient(&self, w: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
    let (ret, vol, sigma_w) = self.components(w)?;
    let vol3 = vol * vol * vol;
    Ok(-(&self.mean / vol - &sigma_w * (ret / vol3)))
  }
}

fn from_argmin(err: Error) -> PortfolioError {
  match err.downcast::<PortfolioError>() {
    Ok(e) => e,
    Err(other) => PortfolioError::invalid(other.to_string()),
  }
}

/// Euclidean projection onto `{w : Σw = 1, w ≥ 0}` (sort-based, Held et al.).
pub(crate) fn project_simplex(v: &Array1<f64>) -> Array1<f64> {
  let mut u = v.to_vec();
  u.sort_by(|a, b| b.total_cmp(a));

  let mut cumsum = 0.0;
  let mut theta = 0.0;
  for (j, uj) in u.iter().enumerate() {
    cumsum += uj;
    let t = (cumsum - 1.0) / (j + 1) as f64;
    if uj - t > 0.0 {
      theta = t;
    }
  }

  v.mapv(|x| (x - theta).max(0.0))
}

fn projected_gradient_norm(x: &Array1<f64>, g: &Array1<f64>) -> f64 {
  (project_simplex(&(x - g)) - x).fold(0.0_f64, |m, v| m.max(v.abs()))
}

/// Iteration state of [`SpectralProjectedGradient`] on the Sharpe problem.
pub type SharpeState = IterState<Array1<f64>, Array1<f64>, (), (), (), f64>;

const PRECISION_LIMITED: &str = "no representable decrease near a stationary point";
const LINE_SEARCH_FAILED: &str = "line search stalled away from a stationary point";

/// Spectral projected gradient on the probability simplex.
///
/// Stops with `SolverConverged` once `‖P(w - ∇f) - w‖∞ ≤ tolerance`, and with
/// `SolverExit` when backtracking can no longer find a decrease.
#[derive(Clone, Debug)]
pub struct SpectralProjectedGradient {
  tolerance: f64,
  memory: usize,
  sufficient_decrease: f64,
  min_step: f64,
  max_step: f64,
  alpha: f64,
  history: VecDeque<f64>,
}

impl SpectralProjectedGradient {
  pub fn new(config: &OptimizerConfig) -> Self {
    Self {
      tolerance: config.tolerance,
      memory: config.memory,
      sufficient_decrease: config.sufficient_decrease,
      min_step: config.min_step,
      max_step: config.max_step,
      alpha: 1.0,
      history: VecDeque::with_capacity(config.memory),
    }
  }
}

impl Solver<SharpeObjective, SharpeState> for SpectralProjectedGradient {
  const NAME: &'static str = "Spectral projected gradient";

  fn init(
    &mut self,
    problem: &mut Problem<SharpeObjective>,
    mut state: SharpeState,
  ) -> std::result::Result<(SharpeState, Option<KV>), Error> {
    let start = state
      .take_param()
      .ok_or_else(|| PortfolioError::invalid("spectral projected gradient needs a starting point"))?;
    let x = project_simplex(&start);
    let f = problem.cost(&x)?;
    let g = problem.gradient(&x)?;

    let pg = projected_gradient_norm(&x, &g);
    self.alpha = if pg > 0.0 {
      (1.0 / pg).clamp(self.min_step, self.max_step)
    } else {
      1.0
    };
    self.history.clear();
    self.history.push_back(f);

    Ok((state.param(x).cost(f).gradient(g), None))
  }

  fn next_iter(
    &mut self,
    problem: &mut Problem<SharpeObjective>,
    state: SharpeState,
  ) -> std::result::Result<(SharpeState, Option<KV>), Error> {
    let (Some(x), Some(g)) = (state.param.as_ref(), state.grad.as_ref()) else {
      return Err(PortfolioError::invalid("solver state has no iterate").into());
    };
    let f = state.cost;

    let pg_norm = projected_gradient_norm(x, g);
    let d = project_simplex(&(x - &(self.alpha * g))) - x;
    let gtd = g.dot(&d);
    let f_ref = self.history.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut lambda = 1.0;
    let accepted = loop {
      let candidate = x + &(lambda * &d);
      let fc = problem.cost(&candidate)?;
      if fc <= f_ref + self.sufficient_decrease * lambda * gtd {
        break Some((candidate, fc));
      }

      // Safeguarded quadratic backtracking.
      let denom = fc - f - lambda * gtd;
      let trial = if denom > 0.0 {
        -0.5 * lambda * lambda * gtd / denom
      } else {
        -1.0
      };
      lambda = if trial >= 0.1 * lambda && trial <= 0.5 * lambda {
        trial
      } else {
        0.5 * lambda
      };
      if lambda < 1e-12 {
        break None;
      }
    };

    let Some((x_new, f_new)) = accepted else {
      let reason = if pg_norm <= self.tolerance.sqrt() {
        PRECISION_LIMITED
      } else {
        LINE_SEARCH_FAILED
      };
      return Ok((
        state.terminate_with(TerminationReason::SolverExit(reason.to_string())),
        None,
      ));
    };

    let g_new = problem.gradient(&x_new)?;
    let s = &x_new - x;
    let y = &g_new - g;
    let sty = s.dot(&y);
    self.alpha = if sty <= 0.0 {
      self.max_step
    } else {
      (s.dot(&s) / sty).clamp(self.min_step, self.max_step)
    };

    if self.history.len() == self.memory {
      self.history.pop_front();
    }
    self.history.push_back(f_new);

    Ok((state.param(x_new).cost(f_new).gradient(g_new), None))
  }

  fn terminate(&mut self, state: &SharpeState) -> TerminationStatus {
    match (state.param.as_ref(), state.grad.as_ref()) {
      (Some(x), Some(g)) if projected_gradient_norm(x, g) <= self.tolerance => {
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
      }
      _ => TerminationStatus::NotTerminated,
    }
  }
}

fn termination_of(status: &TerminationStatus) -> Termination {
  match status {
    TerminationStatus::Terminated(TerminationReason::SolverConverged) => Termination::Converged,
    TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
      Termination::MaxItersReached
    }
    TerminationStatus::Terminated(TerminationReason::SolverExit(reason))
      if reason == PRECISION_LIMITED =>
    {
      Termination::PrecisionLimited
    }
    _ => Termination::LineSearchFailed,
  }
}

/// Maximize the Sharpe ratio from `initial` subject to `Σw = 1`, `0 ≤ w ≤ 1`.
///
/// Fails with [`PortfolioError::Convergence`] carrying the best iterate when
/// the iteration budget runs out, the line search stalls away from a
/// stationary point, or the result violates the constraints by more than
/// `config.constraint_tolerance`. Deterministic for identical inputs.
pub fn optimize_sharpe(
  initial: &WeightVector,
  moments: &ReturnMoments,
  config: &OptimizerConfig,
) -> Result<OptimizationReport> {
  if initial.len() != moments.n_assets() {
    return Err(PortfolioError::invalid(format!(
      "initial weights have {} entries for {} assets",
      initial.len(),
      moments.n_assets()
    )));
  }
  if !(config.tolerance > 0.0) || config.memory == 0 {
    return Err(PortfolioError::invalid(
      "optimizer tolerance must be positive and memory non-zero",
    ));
  }

  let solver = SpectralProjectedGradient::new(config);
  let result = Executor::new(SharpeObjective::new(moments), solver)
    .configure(|state| {
      state
        .param(initial.as_array().clone())
        .max_iters(config.max_iters)
    })
    .run()
    .map_err(from_argmin)?;

  let state = result.state;
  let iterations = state.iter;
  let termination = termination_of(&state.termination_status);
  debug!(?termination, iterations, objective = state.cost, "sharpe optimizer finished");

  if !matches!(
    termination,
    Termination::Converged | Termination::PrecisionLimited
  ) {
    warn!(?termination, iterations, "sharpe optimizer failed to converge");
    return Err(PortfolioError::Convergence {
      weights: state.best_param.map(|w| w.to_vec()).unwrap_or_default(),
      iterations,
      objective: state.best_cost,
    });
  }

  let x = state
    .param
    .ok_or_else(|| PortfolioError::invalid("solver finished without an iterate"))?;
  let weights = WeightVector::with_tolerance(x.clone(), config.constraint_tolerance).map_err(
    |_| PortfolioError::Convergence {
      weights: x.to_vec(),
      iterations,
      objective: state.cost,
    },
  )?;
  let point = evaluate(&weights, moments)?;

  Ok(OptimizationReport {
    objective: -point.sharpe_ratio(),
    point,
    iterations,
    termination,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::quant::portfolio::sampler::sample_portfolios_seeded;

  fn three_assets() -> ReturnMoments {
    ReturnMoments::new(
      vec!["A".into(), "B".into(), "C".into()],
      array![0.08, 0.1, 0.12],
      array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.02], [0.0, 0.02, 0.16]],
      252,
    )
    .unwrap()
  }

  #[test]
  fn projection_lands_on_simplex() {
    for v in [
      array![0.2, 0.3, 0.5],
      array![3.0, -1.0, 0.5],
      array![-2.0, -3.0, -4.0],
      array![0.0, 0.0, 0.0],
    ] {
      let p = project_simplex(&v);
      assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-12);
      assert!(p.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }
    let p = project_simplex(&array![3.0, -1.0, 0.5]);
    assert_eq!(p, array![1.0, 0.0, 0.0]);
  }

  #[test]
  fn analytic_gradient_matches_finite_differences() {
    let objective = SharpeObjective::new(&three_assets());
    let x = array![0.2, 0.5, 0.3];
    let g = objective.gradient(&x).unwrap();
    let eps = 1e-7;

    for i in 0..x.len() {
      let mut xp = x.clone();
      let mut xm = x.clone();
      xp[i] += eps;
      xm[i] -= eps;
      let fd = (objective.cost(&xp).unwrap() - objective.cost(&xm).unwrap()) / (2.0 * eps);
      assert_abs_diff_eq!(g[i], fd, epsilon = 1e-6);
    }
  }

  #[test]
  fn optimum_satisfies_constraints_and_dominates_samples() {
    let m = three_assets();
    let samples = sample_portfolios_seeded(&m, 20_000, 11).unwrap();
    let report = optimize_sharpe(samples[0].weights(), &m, &OptimizerConfig::default()).unwrap();

    assert!(report.success());
    let w = report.weights();
    assert_abs_diff_eq!(w.as_array().sum(), 1.0, epsilon = 1e-9);
    assert!(w.iter().all(|&x| (-1e-9..=1.0 + 1e-9).contains(&x)));

    let best_sampled = samples
      .iter()
      .map(|p| p.sharpe_ratio())
      .fold(f64::NEG_INFINITY, f64::max);
    assert!(report.point.sharpe_ratio() >= best_sampled - 1e-9);
    assert_abs_diff_eq!(report.objective, -report.point.sharpe_ratio(), epsilon = 1e-15);
  }

  #[test]
  fn dominated_asset_gets_zero_weight() {
    // C has the lowest return and the highest variance, uncorrelated.
    let m = ReturnMoments::new(
      vec!["A".into(), "B".into(), "C".into()],
      array![0.10, 0.10, -0.05],
      array![[0.04, 0.0, 0.0], [0.0, 0.04, 0.0], [0.0, 0.0, 0.25]],
      252,
    )
    .unwrap();
    let start = WeightVector::new(array![0.1, 0.1, 0.8]).unwrap();
    let report = optimize_sharpe(&start, &m, &OptimizerConfig::default()).unwrap();
    let w = report.weights().as_array();

    assert_abs_diff_eq!(w[2], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(w[0], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(w[1], 0.5, epsilon = 1e-6);
  }

  #[test]
  fn deterministic_for_identical_inputs() {
    let m = three_assets();
    let start = WeightVector::uniform(3).unwrap();
    let a = optimize_sharpe(&start, &m, &OptimizerConfig::default()).unwrap();
    let b = optimize_sharpe(&start, &m, &OptimizerConfig::default()).unwrap();
    assert_eq!(a.point, b.point);
    assert_eq!(a.iterations, b.iterations);
  }

  #[test]
  fn exhausted_budget_reports_convergence_error() {
    let m = three_assets();
    let start = WeightVector::new(array![1.0, 0.0, 0.0]).unwrap();
    let config = OptimizerConfig {
      max_iters: 0,
      ..OptimizerConfig::default()
    };

    match optimize_sharpe(&start, &m, &config) {
      Err(PortfolioError::Convergence {
        weights,
        iterations,
        objective,
      }) => {
        assert_eq!(iterations, 0);
        assert_eq!(weights, vec![1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(objective, -0.08 / 0.2, epsilon = 1e-12);
      }
      other => panic!("expected convergence error, got {other:?}"),
    }
  }

  #[test]
  fn executor_stops_on_projected_gradient() {
    let m = three_assets();
    let config = OptimizerConfig::default();
    let res = Executor::new(SharpeObjective::new(&m), SpectralProjectedGradient::new(&config))
      .configure(|state| state.param(array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]).max_iters(200))
      .run()
      .unwrap();

    let state = res.state();
    let x = state.get_param().unwrap();
    let g = state.grad.as_ref().unwrap();
    assert!(state.get_iter() > 0 && state.get_iter() < 200);
    assert!(matches!(
      termination_of(&state.termination_status),
      Termination::Converged | Termination::PrecisionLimited
    ));
    assert!(projected_gradient_norm(x, g) <= config.tolerance.sqrt());
    assert_abs_diff_eq!(x.sum(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn termination_reasons_map_to_outcomes() {
    let exit = |reason: &str| {
      TerminationStatus::Terminated(TerminationReason::SolverExit(reason.to_string()))
    };
    assert_eq!(
      termination_of(&TerminationStatus::Terminated(TerminationReason::SolverConverged)),
      Termination::Converged
    );
    assert_eq!(
      termination_of(&TerminationStatus::Terminated(TerminationReason::MaxItersReached)),
      Termination::MaxItersReached
    );
    assert_eq!(termination_of(&exit(PRECISION_LIMITED)), Termination::PrecisionLimited);
    assert_eq!(termination_of(&exit(LINE_SEARCH_FAILED)), Termination::LineSearchFailed);
  }

  #[test]
  fn mismatched_start_is_invalid() {
    let start = WeightVector::uniform(2).unwrap();
    assert!(matches!(
      optimize_sharpe(&start, &three_assets(), &OptimizerConfig::default()),
      Err(PortfolioError::InvalidInput(_))
    ));
  }

  #[test]
  fn zero_variance_start_is_degenerate() {
    let m = ReturnMoments::new(vec!["FLAT".into()], array![0.0], array![[0.0]], 252).unwrap();
    let start = WeightVector::uniform(1).unwrap();
    assert!(matches!(
      optimize_sharpe(&start, &m, &OptimizerConfig::default()),
      Err(PortfolioError::DegenerateInput(_))
    ));
  }
}
