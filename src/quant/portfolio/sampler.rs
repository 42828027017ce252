//! # Monte-Carlo Portfolio Sampler
//!
//! $$
//! u_i\sim\mathcal U[0,1),\qquad w_i=\frac{u_i}{\sum_j u_j}
//! $$
//!
//! Random exploration of the long-only feasible set. The random source is
//! always supplied by the caller so runs are reproducible under a fixed seed.
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;

use super::statistics::evaluate;
use super::types::PortfolioPoint;
use super::types::ReturnMoments;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Portfolios drawn per independent sub-stream in [`sample_portfolios_par`].
pub const SAMPLE_CHUNK: usize = 1024;

/// Draw one normalized weight vector from `n` independent uniforms.
pub fn random_weights<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<WeightVector> {
  if n == 0 {
    return Err(PortfolioError::invalid("cannot draw weights for zero assets"));
  }

  loop {
    let raw = Array1::from_shape_fn(n, |_| rng.random::<f64>());
    // All-zero draws cannot be normalized.
    if raw.sum() > 0.0 {
      return WeightVector::from_unnormalized(raw);
    }
  }
}

/// Draw `count` random portfolios and score each against `moments`.
///
/// Output is in generation order.
pub fn sample_portfolios<R: Rng + ?Sized>(
  moments: &ReturnMoments,
  count: usize,
  rng: &mut R,
) -> Result<Vec<PortfolioPoint>> {
  if count == 0 {
    return Err(PortfolioError::invalid("sample count must be at least 1"));
  }

  let n = moments.n_assets();
  let mut points = Vec::with_capacity(count);
  for _ in 0..count {
    let w = random_weights(n, rng)?;
    points.push(evaluate(&w, moments)?);
  }

  Ok(points)
}

/// Seeded convenience wrapper around [`sample_portfolios`].
pub fn sample_portfolios_seeded(
  moments: &ReturnMoments,
  count: usize,
  seed: u64,
) -> Result<Vec<PortfolioPoint>> {
  let mut rng = StdRng::seed_from_u64(seed);
  sample_portfolios(moments, count, &mut rng)
}

/// RNG of sub-stream `chunk`; chunk 0 yields the first parallel sample.
pub(crate) fn chunk_rng(seed: u64, chunk: usize) -> StdRng {
  StdRng::seed_from_u64(seed ^ (chunk as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Parallel sampling over rayon.
///
/// The count is split into chunks of [`SAMPLE_CHUNK`]; chunk `k` owns an RNG
/// seeded from `(seed, k)` and chunks are concatenated in index order, so the
/// output depends only on `(count, seed)` and not on the thread pool size.
pub fn sample_portfolios_par(
  moments: &ReturnMoments,
  count: usize,
  seed: u64,
) -> Result<Vec<PortfolioPoint>> {
  if count == 0 {
    return Err(PortfolioError::invalid("sample count must be at least 1"));
  }

  let chunks = count.div_ceil(SAMPLE_CHUNK);
  let parts = (0..chunks)
    .into_par_iter()
    .map(|k| {
      let len = SAMPLE_CHUNK.min(count - k * SAMPLE_CHUNK);
      let mut rng = chunk_rng(seed, k);
      sample_portfolios(moments, len, &mut rng)
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(parts.into_iter().flatten().collect())
}
