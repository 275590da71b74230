use rand::Rng;
use rand::rngs::StdRng;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::binarize::FallbackReason;
use crate::binarize::stats;

const LLOYD_ITERATIONS: usize = 5;
const MIN_COMPONENT_MASS: f64 = 1e-8;
const BISECTION_ITERATIONS: usize = 200;
const LN_2PI: f64 = 1.837_877_066_409_345_5;
const ASYMPTOTIC_Z: f64 = 30.0;

#[derive(Debug, Clone, Copy)]
pub struct MixtureOptions {
    pub n_components: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub reg_variance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    pub weights: Vec<f64>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Mean per-sample log-likelihood at the last E-step.
    pub log_likelihood: f64,
}

impl GaussianMixture {
    pub fn n_components(&self) -> usize {
        self.means.len()
    }

    /// Component with the highest mean.
    pub fn active_component(&self) -> usize {
        let mut best = 0;
        for (k, m) in self.means.iter().enumerate() {
            if *m > self.means[best] {
                best = k;
            }
        }
        best
    }
}

fn ln_normal_pdf(x: f64, mean: f64, variance: f64) -> f64 {
    let d = x - mean;
    -0.5 * (LN_2PI + variance.ln() + d * d / variance)
}

fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}

/// k-means++ seeding followed by a few Lloyd steps.
fn init_centers(values: &[f64], k: usize, rng: &mut StdRng) -> Option<Vec<f64>> {
    let n = values.len();
    let mut centers = vec![values[rng.gen_range(0..n)]];
    let mut d2 = vec![0.0f64; n];
    while centers.len() < k {
        for (i, v) in values.iter().enumerate() {
            d2[i] = centers
                .iter()
                .map(|c| (v - c) * (v - c))
                .fold(f64::INFINITY, f64::min);
        }
        let total: f64 = d2.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        let target = rng.gen_range(0.0..total);
        let mut acc = 0.0;
        let mut chosen = n - 1;
        for (i, d) in d2.iter().enumerate() {
            acc += d;
            if acc > target {
                chosen = i;
                break;
            }
        }
        centers.push(values[chosen]);
    }

    for _ in 0..LLOYD_ITERATIONS {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for v in values {
            let j = nearest(&centers, *v);
            sums[j] += v;
            counts[j] += 1;
        }
        for j in 0..k {
            if counts[j] > 0 {
                centers[j] = sums[j] / counts[j] as f64;
            }
        }
    }
    Some(centers)
}

fn nearest(centers: &[f64], v: f64) -> usize {
    let mut best = 0;
    for (j, c) in centers.iter().enumerate() {
        if (v - c).abs() < (v - centers[best]).abs() {
            best = j;
        }
    }
    best
}

/// Expectation-maximization fit. Returns the mixture even when the iteration
/// budget ran out (`converged == false`); fails only when a component loses
/// all its mass or the seeding cannot place distinct centers.
pub fn fit_gaussian_mixture(
    values: &[f64],
    options: &MixtureOptions,
    rng: &mut StdRng,
) -> Result<GaussianMixture, FallbackReason> {
    let n = values.len();
    let k = options.n_components;
    let centers = init_centers(values, k, rng).ok_or(FallbackReason::CollapsedComponent)?;

    let global_var = stats::variance(values) + options.reg_variance;
    let mut means = centers.clone();
    let mut weights = vec![0.0; k];
    let mut variances = vec![0.0; k];
    let mut sq = vec![0.0; k];
    for v in values {
        let j = nearest(&centers, *v);
        weights[j] += 1.0;
        sq[j] += (v - centers[j]) * (v - centers[j]);
    }
    for j in 0..k {
        if weights[j] > 0.0 {
            variances[j] = sq[j] / weights[j] + options.reg_variance;
        } else {
            variances[j] = global_var;
            weights[j] = 1.0;
        }
    }
    let total: f64 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= total);

    let mut resp = vec![0.0f64; n * k];
    let mut terms = vec![0.0f64; k];
    let mut prev_ll = f64::NEG_INFINITY;
    let mut log_likelihood = f64::NEG_INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..options.max_iter {
        iterations = iter + 1;

        // E-step
        let mut ll_sum = 0.0;
        for (i, x) in values.iter().enumerate() {
            for j in 0..k {
                terms[j] = weights[j].ln() + ln_normal_pdf(*x, means[j], variances[j]);
            }
            let lse = log_sum_exp(&terms);
            ll_sum += lse;
            for j in 0..k {
                resp[i * k + j] = (terms[j] - lse).exp();
            }
        }
        log_likelihood = ll_sum / n as f64;
        if !log_likelihood.is_finite() {
            return Err(FallbackReason::CollapsedComponent);
        }
        if iter > 0 && (log_likelihood - prev_ll).abs() < options.tolerance {
            converged = true;
            break;
        }
        prev_ll = log_likelihood;

        // M-step
        for j in 0..k {
            let mut mass = 0.0;
            let mut sum = 0.0;
            for (i, x) in values.iter().enumerate() {
                let r = resp[i * k + j];
                mass += r;
                sum += r * x;
            }
            if mass < MIN_COMPONENT_MASS {
                return Err(FallbackReason::CollapsedComponent);
            }
            let mu = sum / mass;
            let var = values
                .iter()
                .enumerate()
                .map(|(i, x)| resp[i * k + j] * (x - mu) * (x - mu))
                .sum::<f64>()
                / mass;
            means[j] = mu;
            variances[j] = var + options.reg_variance;
            weights[j] = mass / n as f64;
        }
    }

    Ok(GaussianMixture {
        weights,
        means,
        variances,
        iterations,
        converged,
        log_likelihood,
    })
}

/// `ln P(X > x)`. Past `ASYMPTOTIC_Z` standard deviations the tail
/// underflows, so the Mills-ratio expansion takes over.
fn ln_upper_tail(dist: &Normal, mean: f64, sd: f64, x: f64) -> f64 {
    let z = (x - mean) / sd;
    if z < ASYMPTOTIC_Z {
        return dist.sf(x).ln();
    }
    let z2 = z * z;
    -0.5 * z2 - z.ln() - 0.5 * LN_2PI + (1.0 - 1.0 / z2 + 3.0 / (z2 * z2)).ln()
}

/// `ln P(X <= x)`, mirrored from the upper tail.
fn ln_lower_tail(dist: &Normal, mean: f64, sd: f64, x: f64) -> f64 {
    let z = (mean - x) / sd;
    if z < ASYMPTOTIC_Z {
        return dist.cdf(x).ln();
    }
    ln_upper_tail(dist, mean, sd, 2.0 * mean - x)
}

/// Point where the inactive components' upper-tail mass equals the active
/// component's lower-tail mass. `None` if no sign change brackets a root.
pub fn equal_tail_crossing(mixture: &GaussianMixture) -> Option<f64> {
    let active = mixture.active_component();
    let sds: Vec<f64> = mixture.variances.iter().map(|v| v.sqrt()).collect();
    let mut dists = Vec::with_capacity(mixture.n_components());
    for (m, sd) in mixture.means.iter().zip(&sds) {
        dists.push(Normal::new(*m, *sd).ok()?);
    }

    // ln(inactive upper tail) - ln(active lower tail); decreasing in x.
    let balance = |x: f64| -> f64 {
        let inactive: Vec<f64> = (0..dists.len())
            .filter(|&j| j != active)
            .map(|j| {
                mixture.weights[j].ln() + ln_upper_tail(&dists[j], mixture.means[j], sds[j], x)
            })
            .collect();
        let active_term = mixture.weights[active].ln()
            + ln_lower_tail(&dists[active], mixture.means[active], sds[active], x);
        log_sum_exp(&inactive) - active_term
    };

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (m, sd) in mixture.means.iter().zip(&sds) {
        lo = lo.min(m - 10.0 * sd);
        hi = hi.max(m + 10.0 * sd);
    }
    if !(balance(lo) > 0.0 && balance(hi) < 0.0) {
        return None;
    }
    for _ in 0..BISECTION_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if balance(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            break;
        }
    }
    Some(0.5 * (lo + hi))
}

#[cfg(test)]
#[path = "../../tests/src_inline/binarize/mixture.rs"]
mod tests;
