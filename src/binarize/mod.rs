use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod mixture;
pub mod stats;

use crate::aucell::{AucMatrix, build_pool};
use crate::error::{CtxError, Result};
use mixture::{MixtureOptions, equal_tail_crossing, fit_gaussian_mixture};

/// Fewer samples per mixture component than this skips the fit.
pub const MIN_SAMPLES_PER_COMPONENT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinarizeParams {
    /// Every signature seeds its own generator with this value, so identical
    /// AUC columns always get identical mixture starts.
    pub seed: u64,
    #[serde(default = "default_workers")]
    pub num_workers: usize,
    #[serde(default = "default_fallback_k")]
    pub fallback_k: f64,
    #[serde(default = "default_components")]
    pub n_components: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_variance_floor")]
    pub variance_floor: f64,
    #[serde(default = "default_reg_variance")]
    pub reg_variance: f64,
    #[serde(default)]
    pub min_activity: Option<f64>,
    #[serde(default = "default_true")]
    pub degenerate_fallback: bool,
}

fn default_workers() -> usize {
    1
}
fn default_fallback_k() -> f64 {
    2.0
}
fn default_components() -> usize {
    2
}
fn default_max_iter() -> usize {
    200
}
fn default_tolerance() -> f64 {
    1e-6
}
fn default_variance_floor() -> f64 {
    1e-12
}
fn default_reg_variance() -> f64 {
    1e-6
}
fn default_true() -> bool {
    true
}

impl BinarizeParams {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            num_workers: default_workers(),
            fallback_k: default_fallback_k(),
            n_components: default_components(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
            variance_floor: default_variance_floor(),
            reg_variance: default_reg_variance(),
            min_activity: None,
            degenerate_fallback: true,
        }
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn fallback_k(mut self, k: f64) -> Self {
        self.fallback_k = k;
        self
    }

    pub fn n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn min_activity(mut self, floor: f64) -> Self {
        self.min_activity = Some(floor);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=3).contains(&self.n_components) {
            return Err(CtxError::InvalidConfig(format!(
                "n_components must be 2 or 3, got {}",
                self.n_components
            )));
        }
        if !self.fallback_k.is_finite() || self.fallback_k < 0.0 {
            return Err(CtxError::InvalidConfig(format!(
                "fallback_k must be finite and non-negative, got {}",
                self.fallback_k
            )));
        }
        if self.max_iter == 0 {
            return Err(CtxError::InvalidConfig("max_iter must be at least 1".to_string()));
        }
        let tolerance_ok = self.tolerance.is_finite() && self.tolerance > 0.0;
        let floors_ok = [self.variance_floor, self.reg_variance]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !tolerance_ok || !floors_ok {
            return Err(CtxError::InvalidConfig(
                "tolerance must be positive; variance_floor and reg_variance non-negative"
                    .to_string(),
            ));
        }
        if self.min_activity.is_some_and(|m| !m.is_finite() || m < 0.0) {
            return Err(CtxError::InvalidConfig(
                "min_activity must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Populations with variance at or below this are treated as constant.
    pub fn degenerate_variance(&self) -> f64 {
        self.variance_floor.max(self.reg_variance)
    }

    fn mixture_options(&self) -> MixtureOptions {
        MixtureOptions {
            n_components: self.n_components,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
            reg_variance: self.reg_variance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NotConverged,
    TooFewSamples,
    CollapsedComponent,
    NoCrossing,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NotConverged => "not_converged",
            FallbackReason::TooFewSamples => "too_few_samples",
            FallbackReason::CollapsedComponent => "collapsed_component",
            FallbackReason::NoCrossing => "no_crossing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ThresholdMethod {
    MixtureCrossing { iterations: usize, components: usize },
    RobustFallback { reason: FallbackReason },
    Degenerate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureCalls {
    pub signature: String,
    pub threshold: f64,
    /// One call per row of the input matrix, `auc > threshold`.
    pub calls: Vec<bool>,
    pub method: ThresholdMethod,
}

impl SignatureCalls {
    pub fn n_active(&self) -> usize {
        self.calls.iter().filter(|c| **c).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinarizeResult {
    pub row_ids: Vec<String>,
    pub signatures: Vec<SignatureCalls>,
}

impl BinarizeResult {
    pub fn thresholds(&self) -> Vec<(&str, f64)> {
        self.signatures
            .iter()
            .map(|s| (s.signature.as_str(), s.threshold))
            .collect()
    }

    pub fn get(&self, signature: &str) -> Option<&SignatureCalls> {
        self.signatures.iter().find(|s| s.signature == signature)
    }

    pub fn call(&self, row_id: &str, signature: &str) -> Option<bool> {
        let row = self.row_ids.iter().position(|r| r == row_id)?;
        self.get(signature).map(|s| s.calls[row])
    }

    /// Signatures whose threshold came from the robust fallback.
    pub fn warnings(&self) -> Vec<(&str, FallbackReason)> {
        self.signatures
            .iter()
            .filter_map(|s| match s.method {
                ThresholdMethod::RobustFallback { reason } => Some((s.signature.as_str(), reason)),
                _ => None,
            })
            .collect()
    }
}

pub fn derive_threshold(
    signature: &str,
    values: &[f64],
    params: &BinarizeParams,
) -> Result<(f64, ThresholdMethod)> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(CtxError::InvalidInput(format!(
            "signature {signature:?}: non-finite AUC value {bad}"
        )));
    }
    if values.is_empty() {
        return Ok((0.0, ThresholdMethod::Degenerate));
    }

    let variance = stats::variance(values);
    // The fit cannot resolve spread below the per-component regularization.
    if variance <= params.degenerate_variance() {
        if !params.degenerate_fallback {
            return Err(CtxError::DegenerateInput {
                signature: signature.to_string(),
                variance,
            });
        }
        let mean = stats::mean(values);
        let threshold = match params.min_activity {
            Some(floor) if mean != 0.0 && mean > floor => floor,
            _ => values.iter().copied().fold(mean, f64::max),
        };
        debug!(signature, variance, threshold, "degenerate AUC population");
        return Ok((threshold, ThresholdMethod::Degenerate));
    }

    let reason = if values.len() < MIN_SAMPLES_PER_COMPONENT * params.n_components {
        FallbackReason::TooFewSamples
    } else {
        let mut rng = StdRng::seed_from_u64(params.seed);
        match fit_gaussian_mixture(values, &params.mixture_options(), &mut rng) {
            Ok(fit) if fit.converged => match equal_tail_crossing(&fit) {
                Some(threshold) => {
                    return Ok((
                        threshold,
                        ThresholdMethod::MixtureCrossing {
                            iterations: fit.iterations,
                            components: fit.n_components(),
                        },
                    ));
                }
                None => FallbackReason::NoCrossing,
            },
            Ok(_) => FallbackReason::NotConverged,
            Err(reason) => reason,
        }
    };

    let threshold = stats::robust_threshold(values, params.fallback_k);
    warn!(
        signature,
        reason = reason.as_str(),
        threshold,
        "mixture fit unusable; using median + k * MAD threshold"
    );
    Ok((threshold, ThresholdMethod::RobustFallback { reason }))
}

/// Thresholds and calls for every signature (column) of `auc`.
///
/// Signatures are processed independently on a pool of `num_workers`
/// threads; each one seeds its own generator from `params.seed`, so results
/// do not depend on the worker count.
pub fn binarize(auc: &AucMatrix, params: &BinarizeParams) -> Result<BinarizeResult> {
    params.validate()?;
    let pool = build_pool(params.num_workers)?;

    let signatures = pool.install(|| {
        (0..auc.n_signatures())
            .into_par_iter()
            .map(|sig| -> Result<SignatureCalls> {
                let name = &auc.signatures[sig];
                let values = auc.column(sig);
                let (threshold, method) = derive_threshold(name, &values, params)?;
                Ok(SignatureCalls {
                    signature: name.clone(),
                    threshold,
                    calls: values.iter().map(|v| *v > threshold).collect(),
                    method,
                })
            })
            .collect::<Result<Vec<_>>>()
    })?;

    debug!(
        n_signatures = signatures.len(),
        n_rows = auc.n_rows(),
        "binarized AUC matrix"
    );
    Ok(BinarizeResult {
        row_ids: auc.row_ids.clone(),
        signatures,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/binarize/tests.rs"]
mod tests;
