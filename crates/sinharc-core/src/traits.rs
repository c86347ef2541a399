//! Core traits for sinharc
//!
//! [`Distribution`] and [`Bijector`] are the two seams the rest of the
//! workspace is built around: a transformed distribution only ever talks to
//! its base and its bijector through these traits, so any implementation can
//! be swapped in.
//!
//! All bijectors here are elementwise (event rank 0) and every distribution is
//! scalar-valued (event shape `[]`).

use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use serde::Serialize;

use crate::tensor::{self, Tensor};
use crate::{Error, Result};

/// An invertible, differentiable elementwise map with a known Jacobian.
///
/// Outputs broadcast the input against the bijector's own parameter shapes.
pub trait Bijector: Send + Sync + fmt::Debug {
    /// Bijector name (e.g. `"shift"`, `"sinh_arcsinh"`).
    fn name(&self) -> &str;

    /// `y = forward(x)`
    fn forward(&self, x: &Tensor) -> Result<Tensor>;

    /// `x = inverse(y)`
    fn inverse(&self, y: &Tensor) -> Result<Tensor>;

    /// `log|dy/dx|` evaluated at `x`.
    fn forward_log_det_jacobian(&self, x: &Tensor) -> Result<Tensor>;

    /// `log|dx/dy|` evaluated at `y`.
    fn inverse_log_det_jacobian(&self, y: &Tensor) -> Result<Tensor> {
        let x = self.inverse(y)?;
        Ok(self.forward_log_det_jacobian(&x)?.mapv(|v| -v))
    }

    /// `+1` where the map is increasing, `-1` where it is decreasing.
    ///
    /// Broadcastable against the bijector's parameters.
    fn jacobian_sign(&self) -> Result<Tensor> {
        Ok(tensor::scalar(1.0))
    }
}

/// Whether samples are a differentiable function of the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReparameterizationType {
    /// `sample = g(params, noise)` with `g` differentiable in `params`.
    FullyReparameterized,
    /// No pathwise gradient is available.
    NotReparameterized,
}

/// A batch of independent scalar distributions.
pub trait Distribution: Send + Sync + fmt::Debug {
    /// Name given at construction.
    fn name(&self) -> &str;

    /// Shape of the batch of independent distributions.
    fn batch_shape(&self) -> Result<Vec<usize>>;

    /// Shape of a single draw. Always `[]` for the scalar distributions here.
    fn event_shape(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Log-density at `x`, broadcast against the batch.
    fn log_prob(&self, x: &Tensor) -> Result<Tensor>;

    /// Density at `x`.
    fn prob(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.log_prob(x)?.mapv(f64::exp))
    }

    /// `P[X <= x]`.
    fn cdf(&self, x: &Tensor) -> Result<Tensor>;

    /// `log P[X <= x]`.
    fn log_cdf(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.cdf(x)?.mapv(f64::ln))
    }

    /// `P[X > x]`.
    fn survival_function(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.cdf(x)?.mapv(|c| 1.0 - c))
    }

    /// Inverse cdf at probability `p`.
    fn quantile(&self, p: &Tensor) -> Result<Tensor>;

    /// Draw samples of shape `sample_shape + batch_shape`.
    fn sample(&self, sample_shape: &[usize], rng: &mut dyn RngCore) -> Result<Tensor>;

    /// Mean of each batch member.
    fn mean(&self) -> Result<Tensor> {
        Err(not_implemented(self.name(), "mean"))
    }

    /// Standard deviation of each batch member.
    fn stddev(&self) -> Result<Tensor> {
        Err(not_implemented(self.name(), "stddev"))
    }

    /// Variance of each batch member.
    fn variance(&self) -> Result<Tensor> {
        Ok(self.stddev()?.mapv(|s| s * s))
    }

    /// Mode of each batch member.
    fn mode(&self) -> Result<Tensor> {
        Err(not_implemented(self.name(), "mode"))
    }

    /// Pathwise-gradient availability of [`Self::sample`].
    fn reparameterization_type(&self) -> ReparameterizationType;

    /// Whether parameter checks run on each operation.
    fn validate_args(&self) -> bool;

    /// Whether undefined statistics are reported as `NaN` rather than errors.
    fn allow_nan_stats(&self) -> bool;

    /// Bijector from unconstrained reals onto this distribution's support.
    fn default_event_space_bijector(&self) -> Arc<dyn Bijector>;
}

fn not_implemented(name: &str, what: &str) -> Error {
    Error::NotImplemented(format!("{what} is not implemented for {name}"))
}
