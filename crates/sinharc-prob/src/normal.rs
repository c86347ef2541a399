//! Normal distribution utilities.
//!
//! [`logpdf`] is the scalar building block; [`Normal`] is the batched
//! distribution used as the default base of
//! [`SinhArcsinh`](crate::sinh_arcsinh::SinhArcsinh).

use std::sync::Arc;

use rand::RngCore;
use rand_distr::{Distribution as RandDistribution, StandardNormal};
use sinharc_core::tensor::{self, Tensor};
use sinharc_core::{
    Bijector, DeferredTensor, Distribution, Error, ReparameterizationType, Result,
};

use crate::math::{
    std_normal_cdf, std_normal_log_cdf, std_normal_logpdf, std_normal_quantile, std_normal_sf,
};
use crate::transforms::Identity;

/// Log-PDF of a Normal distribution `N(mu, sigma)` at `x`.
///
/// `log p(x) = -0.5 * ((x-mu)/sigma)^2 - ln(sigma) - ln(sqrt(2π))`
pub fn logpdf(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::Validation(format!("sigma must be finite and > 0, got {}", sigma)));
    }
    Ok(std_normal_logpdf((x - mu) / sigma) - sigma.ln())
}

/// Negative log-likelihood for a Normal distribution `N(mu, sigma)` at `x`.
pub fn nll(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    Ok(-logpdf(x, mu, sigma)?)
}

/// Batch of Normal distributions with broadcastable `loc` and `scale`.
#[derive(Debug, Clone)]
pub struct Normal {
    loc: DeferredTensor,
    scale: DeferredTensor,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

impl Normal {
    /// Create a Normal with the given location and scale.
    ///
    /// No checks run unless [`Self::with_validate_args`] is enabled.
    pub fn new(loc: impl Into<DeferredTensor>, scale: impl Into<DeferredTensor>) -> Self {
        Self {
            loc: loc.into(),
            scale: scale.into(),
            validate_args: false,
            allow_nan_stats: true,
            name: "Normal".to_string(),
        }
    }

    /// Check `scale > 0` on every operation.
    pub fn with_validate_args(mut self, validate_args: bool) -> Self {
        self.validate_args = validate_args;
        self
    }

    /// Set the `allow_nan_stats` flag.
    pub fn with_allow_nan_stats(mut self, allow_nan_stats: bool) -> Self {
        self.allow_nan_stats = allow_nan_stats;
        self
    }

    /// Rename the distribution.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Location parameter.
    pub fn loc(&self) -> &DeferredTensor {
        &self.loc
    }

    /// Scale parameter.
    pub fn scale(&self) -> &DeferredTensor {
        &self.scale
    }

    /// Current `(loc, scale)` values, checked when `validate_args` is set.
    fn params(&self) -> Result<(Tensor, Tensor)> {
        let loc = self.loc.value()?;
        let scale = self.scale.value()?;
        if self.validate_args {
            if let Some(bad) = scale.iter().find(|s| !(**s > 0.0)) {
                return Err(Error::Validation(format!(
                    "{}: scale must be > 0, got {}",
                    self.name, bad
                )));
            }
        }
        Ok((loc, scale))
    }

    fn standardize(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let (loc, scale) = self.params()?;
        let z = tensor::map3(x, &loc, &scale, |x, m, s| (x - m) / s)?;
        Ok((z, scale))
    }
}

impl Distribution for Normal {
    fn name(&self) -> &str {
        &self.name
    }

    fn batch_shape(&self) -> Result<Vec<usize>> {
        let loc = self.loc.shape()?;
        let scale = self.scale.shape()?;
        tensor::broadcast_shapes(&[&loc, &scale])
    }

    fn log_prob(&self, x: &Tensor) -> Result<Tensor> {
        let (loc, scale) = self.params()?;
        tensor::map3(x, &loc, &scale, |x, m, s| std_normal_logpdf((x - m) / s) - s.ln())
    }

    fn cdf(&self, x: &Tensor) -> Result<Tensor> {
        let (z, _) = self.standardize(x)?;
        Ok(z.mapv(std_normal_cdf))
    }

    fn log_cdf(&self, x: &Tensor) -> Result<Tensor> {
        let (z, _) = self.standardize(x)?;
        Ok(z.mapv(std_normal_log_cdf))
    }

    fn survival_function(&self, x: &Tensor) -> Result<Tensor> {
        let (z, _) = self.standardize(x)?;
        Ok(z.mapv(std_normal_sf))
    }

    fn quantile(&self, p: &Tensor) -> Result<Tensor> {
        let (loc, scale) = self.params()?;
        tensor::map3(p, &loc, &scale, |p, m, s| m + s * std_normal_quantile(p))
    }

    fn sample(&self, sample_shape: &[usize], rng: &mut dyn RngCore) -> Result<Tensor> {
        let (loc, scale) = self.params()?;
        let batch = tensor::broadcast_shapes(&[loc.shape(), scale.shape()])?;
        let shape: Vec<usize> = sample_shape.iter().chain(batch.iter()).copied().collect();
        let n: usize = shape.iter().product();

        let mut noise = Vec::with_capacity(n);
        for _ in 0..n {
            let e: f64 = StandardNormal.sample(&mut *rng);
            noise.push(e);
        }
        let eps = tensor::from_shape_vec(&shape, noise)?;
        tensor::map3(&eps, &loc, &scale, |e, m, s| m + s * e)
    }

    fn mean(&self) -> Result<Tensor> {
        let (loc, _) = self.params()?;
        tensor::broadcast_to(&loc, &self.batch_shape()?)
    }

    fn stddev(&self) -> Result<Tensor> {
        let (_, scale) = self.params()?;
        tensor::broadcast_to(&scale, &self.batch_shape()?)
    }

    fn mode(&self) -> Result<Tensor> {
        self.mean()
    }

    fn reparameterization_type(&self) -> ReparameterizationType {
        ReparameterizationType::FullyReparameterized
    }

    fn validate_args(&self) -> bool {
        self.validate_args
    }

    fn allow_nan_stats(&self) -> bool {
        self.allow_nan_stats
    }

    fn default_event_space_bijector(&self) -> Arc<dyn Bijector> {
        Arc::new(Identity::new())
    }
}
