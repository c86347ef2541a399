//! Pushforward of a base distribution through a bijector.
//!
//! For `Y = g(X)` with `g` elementwise and invertible:
//!
//! ```text
//! log p_Y(y) = log p_X(g^-1(y)) + log|d g^-1(y) / dy|
//! P[Y <= y]  = P[X <= g^-1(y)]        where g is increasing
//!            = P[X >  g^-1(y)]        where g is decreasing
//! ```

use std::sync::Arc;

use rand::RngCore;
use sinharc_core::tensor::{self, Tensor};
use sinharc_core::{Bijector, Distribution, ReparameterizationType, Result};

use crate::transforms::Chain;

/// Distribution of `bijector(X)` for `X ~ base`.
#[derive(Debug, Clone)]
pub struct TransformedDistribution {
    base: Arc<dyn Distribution>,
    bijector: Arc<dyn Bijector>,
    validate_args: bool,
    name: String,
}

impl TransformedDistribution {
    /// Push `base` through `bijector`.
    pub fn new(base: Arc<dyn Distribution>, bijector: Arc<dyn Bijector>) -> Self {
        let name = format!("{}{}", bijector.name(), base.name());
        let validate_args = base.validate_args();
        Self { base, bijector, validate_args, name }
    }

    /// Override the `validate_args` flag reported by this distribution.
    pub fn with_validate_args(mut self, validate_args: bool) -> Self {
        self.validate_args = validate_args;
        self
    }

    /// Rename the distribution.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Base distribution.
    pub fn distribution(&self) -> &Arc<dyn Distribution> {
        &self.base
    }

    /// Transform applied to base samples.
    pub fn bijector(&self) -> &Arc<dyn Bijector> {
        &self.bijector
    }

    /// `Some(sign)` when any batch member is decreasing, `None` otherwise.
    fn decreasing_sign(&self) -> Result<Option<Tensor>> {
        let sign = self.bijector.jacobian_sign()?;
        if sign.iter().all(|&s| s > 0.0) { Ok(None) } else { Ok(Some(sign)) }
    }
}

impl Distribution for TransformedDistribution {
    fn name(&self) -> &str {
        &self.name
    }

    /// The base distribution's batch shape; the bijector does not contribute.
    fn batch_shape(&self) -> Result<Vec<usize>> {
        self.base.batch_shape()
    }

    fn log_prob(&self, y: &Tensor) -> Result<Tensor> {
        let x = self.bijector.inverse(y)?;
        let base_lp = self.base.log_prob(&x)?;
        let ildj = self.bijector.inverse_log_det_jacobian(y)?;
        tensor::map2(&base_lp, &ildj, |lp, j| lp + j)
    }

    fn cdf(&self, y: &Tensor) -> Result<Tensor> {
        let x = self.bijector.inverse(y)?;
        match self.decreasing_sign()? {
            None => self.base.cdf(&x),
            Some(sign) => {
                tensor::select_positive(&sign, &self.base.cdf(&x)?, &self.base.survival_function(&x)?)
            }
        }
    }

    fn log_cdf(&self, y: &Tensor) -> Result<Tensor> {
        let x = self.bijector.inverse(y)?;
        match self.decreasing_sign()? {
            None => self.base.log_cdf(&x),
            Some(sign) => {
                let log_sf = self.base.survival_function(&x)?.mapv(f64::ln);
                tensor::select_positive(&sign, &self.base.log_cdf(&x)?, &log_sf)
            }
        }
    }

    fn survival_function(&self, y: &Tensor) -> Result<Tensor> {
        let x = self.bijector.inverse(y)?;
        match self.decreasing_sign()? {
            None => self.base.survival_function(&x),
            Some(sign) => {
                tensor::select_positive(&sign, &self.base.survival_function(&x)?, &self.base.cdf(&x)?)
            }
        }
    }

    fn quantile(&self, p: &Tensor) -> Result<Tensor> {
        let x = match self.decreasing_sign()? {
            None => self.base.quantile(p)?,
            Some(sign) => {
                let flipped = p.mapv(|p| 1.0 - p);
                tensor::select_positive(&sign, &self.base.quantile(p)?, &self.base.quantile(&flipped)?)?
            }
        };
        self.bijector.forward(&x)
    }

    fn sample(&self, sample_shape: &[usize], rng: &mut dyn RngCore) -> Result<Tensor> {
        let x = self.base.sample(sample_shape, rng)?;
        self.bijector.forward(&x)
    }

    fn reparameterization_type(&self) -> ReparameterizationType {
        self.base.reparameterization_type()
    }

    fn validate_args(&self) -> bool {
        self.validate_args
    }

    fn allow_nan_stats(&self) -> bool {
        self.base.allow_nan_stats()
    }

    /// `bijector ∘ base_event_space_bijector`.
    fn default_event_space_bijector(&self) -> Arc<dyn Bijector> {
        Arc::new(Chain::new(vec![self.bijector.clone(), self.base.default_event_space_bijector()]))
    }
}
