//! SinhArcsinh distribution.
//!
//! Given `Z` from a base distribution (standard Normal by default):
//!
//! ```text
//! Y      := loc + scale * F(Z)
//! F(Z)   := sinh((asinh(Z) + skewness) * tailweight) * (2 / F_0(2))
//! F_0(Z) := sinh(asinh(Z) * tailweight)
//! ```
//!
//! - `skewness = 0`, `tailweight = 1` (the defaults) give `F(Z) = Z`, i.e. the
//!   plain location-scale family `loc + scale * Z`.
//! - Positive (negative) `skewness` tilts mass to the right (left).
//! - `tailweight > 1` gives a sharper peak with heavier tails; `tailweight < 1`
//!   flattens the center and thins the tails.
//! - The `2 / F_0(2)` factor keeps `P[Y - loc <= 2 * scale] = P[Z <= 2]` when
//!   `skewness = 0`, so the tail mass beyond two scales matches the base.
//!
//! Density, cdf, quantile and sampling are all delegated to a
//! [`TransformedDistribution`] over the chained bijector
//! `Shift(loc) ∘ Scale(scale) ∘ SinhArcsinhBijector(skewness, tailweight)`.

use std::sync::Arc;

use rand::RngCore;
use sinharc_core::tensor::{self, Tensor};
use sinharc_core::{
    Bijector, DeferredTensor, Distribution, Error, ReparameterizationType, Result,
};

use crate::math::std_normal_logpdf;
use crate::normal::Normal;
use crate::parameter_properties::ParameterProperties;
use crate::transforms::{
    Chain, Identity, Scale, Shift, SinhArcsinhBijector, sas_inverse, sas_inverse_log_det_jacobian,
};
use crate::transformed::TransformedDistribution;

const DEFAULT_NAME: &str = "SinhArcsinh";

/// Log-PDF of a SinhArcsinh distribution over a standard Normal at `x`.
pub fn logpdf(x: f64, loc: f64, scale: f64, skewness: f64, tailweight: f64) -> Result<f64> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::Validation(format!("scale must be finite and > 0, got {}", scale)));
    }
    if !tailweight.is_finite() || tailweight <= 0.0 {
        return Err(Error::Validation(format!(
            "tailweight must be finite and > 0, got {}",
            tailweight
        )));
    }
    if !skewness.is_finite() {
        return Err(Error::Validation(format!("skewness must be finite, got {}", skewness)));
    }

    if x.is_infinite() {
        return Ok(f64::NEG_INFINITY);
    }

    // Undo the affine step, then the reshaping.
    let y = (x - loc) / scale;
    let z = sas_inverse(y, skewness, tailweight);
    let log_dz_dy = sas_inverse_log_det_jacobian(y, skewness, tailweight);
    Ok(std_normal_logpdf(z) + log_dz_dy - scale.ln())
}

/// Negative log-likelihood of a SinhArcsinh distribution at `x`.
pub fn nll(x: f64, loc: f64, scale: f64, skewness: f64, tailweight: f64) -> Result<f64> {
    Ok(-logpdf(x, loc, scale, skewness, tailweight)?)
}

/// The SinhArcsinh transformation of a distribution on `(-inf, inf)`.
#[derive(Debug, Clone)]
pub struct SinhArcsinh {
    loc: DeferredTensor,
    scale: DeferredTensor,
    skewness: DeferredTensor,
    tailweight: DeferredTensor,
    inner: TransformedDistribution,
    default_base: bool,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

/// Builder for [`SinhArcsinh`].
#[derive(Debug, Clone)]
pub struct SinhArcsinhBuilder {
    loc: DeferredTensor,
    scale: DeferredTensor,
    skewness: Option<DeferredTensor>,
    tailweight: Option<DeferredTensor>,
    distribution: Option<Arc<dyn Distribution>>,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

impl SinhArcsinhBuilder {
    /// Skewness. Defaults to `0` (no skew).
    pub fn skewness(mut self, skewness: impl Into<DeferredTensor>) -> Self {
        self.skewness = Some(skewness.into());
        self
    }

    /// Tailweight. Defaults to `1` (unchanged tails).
    pub fn tailweight(mut self, tailweight: impl Into<DeferredTensor>) -> Self {
        self.tailweight = Some(tailweight.into());
        self
    }

    /// Base distribution to transform.
    ///
    /// Its batch shape must be one to which the four parameters broadcast.
    /// Defaults to a standard Normal.
    pub fn distribution(mut self, distribution: Arc<dyn Distribution>) -> Self {
        self.distribution = Some(distribution);
        self
    }

    /// Check `scale > 0` and `tailweight > 0` at construction and on every operation.
    pub fn validate_args(mut self, validate_args: bool) -> Self {
        self.validate_args = validate_args;
        self
    }

    /// Report undefined statistics as `NaN` instead of erroring.
    pub fn allow_nan_stats(mut self, allow_nan_stats: bool) -> Self {
        self.allow_nan_stats = allow_nan_stats;
        self
    }

    /// Name of the distribution. Defaults to `"SinhArcsinh"`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Assemble the transform pipeline.
    pub fn build(self) -> Result<SinhArcsinh> {
        let Self { loc, scale, skewness, tailweight, distribution, validate_args, allow_nan_stats, name } =
            self;
        let skewness = skewness.unwrap_or_else(|| DeferredTensor::scalar(0.0));
        let tailweight = tailweight.unwrap_or_else(|| DeferredTensor::scalar(1.0));

        let default_base = distribution.is_none();
        let base: Arc<dyn Distribution> = match distribution {
            Some(d) => d,
            None => {
                // Rank-matched base so samples broadcast against the parameters.
                let batch_rank = [&skewness, &tailweight, &loc, &scale]
                    .iter()
                    .map(|p| p.rank())
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .max()
                    .unwrap_or(0);
                Arc::new(
                    Normal::new(tensor::full(&vec![1; batch_rank], 0.0), 1.0)
                        .with_validate_args(validate_args)
                        .with_allow_nan_stats(allow_nan_stats),
                )
            }
        };

        let f = SinhArcsinhBijector::new(skewness.clone(), tailweight.clone())
            .with_validate_args(validate_args);
        let affine = Chain::new(vec![
            Arc::new(Shift::new(loc.clone())),
            Arc::new(Scale::new(scale.clone()).with_validate_args(validate_args)),
        ]);
        let bijector: Arc<dyn Bijector> = Arc::new(Chain::new(vec![Arc::new(affine), Arc::new(f)]));

        let inner = TransformedDistribution::new(base, bijector)
            .with_validate_args(validate_args)
            .with_name(name.clone());

        let dist = SinhArcsinh {
            loc,
            scale,
            skewness,
            tailweight,
            inner,
            default_base,
            validate_args,
            allow_nan_stats,
            name,
        };
        dist.check_parameters()?;
        tracing::debug!(name = %dist.name, default_base, validate_args, "constructed SinhArcsinh");
        Ok(dist)
    }
}

impl SinhArcsinh {
    /// SinhArcsinh over a standard Normal with default skewness and tailweight.
    pub fn new(loc: impl Into<DeferredTensor>, scale: impl Into<DeferredTensor>) -> Result<Self> {
        Self::builder(loc, scale).build()
    }

    /// Start a builder with the required parameters.
    pub fn builder(
        loc: impl Into<DeferredTensor>,
        scale: impl Into<DeferredTensor>,
    ) -> SinhArcsinhBuilder {
        SinhArcsinhBuilder {
            loc: loc.into(),
            scale: scale.into(),
            skewness: None,
            tailweight: None,
            distribution: None,
            validate_args: false,
            allow_nan_stats: true,
            name: DEFAULT_NAME.to_string(),
        }
    }

    /// Parameter metadata, in constructor order.
    ///
    /// `scale` and `tailweight` are constrained positive by softplus.
    pub fn parameter_properties() -> Vec<(&'static str, ParameterProperties)> {
        vec![
            ("loc", ParameterProperties::real()),
            ("scale", ParameterProperties::positive()),
            ("skewness", ParameterProperties::real()),
            ("tailweight", ParameterProperties::positive()),
        ]
    }

    /// The `loc` in `Y := loc + scale * F(Z)`.
    pub fn loc(&self) -> &DeferredTensor {
        &self.loc
    }

    /// The `scale` in `Y := loc + scale * F(Z)`.
    pub fn scale(&self) -> &DeferredTensor {
        &self.scale
    }

    /// Controls the skewness. `skewness > 0` means right skew.
    pub fn skewness(&self) -> &DeferredTensor {
        &self.skewness
    }

    /// Controls the tail decay. `tailweight > 1` means heavier tails than the base.
    pub fn tailweight(&self) -> &DeferredTensor {
        &self.tailweight
    }

    /// Base distribution being transformed.
    pub fn distribution(&self) -> &Arc<dyn Distribution> {
        self.inner.distribution()
    }

    /// Full transform applied to base samples.
    pub fn bijector(&self) -> &Arc<dyn Bijector> {
        self.inner.bijector()
    }

    /// Parameters as captured at construction, in constructor order.
    pub fn parameters(&self) -> Vec<(&'static str, DeferredTensor)> {
        vec![
            ("loc", self.loc.clone()),
            ("scale", self.scale.clone()),
            ("skewness", self.skewness.clone()),
            ("tailweight", self.tailweight.clone()),
        ]
    }

    /// Median, `loc + scale * F(median(Z))`, broadcast to the batch shape.
    pub fn median(&self) -> Result<Tensor> {
        let q = self.quantile(&tensor::scalar(0.5))?;
        let batch = self.batch_shape()?;
        let shape = tensor::broadcast_shapes(&[q.shape(), &batch])?;
        tensor::broadcast_to(&q, &shape)
    }

    /// Positivity of `scale` and `tailweight`, when `validate_args` is set.
    fn check_parameters(&self) -> Result<()> {
        if !self.validate_args {
            return Ok(());
        }
        for (what, param) in [("scale", &self.scale), ("tailweight", &self.tailweight)] {
            let value = param.value()?;
            if let Some(bad) = value.iter().find(|v| !(**v > 0.0)) {
                tracing::debug!(name = %self.name, parameter = what, value = *bad, "invalid parameter");
                return Err(Error::Validation(format!(
                    "{}: {what} must be positive, got {bad}",
                    self.name
                )));
            }
        }
        self.batch_shape().map(|_| ())
    }

    /// Drop the leading unit axes the default base contributes once the
    /// parameters have lost rank since construction.
    fn conform(&self, out: Tensor, input: &Tensor) -> Result<Tensor> {
        if !self.default_base {
            return Ok(out);
        }
        let batch = self.batch_shape()?;
        let target = tensor::broadcast_shapes(&[input.shape(), &batch])?;
        if out.shape() == target.as_slice() || out.len() != target.iter().product::<usize>() {
            return Ok(out);
        }
        tensor::from_shape_vec(&target, out.iter().copied().collect())
    }
}

impl Distribution for SinhArcsinh {
    fn name(&self) -> &str {
        &self.name
    }

    /// Broadcast of the four parameter shapes.
    ///
    /// Overrides the transformed distribution's answer, which only sees the
    /// default base's all-ones shape.
    fn batch_shape(&self) -> Result<Vec<usize>> {
        let shapes = [
            self.skewness.shape()?,
            self.tailweight.shape()?,
            self.loc.shape()?,
            self.scale.shape()?,
        ];
        let refs: Vec<&[usize]> = shapes.iter().map(|s| s.as_slice()).collect();
        tensor::broadcast_shapes(&refs)
    }

    fn log_prob(&self, x: &Tensor) -> Result<Tensor> {
        self.check_parameters()?;
        let lp = self.inner.log_prob(x)?;
        let lp = self.conform(lp, x)?;
        // The inverse Jacobian is inf - inf at infinite x.
        tensor::map2(&lp, x, |lp, x| if x.is_infinite() { f64::NEG_INFINITY } else { lp })
    }

    fn cdf(&self, x: &Tensor) -> Result<Tensor> {
        self.check_parameters()?;
        let out = self.inner.cdf(x)?;
        self.conform(out, x)
    }

    fn log_cdf(&self, x: &Tensor) -> Result<Tensor> {
        self.check_parameters()?;
        let out = self.inner.log_cdf(x)?;
        self.conform(out, x)
    }

    fn survival_function(&self, x: &Tensor) -> Result<Tensor> {
        self.check_parameters()?;
        let out = self.inner.survival_function(x)?;
        self.conform(out, x)
    }

    fn quantile(&self, p: &Tensor) -> Result<Tensor> {
        self.check_parameters()?;
        let out = self.inner.quantile(p)?;
        self.conform(out, p)
    }

    fn sample(&self, sample_shape: &[usize], rng: &mut dyn RngCore) -> Result<Tensor> {
        self.check_parameters()?;
        if !self.default_base {
            return self.inner.sample(sample_shape, rng);
        }
        // The default base has an all-ones batch; draw one variate per batch member
        // so batch members are independent.
        let batch = self.batch_shape()?;
        let shape: Vec<usize> = sample_shape.iter().chain(batch.iter()).copied().collect();
        let z = self
            .inner
            .distribution()
            .sample(&shape, rng)?
            .into_shape(shape)
            .map_err(|e| Error::Shape(e.to_string()))?;
        self.inner.bijector().forward(&z)
    }

    fn reparameterization_type(&self) -> ReparameterizationType {
        self.inner.reparameterization_type()
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
