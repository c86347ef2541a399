//! Elementwise bijective transforms (bijectors).
//!
//! A transformed distribution pushes a base distribution through one of these
//! maps; the log-det-Jacobian terms give the change-of-variables correction to
//! the density. Every bijector here is elementwise and broadcasts its inputs
//! against its own parameters.
//!
//! Parameterized bijectors hold [`DeferredTensor`]s, so a bijector built over a
//! [`Variable`](sinharc_core::Variable) sees later assignments.

use std::f64::consts::LN_2;
use std::sync::Arc;

use sinharc_core::tensor::{self, Tensor};
use sinharc_core::{Bijector, DeferredTensor, Error, Result};

use crate::math::{
    asinh_from_log, log1pexp, log_abs_sinh, log_cosh, log_sigmoid, softplus, softplus_inverse,
};

/// `asinh(2)`: the sinh-arcsinh multiplier is normalized at `x = 2`.
const ASINH_2: f64 = 1.443_635_475_178_810_3;

/// Identity: `(-inf, inf) -> (-inf, inf)`.
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl Identity {
    /// Create the identity bijector.
    pub fn new() -> Self {
        Self
    }
}

impl Bijector for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.clone())
    }

    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        Ok(y.clone())
    }

    fn forward_log_det_jacobian(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.mapv(|_| 0.0))
    }

    fn inverse_log_det_jacobian(&self, y: &Tensor) -> Result<Tensor> {
        Ok(y.mapv(|_| 0.0))
    }
}

/// Shift: `y = x + shift`, `log|J| = 0`.
#[derive(Debug, Clone)]
pub struct Shift {
    shift: DeferredTensor,
}

impl Shift {
    /// Create a shift by `shift`.
    pub fn new(shift: impl Into<DeferredTensor>) -> Self {
        Self { shift: shift.into() }
    }

    /// Shift parameter.
    pub fn shift(&self) -> &DeferredTensor {
        &self.shift
    }
}

impl Bijector for Shift {
    fn name(&self) -> &str {
        "shift"
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        tensor::map2(x, &self.shift.value()?, |x, s| x + s)
    }

    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        tensor::map2(y, &self.shift.value()?, |y, s| y - s)
    }

    fn forward_log_det_jacobian(&self, x: &Tensor) -> Result<Tensor> {
        tensor::map2(x, &self.shift.value()?, |_, _| 0.0)
    }

    fn inverse_log_det_jacobian(&self, y: &Tensor) -> Result<Tensor> {
        self.forward_log_det_jacobian(y)
    }
}

/// Scale: `y = scale * x`, `log|J| = ln|scale|`.
///
/// Decreasing where `scale < 0`.
#[derive(Debug, Clone)]
pub struct Scale {
    scale: DeferredTensor,
    validate_args: bool,
}

impl Scale {
    /// Create a scaling by `scale`.
    pub fn new(scale: impl Into<DeferredTensor>) -> Self {
        Self { scale: scale.into(), validate_args: false }
    }

    /// Reject `scale == 0` on every call.
    pub fn with_validate_args(mut self, validate_args: bool) -> Self {
        self.validate_args = validate_args;
        self
    }

    /// Scale parameter.
    pub fn scale(&self) -> &DeferredTensor {
        &self.scale
    }

    fn scale_value(&self) -> Result<Tensor> {
        let scale = self.scale.value()?;
        if self.validate_args && scale.iter().any(|&s| s == 0.0) {
            return Err(Error::Validation("scale bijector: scale must be non-zero".to_string()));
        }
        Ok(scale)
    }
}

impl Bijector for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        tensor::map2(x, &self.scale_value()?, |x, s| x * s)
    }

    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        tensor::map2(y, &self.scale_value()?, |y, s| y / s)
    }

    fn forward_log_det_jacobian(&self, x: &Tensor) -> Result<Tensor> {
        tensor::map2(x, &self.scale_value()?, |_, s| s.abs().ln())
    }

    fn inverse_log_det_jacobian(&self, y: &Tensor) -> Result<Tensor> {
        tensor::map2(y, &self.scale_value()?, |_, s| -s.abs().ln())
    }

    fn jacobian_sign(&self) -> Result<Tensor> {
        Ok(self.scale_value()?.mapv(|s| if s < 0.0 { -1.0 } else { 1.0 }))
    }
}

/// Softplus: `(-inf, inf) -> (low, inf)`, `y = low + softplus(x)`.
///
/// Used as the default constraining transform for positive parameters.
/// Compared to `exp`, softplus is close to linear for large `x`, which keeps
/// large unconstrained values from overflowing.
#[derive(Debug, Clone, Default)]
pub struct Softplus {
    low: f64,
}

impl Softplus {
    /// Softplus onto `(0, inf)`.
    pub fn new() -> Self {
        Self { low: 0.0 }
    }

    /// Softplus onto `(low, inf)`.
    pub fn with_low(low: f64) -> Self {
        Self { low }
    }

    /// Lower bound of the image.
    pub fn low(&self) -> f64 {
        self.low
    }
}

impl Bijector for Softplus {
    fn name(&self) -> &str {
        "softplus"
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.mapv(|x| self.low + softplus(x)))
    }

    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        Ok(y.mapv(|y| softplus_inverse(y - self.low)))
    }

    fn forward_log_det_jacobian(&self, x: &Tensor) -> Result<Tensor> {
        // d/dx softplus(x) = sigmoid(x)
        Ok(x.mapv(log_sigmoid))
    }
}

/// Sinh-arcsinh reshaping with adjustable skew and tail weight.
///
/// ```text
/// y = sinh((asinh(x) + skewness) * tailweight) * m
/// m = 2 / sinh(asinh(2) * tailweight)
/// ```
///
/// The multiplier `m` makes `forward(2) = 2` when `skewness = 0`, so the mass
/// beyond two units is unchanged by the tail reshaping. `skewness = 0`,
/// `tailweight = 1` is the identity.
#[derive(Debug, Clone)]
pub struct SinhArcsinhBijector {
    skewness: DeferredTensor,
    tailweight: DeferredTensor,
    validate_args: bool,
}

impl SinhArcsinhBijector {
    /// Create the reshaping bijector.
    pub fn new(skewness: impl Into<DeferredTensor>, tailweight: impl Into<DeferredTensor>) -> Self {
        Self { skewness: skewness.into(), tailweight: tailweight.into(), validate_args: false }
    }

    /// Reject `tailweight <= 0` on every call.
    pub fn with_validate_args(mut self, validate_args: bool) -> Self {
        self.validate_args = validate_args;
        self
    }

    /// Skewness parameter.
    pub fn skewness(&self) -> &DeferredTensor {
        &self.skewness
    }

    /// Tailweight parameter.
    pub fn tailweight(&self) -> &DeferredTensor {
        &self.tailweight
    }

    fn params(&self) -> Result<(Tensor, Tensor)> {
        let skewness = self.skewness.value()?;
        let tailweight = self.tailweight.value()?;
        if self.validate_args {
            if let Some(bad) = tailweight.iter().find(|t| !(**t > 0.0)) {
                return Err(Error::Validation(format!(
                    "sinh_arcsinh bijector: tailweight must be > 0, got {bad}"
                )));
            }
        }
        Ok((skewness, tailweight))
    }
}

/// Output multiplier `2 / sinh(asinh(2) * tailweight)`.
///
/// Underflows to zero for large tailweights; the bijector itself works with
/// [`log_sinh_arcsinh_multiplier`].
#[inline]
pub fn sinh_arcsinh_multiplier(tailweight: f64) -> f64 {
    2.0 / (ASINH_2 * tailweight).sinh()
}

/// `ln|2 / sinh(asinh(2) * tailweight)|`, finite for every finite non-zero tailweight.
#[inline]
pub fn log_sinh_arcsinh_multiplier(tailweight: f64) -> f64 {
    LN_2 - log_abs_sinh(ASINH_2 * tailweight)
}

#[inline]
fn sas_forward(x: f64, skewness: f64, tailweight: f64) -> f64 {
    // sinh(w) * m, assembled in log space so neither factor overflows.
    let w = (x.asinh() + skewness) * tailweight;
    let magnitude = (log_abs_sinh(w) + log_sinh_arcsinh_multiplier(tailweight)).exp();
    w.signum() * tailweight.signum() * magnitude
}

/// `(sign, ln|y / m|)`.
#[inline]
fn sas_scaled(y: f64, tailweight: f64) -> (f64, f64) {
    (y.signum() * tailweight.signum(), y.abs().ln() - log_sinh_arcsinh_multiplier(tailweight))
}

#[inline]
pub(crate) fn sas_inverse(y: f64, skewness: f64, tailweight: f64) -> f64 {
    let (sign, log_u) = sas_scaled(y, tailweight);
    (sign * asinh_from_log(log_u) / tailweight - skewness).sinh()
}

/// `log|dx/dy|` at `y`.
#[inline]
pub(crate) fn sas_inverse_log_det_jacobian(y: f64, skewness: f64, tailweight: f64) -> f64 {
    // With u = y/m: (asinh(x) + s) * t = asinh(u), and log cosh(asinh(u)) = ln hypot(1, u).
    let (_, log_u) = sas_scaled(y, tailweight);
    let x = sas_inverse(y, skewness, tailweight);
    let log_hypot_u = 0.5 * log1pexp(2.0 * log_u);
    x.hypot(1.0).ln() - log_hypot_u - tailweight.abs().ln() - log_sinh_arcsinh_multiplier(tailweight)
}

impl Bijector for SinhArcsinhBijector {
    fn name(&self) -> &str {
        "sinh_arcsinh"
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (skewness, tailweight) = self.params()?;
        tensor::map3(x, &skewness, &tailweight, sas_forward)
    }

    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        let (skewness, tailweight) = self.params()?;
        tensor::map3(y, &skewness, &tailweight, sas_inverse)
    }

    fn forward_log_det_jacobian(&self, x: &Tensor) -> Result<Tensor> {
        let (skewness, tailweight) = self.params()?;
        tensor::map3(x, &skewness, &tailweight, |x, s, t| {
            // dy/dx = m * t * cosh((asinh(x) + s) * t) / sqrt(1 + x^2)
            log_sinh_arcsinh_multiplier(t) + t.abs().ln() + log_cosh((x.asinh() + s) * t)
                - x.hypot(1.0).ln()
        })
    }

    fn inverse_log_det_jacobian(&self, y: &Tensor) -> Result<Tensor> {
        let (skewness, tailweight) = self.params()?;
        tensor::map3(y, &skewness, &tailweight, sas_inverse_log_det_jacobian)
    }
}

/// Composition of bijectors, applied last-to-first like function composition:
/// `Chain::new(vec![f, g]).forward(x) == f(g(x))`.
#[derive(Debug, Clone)]
pub struct Chain {
    bijectors: Vec<Arc<dyn Bijector>>,
    name: String,
}

impl Chain {
    /// Compose `bijectors`; an empty chain is the identity.
    pub fn new(bijectors: Vec<Arc<dyn Bijector>>) -> Self {
        let name = if bijectors.is_empty() {
            "identity".to_string()
        } else {
            let names: Vec<&str> = bijectors.iter().map(|b| b.name()).collect();
            format!("chain_of_{}", names.join("_of_"))
        };
        Self { bijectors, name }
    }

    /// Component bijectors in composition order (last applied first).
    pub fn bijectors(&self) -> &[Arc<dyn Bijector>] {
        &self.bijectors
    }
}

impl Bijector for Chain {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut v = x.clone();
        for b in self.bijectors.iter().rev() {
            v = b.forward(&v)?;
        }
        Ok(v)
    }

    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        let mut v = y.clone();
        for b in &self.bijectors {
            v = b.inverse(&v)?;
        }
        Ok(v)
    }

    fn forward_log_det_jacobian(&self, x: &Tensor) -> Result<Tensor> {
        let mut total = x.mapv(|_| 0.0);
        let mut v = x.clone();
        for b in self.bijectors.iter().rev() {
            total = tensor::map2(&total, &b.forward_log_det_jacobian(&v)?, |a, b| a + b)?;
            v = b.forward(&v)?;
        }
        Ok(total)
    }

    fn inverse_log_det_jacobian(&self, y: &Tensor) -> Result<Tensor> {
        let mut total = y.mapv(|_| 0.0);
        let mut v = y.clone();
        for b in &self.bijectors {
            total = tensor::map2(&total, &b.inverse_log_det_jacobian(&v)?, |a, b| a + b)?;
            v = b.inverse(&v)?;
        }
        Ok(total)
    }

    fn jacobian_sign(&self) -> Result<Tensor> {
        let mut sign = tensor::scalar(1.0);
        for b in &self.bijectors {
            sign = tensor::map2(&sign, &b.jacobian_sign()?, |a, b| a * b)?;
        }
        Ok(sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sinharc_core::Variable;

    fn test_bijector_roundtrip(b: &dyn Bijector, x_values: &[f64], rtol: f64) {
        let x = tensor::from_vec(x_values.to_vec());
        let y = b.forward(&x).unwrap();
        let x_back = b.inverse(&y).unwrap();
        for (&x, (&y, &x_back)) in x.iter().zip(y.iter().zip(x_back.iter())) {
            let diff = (x - x_back).abs();
            let scale = x.abs().max(1.0);
            assert!(
                diff / scale < rtol,
                "Roundtrip failed: x={}, y={}, x_back={}, diff={}",
                x,
                y,
                x_back,
                diff
            );
        }
    }

    /// `log|dy/dx|` against a central finite difference of `forward`.
    fn test_bijector_log_det_jacobian(b: &dyn Bijector, x_values: &[f64], rtol: f64) {
        let eps = 1e-6;
        for &x in x_values {
            let fwd = |v: f64| b.forward(&tensor::scalar(v)).unwrap().sum();
            let dydx = (fwd(x + eps) - fwd(x - eps)) / (2.0 * eps);
            let fldj = b.forward_log_det_jacobian(&tensor::scalar(x)).unwrap().sum();
            let diff = (fldj - dydx.abs().ln()).abs();
            let scale = fldj.abs().max(1.0);
            assert!(
                diff / scale < rtol,
                "log|J| failed: x={}, analytical={}, fd={}, diff={}",
                x,
                fldj,
                dydx.abs().ln(),
                diff
            );

            let y = b.forward(&tensor::scalar(x)).unwrap();
            let ildj = b.inverse_log_det_jacobian(&y).unwrap().sum();
            assert_relative_eq!(ildj, -fldj, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_identity_roundtrip() {
        let b = Identity::new();
        test_bijector_roundtrip(&b, &[-3.0, -1.0, 0.0, 0.5, 2.0, 10.0], 1e-15);
        assert_eq!(b.forward_log_det_jacobian(&tensor::scalar(1.0)).unwrap().sum(), 0.0);
    }

    #[test]
    fn test_shift_and_scale() {
        let shift = Shift::new(2.5);
        test_bijector_roundtrip(&shift, &[-5.0, 0.0, 4.0], 1e-14);
        test_bijector_log_det_jacobian(&shift, &[-1.0, 0.0, 3.0], 1e-6);

        let scale = Scale::new(-3.0);
        test_bijector_roundtrip(&scale, &[-5.0, 0.0, 4.0], 1e-14);
        test_bijector_log_det_jacobian(&scale, &[-1.0, 0.0, 3.0], 1e-6);
        assert_eq!(scale.jacobian_sign().unwrap().sum(), -1.0);
    }

    #[test]
    fn test_scale_broadcasts_parameters() {
        let scale = Scale::new(vec![1.0, 2.0, 4.0]);
        let y = scale.forward(&tensor::scalar(1.5)).unwrap();
        assert_eq!(y.as_slice().unwrap(), &[1.5, 3.0, 6.0]);
        let fldj = scale.forward_log_det_jacobian(&tensor::scalar(0.0)).unwrap();
        assert_relative_eq!(fldj[[2]], 4.0f64.ln(), epsilon = 1e-15);
    }

    #[test]
    fn test_scale_validate_args_rejects_zero() {
        let scale = Scale::new(vec![1.0, 0.0]).with_validate_args(true);
        assert!(matches!(scale.forward(&tensor::scalar(1.0)), Err(Error::Validation(_))));
        assert!(Scale::new(vec![1.0, 0.0]).forward(&tensor::scalar(1.0)).is_ok());
    }

    #[test]
    fn test_softplus_roundtrip_and_jacobian() {
        let b = Softplus::with_low(2.5);
        test_bijector_roundtrip(&b, &[-10.0, -5.0, -1.0, 0.0, 1.0, 5.0, 10.0], 1e-10);
        test_bijector_log_det_jacobian(&b, &[-5.0, -1.0, 0.0, 1.0, 5.0], 1e-6);
    }

    #[test]
    fn test_softplus_extreme_negative_saturates() {
        let b = Softplus::with_low(2.5);
        let y = b.forward(&tensor::scalar(-40.0)).unwrap().sum();
        assert!((y - 2.5).abs() < 1e-12, "softplus should saturate to low: y={}", y);

        let x_back = b.inverse(&tensor::scalar(y)).unwrap().sum();
        assert!(x_back.is_finite() && x_back < -30.0, "inverse should be very negative: {}", x_back);
    }

    #[test]
    fn test_softplus_large_input_stays_finite() {
        let b = Softplus::new();
        let y = b.forward(&tensor::scalar(1000.0)).unwrap().sum();
        assert!(y.is_finite() && y > 0.0, "y={}", y);
        let x_back = b.inverse(&tensor::scalar(y)).unwrap().sum();
        assert!((x_back - 1000.0).abs() / 1000.0 < 1e-12, "x_back={}", x_back);
    }

    #[test]
    fn test_sinh_arcsinh_defaults_are_identity() {
        let b = SinhArcsinhBijector::new(0.0, 1.0);
        let x = tensor::from_vec(vec![-7.0, -1.0, 0.0, 0.3, 2.0, 50.0]);
        let y = b.forward(&x).unwrap();
        for (a, c) in x.iter().zip(y.iter()) {
            assert_relative_eq!(*a, *c, max_relative = 1e-12);
        }
        let fldj = b.forward_log_det_jacobian(&x).unwrap();
        assert!(fldj.iter().all(|v| v.abs() < 1e-12), "{:?}", fldj);
    }

    #[test]
    fn test_sinh_arcsinh_fixes_two_without_skew() {
        for t in [0.3, 0.8, 1.0, 1.7, 3.0] {
            let b = SinhArcsinhBijector::new(0.0, t);
            let y = b.forward(&tensor::scalar(2.0)).unwrap().sum();
            assert_relative_eq!(y, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sinh_arcsinh_roundtrip_and_jacobian() {
        for (s, t) in [(0.5, 1.3), (-1.0, 0.6), (0.0, 2.0), (2.0, 1.0)] {
            let b = SinhArcsinhBijector::new(s, t);
            test_bijector_roundtrip(&b, &[-4.0, -1.0, -0.2, 0.0, 0.7, 3.0], 1e-10);
            test_bijector_log_det_jacobian(&b, &[-3.0, -0.5, 0.0, 0.4, 2.5], 1e-6);
        }
    }

    #[test]
    fn test_sinh_arcsinh_large_tailweight_stays_finite() {
        // sinh(asinh(2) * 700) overflows f64.
        assert!(sinh_arcsinh_multiplier(700.0) == 0.0);
        assert!(log_sinh_arcsinh_multiplier(700.0).is_finite());

        let b = SinhArcsinhBijector::new(0.0, 700.0);
        let y = b.forward(&tensor::scalar(2.0)).unwrap().sum();
        assert_relative_eq!(y, 2.0, max_relative = 1e-10);

        let ys = tensor::from_vec(vec![-1.0, 0.0, 0.5, 1.0]);
        let x = b.inverse(&ys).unwrap();
        let ildj = b.inverse_log_det_jacobian(&ys).unwrap();
        assert!(x.iter().chain(ildj.iter()).all(|v| v.is_finite()), "x={x:?} ildj={ildj:?}");
        let back = b.forward(&x).unwrap();
        for (a, c) in ys.iter().zip(back.iter()) {
            assert_relative_eq!(*a, *c, max_relative = 1e-9);
        }

        let fldj = b.forward_log_det_jacobian(&x).unwrap();
        for (f, i) in fldj.iter().zip(ildj.iter()) {
            assert_relative_eq!(*f, -*i, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_sinh_arcsinh_validate_args() {
        let b = SinhArcsinhBijector::new(0.0, -1.0).with_validate_args(true);
        assert!(matches!(b.forward(&tensor::scalar(1.0)), Err(Error::Validation(_))));
        assert!(SinhArcsinhBijector::new(0.0, -1.0).forward(&tensor::scalar(1.0)).is_ok());
    }

    #[test]
    fn test_sinh_arcsinh_reads_variables() {
        let skew = Variable::scalar("skewness", 0.0);
        let b = SinhArcsinhBijector::new(&skew, 1.0);
        assert_relative_eq!(b.forward(&tensor::scalar(0.0)).unwrap().sum(), 0.0);
        skew.assign(tensor::scalar(1.0)).unwrap();
        assert_relative_eq!(
            b.forward(&tensor::scalar(0.0)).unwrap().sum(),
            1.0f64.sinh(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_chain_applies_last_first() {
        let chain = Chain::new(vec![Arc::new(Shift::new(1.0)), Arc::new(Scale::new(3.0))]);
        assert_eq!(chain.name(), "chain_of_shift_of_scale");
        let y = chain.forward(&tensor::scalar(2.0)).unwrap().sum();
        assert_relative_eq!(y, 7.0);
        let x = chain.inverse(&tensor::scalar(7.0)).unwrap().sum();
        assert_relative_eq!(x, 2.0);
        test_bijector_log_det_jacobian(&chain, &[-2.0, 0.0, 1.5], 1e-6);
    }

    #[test]
    fn test_chain_log_det_accumulates_at_intermediate_points() {
        let chain = Chain::new(vec![
            Arc::new(Shift::new(-0.5)),
            Arc::new(Scale::new(2.0)),
            Arc::new(SinhArcsinhBijector::new(0.4, 1.6)),
        ]);
        test_bijector_roundtrip(&chain, &[-3.0, -0.1, 0.0, 1.0, 4.0], 1e-10);
        test_bijector_log_det_jacobian(&chain, &[-2.0, -0.3, 0.0, 0.8, 2.2], 1e-6);
    }

    #[test]
    fn test_chain_sign_is_product() {
        let chain = Chain::new(vec![
            Arc::new(Scale::new(vec![-1.0, 2.0])),
            Arc::new(Scale::new(-3.0)),
        ]);
        assert_eq!(chain.jacobian_sign().unwrap().as_slice().unwrap(), &[1.0, -1.0]);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = Chain::new(Vec::new());
        assert_eq!(chain.name(), "identity");
        test_bijector_roundtrip(&chain, &[-1.0, 0.0, 2.0], 1e-15);
    }
}
