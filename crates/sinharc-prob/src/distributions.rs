//! Scalar log-density helpers.
//!
//! One-liner wrappers over the canonical per-distribution modules, for callers
//! that work with plain `f64`s instead of tensors.

use sinharc_core::Result;

/// Log-PDF of Normal `N(mu, sigma)` at `x`.
pub fn normal_logpdf(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    crate::normal::logpdf(x, mu, sigma)
}

/// Log-PDF of SinhArcsinh(`loc`, `scale`, `skewness`, `tailweight`) over a standard Normal.
pub fn sinh_arcsinh_logpdf(
    x: f64,
    loc: f64,
    scale: f64,
    skewness: f64,
    tailweight: f64,
) -> Result<f64> {
    crate::sinh_arcsinh::logpdf(x, loc, scale, skewness, tailweight)
}

/// Sum of SinhArcsinh negative log-likelihoods over `xs`.
pub fn sinh_arcsinh_nll_sum(
    xs: &[f64],
    loc: f64,
    scale: f64,
    skewness: f64,
    tailweight: f64,
) -> Result<f64> {
    xs.iter().map(|&x| crate::sinh_arcsinh::nll(x, loc, scale, skewness, tailweight)).sum()
}
