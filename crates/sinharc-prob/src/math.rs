//! Small numerically-stable math utilities used across probability code.

use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::{LN_2, SQRT_2};

/// Natural log of `sqrt(2π)`.
///
/// `ln(sqrt(2π)) = 0.5*ln(2π)` (precomputed to keep this crate const-friendly).
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Below this `z`, [`std_normal_log_cdf`] switches to the asymptotic series.
const LOG_CDF_ASYMPTOTIC_Z: f64 = -20.0;

/// Stable `log(1 + exp(x))`.
///
/// Branchless: `log(1+exp(x)) = max(x,0) + log(1+exp(-|x|))`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let abs_x = x.abs();
    let e = (-abs_x).exp(); // always in (0, 1], no overflow
    x.max(0.0) + e.ln_1p()
}

/// Stable sigmoid: `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let abs_x = x.abs();
    let e = (-abs_x).exp();
    let recip = 1.0 / (1.0 + e);
    // x >= 0: sigmoid = 1/(1+exp(-x)) = recip
    // x <  0: sigmoid = exp(x)/(1+exp(x)) = e/(1+e) = e*recip
    if x >= 0.0 { recip } else { e * recip }
}

/// Stable `log(sigmoid(x))`.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    // log(sigmoid(x)) = -log(1 + exp(-x))
    if x >= 0.0 { -(-x).exp().ln_1p() } else { x - x.exp().ln_1p() }
}

/// Stable softplus: `log(1 + exp(x))`.
#[inline]
pub fn softplus(x: f64) -> f64 {
    log1pexp(x)
}

/// Inverse of [`softplus`]: `ln(exp(y) - 1)` for `y > 0`.
///
/// Non-positive `y` is clamped to `1e-15` so the result stays finite.
#[inline]
pub fn softplus_inverse(y: f64) -> f64 {
    let y = y.max(1e-15);
    if y > 20.0 {
        // softplus(z) ~= z for large z, so inverse ~= y
        y
    } else {
        y.exp_m1().ln()
    }
}

/// Stable `ln(cosh(x))` that does not overflow for large `|x|`.
#[inline]
pub fn log_cosh(x: f64) -> f64 {
    let a = x.abs();
    a + (-2.0 * a).exp().ln_1p() - LN_2
}

/// `ln|sinh(x)|`, finite for arguments where `sinh` itself overflows.
#[inline]
pub fn log_abs_sinh(x: f64) -> f64 {
    let a = x.abs();
    if a < 1.0 { a.sinh().ln() } else { a - LN_2 + (-(-2.0 * a).exp()).ln_1p() }
}

/// `asinh(|u|)` given `ln|u|`, for `|u|` beyond the range of `f64`.
#[inline]
pub fn asinh_from_log(log_abs: f64) -> f64 {
    // asinh(u) = ln(u) + ln(2) + O(u^-2)
    if log_abs < 20.0 { log_abs.exp().asinh() } else { log_abs + LN_2 }
}

/// Log-density of the standard Normal.
#[inline]
pub fn std_normal_logpdf(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI
}

/// Cdf of the standard Normal.
#[inline]
pub fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Survival function `1 - Phi(z)` of the standard Normal, accurate in the upper tail.
#[inline]
pub fn std_normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / SQRT_2)
}

/// `ln(Phi(z))`, accurate deep in the lower tail.
pub fn std_normal_log_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z < LOG_CDF_ASYMPTOTIC_Z {
        // Phi(z) ~ phi(z)/(-z) * (1 - 1/z^2 + 3/z^4 - 15/z^6)
        let z2 = z * z;
        let series = 1.0 - 1.0 / z2 + 3.0 / (z2 * z2) - 15.0 / (z2 * z2 * z2);
        return -0.5 * z2 - (-z).ln() - LN_SQRT_2PI + series.ln();
    }
    if z > 5.0 {
        return (-std_normal_sf(z)).ln_1p();
    }
    std_normal_cdf(z).ln()
}

/// Quantile (inverse cdf) of the standard Normal.
///
/// Returns `-inf` at `p = 0`, `+inf` at `p = 1`, and `NaN` outside `[0, 1]`.
pub fn std_normal_quantile(p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log1pexp_matches_naive_moderate_values() {
        let xs: [f64; 7] = [-10.0, -2.0, -0.1, 0.0, 0.1, 2.0, 10.0];
        for x in xs {
            let naive = (1.0 + x.exp()).ln();
            let stable = log1pexp(x);
            assert!((naive - stable).abs() < 1e-12, "x={}: {} vs {}", x, naive, stable);
        }
    }

    #[test]
    fn test_log_abs_sinh_and_asinh_from_log() {
        for x in [-3.0, -0.5, 0.2, 1.0, 7.5] {
            assert_relative_eq!(log_abs_sinh(x), x.sinh().abs().ln(), epsilon = 1e-13);
        }
        // sinh(1000) overflows, its log does not.
        assert_relative_eq!(log_abs_sinh(1000.0), 1000.0 - LN_2, epsilon = 1e-12);

        for u in [0.0, 0.3, 5.0, 1e7] {
            let l: f64 = f64::ln(u);
            assert_relative_eq!(asinh_from_log(l), f64::asinh(u), max_relative = 1e-14);
        }
        assert_relative_eq!(asinh_from_log(800.0), 800.0 + LN_2);
    }

    #[test]
    fn test_log1pexp_is_finite_extremes() {
        let xs: [f64; 4] = [-1e6, -100.0, 100.0, 1e6];
        for x in xs {
            let y = log1pexp(x);
            assert!(y.is_finite(), "x={} produced {}", x, y);
        }
        assert!((log1pexp(1e6) - 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_bounds_and_symmetry() {
        let xs: [f64; 7] = [-50.0, -10.0, -1.0, 0.0, 1.0, 10.0, 50.0];
        for x in xs {
            let s = sigmoid(x);
            assert!((0.0..=1.0).contains(&s), "sigmoid({})={}", x, s);
            let t = sigmoid(-x);
            assert!((s + t - 1.0).abs() < 1e-15, "sigmoid symmetry failed at {}", x);
        }
    }

    #[test]
    fn test_log_sigmoid_matches_naive_moderate_values() {
        let xs: [f64; 7] = [-10.0, -2.0, -0.1, 0.0, 0.1, 2.0, 10.0];
        for x in xs {
            let naive = sigmoid(x).ln();
            let stable = log_sigmoid(x);
            assert!((naive - stable).abs() < 1e-12, "x={}: {} vs {}", x, naive, stable);
        }
    }

    #[test]
    fn test_softplus_inverse_roundtrip() {
        for x in [-10.0, -1.0, 0.0, 0.5, 3.0, 15.0] {
            let back = softplus_inverse(softplus(x));
            assert!((back - x).abs() < 1e-9, "x={}: back={}", x, back);
        }
    }

    #[test]
    fn test_log_cosh_matches_naive_and_is_finite() {
        for x in [-5.0, -0.3, 0.0, 0.7, 4.0] {
            let naive = f64::cosh(x).ln();
            assert_relative_eq!(log_cosh(x), naive, epsilon = 1e-12);
        }
        assert_relative_eq!(log_cosh(1e4), 1e4 - LN_2, epsilon = 1e-9);
    }

    #[test]
    fn test_std_normal_reference_values() {
        assert_relative_eq!(std_normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_relative_eq!(std_normal_cdf(1.959_963_984_540_054), 0.975, epsilon = 1e-12);
        assert_relative_eq!(std_normal_quantile(0.975), 1.959_963_984_540_054, epsilon = 1e-9);
        assert_relative_eq!(std_normal_logpdf(0.0), -LN_SQRT_2PI, epsilon = 1e-15);
        assert_relative_eq!(std_normal_sf(1.0) + std_normal_cdf(1.0), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_std_normal_quantile_edges() {
        assert_eq!(std_normal_quantile(0.0), f64::NEG_INFINITY);
        assert_eq!(std_normal_quantile(1.0), f64::INFINITY);
        assert!(std_normal_quantile(1.5).is_nan());
        assert!(std_normal_quantile(-0.1).is_nan());
    }

    #[test]
    fn test_log_cdf_tail_is_continuous() {
        // The two branches should agree around the switch point.
        let below = std_normal_log_cdf(LOG_CDF_ASYMPTOTIC_Z - 1e-9);
        let above = std_normal_log_cdf(LOG_CDF_ASYMPTOTIC_Z + 1e-9);
        assert_relative_eq!(below, above, max_relative = 1e-6);
        assert!(std_normal_log_cdf(-100.0).is_finite());
        assert_relative_eq!(std_normal_log_cdf(0.0), 0.5f64.ln(), epsilon = 1e-14);
    }
}
