//! JSON distribution spec.
//!
//! ```json
//! {
//!   "loc": [0.0, 1.0],
//!   "scale": 2.0,
//!   "skewness": 0.5,
//!   "tailweight": [[1.0], [1.5]],
//!   "base": { "normal": { "loc": 0.0, "scale": 1.0 } },
//!   "validate_args": true,
//!   "allow_nan_stats": true,
//!   "name": "returns"
//! }
//! ```
//!
//! Parameters are JSON numbers or rectangular nested arrays. Only `loc` and
//! `scale` are required.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sinharc_core::tensor::{self, Tensor};
use sinharc_core::{Error, Result};

use crate::normal::Normal;
use crate::parameter_properties::constrain_parameters;
use crate::sinh_arcsinh::SinhArcsinh;

fn default_allow_nan_stats() -> bool {
    true
}

/// Base distribution choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum BaseSpec {
    /// Normal with the given `loc` and `scale`.
    Normal {
        /// Location (number or nested array).
        loc: Value,
        /// Scale (number or nested array).
        scale: Value,
    },
}

/// Serializable description of a [`SinhArcsinh`] distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionSpec {
    /// Location.
    pub loc: Value,
    /// Scale (positive).
    pub scale: Value,
    /// Skewness; defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skewness: Option<Value>,
    /// Tailweight (positive); defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tailweight: Option<Value>,
    /// Base distribution; defaults to a standard Normal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<BaseSpec>,
    /// Run parameter checks.
    #[serde(default)]
    pub validate_args: bool,
    /// Report undefined statistics as NaN.
    #[serde(default = "default_allow_nan_stats")]
    pub allow_nan_stats: bool,
    /// Distribution name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DistributionSpec {
    /// Parse a spec from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a spec from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Decoded parameter tensors; omitted optional parameters are absent.
    pub fn parameter_tensors(&self) -> Result<BTreeMap<String, Tensor>> {
        let mut out = BTreeMap::new();
        out.insert("loc".to_string(), decode("loc", &self.loc)?);
        out.insert("scale".to_string(), decode("scale", &self.scale)?);
        if let Some(v) = &self.skewness {
            out.insert("skewness".to_string(), decode("skewness", v)?);
        }
        if let Some(v) = &self.tailweight {
            out.insert("tailweight".to_string(), decode("tailweight", v)?);
        }
        Ok(out)
    }

    /// Build the distribution with parameters taken as-is.
    pub fn build(&self) -> Result<SinhArcsinh> {
        self.build_from(self.parameter_tensors()?)
    }

    /// Build the distribution treating parameters as unconstrained reals,
    /// mapped through each parameter's default constraining bijector.
    pub fn build_unconstrained(&self) -> Result<SinhArcsinh> {
        let props = SinhArcsinh::parameter_properties();
        let constrained = constrain_parameters(&props, &self.parameter_tensors()?)?;
        self.build_from(constrained)
    }

    fn build_from(&self, mut params: BTreeMap<String, Tensor>) -> Result<SinhArcsinh> {
        let mut take = |name: &str| params.remove(name);
        let loc = take("loc").ok_or_else(|| missing("loc"))?;
        let scale = take("scale").ok_or_else(|| missing("scale"))?;
        let skewness = take("skewness");
        let tailweight = take("tailweight");

        let mut builder = SinhArcsinh::builder(loc, scale)
            .validate_args(self.validate_args)
            .allow_nan_stats(self.allow_nan_stats);
        if let Some(s) = skewness {
            builder = builder.skewness(s);
        }
        if let Some(t) = tailweight {
            builder = builder.tailweight(t);
        }
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(BaseSpec::Normal { loc, scale }) = &self.base {
            let base = Normal::new(decode("base.loc", loc)?, decode("base.scale", scale)?)
                .with_validate_args(self.validate_args)
                .with_allow_nan_stats(self.allow_nan_stats);
            builder = builder.distribution(Arc::new(base));
        }
        builder.build()
    }
}

fn decode(name: &str, value: &Value) -> Result<Tensor> {
    tensor::tensor_from_json(value).map_err(|e| match e {
        Error::Shape(msg) => Error::Shape(format!("{name}: {msg}")),
        Error::Validation(msg) => Error::Validation(format!("{name}: {msg}")),
        other => other,
    })
}

fn missing(name: &str) -> Error {
    Error::Validation(format!("missing required parameter '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sinharc_core::Distribution;

    #[test]
    fn test_minimal_spec_defaults() {
        let spec = DistributionSpec::from_json_str(r#"{"loc": 0.0, "scale": 1.0}"#).unwrap();
        assert!(!spec.validate_args);
        assert!(spec.allow_nan_stats);
        let d = spec.build().unwrap();
        assert_eq!(d.name(), "SinhArcsinh");
        assert_eq!(d.batch_shape().unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_full_spec() {
        let spec = DistributionSpec::from_json_str(
            r#"{
                "loc": [0.0, 1.0],
                "scale": 2.0,
                "skewness": 0.5,
                "tailweight": [[1.0], [1.5]],
                "base": {"normal": {"loc": 0.0, "scale": 1.0}},
                "validate_args": true,
                "name": "returns"
            }"#,
        )
        .unwrap();
        let d = spec.build().unwrap();
        assert_eq!(d.name(), "returns");
        assert!(d.validate_args());
        assert_eq!(d.batch_shape().unwrap(), vec![2, 2]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = DistributionSpec::from_json_str(r#"{"loc": 0.0, "scale": 1.0, "skew": 1.0}"#);
        assert!(matches!(err, Err(Error::Json(_))));

        let err = DistributionSpec::from_json_str(
            r#"{"loc": 0.0, "scale": 1.0, "base": {"normal": {"loc": 0, "scale": 1, "extra": 2}}}"#,
        );
        assert!(matches!(err, Err(Error::Json(_))));
        let ok = DistributionSpec::from_json_str(
            r#"{"loc": 0.0, "scale": 1.0, "base": {"normal": {"loc": 0, "scale": 1}}}"#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let spec = DistributionSpec::from_json_str(
            r#"{"loc": 0.0, "scale": [1.0, -1.0], "validate_args": true}"#,
        )
        .unwrap();
        assert!(matches!(spec.build(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_unconstrained_build_maps_through_softplus() {
        let spec = DistributionSpec::from_json_str(
            r#"{"loc": 0.5, "scale": -2.0, "tailweight": 0.0, "validate_args": true}"#,
        )
        .unwrap();
        let d = spec.build_unconstrained().unwrap();
        let scale = d.scale().value().unwrap().sum();
        let tailweight = d.tailweight().value().unwrap().sum();
        assert_relative_eq!(scale, crate::math::softplus(-2.0) + f64::EPSILON, epsilon = 1e-15);
        assert_relative_eq!(tailweight, 2.0f64.ln() + f64::EPSILON, epsilon = 1e-15);
        assert_relative_eq!(d.loc().value().unwrap().sum(), 0.5);
    }

    #[test]
    fn test_ragged_parameter_names_field() {
        let spec =
            DistributionSpec::from_json_str(r#"{"loc": [[0.0], [1.0, 2.0]], "scale": 1.0}"#).unwrap();
        let err = spec.build().unwrap_err();
        assert!(err.to_string().contains("loc"), "{err}");
    }
}
