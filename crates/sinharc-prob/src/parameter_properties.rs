//! Declarative per-parameter metadata.
//!
//! Distributions publish a [`ParameterProperties`] record for each parameter so
//! generic code (optimizers, samplers, the CLI's `--unconstrained` mode) can
//! map unconstrained reals onto valid parameter values without knowing the
//! distribution's constraints.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sinharc_core::{Bijector, Error, Result, Tensor};

use crate::transforms::{Identity, Softplus};

/// Factory for a parameter's default constraining bijector.
pub type BijectorFn = fn() -> Arc<dyn Bijector>;

/// Metadata describing one distribution parameter.
#[derive(Clone, Copy)]
pub struct ParameterProperties {
    /// Number of rightmost dimensions that form a single parameter value.
    pub event_ndims: usize,
    /// Whether this is the preferred parameterization when several are accepted.
    pub is_preferred: bool,
    /// Maps unconstrained reals onto the parameter's support. `None` means identity.
    pub default_constraining_bijector_fn: Option<BijectorFn>,
}

impl Default for ParameterProperties {
    fn default() -> Self {
        Self { event_ndims: 0, is_preferred: true, default_constraining_bijector_fn: None }
    }
}

impl ParameterProperties {
    /// Unconstrained real parameter.
    pub fn real() -> Self {
        Self::default()
    }

    /// Strictly positive parameter, constrained by softplus with a floor of `f64::EPSILON`.
    pub fn positive() -> Self {
        Self { default_constraining_bijector_fn: Some(positive_softplus), ..Self::default() }
    }

    /// Instantiate the default constraining bijector.
    pub fn default_constraining_bijector(&self) -> Arc<dyn Bijector> {
        match self.default_constraining_bijector_fn {
            Some(f) => f(),
            None => Arc::new(Identity::new()),
        }
    }
}

impl fmt::Debug for ParameterProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterProperties")
            .field("event_ndims", &self.event_ndims)
            .field("is_preferred", &self.is_preferred)
            .field("default_constraining_bijector", &self.default_constraining_bijector().name())
            .finish()
    }
}

fn positive_softplus() -> Arc<dyn Bijector> {
    Arc::new(Softplus::with_low(f64::EPSILON))
}

/// Map unconstrained parameter tensors through each parameter's constraining bijector.
///
/// Names absent from `unconstrained` are skipped; names not in `properties` are an error.
pub fn constrain_parameters(
    properties: &[(&str, ParameterProperties)],
    unconstrained: &BTreeMap<String, Tensor>,
) -> Result<BTreeMap<String, Tensor>> {
    let mut out = BTreeMap::new();
    for (name, raw) in unconstrained {
        let props = properties
            .iter()
            .find(|(n, _)| *n == name.as_str())
            .map(|(_, p)| p)
            .ok_or_else(|| Error::Validation(format!("unknown parameter '{name}'")))?;
        out.insert(name.clone(), props.default_constraining_bijector().forward(raw)?);
    }
    Ok(out)
}
