//! Probability building blocks for sinharc.
//!
//! This crate hosts the SinhArcsinh distribution and everything it is built from:
//! - base distributions ([`normal::Normal`])
//! - elementwise bijectors ([`transforms`])
//! - the change-of-variables engine ([`transformed::TransformedDistribution`])
//! - per-parameter constraint metadata ([`parameter_properties`])
//! - a serde spec for building distributions from JSON ([`spec`])
//! - small numeric helpers (stable log/exp/sigmoid and Normal tail primitives)

pub mod distributions;
pub mod math;
pub mod normal;
pub mod parameter_properties;
pub mod sinh_arcsinh;
pub mod spec;
pub mod transformed;
pub mod transforms;

pub use normal::Normal;
pub use parameter_properties::{ParameterProperties, constrain_parameters};
pub use sinh_arcsinh::{SinhArcsinh, SinhArcsinhBuilder};
pub use spec::{BaseSpec, DistributionSpec};
pub use transformed::TransformedDistribution;
