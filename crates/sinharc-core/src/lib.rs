//! # sinharc-core
//!
//! Core building blocks shared by the sinharc crates:
//! - [`Error`] / [`Result`]
//! - [`Tensor`] plus NumPy-style broadcasting helpers
//! - [`DeferredTensor`] / [`Variable`] parameter handles that are read at use time
//! - the [`Distribution`] and [`Bijector`] traits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod deferred;
pub mod error;
pub mod tensor;
pub mod traits;

pub use deferred::{DeferredTensor, Variable};
pub use error::{Error, Result};
pub use tensor::Tensor;
pub use traits::{Bijector, Distribution, ReparameterizationType};
