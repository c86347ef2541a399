//! Deferred parameter handles.
//!
//! Distribution parameters are captured as [`DeferredTensor`]s and read every
//! time they are used. A constant is a frozen snapshot; a [`Variable`] is a
//! shared handle whose value may be reassigned after the distribution is built,
//! and every subsequent evaluation observes the new value.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::tensor::{self, Tensor};
use crate::{Error, Result};

/// Shared, reassignable tensor.
///
/// Clones share the same storage.
#[derive(Clone)]
pub struct Variable {
    name: Arc<str>,
    value: Arc<RwLock<Tensor>>,
}

impl Variable {
    /// Create a variable with an initial value.
    pub fn new(name: impl Into<String>, initial: Tensor) -> Self {
        let name: String = name.into();
        Self { name: name.into(), value: Arc::new(RwLock::new(initial)) }
    }

    /// Create a rank-0 variable.
    pub fn scalar(name: impl Into<String>, initial: f64) -> Self {
        Self::new(name, tensor::scalar(initial))
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current value.
    pub fn read(&self) -> Result<Tensor> {
        self.value.read().map(|v| v.clone()).map_err(|_| self.poisoned())
    }

    /// Shape of the current value.
    pub fn shape(&self) -> Result<Vec<usize>> {
        self.value.read().map(|v| v.shape().to_vec()).map_err(|_| self.poisoned())
    }

    /// Replace the current value. The shape may change.
    pub fn assign(&self, value: Tensor) -> Result<()> {
        let mut guard = self.value.write().map_err(|_| self.poisoned())?;
        *guard = value;
        Ok(())
    }

    fn poisoned(&self) -> Error {
        Error::Computation(format!("variable '{}' lock poisoned", self.name))
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.shape().ok();
        f.debug_struct("Variable").field("name", &self.name).field("shape", &shape).finish()
    }
}

/// A tensor parameter that is resolved when used rather than when captured.
#[derive(Debug, Clone)]
pub enum DeferredTensor {
    /// Frozen value.
    Constant(Arc<Tensor>),
    /// Live handle; read on every access.
    Variable(Variable),
}

impl DeferredTensor {
    /// Wrap a constant tensor.
    pub fn constant(value: Tensor) -> Self {
        Self::Constant(Arc::new(value))
    }

    /// Wrap a rank-0 constant.
    pub fn scalar(value: f64) -> Self {
        Self::constant(tensor::scalar(value))
    }

    /// Current value.
    pub fn value(&self) -> Result<Tensor> {
        match self {
            Self::Constant(t) => Ok(t.as_ref().clone()),
            Self::Variable(v) => v.read(),
        }
    }

    /// Current shape.
    pub fn shape(&self) -> Result<Vec<usize>> {
        match self {
            Self::Constant(t) => Ok(t.shape().to_vec()),
            Self::Variable(v) => v.shape(),
        }
    }

    /// Current rank.
    pub fn rank(&self) -> Result<usize> {
        Ok(self.shape()?.len())
    }

    /// `true` if this parameter tracks a [`Variable`].
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }
}

impl From<f64> for DeferredTensor {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<f64>> for DeferredTensor {
    fn from(values: Vec<f64>) -> Self {
        Self::constant(tensor::from_vec(values))
    }
}

impl From<Tensor> for DeferredTensor {
    fn from(value: Tensor) -> Self {
        Self::constant(value)
    }
}

impl From<Variable> for DeferredTensor {
    fn from(value: Variable) -> Self {
        Self::Variable(value)
    }
}

impl From<&Variable> for DeferredTensor {
    fn from(value: &Variable) -> Self {
        Self::Variable(value.clone())
    }
}
