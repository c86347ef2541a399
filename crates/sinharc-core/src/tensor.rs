//! Dense `f64` tensors and the NumPy-style broadcasting used by every
//! distribution and bijector in sinharc.
//!
//! Storage is plain [`ndarray::ArrayD`]; this module only adds the pieces we
//! need on top: shape broadcasting, elementwise maps over co-broadcast inputs,
//! and conversion to and from JSON.

use ndarray::{Array1, ArrayD, ArrayViewD, IxDyn, Zip};
use serde_json::Value;

use crate::{Error, Result};

/// Dense, dynamically-ranked `f64` tensor.
pub type Tensor = ArrayD<f64>;

/// Rank-0 tensor holding `v`.
pub fn scalar(v: f64) -> Tensor {
    ArrayD::from_elem(IxDyn(&[]), v)
}

/// Tensor of the given shape filled with `v`.
pub fn full(shape: &[usize], v: f64) -> Tensor {
    ArrayD::from_elem(IxDyn(shape), v)
}

/// Rank-1 tensor from a vector.
pub fn from_vec(values: Vec<f64>) -> Tensor {
    Array1::from(values).into_dyn()
}

/// Tensor with an explicit shape; `values.len()` must equal the shape's product.
pub fn from_shape_vec(shape: &[usize], values: Vec<f64>) -> Result<Tensor> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| Error::Shape(format!("cannot build tensor of shape {shape:?}: {e}")))
}

/// Broadcast a list of shapes together (right-aligned, size-1 axes stretch).
///
/// An empty list broadcasts to the scalar shape `[]`.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>> {
    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; rank];
    for s in shapes {
        let offset = rank - s.len();
        for (i, &d) in s.iter().enumerate() {
            let o = &mut out[offset + i];
            if *o == d || d == 1 {
                continue;
            }
            if *o == 1 {
                *o = d;
                continue;
            }
            return Err(Error::Shape(format!("incompatible shapes for broadcasting: {shapes:?}")));
        }
    }
    Ok(out)
}

/// Broadcast view of `t` with the target shape.
pub fn broadcast_view<'a>(t: &'a Tensor, shape: &[usize]) -> Result<ArrayViewD<'a, f64>> {
    t.broadcast(IxDyn(shape)).ok_or_else(|| {
        Error::Shape(format!("cannot broadcast shape {:?} to {:?}", t.shape(), shape))
    })
}

/// Owned copy of `t` broadcast to `shape`.
pub fn broadcast_to(t: &Tensor, shape: &[usize]) -> Result<Tensor> {
    Ok(broadcast_view(t, shape)?.to_owned())
}

/// Apply `f` elementwise over `a` and `b` after broadcasting them together.
pub fn map2<F>(a: &Tensor, b: &Tensor, f: F) -> Result<Tensor>
where
    F: Fn(f64, f64) -> f64,
{
    let shape = broadcast_shapes(&[a.shape(), b.shape()])?;
    let av = broadcast_view(a, &shape)?;
    let bv = broadcast_view(b, &shape)?;
    Ok(Zip::from(av).and(bv).map_collect(|&x, &y| f(x, y)))
}

/// Three-input version of [`map2`].
pub fn map3<F>(a: &Tensor, b: &Tensor, c: &Tensor, f: F) -> Result<Tensor>
where
    F: Fn(f64, f64, f64) -> f64,
{
    let shape = broadcast_shapes(&[a.shape(), b.shape(), c.shape()])?;
    let av = broadcast_view(a, &shape)?;
    let bv = broadcast_view(b, &shape)?;
    let cv = broadcast_view(c, &shape)?;
    Ok(Zip::from(av).and(bv).and(cv).map_collect(|&x, &y, &z| f(x, y, z)))
}

/// Four-input version of [`map2`].
pub fn map4<F>(a: &Tensor, b: &Tensor, c: &Tensor, d: &Tensor, f: F) -> Result<Tensor>
where
    F: Fn(f64, f64, f64, f64) -> f64,
{
    let shape = broadcast_shapes(&[a.shape(), b.shape(), c.shape(), d.shape()])?;
    let av = broadcast_view(a, &shape)?;
    let bv = broadcast_view(b, &shape)?;
    let cv = broadcast_view(c, &shape)?;
    let dv = broadcast_view(d, &shape)?;
    Ok(Zip::from(av).and(bv).and(cv).and(dv).map_collect(|&w, &x, &y, &z| f(w, x, y, z)))
}

/// Elementwise `if cond > 0 { a } else { b }` over co-broadcast inputs.
pub fn select_positive(cond: &Tensor, a: &Tensor, b: &Tensor) -> Result<Tensor> {
    map3(cond, a, b, |c, x, y| if c > 0.0 { x } else { y })
}

/// Parse a JSON number or rectangular nested array into a tensor.
///
/// The strings `"inf"`, `"-inf"` and `"nan"` decode to the matching non-finite
/// values, mirroring [`tensor_to_json`]. `null` also decodes as `NaN`.
pub fn tensor_from_json(value: &Value) -> Result<Tensor> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }
    let mut data = Vec::with_capacity(shape.iter().product());
    flatten_json(value, &shape, 0, &mut data)?;
    from_shape_vec(&shape, data)
}

fn flatten_json(value: &Value, shape: &[usize], depth: usize, out: &mut Vec<f64>) -> Result<()> {
    match value {
        Value::Number(n) if depth == shape.len() => {
            let v = n
                .as_f64()
                .ok_or_else(|| Error::Validation(format!("number {n} is not representable as f64")))?;
            out.push(v);
            Ok(())
        }
        Value::Null if depth == shape.len() => {
            out.push(f64::NAN);
            Ok(())
        }
        Value::String(text) if depth == shape.len() => {
            let v = non_finite_from_str(text).ok_or_else(|| {
                Error::Validation(format!("expected a number, \"inf\", \"-inf\" or \"nan\", got {text:?}"))
            })?;
            out.push(v);
            Ok(())
        }
        Value::Array(items) if depth < shape.len() && items.len() == shape[depth] => {
            for item in items {
                flatten_json(item, shape, depth + 1, out)?;
            }
            Ok(())
        }
        Value::Number(_) | Value::Null | Value::Array(_) | Value::String(_) => Err(Error::Shape(format!(
            "ragged nested array: expected rectangular shape {shape:?}"
        ))),
        other => Err(Error::Validation(format!("expected a number or an array, got {other}"))),
    }
}

fn non_finite_from_str(text: &str) -> Option<f64> {
    match text {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    }
}

fn scalar_to_json(x: f64) -> Value {
    match serde_json::Number::from_f64(x) {
        Some(n) => Value::Number(n),
        None if x.is_nan() => Value::from("nan"),
        None if x > 0.0 => Value::from("inf"),
        None => Value::from("-inf"),
    }
}

/// Render a tensor as a JSON number (rank 0) or nested array.
///
/// JSON has no non-finite numbers, so those are written as the strings
/// `"inf"`, `"-inf"` and `"nan"`.
pub fn tensor_to_json(t: &Tensor) -> Value {
    view_to_json(t.view())
}

fn view_to_json(v: ArrayViewD<'_, f64>) -> Value {
    if v.ndim() == 0 {
        return scalar_to_json(v.iter().next().copied().unwrap_or(f64::NAN));
    }
    Value::Array(v.outer_iter().map(view_to_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_broadcast_shapes_numpy_rules() {
        let params: [&[usize]; 4] = [&[2, 1], &[3], &[], &[1, 3]];
        assert_eq!(broadcast_shapes(&params).unwrap(), vec![2, 3]);
        let stretch: [&[usize]; 2] = [&[4, 1, 5], &[7, 1]];
        assert_eq!(broadcast_shapes(&stretch).unwrap(), vec![4, 7, 5]);
        let empty_axis: [&[usize]; 2] = [&[0], &[1]];
        assert_eq!(broadcast_shapes(&empty_axis).unwrap(), vec![0]);
        assert_eq!(broadcast_shapes(&[]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_broadcast_shapes_incompatible() {
        let shapes: [&[usize]; 2] = [&[2], &[3]];
        let err = broadcast_shapes(&shapes).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_map2_broadcasts_both_sides() {
        let a = from_shape_vec(&[2, 1], vec![1.0, 2.0]).unwrap();
        let b = from_vec(vec![10.0, 20.0, 30.0]);
        let c = map2(&a, &b, |x, y| x + y).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert_relative_eq!(c[[1, 2]], 32.0);
        assert_relative_eq!(c[[0, 0]], 11.0);
    }

    #[test]
    fn test_map4_with_scalars() {
        let s = scalar(2.0);
        let v = from_vec(vec![1.0, 2.0]);
        let out = map4(&s, &v, &s, &s, |a, b, c, d| a * b + c - d).unwrap();
        assert_eq!(out.shape(), &[2]);
        assert_relative_eq!(out[[1]], 4.0);
    }

    #[test]
    fn test_select_positive() {
        let cond = from_vec(vec![1.0, -1.0]);
        let out = select_positive(&cond, &scalar(5.0), &scalar(7.0)).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[5.0, 7.0]);
    }

    #[test]
    fn test_json_nested_arrays() {
        let t = tensor_from_json(&json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_relative_eq!(t[[1, 0]], 4.0);
        assert_eq!(tensor_to_json(&t), json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]));
    }

    #[test]
    fn test_json_scalar_and_null() {
        let t = tensor_from_json(&json!(2.5)).unwrap();
        assert_eq!(t.ndim(), 0);
        assert_eq!(tensor_to_json(&t), json!(2.5));

        let n = tensor_from_json(&json!([null, 1.0])).unwrap();
        assert!(n[[0]].is_nan());
        assert_eq!(tensor_to_json(&n), json!(["nan", 1.0]));
    }

    #[test]
    fn test_json_non_finite_roundtrip() {
        let t = from_vec(vec![f64::NEG_INFINITY, 0.5, f64::INFINITY, f64::NAN]);
        let encoded = tensor_to_json(&t);
        assert_eq!(encoded, json!(["-inf", 0.5, "inf", "nan"]));

        let back = tensor_from_json(&encoded).unwrap();
        assert_eq!(back[[0]], f64::NEG_INFINITY);
        assert_eq!(back[[1]], 0.5);
        assert_eq!(back[[2]], f64::INFINITY);
        assert!(back[[3]].is_nan());

        assert_eq!(tensor_from_json(&json!("+inf")).unwrap().sum(), f64::INFINITY);
        assert!(matches!(tensor_from_json(&json!(["inf", "infinity"])), Err(Error::Validation(_))));
    }

    #[test]
    fn test_json_ragged_rejected() {
        assert!(matches!(tensor_from_json(&json!([[1.0], [2.0, 3.0]])), Err(Error::Shape(_))));
        assert!(matches!(tensor_from_json(&json!("x")), Err(Error::Validation(_))));
    }
}
