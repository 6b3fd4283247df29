//! Reductions
//!
//! Per-axis and whole-array folds. Standard reductions propagate NaN; the
//! `nan*` variants substitute the operation's identity for NaN before
//! folding. Arg-reductions break ties toward the smallest index.

use num_complex::Complex64;
use strider_core::{DType, Error, Result};

use crate::array::Array;
use crate::ops::storage_truthy;
use crate::shape::Shape;
use crate::storage::{Kernel, Storage};

fn reduced_shape(shape: Shape, axis: Option<usize>) -> Result<Shape> {
    match axis {
        None => Ok(Shape::scalar()),
        Some(a) if a < 4 => {
            let mut dims = shape.0;
            dims[a] = 1;
            Ok(Shape(dims))
        }
        Some(a) => Err(Error::Arg(format!("axis {a} out of range"))),
    }
}

/// Fold every lane along `axis` (or the whole buffer) with `f`.
fn fold_lanes<T: Copy>(
    data: &[T],
    shape: Shape,
    axis: Option<usize>,
    init: T,
    f: impl Fn(T, T) -> T,
) -> Vec<T> {
    match axis {
        None => vec![data.iter().fold(init, |acc, &v| f(acc, v))],
        Some(a) => {
            let out_shape = {
                let mut dims = shape.0;
                dims[a] = 1;
                Shape(dims)
            };
            let n = shape.dim(a);
            (0..out_shape.elements())
                .map(|i| {
                    let mut c = out_shape.coords_of(i);
                    let mut acc = init;
                    for k in 0..n {
                        c[a] = k;
                        acc = f(acc, data[shape.index_of(c)]);
                    }
                    acc
                })
                .collect()
        }
    }
}

/// Arg-fold along `axis`: tracks value and the first index attaining it.
fn arg_fold_lanes(
    data: &[f64],
    shape: Shape,
    axis: Option<usize>,
    better: impl Fn(f64, f64) -> bool,
) -> (Vec<f64>, Vec<u32>) {
    let run = |lane: &mut dyn Iterator<Item = (usize, f64)>| -> (f64, u32) {
        let mut best_v = f64::NAN;
        let mut best_i = 0u32;
        let mut first = true;
        for (k, v) in lane {
            if first || (!v.is_nan() && (best_v.is_nan() || better(v, best_v))) {
                best_v = v;
                best_i = k as u32;
                first = false;
            }
        }
        (best_v, best_i)
    };
    match axis {
        None => {
            let (v, i) = run(&mut data.iter().copied().enumerate());
            (vec![v], vec![i])
        }
        Some(a) => {
            let out_shape = {
                let mut dims = shape.0;
                dims[a] = 1;
                Shape(dims)
            };
            let n = shape.dim(a);
            let mut values = Vec::with_capacity(out_shape.elements());
            let mut indices = Vec::with_capacity(out_shape.elements());
            for i in 0..out_shape.elements() {
                let mut c = out_shape.coords_of(i);
                let mut lane = (0..n).map(|k| {
                    c[a] = k;
                    (k, data[shape.index_of(c)])
                });
                let (v, idx) = run(&mut lane);
                values.push(v);
                indices.push(idx);
            }
            (values, indices)
        }
    }
}

macro_rules! arith_reduction {
    ($(#[$meta:meta])* $name:ident, $nan_name:ident, $identity:expr, $fold:expr, $cfold:expr, $nan_note:expr) => {
        $(#[$meta])*
        pub fn $name(&self, axis: Option<usize>) -> Result<Array> {
            self.arith_reduce(axis, $identity, $fold, $cfold, false)
        }

        #[doc = $nan_note]
        pub fn $nan_name(&self, axis: Option<usize>) -> Result<Array> {
            self.arith_reduce(axis, $identity, $fold, $cfold, true)
        }
    };
}

impl Array {
    fn arith_reduce(
        &self,
        axis: Option<usize>,
        identity: f64,
        fold: fn(f64, f64) -> f64,
        complex_fold: fn(Complex64, Complex64) -> Complex64,
        skip_nan: bool,
    ) -> Result<Array> {
        let out_shape = reduced_shape(self.shape(), axis)?;
        let shape = self.shape();
        // sums and products of booleans widen so counts are representable
        let out_dtype = match self.dtype() {
            DType::B8 => DType::U32,
            other => other,
        };
        let storage = self.with_storage(|s| -> Storage {
            match s.to_kernel() {
                Kernel::Cplx(d) => {
                    let init = Complex64::new(identity, 0.0);
                    let folded = fold_lanes(&d, shape, axis, init, |a, b| {
                        let b = if skip_nan && (b.re.is_nan() || b.im.is_nan()) { init } else { b };
                        complex_fold(a, b)
                    });
                    Storage::from_complex_vec(out_dtype, folded)
                }
                Kernel::Bool(d) => {
                    let reals: Vec<f64> = d.into_iter().map(|v| if v { 1.0 } else { 0.0 }).collect();
                    let folded = fold_lanes(&reals, shape, axis, identity, fold);
                    Storage::from_real_vec(out_dtype, folded)
                }
                Kernel::Int(d) => {
                    let reals: Vec<f64> = d.into_iter().map(|v| v as f64).collect();
                    let folded = fold_lanes(&reals, shape, axis, identity, fold);
                    Storage::from_real_vec(out_dtype, folded)
                }
                Kernel::UInt(d) => {
                    let reals: Vec<f64> = d.into_iter().map(|v| v as f64).collect();
                    let folded = fold_lanes(&reals, shape, axis, identity, fold);
                    Storage::from_real_vec(out_dtype, folded)
                }
                Kernel::Real(d) => {
                    let folded = fold_lanes(&d, shape, axis, identity, |a, b| {
                        let b = if skip_nan && b.is_nan() { identity } else { b };
                        fold(a, b)
                    });
                    Storage::from_real_vec(out_dtype, folded)
                }
            }
        })?;
        Array::from_storage(storage, out_shape)
    }

    arith_reduction!(
        /// Sum along an axis, or over the whole array with `None`.
        sum, nansum, 0.0, |a, b| a + b, |a, b| a + b,
        "Sum that treats NaN as 0."
    );
    arith_reduction!(
        /// Product along an axis, or over the whole array with `None`.
        product, nanproduct, 1.0, |a, b| a * b, |a, b| a * b,
        "Product that treats NaN as 1."
    );

    fn minmax_reduce(&self, axis: Option<usize>, is_min: bool, skip_nan: bool) -> Result<Array> {
        if self.dtype().is_complex() {
            return Err(Error::Type("min/max are not defined for complex arrays".into()));
        }
        let out_shape = reduced_shape(self.shape(), axis)?;
        let shape = self.shape();
        let identity = if is_min { f64::INFINITY } else { f64::NEG_INFINITY };
        let data = self.with_storage(|s| s.to_real_vec())??;
        let folded = fold_lanes(&data, shape, axis, identity, |a, b| {
            if skip_nan && b.is_nan() {
                return a;
            }
            if a.is_nan() || b.is_nan() {
                return f64::NAN;
            }
            if is_min {
                a.min(b)
            } else {
                a.max(b)
            }
        });
        let storage = Storage::from_real_vec(self.dtype(), folded);
        Array::from_storage(storage, out_shape)
    }

    /// Minimum along an axis; NaN operands poison the lane.
    pub fn min(&self, axis: Option<usize>) -> Result<Array> {
        self.minmax_reduce(axis, true, false)
    }

    /// Maximum along an axis; NaN operands poison the lane.
    pub fn max(&self, axis: Option<usize>) -> Result<Array> {
        self.minmax_reduce(axis, false, false)
    }

    /// Minimum ignoring NaN entries.
    pub fn nanmin(&self, axis: Option<usize>) -> Result<Array> {
        self.minmax_reduce(axis, true, true)
    }

    /// Maximum ignoring NaN entries.
    pub fn nanmax(&self, axis: Option<usize>) -> Result<Array> {
        self.minmax_reduce(axis, false, true)
    }

    fn truthy_reduce(
        &self,
        axis: Option<usize>,
        init: f64,
        f: fn(f64, bool) -> f64,
        out_dtype: DType,
    ) -> Result<Array> {
        let out_shape = reduced_shape(self.shape(), axis)?;
        let shape = self.shape();
        let flags = self.with_storage(storage_truthy)?;
        let numeric: Vec<f64> = flags.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
        let folded = fold_lanes(&numeric, shape, axis, init, move |acc, v| f(acc, v != 0.0));
        Array::from_storage(Storage::from_real_vec(out_dtype, folded), out_shape)
    }

    /// True where any element of the lane is truthy.
    pub fn any(&self, axis: Option<usize>) -> Result<Array> {
        self.truthy_reduce(axis, 0.0, |acc, v| if v { 1.0 } else { acc }, DType::B8)
    }

    /// True where every element of the lane is truthy.
    pub fn all(&self, axis: Option<usize>) -> Result<Array> {
        self.truthy_reduce(axis, 1.0, |acc, v| if v { acc } else { 0.0 }, DType::B8)
    }

    /// Count of truthy elements per lane.
    pub fn count(&self, axis: Option<usize>) -> Result<Array> {
        self.truthy_reduce(axis, 0.0, |acc, v| if v { acc + 1.0 } else { acc }, DType::U32)
    }

    /// Minimum and its first position per lane.
    pub fn imin(&self, axis: Option<usize>) -> Result<(Array, Array)> {
        self.arg_reduce(axis, |a, b| a < b)
    }

    /// Maximum and its first position per lane.
    pub fn imax(&self, axis: Option<usize>) -> Result<(Array, Array)> {
        self.arg_reduce(axis, |a, b| a > b)
    }

    fn arg_reduce(
        &self,
        axis: Option<usize>,
        better: impl Fn(f64, f64) -> bool,
    ) -> Result<(Array, Array)> {
        if self.dtype().is_complex() {
            return Err(Error::Type("arg-reductions are not defined for complex arrays".into()));
        }
        let out_shape = reduced_shape(self.shape(), axis)?;
        let shape = self.shape();
        let data = self.with_storage(|s| s.to_real_vec())??;
        let (values, indices) = arg_fold_lanes(&data, shape, axis, better);
        let values = Array::from_storage(Storage::from_real_vec(self.dtype(), values), out_shape)?;
        let indices = Array::from_storage(Storage::U32(indices), out_shape)?;
        Ok((values, indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat() -> Array {
        Array::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap()
    }

    #[test]
    fn sum_per_axis_and_total() {
        let m = mat();
        let cols = m.sum(Some(0)).unwrap();
        assert_eq!(cols.host_vec::<f64>().unwrap(), vec![3.0, 7.0, 11.0]);
        let rows = m.sum(Some(1)).unwrap();
        assert_eq!(rows.host_vec::<f64>().unwrap(), vec![9.0, 12.0]);
        assert_eq!(m.sum(None).unwrap().scalar::<f64>().unwrap(), 21.0);
    }

    #[test]
    fn nan_handling() {
        let v = Array::from_vector(&[1.0, f64::NAN, 2.0]).unwrap();
        assert!(v.sum(None).unwrap().scalar::<f64>().unwrap().is_nan());
        assert_eq!(v.nansum(None).unwrap().scalar::<f64>().unwrap(), 3.0);
        assert!(v.min(None).unwrap().scalar::<f64>().unwrap().is_nan());
        assert_eq!(v.nanmin(None).unwrap().scalar::<f64>().unwrap(), 1.0);
        assert_eq!(v.nanproduct(None).unwrap().scalar::<f64>().unwrap(), 2.0);
    }

    #[test]
    fn logical_reductions() {
        let v = Array::from_vector(&[0.0, 2.0, 0.0]).unwrap();
        assert!(v.any(None).unwrap().scalar::<bool>().unwrap());
        assert!(!v.all(None).unwrap().scalar::<bool>().unwrap());
        assert_eq!(v.count(None).unwrap().scalar::<u32>().unwrap(), 1);
    }

    #[test]
    fn bool_sum_widens() {
        let v = Array::from_vector(&[true, true, false]).unwrap();
        let s = v.sum(None).unwrap();
        assert_eq!(s.dtype(), DType::U32);
        assert_eq!(s.scalar::<u32>().unwrap(), 2);
    }

    #[test]
    fn arg_reductions_break_ties_low() {
        let v = Array::from_vector(&[3.0, 1.0, 1.0, 5.0]).unwrap();
        let (val, idx) = v.imin(None).unwrap();
        assert_eq!(val.scalar::<f64>().unwrap(), 1.0);
        assert_eq!(idx.scalar::<u32>().unwrap(), 1);
        let (val, idx) = v.imax(None).unwrap();
        assert_eq!(val.scalar::<f64>().unwrap(), 5.0);
        assert_eq!(idx.scalar::<u32>().unwrap(), 3);
    }

    #[test]
    fn axis_minmax_shapes() {
        let m = mat();
        let mx = m.max(Some(0)).unwrap();
        assert_eq!(mx.dims(), [1, 3, 1, 1]);
        assert_eq!(mx.host_vec::<f64>().unwrap(), vec![2.0, 4.0, 6.0]);
    }
}
