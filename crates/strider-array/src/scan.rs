//! Scans
//!
//! Inclusive/exclusive prefix folds along an axis, plus the by-key variants
//! whose accumulation restarts at every boundary between runs of equal keys.

use strider_core::{DType, Error, Result};

use crate::array::Array;
use crate::shape::Shape;
use crate::storage::Storage;

/// Binary operation driving a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    Add,
    Mul,
    Min,
    Max,
}

impl ScanOp {
    fn identity(&self) -> f64 {
        match self {
            ScanOp::Add => 0.0,
            ScanOp::Mul => 1.0,
            ScanOp::Min => f64::INFINITY,
            ScanOp::Max => f64::NEG_INFINITY,
        }
    }

    fn fold(&self, a: f64, b: f64) -> f64 {
        match self {
            ScanOp::Add => a + b,
            ScanOp::Mul => a * b,
            ScanOp::Min => a.min(b),
            ScanOp::Max => a.max(b),
        }
    }
}

impl Array {
    /// Prefix fold along `axis`. Exclusive scans shift the lane by one and
    /// seed with the operation identity.
    pub fn scan(&self, axis: usize, op: ScanOp, inclusive: bool) -> Result<Array> {
        self.scan_impl(axis, op, inclusive, None)
    }

    /// Scan that restarts at each boundary between runs of equal keys.
    pub fn scan_by_key(
        &self,
        keys: &Array,
        axis: usize,
        op: ScanOp,
        inclusive: bool,
    ) -> Result<Array> {
        if keys.elements() != self.dim(axis) {
            return Err(Error::Shape(format!(
                "key vector of {} entries cannot segment axis {axis} of size {}",
                keys.elements(),
                self.dim(axis)
            )));
        }
        let key_vals = keys.host_vec::<i64>()?;
        self.scan_impl(axis, op, inclusive, Some(&key_vals))
    }

    /// Segmented reduction along the first axis: contiguous runs of equal
    /// keys collapse to one row each. Returns `(segment_keys, values)`.
    pub fn reduce_by_key(&self, keys: &Array, op: ScanOp) -> Result<(Array, Array)> {
        if self.dtype().is_complex() {
            return Err(Error::Type("by-key reductions are not defined for complex arrays".into()));
        }
        let n = self.dim(0);
        if keys.elements() != n {
            return Err(Error::Shape(format!(
                "key vector of {} entries cannot segment {} rows",
                keys.elements(),
                n
            )));
        }
        let key_vals = keys.host_vec::<i64>()?;
        let mut boundaries = vec![0usize];
        for i in 1..n {
            if key_vals[i] != key_vals[i - 1] {
                boundaries.push(i);
            }
        }
        let segments = boundaries.len();
        let cols = self.elements() / n;
        let data = self.with_storage(|s| s.to_real_vec())??;

        let mut out = vec![0.0f64; segments * cols];
        for c in 0..cols {
            for (seg, &start) in boundaries.iter().enumerate() {
                let end = boundaries.get(seg + 1).copied().unwrap_or(n);
                let mut acc = op.identity();
                for r in start..end {
                    acc = op.fold(acc, data[c * n + r]);
                }
                out[c * segments + seg] = acc;
            }
        }

        let seg_keys: Vec<i64> = boundaries.iter().map(|&b| key_vals[b]).collect();
        let out_dtype = match self.dtype() {
            DType::B8 => DType::U32,
            other => other,
        };
        let mut dims = self.dims();
        dims[0] = segments;
        Ok((
            Array::from_storage(Storage::from_int_vec(keys.dtype(), seg_keys), Shape::vector(segments))?,
            Array::from_storage(Storage::from_real_vec(out_dtype, out), Shape(dims))?,
        ))
    }

    fn scan_impl(
        &self,
        axis: usize,
        op: ScanOp,
        inclusive: bool,
        keys: Option<&[i64]>,
    ) -> Result<Array> {
        if axis >= 4 {
            return Err(Error::Arg(format!("axis {axis} out of range")));
        }
        if self.dtype().is_complex() {
            return Err(Error::Type("scans are not defined for complex arrays".into()));
        }
        let shape = self.shape();
        let data = self.with_storage(|s| s.to_real_vec())??;
        let n = shape.dim(axis);

        let lane_shape = {
            let mut dims = shape.0;
            dims[axis] = 1;
            Shape(dims)
        };
        let mut out = vec![0.0f64; shape.elements()];
        for lane in 0..lane_shape.elements() {
            let mut c = lane_shape.coords_of(lane);
            let mut acc = op.identity();
            for k in 0..n {
                c[axis] = k;
                let idx = shape.index_of(c);
                if let Some(keys) = keys {
                    if k > 0 && keys[k] != keys[k - 1] {
                        acc = op.identity();
                    }
                }
                if inclusive {
                    acc = op.fold(acc, data[idx]);
                    out[idx] = acc;
                } else {
                    out[idx] = acc;
                    acc = op.fold(acc, data[idx]);
                }
            }
        }

        let out_dtype = match self.dtype() {
            DType::B8 => DType::U32,
            other => other,
        };
        Array::from_storage(Storage::from_real_vec(out_dtype, out), shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_prefix_sum() {
        let v = Array::from_vector(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let s = v.scan(0, ScanOp::Add, true).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![1.0, 3.0, 6.0, 10.0]);
    }

    #[test]
    fn exclusive_prefix_sum_seeds_identity() {
        let v = Array::from_vector(&[1.0, 2.0, 3.0]).unwrap();
        let s = v.scan(0, ScanOp::Add, false).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn running_extrema() {
        let v = Array::from_vector(&[3.0, 1.0, 2.0]).unwrap();
        let mn = v.scan(0, ScanOp::Min, true).unwrap();
        assert_eq!(mn.host_vec::<f64>().unwrap(), vec![3.0, 1.0, 1.0]);
        let mx = v.scan(0, ScanOp::Max, true).unwrap();
        assert_eq!(mx.host_vec::<f64>().unwrap(), vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn by_key_restarts_segments() {
        let v = Array::from_vector(&[1.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let k = Array::from_slice(&[0i32, 0, 1, 1, 1], &[5]).unwrap();
        let s = v.scan_by_key(&k, 0, ScanOp::Add, true).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn reduce_by_key_collapses_runs() {
        let v = Array::from_vector(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let k = Array::from_slice(&[7i32, 7, 9, 9, 7], &[5]).unwrap();
        let (keys, sums) = v.reduce_by_key(&k, ScanOp::Add).unwrap();
        assert_eq!(keys.host_vec::<i32>().unwrap(), vec![7, 9, 7]);
        assert_eq!(sums.host_vec::<f64>().unwrap(), vec![3.0, 7.0, 5.0]);
    }

    #[test]
    fn per_column_scan() {
        let m = Array::from_slice(&[1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let s = m.scan(0, ScanOp::Add, true).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![1.0, 3.0, 3.0, 7.0]);
    }
}
