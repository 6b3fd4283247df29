//! Array factories
//!
//! Free functions mirroring the construction surface: constants, ramps,
//! identities and spaced grids. Every factory routes its dtype through the
//! device capability policy.

use strider_core::{DType, Error, Result};

use crate::array::Array;
use crate::shape::Shape;
use crate::storage::Storage;

/// Constant-filled array.
pub fn full(dims: &[usize], fill: f64, dtype: DType) -> Result<Array> {
    Array::constant(fill, dims, dtype)
}

pub fn zeros(dims: &[usize], dtype: DType) -> Result<Array> {
    Array::zeros(dims, dtype)
}

pub fn ones(dims: &[usize], dtype: DType) -> Result<Array> {
    Array::ones(dims, dtype)
}

pub fn empty(dims: &[usize], dtype: DType) -> Result<Array> {
    Array::empty(dims, dtype)
}

/// Linear ramp over the base shape, then tiled. `iota(&[3], &[2], ..)`
/// yields `[0 1 2 0 1 2]`.
pub fn iota(dims: &[usize], tile: &[usize], dtype: DType) -> Result<Array> {
    let base = Shape::new(dims)?;
    let ramp: Vec<f64> = (0..base.elements()).map(|v| v as f64).collect();
    let arr = Array::from_storage(Storage::from_real_vec(dtype.supported(), ramp), base)?;
    let mut mult = [1usize; 4];
    for (slot, &m) in mult.iter_mut().zip(tile) {
        *slot = m.max(1);
    }
    if mult == [1, 1, 1, 1] {
        Ok(arr)
    } else {
        arr.tile(mult)
    }
}

/// Each element carries its coordinate along `seq_dim`.
pub fn range(dims: &[usize], seq_dim: usize, dtype: DType) -> Result<Array> {
    if seq_dim >= 4 {
        return Err(Error::Arg(format!("seq_dim {seq_dim} out of range")));
    }
    let shape = Shape::new(dims)?;
    let data: Vec<f64> = (0..shape.elements())
        .map(|i| shape.coords_of(i)[seq_dim] as f64)
        .collect();
    Array::from_storage(Storage::from_real_vec(dtype.supported(), data), shape)
}

/// Half-open arithmetic progression `[start, stop)`.
pub fn arange(start: f64, stop: f64, step: f64, dtype: DType) -> Result<Array> {
    if step == 0.0 {
        return Err(Error::Arg("arange step cannot be zero".into()));
    }
    let len = ((stop - start) / step).ceil();
    if len <= 0.0 {
        return Err(Error::Arg(format!(
            "arange({start}, {stop}, {step}) produces no elements"
        )));
    }
    let len = len as usize;
    let data: Vec<f64> = (0..len).map(|i| start + i as f64 * step).collect();
    Array::from_storage(Storage::from_real_vec(dtype.supported(), data), Shape::vector(len))
}

/// `num` evenly spaced samples over `[start, stop]` (or `[start, stop)`
/// without `endpoint`), laid out along `axis`.
pub fn linspace(
    start: f64,
    stop: f64,
    num: usize,
    endpoint: bool,
    axis: usize,
    dtype: DType,
) -> Result<Array> {
    if num == 0 {
        return Err(Error::Arg("linspace needs at least one sample".into()));
    }
    if axis >= 4 {
        return Err(Error::Arg(format!("axis {axis} out of range")));
    }
    let div = if endpoint { (num - 1).max(1) } else { num } as f64;
    let step = (stop - start) / div;
    let data: Vec<f64> = (0..num)
        .map(|i| if endpoint && i == num - 1 { stop } else { start + i as f64 * step })
        .collect();
    let mut dims = [1usize; 4];
    dims[axis] = num;
    Array::from_storage(Storage::from_real_vec(dtype.supported(), data), Shape(dims))
}

/// `num` log-spaced samples between `10^start` and `10^stop`.
pub fn logspace(start: f64, stop: f64, num: usize, endpoint: bool, dtype: DType) -> Result<Array> {
    let lin = linspace(start, stop, num, endpoint, 0, DType::F64)?;
    let data: Vec<f64> = lin.host_vec::<f64>()?.into_iter().map(|v| 10f64.powf(v)).collect();
    Array::from_storage(Storage::from_real_vec(dtype.supported(), data), Shape::vector(num))
}

/// `num` geometrically spaced samples between `start` and `stop`.
pub fn geomspace(start: f64, stop: f64, num: usize, endpoint: bool, dtype: DType) -> Result<Array> {
    if start == 0.0 || stop == 0.0 {
        return Err(Error::Arg("geomspace endpoints cannot be zero".into()));
    }
    if (start < 0.0) != (stop < 0.0) {
        return Err(Error::Arg("geomspace endpoints must share a sign".into()));
    }
    let sign = if start < 0.0 { -1.0 } else { 1.0 };
    let lin = linspace(
        start.abs().log10(),
        stop.abs().log10(),
        num,
        endpoint,
        0,
        DType::F64,
    )?;
    let data: Vec<f64> = lin
        .host_vec::<f64>()?
        .into_iter()
        .map(|v| sign * 10f64.powf(v))
        .collect();
    Array::from_storage(Storage::from_real_vec(dtype.supported(), data), Shape::vector(num))
}

/// Identity matrices over the leading two axes of `dims`.
pub fn identity(dims: &[usize], dtype: DType) -> Result<Array> {
    let shape = Shape::new(dims)?;
    let data: Vec<f64> = (0..shape.elements())
        .map(|i| {
            let c = shape.coords_of(i);
            if c[0] == c[1] {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    Array::from_storage(Storage::from_real_vec(dtype.supported(), data), shape)
}

/// `n`x`m` matrix with ones on the `k`-th diagonal.
pub fn eye(n: usize, m: Option<usize>, k: i64, dtype: DType) -> Result<Array> {
    let m = m.unwrap_or(n);
    let shape = Shape::matrix(n, m);
    let data: Vec<f64> = (0..shape.elements())
        .map(|i| {
            let c = shape.coords_of(i);
            if c[1] as i64 - c[0] as i64 == k {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    Array::from_storage(Storage::from_real_vec(dtype.supported(), data), shape)
}

/// Diagonal extraction (`extract`) or construction from a vector.
pub fn diag(arr: &Array, k: i64, extract: bool) -> Result<Array> {
    arr.diag(k, extract)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iota_tiles() {
        let a = iota(&[3], &[2], DType::F32).unwrap();
        assert_eq!(a.host_vec::<f32>().unwrap(), vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn range_marks_axis_coordinate() {
        let a = range(&[2, 3], 1, DType::S32).unwrap();
        assert_eq!(a.host_vec::<i32>().unwrap(), vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn arange_half_open() {
        let a = arange(1.0, 4.0, 1.0, DType::F64).unwrap();
        assert_eq!(a.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(arange(0.0, 1.0, -1.0, DType::F64).is_err());
    }

    #[test]
    fn linspace_endpoint_control() {
        let a = linspace(0.0, 1.0, 5, true, 0, DType::F64).unwrap();
        assert_eq!(a.host_vec::<f64>().unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        let b = linspace(0.0, 1.0, 4, false, 0, DType::F64).unwrap();
        assert_eq!(b.host_vec::<f64>().unwrap(), vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn eye_offsets() {
        let a = eye(2, Some(3), 1, DType::F64).unwrap();
        assert_eq!(a.host_vec::<f64>().unwrap(), vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn identity_square() {
        let a = identity(&[2, 2], DType::F64).unwrap();
        assert_eq!(a.host_vec::<f64>().unwrap(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn geomspace_signs() {
        let a = geomspace(1.0, 1000.0, 4, true, DType::F64).unwrap();
        let v = a.host_vec::<f64>().unwrap();
        assert!((v[1] - 10.0).abs() < 1e-9);
        assert!(geomspace(-1.0, 1.0, 3, true, DType::F64).is_err());
    }
}
