//! Shape manipulation
//!
//! All manipulation runs as a gather over the materialized buffer: each
//! output element names the input element (or fill) it takes. Reshape and
//! flatten reuse the buffer directly since the dense layout is unchanged.

use strider_core::{DType, Error, Result};

use crate::array::Array;
use crate::shape::Shape;
use crate::storage::Storage;

/// Fill modes for `pad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadFill {
    /// Fill with zeros.
    Zero,
    /// Mirror including the edge element.
    Symmetric,
    /// Repeat the edge element.
    Replicate,
}

impl Array {
    fn gathered(&self, out_shape: Shape, map: impl Fn([usize; 4]) -> Option<usize>) -> Result<Array> {
        let storage = self
            .with_storage(|s| s.gather(out_shape.elements(), |i| map(out_shape.coords_of(i))))?;
        Array::from_storage(storage, out_shape)
    }

    /// Reinterpret the buffer under a new shape with the same element count.
    pub fn reshape(&self, dims: &[usize]) -> Result<Array> {
        let shape = Shape::new(dims)?;
        if shape.elements() != self.elements() {
            return Err(Error::Shape(format!(
                "reshape from {} to {shape} changes the element count",
                self.shape()
            )));
        }
        let storage = self.with_storage(|s| s.clone())?;
        Array::from_storage(storage, shape)
    }

    /// Collapse into a column vector.
    pub fn flat(&self) -> Result<Array> {
        self.reshape(&[self.elements()])
    }

    /// Reverse one axis.
    pub fn flip(&self, axis: usize) -> Result<Array> {
        if axis >= 4 {
            return Err(Error::Arg(format!("axis {axis} out of range")));
        }
        let shape = self.shape();
        let n = shape.dim(axis);
        self.gathered(shape, move |mut c| {
            c[axis] = n - 1 - c[axis];
            Some(shape.index_of(c))
        })
    }

    /// Permute the axes: output axis `i` draws from input axis `perm[i]`.
    pub fn reorder(&self, perm: [usize; 4]) -> Result<Array> {
        let mut seen = [false; 4];
        for &p in &perm {
            if p >= 4 || seen[p] {
                return Err(Error::Arg(format!("reorder permutation {perm:?} is not a permutation")));
            }
            seen[p] = true;
        }
        let src_shape = self.shape();
        let mut dims = [1usize; 4];
        for (i, &p) in perm.iter().enumerate() {
            dims[i] = src_shape.dim(p);
        }
        let out_shape = Shape(dims);
        self.gathered(out_shape, move |c| {
            let mut sc = [0usize; 4];
            for (i, &p) in perm.iter().enumerate() {
                sc[p] = c[i];
            }
            Some(src_shape.index_of(sc))
        })
    }

    /// Shift each axis by an offset. With `wrap` the shift is cyclic,
    /// otherwise vacated positions fill with zero.
    pub fn shift(&self, offsets: [i64; 4], wrap: bool) -> Result<Array> {
        let shape = self.shape();
        self.gathered(shape, move |c| {
            let mut sc = [0usize; 4];
            for axis in 0..4 {
                let n = shape.dim(axis) as i64;
                let v = c[axis] as i64 - offsets[axis];
                if wrap {
                    sc[axis] = v.rem_euclid(n) as usize;
                } else if v < 0 || v >= n {
                    return None;
                } else {
                    sc[axis] = v as usize;
                }
            }
            Some(shape.index_of(sc))
        })
    }

    /// Repeat the array an integer number of times per axis.
    pub fn tile(&self, multiples: [usize; 4]) -> Result<Array> {
        if multiples.iter().any(|&m| m == 0) {
            return Err(Error::Arg("tile multiples must be at least 1".into()));
        }
        let src_shape = self.shape();
        let mut dims = [1usize; 4];
        for axis in 0..4 {
            dims[axis] = src_shape.dim(axis) * multiples[axis];
        }
        let out_shape = Shape(dims);
        self.gathered(out_shape, move |c| {
            let sc = [
                c[0] % src_shape.dim(0),
                c[1] % src_shape.dim(1),
                c[2] % src_shape.dim(2),
                c[3] % src_shape.dim(3),
            ];
            Some(src_shape.index_of(sc))
        })
    }

    /// Pad with `begin`/`end` extra positions per axis.
    pub fn pad(&self, begin: [usize; 4], end: [usize; 4], fill: PadFill) -> Result<Array> {
        let src_shape = self.shape();
        let mut dims = [1usize; 4];
        for axis in 0..4 {
            dims[axis] = begin[axis] + src_shape.dim(axis) + end[axis];
        }
        let out_shape = Shape(dims);
        self.gathered(out_shape, move |c| {
            let mut sc = [0usize; 4];
            for axis in 0..4 {
                let n = src_shape.dim(axis) as i64;
                let v = c[axis] as i64 - begin[axis] as i64;
                let resolved = if v >= 0 && v < n {
                    v
                } else {
                    match fill {
                        PadFill::Zero => return None,
                        PadFill::Replicate => v.clamp(0, n - 1),
                        PadFill::Symmetric => {
                            // reflect including the edge: -1 -> 0, n -> n-1
                            let period = 2 * n;
                            let m = v.rem_euclid(period);
                            if m < n {
                                m
                            } else {
                                period - 1 - m
                            }
                        }
                    }
                };
                sc[axis] = resolved as usize;
            }
            Some(src_shape.index_of(sc))
        })
    }

    /// Upper-triangular copy; everything below the diagonal zeroes. With
    /// `unit_diag` the diagonal becomes 1.
    pub fn upper(&self, unit_diag: bool) -> Result<Array> {
        self.triangle(true, unit_diag)
    }

    /// Lower-triangular counterpart of [`Array::upper`].
    pub fn lower(&self, unit_diag: bool) -> Result<Array> {
        self.triangle(false, unit_diag)
    }

    fn triangle(&self, keep_upper: bool, unit_diag: bool) -> Result<Array> {
        let shape = self.shape();
        let out = self.gathered(shape, move |c| {
            let keep = if keep_upper { c[0] <= c[1] } else { c[0] >= c[1] };
            if keep {
                Some(shape.index_of(c))
            } else {
                None
            }
        })?;
        if unit_diag {
            let ones_len = shape.dim(0).min(shape.dim(1)) * shape.dim(2) * shape.dim(3);
            let ones = Storage::from_real_vec(self.dtype(), vec![1.0; ones_len]);
            let mut storage = out.with_storage(|s| s.clone())?;
            let d = shape.dim(0).min(shape.dim(1));
            storage.scatter(&ones, |i| {
                let diag = i % d;
                let slice = i / d;
                let c2 = slice % shape.dim(2);
                let c3 = slice / shape.dim(2);
                shape.index_of([diag, diag, c2, c3])
            })?;
            out.replace_storage(storage)?;
        }
        Ok(out)
    }

    /// Matrix transpose of the leading two axes, optionally conjugating.
    pub fn transpose(&self, conj: bool) -> Result<Array> {
        let t = self.reorder([1, 0, 2, 3])?;
        if conj && self.dtype().is_complex() {
            t.conj()
        } else {
            Ok(t)
        }
    }

    /// Extract the `k`-th diagonal, or build a matrix carrying this vector
    /// on its `k`-th diagonal when `extract` is false.
    pub fn diag(&self, k: i64, extract: bool) -> Result<Array> {
        if extract {
            let shape = self.shape();
            let (rows, cols) = (shape.dim(0) as i64, shape.dim(1) as i64);
            let len = if k >= 0 {
                rows.min(cols - k)
            } else {
                cols.min(rows + k)
            };
            if len <= 0 {
                return Err(Error::Arg(format!("diagonal {k} is outside a {rows}x{cols} matrix")));
            }
            let out_shape = Shape::vector(len as usize);
            self.gathered(out_shape, move |c| {
                let i = c[0] as i64;
                let (r, col) = if k >= 0 { (i, i + k) } else { (i - k, i) };
                Some(shape.index_of([r as usize, col as usize, 0, 0]))
            })
        } else {
            let n = self.elements();
            let side = n + k.unsigned_abs() as usize;
            let src_shape = self.shape();
            let out_shape = Shape::matrix(side, side);
            self.gathered(out_shape, move |c| {
                let (r, col) = (c[0] as i64, c[1] as i64);
                let on_diag = col - r == k;
                if !on_diag {
                    return None;
                }
                let i = if k >= 0 { r } else { col };
                Some(src_shape.index_of([i as usize, 0, 0, 0]))
            })
        }
    }

    /// Slide a window of `window` elements with `stride` down the first
    /// axis: output is `(window, n_windows, series)` per input column.
    pub fn unwrap_windows(&self, window: usize, stride: usize) -> Result<Array> {
        let n = self.dim(0);
        if window == 0 || stride == 0 {
            return Err(Error::Arg("window and stride must be positive".into()));
        }
        if window > n {
            return Err(Error::Arg(format!(
                "window {window} exceeds the series length {n}"
            )));
        }
        let nwin = (n - window) / stride + 1;
        let src_shape = self.shape();
        let out_shape = Shape::new(&[window, nwin, src_shape.dim(1)])?;
        self.gathered(out_shape, move |c| {
            Some(src_shape.index_of([c[1] * stride + c[0], c[2], 0, 0]))
        })
    }

    /// Inverse of [`Array::unwrap_windows`]: writes each window back to its
    /// origin; overlapping positions take the latest window's value.
    pub fn wrap_windows(&self, window: usize, stride: usize, out_len: usize) -> Result<Array> {
        let shape = self.shape();
        if shape.dim(0) != window {
            return Err(Error::Shape(format!(
                "wrap expects windows of {window} rows, got {}",
                shape.dim(0)
            )));
        }
        let nwin = shape.dim(1);
        let out_shape = Shape::new(&[out_len, shape.dim(2)])?;
        self.gathered(out_shape, move |c| {
            // last window covering this position wins
            let pos = c[0];
            let lo = pos.saturating_sub(window - 1);
            let w = (lo.div_ceil(stride)..=pos / stride)
                .rev()
                .find(|&w| w < nwin && pos >= w * stride && pos < w * stride + window)?;
            Some(shape.index_of([pos - w * stride, w, c[1], 0]))
        })
    }
}

/// Concatenate along one axis. All other axes must agree; dtypes promote to
/// a common type.
pub fn join(axis: usize, parts: &[&Array]) -> Result<Array> {
    if parts.is_empty() {
        return Err(Error::Arg("join requires at least one input".into()));
    }
    if axis >= 4 {
        return Err(Error::Arg(format!("axis {axis} out of range")));
    }
    let mut dtype = parts[0].dtype();
    for p in &parts[1..] {
        dtype = DType::promote(dtype, p.dtype());
    }
    let first = parts[0].shape();
    let mut joined = first.dim(axis);
    for p in &parts[1..] {
        let s = p.shape();
        for ax in 0..4 {
            if ax != axis && s.dim(ax) != first.dim(ax) {
                return Err(Error::Shape(format!(
                    "join inputs disagree on axis {ax}: {} vs {}",
                    first,
                    s
                )));
            }
        }
        joined += s.dim(axis);
    }
    let mut dims = first.0;
    dims[axis] = joined;
    let out_shape = Shape(dims);

    let mut out = Array::zeros(&dims[..], dtype)?;
    let mut storage = out.with_storage(|s| s.clone())?;
    let mut offset = 0usize;
    for p in parts {
        let src = p.cast(dtype)?.with_storage(|s| s.clone())?;
        let ps = p.shape();
        storage.scatter(&src, |i| {
            let mut c = ps.coords_of(i);
            c[axis] += offset;
            out_shape.index_of(c)
        })?;
        offset += ps.dim(axis);
    }
    out = Array::from_storage(storage, out_shape)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat() -> Array {
        Array::from_slice(&(0..6).map(|v| v as f64).collect::<Vec<_>>(), &[2, 3]).unwrap()
    }

    #[test]
    fn reshape_preserves_count() {
        let m = mat();
        let r = m.reshape(&[3, 2]).unwrap();
        assert_eq!(r.host_vec::<f64>().unwrap(), m.host_vec::<f64>().unwrap());
        assert!(m.reshape(&[4, 2]).is_err());
    }

    #[test]
    fn flip_first_axis() {
        let m = mat();
        let f = m.flip(0).unwrap();
        assert_eq!(f.host_vec::<f64>().unwrap(), vec![1.0, 0.0, 3.0, 2.0, 5.0, 4.0]);
    }

    #[test]
    fn reorder_transposes() {
        let m = mat();
        let t = m.reorder([1, 0, 2, 3]).unwrap();
        assert_eq!(t.dims(), [3, 2, 1, 1]);
        assert_eq!(t.host_vec::<f64>().unwrap(), vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn shift_wrap_and_zero() {
        let v = Array::from_vector(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let w = v.shift([1, 0, 0, 0], true).unwrap();
        assert_eq!(w.host_vec::<f64>().unwrap(), vec![4.0, 1.0, 2.0, 3.0]);
        let z = v.shift([1, 0, 0, 0], false).unwrap();
        assert_eq!(z.host_vec::<f64>().unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn tile_repeats() {
        let v = Array::from_vector(&[1.0, 2.0]).unwrap();
        let t = v.tile([2, 1, 1, 1]).unwrap();
        assert_eq!(t.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn pad_modes() {
        let v = Array::from_vector(&[1.0, 2.0, 3.0]).unwrap();
        let z = v.pad([1, 0, 0, 0], [1, 0, 0, 0], PadFill::Zero).unwrap();
        assert_eq!(z.host_vec::<f64>().unwrap(), vec![0.0, 1.0, 2.0, 3.0, 0.0]);
        let r = v.pad([2, 0, 0, 0], [0, 0, 0, 0], PadFill::Replicate).unwrap();
        assert_eq!(r.host_vec::<f64>().unwrap(), vec![1.0, 1.0, 1.0, 2.0, 3.0]);
        let s = v.pad([2, 0, 0, 0], [2, 0, 0, 0], PadFill::Symmetric).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn triangles() {
        let m = Array::from_slice(&[1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let u = m.upper(false).unwrap();
        assert_eq!(u.host_vec::<f64>().unwrap(), vec![1.0, 0.0, 3.0, 4.0]);
        let l = m.lower(true).unwrap();
        assert_eq!(l.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn diag_extract_and_build() {
        let m = Array::from_slice(&(0..9).map(|v| v as f64).collect::<Vec<_>>(), &[3, 3]).unwrap();
        let d = m.diag(0, true).unwrap();
        assert_eq!(d.host_vec::<f64>().unwrap(), vec![0.0, 4.0, 8.0]);
        let d1 = m.diag(1, true).unwrap();
        assert_eq!(d1.host_vec::<f64>().unwrap(), vec![3.0, 7.0]);

        let v = Array::from_vector(&[1.0, 2.0]).unwrap();
        let built = v.diag(0, false).unwrap();
        assert_eq!(built.host_vec::<f64>().unwrap(), vec![1.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn join_on_first_axis() {
        let a = Array::from_vector(&[1.0, 2.0]).unwrap();
        let b = Array::from_vector(&[3.0]).unwrap();
        let j = join(0, &[&a, &b]).unwrap();
        assert_eq!(j.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);

        let c = Array::from_slice(&[1.0, 2.0], &[1, 2]).unwrap();
        assert!(join(0, &[&a, &c]).is_err());
    }

    #[test]
    fn unwrap_produces_sliding_windows() {
        let v = Array::from_vector(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let w = v.unwrap_windows(3, 1).unwrap();
        assert_eq!(w.dims(), [3, 3, 1, 1]);
        assert_eq!(
            w.host_vec::<f64>().unwrap(),
            vec![1.0, 2.0, 3.0, 2.0, 3.0, 4.0, 3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn wrap_restores_non_overlapping() {
        let v = Array::from_vector(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let w = v.unwrap_windows(2, 2).unwrap();
        let back = w.wrap_windows(2, 2, 4).unwrap();
        assert_eq!(back.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
