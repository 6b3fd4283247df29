//! Shared column plumbing for the feature battery

use rayon::prelude::*;
use strider_array::{Array, Error, Result};

/// Split a `(length, series)` matrix into its columns.
pub(crate) fn columns(tss: &Array) -> Result<(usize, Vec<Vec<f64>>)> {
    if tss.ndims() > 2 {
        return Err(Error::Arg("expected a series matrix of shape (length, series)".into()));
    }
    let n = tss.dim(0);
    let s = tss.dim(1);
    let data = tss.host_vec::<f64>()?;
    let cols = (0..s).map(|c| data[c * n..(c + 1) * n].to_vec()).collect();
    Ok((n, cols))
}

/// Row vector `(1, series)` from per-series values.
pub(crate) fn row_vector(values: Vec<f64>) -> Result<Array> {
    let s = values.len();
    Array::from_slice(&values, &[1, s])
}

/// Apply a scalar feature to every series in parallel.
pub(crate) fn per_series(tss: &Array, f: impl Fn(&[f64]) -> f64 + Sync) -> Result<Array> {
    let (_, cols) = columns(tss)?;
    let values: Vec<f64> = cols.par_iter().map(|c| f(c)).collect();
    row_vector(values)
}

/// Fallible variant of [`per_series`].
pub(crate) fn try_per_series(
    tss: &Array,
    f: impl Fn(&[f64]) -> Result<f64> + Sync,
) -> Result<Array> {
    let (_, cols) = columns(tss)?;
    let values: Vec<f64> = cols
        .par_iter()
        .map(|c| f(c))
        .collect::<Result<Vec<_>>>()?;
    row_vector(values)
}

pub(crate) fn mean_of(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

pub(crate) fn std_of(x: &[f64], ddof: f64) -> f64 {
    let mu = mean_of(x);
    (x.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / (x.len() as f64 - ddof)).sqrt()
}

/// Rebuild a matrix from columns of equal length.
pub(crate) fn from_columns(cols: Vec<Vec<f64>>) -> Result<Array> {
    let s = cols.len();
    if s == 0 {
        return Err(Error::Arg("no series provided".into()));
    }
    let n = cols[0].len();
    let mut flat = Vec::with_capacity(n * s);
    for col in &cols {
        if col.len() != n {
            return Err(Error::Shape("columns disagree in length".into()));
        }
        flat.extend_from_slice(col);
    }
    Array::from_slice(&flat, &[n, s])
}
