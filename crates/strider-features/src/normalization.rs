//! Column-wise normalizers
//!
//! Every normalizer has an in-place variant writing back into the input
//! storage. A constant column (zero range or zero standard deviation under
//! the `epsilon` guard) passes through unchanged, except where a
//! normalizer documents otherwise.

use strider_array::{Array, Error, Result};

use crate::util::{columns, from_columns, mean_of, std_of};

const DEFAULT_EPSILON: f64 = 1e-8;

fn map_columns(
    tss: &Array,
    f: impl Fn(&mut Vec<f64>),
) -> Result<Array> {
    let (_, mut cols) = columns(tss)?;
    for col in &mut cols {
        f(col);
    }
    let out = from_columns(cols)?;
    out.cast(tss.dtype())?.reshape(&tss.dims())
}

macro_rules! in_place_variant {
    ($(#[$meta:meta])* $name:ident, $base:ident ( $($arg:ident : $ty:ty),* )) => {
        $(#[$meta])*
        pub fn $name(tss: &Array, $($arg: $ty),*) -> Result<()> {
            let normalized = $base(tss, $($arg),*)?;
            tss.assign(&normalized)
        }
    };
}

/// Z-score normalization along `axis` with `ddof` degrees of freedom.
/// Columns whose deviation falls below the guard stay untouched.
pub fn znorm(tss: &Array, axis: usize, ddof: u32) -> Result<Array> {
    if axis > 1 {
        return Err(Error::Arg("znorm supports axis 0 (columns) or 1 (rows)".into()));
    }
    let input = if axis == 1 { tss.transpose(false)? } else { tss.clone() };
    let out = map_columns(&input, |col| {
        let mu = mean_of(col);
        let sd = std_of(col, ddof as f64);
        if sd < DEFAULT_EPSILON {
            return;
        }
        for v in col.iter_mut() {
            *v = (*v - mu) / sd;
        }
    })?;
    if axis == 1 {
        out.transpose(false)
    } else {
        Ok(out)
    }
}

in_place_variant!(
    /// In-place [`znorm`] over columns.
    znorm_in_place, znorm(axis: usize, ddof: u32));

/// Scale into `[low, high]`; a column with range below `epsilon` is left
/// unchanged.
pub fn max_min_norm(tss: &Array, high: f64, low: f64, epsilon: f64) -> Result<Array> {
    map_columns(tss, |col| {
        let mn = col.iter().copied().fold(f64::INFINITY, f64::min);
        let mx = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = mx - mn;
        if range < epsilon.max(DEFAULT_EPSILON) {
            return;
        }
        for v in col.iter_mut() {
            *v = low + (high - low) * (*v - mn) / range;
        }
    })
}

in_place_variant!(max_min_norm_in_place, max_min_norm(high: f64, low: f64, epsilon: f64));

/// Divide by the smallest power of ten exceeding the largest magnitude.
/// All-zero columns pass through.
pub fn decimal_scaling_norm(tss: &Array) -> Result<Array> {
    map_columns(tss, |col| {
        let mx = col.iter().map(|v| v.abs()).fold(0.0f64, f64::max);
        if mx == 0.0 {
            return;
        }
        let digits = mx.log10().floor() + 1.0;
        let factor = 10f64.powf(digits);
        for v in col.iter_mut() {
            *v /= factor;
        }
    })
}

in_place_variant!(decimal_scaling_norm_in_place, decimal_scaling_norm());

/// `(x - mean) / (max - min)`; constant columns become zeros.
pub fn mean_norm(tss: &Array) -> Result<Array> {
    map_columns(tss, |col| {
        let mu = mean_of(col);
        let mn = col.iter().copied().fold(f64::INFINITY, f64::min);
        let mx = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = mx - mn;
        for v in col.iter_mut() {
            *v = if range < DEFAULT_EPSILON { 0.0 } else { (*v - mu) / range };
        }
    })
}

in_place_variant!(mean_norm_in_place, mean_norm());

/// Divide by the column median; a zero median leaves the column unchanged.
pub fn median_norm(tss: &Array) -> Result<Array> {
    map_columns(tss, |col| {
        let mut sorted = col.clone();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let med = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
        };
        if med.abs() < DEFAULT_EPSILON {
            return;
        }
        for v in col.iter_mut() {
            *v /= med;
        }
    })
}

in_place_variant!(median_norm_in_place, median_norm());

/// Scale to unit Euclidean length; zero columns pass through.
pub fn unit_length_norm(tss: &Array) -> Result<Array> {
    map_columns(tss, |col| {
        let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm < DEFAULT_EPSILON {
            return;
        }
        for v in col.iter_mut() {
            *v /= norm;
        }
    })
}

in_place_variant!(unit_length_norm_in_place, unit_length_norm());

/// Logistic squashing into `(0, 1)`.
pub fn sigmoid_norm(tss: &Array) -> Result<Array> {
    map_columns(tss, |col| {
        for v in col.iter_mut() {
            *v = 1.0 / (1.0 + (-*v).exp());
        }
    })
}

in_place_variant!(sigmoid_norm_in_place, sigmoid_norm());

/// Hyperbolic-tangent squashing into `(-1, 1)`.
pub fn tanh_norm(tss: &Array) -> Result<Array> {
    map_columns(tss, |col| {
        for v in col.iter_mut() {
            *v = v.tanh();
        }
    })
}

in_place_variant!(tanh_norm_in_place, tanh_norm());

/// Remove the least-squares line from each column.
pub fn detrend(tss: &Array) -> Result<Array> {
    map_columns(tss, |col| {
        let n = col.len();
        let nf = n as f64;
        let mean_x = (nf - 1.0) / 2.0;
        let mean_y = mean_of(col);
        let ssx: f64 = (0..n).map(|i| (i as f64 - mean_x) * (i as f64 - mean_x)).sum();
        let sxy: f64 = col
            .iter()
            .enumerate()
            .map(|(i, &y)| (i as f64 - mean_x) * (y - mean_y))
            .sum();
        let slope = if ssx == 0.0 { 0.0 } else { sxy / ssx };
        let intercept = mean_y - slope * mean_x;
        for (i, v) in col.iter_mut().enumerate() {
            *v -= intercept + slope * i as f64;
        }
    })
}

in_place_variant!(detrend_in_place, detrend());

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(data: &[f64], n: usize, s: usize) -> Array {
        Array::from_slice(data, &[n, s]).unwrap()
    }

    #[test]
    fn znorm_properties() {
        let t = matrix(&[1.0, 2.0, 3.0, 4.0], 4, 1);
        let z = znorm(&t, 0, 0).unwrap();
        let host = z.host_vec::<f64>().unwrap();
        let mu: f64 = host.iter().sum::<f64>() / 4.0;
        let sd: f64 = (host.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / 4.0).sqrt();
        assert!(mu.abs() < 1e-12);
        assert!((sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn znorm_constant_column_untouched() {
        let t = matrix(&[5.0, 5.0, 5.0], 3, 1);
        let z = znorm(&t, 0, 0).unwrap();
        assert_eq!(z.host_vec::<f64>().unwrap(), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn max_min_targets_bounds() {
        let t = matrix(&[0.0, 5.0, 10.0], 3, 1);
        let s = max_min_norm(&t, 1.0, 0.0, 1e-8).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn decimal_scaling_reference() {
        let t = matrix(&[10.0, -250.0, 990.0], 3, 1);
        let s = decimal_scaling_norm(&t).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![0.01, -0.25, 0.99]);
    }

    #[test]
    fn unit_length_norm_is_unit() {
        let t = matrix(&[3.0, 4.0], 2, 1);
        let s = unit_length_norm(&t).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![0.6, 0.8]);
    }

    #[test]
    fn detrend_removes_line() {
        let t = matrix(&[1.0, 3.0, 5.0, 7.0], 4, 1);
        let s = detrend(&t).unwrap();
        for v in s.host_vec::<f64>().unwrap() {
            assert!(v.abs() < 1e-12);
        }
    }

    #[test]
    fn in_place_variants_overwrite() {
        let t = matrix(&[0.0, 5.0, 10.0], 3, 1);
        max_min_norm_in_place(&t, 1.0, 0.0, 1e-8).unwrap();
        assert_eq!(t.host_vec::<f64>().unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn mean_norm_zeroes_constant_columns() {
        let t = matrix(&[2.0, 2.0, 2.0], 3, 1);
        let s = mean_norm(&t).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn per_column_independence() {
        let t = matrix(&[1.0, 2.0, 3.0, 100.0, 200.0, 300.0], 3, 2);
        let s = max_min_norm(&t, 1.0, 0.0, 1e-8).unwrap();
        let host = s.host_vec::<f64>().unwrap();
        assert_eq!(&host[0..3], &[0.0, 0.5, 1.0]);
        assert_eq!(&host[3..6], &[0.0, 0.5, 1.0]);
    }
}
