//! Statistics for the Strider analytics engine
//!
//! Operates on column-wise series matrices shaped `(length, series)`. The
//! cross operations run as FFT convolution of one series with the time
//! reverse of the other, with per-lag scaling applied afterwards.

use strider_array::{arange, Array, DType, Error, Result, Shape};
use strider_fft::{fft, ifft, Norm};
use strider_linalg::{matmul, MatProp};

/// Scaling applied to cross-correlation/covariance results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XCorrScale {
    None,
    /// Divide every lag by `n`.
    Biased,
    /// Divide lag `k` by `n - |k|`.
    Unbiased,
    /// Normalize by `sqrt(sum x^2 * sum y^2)`.
    Coeff,
}

fn series_matrix(tss: &Array) -> Result<(usize, usize)> {
    if tss.ndims() > 2 {
        return Err(Error::Arg("expected a series matrix of shape (length, series)".into()));
    }
    Ok((tss.dim(0), tss.dim(1)))
}

/// Column means, optionally weighted.
pub fn mean(tss: &Array, weights: Option<&Array>) -> Result<Array> {
    let (n, _) = series_matrix(tss)?;
    match weights {
        None => tss.sum(Some(0))?.div_scalar(n as f64),
        Some(w) => {
            if w.elements() != n {
                return Err(Error::Shape(format!(
                    "weight vector of {} entries cannot weight series of length {n}",
                    w.elements()
                )));
            }
            let wsum = w.sum(None)?.scalar::<f64>()?;
            if wsum == 0.0 {
                return Err(Error::Arg("weights sum to zero".into()));
            }
            tss.mul(&w.reshape(&[n, 1])?)?.sum(Some(0))?.div_scalar(wsum)
        }
    }
}

/// Column variance with `ddof` delta degrees of freedom (0 or 1).
pub fn var(tss: &Array, ddof: u32, weights: Option<&Array>) -> Result<Array> {
    let (n, _) = series_matrix(tss)?;
    if ddof > 1 {
        return Err(Error::Arg("ddof must be 0 or 1".into()));
    }
    let mu = mean(tss, weights)?;
    let centered = tss.sub(&mu)?;
    let sq = centered.mul(&centered)?;
    match weights {
        None => sq.sum(Some(0))?.div_scalar((n as f64) - ddof as f64),
        Some(w) => {
            let wsum = w.sum(None)?.scalar::<f64>()?;
            sq.mul(&w.reshape(&[n, 1])?)?
                .sum(Some(0))?
                .div_scalar(wsum - ddof as f64)
        }
    }
}

/// Column standard deviation.
pub fn std(tss: &Array, ddof: u32, weights: Option<&Array>) -> Result<Array> {
    var(tss, ddof, weights)?.sqrt()
}

/// Variance along an arbitrary axis.
pub fn var_axis(tss: &Array, ddof: u32, axis: usize) -> Result<Array> {
    let l = tss.dim(axis) as f64;
    let mu = tss.sum(Some(axis))?.div_scalar(l)?;
    let diff = tss.sub(&mu)?;
    diff.mul(&diff)?.sum(Some(axis))?.div_scalar(l - ddof as f64)
}

/// Standard deviation along an arbitrary axis.
pub fn std_axis(tss: &Array, ddof: u32, axis: usize) -> Result<Array> {
    var_axis(tss, ddof, axis)?.sqrt()
}

/// Column medians (midpoint of the two central order statistics for even
/// lengths).
pub fn median(tss: &Array) -> Result<Array> {
    let (n, s) = series_matrix(tss)?;
    let sorted = tss.sort(0, true)?;
    let data = sorted.host_vec::<f64>()?;
    let med: Vec<f64> = (0..s)
        .map(|c| {
            let col = &data[c * n..(c + 1) * n];
            if n % 2 == 1 {
                col[n / 2]
            } else {
                0.5 * (col[n / 2 - 1] + col[n / 2])
            }
        })
        .collect();
    Array::from_slice(&med, &[1, s])
}

/// k-th raw moment per column.
pub fn moment(tss: &Array, k: u32) -> Result<Array> {
    let (n, _) = series_matrix(tss)?;
    tss.pow_scalar(k as f64)?.sum(Some(0))?.div_scalar(n as f64)
}

/// Adjusted sample skewness per column.
pub fn skewness(tss: &Array) -> Result<Array> {
    let (n, _) = series_matrix(tss)?;
    let nf = n as f64;
    let centered = tss.sub(&mean(tss, None)?)?;
    let m3 = moment(&centered, 3)?;
    let s3 = std(tss, 0, None)?.pow_scalar(3.0)?;
    m3.div(&s3)?.mul_scalar(nf * nf / ((nf - 1.0) * (nf - 2.0)))
}

/// Adjusted Fisher-Pearson kurtosis (G2) per column.
pub fn kurtosis(tss: &Array) -> Result<Array> {
    let (n, _) = series_matrix(tss)?;
    let nf = n as f64;
    let a = nf * (nf + 1.0) / ((nf - 1.0) * (nf - 2.0) * (nf - 3.0));
    let centered = tss.sub(&mean(tss, None)?)?;
    let standardized = centered.div(&std(tss, 0, None)?)?;
    let b = standardized.pow_scalar(4.0)?.sum(Some(0))?;
    let c = 3.0 * (nf - 1.0) * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0));
    b.mul_scalar(a)?.sub_scalar(c)
}

/// Covariance matrix of the columns.
pub fn covariance(x: &Array, ddof: u32) -> Result<Array> {
    let (n, _) = series_matrix(x)?;
    let centered = x.sub(&mean(x, None)?)?;
    let cov = matmul(&centered, &centered, MatProp::Trans, MatProp::None)?;
    cov.div_scalar(n as f64 - ddof as f64)
}

/// Correlation coefficient matrix of the columns.
pub fn corrcoef(x: &Array, ddof: u32) -> Result<Array> {
    let covm = covariance(x, ddof)?;
    let d = covm.diag(0, true)?;
    let k = d.elements();
    let col = d.reshape(&[k, 1])?;
    let row = d.reshape(&[1, k])?;
    let denom = col.mul(&row)?.sqrt()?;
    covm.div(&denom)
}

/// Full linear convolution through the frequency domain.
fn conv_full(x: &[f64], y: &[f64]) -> Result<Vec<f64>> {
    let n = x.len() + y.len() - 1;
    let pad = |v: &[f64]| -> Result<Array> {
        let mut data = v.to_vec();
        data.resize(n, 0.0);
        Array::from_vector(&data)
    };
    let fx = fft(&pad(x)?, Norm::Backward, &[n])?;
    let fy = fft(&pad(y)?, Norm::Backward, &[n])?;
    let prod = fx.mul(&fy)?;
    let conv = ifft(&prod, Norm::Backward, &[n])?;
    conv.real()?.host_vec::<f64>()
}

/// Cross-correlation of every column pair.
///
/// Returns `(lags, values)`: `lags` runs `-maxlag..=maxlag` and `values` is
/// shaped `(2*maxlag + 1, x_series, y_series)`.
pub fn xcorr(
    x: &Array,
    y: &Array,
    maxlag: Option<usize>,
    scale: Option<XCorrScale>,
) -> Result<(Array, Array)> {
    let (nx, sx) = series_matrix(x)?;
    let (ny, sy) = series_matrix(y)?;
    let n = nx.max(ny);
    let ml = maxlag.unwrap_or(n - 1).min(n - 1);
    let sc = scale.unwrap_or(XCorrScale::None);

    let xd = x.host_vec::<f64>()?;
    let yd = y.host_vec::<f64>()?;

    let lag_count = 2 * ml + 1;
    let out_shape = Shape::new(&[lag_count, sx, sy])?;
    let mut values = vec![0.0f64; out_shape.elements()];

    for j in 0..sy {
        let mut ycol = yd[j * ny..(j + 1) * ny].to_vec();
        ycol.resize(n, 0.0);
        let yrev: Vec<f64> = ycol.iter().rev().copied().collect();
        for i in 0..sx {
            let mut xcol = xd[i * nx..(i + 1) * nx].to_vec();
            xcol.resize(n, 0.0);
            // full length 2n-1; entry k holds lag k - (n - 1)
            let full = conv_full(&xcol, &yrev)?;
            for (li, lag) in (-(ml as i64)..=ml as i64).enumerate() {
                let k = (lag + n as i64 - 1) as usize;
                let mut v = full[k];
                match sc {
                    XCorrScale::None => {}
                    XCorrScale::Biased => v /= n as f64,
                    XCorrScale::Unbiased => v /= (n as i64 - lag.abs()) as f64,
                    XCorrScale::Coeff => {
                        let rx: f64 = xcol.iter().map(|a| a * a).sum();
                        let ry: f64 = ycol.iter().map(|a| a * a).sum();
                        v /= (rx * ry).sqrt();
                    }
                }
                values[out_shape.index_of([li, i, j, 0])] = v;
            }
        }
    }

    let lags = arange(-(ml as f64), ml as f64 + 1.0, 1.0, DType::S32)?;
    let values = Array::from_storage(
        strider_array::storage::Storage::from_real_vec(DType::F64, values),
        out_shape,
    )?;
    Ok((lags, values))
}

/// Cross-covariance: cross-correlation of the mean-removed series.
pub fn xcov(
    x: &Array,
    y: &Array,
    maxlag: Option<usize>,
    scale: Option<XCorrScale>,
) -> Result<(Array, Array)> {
    let xc = x.sub(&mean(x, None)?)?;
    let yc = y.sub(&mean(y, None)?)?;
    xcorr(&xc, &yc, maxlag, scale)
}

fn self_diagonal(values: &Array, series: usize) -> Result<Array> {
    let lag_count = values.dim(0);
    let out = Array::zeros(&[lag_count, series], DType::F64)?;
    for s in 0..series {
        let slice = values.get(&[
            strider_array::Selector::Span,
            strider_array::Selector::Index(s as i64),
            strider_array::Selector::Index(s as i64),
        ])?;
        out.set(
            &[strider_array::Selector::Span, strider_array::Selector::Index(s as i64)],
            &slice.reshape(&[lag_count])?,
        )?;
    }
    Ok(out)
}

/// Auto-correlation per series: the diagonal slice of the self cross op.
pub fn autocorr(x: &Array, maxlag: Option<usize>, scale: Option<XCorrScale>) -> Result<Array> {
    let (_, s) = series_matrix(x)?;
    let (_, values) = xcorr(x, x, maxlag, scale)?;
    self_diagonal(&values, s)
}

/// Auto-covariance per series.
pub fn autocov(x: &Array, maxlag: Option<usize>, scale: Option<XCorrScale>) -> Result<Array> {
    let (_, s) = series_matrix(x)?;
    let (_, values) = xcov(x, x, maxlag, scale)?;
    self_diagonal(&values, s)
}

/// Ljung-Box portmanteau statistic per series:
/// `n (n + 2) * sum_{k=1..h} rho_k^2 / (n - k)`.
pub fn ljung_box(tss: &Array, maxlag: Option<usize>) -> Result<Array> {
    let (n, s) = series_matrix(tss)?;
    let h = maxlag.unwrap_or(n.saturating_sub(2)).min(n - 1);
    if h == 0 {
        return Err(Error::Arg("ljung_box needs at least one lag".into()));
    }
    let data = tss.host_vec::<f64>()?;
    let mut out = Vec::with_capacity(s);
    for c in 0..s {
        let col = &data[c * n..(c + 1) * n];
        let mu: f64 = col.iter().sum::<f64>() / n as f64;
        let denom: f64 = col.iter().map(|v| (v - mu) * (v - mu)).sum();
        let mut q = 0.0;
        for k in 1..=h {
            let num: f64 = (0..n - k).map(|t| (col[t] - mu) * (col[t + k] - mu)).sum();
            let rho = num / denom;
            q += rho * rho / (n - k) as f64;
        }
        out.push(n as f64 * (n as f64 + 2.0) * q);
    }
    Array::from_slice(&out, &[1, s])
}
