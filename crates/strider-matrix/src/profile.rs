//! Building blocks of the similarity join
//!
//! Moving mean/stddev with the cached inverse-std auxiliary, the FFT
//! sliding dot product, and the guarded z-normalized distance kernel.
//! Everything downstream (STOMP, SCAMP, MASS, MPDist) composes these.

use num_complex::Complex64;
use rayon::prelude::*;
use strider_array::{Array, DType, Error, Result};
use strider_fft::engine_transform;

/// Lower bound on a window's standard deviation; constant windows hit the
/// guard and their distances become infinite instead of NaN.
pub(crate) const STD_EPS: f64 = 1e-8;

/// Moving statistics of a series under window `m`.
pub(crate) struct MovingStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    /// `1 / (m * max(std, eps))`, the cached distance-kernel factor.
    pub aux: Vec<f64>,
}

/// Rolling mean and standard deviation over length-`m` windows, with the
/// inverse-std auxiliary used by the distance kernel.
pub(crate) fn mean_stdev(t: &[f64], m: usize) -> MovingStats {
    let n = t.len();
    let count = n - m + 1;
    let mut cum = Vec::with_capacity(n + 1);
    let mut cum2 = Vec::with_capacity(n + 1);
    cum.push(0.0);
    cum2.push(0.0);
    let mut s = 0.0;
    let mut s2 = 0.0;
    for &v in t {
        s += v;
        s2 += v * v;
        cum.push(s);
        cum2.push(s2);
    }
    let mf = m as f64;
    let mut mean = Vec::with_capacity(count);
    let mut std = Vec::with_capacity(count);
    let mut aux = Vec::with_capacity(count);
    for i in 0..count {
        let mu = (cum[i + m] - cum[i]) / mf;
        let var = ((cum2[i + m] - cum2[i]) / mf - mu * mu).max(0.0);
        let sd = var.sqrt();
        mean.push(mu);
        std.push(sd);
        aux.push(1.0 / (mf * sd.max(STD_EPS)));
    }
    MovingStats { mean, std, aux }
}

/// Reusable frequency-domain state for repeated sliding dot products
/// against the same series.
pub(crate) struct DotPlan {
    pub n: usize,
    t_fft: Vec<Complex64>,
}

impl DotPlan {
    pub fn new(t: &[f64]) -> DotPlan {
        let n = t.len();
        let mut t_fft: Vec<Complex64> = t.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        engine_transform(&mut t_fft, false);
        DotPlan { n, t_fft }
    }

    /// `qt[i] = q . t[i .. i+m-1]` for every window start `i`.
    ///
    /// The flipped query is zero-padded to the full series length so the
    /// circular convolution's tail `[m-1, n-1]` equals the linear one.
    pub fn sliding_dot(&self, q: &[f64]) -> Vec<f64> {
        let m = q.len();
        let n = self.n;
        let mut qf = vec![Complex64::new(0.0, 0.0); n];
        for (i, &v) in q.iter().rev().enumerate() {
            qf[i] = Complex64::new(v, 0.0);
        }
        engine_transform(&mut qf, false);
        for (z, t) in qf.iter_mut().zip(&self.t_fft) {
            *z *= t;
        }
        engine_transform(&mut qf, true);
        let scale = 1.0 / n as f64;
        (m - 1..n).map(|k| qf[k].re * scale).collect()
    }
}

/// One row of the z-normalized distance profile.
///
/// `d_i = sqrt(2m (1 - (qt_i - m mu_t_i mu_q) / (m sigma_t_i sigma_q)))`,
/// with near-constant windows on either side forced to infinity.
pub(crate) fn calculate_distances(
    qt: &[f64],
    stats: &MovingStats,
    sum_q: f64,
    sum_q2: f64,
    m: usize,
) -> Vec<f64> {
    let mf = m as f64;
    let mean_q = sum_q / mf;
    let sigma_q = (sum_q2 / mf - mean_q * mean_q).max(0.0).sqrt();
    qt.iter()
        .enumerate()
        .map(|(i, &dot)| {
            if stats.std[i] < STD_EPS || sigma_q < STD_EPS {
                return f64::INFINITY;
            }
            let corr = (dot - mf * stats.mean[i] * mean_q) * stats.aux[i] / sigma_q;
            (2.0 * mf * (1.0 - corr)).max(0.0).sqrt()
        })
        .collect()
}

/// Column-major distance matrix of every query against every window of `t`:
/// `rows = len(t) - m + 1` positions, one column per query.
pub(crate) fn mass_matrix(queries: &[Vec<f64>], t: &[f64], m: usize) -> Vec<Vec<f64>> {
    let stats = mean_stdev(t, m);
    let plan = DotPlan::new(t);
    queries
        .par_iter()
        .map(|q| {
            let qt = plan.sliding_dot(q);
            let sum_q: f64 = q.iter().sum();
            let sum_q2: f64 = q.iter().map(|v| v * v).sum();
            calculate_distances(&qt, &stats, sum_q, sum_q2, m)
        })
        .collect()
}

/// Pull a single series out of an array, validating its shape.
pub(crate) fn series_vec(t: &Array, what: &str) -> Result<Vec<f64>> {
    if t.ndims() > 1 {
        return Err(Error::Arg(format!("{what} must be a single series (column vector)")));
    }
    t.host_vec::<f64>()
}

/// Window-length validation shared by every join entry point.
pub(crate) fn check_window(n: usize, m: usize, what: &str) -> Result<()> {
    if m < 2 {
        return Err(Error::Arg(format!("{what}: window length must be at least 2")));
    }
    if n < m {
        return Err(Error::Arg(format!(
            "{what}: series of length {n} is shorter than the window {m}"
        )));
    }
    Ok(())
}

/// Output precision follows the input: double stays double.
pub(crate) fn profile_dtype(input: &Array) -> DType {
    if matches!(input.dtype(), DType::F64 | DType::C64) {
        DType::F64
    } else {
        DType::F32
    }
}

pub(crate) fn profile_pair(
    distances: Vec<f64>,
    indices: Vec<u32>,
    dtype: DType,
) -> Result<(Array, Array)> {
    let len = distances.len();
    let profile = Array::from_storage(
        strider_array::storage::Storage::from_real_vec(dtype, distances),
        strider_array::Shape::vector(len),
    )?;
    let index = Array::from_storage(
        strider_array::storage::Storage::U32(indices),
        strider_array::Shape::vector(len),
    )?;
    Ok((profile, index))
}

/// Distance profile(s) of `q` (one query per column) against `t`.
pub fn mass(q: &Array, t: &Array) -> Result<Array> {
    let tv = series_vec(t, "mass reference")?;
    let m = q.dim(0);
    check_window(tv.len(), m, "mass")?;
    let nq = q.dim(1);
    let qd = q.host_vec::<f64>()?;
    let queries: Vec<Vec<f64>> = (0..nq).map(|j| qd[j * m..(j + 1) * m].to_vec()).collect();
    let cols = mass_matrix(&queries, &tv, m);
    let rows = tv.len() - m + 1;
    let mut flat = Vec::with_capacity(rows * nq);
    for col in &cols {
        flat.extend_from_slice(col);
    }
    Array::from_storage(
        strider_array::storage::Storage::from_real_vec(profile_dtype(t), flat),
        strider_array::Shape::matrix(rows, nq),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_dot_product_known_values() {
        let t: Vec<f64> = (1..=8).map(|v| v as f64).collect();
        let q = vec![2.0, 1.0];
        let plan = DotPlan::new(&t);
        let qt = plan.sliding_dot(&q);
        let expect = [4.0, 7.0, 10.0, 13.0, 16.0, 19.0, 22.0];
        assert_eq!(qt.len(), expect.len());
        for (got, want) in qt.iter().zip(expect) {
            assert!((got - want).abs() < 1e-8, "{got} vs {want}");
        }
    }

    #[test]
    fn moving_stats_match_direct_computation() {
        let t = vec![1.0, 3.0, 2.0, 5.0, 4.0];
        let stats = mean_stdev(&t, 3);
        assert_eq!(stats.mean.len(), 3);
        assert!((stats.mean[0] - 2.0).abs() < 1e-12);
        let direct_std = ((1.0 + 1.0 + 0.0) / 3.0f64).sqrt();
        assert!((stats.std[0] - direct_std).abs() < 1e-12);
        assert!((stats.aux[0] - 1.0 / (3.0 * direct_std)).abs() < 1e-9);
    }

    #[test]
    fn constant_window_distance_is_infinite() {
        let t = vec![1.0, 1.0, 1.0, 2.0, 3.0];
        let stats = mean_stdev(&t, 3);
        let q = vec![1.0, 2.0, 3.0];
        let plan = DotPlan::new(&t);
        let qt = plan.sliding_dot(&q);
        let d = calculate_distances(&qt, &stats, 6.0, 14.0, 3);
        assert!(d[0].is_infinite());
        assert!(d[2].is_finite());
    }

    #[test]
    fn identical_window_distance_is_zero() {
        let t = vec![1.0, 2.0, 3.0, 4.0, 5.0, 1.0, 2.0, 3.0];
        let stats = mean_stdev(&t, 3);
        let q = vec![1.0, 2.0, 3.0];
        let plan = DotPlan::new(&t);
        let qt = plan.sliding_dot(&q);
        let sum_q = 6.0;
        let sum_q2 = 14.0;
        let d = calculate_distances(&qt, &stats, sum_q, sum_q2, 3);
        assert!(d[0].abs() < 1e-6);
        assert!(d[5].abs() < 1e-6);
    }

    #[test]
    fn mass_returns_profile_matrix() {
        let t = Array::from_vector(&[1.0, 2.0, 3.0, 4.0, 3.0, 2.0, 1.0]).unwrap();
        let q = Array::from_slice(&[1.0, 2.0, 3.0], &[3, 1]).unwrap();
        let d = mass(&q, &t).unwrap();
        assert_eq!(d.dims(), [5, 1, 1, 1]);
        let host = d.host_vec::<f64>().unwrap();
        // the ramp at position 0 matches the query exactly under z-norm
        assert!(host[0] < 1e-5);
    }
}
