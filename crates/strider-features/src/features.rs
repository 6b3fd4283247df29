//! Scalar feature battery
//!
//! Each feature takes a `(length, series)` matrix and returns one value per
//! series (a `(1, series)` row vector), or a small tuple of row vectors for
//! the multi-output features.

use num_complex::Complex64;
use std::collections::HashMap;
use strider_array::{Array, Error, Result};
use strider_fft::{engine_transform, rfft, Norm};

use crate::normalization::znorm;
use crate::util::{columns, from_columns, mean_of, per_series, row_vector, std_of, try_per_series};

/// Sum of squares.
pub fn abs_energy(tss: &Array) -> Result<Array> {
    per_series(tss, |x| x.iter().map(|v| v * v).sum())
}

/// Sum of absolute consecutive changes.
pub fn absolute_sum_of_changes(tss: &Array) -> Result<Array> {
    per_series(tss, |x| x.windows(2).map(|w| (w[1] - w[0]).abs()).sum())
}

fn chebyshev_match_count(x: &[f64], m: usize, r: f64) -> Vec<usize> {
    let count = x.len() - m + 1;
    let mut matches = vec![0usize; count];
    for i in 0..count {
        for j in 0..count {
            let dist = (0..m)
                .map(|k| (x[i + k] - x[j + k]).abs())
                .fold(0.0f64, f64::max);
            if dist <= r {
                matches[i] += 1;
            }
        }
    }
    matches
}

fn phi(x: &[f64], m: usize, r: f64) -> f64 {
    let counts = chebyshev_match_count(x, m, r);
    let total = counts.len() as f64;
    counts.iter().map(|&c| (c as f64 / total).ln()).sum::<f64>() / total
}

/// Approximate entropy with embedding dimension `m` and Chebyshev radius
/// `r`. Fails when the series is not longer than `m + 1`.
pub fn approximate_entropy(tss: &Array, m: usize, r: f64) -> Result<Array> {
    if r < 0.0 {
        return Err(Error::Arg("tolerance r must be non-negative".into()));
    }
    try_per_series(tss, |x| {
        if x.len() <= m + 1 {
            return Err(Error::Arg(format!(
                "approximate entropy requires more than {} samples",
                m + 1
            )));
        }
        Ok(phi(x, m, r) - phi(x, m + 1, r))
    })
}

/// Sample entropy with the customary `m = 2`, `r = 0.2 * std`.
pub fn sample_entropy(tss: &Array) -> Result<Array> {
    try_per_series(tss, |x| {
        let m = 2usize;
        if x.len() <= m + 1 {
            return Err(Error::Arg("sample entropy requires more than 3 samples".into()));
        }
        let r = 0.2 * std_of(x, 0.0);
        // self-matches excluded
        let count_pairs = |m: usize| -> f64 {
            let count = x.len() - m + 1;
            let mut total = 0usize;
            for i in 0..count {
                for j in i + 1..count {
                    let dist = (0..m)
                        .map(|k| (x[i + k] - x[j + k]).abs())
                        .fold(0.0f64, f64::max);
                    if dist <= r {
                        total += 1;
                    }
                }
            }
            total as f64
        };
        let b = count_pairs(m);
        let a = count_pairs(m + 1);
        if a == 0.0 || b == 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(-(a / b).ln())
    })
}

/// Entropy of the histogram over `max_bins` equal-width bins.
pub fn binned_entropy(tss: &Array, max_bins: usize) -> Result<Array> {
    if max_bins == 0 {
        return Err(Error::Arg("need at least one bin".into()));
    }
    per_series(tss, |x| {
        let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = hi - lo;
        let mut counts = vec![0usize; max_bins];
        for &v in x {
            let bin = if span == 0.0 {
                0
            } else {
                (((v - lo) / span * max_bins as f64) as usize).min(max_bins - 1)
            };
            counts[bin] += 1;
        }
        let n = x.len() as f64;
        -counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                p * p.ln()
            })
            .sum::<f64>()
    })
}

/// Non-linearity measure `mean(x[i] * x[i+lag] * x[i+2*lag])`.
pub fn c3(tss: &Array, lag: usize) -> Result<Array> {
    try_per_series(tss, |x| {
        if x.len() <= 2 * lag {
            return Err(Error::Arg("series too short for the requested lag".into()));
        }
        let count = x.len() - 2 * lag;
        Ok((0..count).map(|i| x[i] * x[i + lag] * x[i + 2 * lag]).sum::<f64>() / count as f64)
    })
}

/// Complexity estimate `sqrt(sum(diff^2))`, optionally z-normalizing first.
pub fn cid_ce(tss: &Array, z_normalize: bool) -> Result<Array> {
    let input = if z_normalize { znorm(tss, 0, 0)? } else { tss.clone() };
    per_series(&input, |x| {
        x.windows(2).map(|w| (w[1] - w[0]) * (w[1] - w[0])).sum::<f64>().sqrt()
    })
}

/// Values above the series mean.
pub fn count_above_mean(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mu = mean_of(x);
        x.iter().filter(|&&v| v > mu).count() as f64
    })
}

/// Values below the series mean.
pub fn count_below_mean(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mu = mean_of(x);
        x.iter().filter(|&&v| v < mu).count() as f64
    })
}

fn ricker(points: usize, width: f64) -> Vec<f64> {
    let a = width;
    let norm = 2.0 / ((3.0 * a).sqrt() * std::f64::consts::PI.powf(0.25));
    (0..points)
        .map(|i| {
            let x = i as f64 - (points as f64 - 1.0) / 2.0;
            let t = x * x / (a * a);
            norm * (1.0 - t) * (-t / 2.0).exp()
        })
        .collect()
}

/// Continuous wavelet transform coefficient: Ricker wavelet at each width
/// in `widths`, sampled at position `coeff` for the width `w`.
pub fn cwt_coefficients(tss: &Array, widths: &[usize], coeff: usize, w: usize) -> Result<Array> {
    if !widths.contains(&w) {
        return Err(Error::Arg(format!("width {w} is not among the requested widths")));
    }
    try_per_series(tss, |x| {
        if coeff >= x.len() {
            return Err(Error::Arg("coefficient index exceeds the series length".into()));
        }
        let wavelet_len = (10 * w).min(x.len());
        let wav = ricker(wavelet_len, w as f64);
        // same-mode convolution
        let mut acc = 0.0;
        let center = wavelet_len / 2;
        for (k, &wv) in wav.iter().enumerate() {
            let idx = coeff as i64 + center as i64 - k as i64;
            if idx >= 0 && (idx as usize) < x.len() {
                acc += x[idx as usize] * wv;
            }
        }
        Ok(acc)
    })
}

/// Energy of chunk `focus` out of `num_segments` relative to the total.
pub fn energy_ratio_by_chunks(tss: &Array, num_segments: usize, focus: usize) -> Result<Array> {
    if focus >= num_segments {
        return Err(Error::Arg("segment focus must address one of the segments".into()));
    }
    try_per_series(tss, |x| {
        let n = x.len();
        if num_segments == 0 || num_segments > n {
            return Err(Error::Arg("invalid segment count".into()));
        }
        let lo = focus * n / num_segments;
        let hi = (focus + 1) * n / num_segments;
        let total: f64 = x.iter().map(|v| v * v).sum();
        let part: f64 = x[lo..hi].iter().map(|v| v * v).sum();
        Ok(part / total)
    })
}

fn magnitude_spectrum(x: &[f64]) -> Vec<f64> {
    let mut buf: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    engine_transform(&mut buf, false);
    buf[..x.len() / 2 + 1].iter().map(|c| c.norm()).collect()
}

/// Spectral centroid, variance, skew and kurtosis of the absolute Fourier
/// transform, as a `(4, series)` matrix.
pub fn fft_aggregated(tss: &Array) -> Result<Array> {
    let (_, cols) = columns(tss)?;
    let mut out = Vec::with_capacity(cols.len());
    for x in &cols {
        let spec = magnitude_spectrum(x);
        let total: f64 = spec.iter().sum();
        let centroid: f64 =
            spec.iter().enumerate().map(|(k, &v)| k as f64 * v).sum::<f64>() / total;
        let variance: f64 = spec
            .iter()
            .enumerate()
            .map(|(k, &v)| (k as f64 - centroid).powi(2) * v)
            .sum::<f64>()
            / total;
        let skew = if variance == 0.0 {
            f64::NAN
        } else {
            spec.iter()
                .enumerate()
                .map(|(k, &v)| (k as f64 - centroid).powi(3) * v)
                .sum::<f64>()
                / (total * variance.powf(1.5))
        };
        let kurt = if variance == 0.0 {
            f64::NAN
        } else {
            spec.iter()
                .enumerate()
                .map(|(k, &v)| (k as f64 - centroid).powi(4) * v)
                .sum::<f64>()
                / (total * variance * variance)
        };
        out.push(vec![centroid, variance, skew, kurt]);
    }
    from_columns(out)
}

/// The `k`-th Fourier coefficient per series: `(real, imag, abs, angle)`.
pub fn fft_coefficient(tss: &Array, k: usize) -> Result<(Array, Array, Array, Array)> {
    let spec = rfft(tss, Norm::Backward, &[tss.dim(0)])?;
    if k >= spec.dim(0) {
        return Err(Error::Arg(format!(
            "coefficient {k} exceeds the one-sided spectrum of {} bins",
            spec.dim(0)
        )));
    }
    let row = spec.get(&[strider_array::Selector::Index(k as i64), strider_array::Selector::Span])?;
    Ok((row.real()?, row.imag()?, row.abs()?, row.arg()?))
}

/// Relative position of the first maximum.
pub fn first_location_of_maximum(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mx = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        x.iter().position(|&v| v == mx).unwrap_or(0) as f64 / x.len() as f64
    })
}

/// Relative position of the first minimum.
pub fn first_location_of_minimum(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mn = x.iter().copied().fold(f64::INFINITY, f64::min);
        x.iter().position(|&v| v == mn).unwrap_or(0) as f64 / x.len() as f64
    })
}

/// Relative position of the last maximum.
pub fn last_location_of_maximum(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mx = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (x.iter().rposition(|&v| v == mx).unwrap_or(0) + 1) as f64 / x.len() as f64
    })
}

/// Relative position of the last minimum.
pub fn last_location_of_minimum(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mn = x.iter().copied().fold(f64::INFINITY, f64::min);
        (x.iter().rposition(|&v| v == mn).unwrap_or(0) + 1) as f64 / x.len() as f64
    })
}

fn value_counts(x: &[f64]) -> HashMap<u64, (f64, usize)> {
    let mut map: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in x {
        map.entry(v.to_bits()).or_insert((v, 0)).1 += 1;
    }
    map
}

/// Whether any value occurs more than once.
pub fn has_duplicates(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let map = value_counts(x);
        (map.len() < x.len()) as u8 as f64
    })
}

/// Whether the maximum value is duplicated.
pub fn has_duplicate_max(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mx = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (x.iter().filter(|&&v| v == mx).count() > 1) as u8 as f64
    })
}

/// Whether the minimum value is duplicated.
pub fn has_duplicate_min(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mn = x.iter().copied().fold(f64::INFINITY, f64::min);
        (x.iter().filter(|&&v| v == mn).count() > 1) as u8 as f64
    })
}

/// Relative index where `q` of the cumulative absolute mass lies left.
pub fn index_mass_quantile(tss: &Array, q: f64) -> Result<Array> {
    if !(0.0..=1.0).contains(&q) {
        return Err(Error::Arg("quantile must lie in [0, 1]".into()));
    }
    per_series(tss, |x| {
        let total: f64 = x.iter().map(|v| v.abs()).sum();
        let mut acc = 0.0;
        for (i, v) in x.iter().enumerate() {
            acc += v.abs();
            if acc / total >= q {
                return (i + 1) as f64 / x.len() as f64;
            }
        }
        1.0
    })
}

/// Whether the standard deviation exceeds `r` times the value range.
pub fn large_standard_deviation(tss: &Array, r: f64) -> Result<Array> {
    per_series(tss, |x| {
        let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (std_of(x, 0.0) > r * (hi - lo)) as u8 as f64
    })
}

/// Series length, as a feature.
pub fn length(tss: &Array) -> Result<Array> {
    per_series(tss, |x| x.len() as f64)
}

/// Regularized lower incomplete beta function by continued fraction,
/// needed for the linear-trend p-value.
fn betainc(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_beta = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b);
    let front = (ln_beta + a * x.ln() + b * (1.0 - x).ln()).exp();
    let symmetric = x > (a + 1.0) / (a + b + 2.0);
    let (a, b, x) = if symmetric { (b, a, 1.0 - x) } else { (a, b, x) };

    // Lentz's continued fraction
    let mut c = 1.0f64;
    let mut d = 1.0 - (a + b) * x / (a + 1.0);
    if d.abs() < 1e-30 {
        d = 1e-30;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..200 {
        let mf = m as f64;
        let num = mf * (b - mf) * x / ((a + 2.0 * mf - 1.0) * (a + 2.0 * mf));
        d = 1.0 + num * d;
        if d.abs() < 1e-30 {
            d = 1e-30;
        }
        c = 1.0 + num / c;
        if c.abs() < 1e-30 {
            c = 1e-30;
        }
        d = 1.0 / d;
        h *= d * c;
        let num = -(a + mf) * (a + b + mf) * x / ((a + 2.0 * mf) * (a + 2.0 * mf + 1.0));
        d = 1.0 + num * d;
        if d.abs() < 1e-30 {
            d = 1e-30;
        }
        c = 1.0 + num / c;
        if c.abs() < 1e-30 {
            c = 1e-30;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-12 {
            break;
        }
    }
    let value = front * h / a;
    if symmetric {
        1.0 - value
    } else {
        value
    }
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation
    const G: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000000000190015;
    for g in G {
        y += 1.0;
        ser += g / y;
    }
    -tmp + (2.5066282746310005 * ser / x).ln()
}

fn t_sf(t: f64, df: f64) -> f64 {
    // two-sided survival via the incomplete beta
    betainc(df / 2.0, 0.5, df / (df + t * t))
}

/// Ordinary least squares against time: `(pvalue, rvalue, intercept,
/// slope, stderr)` as five row vectors.
pub fn linear_trend(tss: &Array) -> Result<(Array, Array, Array, Array, Array)> {
    let (n, cols) = columns(tss)?;
    if n < 3 {
        return Err(Error::Arg("linear trend requires at least three samples".into()));
    }
    let nf = n as f64;
    let tx: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let mean_x = mean_of(&tx);
    let ssx: f64 = tx.iter().map(|v| (v - mean_x) * (v - mean_x)).sum();

    let mut pv = Vec::new();
    let mut rv = Vec::new();
    let mut ic = Vec::new();
    let mut sl = Vec::new();
    let mut se = Vec::new();
    for y in &cols {
        let mean_y = mean_of(y);
        let sxy: f64 = tx.iter().zip(y.iter()).map(|(&a, &b)| (a - mean_x) * (b - mean_y)).sum();
        let ssy: f64 = y.iter().map(|v| (v - mean_y) * (v - mean_y)).sum();
        let slope = sxy / ssx;
        let intercept = mean_y - slope * mean_x;
        let r = if ssy == 0.0 { 0.0 } else { sxy / (ssx * ssy).sqrt() };
        let df = nf - 2.0;
        let resid: f64 = tx
            .iter()
            .zip(y.iter())
            .map(|(&a, &b)| {
                let fit = intercept + slope * a;
                (b - fit) * (b - fit)
            })
            .sum();
        let stderr = (resid / df / ssx).sqrt();
        let p = if stderr == 0.0 {
            0.0
        } else {
            t_sf(slope / stderr, df)
        };
        pv.push(p);
        rv.push(r);
        ic.push(intercept);
        sl.push(slope);
        se.push(stderr);
    }
    Ok((
        row_vector(pv)?,
        row_vector(rv)?,
        row_vector(ic)?,
        row_vector(sl)?,
        row_vector(se)?,
    ))
}

/// Per-position flags of strict local maxima, shaped like the input.
pub fn local_maximals(tss: &Array) -> Result<Array> {
    let (_, cols) = columns(tss)?;
    let flagged: Vec<Vec<f64>> = cols
        .iter()
        .map(|x| {
            let n = x.len();
            (0..n)
                .map(|i| {
                    (i > 0 && i + 1 < n && x[i - 1] < x[i] && x[i] > x[i + 1]) as u8 as f64
                })
                .collect()
        })
        .collect();
    from_columns(flagged)
}

fn longest_strike(x: &[f64], above: bool) -> f64 {
    let mu = mean_of(x);
    let mut best = 0usize;
    let mut run = 0usize;
    for &v in x {
        let hit = if above { v > mu } else { v < mu };
        if hit {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best as f64
}

/// Longest run of values above the mean.
pub fn longest_strike_above_mean(tss: &Array) -> Result<Array> {
    per_series(tss, |x| longest_strike(x, true))
}

/// Longest run of values below the mean.
pub fn longest_strike_below_mean(tss: &Array) -> Result<Array> {
    per_series(tss, |x| longest_strike(x, false))
}

pub fn maximum(tss: &Array) -> Result<Array> {
    per_series(tss, |x| x.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn minimum(tss: &Array) -> Result<Array> {
    per_series(tss, |x| x.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn mean(tss: &Array) -> Result<Array> {
    per_series(tss, mean_of)
}

/// Mean absolute consecutive change.
pub fn mean_absolute_change(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        x.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (x.len() - 1) as f64
    })
}

/// Mean consecutive change (telescopes to the endpoints).
pub fn mean_change(tss: &Array) -> Result<Array> {
    per_series(tss, |x| (x[x.len() - 1] - x[0]) / (x.len() - 1) as f64)
}

/// Mean central second derivative.
pub fn mean_second_derivative_central(tss: &Array) -> Result<Array> {
    try_per_series(tss, |x| {
        let n = x.len();
        if n < 3 {
            return Err(Error::Arg("second derivative requires at least three samples".into()));
        }
        Ok((0..n - 2)
            .map(|i| (x[i + 2] - 2.0 * x[i + 1] + x[i]) / 2.0)
            .sum::<f64>()
            / (n - 2) as f64)
    })
}

pub fn median(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let mut v = x.to_vec();
        v.sort_by(f64::total_cmp);
        let n = v.len();
        if n % 2 == 1 {
            v[n / 2]
        } else {
            0.5 * (v[n / 2 - 1] + v[n / 2])
        }
    })
}

/// Count of crossings of the level `m` (strict sign changes of `x - m`).
pub fn number_crossing_m(tss: &Array, m: f64) -> Result<Array> {
    per_series(tss, |x| {
        x.windows(2)
            .filter(|w| (w[0] > m && w[1] < m) || (w[0] < m && w[1] > m))
            .count() as f64
    })
}

/// Count of peaks that exceed their `support` neighbors on both sides.
pub fn number_peaks(tss: &Array, support: usize) -> Result<Array> {
    per_series(tss, |x| {
        let n = x.len();
        (support..n.saturating_sub(support))
            .filter(|&i| {
                (1..=support).all(|d| x[i] > x[i - d] && x[i] > x[i + d])
            })
            .count() as f64
    })
}

/// Share of data points whose value occurs more than once.
pub fn percentage_of_reoccurring_datapoints_to_all_datapoints(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let map = value_counts(x);
        let reoccurring: usize = map.values().filter(|(_, c)| *c > 1).map(|(_, c)| *c).sum();
        reoccurring as f64 / x.len() as f64
    })
}

/// Share of distinct values that occur more than once.
pub fn percentage_of_reoccurring_values_to_all_values(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let map = value_counts(x);
        let reoccurring = map.values().filter(|(_, c)| *c > 1).count();
        reoccurring as f64 / map.len() as f64
    })
}

/// Count of values within `[lo, hi)`.
pub fn range_count(tss: &Array, lo: f64, hi: f64) -> Result<Array> {
    per_series(tss, |x| x.iter().filter(|&&v| v >= lo && v < hi).count() as f64)
}

/// Fraction of values farther than `r` standard deviations from the mean.
pub fn ratio_beyond_r_sigma(tss: &Array, r: f64) -> Result<Array> {
    per_series(tss, |x| {
        let mu = mean_of(x);
        let sd = std_of(x, 0.0);
        x.iter().filter(|&&v| (v - mu).abs() > r * sd).count() as f64 / x.len() as f64
    })
}

/// Distinct values relative to the series length.
pub fn ratio_value_number_to_time_series_length(tss: &Array) -> Result<Array> {
    per_series(tss, |x| value_counts(x).len() as f64 / x.len() as f64)
}

pub fn skewness(tss: &Array) -> Result<Array> {
    strider_stats::skewness(tss)
}

pub fn kurtosis(tss: &Array) -> Result<Array> {
    strider_stats::kurtosis(tss)
}

/// Welch power density at bin `coeff`: Hann window over the full series,
/// one segment.
pub fn spkt_welch_density(tss: &Array, coeff: usize) -> Result<Array> {
    try_per_series(tss, |x| {
        let n = x.len();
        if coeff > n / 2 {
            return Err(Error::Arg(format!(
                "welch density bin {coeff} exceeds the one-sided spectrum"
            )));
        }
        let hann: Vec<f64> = (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos())
            .collect();
        let win_power: f64 = hann.iter().map(|w| w * w).sum();
        let mu = mean_of(x);
        let mut buf: Vec<Complex64> = x
            .iter()
            .zip(&hann)
            .map(|(&v, &w)| Complex64::new((v - mu) * w, 0.0))
            .collect();
        engine_transform(&mut buf, false);
        let mut p = buf[coeff].norm_sqr() / win_power;
        if coeff != 0 && !(n % 2 == 0 && coeff == n / 2) {
            p *= 2.0;
        }
        Ok(p)
    })
}

pub fn standard_deviation(tss: &Array) -> Result<Array> {
    per_series(tss, |x| std_of(x, 0.0))
}

/// Sum over all points whose value reoccurs.
pub fn sum_of_reoccurring_datapoints(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        value_counts(x)
            .values()
            .filter(|(_, c)| *c > 1)
            .map(|(v, c)| v * *c as f64)
            .sum()
    })
}

/// Sum of the distinct values that reoccur.
pub fn sum_of_reoccurring_values(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        value_counts(x).values().filter(|(_, c)| *c > 1).map(|(v, _)| *v).sum()
    })
}

pub fn sum_values(tss: &Array) -> Result<Array> {
    per_series(tss, |x| x.iter().sum())
}

/// Whether `|mean - median|` stays within `r` times the value range.
pub fn symmetry_looking(tss: &Array, r: f64) -> Result<Array> {
    let med = median(tss)?;
    let (_, cols) = columns(tss)?;
    let med = med.host_vec::<f64>()?;
    let values: Vec<f64> = cols
        .iter()
        .zip(med)
        .map(|(x, md)| {
            let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            ((mean_of(x) - md).abs() < r * (hi - lo)) as u8 as f64
        })
        .collect();
    row_vector(values)
}

/// `mean(x[i+2l]^2 x[i+l] - x[i+l] x[i]^2)`.
pub fn time_reversal_asymmetry_statistic(tss: &Array, lag: usize) -> Result<Array> {
    try_per_series(tss, |x| {
        let n = x.len();
        if n <= 2 * lag {
            return Err(Error::Arg("series too short for the requested lag".into()));
        }
        let count = n - 2 * lag;
        Ok((0..count)
            .map(|i| x[i + 2 * lag] * x[i + 2 * lag] * x[i + lag] - x[i + lag] * x[i] * x[i])
            .sum::<f64>()
            / count as f64)
    })
}

/// Occurrences of the exact value `v`.
pub fn value_count(tss: &Array, v: f64) -> Result<Array> {
    per_series(tss, |x| x.iter().filter(|&&e| e == v).count() as f64)
}

pub fn variance(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let sd = std_of(x, 0.0);
        sd * sd
    })
}

/// Whether the variance exceeds the standard deviation (variance above 1).
pub fn variance_larger_than_standard_deviation(tss: &Array) -> Result<Array> {
    per_series(tss, |x| {
        let sd = std_of(x, 0.0);
        (sd * sd > sd) as u8 as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(data: &[f64]) -> Array {
        Array::from_slice(data, &[data.len(), 1]).unwrap()
    }

    #[test]
    fn energy_and_changes() {
        let t = single(&[1.0, 2.0, -1.0]);
        assert_eq!(abs_energy(&t).unwrap().scalar::<f64>().unwrap(), 6.0);
        assert_eq!(absolute_sum_of_changes(&t).unwrap().scalar::<f64>().unwrap(), 4.0);
    }

    #[test]
    fn counting_features() {
        let t = single(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(count_above_mean(&t).unwrap().scalar::<f64>().unwrap(), 2.0);
        assert_eq!(count_below_mean(&t).unwrap().scalar::<f64>().unwrap(), 2.0);
        assert_eq!(length(&t).unwrap().scalar::<f64>().unwrap(), 5.0);
        assert_eq!(maximum(&t).unwrap().scalar::<f64>().unwrap(), 5.0);
        assert_eq!(minimum(&t).unwrap().scalar::<f64>().unwrap(), 1.0);
    }

    #[test]
    fn duplicates_and_reoccurrence() {
        let t = single(&[1.0, 2.0, 2.0, 3.0, 3.0, 3.0]);
        assert_eq!(has_duplicates(&t).unwrap().scalar::<f64>().unwrap(), 1.0);
        assert_eq!(has_duplicate_max(&t).unwrap().scalar::<f64>().unwrap(), 1.0);
        assert_eq!(has_duplicate_min(&t).unwrap().scalar::<f64>().unwrap(), 0.0);
        // 5 of 6 points belong to reoccurring values
        let pct = percentage_of_reoccurring_datapoints_to_all_datapoints(&t).unwrap();
        assert!((pct.scalar::<f64>().unwrap() - 5.0 / 6.0).abs() < 1e-12);
        // 2 of 3 distinct values reoccur
        let pv = percentage_of_reoccurring_values_to_all_values(&t).unwrap();
        assert!((pv.scalar::<f64>().unwrap() - 2.0 / 3.0).abs() < 1e-12);
        // 2*2 + 3*3 = 13
        assert_eq!(sum_of_reoccurring_datapoints(&t).unwrap().scalar::<f64>().unwrap(), 13.0);
        assert_eq!(sum_of_reoccurring_values(&t).unwrap().scalar::<f64>().unwrap(), 5.0);
    }

    #[test]
    fn strikes_and_crossings() {
        let t = single(&[0.0, 2.0, 2.0, 2.0, 0.0, 2.0, 0.0, 0.0]);
        assert_eq!(longest_strike_above_mean(&t).unwrap().scalar::<f64>().unwrap(), 3.0);
        assert_eq!(longest_strike_below_mean(&t).unwrap().scalar::<f64>().unwrap(), 2.0);
        assert_eq!(number_crossing_m(&t, 1.0).unwrap().scalar::<f64>().unwrap(), 4.0);
    }

    #[test]
    fn peaks() {
        let t = single(&[0.0, 3.0, 0.0, 1.0, 0.0, 5.0, 0.0]);
        assert_eq!(number_peaks(&t, 1).unwrap().scalar::<f64>().unwrap(), 3.0);
        // support 2 leaves no interior candidate with both neighbors in range
        assert_eq!(number_peaks(&t, 2).unwrap().scalar::<f64>().unwrap(), 0.0);
        let flags = local_maximals(&t).unwrap().host_vec::<f64>().unwrap();
        assert_eq!(flags, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn mass_quantile_and_locations() {
        let t = single(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(index_mass_quantile(&t, 0.5).unwrap().scalar::<f64>().unwrap(), 0.5);
        let t = single(&[0.0, 5.0, 5.0, 0.0]);
        assert_eq!(first_location_of_maximum(&t).unwrap().scalar::<f64>().unwrap(), 0.25);
        assert_eq!(last_location_of_maximum(&t).unwrap().scalar::<f64>().unwrap(), 0.75);
    }

    #[test]
    fn mean_family() {
        let t = single(&[1.0, 4.0, 9.0]);
        assert_eq!(mean_change(&t).unwrap().scalar::<f64>().unwrap(), 4.0);
        assert_eq!(mean_absolute_change(&t).unwrap().scalar::<f64>().unwrap(), 4.0);
        // ((9 - 8 + 1) / 2) / 1 = 1
        assert_eq!(
            mean_second_derivative_central(&t).unwrap().scalar::<f64>().unwrap(),
            1.0
        );
    }

    #[test]
    fn linear_trend_on_exact_line() {
        let t = single(&[1.0, 3.0, 5.0, 7.0, 9.0]);
        let (p, r, intercept, slope, stderr) = linear_trend(&t).unwrap();
        assert!((slope.scalar::<f64>().unwrap() - 2.0).abs() < 1e-12);
        assert!((intercept.scalar::<f64>().unwrap() - 1.0).abs() < 1e-12);
        assert!((r.scalar::<f64>().unwrap() - 1.0).abs() < 1e-12);
        assert!(stderr.scalar::<f64>().unwrap() < 1e-12);
        assert!(p.scalar::<f64>().unwrap() < 1e-12);
    }

    #[test]
    fn c3_and_time_reversal() {
        let t = single(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // lag 1: mean of x[i]*x[i+1]*x[i+2] over 4 terms
        let expect = (6.0 + 24.0 + 60.0 + 120.0) / 4.0;
        assert!((c3(&t, 1).unwrap().scalar::<f64>().unwrap() - expect).abs() < 1e-12);
        assert!(c3(&t, 2).is_ok());
        assert!(c3(&t, 3).is_err());
        assert!(time_reversal_asymmetry_statistic(&t, 1).unwrap().scalar::<f64>().unwrap() > 0.0);
    }

    #[test]
    fn entropy_features() {
        let regular = single(&[1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        let ae = approximate_entropy(&regular, 2, 0.5).unwrap().scalar::<f64>().unwrap();
        assert!(ae.abs() < 0.2, "regular series should have low entropy, got {ae}");
        assert!(approximate_entropy(&single(&[1.0, 2.0]), 2, 0.5).is_err());

        let b = binned_entropy(&single(&[1.0, 1.0, 2.0, 2.0]), 2).unwrap();
        assert!((b.scalar::<f64>().unwrap() - (2.0f64).ln() * 1.0).abs() < 1e-9);
    }

    #[test]
    fn welch_density_peaks_at_signal_frequency() {
        let n = 64usize;
        let data: Vec<f64> =
            (0..n).map(|k| (2.0 * std::f64::consts::PI * 8.0 * k as f64 / n as f64).sin()).collect();
        let t = single(&data);
        let at_peak = spkt_welch_density(&t, 8).unwrap().scalar::<f64>().unwrap();
        let off_peak = spkt_welch_density(&t, 3).unwrap().scalar::<f64>().unwrap();
        assert!(at_peak > 100.0 * off_peak.max(1e-12));
    }

    #[test]
    fn fft_features() {
        let t = single(&[1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0, 0.0]);
        let (re, im, mag, _angle) = fft_coefficient(&t, 2).unwrap();
        assert!((re.scalar::<f64>().unwrap() - 4.0).abs() < 1e-9);
        assert!(im.scalar::<f64>().unwrap().abs() < 1e-9);
        assert!((mag.scalar::<f64>().unwrap() - 4.0).abs() < 1e-9);

        let agg = fft_aggregated(&t).unwrap();
        assert_eq!(agg.dims()[0], 4);
        let centroid = agg.host_vec::<f64>().unwrap()[0];
        assert!((centroid - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sigma_ratios() {
        let t = single(&[0.0, 0.0, 0.0, 0.0, 100.0]);
        let ratio = ratio_beyond_r_sigma(&t, 1.0).unwrap().scalar::<f64>().unwrap();
        assert!((ratio - 0.2).abs() < 1e-12);
        assert_eq!(
            ratio_value_number_to_time_series_length(&t).unwrap().scalar::<f64>().unwrap(),
            0.4
        );
    }

    #[test]
    fn cid_ce_z_normalization_changes_scale() {
        let t = single(&[0.0, 10.0, 0.0, 10.0]);
        let raw = cid_ce(&t, false).unwrap().scalar::<f64>().unwrap();
        let zed = cid_ce(&t, true).unwrap().scalar::<f64>().unwrap();
        assert!(raw > zed);
    }

    #[test]
    fn two_series_vectorize() {
        let t = Array::from_slice(&[1.0, 2.0, 3.0, 10.0, 20.0, 30.0], &[3, 2]).unwrap();
        let m = mean(&t).unwrap().host_vec::<f64>().unwrap();
        assert_eq!(m, vec![2.0, 20.0]);
        let s = sum_values(&t).unwrap().host_vec::<f64>().unwrap();
        assert_eq!(s, vec![6.0, 60.0]);
    }
}
