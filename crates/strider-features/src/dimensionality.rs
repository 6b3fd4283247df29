//! Dimensionality reduction
//!
//! Series reducers (PAA, SAX) operate on `(length, series)` matrices;
//! polyline reducers (PIP, PLA, RDP, Visvalingam) operate on `(n, 2)`
//! point matrices with x in the first column and y in the second.

use strider_array::{Array, Error, Result};

use crate::normalization::znorm;
use crate::util::{columns, from_columns};

fn point_set(points: &Array) -> Result<Vec<(f64, f64)>> {
    if points.dim(1) != 2 {
        return Err(Error::Arg("expected an (n, 2) point matrix".into()));
    }
    let n = points.dim(0);
    let data = points.host_vec::<f64>()?;
    Ok((0..n).map(|i| (data[i], data[n + i])).collect())
}

fn points_to_array(points: &[(f64, f64)]) -> Result<Array> {
    let n = points.len();
    let mut flat = Vec::with_capacity(2 * n);
    flat.extend(points.iter().map(|p| p.0));
    flat.extend(points.iter().map(|p| p.1));
    Array::from_slice(&flat, &[n, 2])
}

/// Piecewise aggregate approximation: mean of each of `bins` equal spans.
pub fn paa(a: &Array, bins: usize) -> Result<Array> {
    if bins == 0 {
        return Err(Error::Arg("need at least one bin".into()));
    }
    let (n, cols) = columns(a)?;
    if bins > n {
        return Err(Error::Arg("more bins than samples".into()));
    }
    let reduced: Vec<Vec<f64>> = cols
        .iter()
        .map(|col| {
            (0..bins)
                .map(|b| {
                    let lo = b * n / bins;
                    let hi = ((b + 1) * n / bins).max(lo + 1);
                    col[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
                })
                .collect()
        })
        .collect();
    from_columns(reduced)
}

fn vertical_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    if (b.0 - a.0).abs() < f64::EPSILON {
        return (p.1 - a.1).abs();
    }
    let t = (p.0 - a.0) / (b.0 - a.0);
    (p.1 - (a.1 + t * (b.1 - a.1))).abs()
}

/// Perceptually important points: grow the kept set from the endpoints by
/// repeatedly adding the point farthest (vertically) from its bracketing
/// kept neighbors.
pub fn pip(points: &Array, number_ips: usize) -> Result<Array> {
    let pts = point_set(points)?;
    let n = pts.len();
    if number_ips < 2 {
        return Err(Error::Arg("at least the two endpoints are required".into()));
    }
    if number_ips >= n {
        return points_to_array(&pts);
    }
    let mut kept: Vec<usize> = vec![0, n - 1];
    while kept.len() < number_ips {
        let mut best = (0usize, f64::NEG_INFINITY);
        for w in kept.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            for i in lo + 1..hi {
                let d = vertical_distance(pts[i], pts[lo], pts[hi]);
                if d > best.1 {
                    best = (i, d);
                }
            }
        }
        if best.1 <= f64::NEG_INFINITY {
            break;
        }
        let pos = kept.partition_point(|&k| k < best.0);
        kept.insert(pos, best.0);
    }
    points_to_array(&kept.into_iter().map(|i| pts[i]).collect::<Vec<_>>())
}

fn segment_error(pts: &[(f64, f64)], lo: usize, hi: usize) -> f64 {
    (lo + 1..hi)
        .map(|i| vertical_distance(pts[i], pts[lo], pts[hi]))
        .fold(0.0, f64::max)
}

/// Bottom-up piecewise linear approximation: merge adjacent segments while
/// the merged interpolation error stays within `max_error`.
pub fn pla_bottom_up(points: &Array, max_error: f64) -> Result<Array> {
    let pts = point_set(points)?;
    let n = pts.len();
    if n < 3 {
        return points_to_array(&pts);
    }
    // segment boundaries as indices into pts
    let mut bounds: Vec<usize> = (0..n).step_by(2).chain(std::iter::once(n - 1)).collect();
    bounds.dedup();

    loop {
        let mut best: Option<(usize, f64)> = None;
        for k in 0..bounds.len().saturating_sub(2) {
            let err = segment_error(&pts, bounds[k], bounds[k + 2]);
            if err <= max_error && best.map(|(_, e)| err < e).unwrap_or(true) {
                best = Some((k + 1, err));
            }
        }
        match best {
            Some((idx, _)) => {
                bounds.remove(idx);
            }
            None => break,
        }
    }
    points_to_array(&bounds.into_iter().map(|i| pts[i]).collect::<Vec<_>>())
}

/// Sliding-window piecewise linear approximation: grow each segment until
/// its interpolation error exceeds `max_error`.
pub fn pla_sliding_window(points: &Array, max_error: f64) -> Result<Array> {
    let pts = point_set(points)?;
    let n = pts.len();
    if n < 3 {
        return points_to_array(&pts);
    }
    let mut anchors = vec![0usize];
    let mut anchor = 0usize;
    let mut i = anchor + 2;
    while i < n {
        if segment_error(&pts, anchor, i) > max_error {
            anchor = i - 1;
            anchors.push(anchor);
            i = anchor + 2;
        } else {
            i += 1;
        }
    }
    anchors.push(n - 1);
    anchors.dedup();
    points_to_array(&anchors.into_iter().map(|i| pts[i]).collect::<Vec<_>>())
}

fn perpendicular_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let norm = (dx * dx + dy * dy).sqrt();
    if norm == 0.0 {
        return ((p.0 - a.0).powi(2) + (p.1 - a.1).powi(2)).sqrt();
    }
    (dy * p.0 - dx * p.1 + b.0 * a.1 - b.1 * a.0).abs() / norm
}

fn rdp_recurse(pts: &[(f64, f64)], lo: usize, hi: usize, epsilon: f64, keep: &mut Vec<usize>) {
    let mut best = (lo, 0.0f64);
    for i in lo + 1..hi {
        let d = perpendicular_distance(pts[i], pts[lo], pts[hi]);
        if d > best.1 {
            best = (i, d);
        }
    }
    if best.1 > epsilon {
        rdp_recurse(pts, lo, best.0, epsilon, keep);
        keep.push(best.0);
        rdp_recurse(pts, best.0, hi, epsilon, keep);
    }
}

/// Ramer-Douglas-Peucker simplification with tolerance `epsilon`.
pub fn ramer_douglas_peucker(points: &Array, epsilon: f64) -> Result<Array> {
    let pts = point_set(points)?;
    if pts.len() < 3 {
        return points_to_array(&pts);
    }
    let mut keep = vec![0usize];
    rdp_recurse(&pts, 0, pts.len() - 1, epsilon, &mut keep);
    keep.push(pts.len() - 1);
    points_to_array(&keep.into_iter().map(|i| pts[i]).collect::<Vec<_>>())
}

fn triangle_area(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    ((a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1)) / 2.0).abs()
}

/// Visvalingam simplification down to `num_points` by repeatedly removing
/// the point spanning the smallest triangle with its neighbors.
pub fn visvalingam(points: &Array, num_points: usize) -> Result<Array> {
    let mut pts = point_set(points)?;
    if num_points < 2 {
        return Err(Error::Arg("at least the two endpoints are required".into()));
    }
    while pts.len() > num_points {
        let mut best = (1usize, f64::INFINITY);
        for i in 1..pts.len() - 1 {
            let area = triangle_area(pts[i - 1], pts[i], pts[i + 1]);
            if area < best.1 {
                best = (i, area);
            }
        }
        pts.remove(best.0);
    }
    points_to_array(&pts)
}

/// Acklam's rational approximation to the standard normal quantile.
fn norm_ppf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    let p_low = 0.02425;
    if p < p_low {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - p_low {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Symbolic aggregate approximation: z-normalize each series and map every
/// value to its Gaussian-equiprobable symbol in `0..alphabet_size`.
pub fn sax(a: &Array, alphabet_size: usize) -> Result<Array> {
    if alphabet_size < 2 {
        return Err(Error::Arg("the alphabet needs at least two symbols".into()));
    }
    let z = znorm(a, 0, 0)?;
    let breakpoints: Vec<f64> = (1..alphabet_size)
        .map(|k| norm_ppf(k as f64 / alphabet_size as f64))
        .collect();
    let (_, cols) = columns(&z)?;
    let symbols: Vec<Vec<f64>> = cols
        .iter()
        .map(|col| {
            col.iter()
                .map(|&v| breakpoints.partition_point(|&b| b < v) as f64)
                .collect()
        })
        .collect();
    let out = from_columns(symbols)?;
    out.cast(strider_core::DType::U32)
}
