//! Clustering for the Strider analytics engine
//!
//! Lloyd k-means over raw series and k-shape over z-normalized series.
//! k-shape measures `1 - max_tau NCC(a, b, tau)` with the normalized
//! cross-correlation computed through FFT convolution, and updates each
//! centroid with the leading eigenvector of the centered `X X^T` matrix.

use num_complex::Complex64;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use strider_array::{Array, Error, Result};
use strider_fft::engine_transform;
use strider_features::znorm;
use strider_linalg::{eigh, matmul, MatProp};

fn series_columns(tss: &Array) -> Result<(usize, Vec<Vec<f64>>)> {
    if tss.ndims() > 2 {
        return Err(Error::Arg("expected a series matrix of shape (length, series)".into()));
    }
    let n = tss.dim(0);
    let s = tss.dim(1);
    let data = tss.host_vec::<f64>()?;
    Ok((n, (0..s).map(|c| data[c * n..(c + 1) * n].to_vec()).collect()))
}

fn matrix_from_columns(cols: &[Vec<f64>]) -> Result<Array> {
    let n = cols[0].len();
    let mut flat = Vec::with_capacity(n * cols.len());
    for c in cols {
        flat.extend_from_slice(c);
    }
    Array::from_slice(&flat, &[n, cols.len()])
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Round-robin labels, shuffled.
fn random_labels(count: usize, k: usize) -> Vec<u32> {
    let mut labels: Vec<u32> = (0..count).map(|i| (i % k) as u32).collect();
    let mut rng = rand::rngs::StdRng::from_entropy();
    labels.shuffle(&mut rng);
    labels
}

/// Lloyd k-means with Euclidean distance.
///
/// Returns `(centroids, labels)`: centroids by column, one label per
/// series. Initial centroids/labels may be supplied; otherwise centroids
/// start at zero and labels are assigned round-robin at random. Iteration
/// stops when the summed centroid movement drops to `tolerance` or after
/// `max_iterations`.
pub fn k_means(
    tss: &Array,
    k: usize,
    centroids: Option<&Array>,
    labels: Option<&Array>,
    tolerance: f64,
    max_iterations: usize,
) -> Result<(Array, Array)> {
    if k == 0 {
        return Err(Error::Arg("need at least one cluster".into()));
    }
    let (n, cols) = series_columns(tss)?;
    let s = cols.len();
    if k > s {
        return Err(Error::Arg("more clusters than series".into()));
    }

    let mut means: Vec<Vec<f64>> = match centroids {
        Some(c) => series_columns(c)?.1,
        None => vec![vec![0.0; n]; k],
    };
    let mut assignment: Vec<u32> = match labels {
        Some(l) => l.host_vec::<u32>()?,
        None => random_labels(s, k),
    };

    let mut iter = 0usize;
    let mut error = f64::MAX;
    while error > tolerance && iter < max_iterations {
        // assign each series to its closest mean
        for (i, col) in cols.iter().enumerate() {
            let mut best = (0usize, f64::INFINITY);
            for (j, mean) in means.iter().enumerate() {
                let d = euclidean(col, mean);
                if d < best.1 {
                    best = (j, d);
                }
            }
            assignment[i] = best.0 as u32;
        }
        // recompute means
        let mut new_means = vec![vec![0.0; n]; k];
        let mut counts = vec![0usize; k];
        for (i, col) in cols.iter().enumerate() {
            let j = assignment[i] as usize;
            counts[j] += 1;
            for (slot, &v) in new_means[j].iter_mut().zip(col) {
                *slot += v;
            }
        }
        for (mean, &count) in new_means.iter_mut().zip(&counts) {
            if count > 0 {
                for v in mean.iter_mut() {
                    *v /= count as f64;
                }
            }
        }
        error = means
            .iter()
            .zip(&new_means)
            .map(|(old, new)| euclidean(old, new))
            .sum();
        means = new_means;
        iter += 1;
    }

    Ok((
        matrix_from_columns(&means)?,
        Array::from_storage(
            strider_array::storage::Storage::U32(assignment),
            strider_array::Shape::vector(s),
        )?,
    ))
}

/// Full normalized cross-correlation (length `2m - 1`) via FFT.
fn ncc(a: &[f64], b: &[f64]) -> Vec<f64> {
    let m = a.len();
    let full = 2 * m - 1;
    let na: f64 = a.iter().map(|v| v * v).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|v| v * v).sum::<f64>().sqrt();
    let den = (na * nb).max(f64::MIN_POSITIVE);

    let mut fa = vec![Complex64::new(0.0, 0.0); full];
    for (i, &v) in a.iter().enumerate() {
        fa[i] = Complex64::new(v, 0.0);
    }
    // convolution with the reversed operand yields cross-correlation
    let mut fb = vec![Complex64::new(0.0, 0.0); full];
    for (i, &v) in b.iter().rev().enumerate() {
        fb[i] = Complex64::new(v, 0.0);
    }
    engine_transform(&mut fa, false);
    engine_transform(&mut fb, false);
    for (x, y) in fa.iter_mut().zip(&fb) {
        *x *= y;
    }
    engine_transform(&mut fa, true);
    let scale = 1.0 / (full as f64 * den);
    fa.into_iter().map(|v| v.re * scale).collect()
}

/// Shape-based distance `1 - max NCC`.
fn shape_distance(a: &[f64], b: &[f64]) -> f64 {
    1.0 - ncc(a, b).into_iter().fold(f64::NEG_INFINITY, f64::max)
}

/// Shape extraction: leading eigenvector of `P (X X^T) P`, z-normalized,
/// sign-matched to the cluster's first member.
fn shape_extraction(members: &[&Vec<f64>]) -> Result<Vec<f64>> {
    let m = members[0].len();
    let x = matrix_from_columns(&members.iter().map(|v| (*v).clone()).collect::<Vec<_>>())?;
    let s = matmul(&x, &x, MatProp::None, MatProp::Trans)?;

    // centering projector P = I - (1/m) * ones
    let scale = 1.0 / m as f64;
    let p_data: Vec<f64> = (0..m * m)
        .map(|idx| {
            let (r, c) = (idx % m, idx / m);
            (if r == c { 1.0 } else { 0.0 }) - scale
        })
        .collect();
    let p = Array::from_slice(&p_data, &[m, m])?;
    let centered = matmul(&p, &matmul(&s, &p, MatProp::None, MatProp::None)?, MatProp::None, MatProp::None)?;

    let (_, vecs) = eigh(&centered)?;
    // the last column pairs with the largest eigenvalue
    let c = vecs.col((m - 1) as i64)?;
    let c = znorm(&c.reshape(&[m, 1])?, 0, 1)?;
    let c = c.host_vec::<f64>()?;

    let first = members[0];
    let d_plus: f64 = first.iter().zip(&c).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt();
    let d_minus: f64 = first.iter().zip(&c).map(|(a, b)| (a + b) * (a + b)).sum::<f64>().sqrt();
    Ok(if d_plus >= d_minus {
        c.into_iter().map(|v| -v).collect()
    } else {
        c
    })
}

fn validate_labels(labels: &[u32], count: usize, k: usize) -> Result<()> {
    if labels.len() != count {
        return Err(Error::Arg(
            "the number of labels must equal the number of time series".into(),
        ));
    }
    let mut seen = vec![false; k];
    for &l in labels {
        if (l as usize) >= k {
            return Err(Error::Arg(
                "labels must range from 0 up to the number of clusters".into(),
            ));
        }
        seen[l as usize] = true;
    }
    if !seen.iter().all(|&s| s) {
        return Err(Error::Arg(
            "the unique labels do not cover the number of clusters".into(),
        ));
    }
    Ok(())
}

/// k-shape calibration: returns `(centroids, labels)`.
///
/// The input is z-normalized; assignment uses the shape-based distance and
/// refinement the spectral shape extraction. Terminates when labels stop
/// changing or after `max_iterations`.
pub fn kshape_calibrate(
    tss: &Array,
    k: usize,
    initial_centroids: Option<&Array>,
    initial_labels: Option<&Array>,
    max_iterations: usize,
    rnd_labels: bool,
) -> Result<(Array, Array)> {
    if k == 0 {
        return Err(Error::Arg("need at least one cluster".into()));
    }
    let (n, _) = series_columns(tss)?;
    let normalized = znorm(tss, 0, 1)?;
    let (_, cols) = series_columns(&normalized)?;
    let s = cols.len();
    if k > s {
        return Err(Error::Arg("more clusters than series".into()));
    }

    let mut labels: Vec<u32> = match initial_labels {
        Some(l) => {
            let l = l.host_vec::<u32>()?;
            validate_labels(&l, s, k)?;
            l
        }
        None => {
            if rnd_labels {
                random_labels(s, k)
            } else {
                (0..s).map(|i| (i % k) as u32).collect()
            }
        }
    };
    let mut centroids: Vec<Vec<f64>> = match initial_centroids {
        Some(c) => {
            let (cn, cols) = series_columns(c)?;
            if cn != n || cols.len() != k {
                return Err(Error::Arg(
                    "initial centroids must be an (length, k) matrix".into(),
                ));
            }
            cols
        }
        None => vec![vec![0.0; n]; k],
    };

    for _iter in 0..max_iterations {
        // refinement: new centroid shapes
        for j in 0..k {
            let members: Vec<&Vec<f64>> = cols
                .iter()
                .zip(&labels)
                .filter(|(_, &l)| l as usize == j)
                .map(|(c, _)| c)
                .collect();
            if !members.is_empty() {
                centroids[j] = shape_extraction(&members)?;
            }
        }
        // assignment under the shape-based distance
        let new_labels: Vec<u32> = cols
            .iter()
            .map(|col| {
                let mut best = (0usize, f64::INFINITY);
                for (j, c) in centroids.iter().enumerate() {
                    let d = shape_distance(col, c);
                    if d < best.1 {
                        best = (j, d);
                    }
                }
                best.0 as u32
            })
            .collect();
        let converged = new_labels == labels;
        labels = new_labels;
        if converged {
            break;
        }
    }

    Ok((
        matrix_from_columns(&centroids)?,
        Array::from_storage(
            strider_array::storage::Storage::U32(labels),
            strider_array::Shape::vector(s),
        )?,
    ))
}

/// Assign each series to its nearest k-shape centroid.
pub fn kshape_classify(tss: &Array, centroids: &Array) -> Result<Array> {
    let normalized = znorm(tss, 0, 1)?;
    let (_, cols) = series_columns(&normalized)?;
    let (_, cents) = series_columns(centroids)?;
    let labels: Vec<u32> = cols
        .iter()
        .map(|col| {
            let mut best = (0usize, f64::INFINITY);
            for (j, c) in cents.iter().enumerate() {
                let d = shape_distance(col, c);
                if d < best.1 {
                    best = (j, d);
                }
            }
            best.0 as u32
        })
        .collect();
    let s = labels.len();
    Array::from_storage(
        strider_array::storage::Storage::U32(labels),
        strider_array::Shape::vector(s),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// Two well-separated groups of series.
    fn grouped_series() -> Array {
        let n = 32usize;
        let mut cols: Vec<Vec<f64>> = Vec::new();
        for i in 0..3 {
            cols.push((0..n).map(|k| 10.0 + 0.1 * (k + i) as f64).collect());
        }
        for i in 0..3 {
            cols.push((0..n).map(|k| -10.0 - 0.1 * (k + i) as f64).collect());
        }
        matrix_from_columns(&cols).unwrap()
    }

    #[test]
    fn k_means_separates_groups() {
        let tss = grouped_series();
        let (centroids, labels) = k_means(&tss, 2, None, None, 1e-8, 100).unwrap();
        let l = labels.host_vec::<u32>().unwrap();
        assert_eq!(l[0], l[1]);
        assert_eq!(l[0], l[2]);
        assert_eq!(l[3], l[4]);
        assert_eq!(l[3], l[5]);
        assert_ne!(l[0], l[3]);
        assert_eq!(centroids.dims()[1], 2);
    }

    #[test]
    fn k_means_argument_validation() {
        let tss = grouped_series();
        assert!(k_means(&tss, 0, None, None, 1e-4, 10).is_err());
        assert!(k_means(&tss, 7, None, None, 1e-4, 10).is_err());
    }

    #[test]
    fn kshape_groups_by_shape_not_scale() {
        // sines vs sawtooths at different amplitudes: shape, not scale,
        // should drive the clustering
        let n = 64usize;
        let mut cols: Vec<Vec<f64>> = Vec::new();
        for amp in [1.0f64, 5.0, 0.5] {
            cols.push((0..n).map(|k| amp * (2.0 * PI * k as f64 / 16.0).sin()).collect());
        }
        for amp in [1.0f64, 3.0, 0.25] {
            cols.push((0..n).map(|k| amp * ((k % 16) as f64 / 16.0 * 2.0 - 1.0)).collect());
        }
        let tss = matrix_from_columns(&cols).unwrap();
        let labels = Array::from_storage(
            strider_array::storage::Storage::U32(vec![0, 1, 0, 1, 0, 1]),
            strider_array::Shape::vector(6),
        )
        .unwrap();
        let (centroids, out) = kshape_calibrate(&tss, 2, None, Some(&labels), 50, false).unwrap();
        let l = out.host_vec::<u32>().unwrap();
        assert_eq!(l[0], l[1]);
        assert_eq!(l[1], l[2]);
        assert_eq!(l[3], l[4]);
        assert_eq!(l[4], l[5]);
        assert_ne!(l[0], l[3]);

        // classification against the calibrated centroids reproduces the
        // training labels
        let again = kshape_classify(&tss, &centroids).unwrap();
        assert_eq!(again.host_vec::<u32>().unwrap(), l);
    }

    #[test]
    fn kshape_label_validation() {
        let tss = grouped_series();
        let short = Array::from_storage(
            strider_array::storage::Storage::U32(vec![0, 1]),
            strider_array::Shape::vector(2),
        )
        .unwrap();
        assert!(kshape_calibrate(&tss, 2, None, Some(&short), 10, false).is_err());

        let out_of_range = Array::from_storage(
            strider_array::storage::Storage::U32(vec![0, 1, 2, 0, 1, 2]),
            strider_array::Shape::vector(6),
        )
        .unwrap();
        assert!(kshape_calibrate(&tss, 2, None, Some(&out_of_range), 10, false).is_err());
    }

    #[test]
    fn centroid_is_z_normalized() {
        let n = 32usize;
        let cols: Vec<Vec<f64>> = (0..4)
            .map(|i| {
                (0..n)
                    .map(|k| (2.0 * PI * (k + i) as f64 / 8.0).sin() * 2.0)
                    .collect()
            })
            .collect();
        let tss = matrix_from_columns(&cols).unwrap();
        let (centroids, _) = kshape_calibrate(&tss, 1, None, None, 20, false).unwrap();
        let c = centroids.host_vec::<f64>().unwrap();
        let mu: f64 = c.iter().sum::<f64>() / n as f64;
        assert!(mu.abs() < 1e-8);
    }
}
