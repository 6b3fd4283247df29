//! All-pairs similarity joins
//!
//! Two interchangeable kernels produce the `(profile, index)` pair: STOMP
//! walks query positions with the incremental dot-product recurrence under
//! a two-level tiling sized to device memory, and SCAMP traverses
//! diagonals updating both triangles per step. SCAMP is the default
//! matrix-profile path and also provides the split left/right variant.
//!
//! Ties break toward the smallest index, and the self-join exclusion band
//! is applied before any arg-min so trivial matches can never win.

use strider_array::{Array, Result};
use strider_core::{scale, Complexity};

use crate::profile::{
    calculate_distances, check_window, mean_stdev, profile_dtype, profile_pair, series_vec,
    DotPlan, MovingStats, STD_EPS,
};

// base tile sizes, calibrated for the reference memory budget
const BATCH_SIZE_SQUARED: usize = 2048;
const BATCH_SIZE_B: usize = 1024;
const BATCH_SIZE_A: usize = 8192;

/// Sentinel index meaning "no neighbor on this side".
pub fn no_neighbor_sentinel(n: usize, m: usize) -> u32 {
    (n - m + 1) as u32
}

fn exclusion_zone(m: usize) -> usize {
    m / 2
}

struct MinTracker {
    dist: Vec<f64>,
    idx: Vec<u32>,
}

impl MinTracker {
    fn new(len: usize, sentinel: u32) -> MinTracker {
        MinTracker { dist: vec![f64::INFINITY; len], idx: vec![sentinel; len] }
    }

    /// Smallest index wins on exact ties. Infinite distances never claim a
    /// neighbor, so rows with no valid match keep the sentinel index.
    #[inline]
    fn update(&mut self, at: usize, d: f64, j: u32) {
        if !d.is_finite() {
            return;
        }
        if d < self.dist[at] || (d == self.dist[at] && j < self.idx[at]) {
            self.dist[at] = d;
            self.idx[at] = j;
        }
    }
}

/// STOMP join of `tb` queries against reference `ta` (self-join when they
/// are the same series). Returns `(profile, index)` over `tb` positions.
pub fn stomp(ta: &Array, m: usize, tb: Option<&Array>) -> Result<(Array, Array)> {
    let ta_v = series_vec(ta, "stomp reference")?;
    check_window(ta_v.len(), m, "stomp")?;
    let (tb_v, self_join) = match tb {
        Some(b) => {
            let v = series_vec(b, "stomp query series")?;
            check_window(v.len(), m, "stomp")?;
            (v, false)
        }
        None => (ta_v.clone(), true),
    };
    let dtype = profile_dtype(ta);

    let batch_squared = scale(BATCH_SIZE_SQUARED, Complexity::Quadratic);
    let batch_b = scale(BATCH_SIZE_B, Complexity::Quadratic);
    let batch_a = scale(BATCH_SIZE_A, Complexity::Quadratic);

    let (dist, idx) = if tb_v.len() > batch_squared && ta_v.len() > batch_squared {
        log::debug!(
            "stomp: two-level tiling ({} x {}) for n_a={} n_b={}",
            batch_b,
            batch_a,
            ta_v.len(),
            tb_v.len()
        );
        stomp_tiled(&ta_v, &tb_v, m, self_join, batch_b, batch_a)
    } else {
        stomp_sweep(&ta_v, &tb_v, m, self_join)
    };
    profile_pair(dist, idx, dtype)
}

/// Single-sweep STOMP: the whole reference fits in the memory budget.
fn stomp_sweep(ta: &[f64], tb: &[f64], m: usize, self_join: bool) -> (Vec<f64>, Vec<u32>) {
    let na = ta.len() - m + 1;
    let nb = tb.len() - m + 1;
    let ez = exclusion_zone(m);
    let stats_a = mean_stdev(ta, m);
    let stats_b = mean_stdev(tb, m);
    let plan = DotPlan::new(ta);

    let sentinel = no_neighbor_sentinel(tb.len(), m);
    let mut out = MinTracker::new(nb, sentinel);

    // first query row by FFT, the rest by the O(1) recurrence
    let mut qt = plan.sliding_dot(&tb[0..m]);
    let first_qt = qt.clone();
    for i in 0..nb {
        if i > 0 {
            for j in (1..na).rev() {
                qt[j] = qt[j - 1] - tb[i - 1] * ta[j - 1] + tb[i + m - 1] * ta[j + m - 1];
            }
            // leading column restarts from the precomputed transposed row
            qt[0] = if self_join {
                first_qt[i]
            } else {
                (0..m).map(|k| tb[i + k] * ta[k]).sum()
            };
        }
        update_row(&mut out, &qt, &stats_a, &stats_b, i, m, self_join, ez);
    }
    (out.dist, out.idx)
}

#[allow(clippy::too_many_arguments)]
fn update_row(
    out: &mut MinTracker,
    qt: &[f64],
    stats_a: &MovingStats,
    stats_b: &MovingStats,
    i: usize,
    m: usize,
    self_join: bool,
    ez: usize,
) {
    let sum_q = stats_b.mean[i] * m as f64;
    // reconstruct sum of squares from the moving statistics
    let sum_q2 = (stats_b.std[i] * stats_b.std[i] + stats_b.mean[i] * stats_b.mean[i]) * m as f64;
    let row = calculate_distances(qt, stats_a, sum_q, sum_q2, m);
    for (j, &d) in row.iter().enumerate() {
        if self_join && i.abs_diff(j) <= ez {
            continue; // exclusion band: trivial matches never reach the min
        }
        out.update(i, d, j as u32);
    }
}

/// Two-level tiled STOMP: outer tiles over the query axis, inner tiles
/// over the reference axis.
fn stomp_tiled(
    ta: &[f64],
    tb: &[f64],
    m: usize,
    self_join: bool,
    batch_b: usize,
    batch_a: usize,
) -> (Vec<f64>, Vec<u32>) {
    let na = ta.len() - m + 1;
    let nb = tb.len() - m + 1;
    let ez = exclusion_zone(m);
    let stats_a = mean_stdev(ta, m);
    let stats_b = mean_stdev(tb, m);
    let sentinel = no_neighbor_sentinel(tb.len(), m);
    let mut out = MinTracker::new(nb, sentinel);

    let mut b_start = 0;
    while b_start < nb {
        let b_end = (b_start + batch_b).min(nb);
        let mut a_start = 0;
        while a_start < na {
            let a_end = (a_start + batch_a).min(na);
            // reference slice long enough to cover every window of the tile
            let ta_slice = &ta[a_start..(a_end - 1 + m).min(ta.len())];
            let plan = DotPlan::new(ta_slice);
            let tile_cols = a_end - a_start;
            let mut qt = plan.sliding_dot(&tb[b_start..b_start + m]);
            qt.truncate(tile_cols);
            for i in b_start..b_end {
                if i > b_start {
                    for j in (1..tile_cols).rev() {
                        let aj = a_start + j;
                        qt[j] = qt[j - 1] - tb[i - 1] * ta[aj - 1] + tb[i + m - 1] * ta[aj + m - 1];
                    }
                    qt[0] = (0..m).map(|k| tb[i + k] * ta[a_start + k]).sum();
                }
                let sum_q = stats_b.mean[i] * m as f64;
                let sum_q2 =
                    (stats_b.std[i] * stats_b.std[i] + stats_b.mean[i] * stats_b.mean[i]) * m as f64;
                let tile_stats = MovingStats {
                    mean: stats_a.mean[a_start..a_end].to_vec(),
                    std: stats_a.std[a_start..a_end].to_vec(),
                    aux: stats_a.aux[a_start..a_end].to_vec(),
                };
                let row = calculate_distances(&qt, &tile_stats, sum_q, sum_q2, m);
                for (jj, &d) in row.iter().enumerate() {
                    let j = a_start + jj;
                    if self_join && i.abs_diff(j) <= ez {
                        continue;
                    }
                    out.update(i, d, j as u32);
                }
            }
            a_start = a_end;
        }
        b_start = b_end;
    }
    (out.dist, out.idx)
}

/// SCAMP self-join: diagonal traversal with O(1) updates per cell, filling
/// both triangles from each diagonal.
pub fn scamp_self(t: &Array, m: usize) -> Result<(Array, Array)> {
    let tv = series_vec(t, "matrix profile series")?;
    check_window(tv.len(), m, "matrix profile")?;
    let n = tv.len();
    let np = n - m + 1;
    let ez = exclusion_zone(m);
    let stats = mean_stdev(&tv, m);
    let sentinel = no_neighbor_sentinel(n, m);
    let mut out = MinTracker::new(np, sentinel);

    for diag in (ez + 1)..np {
        let mut dot: f64 = (0..m).map(|k| tv[k] * tv[diag + k]).sum();
        for i in 0..(np - diag) {
            let j = i + diag;
            if i > 0 {
                dot += tv[i + m - 1] * tv[j + m - 1] - tv[i - 1] * tv[j - 1];
            }
            let d = pair_distance(dot, &stats, i, j, m);
            out.update(i, d, j as u32);
            out.update(j, d, i as u32);
        }
    }
    profile_pair(out.dist, out.idx, profile_dtype(t))
}

/// SCAMP join of two distinct series: profile over `tb` positions against
/// `ta` windows.
pub fn scamp_ab(ta: &Array, tb: &Array, m: usize) -> Result<(Array, Array)> {
    let ta_v = series_vec(ta, "matrix profile reference")?;
    let tb_v = series_vec(tb, "matrix profile query series")?;
    check_window(ta_v.len(), m, "matrix profile")?;
    check_window(tb_v.len(), m, "matrix profile")?;
    let na = ta_v.len() - m + 1;
    let nb = tb_v.len() - m + 1;
    let stats_a = mean_stdev(&ta_v, m);
    let stats_b = mean_stdev(&tb_v, m);
    let sentinel = no_neighbor_sentinel(tb_v.len(), m);
    let mut out = MinTracker::new(nb, sentinel);

    // diagonals starting from every query row (offset < 0) and column
    for diag in -(nb as i64 - 1)..na as i64 {
        let (mut i, mut j) = if diag >= 0 { (0usize, diag as usize) } else { ((-diag) as usize, 0usize) };
        let mut dot: f64 = (0..m).map(|k| tb_v[i + k] * ta_v[j + k]).sum();
        loop {
            let d = pair_distance_ab(dot, &stats_a, &stats_b, j, i, m);
            out.update(i, d, j as u32);
            i += 1;
            j += 1;
            if i >= nb || j >= na {
                break;
            }
            dot += tb_v[i + m - 1] * ta_v[j + m - 1] - tb_v[i - 1] * ta_v[j - 1];
        }
    }
    profile_pair(out.dist, out.idx, profile_dtype(ta))
}

fn pair_distance(dot: f64, stats: &MovingStats, i: usize, j: usize, m: usize) -> f64 {
    let mf = m as f64;
    if stats.std[i] < STD_EPS || stats.std[j] < STD_EPS {
        return f64::INFINITY;
    }
    let corr = (dot - mf * stats.mean[i] * stats.mean[j]) / (mf * stats.std[i] * stats.std[j]);
    (2.0 * mf * (1.0 - corr)).max(0.0).sqrt()
}

fn pair_distance_ab(
    dot: f64,
    stats_a: &MovingStats,
    stats_b: &MovingStats,
    j: usize,
    i: usize,
    m: usize,
) -> f64 {
    let mf = m as f64;
    if stats_a.std[j] < STD_EPS || stats_b.std[i] < STD_EPS {
        return f64::INFINITY;
    }
    let corr =
        (dot - mf * stats_a.mean[j] * stats_b.mean[i]) / (mf * stats_a.std[j] * stats_b.std[i]);
    (2.0 * mf * (1.0 - corr)).max(0.0).sqrt()
}

/// The default matrix-profile path: SCAMP.
pub fn matrix_profile(ta: &Array, m: usize, tb: Option<&Array>) -> Result<(Array, Array)> {
    match tb {
        None => scamp_self(ta, m),
        Some(b) => scamp_ab(ta, b, m),
    }
}

/// Split left/right self-join: for each position, the nearest neighbor
/// strictly before and strictly after it. Boundary rows carry infinite
/// distance and the `n - m + 1` sentinel index.
pub fn matrix_profile_lr(t: &Array, m: usize) -> Result<(Array, Array, Array, Array)> {
    let tv = series_vec(t, "matrix profile series")?;
    check_window(tv.len(), m, "matrix profile")?;
    let n = tv.len();
    let np = n - m + 1;
    let ez = exclusion_zone(m);
    let stats = mean_stdev(&tv, m);
    let sentinel = no_neighbor_sentinel(n, m);
    let mut left = MinTracker::new(np, sentinel);
    let mut right = MinTracker::new(np, sentinel);

    for diag in (ez + 1)..np {
        let mut dot: f64 = (0..m).map(|k| tv[k] * tv[diag + k]).sum();
        for i in 0..(np - diag) {
            let j = i + diag;
            if i > 0 {
                dot += tv[i + m - 1] * tv[j + m - 1] - tv[i - 1] * tv[j - 1];
            }
            let d = pair_distance(dot, &stats, i, j, m);
            // j sits to the right of i, i to the left of j
            right.update(i, d, j as u32);
            left.update(j, d, i as u32);
        }
    }
    let dtype = profile_dtype(t);
    let (pl, il) = profile_pair(left.dist, left.idx, dtype)?;
    let (pr, ir) = profile_pair(right.dist, right.idx, dtype)?;
    Ok((pl, il, pr, ir))
}
