//! MPDist and snippets
//!
//! MPDist compares two series through the row and column minima of their
//! all-pairs subsequence distance matrix; snippets greedily pick the
//! chunks whose MPDist vectors summarize the series best.

use serde::Serialize;
use strider_array::{Array, Error, Result};

use crate::profile::{check_window, mass_matrix, series_vec};

const DEFAULT_THRESHOLD: f64 = 0.05;

/// Row mins and column mins of the query-vs-series distance matrix,
/// concatenated, sorted, indexed at `ceil(threshold * total) - 1`.
fn abba_pick(row_mins: &[f64], col_mins: &[f64], threshold: f64, total: usize) -> f64 {
    let mut joined: Vec<f64> = row_mins.iter().chain(col_mins).copied().collect();
    joined.sort_by(f64::total_cmp);
    let loc = ((threshold * total as f64).ceil() as usize).max(1) - 1;
    joined[loc.min(joined.len() - 1)]
}

fn windows_of(series: &[f64], w: usize) -> Vec<Vec<f64>> {
    (0..series.len() - w + 1).map(|i| series[i..i + w].to_vec()).collect()
}

fn column_mins(matrix: &[Vec<f64>]) -> Vec<f64> {
    matrix
        .iter()
        .map(|col| col.iter().copied().fold(f64::INFINITY, f64::min))
        .collect()
}

fn row_mins(matrix: &[Vec<f64>], rows: usize) -> Vec<f64> {
    (0..rows)
        .map(|r| matrix.iter().map(|col| col[r]).fold(f64::INFINITY, f64::min))
        .collect()
}

/// MPDist between two series under subsequence length `w`.
///
/// Zero for a series against itself; symmetric in its arguments.
pub fn mpdist(a: &Array, b: &Array, w: usize, threshold: Option<f64>) -> Result<f64> {
    let av = series_vec(a, "mpdist series a")?;
    let bv = series_vec(b, "mpdist series b")?;
    check_window(av.len(), w, "mpdist")?;
    check_window(bv.len(), w, "mpdist")?;
    let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);

    let queries = windows_of(&bv, w);
    let matrix = mass_matrix(&queries, &av, w);
    let rows = av.len() - w + 1;
    let rmin = row_mins(&matrix, rows);
    let cmin = column_mins(&matrix);
    Ok(abba_pick(&rmin, &cmin, threshold, av.len() + bv.len()))
}

/// MPDist of `b` against a window of size `2w - 1 + w` sliding across
/// `tss`: one distance per window position of `tss`.
pub fn mpdist_vector(tss: &Array, b: &Array, w: usize, threshold: Option<f64>) -> Result<Array> {
    let tv = series_vec(tss, "mpdist_vector series")?;
    let bv = series_vec(b, "mpdist_vector query series")?;
    check_window(tv.len(), w, "mpdist_vector")?;
    check_window(bv.len(), w, "mpdist_vector")?;
    let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);

    let queries = windows_of(&bv, w);
    let matrix = mass_matrix(&queries, &tv, w);
    let rows = tv.len() - w + 1;
    mass_to_mpdist_vector(&matrix, rows, w, threshold)
}

/// Shared tail of the MPDist-vector computation, reused by snippets.
///
/// For every length-`w` run of matrix rows: the per-query minima over the
/// run joined with the per-row minima inside it, sorted, picked at the
/// threshold quantile.
fn mass_to_mpdist_vector(
    matrix: &[Vec<f64>],
    rows: usize,
    w: usize,
    threshold: f64,
) -> Result<Array> {
    if rows < w {
        return Err(Error::Arg("series is too short for the sub-window".into()));
    }
    let positions = rows - w + 1;
    let nq = matrix.len();
    let all_row_mins = row_mins(matrix, rows);

    let mut out = Vec::with_capacity(positions);
    for p in 0..positions {
        // per-query minima over the run of rows [p, p + w)
        let window_col_mins: Vec<f64> = matrix
            .iter()
            .map(|col| col[p..p + w].iter().copied().fold(f64::INFINITY, f64::min))
            .collect();
        let local_row_mins = &all_row_mins[p..p + w];
        out.push(abba_pick(&window_col_mins, local_row_mins, threshold, nq + w));
    }
    let len = out.len();
    Array::from_storage(
        strider_array::storage::Storage::from_real_vec(strider_core::DType::F64, out),
        strider_array::Shape::vector(len),
    )
}

/// One selected snippet.
#[derive(Debug, Clone, Serialize)]
pub struct Snippet {
    /// Chunk index within the partitioned series.
    pub index: u32,
    /// Chunk size the series was partitioned with.
    pub snippet_size: u32,
    /// Sub-sequence window used for the MPDist vectors.
    pub window: u32,
    /// Per-position MPDist of this snippet against the padded series.
    pub distances: Vec<f64>,
    /// Positions whose nearest snippet is this one.
    pub indices: Vec<u32>,
    /// Fraction of the original series closer to this snippet than to any
    /// other selected one.
    pub pct: f64,
}

/// Greedy snippet selection: partition into `snippet_size` chunks
/// (zero-padded), compute each chunk's MPDist vector against the series,
/// and repeatedly take the chunk that lowers the running elementwise
/// minimum the most.
pub fn snippets(
    tss: &Array,
    snippet_size: usize,
    num_snippets: usize,
    window: Option<usize>,
) -> Result<Vec<Snippet>> {
    let tv = series_vec(tss, "snippets series")?;
    let n = tv.len();
    let w = window.unwrap_or(snippet_size >> 1);

    if num_snippets < 1 {
        return Err(Error::Arg("at least one snippet is required".into()));
    }
    if snippet_size < 4 {
        return Err(Error::Arg("snippet sizes should be at least 4".into()));
    }
    if n < 2 * snippet_size {
        return Err(Error::Arg("time series is too short for the snippet size".into()));
    }
    if w >= snippet_size {
        return Err(Error::Arg("window size should be strictly less than snippet size".into()));
    }

    // right-pad with zeros to a whole number of chunks
    let padded_len = snippet_size * n.div_ceil(snippet_size);
    let mut padded = tv.clone();
    padded.resize(padded_len, 0.0);
    let groups = padded_len / snippet_size;
    let rows = padded_len - w + 1;

    let mut distances: Vec<Vec<f64>> = Vec::with_capacity(groups);
    for g in 0..groups {
        let chunk = &padded[g * snippet_size..(g + 1) * snippet_size];
        let queries = windows_of(chunk, w);
        let matrix = mass_matrix(&queries, &padded, w);
        let vector = mass_to_mpdist_vector(&matrix, rows, w, DEFAULT_THRESHOLD)?;
        distances.push(vector.host_vec::<f64>()?);
    }

    // greedy area-minimizing selection
    let mut picked: Vec<u32> = Vec::with_capacity(num_snippets);
    let positions = distances[0].len();
    let mut minis = vec![f64::INFINITY; positions];
    for _ in 0..num_snippets {
        let mut best_mass = f64::INFINITY;
        let mut best = 0usize;
        for (g, dist) in distances.iter().enumerate() {
            let mass: f64 = dist.iter().zip(&minis).map(|(&d, &m)| d.min(m)).sum();
            if mass < best_mass {
                best_mass = mass;
                best = g;
            }
        }
        for (slot, &d) in minis.iter_mut().zip(&distances[best]) {
            *slot = slot.min(d);
        }
        picked.push(best as u32);
    }

    let mut out = Vec::with_capacity(picked.len());
    for &g in &picked {
        let dist = &distances[g as usize];
        let mask: Vec<bool> = dist.iter().zip(&minis).map(|(&d, &m)| d <= m).collect();
        let indices: Vec<u32> = mask
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .map(|(i, _)| i as u32)
            .collect();
        let pct = mask.iter().filter(|&&f| f).count() as f64 / n as f64;
        out.push(Snippet {
            index: g,
            snippet_size: snippet_size as u32,
            window: w as u32,
            distances: dist.clone(),
            indices,
            pct,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(n: usize, period: f64) -> Vec<f64> {
        (0..n).map(|k| (2.0 * std::f64::consts::PI * k as f64 / period).sin()).collect()
    }

    fn sawtooth(n: usize, period: f64) -> Vec<f64> {
        (0..n).map(|k| (k as f64 / period).fract() * 2.0 - 1.0).collect()
    }

    #[test]
    fn mpdist_self_is_zero() {
        let a = Array::from_vector(&sine(64, 16.0)).unwrap();
        let d = mpdist(&a, &a, 8, None).unwrap();
        assert!(d < 1e-6, "self distance {d}");
    }

    #[test]
    fn mpdist_is_symmetric() {
        let a = Array::from_vector(&sine(64, 16.0)).unwrap();
        let b = Array::from_vector(&sawtooth(64, 16.0)).unwrap();
        let dab = mpdist(&a, &b, 8, None).unwrap();
        let dba = mpdist(&b, &a, 8, None).unwrap();
        assert!((dab - dba).abs() < 1e-9);
        assert!(dab > 0.0);
    }

    #[test]
    fn mpdist_vector_dips_where_query_occurs() {
        let mut data = sawtooth(96, 8.0);
        // plant a sine burst in the middle
        let burst = sine(24, 12.0);
        data.splice(40..64, burst.iter().copied());
        let tss = Array::from_vector(&data).unwrap();
        let b = Array::from_vector(&burst).unwrap();
        let v = mpdist_vector(&tss, &b, 8, None).unwrap();
        let host = v.host_vec::<f64>().unwrap();
        let (best, _) = host
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!(
            (34..=56).contains(&best),
            "minimum at {best}, expected near the burst at 40..64"
        );
    }

    #[test]
    fn snippets_cover_two_regimes() {
        let mut data = sine(128, 16.0);
        data.extend(sawtooth(128, 16.0));
        let tss = Array::from_vector(&data).unwrap();
        let result = snippets(&tss, 32, 2, None).unwrap();
        assert_eq!(result.len(), 2);
        let (a, b) = (result[0].index, result[1].index);
        // one snippet from each half
        assert!((a < 4) != (b < 4), "snippets {a} and {b} cover one regime only");
        for s in &result {
            assert!(s.pct >= 0.0 && s.pct <= 1.0);
            assert_eq!(s.window, 16);
        }
    }

    #[test]
    fn snippet_report_serializes() {
        let tss = Array::from_vector(&sine(96, 16.0)).unwrap();
        let result = snippets(&tss, 24, 1, None).unwrap();
        let json = serde_json::to_string(&result[0]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["snippet_size"], 24);
        assert_eq!(value["window"], 12);
        assert!(value["pct"].as_f64().unwrap() >= 0.0);
        assert!(value["distances"].as_array().unwrap().len() > 0);
    }

    #[test]
    fn snippets_argument_validation() {
        let tss = Array::from_vector(&sine(64, 16.0)).unwrap();
        assert!(snippets(&tss, 3, 1, None).is_err());
        assert!(snippets(&tss, 40, 1, None).is_err());
        assert!(snippets(&tss, 16, 1, Some(16)).is_err());
        assert!(snippets(&tss, 16, 0, None).is_err());
    }
}
