//! Best-N discovery over a computed profile
//!
//! Motifs take repeated global minima, discords repeated maxima; each pick
//! invalidates an exclusion zone around itself (and around its matched
//! subsequence in self-join mode) so overlapping hits cannot dominate the
//! ranking.

use strider_array::{Array, Error, Result};

use crate::profile::{mass, profile_dtype, series_vec};

fn invalidate(values: &mut [f64], center: usize, half: usize, fill: f64) {
    let lo = center.saturating_sub(half);
    let hi = (center + half + 1).min(values.len());
    for v in &mut values[lo..hi] {
        *v = fill;
    }
}

fn find_best_n(
    profile: &Array,
    index: &Array,
    m: usize,
    n: usize,
    self_join: bool,
    motifs: bool,
) -> Result<(Array, Array, Array)> {
    if n < 1 {
        return Err(Error::Arg("cannot retrieve less than one result".into()));
    }
    let mut values = profile.host_vec::<f64>()?;
    let neighbors = index.host_vec::<u32>()?;
    if values.len() != neighbors.len() {
        return Err(Error::Shape("profile and index lengths disagree".into()));
    }
    let half = m / 2;
    let fill = if motifs { f64::INFINITY } else { f64::NEG_INFINITY };

    let mut best = Vec::with_capacity(n);
    let mut positions = Vec::with_capacity(n);
    let mut matched = Vec::with_capacity(n);
    for _ in 0..n {
        let pick = if motifs {
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .min_by(|a, b| a.1.total_cmp(b.1))
        } else {
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .max_by(|a, b| a.1.total_cmp(b.1))
        };
        let Some((p, &v)) = pick else { break };
        best.push(v);
        positions.push(p as u32);
        matched.push(neighbors[p]);
        invalidate(&mut values, p, half, fill);
        if self_join && (neighbors[p] as usize) < values.len() {
            invalidate(&mut values, neighbors[p] as usize, half, fill);
        }
    }
    if best.is_empty() {
        return Err(Error::Arg("no valid results outside the exclusion zones".into()));
    }

    let dtype = profile_dtype(profile);
    let k = best.len();
    Ok((
        Array::from_storage(
            strider_array::storage::Storage::from_real_vec(dtype, best),
            strider_array::Shape::vector(k),
        )?,
        Array::from_storage(
            strider_array::storage::Storage::U32(positions),
            strider_array::Shape::vector(k),
        )?,
        Array::from_storage(
            strider_array::storage::Storage::U32(matched),
            strider_array::Shape::vector(k),
        )?,
    ))
}

/// The `n` best motifs of a profile: `(distances, positions, matched
/// subsequence positions)`.
pub fn find_best_n_motifs(
    profile: &Array,
    index: &Array,
    m: usize,
    n: usize,
    self_join: bool,
) -> Result<(Array, Array, Array)> {
    find_best_n(profile, index, m, n, self_join, true)
}

/// The `n` strongest discords of a profile.
pub fn find_best_n_discords(
    profile: &Array,
    index: &Array,
    m: usize,
    n: usize,
    self_join: bool,
) -> Result<(Array, Array, Array)> {
    find_best_n(profile, index, m, n, self_join, false)
}

/// The `n` closest occurrences of query `q` inside `t`: `(distances,
/// positions)` in ascending distance order.
pub fn find_best_n_occurrences(q: &Array, t: &Array, n: usize) -> Result<(Array, Array)> {
    let tv = series_vec(t, "occurrence search series")?;
    let m = q.dim(0);
    if m > tv.len() {
        return Err(Error::Arg("query is longer than the series".into()));
    }
    let available = tv.len() - m + 1;
    if n < 1 {
        return Err(Error::Arg("cannot retrieve less than one occurrence".into()));
    }
    if n > available {
        return Err(Error::Arg(format!(
            "cannot retrieve more than {available} occurrences"
        )));
    }
    let distances = mass(q, t)?;
    let flat = distances.get(&[
        strider_array::Selector::Span,
        strider_array::Selector::Index(0),
    ])?;
    let (sorted, order) = flat.flat()?.sort_index(0, true)?;
    let top = sorted.slice(0, n as i64 - 1)?;
    let top_idx = order.slice(0, n as i64 - 1)?;
    Ok((top, top_idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::matrix_profile;

    #[test]
    fn single_discord_finds_injected_spike() {
        let mut data = vec![1.0f64; 200];
        data[100] = 10.0;
        // a flat series has zero variance everywhere, which makes every
        // window constant; wiggle the baseline slightly so windows away
        // from the spike stay comparable but non-degenerate
        for (k, v) in data.iter_mut().enumerate() {
            *v += 1e-3 * (k as f64 * 0.7).sin();
        }
        let t = Array::from_vector(&data).unwrap();
        let m = 8;
        let (profile, index) = matrix_profile(&t, m, None).unwrap();
        let (dist, pos, _) = find_best_n_discords(&profile, &index, m, 1, true).unwrap();
        let p = pos.host_vec::<u32>().unwrap()[0] as usize;
        // the windows containing the spike run from 93 to 100
        assert!((93..=100).contains(&p), "discord at {p}");
        // spike windows sit near the z-normalized distance ceiling of
        // 2*sqrt(m); everything else is a close repeat of the baseline
        assert!(dist.host_vec::<f64>().unwrap()[0] >= 3.5);
    }

    #[test]
    fn motifs_exclude_their_own_neighborhood() {
        let data: Vec<f64> = (0..96)
            .map(|k| (2.0 * std::f64::consts::PI * (k % 16) as f64 / 16.0).sin())
            .collect();
        let t = Array::from_vector(&data).unwrap();
        let m = 16;
        let (profile, index) = matrix_profile(&t, m, None).unwrap();
        let (_, pos, matched) = find_best_n_motifs(&profile, &index, m, 3, true).unwrap();
        let pos = pos.host_vec::<u32>().unwrap();
        let matched = matched.host_vec::<u32>().unwrap();
        // picks must be mutually separated by the exclusion zone
        for i in 0..pos.len() {
            for j in i + 1..pos.len() {
                assert!(pos[i].abs_diff(pos[j]) as usize > m / 2);
            }
            assert!(pos[i].abs_diff(matched[i]) as usize >= m / 2);
        }
    }

    #[test]
    fn occurrences_sorted_and_bounded() {
        let data: Vec<f64> = (0..64).map(|k| (k as f64 * 0.5).sin()).collect();
        let t = Array::from_vector(&data).unwrap();
        let q = Array::from_slice(&data[8..16], &[8, 1]).unwrap();
        let (dist, pos) = find_best_n_occurrences(&q, &t, 3).unwrap();
        let d = dist.host_vec::<f64>().unwrap();
        assert!(d[0] <= d[1] && d[1] <= d[2]);
        assert_eq!(pos.host_vec::<u32>().unwrap()[0], 8);

        assert!(find_best_n_occurrences(&q, &t, 0).is_err());
        assert!(find_best_n_occurrences(&q, &t, 58).is_err());
    }
}
