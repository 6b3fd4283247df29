//! Arc-curve segmentation and chains
//!
//! The corrected arc curve counts nearest-neighbor arcs crossing each
//! position, normalized by the parabolic expectation of a random profile;
//! regime boundaries are its repeated strict minima. Chains follow the
//! right-neighbor links of the split profile, confirmed by the left links.

use strider_array::{Array, Error, Result};

use crate::join::{matrix_profile_lr, no_neighbor_sentinel};
use crate::profile::series_vec;

/// Corrected arc curve of a `(profile, index)` pair under window `w`.
pub fn cac(profile: &Array, index: &Array, w: usize) -> Result<Array> {
    let idx = index.host_vec::<u32>()?;
    let l = idx.len();
    if profile.elements() != l {
        return Err(Error::Shape("profile and index lengths disagree".into()));
    }
    if 2 * w >= l {
        return Err(Error::Arg(format!(
            "window {w} leaves no interior for a curve of length {l}"
        )));
    }

    // +1 at each arc's left endpoint, -1 at its right endpoint
    let mut mark = vec![0i64; l];
    for (i, &j) in idx.iter().enumerate() {
        let j = j as usize;
        if j >= l {
            continue; // sentinel: no neighbor recorded
        }
        let (lo, hi) = (i.min(j), i.max(j));
        mark[lo] += 1;
        mark[hi] -= 1;
    }
    let mut cross = Vec::with_capacity(l);
    let mut acc = 0i64;
    for &m in &mark {
        acc += m;
        cross.push(acc as f64);
    }

    let lf = l as f64;
    let mut curve: Vec<f64> = cross
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let adj = 2.0 * i as f64 * (lf - i as f64) / lf;
            if adj <= 0.0 {
                1.0
            } else {
                (c / adj).min(1.0)
            }
        })
        .collect();
    for v in curve.iter_mut().take(w) {
        *v = 1.0;
    }
    for v in curve.iter_mut().skip(l - w) {
        *v = 1.0;
    }

    Array::from_vector(&curve)
}

/// Regime boundaries: repeated strict minima of the corrected arc curve,
/// each masking `w * ez` positions around itself. Stops after
/// `num_regions` picks, or when no value below 1 remains.
pub fn segment(
    profile: &Array,
    index: &Array,
    w: usize,
    num_regions: Option<usize>,
    ez: Option<usize>,
) -> Result<Vec<u32>> {
    let curve = cac(profile, index, w)?;
    let mut values = curve.host_vec::<f64>()?;
    let exczone = w * ez.unwrap_or(5);
    let len = values.len();

    let mut result = Vec::new();
    loop {
        let Some((pos, &min)) = values.iter().enumerate().min_by(|a, b| a.1.total_cmp(b.1))
        else {
            break;
        };
        if (min - 1.0).abs() <= 1e-8 {
            break;
        }
        result.push(pos as u32);
        let lo = pos.saturating_sub(exczone);
        let hi = (pos + exczone).min(len);
        for v in &mut values[lo..hi] {
            *v = 1.0;
        }
        if let Some(limit) = num_regions {
            if result.len() == limit {
                break;
            }
        }
    }
    Ok(result)
}

/// Time-series chains from the split left/right profiles.
///
/// A link `i -> j` holds when `right_index[i] = j` and `left_index[j] = i`.
/// The packed output is `(n - m + 1, 2)`: column 0 carries the 1-based id
/// of the chain each position belongs to (0 when the position is in no
/// chain of length two or more), column 1 the position's rank inside its
/// chain.
pub fn chains(tss: &Array, m: usize) -> Result<Array> {
    let tv = series_vec(tss, "chains series")?;
    let (_, il, _, ir) = matrix_profile_lr(tss, m)?;
    let left = il.host_vec::<u32>()?;
    let right = ir.host_vec::<u32>()?;
    let np = left.len();
    let sentinel = no_neighbor_sentinel(tv.len(), m);

    // bidirectionally confirmed right links
    let link: Vec<Option<usize>> = (0..np)
        .map(|i| {
            let j = right[i];
            if j >= sentinel {
                return None;
            }
            let j = j as usize;
            // consumers treat any index at or past the sentinel as absent
            if left[j] != sentinel && left[j] as usize == i {
                Some(j)
            } else {
                None
            }
        })
        .collect();

    let mut is_target = vec![false; np];
    for l in link.iter().flatten() {
        is_target[*l] = true;
    }

    let mut chain_id = vec![0u32; np];
    let mut chain_rank = vec![0u32; np];
    let mut next_id = 1u32;
    for start in 0..np {
        if is_target[start] || link[start].is_none() {
            continue;
        }
        // walk the confirmed links from an unanchored head
        let mut node = start;
        let mut rank = 0u32;
        loop {
            chain_id[node] = next_id;
            chain_rank[node] = rank;
            rank += 1;
            match link[node] {
                Some(next) => node = next,
                None => break,
            }
        }
        next_id += 1;
    }

    let mut packed = Vec::with_capacity(np * 2);
    packed.extend(chain_id.iter().copied());
    packed.extend(chain_rank.iter().copied());
    Array::from_storage(
        strider_array::storage::Storage::U32(packed),
        strider_array::Shape::matrix(np, 2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::matrix_profile;
    use std::f64::consts::PI;

    fn two_regime_series() -> (Array, usize) {
        // two distinct sinusoids of equal length
        let l = 256usize;
        let mut data: Vec<f64> = (0..l).map(|k| (2.0 * PI * k as f64 / 16.0).sin()).collect();
        data.extend((0..l).map(|k| (2.0 * PI * k as f64 / 40.0).sin() * 0.7 + 0.1));
        (Array::from_vector(&data).unwrap(), l)
    }

    #[test]
    fn cac_dips_at_the_regime_change() {
        let (t, l) = two_regime_series();
        let m = 16usize;
        let (profile, index) = matrix_profile(&t, m, None).unwrap();
        let curve = cac(&profile, &index, m).unwrap();
        let host = curve.host_vec::<f64>().unwrap();
        let (best, &min) = host
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!(min < 1.0);
        assert!(
            best >= l - m && best <= l + m,
            "cac minimum at {best}, expected within [{}, {}]",
            l - m,
            l + m
        );
    }

    #[test]
    fn cac_boundaries_are_clamped_to_one() {
        let (t, _) = two_regime_series();
        let m = 16usize;
        let (profile, index) = matrix_profile(&t, m, None).unwrap();
        let host = cac(&profile, &index, m).unwrap().host_vec::<f64>().unwrap();
        for &v in host.iter().take(m) {
            assert_eq!(v, 1.0);
        }
        for &v in host.iter().rev().take(m) {
            assert_eq!(v, 1.0);
        }
        for &v in &host {
            assert!(v <= 1.0);
        }
    }

    #[test]
    fn segment_returns_single_boundary() {
        let (t, l) = two_regime_series();
        let m = 16usize;
        let (profile, index) = matrix_profile(&t, m, None).unwrap();
        let regions = segment(&profile, &index, m, Some(1), Some(5)).unwrap();
        assert_eq!(regions.len(), 1);
        let r = regions[0] as usize;
        assert!(r >= l - m && r <= l + m, "boundary at {r}");
    }

    #[test]
    fn segment_stops_when_curve_is_flat() {
        let profile = Array::from_vector(&vec![1.0; 40]).unwrap();
        // every index points far away: arcs cross everywhere, curve
        // clamps to 1 and no boundary is found
        let index = Array::from_storage(
            strider_array::storage::Storage::U32((0..40u32).map(|i| 39 - i).collect()),
            strider_array::Shape::vector(40),
        )
        .unwrap();
        let regions = segment(&profile, &index, 2, None, Some(1)).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn chains_link_repeating_pattern() {
        // a repeated motif whose second harmonic grows period by period:
        // every window's nearest neighbor is the adjacent period, so the
        // right links walk the series left to right
        let n = 160usize;
        let data: Vec<f64> = (0..n)
            .map(|k| {
                let phase = 2.0 * PI * (k % 20) as f64 / 20.0;
                phase.sin() + 0.08 * (k as f64 / 20.0) * (2.0 * phase).sin()
            })
            .collect();
        let t = Array::from_vector(&data).unwrap();
        let out = chains(&t, 20).unwrap();
        assert_eq!(out.dims()[1], 2);
        let np = out.dims()[0];
        let host = out.host_vec::<u32>().unwrap();
        let ids = &host[0..np];
        // at least one chain of length >= 3 must exist in a repeating
        // series
        let longest = (1..ids.iter().max().copied().unwrap_or(0) + 1)
            .map(|id| ids.iter().filter(|&&v| v == id).count())
            .max()
            .unwrap_or(0);
        assert!(longest >= 3, "longest chain {longest}");
    }
}
