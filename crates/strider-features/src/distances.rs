//! Distance functions
//!
//! A uniform interface over the classical distance/similarity families plus
//! the elastic measures (DTW, SBD) and MPDist. Every measure computes
//! column against column; the pairwise driver fills an `N x N` matrix and
//! mirrors it when the measure is symmetric.

use strider_array::{Array, Error, Result};

use crate::util::columns;

/// Distance measure selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    // L1 family
    Manhattan,
    Sorensen,
    Gower,
    Soergel,
    Kulczynski,
    Canberra,
    Lorentzian,
    // L2 family
    Euclidean,
    SquaredEuclidean,
    Pearson,
    Neyman,
    SquaredChi,
    ProbSymmetricChi,
    Divergence,
    Clark,
    AdditiveSymmChi,
    // intersection family
    Intersection,
    WaveHedges,
    Czekanowski,
    Motyka,
    Ruzicka,
    Tanimoto,
    // inner-product family
    InnerProduct,
    HarmonicMean,
    Cosine,
    KumarHassebrook,
    Jaccard,
    Dice,
    // fidelity family
    Fidelity,
    Bhattacharyya,
    Hellinger,
    Matusita,
    SquareChord,
    // Shannon family
    KullbackLeibler,
    Jeffrey,
    Topsoe,
    JensenShannon,
    JensenDifference,
    KDivergence,
    // combinations
    Taneja,
    KumarJohnson,
    AvgL1Linf,
    // vicissitude family
    VicisWaveHedges,
    MinSymmetricChi,
    MaxSymmetricChi,
    // others
    Chebyshev,
    Minkowski(f64),
    Hamming,
    // elastic measures
    Dtw,
    Sbd,
    MpDist { w: usize, threshold: f64 },
}

impl Distance {
    /// Whether `d(a, b) == d(b, a)` holds, letting the pairwise driver
    /// mirror the upper triangle.
    pub fn symmetric(&self) -> bool {
        use Distance::*;
        !matches!(self, Pearson | Neyman | KullbackLeibler | KDivergence)
    }

    fn lockstep(&self, p: &[f64], q: &[f64]) -> f64 {
        use Distance::*;
        let n = p.len() as f64;
        let zip = || p.iter().zip(q.iter());
        match self {
            Manhattan => zip().map(|(a, b)| (a - b).abs()).sum(),
            Sorensen | Czekanowski => {
                let num: f64 = zip().map(|(a, b)| (a - b).abs()).sum();
                let den: f64 = zip().map(|(a, b)| a + b).sum();
                num / den
            }
            Gower => zip().map(|(a, b)| (a - b).abs()).sum::<f64>() / n,
            Soergel => {
                let num: f64 = zip().map(|(a, b)| (a - b).abs()).sum();
                let den: f64 = zip().map(|(a, b)| a.max(*b)).sum();
                num / den
            }
            Kulczynski => {
                let num: f64 = zip().map(|(a, b)| (a - b).abs()).sum();
                let den: f64 = zip().map(|(a, b)| a.min(*b)).sum();
                num / den
            }
            Canberra => zip()
                .map(|(a, b)| {
                    let den = a + b;
                    if den == 0.0 {
                        0.0
                    } else {
                        (a - b).abs() / den
                    }
                })
                .sum(),
            Lorentzian => zip().map(|(a, b)| (1.0 + (a - b).abs()).ln()).sum(),
            Euclidean => zip().map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt(),
            SquaredEuclidean => zip().map(|(a, b)| (a - b) * (a - b)).sum(),
            Pearson => zip().map(|(a, b)| (a - b) * (a - b) / b).sum(),
            Neyman => zip().map(|(a, b)| (a - b) * (a - b) / a).sum(),
            SquaredChi => zip().map(|(a, b)| (a - b) * (a - b) / (a + b)).sum(),
            ProbSymmetricChi => 2.0 * zip().map(|(a, b)| (a - b) * (a - b) / (a + b)).sum::<f64>(),
            Divergence => {
                2.0 * zip().map(|(a, b)| (a - b) * (a - b) / ((a + b) * (a + b))).sum::<f64>()
            }
            Clark => zip()
                .map(|(a, b)| {
                    let r = (a - b).abs() / (a + b);
                    r * r
                })
                .sum::<f64>()
                .sqrt(),
            AdditiveSymmChi => {
                zip().map(|(a, b)| (a - b) * (a - b) * (a + b) / (a * b)).sum()
            }
            Intersection => zip().map(|(a, b)| (a - b).abs()).sum::<f64>() / 2.0,
            WaveHedges => zip().map(|(a, b)| (a - b).abs() / a.max(*b)).sum(),
            Motyka => {
                let num: f64 = zip().map(|(a, b)| a.max(*b)).sum();
                let den: f64 = zip().map(|(a, b)| a + b).sum();
                num / den
            }
            Ruzicka => {
                let mins: f64 = zip().map(|(a, b)| a.min(*b)).sum();
                let maxs: f64 = zip().map(|(a, b)| a.max(*b)).sum();
                1.0 - mins / maxs
            }
            Tanimoto => {
                let mins: f64 = zip().map(|(a, b)| a.min(*b)).sum();
                let maxs: f64 = zip().map(|(a, b)| a.max(*b)).sum();
                (maxs - mins) / maxs
            }
            InnerProduct => zip().map(|(a, b)| a * b).sum(),
            HarmonicMean => 2.0 * zip().map(|(a, b)| a * b / (a + b)).sum::<f64>(),
            Cosine => {
                let dot: f64 = zip().map(|(a, b)| a * b).sum();
                let na: f64 = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                let nb: f64 = q.iter().map(|v| v * v).sum::<f64>().sqrt();
                dot / (na * nb)
            }
            KumarHassebrook => {
                let dot: f64 = zip().map(|(a, b)| a * b).sum();
                let pa: f64 = p.iter().map(|v| v * v).sum();
                let pb: f64 = q.iter().map(|v| v * v).sum();
                dot / (pa + pb - dot)
            }
            Jaccard => {
                let num: f64 = zip().map(|(a, b)| (a - b) * (a - b)).sum();
                let dot: f64 = zip().map(|(a, b)| a * b).sum();
                let pa: f64 = p.iter().map(|v| v * v).sum();
                let pb: f64 = q.iter().map(|v| v * v).sum();
                num / (pa + pb - dot)
            }
            Dice => {
                let num: f64 = zip().map(|(a, b)| (a - b) * (a - b)).sum();
                let pa: f64 = p.iter().map(|v| v * v).sum();
                let pb: f64 = q.iter().map(|v| v * v).sum();
                num / (pa + pb)
            }
            Fidelity => zip().map(|(a, b)| (a * b).sqrt()).sum(),
            Bhattacharyya => -zip().map(|(a, b)| (a * b).sqrt()).sum::<f64>().ln(),
            Hellinger => {
                2.0 * (1.0 - zip().map(|(a, b)| (a * b).sqrt()).sum::<f64>()).max(0.0).sqrt()
            }
            Matusita => {
                (2.0 - 2.0 * zip().map(|(a, b)| (a * b).sqrt()).sum::<f64>()).max(0.0).sqrt()
            }
            SquareChord => zip().map(|(a, b)| (a.sqrt() - b.sqrt()) * (a.sqrt() - b.sqrt())).sum(),
            KullbackLeibler => zip().map(|(a, b)| a * (a / b).ln()).sum(),
            Jeffrey => zip().map(|(a, b)| (a - b) * (a / b).ln()).sum(),
            Topsoe => zip()
                .map(|(a, b)| {
                    a * (2.0 * a / (a + b)).ln() + b * (2.0 * b / (a + b)).ln()
                })
                .sum(),
            JensenShannon => {
                0.5 * zip()
                    .map(|(a, b)| {
                        a * (2.0 * a / (a + b)).ln() + b * (2.0 * b / (a + b)).ln()
                    })
                    .sum::<f64>()
            }
            JensenDifference => zip()
                .map(|(a, b)| {
                    let m = (a + b) / 2.0;
                    (a * a.ln() + b * b.ln()) / 2.0 - m * m.ln()
                })
                .sum(),
            KDivergence => zip().map(|(a, b)| a * (2.0 * a / (a + b)).ln()).sum(),
            Taneja => zip()
                .map(|(a, b)| {
                    let m = (a + b) / 2.0;
                    m * (m / (a * b).sqrt()).ln()
                })
                .sum(),
            KumarJohnson => zip()
                .map(|(a, b)| {
                    let num = (a * a - b * b) * (a * a - b * b);
                    num / (2.0 * (a * b).powf(1.5))
                })
                .sum(),
            AvgL1Linf => {
                let l1: f64 = zip().map(|(a, b)| (a - b).abs()).sum();
                let linf: f64 = zip().map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
                (l1 + linf) / 2.0
            }
            VicisWaveHedges => zip().map(|(a, b)| (a - b).abs() / a.min(*b)).sum(),
            MinSymmetricChi => {
                let dp: f64 = zip().map(|(a, b)| (a - b) * (a - b) / a).sum();
                let dq: f64 = zip().map(|(a, b)| (a - b) * (a - b) / b).sum();
                dp.min(dq)
            }
            MaxSymmetricChi => {
                let dp: f64 = zip().map(|(a, b)| (a - b) * (a - b) / a).sum();
                let dq: f64 = zip().map(|(a, b)| (a - b) * (a - b) / b).sum();
                dp.max(dq)
            }
            Chebyshev => zip().map(|(a, b)| (a - b).abs()).fold(0.0, f64::max),
            Minkowski(p_ord) => zip()
                .map(|(a, b)| (a - b).abs().powf(*p_ord))
                .sum::<f64>()
                .powf(1.0 / p_ord),
            Hamming => zip().filter(|(a, b)| a != b).count() as f64,
            Dtw | Sbd | MpDist { .. } => unreachable!("elastic measures dispatch separately"),
        }
    }

    fn compute(&self, p: &[f64], q: &[f64]) -> Result<f64> {
        match self {
            Distance::Dtw => Ok(dtw(p, q)),
            Distance::Sbd => Ok(sbd(p, q)),
            Distance::MpDist { w, threshold } => {
                let a = Array::from_vector(p)?;
                let b = Array::from_vector(q)?;
                strider_matrix::mpdist(&a, &b, *w, Some(*threshold))
            }
            lockstep => {
                if p.len() != q.len() {
                    return Err(Error::Shape(
                        "lock-step distances require equal-length series".into(),
                    ));
                }
                Ok(lockstep.lockstep(p, q))
            }
        }
    }
}

/// Classic dynamic time warping with unit steps.
fn dtw(a: &[f64], b: &[f64]) -> f64 {
    let (m, n) = (a.len(), b.len());
    let mut prev = vec![f64::INFINITY; n + 1];
    let mut curr = vec![f64::INFINITY; n + 1];
    prev[0] = 0.0;
    for i in 1..=m {
        curr[0] = f64::INFINITY;
        for j in 1..=n {
            let cost = (a[i - 1] - b[j - 1]).abs();
            curr[j] = cost + prev[j].min(curr[j - 1]).min(prev[j - 1]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Shape-based distance: `1 - max normalized cross-correlation`.
fn sbd(a: &[f64], b: &[f64]) -> f64 {
    let na: f64 = a.iter().map(|v| v * v).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|v| v * v).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    let mut best = f64::NEG_INFINITY;
    let shifts = a.len() as i64;
    for s in -(shifts - 1)..shifts {
        let mut acc = 0.0;
        for (i, &av) in a.iter().enumerate() {
            let j = i as i64 - s;
            if j >= 0 && (j as usize) < b.len() {
                acc += av * b[j as usize];
            }
        }
        best = best.max(acc / (na * nb));
    }
    1.0 - best
}

/// Column-by-column distances between two matrices: entry `i` compares
/// `src` column `i` with `dst` column `i` (a single-column operand pairs
/// against every column of the other side).
pub fn distance_columns(measure: Distance, src: &Array, dst: &Array) -> Result<Array> {
    let (_, src_cols) = columns(src)?;
    let (_, dst_cols) = columns(dst)?;
    let pairs = src_cols.len().max(dst_cols.len());
    if src_cols.len() != dst_cols.len() && src_cols.len() != 1 && dst_cols.len() != 1 {
        return Err(Error::Shape(format!(
            "cannot pair {} source columns with {} destination columns",
            src_cols.len(),
            dst_cols.len()
        )));
    }
    let mut out = Vec::with_capacity(pairs);
    for i in 0..pairs {
        let p = &src_cols[i.min(src_cols.len() - 1)];
        let q = &dst_cols[i.min(dst_cols.len() - 1)];
        out.push(measure.compute(p, q)?);
    }
    Array::from_slice(&out, &[1, pairs])
}

/// Pairwise `N x N` distance matrix over the columns of `xa`, mirroring
/// the upper triangle when the measure is symmetric.
pub fn distance_matrix(measure: Distance, xa: &Array) -> Result<Array> {
    let (_, cols) = columns(xa)?;
    let n = cols.len();
    let out_shape = strider_array::Shape::matrix(n, n);
    let mut flat = vec![0.0f64; n * n];
    for i in 0..n {
        let start = if measure.symmetric() { i + 1 } else { 0 };
        for j in start..n {
            if i == j {
                continue;
            }
            let d = measure.compute(&cols[i], &cols[j])?;
            flat[out_shape.index_of([i, j, 0, 0])] = d;
            if measure.symmetric() {
                flat[out_shape.index_of([j, i, 0, 0])] = d;
            }
        }
    }
    Array::from_slice(&flat, &[n, n])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(measure: Distance, a: &[f64], b: &[f64]) -> f64 {
        let src = Array::from_slice(a, &[a.len(), 1]).unwrap();
        let dst = Array::from_slice(b, &[b.len(), 1]).unwrap();
        distance_columns(measure, &src, &dst).unwrap().scalar::<f64>().unwrap()
    }

    #[test]
    fn minkowski_family_reference_values() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_eq!(pairs(Distance::Manhattan, &a, &b), 7.0);
        assert_eq!(pairs(Distance::Euclidean, &a, &b), 5.0);
        assert_eq!(pairs(Distance::SquaredEuclidean, &a, &b), 25.0);
        assert_eq!(pairs(Distance::Chebyshev, &a, &b), 4.0);
        assert!((pairs(Distance::Minkowski(2.0), &a, &b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn hamming_counts_mismatches() {
        assert_eq!(pairs(Distance::Hamming, &[1.0, 2.0, 3.0], &[1.0, 0.0, 3.0]), 1.0);
    }

    #[test]
    fn probability_measures_on_distributions() {
        let p = [0.5, 0.5];
        let q = [0.9, 0.1];
        assert!(pairs(Distance::KullbackLeibler, &p, &q) > 0.0);
        assert!(pairs(Distance::JensenShannon, &p, &q) > 0.0);
        // identical distributions measure zero
        assert!(pairs(Distance::JensenShannon, &p, &p).abs() < 1e-12);
        assert!((pairs(Distance::Fidelity, &p, &p) - 1.0).abs() < 1e-12);
        assert!(pairs(Distance::Hellinger, &p, &p).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_identical_is_one() {
        let a = [1.0, 2.0, 3.0];
        assert!((pairs(Distance::Cosine, &a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dtw_known_value() {
        // dtw([1,1,2,3], [1,2,2,3]) warps at zero cost
        assert_eq!(pairs(Distance::Dtw, &[1.0, 1.0, 2.0, 3.0], &[1.0, 2.0, 2.0, 3.0]), 0.0);
        assert_eq!(pairs(Distance::Dtw, &[1.0, 1.0], &[2.0, 2.0]), 2.0);
    }

    #[test]
    fn sbd_is_shift_invariant() {
        let a = [0.0, 1.0, 2.0, 1.0, 0.0, 0.0];
        let b = [0.0, 0.0, 0.0, 1.0, 2.0, 1.0];
        assert!(pairs(Distance::Sbd, &a, &b) < 1e-12);
        assert!(pairs(Distance::Sbd, &a, &[1.0; 6]) > 0.1);
    }

    #[test]
    fn mpdist_variant_wraps_profile_distance() {
        let a: Vec<f64> = (0..32).map(|k| (k as f64 * 0.5).sin()).collect();
        let d = pairs(Distance::MpDist { w: 8, threshold: 0.05 }, &a, &a);
        assert!(d < 1e-6);
    }

    #[test]
    fn pairwise_driver_mirrors_symmetric_measures() {
        let xa = Array::from_slice(&[0.0, 0.0, 3.0, 4.0, 6.0, 8.0], &[2, 3]).unwrap();
        let m = distance_matrix(Distance::Euclidean, &xa).unwrap();
        let host = m.host_vec::<f64>().unwrap();
        let shape = m.shape();
        assert_eq!(host[shape.index_of([0, 0, 0, 0])], 0.0);
        assert_eq!(host[shape.index_of([0, 1, 0, 0])], 5.0);
        assert_eq!(host[shape.index_of([1, 0, 0, 0])], 5.0);
        assert_eq!(host[shape.index_of([0, 2, 0, 0])], 10.0);
    }

    #[test]
    fn lockstep_requires_equal_lengths() {
        let a = Array::from_slice(&[1.0, 2.0], &[2, 1]).unwrap();
        let b = Array::from_slice(&[1.0, 2.0, 3.0], &[3, 1]).unwrap();
        assert!(distance_columns(Distance::Euclidean, &a, &b).is_err());
        // elastic measures accept unequal lengths
        assert!(distance_columns(Distance::Dtw, &a, &b).is_ok());
    }
}
