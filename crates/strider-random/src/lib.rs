//! Random engines for the Strider analytics engine
//!
//! Seedable generators producing arrays of the usual distributions.
//! Results are deterministic per engine kind, seed, shape and dtype.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{
    Beta, ChiSquared, Distribution, Exp, Gamma, InverseGaussian, LogNormal, Normal, Uniform,
};
use strider_array::{Array, DType, Error, Result, Shape};
use strider_linalg::cholesky;

/// Selectable generator families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// The standard library generator, seeded.
    Default,
    /// ChaCha stream-cipher generator.
    ChaCha,
}

enum Generator {
    Default(rand::rngs::StdRng),
    ChaCha(ChaCha8Rng),
}

impl RngCore for Generator {
    fn next_u32(&mut self) -> u32 {
        match self {
            Generator::Default(r) => r.next_u32(),
            Generator::ChaCha(r) => r.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            Generator::Default(r) => r.next_u64(),
            Generator::ChaCha(r) => r.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            Generator::Default(r) => r.fill_bytes(dest),
            Generator::ChaCha(r) => r.fill_bytes(dest),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        match self {
            Generator::Default(r) => r.try_fill_bytes(dest),
            Generator::ChaCha(r) => r.try_fill_bytes(dest),
        }
    }
}

/// A seeded random engine producing device arrays.
pub struct RandomEngine {
    kind: EngineKind,
    rng: Generator,
}

/// Build an engine of the requested kind and seed.
pub fn default_rng(kind: EngineKind, seed: u64) -> RandomEngine {
    let rng = match kind {
        EngineKind::Default => Generator::Default(rand::rngs::StdRng::seed_from_u64(seed)),
        EngineKind::ChaCha => Generator::ChaCha(ChaCha8Rng::seed_from_u64(seed)),
    };
    RandomEngine { kind, rng }
}

fn dist_error(what: &str, err: impl std::fmt::Display) -> Error {
    Error::Arg(format!("{what}: {err}"))
}

impl RandomEngine {
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    fn sample_array<D: Distribution<f64>>(
        &mut self,
        dist: D,
        dims: &[usize],
        dtype: DType,
    ) -> Result<Array> {
        let shape = Shape::new(dims)?;
        let data: Vec<f64> = (0..shape.elements()).map(|_| dist.sample(&mut self.rng)).collect();
        Array::from_storage(
            strider_array::storage::Storage::from_real_vec(dtype.supported(), data),
            shape,
        )
    }

    /// Uniform samples over `[low, high)`.
    pub fn uniform(&mut self, low: f64, high: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        if low >= high {
            return Err(Error::Arg("uniform requires low < high".into()));
        }
        self.sample_array(Uniform::new(low, high), dims, dtype)
    }

    /// Gaussian samples.
    pub fn normal(&mut self, mean: f64, sigma: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        let dist = Normal::new(mean, sigma).map_err(|e| dist_error("normal", e))?;
        self.sample_array(dist, dims, dtype)
    }

    /// Log-normal samples with the given log-space mean and sigma.
    pub fn lognormal(
        &mut self,
        mean: f64,
        sigma: f64,
        dims: &[usize],
        dtype: DType,
    ) -> Result<Array> {
        let dist = LogNormal::new(mean, sigma).map_err(|e| dist_error("lognormal", e))?;
        self.sample_array(dist, dims, dtype)
    }

    /// Logistic samples via inverse-CDF transform of a uniform draw.
    pub fn logistic(&mut self, loc: f64, scale: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        if scale <= 0.0 {
            return Err(Error::Arg("logistic scale must be positive".into()));
        }
        let shape = Shape::new(dims)?;
        let data: Vec<f64> = (0..shape.elements())
            .map(|_| {
                let u: f64 = self.rng.gen_range(f64::EPSILON..1.0);
                loc + scale * (u / (1.0 - u)).ln()
            })
            .collect();
        Array::from_storage(
            strider_array::storage::Storage::from_real_vec(dtype.supported(), data),
            shape,
        )
    }

    /// Gamma samples with shape `alpha` and the given scale.
    pub fn gamma(&mut self, alpha: f64, scale: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        let dist = Gamma::new(alpha, scale).map_err(|e| dist_error("gamma", e))?;
        self.sample_array(dist, dims, dtype)
    }

    /// Beta samples.
    pub fn beta(&mut self, a: f64, b: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        let dist = Beta::new(a, b).map_err(|e| dist_error("beta", e))?;
        self.sample_array(dist, dims, dtype)
    }

    /// Chi-squared samples with `df` degrees of freedom.
    pub fn chisquare(&mut self, df: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        let dist = ChiSquared::new(df).map_err(|e| dist_error("chisquare", e))?;
        self.sample_array(dist, dims, dtype)
    }

    /// Wald (inverse Gaussian) samples.
    pub fn wald(&mut self, mean: f64, scale: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        let dist = InverseGaussian::new(mean, scale).map_err(|e| dist_error("wald", e))?;
        self.sample_array(dist, dims, dtype)
    }

    /// Exponential samples with the given scale (mean).
    pub fn exponential(&mut self, scale: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        if scale <= 0.0 {
            return Err(Error::Arg("exponential scale must be positive".into()));
        }
        let dist = Exp::new(1.0 / scale).map_err(|e| dist_error("exponential", e))?;
        self.sample_array(dist, dims, dtype)
    }

    /// Integer samples over `[low, high)`; with `high` absent, `[0, low)`.
    pub fn randint(
        &mut self,
        low: i64,
        high: Option<i64>,
        dims: &[usize],
        dtype: DType,
    ) -> Result<Array> {
        let (lo, hi) = match high {
            Some(h) => (low, h),
            None => (0, low),
        };
        if lo >= hi {
            return Err(Error::Arg("randint requires an ascending range".into()));
        }
        if !dtype.is_integer() && !dtype.is_floating() {
            return Err(Error::Type("randint requires a numeric dtype".into()));
        }
        let shape = Shape::new(dims)?;
        let data: Vec<i64> = (0..shape.elements()).map(|_| self.rng.gen_range(lo..hi)).collect();
        Array::from_storage(
            strider_array::storage::Storage::from_int_vec(dtype.supported(), data),
            shape,
        )
    }

    /// Draw `samples` vectors from a multivariate normal with the given
    /// mean vector and covariance matrix. Output is `(dims, samples)`.
    pub fn multivariate_normal(
        &mut self,
        mean: &Array,
        cov: &Array,
        samples: usize,
    ) -> Result<Array> {
        let d = mean.elements();
        if cov.dim(0) != d || cov.dim(1) != d {
            return Err(Error::Shape(format!(
                "covariance must be {d}x{d} to match the mean vector"
            )));
        }
        // factor the covariance so correlated draws are L z + mean
        let l = cholesky(cov, false)?;
        let lv = l.host_vec::<f64>()?;
        let mv = mean.host_vec::<f64>()?;
        let std_normal = Normal::new(0.0, 1.0).map_err(|e| dist_error("normal", e))?;

        let mut out = vec![0.0f64; d * samples];
        for s in 0..samples {
            let z: Vec<f64> = (0..d).map(|_| std_normal.sample(&mut self.rng)).collect();
            for r in 0..d {
                // L is column-major lower triangular
                let mut acc = 0.0;
                for c in 0..=r {
                    acc += lv[c * d + r] * z[c];
                }
                out[s * d + r] = mv[r] + acc;
            }
        }
        Array::from_slice(&out, &[d, samples])
    }

    /// Random permutation of the positions along `axis`, applied to `x`.
    pub fn permutation(&mut self, x: &Array, axis: usize) -> Result<Array> {
        if axis >= 4 {
            return Err(Error::Arg(format!("axis {axis} out of range")));
        }
        let n = x.dim(axis);
        let mut order: Vec<i64> = (0..n as i64).collect();
        for i in (1..n).rev() {
            let j = self.rng.gen_range(0..=i);
            order.swap(i, j);
        }
        let idx = Array::from_slice(&order, &[n])?;
        let mut selectors = vec![
            strider_array::Selector::Span,
            strider_array::Selector::Span,
            strider_array::Selector::Span,
            strider_array::Selector::Span,
        ];
        selectors[axis] = strider_array::Selector::Take(idx);
        x.get(&selectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_engines_are_deterministic() {
        for kind in [EngineKind::Default, EngineKind::ChaCha] {
            let mut a = default_rng(kind, 42);
            let mut b = default_rng(kind, 42);
            let x = a.uniform(0.0, 1.0, &[16], DType::F64).unwrap();
            let y = b.uniform(0.0, 1.0, &[16], DType::F64).unwrap();
            assert_eq!(x.host_vec::<f64>().unwrap(), y.host_vec::<f64>().unwrap());
        }
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = default_rng(EngineKind::ChaCha, 1);
        let mut b = default_rng(EngineKind::ChaCha, 2);
        let x = a.uniform(0.0, 1.0, &[16], DType::F64).unwrap();
        let y = b.uniform(0.0, 1.0, &[16], DType::F64).unwrap();
        assert_ne!(x.host_vec::<f64>().unwrap(), y.host_vec::<f64>().unwrap());
    }

    #[test]
    fn uniform_respects_bounds() {
        let mut rng = default_rng(EngineKind::Default, 7);
        let x = rng.uniform(-2.0, 3.0, &[1000], DType::F64).unwrap();
        for v in x.host_vec::<f64>().unwrap() {
            assert!((-2.0..3.0).contains(&v));
        }
        assert!(rng.uniform(1.0, 1.0, &[4], DType::F64).is_err());
    }

    #[test]
    fn normal_moments() {
        let mut rng = default_rng(EngineKind::ChaCha, 11);
        let x = rng.normal(5.0, 2.0, &[20000], DType::F64).unwrap();
        let host = x.host_vec::<f64>().unwrap();
        let mu: f64 = host.iter().sum::<f64>() / host.len() as f64;
        let sd: f64 = (host.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>()
            / host.len() as f64)
            .sqrt();
        assert!((mu - 5.0).abs() < 0.1);
        assert!((sd - 2.0).abs() < 0.1);
    }

    #[test]
    fn randint_bounds_and_dtype() {
        let mut rng = default_rng(EngineKind::Default, 3);
        let x = rng.randint(10, None, &[500], DType::S32).unwrap();
        assert_eq!(x.dtype(), DType::S32);
        for v in x.host_vec::<i32>().unwrap() {
            assert!((0..10).contains(&v));
        }
        assert!(rng.randint(5, Some(5), &[4], DType::S32).is_err());
    }

    #[test]
    fn positive_distributions_stay_positive() {
        let mut rng = default_rng(EngineKind::ChaCha, 5);
        for arr in [
            rng.gamma(2.0, 1.5, &[200], DType::F64).unwrap(),
            rng.chisquare(3.0, &[200], DType::F64).unwrap(),
            rng.exponential(2.0, &[200], DType::F64).unwrap(),
            rng.wald(1.0, 1.0, &[200], DType::F64).unwrap(),
            rng.lognormal(0.0, 0.5, &[200], DType::F64).unwrap(),
        ] {
            for v in arr.host_vec::<f64>().unwrap() {
                assert!(v > 0.0, "sample {v} escaped the support");
            }
        }
        for v in rng.beta(2.0, 2.0, &[200], DType::F64).unwrap().host_vec::<f64>().unwrap() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn multivariate_normal_covariance() {
        let mut rng = default_rng(EngineKind::ChaCha, 9);
        let mean = Array::from_vector(&[1.0, -1.0]).unwrap();
        let cov = Array::from_slice(&[2.0, 0.8, 0.8, 1.0], &[2, 2]).unwrap();
        let draws = rng.multivariate_normal(&mean, &cov, 20000).unwrap();
        assert_eq!(draws.dims()[0], 2);
        let host = draws.host_vec::<f64>().unwrap();
        let n = 20000usize;
        let m0: f64 = (0..n).map(|s| host[s * 2]).sum::<f64>() / n as f64;
        let m1: f64 = (0..n).map(|s| host[s * 2 + 1]).sum::<f64>() / n as f64;
        assert!((m0 - 1.0).abs() < 0.05);
        assert!((m1 + 1.0).abs() < 0.05);
        let c01: f64 = (0..n)
            .map(|s| (host[s * 2] - m0) * (host[s * 2 + 1] - m1))
            .sum::<f64>()
            / n as f64;
        assert!((c01 - 0.8).abs() < 0.08);
    }

    #[test]
    fn permutation_preserves_multiset() {
        let mut rng = default_rng(EngineKind::Default, 13);
        let x = Array::from_vector(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let p = rng.permutation(&x, 0).unwrap();
        let mut host = p.host_vec::<f64>().unwrap();
        host.sort_by(f64::total_cmp);
        assert_eq!(host, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
