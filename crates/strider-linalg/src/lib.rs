//! Linear algebra for the Strider analytics engine
//!
//! BLAS-like products plus the dense factorizations the higher batteries
//! need. Integer inputs auto-promote to floating point with a warning;
//! decompositions operate in double precision and narrow back to the input
//! precision.

use num_complex::Complex64;
use strider_array::{Array, DType, Error, Result, Shape};

pub mod dense;

use dense::Mat;

/// Per-operand modifier for [`matmul`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatProp {
    None,
    Trans,
    ConjTrans,
}

/// Norm selector for [`norm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormType {
    /// Euclidean (Frobenius over matrices).
    Euclid,
    /// `(sum |x|^p)^(1/p)` over all elements.
    P(f64),
    /// Matrix norm: q-norm over the p-norms of the columns.
    PQ(f64, f64),
}

fn float_dtype(dtype: DType) -> DType {
    match dtype {
        DType::F32 | DType::F64 | DType::C32 | DType::C64 => dtype,
        other => {
            log::warn!("promoting {other:?} input to floating point for linear algebra");
            DType::F64.supported()
        }
    }
}

fn as_matrix(arr: &Array) -> Result<Mat> {
    if arr.ndims() > 2 {
        return Err(Error::Arg(format!(
            "expected a matrix, got {} dimensions",
            arr.ndims()
        )));
    }
    let data = arr.host_vec::<f64>()?;
    Ok(Mat::from_data(arr.dim(0), arr.dim(1), data))
}

fn mat_to_array(m: &Mat, dtype: DType) -> Result<Array> {
    Array::from_storage(
        strider_array::storage::Storage::from_real_vec(dtype, m.data.clone()),
        Shape::matrix(m.rows, m.cols),
    )
}

fn out_precision(a: &Array, b: Option<&Array>) -> DType {
    let mut dt = float_dtype(a.dtype());
    if let Some(b) = b {
        dt = DType::promote(dt, float_dtype(b.dtype()));
    }
    dt
}

/// Matrix product with per-operand transpose/conjugate modifiers.
pub fn matmul(a: &Array, b: &Array, a_prop: MatProp, b_prop: MatProp) -> Result<Array> {
    let out_dtype = out_precision(a, Some(b));
    if out_dtype.is_complex() {
        return matmul_complex(a, b, a_prop, b_prop, out_dtype);
    }
    let ma = apply_prop_real(as_matrix(a)?, a_prop);
    let mb = apply_prop_real(as_matrix(b)?, b_prop);
    if ma.cols != mb.rows {
        return Err(Error::Shape(format!(
            "matmul dimensions disagree: {}x{} times {}x{}",
            ma.rows, ma.cols, mb.rows, mb.cols
        )));
    }
    mat_to_array(&ma.matmul(&mb), out_dtype)
}

fn apply_prop_real(m: Mat, prop: MatProp) -> Mat {
    match prop {
        MatProp::None => m,
        // conjugation is the identity on real data
        MatProp::Trans | MatProp::ConjTrans => m.transpose(),
    }
}

fn matmul_complex(
    a: &Array,
    b: &Array,
    a_prop: MatProp,
    b_prop: MatProp,
    out_dtype: DType,
) -> Result<Array> {
    let fetch = |arr: &Array, prop: MatProp| -> Result<(usize, usize, Vec<Complex64>)> {
        let (r, c) = (arr.dim(0), arr.dim(1));
        let data = arr.host_vec::<Complex64>()?;
        let (rows, cols, transposed) = match prop {
            MatProp::None => (r, c, false),
            MatProp::Trans | MatProp::ConjTrans => (c, r, true),
        };
        let conj = matches!(prop, MatProp::ConjTrans);
        let mut out = vec![Complex64::new(0.0, 0.0); rows * cols];
        for col in 0..cols {
            for row in 0..rows {
                let src = if transposed { row * r + col } else { col * r + row };
                let v = data[src];
                out[col * rows + row] = if conj { v.conj() } else { v };
            }
        }
        Ok((rows, cols, out))
    };
    let (ar, ac, av) = fetch(a, a_prop)?;
    let (br, bc, bv) = fetch(b, b_prop)?;
    if ac != br {
        return Err(Error::Shape(format!(
            "matmul dimensions disagree: {ar}x{ac} times {br}x{bc}"
        )));
    }
    let mut out = vec![Complex64::new(0.0, 0.0); ar * bc];
    for j in 0..bc {
        for k in 0..ac {
            let b_kj = bv[j * br + k];
            if b_kj.norm_sqr() == 0.0 {
                continue;
            }
            for i in 0..ar {
                out[j * ar + i] += av[k * ar + i] * b_kj;
            }
        }
    }
    Array::from_storage(
        strider_array::storage::Storage::from_complex_vec(out_dtype, out),
        Shape::matrix(ar, bc),
    )
}

/// `C <- alpha * A * B + beta * C`, accumulating in place into `c`.
pub fn gemm(alpha: f64, a: &Array, b: &Array, beta: f64, c: &Array) -> Result<()> {
    let product = matmul(a, b, MatProp::None, MatProp::None)?;
    if product.shape() != c.shape() {
        return Err(Error::Shape(format!(
            "gemm product shape {} does not match the accumulator {}",
            product.shape(),
            c.shape()
        )));
    }
    let updated = product.mul_scalar(alpha)?.add(&c.mul_scalar(beta)?)?;
    c.assign(&updated)
}

/// Inner product of two vectors, returned as a 1x1 array.
pub fn dot(a: &Array, b: &Array) -> Result<Array> {
    if a.elements() != b.elements() {
        return Err(Error::Shape(format!(
            "dot requires equal lengths, got {} and {}",
            a.elements(),
            b.elements()
        )));
    }
    a.flat()?.mul(&b.flat()?)?.sum(None)
}

/// Vector/matrix norm under the chosen selector.
pub fn norm(a: &Array, kind: NormType) -> Result<f64> {
    let data = a.host_vec::<f64>()?;
    match kind {
        NormType::Euclid => Ok(data.iter().map(|v| v * v).sum::<f64>().sqrt()),
        NormType::P(p) => {
            if p <= 0.0 {
                return Err(Error::Arg("norm order must be positive".into()));
            }
            Ok(data.iter().map(|v| v.abs().powf(p)).sum::<f64>().powf(1.0 / p))
        }
        NormType::PQ(p, q) => {
            if p <= 0.0 || q <= 0.0 {
                return Err(Error::Arg("norm orders must be positive".into()));
            }
            let m = as_matrix(a)?;
            let mut acc = 0.0;
            for c in 0..m.cols {
                let colp: f64 = m.col(c).iter().map(|v| v.abs().powf(p)).sum::<f64>().powf(1.0 / p);
                acc += colp.powf(q);
            }
            Ok(acc.powf(1.0 / q))
        }
    }
}

/// Determinant via LU.
pub fn det(a: &Array) -> Result<f64> {
    let m = as_matrix(a)?;
    let (_, u, _, sign) = dense::lu_decompose(&m)?;
    let mut d = sign;
    for i in 0..u.rows {
        d *= u.at(i, i);
    }
    Ok(d)
}

/// Matrix inverse via LU solve against the identity.
pub fn inverse(a: &Array) -> Result<Array> {
    let m = as_matrix(a)?;
    if m.rows != m.cols {
        return Err(Error::Arg(format!(
            "inverse requires a square matrix, got {}x{}",
            m.rows, m.cols
        )));
    }
    let inv = dense::lu_solve(&m, &Mat::identity(m.rows))?;
    mat_to_array(&inv, out_precision(a, None))
}

/// Moore-Penrose pseudoinverse through the SVD, zeroing singular values at
/// or below `tol * max(sigma)`.
pub fn pinverse(a: &Array, tol: f64) -> Result<Array> {
    let (u, s, v) = svd_parts(a)?;
    let cutoff = tol.max(0.0) * s.first().copied().unwrap_or(0.0);
    let k = s.len();
    // V diag(1/sigma) U^T
    let mut vs = v.clone();
    for j in 0..k {
        let factor = if s[j] > cutoff && s[j] > 0.0 { 1.0 / s[j] } else { 0.0 };
        for i in 0..vs.rows {
            vs[(i, j)] *= factor;
        }
    }
    let pinv = vs.matmul(&u.transpose());
    mat_to_array(&pinv, out_precision(a, None))
}

/// Numerical rank: singular values above `tol * max(sigma)`.
pub fn rank(a: &Array, tol: f64) -> Result<usize> {
    let (_, s, _) = svd_parts(a)?;
    let cutoff = tol.max(0.0) * s.first().copied().unwrap_or(0.0);
    Ok(s.iter().filter(|&&v| v > cutoff && v > 0.0).count())
}

/// Cholesky factorization of a positive-definite matrix.
///
/// With `is_upper` the upper factor U satisfying `A = U^T U` is returned;
/// otherwise the lower factor L with `A = L L^T`. A non-positive-definite
/// input fails with the rank of the offending leading minor.
pub fn cholesky(a: &Array, is_upper: bool) -> Result<Array> {
    let m = as_matrix(a)?;
    if m.rows != m.cols {
        return Err(Error::Arg(format!(
            "cholesky requires a square matrix, got {}x{}",
            m.rows, m.cols
        )));
    }
    let l = dense::cholesky_lower(&m).map_err(|rank| Error::Cholesky { rank })?;
    let out = if is_upper { l.transpose() } else { l };
    mat_to_array(&out, out_precision(a, None))
}

/// LU factorization: `(L, U, pivot)` with `pivot[i]` naming the original
/// row carried into row `i`.
pub fn lu(a: &Array) -> Result<(Array, Array, Array)> {
    let m = as_matrix(a)?;
    let (l, u, pivot, _) = dense::lu_decompose(&m)?;
    let dtype = out_precision(a, None);
    Ok((
        mat_to_array(&l, dtype)?,
        mat_to_array(&u, dtype)?,
        Array::from_storage(
            strider_array::storage::Storage::U32(pivot),
            Shape::vector(m.rows),
        )?,
    ))
}

/// Householder QR: `(Q, R, tau)`.
pub fn qr(a: &Array) -> Result<(Array, Array, Array)> {
    let m = as_matrix(a)?;
    let (q, r, tau) = dense::qr_decompose(&m);
    let dtype = out_precision(a, None);
    let tau_len = tau.len().max(1);
    let tau = if tau.is_empty() { vec![0.0] } else { tau };
    Ok((
        mat_to_array(&q, dtype)?,
        mat_to_array(&r, dtype)?,
        Array::from_storage(
            strider_array::storage::Storage::from_real_vec(dtype, tau),
            Shape::vector(tau_len),
        )?,
    ))
}

fn svd_parts(a: &Array) -> Result<(Mat, Vec<f64>, Mat)> {
    let m = as_matrix(a)?;
    if m.rows >= m.cols {
        Ok(dense::svd_tall(&m))
    } else {
        // factor the transpose and swap the orthogonal sides
        let (u, s, v) = dense::svd_tall(&m.transpose());
        Ok((v, s, u))
    }
}

/// Singular value decomposition: `(U, sigma, V^T)`.
pub fn svd(a: &Array) -> Result<(Array, Array, Array)> {
    let (u, s, v) = svd_parts(a)?;
    let dtype = out_precision(a, None);
    let s_len = s.len();
    Ok((
        mat_to_array(&u, dtype)?,
        Array::from_storage(
            strider_array::storage::Storage::from_real_vec(dtype, s),
            Shape::vector(s_len),
        )?,
        mat_to_array(&v.transpose(), dtype)?,
    ))
}

/// Symmetric eigendecomposition: eigenvalues ascending, eigenvectors by
/// column (the last column pairs with the largest eigenvalue).
pub fn eigh(a: &Array) -> Result<(Array, Array)> {
    let m = as_matrix(a)?;
    let (vals, vecs) = dense::eigh_symmetric(&m)?;
    let dtype = out_precision(a, None);
    let n = vals.len();
    Ok((
        Array::from_storage(
            strider_array::storage::Storage::from_real_vec(dtype, vals),
            Shape::vector(n),
        )?,
        mat_to_array(&vecs, dtype)?,
    ))
}
