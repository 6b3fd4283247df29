//! Dense column-major matrix kernels
//!
//! The factorization and solver internals operate on a plain `f64`
//! column-major matrix lifted out of the array layer. Algorithms: LU with
//! partial pivoting, Householder QR, Cholesky, one-sided Jacobi SVD, and a
//! cyclic Jacobi symmetric eigensolver.

use rayon::prelude::*;
use strider_core::{Error, Result};

/// Column-major dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Mat {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Mat {
    pub fn zeros(rows: usize, cols: usize) -> Mat {
        Mat { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn identity(n: usize) -> Mat {
        let mut m = Mat::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn from_data(rows: usize, cols: usize, data: Vec<f64>) -> Mat {
        debug_assert_eq!(data.len(), rows * cols);
        Mat { rows, cols, data }
    }

    #[inline]
    pub fn at(&self, r: usize, c: usize) -> f64 {
        self.data[c * self.rows + r]
    }

    pub fn col(&self, c: usize) -> &[f64] {
        &self.data[c * self.rows..(c + 1) * self.rows]
    }

    pub fn transpose(&self) -> Mat {
        let mut out = Mat::zeros(self.cols, self.rows);
        for c in 0..self.cols {
            for r in 0..self.rows {
                out[(c, r)] = self.at(r, c);
            }
        }
        out
    }

    pub fn matmul(&self, other: &Mat) -> Mat {
        debug_assert_eq!(self.cols, other.rows);
        let mut out = Mat::zeros(self.rows, other.cols);
        let rows = self.rows;
        out.data
            .par_chunks_mut(rows.max(1))
            .enumerate()
            .for_each(|(j, out_col)| {
                for k in 0..self.cols {
                    let b = other.at(k, j);
                    if b == 0.0 {
                        continue;
                    }
                    let a_col = self.col(k);
                    for r in 0..rows {
                        out_col[r] += a_col[r] * b;
                    }
                }
            });
        out
    }
}

impl std::ops::Index<(usize, usize)> for Mat {
    type Output = f64;
    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        &self.data[c * self.rows + r]
    }
}

impl std::ops::IndexMut<(usize, usize)> for Mat {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        &mut self.data[c * self.rows + r]
    }
}

/// LU factorization with partial pivoting: returns (L, U, pivot, sign).
/// `pivot[i]` is the original row now living at row `i`.
pub fn lu_decompose(a: &Mat) -> Result<(Mat, Mat, Vec<u32>, f64)> {
    if a.rows != a.cols {
        return Err(Error::Arg(format!(
            "lu requires a square matrix, got {}x{}",
            a.rows, a.cols
        )));
    }
    let n = a.rows;
    let mut u = a.clone();
    let mut l = Mat::identity(n);
    let mut pivot: Vec<u32> = (0..n as u32).collect();
    let mut sign = 1.0;

    for k in 0..n {
        // pick the largest remaining entry of column k
        let mut p = k;
        let mut best = u.at(k, k).abs();
        for r in k + 1..n {
            let v = u.at(r, k).abs();
            if v > best {
                best = v;
                p = r;
            }
        }
        if p != k {
            for c in 0..n {
                let tmp = u.at(k, c);
                u[(k, c)] = u.at(p, c);
                u[(p, c)] = tmp;
            }
            for c in 0..k {
                let tmp = l.at(k, c);
                l[(k, c)] = l.at(p, c);
                l[(p, c)] = tmp;
            }
            pivot.swap(k, p);
            sign = -sign;
        }
        let diag = u.at(k, k);
        if diag == 0.0 {
            continue; // singular; det falls out as zero
        }
        for r in k + 1..n {
            let factor = u.at(r, k) / diag;
            l[(r, k)] = factor;
            for c in k..n {
                u[(r, c)] -= factor * u.at(k, c);
            }
        }
    }
    // zero the strictly-lower part of U explicitly
    for c in 0..n {
        for r in c + 1..n {
            u[(r, c)] = 0.0;
        }
    }
    Ok((l, u, pivot, sign))
}

/// Solve `A x = b` for several right-hand sides via LU.
pub fn lu_solve(a: &Mat, rhs: &Mat) -> Result<Mat> {
    let (l, u, pivot, _) = lu_decompose(a)?;
    let n = a.rows;
    for k in 0..n {
        if u.at(k, k) == 0.0 {
            return Err(Error::Arg("matrix is singular".into()));
        }
    }
    let mut out = Mat::zeros(n, rhs.cols);
    for j in 0..rhs.cols {
        // forward substitution on the permuted rhs
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut acc = rhs.at(pivot[i] as usize, j);
            for k in 0..i {
                acc -= l.at(i, k) * y[k];
            }
            y[i] = acc;
        }
        // back substitution
        for i in (0..n).rev() {
            let mut acc = y[i];
            for k in i + 1..n {
                acc -= u.at(i, k) * out.at(k, j);
            }
            out[(i, j)] = acc / u.at(i, i);
        }
    }
    Ok(out)
}

/// Householder QR: returns (Q, R, tau) with Q `m x m`, R `m x n`.
pub fn qr_decompose(a: &Mat) -> (Mat, Mat, Vec<f64>) {
    let (m, n) = (a.rows, a.cols);
    let mut r = a.clone();
    let mut q = Mat::identity(m);
    let steps = n.min(m.saturating_sub(1));
    let mut taus = Vec::with_capacity(steps);

    for k in 0..steps {
        // build the reflector annihilating below the diagonal of column k
        let mut norm = 0.0;
        for i in k..m {
            norm += r.at(i, k) * r.at(i, k);
        }
        let norm = norm.sqrt();
        if norm == 0.0 {
            taus.push(0.0);
            continue;
        }
        let alpha = if r.at(k, k) >= 0.0 { -norm } else { norm };
        let mut v = vec![0.0; m];
        v[k] = r.at(k, k) - alpha;
        for i in k + 1..m {
            v[i] = r.at(i, k);
        }
        let vtv: f64 = v.iter().map(|x| x * x).sum();
        if vtv == 0.0 {
            taus.push(0.0);
            continue;
        }
        let tau = 2.0 / vtv;
        taus.push(tau);

        // R <- (I - tau v v^T) R
        for c in 0..n {
            let mut dot = 0.0;
            for i in k..m {
                dot += v[i] * r.at(i, c);
            }
            let dot = dot * tau;
            for i in k..m {
                r[(i, c)] -= dot * v[i];
            }
        }
        // Q <- Q (I - tau v v^T)
        for rr in 0..m {
            let mut dot = 0.0;
            for i in k..m {
                dot += q.at(rr, i) * v[i];
            }
            let dot = dot * tau;
            for i in k..m {
                q[(rr, i)] -= dot * v[i];
            }
        }
    }
    // clean numerical dust below the diagonal
    for c in 0..n {
        for rr in c + 1..m {
            r[(rr, c)] = 0.0;
        }
    }
    (q, r, taus)
}

/// Cholesky factorization. Returns lower-triangular L with `A = L L^T`, or
/// the 1-based rank of the failing leading minor.
pub fn cholesky_lower(a: &Mat) -> std::result::Result<Mat, usize> {
    let n = a.rows;
    let mut l = Mat::zeros(n, n);
    for j in 0..n {
        let mut diag = a.at(j, j);
        for k in 0..j {
            diag -= l.at(j, k) * l.at(j, k);
        }
        if diag <= 0.0 {
            return Err(j + 1);
        }
        let diag = diag.sqrt();
        l[(j, j)] = diag;
        for i in j + 1..n {
            let mut v = a.at(i, j);
            for k in 0..j {
                v -= l.at(i, k) * l.at(j, k);
            }
            l[(i, j)] = v / diag;
        }
    }
    Ok(l)
}

/// One-sided Jacobi SVD of an `m x n` matrix with `m >= n`:
/// returns (U `m x n`, sigma `n`, V `n x n`).
pub fn svd_tall(a: &Mat) -> (Mat, Vec<f64>, Mat) {
    let (m, n) = (a.rows, a.cols);
    debug_assert!(m >= n);
    let mut u = a.clone();
    let mut v = Mat::identity(n);
    let eps = 1e-12;

    for _sweep in 0..60 {
        let mut off = 0.0f64;
        for p in 0..n {
            for q in p + 1..n {
                let mut app = 0.0;
                let mut aqq = 0.0;
                let mut apq = 0.0;
                for i in 0..m {
                    let x = u.at(i, p);
                    let y = u.at(i, q);
                    app += x * x;
                    aqq += y * y;
                    apq += x * y;
                }
                off = off.max(apq.abs() / (app * aqq).sqrt().max(f64::MIN_POSITIVE));
                if apq.abs() <= eps * (app * aqq).sqrt() {
                    continue;
                }
                // Jacobi rotation zeroing the (p, q) inner product
                let zeta = (aqq - app) / (2.0 * apq);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;
                for i in 0..m {
                    let x = u.at(i, p);
                    let y = u.at(i, q);
                    u[(i, p)] = c * x - s * y;
                    u[(i, q)] = s * x + c * y;
                }
                for i in 0..n {
                    let x = v.at(i, p);
                    let y = v.at(i, q);
                    v[(i, p)] = c * x - s * y;
                    v[(i, q)] = s * x + c * y;
                }
            }
        }
        if off < eps {
            break;
        }
    }

    // singular values are the column norms of the rotated U
    let mut sigma = vec![0.0; n];
    for j in 0..n {
        let norm: f64 = u.col(j).iter().map(|x| x * x).sum::<f64>().sqrt();
        sigma[j] = norm;
        if norm > 0.0 {
            for i in 0..m {
                u[(i, j)] /= norm;
            }
        }
    }

    // order descending, carrying U and V columns along
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| sigma[b].total_cmp(&sigma[a]));
    let mut u_sorted = Mat::zeros(m, n);
    let mut v_sorted = Mat::zeros(n, n);
    let mut s_sorted = vec![0.0; n];
    for (dst, &src) in order.iter().enumerate() {
        s_sorted[dst] = sigma[src];
        for i in 0..m {
            u_sorted[(i, dst)] = u.at(i, src);
        }
        for i in 0..n {
            v_sorted[(i, dst)] = v.at(i, src);
        }
    }
    (u_sorted, s_sorted, v_sorted)
}

/// Cyclic Jacobi eigensolver for a symmetric matrix: returns
/// (eigenvalues ascending, eigenvectors by column).
pub fn eigh_symmetric(a: &Mat) -> Result<(Vec<f64>, Mat)> {
    if a.rows != a.cols {
        return Err(Error::Arg(format!(
            "eigh requires a square matrix, got {}x{}",
            a.rows, a.cols
        )));
    }
    let n = a.rows;
    let mut m = a.clone();
    let mut vecs = Mat::identity(n);

    for _sweep in 0..100 {
        let mut off = 0.0f64;
        for p in 0..n {
            for q in p + 1..n {
                off += m.at(p, q) * m.at(p, q);
            }
        }
        if off.sqrt() < 1e-12 {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                let apq = m.at(p, q);
                if apq.abs() < 1e-15 {
                    continue;
                }
                let theta = (m.at(q, q) - m.at(p, p)) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (1.0 + theta * theta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;
                for k in 0..n {
                    let mkp = m.at(k, p);
                    let mkq = m.at(k, q);
                    m[(k, p)] = c * mkp - s * mkq;
                    m[(k, q)] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let mpk = m.at(p, k);
                    let mqk = m.at(q, k);
                    m[(p, k)] = c * mpk - s * mqk;
                    m[(q, k)] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let vkp = vecs.at(k, p);
                    let vkq = vecs.at(k, q);
                    vecs[(k, p)] = c * vkp - s * vkq;
                    vecs[(k, q)] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut vals: Vec<f64> = (0..n).map(|i| m.at(i, i)).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| vals[a].total_cmp(&vals[b]));
    let sorted_vals: Vec<f64> = order.iter().map(|&i| vals[i]).collect();
    let mut sorted_vecs = Mat::zeros(n, n);
    for (dst, &src) in order.iter().enumerate() {
        for i in 0..n {
            sorted_vecs[(i, dst)] = vecs.at(i, src);
        }
    }
    vals = sorted_vals;
    Ok((vals, sorted_vecs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn matmul_identity() {
        let a = Mat::from_data(2, 2, vec![1.0, 3.0, 2.0, 4.0]);
        let i = Mat::identity(2);
        assert_eq!(a.matmul(&i), a);
    }

    #[test]
    fn lu_reconstructs() {
        let a = Mat::from_data(3, 3, vec![4.0, 2.0, 1.0, 3.0, 5.0, 2.0, 1.0, 1.0, 6.0]);
        let (l, u, pivot, _) = lu_decompose(&a).unwrap();
        let lu = l.matmul(&u);
        for r in 0..3 {
            for c in 0..3 {
                assert!(approx(lu.at(r, c), a.at(pivot[r] as usize, c), 1e-10));
            }
        }
    }

    #[test]
    fn solve_known_system() {
        let a = Mat::from_data(2, 2, vec![2.0, 1.0, 1.0, 3.0]);
        let b = Mat::from_data(2, 1, vec![5.0, 10.0]);
        let x = lu_solve(&a, &b).unwrap();
        // 2x + y = 5, x + 3y = 10
        assert!(approx(x.at(0, 0), 1.0, 1e-10));
        assert!(approx(x.at(1, 0), 3.0, 1e-10));
    }

    #[test]
    fn qr_orthogonality() {
        let a = Mat::from_data(3, 2, vec![1.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let (q, r, _tau) = qr_decompose(&a);
        let qr = q.matmul(&r);
        for c in 0..2 {
            for rr in 0..3 {
                assert!(approx(qr.at(rr, c), a.at(rr, c), 1e-10));
            }
        }
        let qtq = q.transpose().matmul(&q);
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!(approx(qtq.at(i, j), expect, 1e-10));
            }
        }
    }

    #[test]
    fn cholesky_round_trip_and_failure() {
        let a = Mat::from_data(2, 2, vec![4.0, 2.0, 2.0, 3.0]);
        let l = cholesky_lower(&a).unwrap();
        let llt = l.matmul(&l.transpose());
        for i in 0..2 {
            for j in 0..2 {
                assert!(approx(llt.at(i, j), a.at(i, j), 1e-10));
            }
        }

        let bad = Mat::from_data(2, 2, vec![1.0, 2.0, 2.0, 1.0]);
        assert_eq!(cholesky_lower(&bad).unwrap_err(), 2);
    }

    #[test]
    fn svd_reconstructs() {
        let a = Mat::from_data(3, 2, vec![3.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
        let (u, s, v) = svd_tall(&a);
        assert!(s[0] >= s[1]);
        // A = U diag(s) V^T
        let mut us = u.clone();
        for j in 0..2 {
            for i in 0..3 {
                us[(i, j)] *= s[j];
            }
        }
        let rec = us.matmul(&v.transpose());
        for c in 0..2 {
            for r in 0..3 {
                assert!(approx(rec.at(r, c), a.at(r, c), 1e-9));
            }
        }
    }

    #[test]
    fn eigh_diagonalizes() {
        let a = Mat::from_data(2, 2, vec![2.0, 1.0, 1.0, 2.0]);
        let (vals, vecs) = eigh_symmetric(&a).unwrap();
        assert!(approx(vals[0], 1.0, 1e-10));
        assert!(approx(vals[1], 3.0, 1e-10));
        // A v = lambda v for the top eigenpair
        let av = a.matmul(&vecs);
        for i in 0..2 {
            assert!(approx(av.at(i, 1), vals[1] * vecs.at(i, 1), 1e-9));
        }
    }
}
