//! Transform engine
//!
//! Iterative radix-2 Cooley-Tukey for power-of-two lengths, Bluestein's
//! chirp-z algorithm for everything else. Both directions are unnormalized;
//! the public layer applies the convention factor once per transform.

use num_complex::Complex64;
use std::f64::consts::PI;

pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

fn next_power_of_two(n: usize) -> usize {
    n.next_power_of_two()
}

/// In-place unnormalized DFT. `inverse` flips the twiddle sign.
pub fn transform(data: &mut Vec<Complex64>, inverse: bool) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    if is_power_of_two(n) {
        radix2(data, inverse);
    } else {
        bluestein(data, inverse);
    }
}

fn radix2(data: &mut [Complex64], inverse: bool) {
    let n = data.len();
    // bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            data.swap(i, j);
        }
    }
    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let ang = sign * 2.0 * PI / len as f64;
        let wlen = Complex64::new(ang.cos(), ang.sin());
        let mut i = 0;
        while i < n {
            let mut w = Complex64::new(1.0, 0.0);
            for k in 0..len / 2 {
                let u = data[i + k];
                let v = data[i + k + len / 2] * w;
                data[i + k] = u + v;
                data[i + k + len / 2] = u - v;
                w *= wlen;
            }
            i += len;
        }
        len <<= 1;
    }
}

/// Arbitrary-length DFT as a cyclic convolution at a power-of-two size.
fn bluestein(data: &mut Vec<Complex64>, inverse: bool) {
    let n = data.len();
    let sign = if inverse { 1.0 } else { -1.0 };
    let m = next_power_of_two(2 * n - 1);

    // chirp: w_k = exp(sign * i * pi * k^2 / n)
    let chirp: Vec<Complex64> = (0..n)
        .map(|k| {
            // k^2 mod 2n keeps the argument small for large k
            let k2 = (k as u128 * k as u128) % (2 * n as u128);
            let ang = sign * PI * k2 as f64 / n as f64;
            Complex64::new(ang.cos(), ang.sin())
        })
        .collect();

    let mut a = vec![Complex64::new(0.0, 0.0); m];
    for k in 0..n {
        a[k] = data[k] * chirp[k];
    }
    let mut b = vec![Complex64::new(0.0, 0.0); m];
    b[0] = chirp[0].conj();
    for k in 1..n {
        let c = chirp[k].conj();
        b[k] = c;
        b[m - k] = c;
    }

    radix2(&mut a, false);
    radix2(&mut b, false);
    for k in 0..m {
        a[k] *= b[k];
    }
    radix2(&mut a, true);
    let scale = 1.0 / m as f64;
    for k in 0..n {
        data[k] = a[k] * scale * chirp[k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(x: &[Complex64], inverse: bool) -> Vec<Complex64> {
        let n = x.len();
        let sign = if inverse { 1.0 } else { -1.0 };
        (0..n)
            .map(|k| {
                (0..n)
                    .map(|j| {
                        let ang = sign * 2.0 * PI * (k * j) as f64 / n as f64;
                        x[j] * Complex64::new(ang.cos(), ang.sin())
                    })
                    .sum()
            })
            .collect()
    }

    fn close(a: &[Complex64], b: &[Complex64], tol: f64) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).norm() < tol)
    }

    #[test]
    fn radix2_matches_naive() {
        let x: Vec<Complex64> = (0..8).map(|v| Complex64::new(v as f64, 0.0)).collect();
        let mut fast = x.clone();
        transform(&mut fast, false);
        assert!(close(&fast, &naive_dft(&x, false), 1e-9));
    }

    #[test]
    fn bluestein_matches_naive_on_odd_lengths() {
        for n in [3usize, 5, 7, 12, 15] {
            let x: Vec<Complex64> = (0..n)
                .map(|v| Complex64::new((v as f64).sin(), (v as f64 * 0.3).cos()))
                .collect();
            let mut fast = x.clone();
            transform(&mut fast, false);
            assert!(close(&fast, &naive_dft(&x, false), 1e-8), "length {n}");
        }
    }

    #[test]
    fn forward_then_inverse_scales_by_n() {
        for n in [8usize, 6, 10] {
            let x: Vec<Complex64> = (0..n).map(|v| Complex64::new(v as f64, -(v as f64))).collect();
            let mut y = x.clone();
            transform(&mut y, false);
            transform(&mut y, true);
            let scaled: Vec<Complex64> = x.iter().map(|v| v * n as f64).collect();
            assert!(close(&y, &scaled, 1e-8), "length {n}");
        }
    }
}
