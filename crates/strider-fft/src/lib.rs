//! FFT module for the Strider analytics engine
//!
//! Complex and real transforms of rank 1 to 3 with four normalization
//! conventions, frequency grids, `fftshift`, and the spectral derivative.
//! Transforms run along the leading axes; trailing axes batch. Real
//! transforms use Hermitian packing along the first axis, and the inverse
//! takes its output length (even or odd) from the requested shape.

use num_complex::Complex64;
use std::f64::consts::PI;

use strider_array::{arange, join, Array, DType, Error, Result, Shape};

mod engine;

/// Low-level unnormalized in-place DFT (any length). The matrix-profile
/// kernels drive their convolutions through this without paying for array
/// plumbing per call.
pub fn engine_transform(data: &mut Vec<Complex64>, inverse: bool) {
    engine::transform(data, inverse);
}

/// Normalization convention of a transform pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Norm {
    /// Forward unscaled, inverse divides by `n`.
    Backward,
    /// Forward divides by `n`, inverse unscaled.
    Forward,
    /// Both directions divide by `sqrt(n)`.
    Orthonormal,
    /// Explicit factor applied to the invoked direction.
    Custom(f64),
}

fn towards_frequency_domain(norm: Norm, n: usize) -> f64 {
    match norm {
        Norm::Backward => 1.0,
        Norm::Forward => 1.0 / n as f64,
        Norm::Orthonormal => 1.0 / (n as f64).sqrt(),
        Norm::Custom(f) => f,
    }
}

fn towards_time_domain(norm: Norm, n: usize) -> f64 {
    match norm {
        Norm::Backward => 1.0 / n as f64,
        Norm::Forward => 1.0,
        Norm::Orthonormal => 1.0 / (n as f64).sqrt(),
        Norm::Custom(f) => f,
    }
}

fn double_precision(dtype: DType) -> bool {
    matches!(dtype, DType::F64 | DType::C64)
}

fn complex_out(dtype: DType) -> DType {
    if double_precision(dtype) {
        DType::C64
    } else {
        DType::C32
    }
}

fn real_out(dtype: DType) -> DType {
    if double_precision(dtype) {
        DType::F64
    } else {
        DType::F32
    }
}

/// Transform rank and padded shape from the requested output dims.
fn plan(signal: &Array, out_dims: &[usize]) -> Result<(usize, Shape, usize)> {
    let rank = out_dims.len();
    if rank == 0 || rank > 3 {
        return Err(Error::Fft(format!(
            "transforms support rank 1 to 3, requested rank {rank}"
        )));
    }
    if out_dims.iter().any(|&d| d == 0) {
        return Err(Error::Fft("transform axes cannot be empty".into()));
    }
    let mut dims = signal.dims();
    for (axis, &d) in out_dims.iter().enumerate() {
        dims[axis] = d;
    }
    let n: usize = out_dims.iter().product();
    Ok((rank, Shape(dims), n))
}

/// Resize (truncate or zero-pad) a complex buffer into `target`.
fn resize(data: &[Complex64], src: Shape, target: Shape) -> Vec<Complex64> {
    if src == target {
        return data.to_vec();
    }
    (0..target.elements())
        .map(|i| {
            let c = target.coords_of(i);
            if (0..4).all(|a| c[a] < src.dim(a)) {
                data[src.index_of(c)]
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
        .collect()
}

/// 1-d transforms along `axis` for every lane of the buffer.
fn transform_axis(data: &mut [Complex64], shape: Shape, axis: usize, inverse: bool) {
    let n = shape.dim(axis);
    if n <= 1 {
        return;
    }
    let lane_shape = {
        let mut dims = shape.0;
        dims[axis] = 1;
        Shape(dims)
    };
    for l in 0..lane_shape.elements() {
        let mut c = lane_shape.coords_of(l);
        let mut lane = Vec::with_capacity(n);
        for k in 0..n {
            c[axis] = k;
            lane.push(data[shape.index_of(c)]);
        }
        engine::transform(&mut lane, inverse);
        for (k, &v) in lane.iter().enumerate() {
            c[axis] = k;
            data[shape.index_of(c)] = v;
        }
    }
}

fn full_transform(signal: &Array, out_dims: &[usize], inverse: bool) -> Result<(Vec<Complex64>, Shape, usize)> {
    let (rank, target, n) = plan(signal, out_dims)?;
    let src_shape = signal.shape();
    let data = signal.host_vec::<Complex64>()?;
    let mut data = resize(&data, src_shape, target);
    for axis in 0..rank {
        transform_axis(&mut data, target, axis, inverse);
    }
    Ok((data, target, n))
}

fn complex_array(data: Vec<Complex64>, shape: Shape, dtype: DType, factor: f64) -> Result<Array> {
    let scaled: Vec<Complex64> = data.into_iter().map(|v| v * factor).collect();
    Array::from_storage(
        strider_array::storage::Storage::from_complex_vec(dtype, scaled),
        shape,
    )
}

/// Complex-to-complex forward transform. `out_dims` gives the transformed
/// lengths (rank = `out_dims.len()`); trailing axes batch.
pub fn fft(signal: &Array, norm: Norm, out_dims: &[usize]) -> Result<Array> {
    let (data, shape, n) = full_transform(signal, out_dims, false)?;
    complex_array(data, shape, complex_out(signal.dtype()), towards_frequency_domain(norm, n))
}

/// Complex-to-complex inverse transform.
pub fn ifft(coef: &Array, norm: Norm, out_dims: &[usize]) -> Result<Array> {
    let (data, shape, n) = full_transform(coef, out_dims, true)?;
    complex_array(data, shape, complex_out(coef.dtype()), towards_time_domain(norm, n))
}

/// Real-to-complex transform with Hermitian packing: the first axis keeps
/// `n0/2 + 1` coefficients.
pub fn rfft(signal: &Array, norm: Norm, out_dims: &[usize]) -> Result<Array> {
    if signal.dtype().is_complex() {
        return Err(Error::Type("rfft expects a real-valued signal".into()));
    }
    let (data, shape, n) = full_transform(signal, out_dims, false)?;
    let keep = shape.dim(0) / 2 + 1;
    let mut dims = shape.0;
    dims[0] = keep;
    let packed_shape = Shape(dims);
    let packed: Vec<Complex64> = (0..packed_shape.elements())
        .map(|i| data[shape.index_of(packed_shape.coords_of(i))])
        .collect();
    complex_array(
        packed,
        packed_shape,
        complex_out(signal.dtype()),
        towards_frequency_domain(norm, n),
    )
}

/// Inverse of [`rfft`]. `out_dims` names the real output lengths; its first
/// entry decides whether the reconstructed length is even or odd.
pub fn irfft(coef: &Array, norm: Norm, out_dims: &[usize]) -> Result<Array> {
    let rank = out_dims.len();
    if rank == 0 || rank > 3 {
        return Err(Error::Fft(format!(
            "transforms support rank 1 to 3, requested rank {rank}"
        )));
    }
    let n0 = out_dims[0];
    let keep = n0 / 2 + 1;
    if coef.dim(0) != keep {
        return Err(Error::Fft(format!(
            "hermitian input of {} rows cannot reconstruct a length-{n0} signal (expected {keep})",
            coef.dim(0)
        )));
    }
    for (axis, &d) in out_dims.iter().enumerate().skip(1) {
        if coef.dim(axis) != d {
            return Err(Error::Fft(format!(
                "transformed axis {axis} disagrees: input {} vs requested {d}",
                coef.dim(axis)
            )));
        }
    }
    let mut dims = coef.dims();
    for (axis, &d) in out_dims.iter().enumerate() {
        dims[axis] = d;
    }
    let full_shape = Shape(dims);
    let packed_shape = coef.shape();
    let packed = coef.host_vec::<Complex64>()?;

    // unfold the Hermitian symmetry over the transformed axes
    let mut data: Vec<Complex64> = (0..full_shape.elements())
        .map(|i| {
            let c = full_shape.coords_of(i);
            if c[0] < keep {
                packed[packed_shape.index_of(c)]
            } else {
                let mut m = c;
                m[0] = n0 - c[0];
                for (axis, &d) in out_dims.iter().enumerate().skip(1) {
                    m[axis] = (d - c[axis]) % d;
                }
                packed[packed_shape.index_of(m)].conj()
            }
        })
        .collect();

    for axis in 0..rank {
        transform_axis(&mut data, full_shape, axis, true);
    }
    let n: usize = out_dims.iter().product();
    let factor = towards_time_domain(norm, n);
    let reals: Vec<f64> = data.into_iter().map(|v| v.re * factor).collect();
    Array::from_storage(
        strider_array::storage::Storage::from_real_vec(real_out(coef.dtype()), reals),
        full_shape,
    )
}

/// Sample frequencies of a length-`n` transform with spacing `d`, in the
/// standard order (non-negative then negative).
pub fn fftfreq(n: usize, d: f64) -> Result<Array> {
    if n == 0 {
        return Err(Error::Arg("fftfreq needs at least one sample".into()));
    }
    let v = 1.0 / (n as f64 * d);
    let pos = ((n - 1) / 2) + 1;
    let head = arange(0.0, pos as f64, 1.0, DType::F64)?;
    if pos == n {
        return head.mul_scalar(v);
    }
    let tail = arange(-((n / 2) as f64), 0.0, 1.0, DType::F64)?;
    join(0, &[&head, &tail])?.mul_scalar(v)
}

/// One-sided frequencies for the real transform.
pub fn rfftfreq(n: usize, d: f64) -> Result<Array> {
    if n == 0 {
        return Err(Error::Arg("rfftfreq needs at least one sample".into()));
    }
    let v = 1.0 / (n as f64 * d);
    arange(0.0, (n / 2 + 1) as f64, 1.0, DType::F64)?.mul_scalar(v)
}

/// Cyclic rotation by `dim/2` along the selected axes (default: every
/// non-trivial axis), moving the zero frequency to the center.
pub fn fftshift(x: &Array, axes: Option<&[usize]>) -> Result<Array> {
    let mut shifts = [0i64; 4];
    match axes {
        None => {
            for axis in 0..x.ndims() {
                shifts[axis] = (x.dim(axis) / 2) as i64;
            }
        }
        Some(list) => {
            for &axis in list {
                if axis >= 4 {
                    return Err(Error::Arg("no more than four dimensions are applicable".into()));
                }
                shifts[axis] = (x.dim(axis) / 2) as i64;
            }
        }
    }
    x.shift(shifts, true)
}

/// Wave-number specification for [`spectral_derivative`].
pub enum KappaSpec {
    /// Physical domain length; wave numbers are derived.
    DomainLength(f64),
    /// Explicit wave-number array, already matching the transform order
    /// unless `shift` is requested.
    Wavenumbers(Array),
}

/// Differentiate a signal in the frequency domain:
/// `real(ifft(i * kappa * fft(signal)))`.
pub fn spectral_derivative(signal: &Array, kappa_spec: KappaSpec, shift: bool) -> Result<Array> {
    let n = signal.dim(0);
    let fhat = fft(signal, Norm::Backward, &[n])?;

    let kappa = match kappa_spec {
        KappaSpec::DomainLength(domain_length) => {
            let ramp = arange(0.0, n as f64, 1.0, DType::F64)?
                .sub_scalar((n / 2) as f64)?
                .mul_scalar(2.0 * PI / domain_length)?;
            fftshift(&ramp, None)?
        }
        KappaSpec::Wavenumbers(given) => {
            if given.dim(0) != n {
                return Err(Error::Arg(
                    "kappa specification must have the same length as the signal".into(),
                ));
            }
            if shift {
                fftshift(&given, None)?
            } else {
                given
            }
        }
    };

    let i_unit = strider_array::cplx2(
        &Array::constant(0.0, &[1], DType::F64)?,
        &Array::constant(1.0, &[1], DType::F64)?,
    )?;
    let dfhat = kappa.mul(&fhat)?.mul(&i_unit)?;
    let df = ifft(&dfhat, Norm::Backward, &[n])?;
    df.real()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{x} vs {y}");
        }
    }

    #[test]
    fn fft_round_trip_pow2() {
        let x = Array::from_vector(&[1.0, 2.0, 3.0, 4.0, 0.0, -1.0, 2.5, 0.5]).unwrap();
        let f = fft(&x, Norm::Backward, &[8]).unwrap();
        let back = ifft(&f, Norm::Backward, &[8]).unwrap();
        assert_close(
            &back.real().unwrap().host_vec::<f64>().unwrap(),
            &x.host_vec::<f64>().unwrap(),
            1e-10,
        );
    }

    #[test]
    fn fft_round_trip_odd_length() {
        let data: Vec<f64> = (0..7).map(|v| (v as f64 * 0.7).sin()).collect();
        let x = Array::from_vector(&data).unwrap();
        let f = fft(&x, Norm::Orthonormal, &[7]).unwrap();
        let back = ifft(&f, Norm::Orthonormal, &[7]).unwrap();
        assert_close(&back.real().unwrap().host_vec::<f64>().unwrap(), &data, 1e-9);
    }

    #[test]
    fn rfft_irfft_reproduces_signal() {
        let x = Array::from_vector(&[0.0, 1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0]).unwrap();
        let spec = rfft(&x, Norm::Backward, &[8]).unwrap();
        assert_eq!(spec.dims()[0], 5);
        let back = irfft(&spec, Norm::Backward, &[8]).unwrap();
        assert_close(
            &back.host_vec::<f64>().unwrap(),
            &x.host_vec::<f64>().unwrap(),
            1e-6,
        );
    }

    #[test]
    fn rfft_irfft_odd_output_length() {
        let data: Vec<f64> = (0..9).map(|v| (v as f64).cos()).collect();
        let x = Array::from_vector(&data).unwrap();
        let spec = rfft(&x, Norm::Backward, &[9]).unwrap();
        assert_eq!(spec.dims()[0], 5);
        let back = irfft(&spec, Norm::Backward, &[9]).unwrap();
        assert_close(&back.host_vec::<f64>().unwrap(), &data, 1e-9);
    }

    #[test]
    fn forward_norm_moves_scaling() {
        let x = Array::from_vector(&[1.0, 1.0, 1.0, 1.0]).unwrap();
        let f = fft(&x, Norm::Forward, &[4]).unwrap();
        // DC bin is the mean under the Forward convention
        let dc = f.real().unwrap().host_vec::<f64>().unwrap()[0];
        assert!((dc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fftfreq_layout() {
        let f = fftfreq(4, 1.0).unwrap();
        assert_close(&f.host_vec::<f64>().unwrap(), &[0.0, 0.25, -0.5, -0.25], 1e-12);
        let f5 = fftfreq(5, 1.0).unwrap();
        assert_close(&f5.host_vec::<f64>().unwrap(), &[0.0, 0.2, 0.4, -0.4, -0.2], 1e-12);
    }

    #[test]
    fn rfftfreq_one_sided() {
        let f = rfftfreq(8, 1.0).unwrap();
        assert_close(&f.host_vec::<f64>().unwrap(), &[0.0, 0.125, 0.25, 0.375, 0.5], 1e-12);
    }

    #[test]
    fn fftshift_centers_zero() {
        let v = Array::from_vector(&[0.0, 1.0, 2.0, 3.0]).unwrap();
        let s = fftshift(&v, None).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn spectral_derivative_of_sine() {
        // d/dx sin(x) = cos(x) over one full period
        let n = 64usize;
        let domain = 2.0 * PI;
        let xs: Vec<f64> = (0..n).map(|k| domain * k as f64 / n as f64).collect();
        let signal = Array::from_vector(&xs.iter().map(|&x| x.sin()).collect::<Vec<_>>()).unwrap();
        let deriv = spectral_derivative(&signal, KappaSpec::DomainLength(domain), false).unwrap();
        let got = deriv.host_vec::<f64>().unwrap();
        for (k, &x) in xs.iter().enumerate() {
            assert!((got[k] - x.cos()).abs() < 1e-6, "at {k}: {} vs {}", got[k], x.cos());
        }
    }

    #[test]
    fn zero_length_plan_rejected() {
        let x = Array::from_vector(&[1.0, 2.0]).unwrap();
        assert!(fft(&x, Norm::Backward, &[]).is_err());
        assert!(fft(&x, Norm::Backward, &[1, 1, 1, 1]).is_err());
    }

    #[test]
    fn batched_transform_along_columns() {
        // two series in columns; a rank-1 transform batches over axis 1
        let a = Array::from_slice(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0], &[4, 2]).unwrap();
        let f = fft(&a, Norm::Backward, &[4]).unwrap();
        assert_eq!(f.dims(), [4, 2, 1, 1]);
        // first column is a delta at 0: flat spectrum of ones
        let re = f.real().unwrap().host_vec::<f64>().unwrap();
        for k in 0..4 {
            assert!((re[k] - 1.0).abs() < 1e-12);
        }
    }
}
