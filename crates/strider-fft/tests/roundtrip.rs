//! Transform round-trip laws

use proptest::prelude::*;
use strider_array::Array;
use strider_fft::{fft, ifft, irfft, rfft, Norm};

fn close(a: &[f64], b: &[f64], tol: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
}

proptest! {
    // ifft(fft(x, n), n) == x for arbitrary lengths, including the
    // Bluestein path on non-powers of two
    #[test]
    fn complex_round_trip(values in prop::collection::vec(-100.0f64..100.0, 2..48)) {
        let n = values.len();
        let x = Array::from_vector(&values).unwrap();
        let back = ifft(&fft(&x, Norm::Backward, &[n]).unwrap(), Norm::Backward, &[n]).unwrap();
        prop_assert!(close(
            &back.real().unwrap().host_vec::<f64>().unwrap(),
            &values,
            1e-8
        ));
        prop_assert!(close(
            &back.imag().unwrap().host_vec::<f64>().unwrap(),
            &vec![0.0; n],
            1e-8
        ));
    }

    // the real transform pair reproduces the signal for both parities of
    // the requested output length
    #[test]
    fn real_round_trip(values in prop::collection::vec(-100.0f64..100.0, 2..48)) {
        let n = values.len();
        let x = Array::from_vector(&values).unwrap();
        let spec = rfft(&x, Norm::Backward, &[n]).unwrap();
        prop_assert_eq!(spec.dims()[0], n / 2 + 1);
        let back = irfft(&spec, Norm::Backward, &[n]).unwrap();
        prop_assert!(close(&back.host_vec::<f64>().unwrap(), &values, 1e-8));
    }

    // every normalization convention composes to the identity
    #[test]
    fn norms_compose_to_identity(
        values in prop::collection::vec(-10.0f64..10.0, 4..32),
        which in 0usize..3,
    ) {
        let norm = [Norm::Backward, Norm::Forward, Norm::Orthonormal][which];
        let n = values.len();
        let x = Array::from_vector(&values).unwrap();
        let back = ifft(&fft(&x, norm, &[n]).unwrap(), norm, &[n]).unwrap();
        prop_assert!(close(
            &back.real().unwrap().host_vec::<f64>().unwrap(),
            &values,
            1e-8
        ));
    }
}
