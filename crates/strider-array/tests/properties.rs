//! Property-based laws for the array core

use proptest::prelude::*;
use strider_array::{Array, DType, Selector};

fn small_dims() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 1..4)
}

proptest! {
    // shape(x ⊕ y) == broadcast(shape(x), shape(y)) whenever both exist
    #[test]
    fn broadcast_shape_law(dims in small_dims()) {
        let a = Array::ones(&dims, DType::F64).unwrap();
        let mut collapsed = dims.clone();
        collapsed[0] = 1;
        let b = Array::ones(&collapsed, DType::F64).unwrap();
        let sum = a.add(&b).unwrap();
        prop_assert_eq!(sum.dims(), a.dims());
    }

    // cast(cast(x, wider), dtype(x)) == x for a lossless widening
    #[test]
    fn dtype_round_trip(values in prop::collection::vec(-1000i32..1000, 1..20)) {
        let a = Array::from_slice(&values, &[values.len()]).unwrap();
        let widened = a.cast(DType::F64).unwrap();
        let back = widened.cast(DType::S32).unwrap();
        prop_assert_eq!(back.host_vec::<i32>().unwrap(), values);
    }

    // sorting twice equals sorting once, and argsort's permutation
    // reproduces the sorted data
    #[test]
    fn sort_laws(values in prop::collection::vec(-100.0f64..100.0, 1..30)) {
        let a = Array::from_vector(&values).unwrap();
        let once = a.sort(0, true).unwrap();
        let twice = once.sort(0, true).unwrap();
        prop_assert_eq!(
            once.host_vec::<f64>().unwrap(),
            twice.host_vec::<f64>().unwrap()
        );

        let (sorted, perm) = a.sort_index(0, true).unwrap();
        let perm = perm.host_vec::<u32>().unwrap();
        let reordered: Vec<f64> = perm.iter().map(|&p| values[p as usize]).collect();
        prop_assert_eq!(reordered, sorted.host_vec::<f64>().unwrap());
    }

    // a boolean indexer selecting k true positions yields an axis of
    // length k
    #[test]
    fn mask_length_law(flags in prop::collection::vec(any::<bool>(), 1..30)) {
        prop_assume!(flags.iter().any(|&f| f));
        let n = flags.len();
        let data: Vec<f64> = (0..n).map(|v| v as f64).collect();
        let a = Array::from_vector(&data).unwrap();
        let mask = Array::from_vector(&flags).unwrap();
        let picked = a.get(&[Selector::Mask(mask)]).unwrap();
        let k = flags.iter().filter(|&&f| f).count();
        prop_assert_eq!(picked.dims()[0], k);
    }

    // sum identity over an empty-free lane: sum == fold of host data
    #[test]
    fn sum_matches_host_fold(values in prop::collection::vec(-10.0f64..10.0, 1..50)) {
        let a = Array::from_vector(&values).unwrap();
        let total = a.sum(None).unwrap().scalar::<f64>().unwrap();
        let expect: f64 = values.iter().sum();
        prop_assert!((total - expect).abs() < 1e-9);
    }
}
