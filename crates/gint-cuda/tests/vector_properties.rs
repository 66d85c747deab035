//! Property tests for `Vector` invariants in both memory spaces.

use gint_cuda::{Device, DeviceVector, Error, Host, HostVector, MemorySpace, Vector};
use proptest::prelude::*;

fn resize_sequence<M: MemorySpace>(sizes: &[usize]) {
    let mut v = Vector::<f64, M>::new();
    let mut max = 0;
    for &n in sizes {
        let before = v.capacity();
        v.resize(n).unwrap();
        max = max.max(n);
        assert_eq!(v.len(), n);
        assert!(v.capacity() >= n);
        assert_eq!(v.capacity(), max);
        if n <= before {
            assert_eq!(v.capacity(), before);
        }
    }
}

fn push_back_until_full<M: MemorySpace>(capacity: usize, values: &[u32]) {
    let mut v = Vector::<u32, M>::new();
    v.reserve(capacity).unwrap();
    for (i, &value) in values.iter().enumerate() {
        let result = v.push_back(value);
        if i < capacity {
            result.unwrap();
            assert_eq!(v.len(), i + 1);
        } else {
            assert!(matches!(result, Err(Error::CapacityExceeded { capacity: c }) if c == capacity));
            assert_eq!(v.len(), capacity);
        }
    }
    let kept = values.len().min(capacity);
    assert_eq!(v.to_host_vec().unwrap(), values[..kept].to_vec());
}

proptest! {
    #[test]
    fn resize_tracks_len_and_monotonic_capacity(sizes in prop::collection::vec(0usize..512, 1..12)) {
        resize_sequence::<Host>(&sizes);
        resize_sequence::<Device>(&sizes);
    }

    #[test]
    fn push_back_never_grows(capacity in 0usize..16, values in prop::collection::vec(any::<u32>(), 0..24)) {
        push_back_until_full::<Host>(capacity, &values);
        push_back_until_full::<Device>(capacity, &values);
    }

    #[test]
    fn assign_round_trips_through_every_space_pair(values in prop::collection::vec(any::<u64>(), 0..300)) {
        let host = HostVector::from_slice(&values).unwrap();
        let device = DeviceVector::from_vector(&host).unwrap();
        let device_copy = DeviceVector::from_vector(&device).unwrap();
        let mut back = HostVector::new();
        back.assign_from(&device_copy).unwrap();
        let host_copy = HostVector::from_vector(&back).unwrap();
        prop_assert_eq!(&host_copy[..], &values[..]);
    }

    #[test]
    fn floats_survive_bit_for_bit(bits in prop::collection::vec(any::<u64>(), 1..64)) {
        let values: Vec<f64> = bits.iter().copied().map(f64::from_bits).collect();
        let device = DeviceVector::from_slice(&values).unwrap();
        let out: Vec<u64> = device.to_host_vec().unwrap().into_iter().map(f64::to_bits).collect();
        prop_assert_eq!(out, bits);
    }

    #[test]
    fn double_swap_restores_both(a in prop::collection::vec(any::<i32>(), 0..40), b in prop::collection::vec(any::<i32>(), 0..40)) {
        let mut va = DeviceVector::from_slice(&a).unwrap();
        let mut vb = DeviceVector::from_slice(&b).unwrap();
        let (pa, pb) = (va.as_ptr(), vb.as_ptr());
        let (ca, cb) = (va.capacity(), vb.capacity());

        va.swap(&mut vb);
        prop_assert_eq!(va.as_ptr(), pb);
        va.swap(&mut vb);

        prop_assert_eq!((va.as_ptr(), vb.as_ptr()), (pa, pb));
        prop_assert_eq!((va.capacity(), vb.capacity()), (ca, cb));
        prop_assert_eq!(va.to_host_vec().unwrap(), a);
        prop_assert_eq!(vb.to_host_vec().unwrap(), b);
    }

    #[test]
    fn assign_zero_reads_back_zero(len in 0usize..200, fill in any::<u8>()) {
        let mut device = DeviceVector::<u16>::with_len(len).unwrap();
        device.fill_bytes(fill).unwrap();
        device.assign_zero(len).unwrap();
        prop_assert!(device.to_host_vec().unwrap().iter().all(|&x| x == 0));

        let mut host = HostVector::<u16>::with_len(len).unwrap();
        host.fill_bytes(fill).unwrap();
        host.assign_zero(len).unwrap();
        prop_assert!(host.iter().all(|&x| x == 0));
    }
}

fn failed_reserve_leaves_vector_unchanged<M: MemorySpace>() {
    let mut v = Vector::<u64, M>::from_slice(&[1, 2, 3]).unwrap();
    let ptr = v.as_ptr();
    let err = v.reserve(usize::MAX / 2).unwrap_err();
    assert!(matches!(err, Error::Allocation { .. }), "{err}");
    assert_eq!(v.len(), 3);
    assert_eq!(v.capacity(), 3);
    assert_eq!(v.as_ptr(), ptr);
    assert_eq!(v.to_host_vec().unwrap(), vec![1, 2, 3]);
}

#[test]
fn oversized_reserve_fails_without_touching_contents() {
    failed_reserve_leaves_vector_unchanged::<Host>();
    failed_reserve_leaves_vector_unchanged::<Device>();
}

#[test]
fn unrepresentable_device_length_is_an_allocation_error() {
    let result = DeviceVector::<u8>::with_len(isize::MAX as usize + 1);
    assert!(matches!(result, Err(Error::Allocation { .. })));
}

#[test]
#[cfg(not(feature = "cuda"))]
fn fresh_device_storage_reads_as_zero() {
    let v = DeviceVector::<f64>::with_len(257).unwrap();
    assert!(v.to_host_vec().unwrap().iter().all(|x| *x == 0.0));

    let mut grown = DeviceVector::<u32>::from_slice(&[7; 4]).unwrap();
    grown.resize(4096).unwrap();
    assert!(grown.to_host_vec().unwrap().iter().all(|x| *x == 0));
}
