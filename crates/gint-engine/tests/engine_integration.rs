use gint_cuda::{Device, DeviceVector, HostVector, Stream};
use gint_engine::{Engine3, Error, Gaussian, Shell, L_MAX};
use serial_test::serial;

fn basis() -> (Vec<Shell>, Vec<Shell>) {
    let s = Gaussian::new(0, &[(3.4, 0.15), (0.62, 0.54), (0.17, 0.44)]).unwrap();
    let p = Gaussian::new(1, &[(1.1, 0.6), (0.3, 0.5)]).unwrap();
    let d = Gaussian::primitive(2, 0.8).unwrap();
    let primary = vec![
        Shell::new(s.clone(), [0.0, 0.0, 0.0]),
        Shell::new(p.clone(), [0.0, 0.0, 1.4]),
        Shell::new(d.clone(), [0.9, -0.3, 0.7]),
    ];
    let auxiliary = vec![
        Shell::new(s, [0.0, 0.0, 0.7]),
        Shell::new(p, [0.2, 0.1, 0.0]),
        Shell::new(d, [0.0, 0.5, 0.5]),
    ];
    (primary, auxiliary)
}

fn all_triples(engine: &Engine3) -> Vec<[usize; 3]> {
    let mut triples = Vec::new();
    for a in 0..engine.basis().len() {
        for b in 0..engine.basis().len() {
            for x in 0..engine.df_basis().len() {
                triples.push([a, b, x]);
            }
        }
    }
    triples
}

#[test]
fn s_shell_triple_matches_closed_form() {
    let g = Gaussian::primitive(0, 1.0).unwrap();
    let engine = Engine3::new(vec![Shell::new(g.clone(), [0.0; 3])], vec![Shell::new(g, [0.0; 3])]);

    let mut value = [0.0];
    engine.compute([([0, 0, 0], &mut value[..])]).unwrap();

    // N^3 (pi/3)^{3/2} with N = (2/pi)^{3/4}
    let expected = (2.0 / std::f64::consts::PI).powf(2.25) * (std::f64::consts::PI / 3.0).powf(1.5);
    assert!((value[0] - expected).abs() < 1e-13);
}

#[test]
fn swapping_primary_shells_transposes_the_block() {
    let (primary, auxiliary) = basis();
    let engine = Engine3::new(primary, auxiliary);

    let mut ab = vec![0.0; 3 * 6 * 3];
    let mut ba = vec![0.0; 6 * 3 * 3];
    engine
        .compute([([1, 2, 1], ab.as_mut_slice()), ([2, 1, 1], ba.as_mut_slice())])
        .unwrap();

    for i in 0..3 {
        for j in 0..6 {
            for k in 0..3 {
                let lhs = ab[(i * 6 + j) * 3 + k];
                let rhs = ba[(j * 3 + i) * 3 + k];
                assert!((lhs - rhs).abs() < 1e-12, "({i},{j},{k}): {lhs} vs {rhs}");
            }
        }
    }
}

#[test]
fn oversized_destinations_keep_their_tail() {
    let (primary, auxiliary) = basis();
    let engine = Engine3::new(primary, auxiliary);

    let mut values = vec![-1.0; 5];
    engine.compute([([1, 0, 0], values.as_mut_slice())]).unwrap();
    assert!(values[..3].iter().all(|v| *v != -1.0));
    assert_eq!(&values[3..], &[-1.0, -1.0]);
}

#[test]
fn short_destination_fails_without_writing() {
    let (primary, auxiliary) = basis();
    let engine = Engine3::new(primary, auxiliary);

    let mut values = vec![7.0; 8];
    let err = engine.compute([([1, 1, 0], values.as_mut_slice())]).unwrap_err();
    assert!(matches!(
        err,
        Error::DestinationTooSmall { index: [1, 1, 0], required: 9, actual: 8 }
    ));
    assert!(values.iter().all(|v| *v == 7.0));
}

#[test]
fn unknown_shells_are_rejected() {
    let (primary, auxiliary) = basis();
    let engine = Engine3::new(primary, auxiliary);

    let mut values = vec![0.0; 64];
    let err = engine.compute([([0, 3, 0], values.as_mut_slice())]).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfRange { basis: "primary", index: 3, len: 3 }));
}

#[test]
fn angular_momentum_past_ceiling_is_reported() {
    let high = Gaussian::primitive(L_MAX + 1, 1.0).unwrap();
    let s = Gaussian::primitive(0, 1.0).unwrap();
    let engine = Engine3::new(
        vec![Shell::new(high.clone(), [0.0; 3]), Shell::new(high, [1.0, 0.0, 0.0])],
        vec![Shell::new(s, [0.0; 3])],
    );

    let mut values = vec![0.0; engine.integral_count([0, 1, 0]).unwrap()];
    let err = engine.compute([([0, 1, 0], values.as_mut_slice())]).unwrap_err();
    assert!(matches!(
        err,
        Error::ParametersExceedMaximum { ab, x: 0, .. } if ab == 2 * L_MAX + 2
    ));
}

#[test]
#[serial]
fn batch_upload_matches_host_compute() {
    let (primary, auxiliary) = basis();
    let mut engine = Engine3::new(primary, auxiliary);
    let triples = all_triples(&engine);

    let mut expected = Vec::new();
    for &index in &triples {
        let mut block = vec![0.0; engine.integral_count(index).unwrap()];
        engine.compute([(index, block.as_mut_slice())]).unwrap();
        expected.extend(block);
    }

    let stream = Stream::new().unwrap();
    let mut device = DeviceVector::<f64>::new();
    let offsets = engine
        .compute_batch(&triples, &mut device, &stream)
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(offsets.len(), triples.len());
    assert_eq!(offsets[0], 0);
    assert_eq!(device.len(), expected.len());
    assert_eq!(device.to_host_vec().unwrap(), expected);
}

#[test]
#[serial]
fn batch_into_host_vector_reuses_staging() {
    let (primary, auxiliary) = basis();
    let mut engine = Engine3::new(primary, auxiliary);
    let stream = Stream::new().unwrap();
    let mut out = HostVector::<f64>::new();

    let first = engine.compute_batch(&[[0, 0, 0], [1, 1, 2]], &mut out, &stream).unwrap();
    assert_eq!(first.offsets(), &[0, 1]);
    drop(first);
    assert_eq!(out.len(), 1 + 3 * 3 * 6);

    let offsets = engine
        .compute_batch(&[[2, 2, 2]], &mut out, &stream)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(offsets, vec![0]);
    assert_eq!(out.len(), 6 * 6 * 6);
}

#[test]
#[serial]
fn batch_with_bad_index_enqueues_nothing() {
    let (primary, auxiliary) = basis();
    let mut engine = Engine3::new(primary, auxiliary);
    let stream = Stream::new().unwrap();
    let mut out = DeviceVector::<f64>::new();

    let err = engine.compute_batch(&[[0, 0, 0], [0, 0, 9]], &mut out, &stream).err();
    assert!(matches!(err, Some(Error::IndexOutOfRange { basis: "auxiliary", .. })));
    assert!(out.is_empty());
    stream.synchronize().unwrap();
}

#[test]
#[serial]
#[cfg(not(feature = "cuda"))]
fn failed_batch_finishes_its_upload_before_returning() {
    let (primary, auxiliary) = basis();
    let mut engine = Engine3::new(primary, auxiliary);
    let mut expected = [0.0];
    engine.compute([([0, 0, 0], &mut expected[..])]).unwrap();

    let faulting = Stream::new().unwrap();
    // SAFETY: the emulated runtime bounds-checks queued fills and records a
    // fault instead of writing.
    unsafe { Device::memset_async(0x10 as *mut u8, 0, 8, &faulting).unwrap() };
    assert!(faulting.synchronize().is_err());

    let stream = Stream::new().unwrap();
    let mut out = HostVector::<f64>::new();
    let err = engine.compute_batch(&[[0, 0, 0]], &mut out, &stream).err();
    assert!(matches!(err, Some(Error::Accelerator(_))));

    // The upload already landed, so nothing queued can overwrite the caller.
    assert_eq!(&out[..], &expected[..]);
    out[0] = 42.0;
    stream.synchronize().unwrap();
    assert_eq!(out[0], 42.0);
}
