use shroud_lattice::Scheme;
use shroud_runtime::{Engine, EngineConfig, Error, ErrorKind, Operation};

use crate::{assert_close, get_engine};

#[test]
fn multi_step_computation() {
    let engine = get_engine();
    let (key, info) = engine
        .generate_context(Scheme::ApproxReal, "standard", true, true)
        .unwrap();

    assert_eq!(info.max_mul_depth, 2);
    assert_eq!(info.modulus_chain_bits.len(), 3);

    // (a * b + 1) * 0.5, summed.
    let a = engine.encrypt(key, &[1.0, 2.0, 3.0]).unwrap();
    let b = engine.encrypt(key, &[2.0, 2.0, 2.0]).unwrap();
    let ab = engine.multiply(key, a, b).unwrap();
    let shifted = engine.add_plain(key, ab, &[1.0]).unwrap();
    let halved = engine.multiply_plain(key, shifted, &[0.5]).unwrap();

    assert_close(&engine.decrypt(key, halved).unwrap(), &[1.5, 2.5, 3.5], 1e-2);

    let total = engine.sum(key, halved).unwrap();
    assert_close(&engine.decrypt(key, total).unwrap(), &[7.5], 1e-2);

    assert!(matches!(
        engine.multiply_plain(key, halved, &[2.0]),
        Err(Error::DepthExhausted { budget: 2, .. })
    ));

    assert_eq!(engine.payload_info(total).unwrap().op_count, 4);
    assert!(engine.cleanup_context(key).unwrap());
}

#[test]
fn exact_standard_allows_two_multiplications() {
    let engine = get_engine();
    let (light, light_info) = engine
        .generate_context(Scheme::ExactInteger, "light", true, true)
        .unwrap();
    let (key, info) = engine
        .generate_context(Scheme::ExactInteger, "standard", true, true)
        .unwrap();

    assert_eq!(light_info.max_mul_depth, 1);
    assert_eq!(info.max_mul_depth, 2);
    assert_eq!(info.slot_count, 2 * light_info.slot_count);

    // (a * b) * c, then dotted with nothing left to spend.
    let a = engine.encrypt(key, &[3.0, -4.0, 5.0]).unwrap();
    let b = engine.encrypt(key, &[7.0, 8.0, -9.0]).unwrap();
    let c = engine.encrypt(key, &[2.0, -1.0, 10.0]).unwrap();
    let ab = engine.multiply(key, a, b).unwrap();
    let abc = engine.multiply(key, ab, c).unwrap();

    assert_eq!(engine.decrypt(key, abc).unwrap(), vec![42.0, 32.0, -450.0]);

    let total = engine.sum(key, abc).unwrap();
    assert_eq!(engine.decrypt(key, total).unwrap(), vec![-376.0]);

    assert!(matches!(
        engine.multiply(key, abc, a),
        Err(Error::DepthExhausted { budget: 2, .. })
    ));

    assert!(engine.cleanup_context(key).unwrap());
    assert!(engine.cleanup_context(light).unwrap());
}

#[test]
fn key_isolation() {
    let engine = get_engine();
    let (key_1, info_1) = engine
        .generate_context(Scheme::ExactInteger, "light", false, false)
        .unwrap();
    let (key_2, info_2) = engine
        .generate_context(Scheme::ExactInteger, "light", false, false)
        .unwrap();

    assert_ne!(key_1, key_2);
    assert!(info_2.metadata.pooled || info_1.metadata.pooled);

    let a = engine.encrypt(key_1, &[1.0]).unwrap();
    let b = engine.encrypt(key_2, &[1.0]).unwrap();

    let err = engine.add(key_1, a, b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Incompatible);
    assert!(matches!(err, Error::KeyMismatch { .. }));

    assert!(matches!(
        engine.compute(key_2, &Operation::Negate, a, None),
        Err(Error::KeyMismatch { .. })
    ));

    engine.cleanup_context(key_1).unwrap();
    engine.cleanup_context(key_2).unwrap();
}

#[test]
fn cleanup_invalidates_everything() {
    let engine = get_engine();
    let (key, _) = engine
        .generate_context(Scheme::ExactInteger, "light", false, false)
        .unwrap();
    let a = engine.encrypt(key, &[5.0]).unwrap();
    let b = engine.negate(key, a).unwrap();

    assert!(engine.cleanup_context(key).unwrap());

    for result in [
        engine.decrypt(key, b).map(|_| ()),
        engine.negate(key, a).map(|_| ()),
        engine.encrypt(key, &[1.0]).map(|_| ()),
        engine.get_key_info(key).map(|_| ()),
        engine.payload_info(a).map(|_| ()),
    ] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }

    assert!(!engine.cleanup_context(key).unwrap());
}

#[test]
fn eviction_surfaces_as_payload_not_found() {
    let engine = Engine::new(EngineConfig {
        payload_capacity: 3,
        ..EngineConfig::default()
    })
    .unwrap();

    let (key, _) = engine
        .generate_context(Scheme::ExactInteger, "light", false, false)
        .unwrap();

    let ids = (0..5)
        .map(|i| engine.encrypt(key, &[i as f64]).unwrap())
        .collect::<Vec<_>>();

    assert!(matches!(engine.decrypt(key, ids[0]), Err(Error::PayloadNotFound(id)) if id == ids[0]));
    assert!(matches!(engine.decrypt(key, ids[1]), Err(Error::PayloadNotFound(_))));
    assert_eq!(engine.decrypt(key, ids[4]).unwrap(), vec![4.0]);

    let status = engine.status();
    assert_eq!(status.live_payloads, 3);
    assert_eq!(status.counters.evictions, 2);
}

#[test]
fn pooling_can_be_disabled() {
    let engine = Engine::new(EngineConfig {
        pool_contexts: false,
        ..EngineConfig::default()
    })
    .unwrap();

    let (_, a) = engine
        .generate_context(Scheme::ExactInteger, "light", false, false)
        .unwrap();
    let (_, b) = engine
        .generate_context(Scheme::ExactInteger, "light", false, false)
        .unwrap();

    assert!(!a.metadata.pooled && !b.metadata.pooled);
    assert_ne!(a.public_key_fingerprint, b.public_key_fingerprint);
    assert_eq!(engine.status().counters.pool_hits, 0);
}
