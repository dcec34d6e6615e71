use std::{sync::Barrier, thread};

use shroud_lattice::Scheme;
use shroud_runtime::{Engine, EngineConfig, Error};

use crate::get_engine;

#[test]
fn concurrent_sessions_stay_isolated() {
    let engine = get_engine();

    let handles = (0..8)
        .map(|t| {
            let engine = engine.clone();

            thread::spawn(move || {
                let (key, _) = engine
                    .generate_context(Scheme::ExactInteger, "light", false, false)
                    .unwrap();

                let values = (0..16).map(|i| (t * 100 + i) as f64).collect::<Vec<_>>();
                let a = engine.encrypt(key, &values).unwrap();
                let b = engine.add(key, a, a).unwrap();

                let actual = engine.decrypt(key, b).unwrap();
                let expected = values.iter().map(|v| 2.0 * v).collect::<Vec<_>>();

                assert_eq!(actual, expected);
                assert!(engine.cleanup_context(key).unwrap());
            })
        })
        .collect::<Vec<_>>();

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn shared_payloads_can_be_read_concurrently() {
    let engine = get_engine();
    let (key, _) = engine
        .generate_context(Scheme::ApproxReal, "light", false, false)
        .unwrap();
    let a = engine.encrypt(key, &[1.0, 2.0, 3.0]).unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let b = engine.negate(key, a).unwrap();
                let values = engine.decrypt(key, b).unwrap();

                assert!((values[2] + 3.0).abs() < 1e-3);
            });
        }
    });

    engine.cleanup_context(key).unwrap();
}

#[test]
fn cleanup_collects_payloads_computed_during_teardown() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let (key, _) = engine
        .generate_context(Scheme::ExactInteger, "light", false, false)
        .unwrap();
    let a = engine.encrypt(key, &[1.0, 2.0, 3.0]).unwrap();
    let barrier = Barrier::new(5);

    let stored = thread::scope(|s| {
        let workers = (0..4)
            .map(|_| {
                s.spawn(|| {
                    let mut stored = vec![];
                    barrier.wait();

                    loop {
                        match engine.negate(key, a) {
                            Ok(id) => stored.push(id),
                            Err(Error::KeyNotFound(_) | Error::PayloadNotFound(_)) => break,
                            Err(e) => panic!("unexpected error {e}"),
                        }
                    }

                    stored
                })
            })
            .collect::<Vec<_>>();

        barrier.wait();
        thread::sleep(std::time::Duration::from_millis(5));
        assert!(engine.cleanup_context(key).unwrap());

        workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect::<Vec<_>>()
    });

    for id in stored {
        assert!(matches!(engine.payload_info(id), Err(Error::PayloadNotFound(_))));
    }

    assert_eq!(engine.status().live_payloads, 0);
}
