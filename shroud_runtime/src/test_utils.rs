use crate::{Engine, EngineConfig};

pub fn engine() -> Engine {
    Engine::new(EngineConfig::default()).expect("default config is valid")
}

pub fn engine_with_capacity(payload_capacity: usize) -> Engine {
    Engine::new(EngineConfig {
        payload_capacity,
        ..EngineConfig::default()
    })
    .expect("default config is valid")
}

pub fn disabled_engine() -> Engine {
    Engine::new(EngineConfig {
        enabled: false,
        ..EngineConfig::default()
    })
    .expect("default config is valid")
}
