use std::sync::{Arc, OnceLock};

use crate::{APPROX_LIGHT, EXACT_LIGHT, Encryption, Evaluation, KeySet, KeygenOptions, Params};

static APPROX_KEYS: OnceLock<Arc<KeySet>> = OnceLock::new();
static EXACT_KEYS: OnceLock<Arc<KeySet>> = OnceLock::new();

fn generate(params: &Params) -> Arc<KeySet> {
    Arc::new(KeySet::generate(params, &KeygenOptions::ALL).expect("preset parameters are valid"))
}

pub fn get_approx_keys() -> Arc<KeySet> {
    APPROX_KEYS.get_or_init(|| generate(&APPROX_LIGHT)).clone()
}

pub fn get_exact_keys() -> Arc<KeySet> {
    EXACT_KEYS.get_or_init(|| generate(&EXACT_LIGHT)).clone()
}

pub fn get_encryption(params: &Params) -> Encryption {
    Encryption::new(params).expect("preset parameters are valid")
}

pub fn get_evaluation(params: &Params, keys: &KeySet) -> Evaluation {
    Evaluation::new(keys.evaluation.clone(), params, &get_encryption(params))
}
