//! Layered environment resolution.
//!
//! Environment state is never implicit or globally mutable: each step sees
//! a mapping built by overlaying the process-wide env, then the job env,
//! then step-local overrides, with last-write-wins semantics.

use std::collections::HashMap;

/// Overlay environment layers in order. Later layers override earlier ones.
pub fn layered<'a, I>(layers: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a HashMap<String, String>>,
{
    let mut merged = HashMap::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
