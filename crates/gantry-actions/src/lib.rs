//! Action resolution for Gantry.
//!
//! Implements the `ActionRegistry` port. An action reference like
//! `checkout@v1` resolves to a command template; once resolved, the engine
//! treats it exactly like an inline command step.

pub mod builtin;
pub mod registry;

pub use builtin::builtin_registry;
pub use registry::{ActionSpec, StaticRegistry};
