//! Host command execution for Gantry.
//!
//! Implements the `CommandExecutor` port by spawning shell processes on the
//! host. This is the only place in the system that touches processes or the
//! filesystem on behalf of a step.

pub mod host;

pub use host::{HostExecutor, HostExecutorConfig};
