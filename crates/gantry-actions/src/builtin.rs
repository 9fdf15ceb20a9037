//! Built-in actions.
//!
//! The small set of reusable steps most pipelines start with: fetching
//! sources, provisioning a Rust toolchain, and installing OS packages.

use crate::registry::{ActionSpec, StaticRegistry};
use gantry_core::ports::ActionInput;

fn input(name: &str, required: bool, default: Option<&str>) -> ActionInput {
    ActionInput {
        name: name.to_string(),
        required,
        default: default.map(|d| d.to_string()),
    }
}

/// Registry pre-populated with the built-in actions.
pub fn builtin_registry() -> StaticRegistry {
    StaticRegistry::new()
        .with_action(ActionSpec {
            name: "checkout".to_string(),
            versions: vec!["v1".to_string()],
            command: "git clone --quiet ${{ inputs.repository }} . && git checkout --quiet ${{ inputs.ref }}"
                .to_string(),
            inputs: vec![
                input("repository", true, None),
                input("ref", false, Some("HEAD")),
            ],
        })
        .with_action(ActionSpec {
            name: "setup-rust".to_string(),
            versions: vec!["v1".to_string()],
            command:
                "rustup toolchain install ${{ inputs.toolchain }} && rustup default ${{ inputs.toolchain }}"
                    .to_string(),
            inputs: vec![input("toolchain", false, Some("stable"))],
        })
        .with_action(ActionSpec {
            name: "install-packages".to_string(),
            versions: vec!["v1".to_string()],
            command: "sudo ${{ inputs.manager }} install -y ${{ inputs.packages }}".to_string(),
            inputs: vec![
                input("packages", true, None),
                input("manager", false, Some("apt-get")),
            ],
        })
}
