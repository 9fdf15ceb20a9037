//! Variable interpolation for step templates.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*([^}]+?)\s*\}\}").expect("template regex"));

/// Context for variable interpolation.
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    /// Fully layered environment for the current step.
    pub env: HashMap<String, String>,
    /// Matrix values for the current job instance.
    pub matrix: HashMap<String, String>,
    /// Step outputs: "step_name.output_key" -> value.
    pub outputs: HashMap<String, String>,
    /// Action inputs for the current action step.
    pub inputs: HashMap<String, String>,
}

impl InterpolationContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpolate variables in a string.
    ///
    /// Supports:
    /// - `${{ env.VAR }}` - resolved environment variable
    /// - `${{ matrix.key }}` - matrix axis value
    /// - `${{ steps.name.outputs.key }}` - output of an earlier step
    /// - `${{ inputs.key }}` - action input parameter
    /// - `${{ name }}` - direct env lookup
    ///
    /// Unresolvable references expand to the empty string.
    pub fn interpolate(&self, input: &str) -> String {
        TEMPLATE_RE
            .replace_all(input, |caps: &regex::Captures| {
                let expr = caps.get(1).map_or("", |m| m.as_str()).trim();
                self.resolve_expression(expr)
            })
            .to_string()
    }

    fn resolve_expression(&self, expr: &str) -> String {
        if let Some(var_name) = expr.strip_prefix("env.") {
            return self.env.get(var_name).cloned().unwrap_or_default();
        }

        if let Some(key) = expr.strip_prefix("matrix.") {
            return self.matrix.get(key).cloned().unwrap_or_default();
        }

        if let Some(key) = expr.strip_prefix("inputs.") {
            return self.inputs.get(key).cloned().unwrap_or_default();
        }

        // steps.<name>.outputs.<key>
        if let Some(rest) = expr.strip_prefix("steps.") {
            if let Some(outputs_idx) = rest.find(".outputs.") {
                let step_name = &rest[..outputs_idx];
                let output_key = &rest[outputs_idx + ".outputs.".len()..];
                let lookup_key = format!("{}.{}", step_name, output_key);
                return self.outputs.get(&lookup_key).cloned().unwrap_or_default();
            }
        }

        self.env.get(expr).cloned().unwrap_or_default()
    }
}

/// Collect the matrix axis names referenced by a template, in order of
/// appearance. Used at config-validation time to enforce that every
/// referenced axis is declared.
pub fn matrix_refs(input: &str) -> Vec<String> {
    TEMPLATE_RE
        .captures_iter(input)
        .filter_map(|caps| {
            let expr = caps.get(1)?.as_str().trim();
            expr.strip_prefix("matrix.").map(|axis| axis.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_variable() {
        let mut ctx = InterpolationContext::new();
        ctx.env.insert("NAME".to_string(), "world".to_string());

        assert_eq!(ctx.interpolate("hello ${{ env.NAME }}!"), "hello world!");
        assert_eq!(ctx.interpolate("hello ${{ NAME }}!"), "hello world!");
    }

    #[test]
    fn test_interpolate_matrix_value() {
        let mut ctx = InterpolationContext::new();
        ctx.matrix.insert("os".to_string(), "linux".to_string());
        ctx.matrix.insert("arch".to_string(), "amd64".to_string());

        assert_eq!(
            ctx.interpolate("building for ${{ matrix.os }}-${{ matrix.arch }}"),
            "building for linux-amd64"
        );
    }

    #[test]
    fn test_interpolate_step_outputs() {
        let mut ctx = InterpolationContext::new();
        ctx.outputs
            .insert("build.version".to_string(), "1.2.3".to_string());

        assert_eq!(
            ctx.interpolate("version: ${{ steps.build.outputs.version }}"),
            "version: 1.2.3"
        );
    }

    #[test]
    fn test_interpolate_action_inputs() {
        let mut ctx = InterpolationContext::new();
        ctx.inputs
            .insert("toolchain".to_string(), "stable".to_string());

        assert_eq!(
            ctx.interpolate("rustup toolchain install ${{ inputs.toolchain }}"),
            "rustup toolchain install stable"
        );
    }

    #[test]
    fn test_missing_reference_expands_to_empty() {
        let ctx = InterpolationContext::new();

        assert_eq!(ctx.interpolate("value: ${{ env.MISSING }}"), "value: ");
        assert_eq!(ctx.interpolate("${{ matrix.missing }}"), "");
        assert_eq!(ctx.interpolate("${{ steps.missing.outputs.key }}"), "");
    }

    #[test]
    fn test_whitespace_variations() {
        let mut ctx = InterpolationContext::new();
        ctx.env.insert("VAR".to_string(), "value".to_string());

        assert_eq!(ctx.interpolate("${{VAR}}"), "value");
        assert_eq!(ctx.interpolate("${{ VAR }}"), "value");
        assert_eq!(ctx.interpolate("${{  VAR  }}"), "value");
    }

    #[test]
    fn test_matrix_refs() {
        let refs = matrix_refs("cargo test --target ${{ matrix.os }} ${{ env.FLAGS }} ${{ matrix.rust }}");
        assert_eq!(refs, ["os", "rust"]);
        assert!(matrix_refs("no templates here").is_empty());
    }
}
