//! Matrix expansion: one job definition into concrete job instances.

use gantry_core::ids::{JobId, MatrixId};
use gantry_core::pipeline::JobDefinition;
use gantry_core::{Error, Result};
use indexmap::IndexMap;

/// One concrete, fully axis-bound execution of a job definition.
///
/// Created per triggered run, executed once, discarded after its report
/// is recorded.
#[derive(Debug, Clone)]
pub struct JobInstance {
    pub id: JobId,
    pub matrix_id: MatrixId,
    pub job_name: String,
    /// Position within the expansion, stable across runs of the same config.
    pub index: usize,
    /// Axis name -> stringified value, in axis declaration order. Empty for
    /// jobs without a matrix.
    pub axes: IndexMap<String, String>,
    pub display_name: String,
    pub definition: JobDefinition,
}

impl JobInstance {
    /// Directory-safe identifier for this instance's workspace.
    pub fn slug(&self) -> String {
        if self.axes.is_empty() {
            self.job_name.clone()
        } else {
            format!("{}-{}", self.job_name, self.index)
        }
    }
}

/// Expander for matrix configurations.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand a job into one instance per element of the Cartesian product
    /// of its matrix axes. Axes iterate in declaration order and values in
    /// declaration order within each axis, so the output ordering is
    /// deterministic and reproducible across runs.
    ///
    /// A job without a matrix expands to exactly one instance with an empty
    /// assignment. A declared axis with zero values is a configuration
    /// error (`EmptyAxis`) rather than a silently empty product.
    pub fn expand(&self, job: &JobDefinition) -> Result<Vec<JobInstance>> {
        let matrix_id = MatrixId::new();

        let Some(matrix) = &job.matrix else {
            return Ok(vec![JobInstance {
                id: JobId::new(),
                matrix_id,
                job_name: job.name.clone(),
                index: 0,
                axes: IndexMap::new(),
                display_name: job.name.clone(),
                definition: job.clone(),
            }]);
        };

        for (axis, values) in &matrix.axes {
            if values.is_empty() {
                return Err(Error::EmptyAxis {
                    job: job.name.clone(),
                    axis: axis.clone(),
                });
            }
        }

        let mut combinations: Vec<IndexMap<String, String>> = vec![IndexMap::new()];
        for (axis, values) in &matrix.axes {
            let mut next = Vec::with_capacity(combinations.len() * values.len());
            for combo in &combinations {
                for value in values {
                    let mut assignment = combo.clone();
                    assignment.insert(axis.clone(), value_str(value));
                    next.push(assignment);
                }
            }
            combinations = next;
        }

        for include in &matrix.include {
            let assignment: IndexMap<String, String> = include
                .iter()
                .map(|(k, v)| (k.clone(), value_str(v)))
                .collect();
            if !combinations.contains(&assignment) {
                combinations.push(assignment);
            }
        }

        combinations.retain(|combo| {
            !matrix.exclude.iter().any(|exclude| {
                exclude
                    .iter()
                    .all(|(key, value)| combo.get(key) == Some(&value_str(value)))
            })
        });

        let instances = combinations
            .into_iter()
            .enumerate()
            .map(|(index, axes)| {
                let display_name = display_name(&job.name, &axes);
                JobInstance {
                    id: JobId::new(),
                    matrix_id,
                    job_name: job.name.clone(),
                    index,
                    axes,
                    display_name,
                    definition: job.clone(),
                }
            })
            .collect();

        Ok(instances)
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}

fn value_str(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display_name(job_name: &str, axes: &IndexMap<String, String>) -> String {
    if axes.is_empty() {
        return job_name.to_string();
    }
    let parts: Vec<String> = axes.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{} ({})", job_name, parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::pipeline::PipelineConfig;
    use pretty_assertions::assert_eq;

    fn job_with_matrix(matrix_yaml: &str) -> JobDefinition {
        let yaml = format!(
            r#"
name: ci
triggers:
  - type: push
jobs:
  - name: test
{}
    steps:
      - run: cargo test
"#,
            matrix_yaml
        );
        PipelineConfig::from_yaml(&yaml).unwrap().jobs[0].clone()
    }

    #[test]
    fn test_no_matrix_yields_single_instance() {
        let job = job_with_matrix("");
        let instances = MatrixExpander::new().expand(&job).unwrap();

        assert_eq!(instances.len(), 1);
        assert!(instances[0].axes.is_empty());
        assert_eq!(instances[0].display_name, "test");
    }

    #[test]
    fn test_product_count_and_order() {
        let job = job_with_matrix(
            r#"    matrix:
      axes:
        os: [ubuntu, macos]
        rust: ["stable", "beta", "nightly"]
"#,
        );
        let instances = MatrixExpander::new().expand(&job).unwrap();

        assert_eq!(instances.len(), 6); // 2 os x 3 rust

        // Axes iterate in declaration order, values in declaration order:
        // the last-declared axis varies fastest.
        let names: Vec<&str> = instances.iter().map(|i| i.display_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "test (os=ubuntu, rust=stable)",
                "test (os=ubuntu, rust=beta)",
                "test (os=ubuntu, rust=nightly)",
                "test (os=macos, rust=stable)",
                "test (os=macos, rust=beta)",
                "test (os=macos, rust=nightly)",
            ]
        );

        // Indices follow expansion order.
        for (i, instance) in instances.iter().enumerate() {
            assert_eq!(instance.index, i);
        }
    }

    #[test]
    fn test_expansion_is_reproducible() {
        let job = job_with_matrix(
            r#"    matrix:
      axes:
        os: [ubuntu, macos]
        rust: [stable, beta]
"#,
        );
        let expander = MatrixExpander::new();
        let first: Vec<_> = expander
            .expand(&job)
            .unwrap()
            .into_iter()
            .map(|i| i.axes)
            .collect();
        let second: Vec<_> = expander
            .expand(&job)
            .unwrap()
            .into_iter()
            .map(|i| i.axes)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_axis_rejected() {
        let job = job_with_matrix(
            r#"    matrix:
      axes:
        os: [ubuntu]
        rust: []
"#,
        );
        let err = MatrixExpander::new().expand(&job).unwrap_err();
        match err {
            Error::EmptyAxis { job, axis } => {
                assert_eq!(job, "test");
                assert_eq!(axis, "rust");
            }
            other => panic!("expected EmptyAxis, got {:?}", other),
        }
    }

    #[test]
    fn test_exclude_removes_combination() {
        let job = job_with_matrix(
            r#"    matrix:
      axes:
        os: [ubuntu, macos]
        arch: [amd64, arm64]
      exclude:
        - os: macos
          arch: amd64
"#,
        );
        let instances = MatrixExpander::new().expand(&job).unwrap();

        // 2x2 = 4, minus 1 excluded = 3
        assert_eq!(instances.len(), 3);
        assert!(
            !instances
                .iter()
                .any(|i| i.axes["os"] == "macos" && i.axes["arch"] == "amd64")
        );
    }

    #[test]
    fn test_include_appends_novel_combination() {
        let job = job_with_matrix(
            r#"    matrix:
      axes:
        os: [ubuntu]
      include:
        - os: windows
"#,
        );
        let instances = MatrixExpander::new().expand(&job).unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1].axes["os"], "windows");
    }

    #[test]
    fn test_numeric_axis_values_are_stringified() {
        let job = job_with_matrix(
            r#"    matrix:
      axes:
        version: [18, 20]
"#,
        );
        let instances = MatrixExpander::new().expand(&job).unwrap();

        assert_eq!(instances[0].axes["version"], "18");
        assert_eq!(instances[1].axes["version"], "20");
    }

    #[test]
    fn test_no_duplicate_instances() {
        let job = job_with_matrix(
            r#"    matrix:
      axes:
        os: [ubuntu, macos]
        rust: [stable, beta]
"#,
        );
        let instances = MatrixExpander::new().expand(&job).unwrap();
        let mut seen = std::collections::HashSet::new();
        for instance in &instances {
            let key: Vec<(String, String)> = instance
                .axes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            assert!(seen.insert(key), "duplicate assignment in expansion");
        }
    }
}
