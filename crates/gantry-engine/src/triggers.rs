//! Trigger matching and evaluation.

use gantry_core::pipeline::{PipelineConfig, TriggerConfig, TriggerType};
use gantry_core::run::TriggerInfo;

/// Event that can start a pipeline run.
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    Push { branch: String },
    PullRequest { source_branch: String, target_branch: String },
    Tag { name: String },
    Manual { actor: Option<String> },
    Schedule,
}

impl TriggerEvent {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            TriggerEvent::Push { .. } => TriggerType::Push,
            TriggerEvent::PullRequest { .. } => TriggerType::PullRequest,
            TriggerEvent::Tag { .. } => TriggerType::Push,
            TriggerEvent::Manual { .. } => TriggerType::Manual,
            TriggerEvent::Schedule => TriggerType::Schedule,
        }
    }

    pub fn info(&self) -> TriggerInfo {
        let (branch, actor) = match self {
            TriggerEvent::Push { branch } => (Some(branch.clone()), None),
            TriggerEvent::PullRequest { target_branch, .. } => (Some(target_branch.clone()), None),
            TriggerEvent::Tag { name } => (Some(name.clone()), None),
            TriggerEvent::Manual { actor } => (None, actor.clone()),
            TriggerEvent::Schedule => (None, None),
        };
        TriggerInfo {
            trigger_type: self.trigger_type(),
            branch,
            actor,
        }
    }
}

/// Matcher for determining whether a pipeline should run for an event.
pub struct TriggerMatcher;

impl TriggerMatcher {
    pub fn new() -> Self {
        Self
    }

    /// A pipeline runs iff any of its declared triggers matches the event.
    /// Configs with no triggers never get here: validation rejects them.
    pub fn matches(&self, config: &PipelineConfig, event: &TriggerEvent) -> bool {
        config
            .triggers
            .iter()
            .any(|trigger| self.trigger_matches(trigger, event))
    }

    fn trigger_matches(&self, trigger: &TriggerConfig, event: &TriggerEvent) -> bool {
        match event {
            TriggerEvent::Push { branch } => {
                trigger.trigger_type == TriggerType::Push
                    && self.branch_matches(&trigger.branches, branch)
            }
            TriggerEvent::PullRequest { target_branch, .. } => {
                trigger.trigger_type == TriggerType::PullRequest
                    && self.branch_matches(&trigger.branches, target_branch)
            }
            TriggerEvent::Tag { name } => {
                trigger.trigger_type == TriggerType::Push && self.tag_matches(&trigger.tags, name)
            }
            TriggerEvent::Manual { .. } => trigger.trigger_type == TriggerType::Manual,
            TriggerEvent::Schedule => trigger.trigger_type == TriggerType::Schedule,
        }
    }

    fn branch_matches(&self, patterns: &[String], branch: &str) -> bool {
        if patterns.is_empty() {
            return true; // Match all branches if no patterns specified
        }
        patterns.iter().any(|p| glob_match(p, branch))
    }

    fn tag_matches(&self, patterns: &[String], tag: &str) -> bool {
        if patterns.is_empty() {
            return false; // Don't match tags unless explicitly specified
        }
        patterns.iter().any(|p| glob_match(p, tag))
    }
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/**") {
        return text.starts_with(prefix);
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        let prefix_slash = format!("{}/", prefix);
        if text.starts_with(&prefix_slash) {
            return !text[prefix_slash.len()..].contains('/');
        }
        return false;
    }
    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            return text.starts_with(parts[0]) && text.ends_with(parts[1]);
        }
    }
    pattern == text
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::pipeline::PipelineConfig;

    fn config(triggers_yaml: &str) -> PipelineConfig {
        let yaml = format!(
            r#"
name: ci
triggers:
{}
jobs:
  - name: build
    steps:
      - run: make
"#,
            triggers_yaml
        );
        PipelineConfig::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn test_push_branch_match() {
        let config = config("  - type: push\n    branches: [main]\n");
        let matcher = TriggerMatcher::new();

        assert!(matcher.matches(
            &config,
            &TriggerEvent::Push {
                branch: "main".to_string()
            }
        ));
        assert!(!matcher.matches(
            &config,
            &TriggerEvent::Push {
                branch: "develop".to_string()
            }
        ));
    }

    #[test]
    fn test_push_glob_branches() {
        let config = config("  - type: push\n    branches: [\"feature/*\", \"release/**\"]\n");
        let matcher = TriggerMatcher::new();

        assert!(matcher.matches(
            &config,
            &TriggerEvent::Push {
                branch: "feature/foo".to_string()
            }
        ));
        assert!(matcher.matches(
            &config,
            &TriggerEvent::Push {
                branch: "release/v1/hotfix".to_string()
            }
        ));
        assert!(!matcher.matches(
            &config,
            &TriggerEvent::Push {
                branch: "feature/foo/bar".to_string()
            }
        ));
    }

    #[test]
    fn test_no_branch_patterns_match_all() {
        let config = config("  - type: push\n");
        let matcher = TriggerMatcher::new();

        assert!(matcher.matches(
            &config,
            &TriggerEvent::Push {
                branch: "any-branch".to_string()
            }
        ));
    }

    #[test]
    fn test_event_type_must_match() {
        let config = config("  - type: pull_request\n    branches: [main]\n");
        let matcher = TriggerMatcher::new();

        assert!(!matcher.matches(
            &config,
            &TriggerEvent::Push {
                branch: "main".to_string()
            }
        ));
        assert!(matcher.matches(
            &config,
            &TriggerEvent::PullRequest {
                source_branch: "feature/x".to_string(),
                target_branch: "main".to_string()
            }
        ));
    }

    #[test]
    fn test_tags_require_explicit_patterns() {
        let untagged = config("  - type: push\n");
        let tagged = config("  - type: push\n    tags: [\"v*\"]\n");
        let matcher = TriggerMatcher::new();
        let event = TriggerEvent::Tag {
            name: "v1.2.3".to_string(),
        };

        assert!(!matcher.matches(&untagged, &event));
        assert!(matcher.matches(&tagged, &event));
    }

    #[test]
    fn test_manual_and_schedule() {
        let matcher = TriggerMatcher::new();
        let manual = config("  - type: manual\n");
        let scheduled = config("  - type: schedule\n");

        assert!(matcher.matches(&manual, &TriggerEvent::Manual { actor: None }));
        assert!(!matcher.matches(&manual, &TriggerEvent::Schedule));
        assert!(matcher.matches(&scheduled, &TriggerEvent::Schedule));
    }
}
