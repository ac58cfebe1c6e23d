//! Named condition predicates evaluated against the project context.
//!
//! Decision policies refer to conditions by name. Unknown names evaluate to
//! `true` so a policy never silently blocks on a typo; a fixed set of review
//! conditions always evaluates to `false`.

use std::collections::HashMap;

use tracing::debug;

use super::{ProjectContext, ProjectType};

/// A condition predicate.
pub type ConditionFn = fn(&ProjectContext) -> bool;

/// Conditions that always require a human review.
pub const ALWAYS_REVIEW: &[&str] = &[
    "always_review_deletions",
    "always_review_schema_changes",
    "always_review_database_changes",
];

/// Registry of named condition predicates.
#[derive(Clone)]
pub struct ConditionRegistry {
    predicates: HashMap<&'static str, ConditionFn>,
}

impl ConditionRegistry {
    /// Registry with the built-in conditions.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self {
            predicates: HashMap::new(),
        };
        registry.register("has_test_directory", |ctx| ctx.has_tests);
        registry.register("has_component_directory", |ctx| ctx.has_component_dir);
        registry.register("has_lint_config", |ctx| ctx.has_lint_config);
        registry.register("has_requirements", |ctx| !ctx.requirements.is_empty());
        registry.register("has_instructions", |ctx| ctx.instruction_text.is_some());
        registry.register("framework_detected", |ctx| !ctx.frameworks.is_empty());
        registry.register("config_change_safe", |ctx| ctx.has_tests || ctx.has_lint_config);
        registry.register("dependency_install_safe", |ctx| {
            ctx.project_type != ProjectType::Unknown || !ctx.frameworks.is_empty()
        });
        for name in ALWAYS_REVIEW {
            registry.register(*name, |_| false);
        }
        registry
    }

    /// Register or replace a condition.
    pub fn register(&mut self, name: &'static str, predicate: ConditionFn) {
        self.predicates.insert(name, predicate);
    }

    /// Registered condition names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.predicates.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Evaluate a single condition.
    #[must_use]
    pub fn check(&self, name: &str, context: &ProjectContext) -> bool {
        match self.predicates.get(name) {
            Some(predicate) => predicate(context),
            None => {
                debug!("Unknown condition '{}' treated as satisfied", name);
                true
            }
        }
    }

    /// Evaluate every condition, keeping each result.
    #[must_use]
    pub fn evaluate(&self, names: &[&str], context: &ProjectContext) -> Vec<(String, bool)> {
        names
            .iter()
            .map(|name| ((*name).to_string(), self.check(name, context)))
            .collect()
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("conditions", &self.names())
            .finish()
    }
}
